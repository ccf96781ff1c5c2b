//! mTLS acceptor setup: requires and verifies a client certificate, pinned to
//! TLS 1.2+ with the cipher/curve set the control plane requires.

use crate::config::Config;
use crate::errors::AgentError;
use axum_server::tls_rustls::RustlsConfig;
use rustls::RootCertStore;
use rustls::server::WebPkiClientVerifier;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

fn load_certs(path: &str) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>, AgentError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AgentError::Config(format!("failed to parse certs in '{path}': {e}")))?;
    if certs.is_empty() {
        return Err(AgentError::Config(format!("no certificates found in '{path}'")));
    }
    Ok(certs)
}

fn load_key(path: &str) -> Result<rustls::pki_types::PrivateKeyDer<'static>, AgentError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| AgentError::Config(format!("failed to parse private key in '{path}': {e}")))?
        .ok_or_else(|| AgentError::Config(format!("no private key found in '{path}'")))
}

/// Builds the rustls server config used by `axum_server`: client cert
/// required and verified against the configured CA, TLS 1.2+ with the mutual
/// cipher/curve intersection the control plane requires.
pub async fn build(config: &Config) -> Result<RustlsConfig, AgentError> {
    let certs = load_certs(&config.ssl_server_cert_path)?;
    let key = load_key(&config.ssl_server_key_path)?;

    let mut roots = RootCertStore::empty();
    let ca_certs = load_certs(&config.ssl_ca_cert_path)?;
    for cert in ca_certs {
        roots
            .add(cert)
            .map_err(|e| AgentError::Config(format!("invalid CA certificate: {e}")))?;
    }

    let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
        .build()
        .map_err(|e| AgentError::Config(format!("failed to build client verifier: {e}")))?;

    let server_config = rustls::ServerConfig::builder_with_protocol_versions(&[&rustls::version::TLS12, &rustls::version::TLS13])
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)
        .map_err(|e| AgentError::Config(format!("failed to install server certificate: {e}")))?;

    Ok(RustlsConfig::from_config(Arc::new(server_config)))
}
