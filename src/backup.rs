//! Streaming backup client: pulls a tar stream from the peer's backup port
//! over HTTPS and unpacks it directly into the data directory.

use crate::config::Config;
use crate::errors::AgentError;
use futures::TryStreamExt;
use std::io::Read;
use std::sync::mpsc::sync_channel;
use tracing::info;

pub struct BackupClient {
    peer_host: String,
    port: u16,
    username: String,
    password: String,
    http: reqwest::Client,
}

impl BackupClient {
    pub fn new(config: &Config) -> Result<Self, AgentError> {
        let mut builder = reqwest::Client::builder();
        if !config.streaming_backup_ca_cert_path.is_empty() {
            let ca_pem = std::fs::read(&config.streaming_backup_ca_cert_path)?;
            let cert = reqwest::Certificate::from_pem(&ca_pem)
                .map_err(|e| AgentError::Config(format!("invalid streaming backup CA cert: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build backup http client: {e}")))?;

        Ok(Self {
            peer_host: config.peer_address.clone(),
            port: config.streaming_backup_port,
            username: config.streaming_backup_http_username.clone(),
            password: config.streaming_backup_http_password.clone(),
            http,
        })
    }

    /// Streams the peer's backup tar into `data_dir`, unpacking entries as
    /// they arrive.
    pub async fn stream_into(&self, data_dir: &str) -> Result<(), AgentError> {
        let url = format!("https://{}:{}/backup", self.peer_host, self.port);
        info!(url = %url, "starting streaming backup");
        let resp = self
            .http
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AgentError::Jumpstart(format!(
                "streaming backup returned {}",
                resp.status()
            )));
        }

        // `tar::Archive` wants a blocking `Read`; bridge the async byte
        // stream onto a worker thread through a small sync channel.
        let mut byte_stream = resp.bytes_stream();
        let (tx, rx) = sync_channel::<std::io::Result<bytes::Bytes>>(4);
        let data_dir = data_dir.to_string();

        let extractor = tokio::task::spawn_blocking(move || -> Result<(), AgentError> {
            let reader = ChannelReader { rx, buf: bytes::Bytes::new() };
            let mut archive = tar::Archive::new(reader);
            archive.unpack(&data_dir)?;
            Ok(())
        });

        while let Some(chunk) = byte_stream
            .try_next()
            .await
            .map_err(AgentError::from)?
        {
            if tx.send(Ok(chunk)).is_err() {
                break;
            }
        }
        drop(tx);

        extractor
            .await
            .map_err(|e| AgentError::Jumpstart(format!("backup extraction task panicked: {e}")))??;
        Ok(())
    }
}

struct ChannelReader {
    rx: std::sync::mpsc::Receiver<std::io::Result<bytes::Bytes>>,
    buf: bytes::Bytes,
}

impl Read for ChannelReader {
    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        if self.buf.is_empty() {
            match self.rx.recv() {
                Ok(Ok(chunk)) => self.buf = chunk,
                Ok(Err(e)) => return Err(e),
                Err(_) => return Ok(0),
            }
        }
        let n = out.len().min(self.buf.len());
        out[..n].copy_from_slice(&self.buf[..n]);
        self.buf = self.buf.slice(n..);
        Ok(n)
    }
}
