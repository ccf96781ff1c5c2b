//! Typed HTTP client mirroring the agent's HTTP surface, used both by the
//! orchestrator CLI and by one agent to reach its peer.

use crate::config::Config;
use crate::db::PeerStatus;
use crate::errors::AgentError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The peer-facing operations the orchestrator drives. Production code wires
/// this to [`PeerClient`]; tests substitute a fake to assert call order.
#[async_trait]
pub trait PeerOps: Send + Sync {
    async fn make_leader(&self, failover: bool) -> Result<(), AgentError>;
    async fn make_follower(&self) -> Result<(), AgentError>;
    async fn make_read_only(&self) -> Result<(), AgentError>;
    async fn sync(&self, peer_gtid_executed: &str) -> Result<(), AgentError>;
    async fn status(&self) -> Result<PeerStatus, AgentError>;
}

#[derive(Debug, Serialize)]
struct MakeLeaderRequest {
    failover: bool,
}

#[derive(Debug, Serialize)]
struct SyncRequest {
    peer_gtid_executed: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

pub struct PeerClient {
    base_url: String,
    username: String,
    password: String,
    http: reqwest::Client,
}

impl PeerClient {
    /// Builds a client for `host`, using mTLS material and HTTP credentials
    /// from `config`.
    pub fn new(host: &str, config: &Config) -> Result<Self, AgentError> {
        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(
            config.replication_wait_timeout_in_seconds.max(30) + 30,
        ));

        if !config.ssl_ca_cert_path.is_empty() {
            let ca_pem = std::fs::read(&config.ssl_ca_cert_path)?;
            let cert = reqwest::Certificate::from_pem(&ca_pem)
                .map_err(|e| AgentError::Config(format!("invalid CA cert: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        if !config.ssl_client_cert_path.is_empty() && !config.ssl_client_key_path.is_empty() {
            let mut identity_pem = std::fs::read(&config.ssl_client_cert_path)?;
            identity_pem.extend(std::fs::read(&config.ssl_client_key_path)?);
            let identity = reqwest::Identity::from_pem(&identity_pem)
                .map_err(|e| AgentError::Config(format!("invalid client identity: {e}")))?;
            builder = builder.identity(identity);
        }

        let http = builder
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build peer http client: {e}")))?;

        Ok(Self {
            base_url: format!("https://{host}:{}", config.port),
            username: config.http_authorization_username.clone(),
            password: config.http_authorization_password.clone(),
            http,
        })
    }

    async fn post_json(&self, path: &str, body: Option<&serde_json::Value>) -> Result<reqwest::Response, AgentError> {
        let mut req = self
            .http
            .post(format!("{}{path}", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .header("content-type", "application/json");
        if let Some(body) = body {
            req = req.json(body);
        }
        Ok(req.send().await?)
    }

    async fn handle_error(resp: reqwest::Response, operation: &'static str) -> AgentError {
        let status = resp.status().as_u16();
        match status {
            400 | 401 | 500 => match resp.json::<StatusResponse>().await {
                Ok(body) => AgentError::PeerResponse {
                    status,
                    message: body.status,
                }
                .wrap(operation),
                Err(e) => AgentError::DecodeResponse(e.to_string()).wrap(operation),
            },
            _ => AgentError::UnexpectedResponse,
        }
    }
}

#[async_trait]
impl PeerOps for PeerClient {
    async fn make_leader(&self, failover: bool) -> Result<(), AgentError> {
        let body = serde_json::to_value(MakeLeaderRequest { failover }).unwrap();
        let resp = self.post_json("/make-leader", Some(&body)).await?;
        if resp.status().is_success() {
            return Ok(());
        }
        Err(Self::handle_error(resp, "make-leader request failed").await)
    }

    async fn make_follower(&self) -> Result<(), AgentError> {
        let resp = self.post_json("/make-follower", None).await?;
        if resp.status().is_success() {
            return Ok(());
        }
        Err(Self::handle_error(resp, "make-follower request failed").await)
    }

    async fn make_read_only(&self) -> Result<(), AgentError> {
        let resp = self.post_json("/make-read-only", None).await?;
        if resp.status().is_success() {
            return Ok(());
        }
        Err(Self::handle_error(resp, "make-read-only request failed").await)
    }

    async fn sync(&self, peer_gtid_executed: &str) -> Result<(), AgentError> {
        let body = serde_json::to_value(SyncRequest {
            peer_gtid_executed: peer_gtid_executed.to_string(),
        })
        .unwrap();
        let resp = self.post_json("/sync", Some(&body)).await?;
        if resp.status().is_success() {
            return Ok(());
        }
        Err(Self::handle_error(resp, "sync request failed").await)
    }

    async fn status(&self) -> Result<PeerStatus, AgentError> {
        let resp = self
            .http
            .get(format!("{}/status", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        if resp.status().is_success() {
            return resp
                .json::<PeerStatus>()
                .await
                .map_err(|e| AgentError::DecodeResponse(e.to_string()));
        }
        Err(Self::handle_error(resp, "status request failed").await)
    }
}
