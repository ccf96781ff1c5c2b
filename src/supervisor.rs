//! Process-supervisor client: a Monit-style HTTP control/status API used to
//! start and stop the supervised database process during jumpstart.

use crate::config::Config;
use crate::errors::AgentError;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct StatusDocument {
    service: Vec<Service>,
}

#[derive(Debug, Deserialize)]
struct Service {
    name: String,
    monitor: u32,
    #[serde(default)]
    pendingaction: u32,
}

pub struct SupervisorClient {
    base_url: String,
    username: String,
    password: String,
    http: reqwest::Client,
    poll_timeout: Duration,
}

impl SupervisorClient {
    pub fn new(config: &Config) -> Self {
        Self {
            base_url: config.process_supervisor_url.trim_end_matches('/').to_string(),
            username: config.process_supervisor_username.clone(),
            password: config.process_supervisor_password.clone(),
            http: reqwest::Client::new(),
            poll_timeout: Duration::from_secs(60),
        }
    }

    pub async fn start(&self, process_name: &str) -> Result<(), AgentError> {
        self.action(process_name, "start").await?;
        self.wait_until_monitored(process_name, true).await
    }

    pub async fn stop(&self, process_name: &str) -> Result<(), AgentError> {
        self.action(process_name, "stop").await?;
        self.wait_until_monitored(process_name, false).await
    }

    async fn action(&self, process_name: &str, action: &str) -> Result<(), AgentError> {
        let url = format!("{}/{process_name}", self.base_url);
        let resp = self
            .http
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .form(&[("action", action)])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AgentError::Supervisor(format!(
                "{action} {process_name} returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn fetch_status(&self) -> Result<StatusDocument, AgentError> {
        let url = format!("{}/_status?format=xml", self.base_url);
        let resp = self
            .http
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        let body = resp.text().await?;
        quick_xml::de::from_str(&body)
            .map_err(|e| AgentError::Supervisor(format!("failed to parse status document: {e}")))
    }

    async fn wait_until_monitored(&self, process_name: &str, want_running: bool) -> Result<(), AgentError> {
        let deadline = Instant::now() + self.poll_timeout;
        loop {
            let doc = self.fetch_status().await?;
            if let Some(svc) = doc.service.iter().find(|s| s.name == process_name) {
                let running = svc.monitor == 1;
                if svc.pendingaction == 0 && running == want_running {
                    info!(process_name, want_running, "process reached desired state");
                    return Ok(());
                }
                debug!(process_name, svc.monitor, svc.pendingaction, "waiting for process state");
            }
            if Instant::now() >= deadline {
                return Err(AgentError::Supervisor(format!(
                    "timed out waiting for '{process_name}' to reach monitor={want_running}"
                )));
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
}
