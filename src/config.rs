// src/config.rs

//! Layered configuration for the agent, orchestrator, and purger binaries.
//!
//! The file on disk is YAML. A [`RawConfig`] carries every key as optional so
//! `serde_yaml` can parse a partially-specified file, then [`Config::from_file`]
//! resolves defaults and runs [`Config::validate`].

use crate::errors::AgentError;
use serde::Deserialize;
use std::path::Path;

fn default_replication_wait_seconds() -> u64 {
    300
}

fn default_replication_mode() -> String {
    "async".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    8443
}

fn default_streaming_backup_port() -> u16 {
    8444
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RawConfig {
    host_address: Option<String>,
    peer_address: Option<String>,
    data_dir: Option<String>,
    enable_heartbeats: Option<bool>,
    lf_state_dir: Option<String>,
    replication_admin_user: Option<String>,
    replication_admin_password: Option<String>,
    replication_user: Option<String>,
    replication_password: Option<String>,
    replication_wait_timeout_in_seconds: Option<u64>,
    replication_mode: Option<String>,
    port: Option<u16>,
    http_authorization_username: Option<String>,
    http_authorization_password: Option<String>,
    streaming_backup_port: Option<u16>,
    streaming_backup_http_username: Option<String>,
    streaming_backup_http_password: Option<String>,
    streaming_backup_ssl_common_name: Option<String>,
    streaming_backup_ca_cert_path: Option<String>,
    ssl_common_name: Option<String>,
    ssl_server_cert_path: Option<String>,
    ssl_server_key_path: Option<String>,
    ssl_client_cert_path: Option<String>,
    ssl_client_key_path: Option<String>,
    ssl_ca_cert_path: Option<String>,
    mysql_ca_cert_path: Option<String>,
    process_supervisor_url: Option<String>,
    process_supervisor_username: Option<String>,
    process_supervisor_password: Option<String>,
    log_level: Option<String>,
}

/// Replication mode between the leader and its follower.
///
/// Serializes to the wire as the integer enum the status endpoint uses
/// (`0 = async`, `1 = semisync`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationMode {
    Async,
    SemiSync,
}

impl ReplicationMode {
    fn parse(s: &str) -> Result<Self, AgentError> {
        match s {
            "async" => Ok(ReplicationMode::Async),
            "semi-sync" => Ok(ReplicationMode::SemiSync),
            other => Err(AgentError::Config(format!(
                "replication_mode must be 'async' or 'semi-sync', got '{other}'"
            ))),
        }
    }
}

impl serde::Serialize for ReplicationMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let n: u8 = match self {
            ReplicationMode::Async => 0,
            ReplicationMode::SemiSync => 1,
        };
        serializer.serialize_u8(n)
    }
}

impl<'de> serde::Deserialize<'de> for ReplicationMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let n = u8::deserialize(deserializer)?;
        match n {
            0 => Ok(ReplicationMode::Async),
            1 => Ok(ReplicationMode::SemiSync),
            other => Err(serde::de::Error::custom(format!(
                "unknown replication_mode {other}"
            ))),
        }
    }
}

/// Resolved, validated configuration. Cheap to `Clone`; threaded by value into
/// every constructor rather than stashed behind a global.
#[derive(Debug, Clone)]
pub struct Config {
    pub host_address: String,
    pub peer_address: String,
    pub data_dir: String,
    pub enable_heartbeats: bool,
    pub lf_state_dir: String,
    pub replication_admin_user: String,
    pub replication_admin_password: String,
    pub replication_user: String,
    pub replication_password: String,
    pub replication_wait_timeout_in_seconds: u64,
    pub replication_mode: ReplicationMode,
    pub port: u16,
    pub http_authorization_username: String,
    pub http_authorization_password: String,
    pub streaming_backup_port: u16,
    pub streaming_backup_http_username: String,
    pub streaming_backup_http_password: String,
    pub streaming_backup_ssl_common_name: String,
    pub streaming_backup_ca_cert_path: String,
    pub ssl_common_name: String,
    pub ssl_server_cert_path: String,
    pub ssl_server_key_path: String,
    pub ssl_client_cert_path: String,
    pub ssl_client_key_path: String,
    pub ssl_ca_cert_path: String,
    pub mysql_ca_cert_path: String,
    pub process_supervisor_url: String,
    pub process_supervisor_username: String,
    pub process_supervisor_password: String,
    pub log_level: String,
}

impl Config {
    /// Reads and validates configuration from a YAML file on disk.
    pub fn from_file(path: &str) -> Result<Self, AgentError> {
        if !Path::new(path).exists() {
            return Err(AgentError::Config(format!(
                "unable to find config file at path: {path}"
            )));
        }
        let contents = std::fs::read_to_string(path)?;
        let raw: RawConfig = serde_yaml::from_str(&contents)
            .map_err(|e| AgentError::Config(format!("unable to read config file: {e}")))?;
        Self::resolve(raw)
    }

    fn resolve(raw: RawConfig) -> Result<Self, AgentError> {
        let replication_mode = ReplicationMode::parse(
            &raw.replication_mode.unwrap_or_else(default_replication_mode),
        )?;

        let config = Config {
            host_address: raw.host_address.unwrap_or_default(),
            peer_address: raw.peer_address.unwrap_or_default(),
            data_dir: raw.data_dir.unwrap_or_default(),
            enable_heartbeats: raw.enable_heartbeats.unwrap_or(false),
            lf_state_dir: raw.lf_state_dir.unwrap_or_default(),
            replication_admin_user: raw.replication_admin_user.unwrap_or_default(),
            replication_admin_password: raw.replication_admin_password.unwrap_or_default(),
            replication_user: raw.replication_user.unwrap_or_default(),
            replication_password: raw.replication_password.unwrap_or_default(),
            replication_wait_timeout_in_seconds: raw
                .replication_wait_timeout_in_seconds
                .unwrap_or_else(default_replication_wait_seconds),
            replication_mode,
            port: raw.port.unwrap_or_else(default_port),
            http_authorization_username: raw.http_authorization_username.unwrap_or_default(),
            http_authorization_password: raw.http_authorization_password.unwrap_or_default(),
            streaming_backup_port: raw
                .streaming_backup_port
                .unwrap_or_else(default_streaming_backup_port),
            streaming_backup_http_username: raw
                .streaming_backup_http_username
                .unwrap_or_default(),
            streaming_backup_http_password: raw
                .streaming_backup_http_password
                .unwrap_or_default(),
            streaming_backup_ssl_common_name: raw
                .streaming_backup_ssl_common_name
                .unwrap_or_default(),
            streaming_backup_ca_cert_path: raw.streaming_backup_ca_cert_path.unwrap_or_default(),
            ssl_common_name: raw.ssl_common_name.unwrap_or_default(),
            ssl_server_cert_path: raw.ssl_server_cert_path.unwrap_or_default(),
            ssl_server_key_path: raw.ssl_server_key_path.unwrap_or_default(),
            ssl_client_cert_path: raw.ssl_client_cert_path.unwrap_or_default(),
            ssl_client_key_path: raw.ssl_client_key_path.unwrap_or_default(),
            ssl_ca_cert_path: raw.ssl_ca_cert_path.unwrap_or_default(),
            mysql_ca_cert_path: raw.mysql_ca_cert_path.unwrap_or_default(),
            process_supervisor_url: raw.process_supervisor_url.unwrap_or_default(),
            process_supervisor_username: raw.process_supervisor_username.unwrap_or_default(),
            process_supervisor_password: raw.process_supervisor_password.unwrap_or_default(),
            log_level: raw.log_level.unwrap_or_else(default_log_level),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AgentError> {
        if self.host_address.is_empty() {
            return Err(AgentError::Config("host_address must be set".into()));
        }
        if self.data_dir.is_empty() {
            return Err(AgentError::Config("data_dir must be set".into()));
        }
        if self.lf_state_dir.is_empty() {
            return Err(AgentError::Config("lf_state_dir must be set".into()));
        }
        if self.port == 0 {
            return Err(AgentError::Config("port must be non-zero".into()));
        }
        if self.replication_wait_timeout_in_seconds == 0 {
            tracing::warn!(
                "replication_wait_timeout_in_seconds is 0; waiters will time out immediately"
            );
        }
        if !self.ssl_server_cert_path.is_empty() && self.ssl_server_key_path.is_empty() {
            return Err(AgentError::Config(
                "ssl_server_key_path must be set when ssl_server_cert_path is set".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_raw() -> RawConfig {
        RawConfig {
            host_address: Some("10.0.0.1".into()),
            data_dir: Some("/var/lib/mysql".into()),
            lf_state_dir: Some("/var/lib/lf-agent".into()),
            ..Default::default()
        }
    }

    #[test]
    fn resolves_defaults() {
        let cfg = Config::resolve(minimal_raw()).unwrap();
        assert_eq!(cfg.port, 8443);
        assert_eq!(cfg.replication_mode, ReplicationMode::Async);
        assert_eq!(cfg.replication_wait_timeout_in_seconds, 300);
    }

    #[test]
    fn rejects_missing_host() {
        let mut raw = minimal_raw();
        raw.host_address = None;
        assert!(Config::resolve(raw).is_err());
    }

    #[test]
    fn rejects_bad_replication_mode() {
        let mut raw = minimal_raw();
        raw.replication_mode = Some("sync".into());
        assert!(Config::resolve(raw).is_err());
    }

    #[test]
    fn rejects_cert_without_key() {
        let mut raw = minimal_raw();
        raw.ssl_server_cert_path = Some("/etc/lf/server.crt".into());
        assert!(Config::resolve(raw).is_err());
    }
}
