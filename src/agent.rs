//! Agent core: the operation surface the HTTP server dispatches into.
//!
//! There is no in-memory role variable here. The truth lives in the database
//! and in the sentinel file; every operation re-derives what it needs.

use crate::db::{DatabaseClient, PeerStatus, ThreadState};
use crate::errors::AgentError;
use crate::jumpstart::Jumpstart;
use crate::sentinel::{remove_leader_sentinel, write_leader_sentinel};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;

#[async_trait]
pub trait Agent: Send + Sync {
    async fn mysql_status(&self) -> Result<PeerStatus, AgentError>;
    async fn check_if_promotable(&self) -> Result<(), AgentError>;
    async fn make_leader(&self, failover: bool) -> Result<(), AgentError>;
    async fn make_follower(&self) -> Result<(), AgentError>;
    async fn make_read_only(&self) -> Result<(), AgentError>;
    async fn sync(&self, peer_gtid_executed: &str) -> Result<(), AgentError>;
    async fn toggle_heartbeats(&self) -> Result<(), AgentError>;
}

pub struct MysqlAgent {
    config: Config,
    db: Arc<dyn DatabaseClient>,
    jumpstart: Arc<dyn Jumpstart>,
}

impl MysqlAgent {
    pub fn new(config: Config, db: Arc<dyn DatabaseClient>, jumpstart: Arc<dyn Jumpstart>) -> Self {
        Self { config, db, jumpstart }
    }
}

#[async_trait]
impl Agent for MysqlAgent {
    async fn mysql_status(&self) -> Result<PeerStatus, AgentError> {
        self.db.status().await
    }

    async fn check_if_promotable(&self) -> Result<(), AgentError> {
        let (connection, applier) = self.db.applier_and_connection_state().await?;
        if let Some(ThreadState::Off) = applier {
            return Err(AgentError::ApplierStopped);
        }
        if let Some(ThreadState::On) = connection {
            return Err(AgentError::LeaderStillReachable);
        }
        Ok(())
    }

    async fn make_leader(&self, failover: bool) -> Result<(), AgentError> {
        info!(failover, "promoting instance to leader");
        self.db.wait_for_replication_replay().await?;
        self.db.disable_replication_and_make_writable(failover).await?;
        write_leader_sentinel(&self.config, failover)?;
        Ok(())
    }

    async fn make_follower(&self) -> Result<(), AgentError> {
        info!("demoting instance to follower");
        self.make_read_only().await?;

        let status = self.db.status().await?;
        if status.has_data() {
            info!("data found on instance, skipping jumpstart");
        } else {
            info!("no data found, copying from leader");
            self.jumpstart.prepare().await?;
            self.jumpstart.perform().await?;
        }

        self.db.make_follower(&self.config.peer_address).await?;
        self.db.wait_for_replication().await?;
        Ok(())
    }

    async fn make_read_only(&self) -> Result<(), AgentError> {
        self.db.make_read_only().await?;
        remove_leader_sentinel(&self.config)?;
        Ok(())
    }

    async fn sync(&self, peer_gtid_executed: &str) -> Result<(), AgentError> {
        self.db.wait_for_received_transactions(peer_gtid_executed).await
    }

    async fn toggle_heartbeats(&self) -> Result<(), AgentError> {
        self.db.toggle_heartbeats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReplicationMode;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            host_address: "h".into(),
            peer_address: "peer".into(),
            data_dir: String::new(),
            enable_heartbeats: false,
            lf_state_dir: dir.to_string_lossy().into_owned(),
            replication_admin_user: String::new(),
            replication_admin_password: String::new(),
            replication_user: String::new(),
            replication_password: String::new(),
            replication_wait_timeout_in_seconds: 1,
            replication_mode: ReplicationMode::Async,
            port: 1,
            http_authorization_username: String::new(),
            http_authorization_password: String::new(),
            streaming_backup_port: 1,
            streaming_backup_http_username: String::new(),
            streaming_backup_http_password: String::new(),
            streaming_backup_ssl_common_name: String::new(),
            streaming_backup_ca_cert_path: String::new(),
            ssl_common_name: String::new(),
            ssl_server_cert_path: String::new(),
            ssl_server_key_path: String::new(),
            ssl_client_cert_path: String::new(),
            ssl_client_key_path: String::new(),
            ssl_ca_cert_path: String::new(),
            mysql_ca_cert_path: String::new(),
            process_supervisor_url: String::new(),
            process_supervisor_username: String::new(),
            process_supervisor_password: String::new(),
            log_level: "info".into(),
        }
    }

    struct FakeDb {
        status: PeerStatus,
        applier: Option<ThreadState>,
        connection: Option<ThreadState>,
        read_only_calls: Mutex<u32>,
    }

    #[async_trait]
    impl DatabaseClient for FakeDb {
        async fn status(&self) -> Result<PeerStatus, AgentError> {
            Ok(self.status.clone())
        }
        async fn make_read_only(&self) -> Result<(), AgentError> {
            *self.read_only_calls.lock() += 1;
            Ok(())
        }
        async fn disable_replication_and_make_writable(&self, _failover: bool) -> Result<(), AgentError> {
            Ok(())
        }
        async fn make_follower(&self, _peer_address: &str) -> Result<(), AgentError> {
            Ok(())
        }
        async fn wait_for_replication_replay(&self) -> Result<(), AgentError> {
            Ok(())
        }
        async fn wait_for_received_transactions(&self, _target_gtid: &str) -> Result<(), AgentError> {
            Ok(())
        }
        async fn wait_for_replication(&self) -> Result<(), AgentError> {
            Ok(())
        }
        async fn applier_and_connection_state(&self) -> Result<(Option<ThreadState>, Option<ThreadState>), AgentError> {
            Ok((self.connection.clone(), self.applier.clone()))
        }
        async fn apply_gtid_purged(&self) -> Result<(), AgentError> {
            Ok(())
        }
        async fn toggle_heartbeats(&self) -> Result<(), AgentError> {
            Ok(())
        }
    }

    struct NoopJumpstart;

    #[async_trait]
    impl Jumpstart for NoopJumpstart {
        async fn prepare(&self) -> Result<(), AgentError> {
            Ok(())
        }
        async fn perform(&self) -> Result<(), AgentError> {
            Ok(())
        }
    }

    fn status(read_only: bool, gtid: &str) -> PeerStatus {
        PeerStatus {
            ip_address: "h".into(),
            read_only,
            replication_configured: false,
            replication_mode: ReplicationMode::Async,
            gtid_executed: gtid.into(),
        }
    }

    #[tokio::test]
    async fn make_leader_writes_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let db = Arc::new(FakeDb {
            status: status(false, "u:1-10"),
            applier: Some(ThreadState::On),
            connection: Some(ThreadState::Off),
            read_only_calls: Mutex::new(0),
        });
        let agent = MysqlAgent::new(config.clone(), db, Arc::new(NoopJumpstart));

        agent.make_leader(false).await.unwrap();

        let sentinel = dir.path().join("leader.cnf");
        assert!(sentinel.exists());
        let contents = std::fs::read_to_string(sentinel).unwrap();
        assert!(contents.contains("super-read-only = OFF"));
    }

    #[tokio::test]
    async fn check_if_promotable_rejects_stopped_applier() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let db = Arc::new(FakeDb {
            status: status(true, ""),
            applier: Some(ThreadState::Off),
            connection: None,
            read_only_calls: Mutex::new(0),
        });
        let agent = MysqlAgent::new(config, db, Arc::new(NoopJumpstart));
        let err = agent.check_if_promotable().await.unwrap_err();
        assert!(matches!(err, AgentError::ApplierStopped));
    }

    #[tokio::test]
    async fn check_if_promotable_rejects_reachable_leader() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let db = Arc::new(FakeDb {
            status: status(true, ""),
            applier: Some(ThreadState::On),
            connection: Some(ThreadState::On),
            read_only_calls: Mutex::new(0),
        });
        let agent = MysqlAgent::new(config, db, Arc::new(NoopJumpstart));
        let err = agent.check_if_promotable().await.unwrap_err();
        assert!(matches!(err, AgentError::LeaderStillReachable));
    }

    #[tokio::test]
    async fn make_follower_skips_jumpstart_when_data_present() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let db = Arc::new(FakeDb {
            status: status(true, "u:1-5"),
            applier: Some(ThreadState::On),
            connection: Some(ThreadState::On),
            read_only_calls: Mutex::new(0),
        });
        let agent = MysqlAgent::new(config, db.clone(), Arc::new(NoopJumpstart));
        agent.make_follower().await.unwrap();
        assert_eq!(*db.read_only_calls.lock(), 1);
    }

    #[tokio::test]
    async fn make_read_only_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let db = Arc::new(FakeDb {
            status: status(true, ""),
            applier: None,
            connection: None,
            read_only_calls: Mutex::new(0),
        });
        let agent = MysqlAgent::new(config, db, Arc::new(NoopJumpstart));
        agent.make_read_only().await.unwrap();
        agent.make_read_only().await.unwrap();
    }
}
