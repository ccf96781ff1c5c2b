//! Bootstraps an empty follower by copying a snapshot from the leader.
//!
//! `prepare()` stops the supervised process and empties the data directory;
//! `perform()` streams the backup in, replays it, restarts the process, and
//! applies the purged GTID set so replication can resume from the right spot.

use crate::backup::BackupClient;
use crate::config::Config;
use crate::db::DatabaseClient;
use crate::errors::AgentError;
use crate::fs_util::clean_directory;
use crate::supervisor::SupervisorClient;
use async_trait::async_trait;
use std::process::Command;
use std::sync::Arc;
use tracing::info;

const DB_PROCESS_NAME: &str = "mysqld";

#[async_trait]
pub trait Jumpstart: Send + Sync {
    async fn prepare(&self) -> Result<(), AgentError>;
    async fn perform(&self) -> Result<(), AgentError>;
}

pub struct CommandRunner;

impl CommandRunner {
    /// Runs the storage engine's backup-prepare tool against the data
    /// directory, folding any output into the error on failure.
    pub fn apply_log(&self, data_dir: &str) -> Result<(), AgentError> {
        let output = Command::new("xtrabackup")
            .args(["--prepare", "--target-dir", data_dir])
            .output()?;
        if !output.status.success() {
            return Err(AgentError::Jumpstart(format!(
                "xtrabackup --prepare failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }
}

pub struct AgentJumpstart {
    config: Config,
    db: Arc<dyn DatabaseClient>,
    supervisor: SupervisorClient,
    runner: CommandRunner,
}

impl AgentJumpstart {
    pub fn new(config: Config, db: Arc<dyn DatabaseClient>) -> Self {
        let supervisor = SupervisorClient::new(&config);
        Self {
            config,
            db,
            supervisor,
            runner: CommandRunner,
        }
    }
}

#[async_trait]
impl Jumpstart for AgentJumpstart {
    async fn prepare(&self) -> Result<(), AgentError> {
        info!("jumpstart: stopping {DB_PROCESS_NAME} before wiping data directory");
        self.supervisor.stop(DB_PROCESS_NAME).await?;
        clean_directory(&self.config.data_dir)?;
        Ok(())
    }

    async fn perform(&self) -> Result<(), AgentError> {
        let backup = BackupClient::new(&self.config)?;
        backup.stream_into(&self.config.data_dir).await?;
        self.runner.apply_log(&self.config.data_dir)?;
        self.supervisor.start(DB_PROCESS_NAME).await?;
        self.db.apply_gtid_purged().await?;
        info!("jumpstart complete");
        Ok(())
    }
}
