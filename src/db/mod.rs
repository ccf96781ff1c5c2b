//! SQL adapter: the fixed catalogue of statements the agent issues against a
//! MySQL-protocol instance, translated into domain types.

use crate::config::{Config, ReplicationMode};
use crate::errors::AgentError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{MySqlPool, Row};
use std::time::Duration;
use tracing::{debug, info};

/// Snapshot of one database instance's replication-relevant state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerStatus {
    pub ip_address: String,
    pub read_only: bool,
    pub replication_configured: bool,
    pub replication_mode: ReplicationMode,
    pub gtid_executed: String,
}

impl PeerStatus {
    pub fn has_data(&self) -> bool {
        !self.gtid_executed.is_empty()
    }

    pub fn role(&self) -> Role {
        match (self.read_only, self.replication_configured) {
            (true, true) => Role::Follower,
            (false, false) => Role::Leader,
            _ => Role::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
    Unknown,
}

/// Connection-thread and applier-thread state, as reported by
/// `performance_schema.replication_connection_status` /
/// `replication_applier_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadState {
    On,
    Off,
    Connecting,
}

/// Capability the agent core depends on. Production code wires this to
/// [`MySqlDatabaseClient`]; tests substitute a fake.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    async fn status(&self) -> Result<PeerStatus, AgentError>;
    async fn make_read_only(&self) -> Result<(), AgentError>;
    async fn disable_replication_and_make_writable(&self, failover: bool) -> Result<(), AgentError>;
    async fn make_follower(&self, peer_address: &str) -> Result<(), AgentError>;
    async fn wait_for_replication_replay(&self) -> Result<(), AgentError>;
    async fn wait_for_received_transactions(&self, target_gtid: &str) -> Result<(), AgentError>;
    async fn wait_for_replication(&self) -> Result<(), AgentError>;
    async fn applier_and_connection_state(&self) -> Result<(Option<ThreadState>, Option<ThreadState>), AgentError>;
    async fn apply_gtid_purged(&self) -> Result<(), AgentError>;
    async fn toggle_heartbeats(&self) -> Result<(), AgentError>;
}

pub struct MySqlDatabaseClient {
    pool: MySqlPool,
    config: Config,
}

impl MySqlDatabaseClient {
    pub fn new(pool: MySqlPool, config: Config) -> Self {
        Self { pool, config }
    }

    async fn is_semi_sync_active(&self) -> Result<bool, AgentError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS cnt FROM information_schema.plugins \
             WHERE plugin_name IN ('rpl_semi_sync_master', 'rpl_semi_sync_slave') \
             AND plugin_status = 'ACTIVE'",
        )
        .fetch_one(&self.pool)
        .await?;
        let cnt: i64 = row.try_get("cnt")?;
        Ok(cnt > 0)
    }

    async fn thread_states(&self) -> Result<(Option<ThreadState>, Option<ThreadState>), AgentError> {
        let row = sqlx::query(
            "SELECT c.service_state AS conn_state, a.service_state AS applier_state \
             FROM performance_schema.replication_connection_status c \
             JOIN performance_schema.replication_applier_status a ON a.channel_name = c.channel_name \
             WHERE c.channel_name = ''",
        )
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok((None, None));
        };
        let conn: String = row.try_get("conn_state")?;
        let appl: String = row.try_get("applier_state")?;
        Ok((Some(parse_thread_state(&conn)), Some(parse_thread_state(&appl))))
    }

    async fn last_connect_error(&self) -> Result<String, AgentError> {
        let row = sqlx::query(
            "SELECT last_error_message FROM performance_schema.replication_connection_status \
             WHERE channel_name = ''",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row
            .and_then(|r| r.try_get::<String, _>("last_error_message").ok())
            .unwrap_or_default())
    }

    async fn last_applier_error(&self) -> Result<String, AgentError> {
        let row = sqlx::query(
            "SELECT last_error_message FROM performance_schema.replication_applier_status_by_worker \
             WHERE channel_name = '' ORDER BY worker_id LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row
            .and_then(|r| r.try_get::<String, _>("last_error_message").ok())
            .unwrap_or_default())
    }
}

fn parse_thread_state(s: &str) -> ThreadState {
    match s {
        "ON" => ThreadState::On,
        "CONNECTING" => ThreadState::Connecting,
        _ => ThreadState::Off,
    }
}

#[async_trait]
impl DatabaseClient for MySqlDatabaseClient {
    async fn status(&self) -> Result<PeerStatus, AgentError> {
        let gtid_row = sqlx::query("SELECT @@global.gtid_executed AS gtid")
            .fetch_one(&self.pool)
            .await?;
        let gtid_executed: String = gtid_row.try_get("gtid")?;

        let ro_row = sqlx::query("SELECT @@global.super_read_only AS ro")
            .fetch_one(&self.pool)
            .await?;
        let read_only: i64 = ro_row.try_get("ro")?;

        let (conn_state, _) = self.thread_states().await?;
        let replication_configured = conn_state.is_some();

        let replication_mode = if self.is_semi_sync_active().await? {
            ReplicationMode::SemiSync
        } else {
            ReplicationMode::Async
        };

        Ok(PeerStatus {
            ip_address: self.config.host_address.clone(),
            read_only: read_only != 0,
            replication_configured,
            replication_mode,
            gtid_executed,
        })
    }

    async fn make_read_only(&self) -> Result<(), AgentError> {
        sqlx::query("SET GLOBAL super_read_only = ON")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn disable_replication_and_make_writable(&self, failover: bool) -> Result<(), AgentError> {
        sqlx::query("STOP SLAVE").execute(&self.pool).await?;
        sqlx::query("RESET SLAVE ALL").execute(&self.pool).await?;
        sqlx::query("SET GLOBAL read_only = OFF")
            .execute(&self.pool)
            .await?;
        if self.config.replication_mode == ReplicationMode::SemiSync && !failover {
            sqlx::query("SET GLOBAL rpl_semi_sync_master_enabled = ON")
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn make_follower(&self, peer_address: &str) -> Result<(), AgentError> {
        sqlx::query("STOP SLAVE").execute(&self.pool).await?;
        sqlx::query("RESET SLAVE ALL").execute(&self.pool).await?;

        let use_ca = !self.config.mysql_ca_cert_path.is_empty()
            && std::fs::metadata(&self.config.mysql_ca_cert_path)
                .map(|m| m.len() > 0)
                .unwrap_or(false);

        let mut stmt = String::from(
            "CHANGE MASTER TO MASTER_HOST = ?, MASTER_USER = ?, MASTER_PASSWORD = ?, \
             MASTER_AUTO_POSITION = 1, MASTER_SSL = 1, MASTER_TLS_VERSION = 'TLSv1.2'",
        );
        if use_ca {
            stmt.push_str(", MASTER_SSL_CA = ?, MASTER_SSL_VERIFY_SERVER_CERT = 0");
        }
        let mut query = sqlx::query(&stmt)
            .bind(peer_address)
            .bind(&self.config.replication_user)
            .bind(&self.config.replication_password);
        if use_ca {
            query = query.bind(&self.config.mysql_ca_cert_path);
        }
        query.execute(&self.pool).await?;
        sqlx::query("START SLAVE").execute(&self.pool).await?;
        Ok(())
    }

    async fn wait_for_replication_replay(&self) -> Result<(), AgentError> {
        let timeout = self.config.replication_wait_timeout_in_seconds;
        let row = sqlx::query(
            "SELECT received_transaction_set FROM performance_schema.replication_connection_status \
             WHERE channel_name = ''",
        )
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(());
        };
        let received: String = row.try_get("received_transaction_set")?;
        if received.is_empty() {
            return Ok(());
        }
        let row = sqlx::query("SELECT WAIT_FOR_EXECUTED_GTID_SET(?, ?) AS result")
            .bind(&received)
            .bind(timeout as i64)
            .fetch_one(&self.pool)
            .await?;
        let result: i64 = row.try_get("result")?;
        if result != 0 {
            return Err(AgentError::TimedOutWaitingForReplay(timeout));
        }
        Ok(())
    }

    async fn wait_for_received_transactions(&self, target_gtid: &str) -> Result<(), AgentError> {
        let timeout = self.config.replication_wait_timeout_in_seconds;
        let mut elapsed = 0u64;
        loop {
            let row = sqlx::query(
                "SELECT GTID_SUBSET(?, CONCAT_WS(',', @@global.gtid_executed, \
                 received_transaction_set)) AS subset \
                 FROM performance_schema.replication_connection_status WHERE channel_name = ''",
            )
            .bind(target_gtid)
            .fetch_optional(&self.pool)
            .await;

            match row {
                Ok(None) => {
                    return Err(AgentError::ReplicationNotConfigured);
                }
                Ok(Some(row)) => {
                    let subset: i64 = row.try_get("subset").unwrap_or(0);
                    if subset != 0 {
                        return Ok(());
                    }
                }
                Err(e) => {
                    debug!("transient error polling received transactions: {e}");
                }
            }

            if elapsed >= timeout {
                return Err(AgentError::TimedOutWaitingForReceived(target_gtid.to_string()));
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
            elapsed += 1;
        }
    }

    async fn wait_for_replication(&self) -> Result<(), AgentError> {
        let timeout = self.config.replication_wait_timeout_in_seconds;
        let mut elapsed = 0u64;
        loop {
            let (conn, appl) = self.thread_states().await?;
            let (Some(conn), Some(appl)) = (conn, appl) else {
                return Err(AgentError::ReplicationNotConfigured);
            };
            match (&conn, &appl) {
                (ThreadState::On, ThreadState::On) => return Ok(()),
                (ThreadState::Connecting, ThreadState::On) => {}
                _ => {
                    if elapsed >= timeout {
                        let connection = self.last_connect_error().await.unwrap_or_default();
                        let applier = self.last_applier_error().await.unwrap_or_default();
                        return Err(AgentError::UnhealthyReplication { connection, applier });
                    }
                }
            }
            if elapsed >= timeout {
                return Err(AgentError::TimedOutWaitingForHealthyReplication);
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
            elapsed += 1;
        }
    }

    async fn applier_and_connection_state(&self) -> Result<(Option<ThreadState>, Option<ThreadState>), AgentError> {
        self.thread_states().await
    }

    async fn apply_gtid_purged(&self) -> Result<(), AgentError> {
        let path = format!("{}/xtrabackup_binlog_info", self.config.data_dir);
        let contents = std::fs::read_to_string(&path)?;
        let fields: Vec<&str> = contents.split_whitespace().collect();
        if fields.len() < 3 {
            return Err(AgentError::GtidPurgedNotFound);
        }
        let gtid_purged = fields[2].trim();

        sqlx::query("RESET MASTER").execute(&self.pool).await?;
        sqlx::query("SET GLOBAL gtid_purged = ?")
            .bind(gtid_purged)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn toggle_heartbeats(&self) -> Result<(), AgentError> {
        if !self.config.enable_heartbeats {
            return Ok(());
        }
        sqlx::query("CREATE DATABASE IF NOT EXISTS replication_monitoring")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS replication_monitoring.heartbeat ( \
             server_id INT UNSIGNED NOT NULL PRIMARY KEY, \
             ts TIMESTAMP(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6) ON UPDATE CURRENT_TIMESTAMP(6))",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "REPLACE INTO replication_monitoring.heartbeat (server_id) VALUES (@@global.server_id)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE EVENT IF NOT EXISTS replication_monitoring.heartbeat_event \
             ON SCHEDULE EVERY 5 SECOND DISABLE DO \
             UPDATE replication_monitoring.heartbeat SET ts = CURRENT_TIMESTAMP(6) \
             WHERE @@global.read_only = 0",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("ALTER EVENT replication_monitoring.heartbeat_event ENABLE")
            .execute(&self.pool)
            .await?;
        info!("heartbeat event enabled");
        Ok(())
    }
}

/// Builds the pooled MySQL connection used by the agent.
pub async fn connect(dsn: &str) -> Result<MySqlPool, AgentError> {
    let pool = sqlx::mysql::MySqlPoolOptions::new()
        .max_connections(8)
        .acquire_timeout(Duration::from_secs(10))
        .connect(dsn)
        .await?;
    Ok(pool)
}
