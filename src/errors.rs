//! The primary error type used across the agent, HTTP layers, and CLIs.

use thiserror::Error;

/// All failures that can surface from agent operations.
///
/// `thiserror` gives us `Display`/`std::error::Error` plus `From` conversions
/// for the handful of upstream error types we actually cross.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid GTID set: {0}")]
    InvalidGtid(String),

    #[error("[{status}] {message}")]
    PeerResponse { status: u16, message: String },

    #[error("unexpected response from API")]
    UnexpectedResponse,

    #[error("failed to decode response: {0}")]
    DecodeResponse(String),

    #[error(
        "Replication settings exist on this instance and Slave SQL Thread is turned off. Refusing to promote to avoid data divergence"
    )]
    ApplierStopped,

    #[error(
        "Leader VM is still accessible from the follower. Refusing to promote to avoid data divergence"
    )]
    LeaderStillReachable,

    #[error("replication is not configured on this instance")]
    ReplicationNotConfigured,

    #[error("timed out waiting for received transactions: {0}")]
    TimedOutWaitingForReceived(String),

    #[error("timed out waiting for executed gtid set after {0} seconds")]
    TimedOutWaitingForReplay(u64),

    #[error("Timeout waiting for healthy replication state")]
    TimedOutWaitingForHealthyReplication,

    #[error("replication connection error: {connection}; applier error: {applier}")]
    UnhealthyReplication { connection: String, applier: String },

    #[error("gtid_purged not found in xtrabackup_binlog_info")]
    GtidPurgedNotFound,

    #[error(
        "Both mysql instances are writable. Please ensure no divergent data and set one instance to read-only mode before running this command"
    )]
    BothWritable,

    #[error(
        "Both instances are in an unexpected state. Replication is configured on the leader"
    )]
    ReplicationConfiguredOnLeader,

    #[error(
        "Unable to determine leader and follower. Error fetching GTIDs from leader/follower: {0}"
    )]
    GtidFetchFailed(String),

    #[error(
        "Unable to determine leader and follower. Leader and follower data have diverged"
    )]
    DivergedData,

    #[error(
        "Unable to determine leader and follower based on transaction history. No instance has a transaction history that is a superset of the other's"
    )]
    NoHistoryLeader,

    #[error("failover must be specified")]
    FailoverNotSpecified,

    #[error("peer gtid executed not provided")]
    PeerGtidNotProvided,

    #[error("{operation}: {source}")]
    Wrapped {
        operation: &'static str,
        #[source]
        source: Box<AgentError>,
    },

    #[error("process supervisor error: {0}")]
    Supervisor(String),

    #[error("jumpstart failed: {0}")]
    Jumpstart(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Wraps this error with an operation tag, mirroring the peer client's
    /// "make-leader request failed: ..." style of contextualized errors.
    pub fn wrap(self, operation: &'static str) -> AgentError {
        AgentError::Wrapped {
            operation,
            source: Box::new(self),
        }
    }
}
