//! Drives the `make-read-only` orchestrator command: freeze the local
//! instance, then make sure the follower has caught up if it is replicating.

use crate::client::{PeerClient, PeerOps};
use crate::errors::AgentError;
use tracing::info;

pub async fn make_read_only(local: &PeerClient, remote: &PeerClient) -> Result<(), AgentError> {
    local
        .make_read_only()
        .await
        .map_err(|e| e.wrap("make-read-only request failed"))?;

    let remote_status = remote
        .status()
        .await
        .map_err(|e| e.wrap("status request failed"))?;
    if !remote_status.replication_configured {
        info!("remote instance has no replication configured, nothing to sync");
        return Ok(());
    }

    let local_status = local
        .status()
        .await
        .map_err(|e| e.wrap("status request failed"))?;

    remote
        .sync(&local_status.gtid_executed)
        .await
        .map_err(|e| e.wrap("sync request failed"))?;
    Ok(())
}
