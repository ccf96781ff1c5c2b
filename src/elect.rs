//! Elects a leader/follower pair from two observed instance statuses and
//! drives the transition through their peer clients.

use crate::client::PeerOps;
use crate::db::PeerStatus;
use crate::errors::AgentError;
use crate::gtid::GtidSet;
use tracing::info;

/// Decides which of two instances becomes leader. Does not call out over the
/// network; callers pass in freshly fetched statuses.
pub fn elect(statuses: &[PeerStatus; 2]) -> Result<usize, AgentError> {
    let writable: Vec<usize> = (0..2).filter(|&i| !statuses[i].read_only).collect();

    match writable.len() {
        2 => Err(AgentError::BothWritable),
        1 => {
            let leader_idx = writable[0];
            let follower_idx = 1 - leader_idx;
            if statuses[leader_idx].replication_configured {
                return Err(AgentError::ReplicationConfiguredOnLeader);
            }
            let leader_gtid = GtidSet::parse(&statuses[leader_idx].gtid_executed)
                .map_err(|e| AgentError::GtidFetchFailed(e.to_string()))?;
            let follower_gtid = GtidSet::parse(&statuses[follower_idx].gtid_executed)
                .map_err(|e| AgentError::GtidFetchFailed(e.to_string()))?;
            if !leader_gtid.contains(&follower_gtid) {
                return Err(AgentError::DivergedData);
            }
            Ok(leader_idx)
        }
        _ => elect_from_history(statuses),
    }
}

/// Both instances are read-only: partition by transaction history.
/// Instance0 wins ties, matching the orchestrator's observed behavior.
fn elect_from_history(statuses: &[PeerStatus; 2]) -> Result<usize, AgentError> {
    let gtids: Vec<Option<GtidSet>> = statuses
        .iter()
        .map(|s| GtidSet::parse(&s.gtid_executed).ok())
        .collect();

    for candidate in 0..2 {
        let other = 1 - candidate;
        if statuses[candidate].replication_configured {
            continue;
        }
        let Some(candidate_gtid) = &gtids[candidate] else {
            continue;
        };
        let Some(other_gtid) = &gtids[other] else {
            continue;
        };
        if candidate_gtid.contains(other_gtid) {
            return Ok(candidate);
        }
    }
    Err(AgentError::NoHistoryLeader)
}

/// Elects, and drives the follower-then-leader transition against the two
/// peer clients. `clients[i]` must correspond to `statuses[i]`.
///
/// When exactly one instance is writable, the statuses are re-fetched from
/// both peers before the GTID superset check: the caller's snapshot may
/// already be stale by the time the decision is made, and a promotion built
/// on a stale GTID comparison is exactly the data-divergence case this
/// function exists to prevent.
pub async fn configure_leader_follower<C: PeerOps>(
    clients: &[C; 2],
    statuses: [PeerStatus; 2],
) -> Result<(), AgentError> {
    let writable = (0..2).filter(|&i| !statuses[i].read_only).count();
    let statuses = if writable == 1 {
        [clients[0].status().await?, clients[1].status().await?]
    } else {
        statuses
    };

    let leader_idx = elect(&statuses)?;
    let follower_idx = 1 - leader_idx;

    info!(leader = leader_idx, follower = follower_idx, "election decided");

    clients[follower_idx].make_follower().await?;
    clients[leader_idx].make_leader(false).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReplicationMode;

    fn status(read_only: bool, replication_configured: bool, gtid: &str) -> PeerStatus {
        PeerStatus {
            ip_address: "h".into(),
            read_only,
            replication_configured,
            replication_mode: ReplicationMode::Async,
            gtid_executed: gtid.into(),
        }
    }

    #[test]
    fn both_writable_is_an_error() {
        let statuses = [status(false, false, ""), status(false, false, "")];
        assert!(matches!(elect(&statuses), Err(AgentError::BothWritable)));
    }

    #[test]
    fn one_writable_becomes_leader_when_superset() {
        let statuses = [
            status(false, false, "u:1-10"),
            status(true, true, "u:1-10"),
        ];
        assert_eq!(elect(&statuses).unwrap(), 0);
    }

    #[test]
    fn one_writable_but_replication_configured_errors() {
        let statuses = [
            status(false, true, "u:1-10"),
            status(true, true, "u:1-5"),
        ];
        assert!(matches!(
            elect(&statuses),
            Err(AgentError::ReplicationConfiguredOnLeader)
        ));
    }

    #[test]
    fn one_writable_but_diverged_errors() {
        let statuses = [
            status(false, false, "u:1-5"),
            status(true, true, "u:1-10"),
        ];
        assert!(matches!(elect(&statuses), Err(AgentError::DivergedData)));
    }

    #[test]
    fn both_empty_elects_instance0() {
        let statuses = [status(true, false, ""), status(true, false, "")];
        assert_eq!(elect(&statuses).unwrap(), 0);
    }

    #[test]
    fn both_readonly_elects_superset_holder() {
        let statuses = [
            status(true, false, "u:1-5"),
            status(true, false, "u:1-20"),
        ];
        assert_eq!(elect(&statuses).unwrap(), 1);
    }

    #[test]
    fn both_readonly_diverged_errors() {
        let statuses = [
            status(true, false, "u:1-20"),
            status(true, false, "u:1-10,v:1-10"),
        ];
        assert!(matches!(elect(&statuses), Err(AgentError::NoHistoryLeader)));
    }

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct FakePeer {
        status: PeerStatus,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl PeerOps for FakePeer {
        async fn make_leader(&self, _failover: bool) -> Result<(), AgentError> {
            self.calls.lock().push("make_leader");
            Ok(())
        }

        async fn make_follower(&self) -> Result<(), AgentError> {
            self.calls.lock().push("make_follower");
            Ok(())
        }

        async fn make_read_only(&self) -> Result<(), AgentError> {
            Ok(())
        }

        async fn sync(&self, _peer_gtid_executed: &str) -> Result<(), AgentError> {
            Ok(())
        }

        async fn status(&self) -> Result<PeerStatus, AgentError> {
            Ok(self.status.clone())
        }
    }

    #[tokio::test]
    async fn configure_leader_follower_calls_follower_before_leader() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let leader_status = status(false, false, "u:1-10");
        let follower_status = status(true, true, "u:1-10");
        let clients = [
            FakePeer {
                status: leader_status.clone(),
                calls: calls.clone(),
            },
            FakePeer {
                status: follower_status.clone(),
                calls: calls.clone(),
            },
        ];

        configure_leader_follower(&clients, [leader_status, follower_status])
            .await
            .unwrap();

        assert_eq!(*calls.lock(), vec!["make_follower", "make_leader"]);
    }
}
