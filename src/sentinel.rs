//! Sentinel file lifecycle: a small marker at `<lf_state_dir>/leader.cnf`
//! advertising whether this node intends to be a writable leader.

use crate::config::{Config, ReplicationMode};
use crate::errors::AgentError;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

fn sentinel_path(config: &Config) -> PathBuf {
    PathBuf::from(&config.lf_state_dir).join("leader.cnf")
}

/// Writes the sentinel file mode 0600, atomically via write-then-rename.
pub fn write_leader_sentinel(config: &Config, failover: bool) -> Result<(), AgentError> {
    let mut contents = String::from("[mysqld]\nsuper-read-only = OFF\n");
    if config.replication_mode == ReplicationMode::SemiSync && !failover {
        contents.push_str("loose-rpl-semi-sync-master-enabled = ON\n");
    }

    let path = sentinel_path(config);
    let tmp_path = path.with_extension("cnf.tmp");
    {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(contents.as_bytes())?;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// Removes the sentinel file. Absence is not an error.
pub fn remove_leader_sentinel(config: &Config) -> Result<(), AgentError> {
    match std::fs::remove_file(sentinel_path(config)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt as _;

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            host_address: "h".into(),
            peer_address: String::new(),
            data_dir: String::new(),
            enable_heartbeats: false,
            lf_state_dir: dir.to_string_lossy().into_owned(),
            replication_admin_user: String::new(),
            replication_admin_password: String::new(),
            replication_user: String::new(),
            replication_password: String::new(),
            replication_wait_timeout_in_seconds: 1,
            replication_mode: ReplicationMode::SemiSync,
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

    #[test]
    fn writes_and_removes_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        write_leader_sentinel(&config, false).unwrap();
        let path = sentinel_path(&config);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[mysqld]"));
        assert!(contents.contains("super-read-only = OFF"));
        assert!(contents.contains("loose-rpl-semi-sync-master-enabled = ON"));

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        remove_leader_sentinel(&config).unwrap();
        assert!(!path.exists());

        // Removing again is not an error.
        remove_leader_sentinel(&config).unwrap();
    }

    #[test]
    fn failover_skips_semi_sync_directive() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_leader_sentinel(&config, true).unwrap();
        let contents = std::fs::read_to_string(sentinel_path(&config)).unwrap();
        assert!(!contents.contains("semi-sync"));
    }
}
