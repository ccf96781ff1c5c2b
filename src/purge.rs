//! Age-based deletion of files in a single directory (non-recursive).
//!
//! The upstream implementation this was ported from compared modification
//! times backwards and deleted the *newest* files instead of the oldest.
//! This keeps files with `mtime >= cutoff` and deletes everything older,
//! which is the behavior operators actually want from a log purger.

use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::warn;

/// Runs a single purge pass over `dir`, deleting entries older than
/// `max_age`. Per-file failures are logged and counted but do not abort the
/// pass. Returns the number of files deleted.
pub fn purge_once(dir: &str, max_age: Duration) -> std::io::Result<usize> {
    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut deleted = 0;
    for entry in std::fs::read_dir(Path::new(dir))? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("failed to read directory entry in '{dir}': {e}");
                continue;
            }
        };
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!("failed to stat '{}': {e}", path.display());
                continue;
            }
        };
        let modified = match metadata.modified() {
            Ok(m) => m,
            Err(e) => {
                warn!("failed to read mtime of '{}': {e}", path.display());
                continue;
            }
        };
        if modified < cutoff {
            match std::fs::remove_file(&path) {
                Ok(()) => deleted += 1,
                Err(e) => warn!("failed to delete '{}': {e}", path.display()),
            }
        }
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::UNIX_EPOCH;

    fn set_mtime(path: &Path, when: SystemTime) {
        let ft = filetime::FileTime::from_system_time(when);
        filetime::set_file_mtime(path, ft).unwrap();
    }

    #[test]
    fn deletes_only_files_older_than_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.log");
        let fresh = dir.path().join("fresh.log");
        File::create(&old).unwrap();
        File::create(&fresh).unwrap();

        set_mtime(&old, UNIX_EPOCH + Duration::from_secs(1));
        set_mtime(&fresh, SystemTime::now());

        let deleted = purge_once(dir.path().to_str().unwrap(), Duration::from_secs(86400)).unwrap();

        assert_eq!(deleted, 1);
        assert!(!old.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("subdir");
        std::fs::create_dir(&sub).unwrap();
        set_mtime(&sub, UNIX_EPOCH);

        let deleted = purge_once(dir.path().to_str().unwrap(), Duration::from_secs(1)).unwrap();
        assert_eq!(deleted, 0);
        assert!(sub.exists());
    }
}
