//! Small filesystem helpers shared by jumpstart and the purger.

use crate::errors::AgentError;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Removes `dir` (if present) and recreates it empty, mode 0700.
pub fn clean_directory(dir: &str) -> Result<(), AgentError> {
    let path = Path::new(dir);
    if path.exists() {
        std::fs::remove_dir_all(path)?;
    }
    std::fs::create_dir_all(path)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recreates_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("data");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("stale.ibd"), b"x").unwrap();

        clean_directory(target.to_str().unwrap()).unwrap();

        let entries: Vec<_> = std::fs::read_dir(&target).unwrap().collect();
        assert!(entries.is_empty());
    }
}
