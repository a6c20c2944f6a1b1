//! Common filesystem utilities
//!
//! Shared by extraction and consumer cloning, which both reset a directory
//! before repopulating it.

use crate::core::error::{ProbeError, Result};
use std::path::Path;
use walkdir::WalkDir;

/// Ensure a directory exists, creating it and all ancestors if needed.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(ProbeError::fs("cannot create directory", path))
}

/// Make every entry under `root` writable by its owner.
///
/// Crate archives can unpack read-only files and directories, which
/// `remove_dir_all` refuses to delete on some platforms and cannot descend
/// into on others.
fn make_tree_writable(root: &Path) -> Result<()> {
    // Parents before children, so read-only directories open up first.
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            ProbeError::Fs {
                action: "cannot walk",
                path,
                source: e.into(),
            }
        })?;

        let file_type = entry.file_type();
        if file_type.is_symlink() {
            continue;
        }

        let metadata = entry
            .metadata()
            .map_err(|e| ProbeError::Fs {
                action: "cannot stat",
                path: entry.path().to_path_buf(),
                source: e.into(),
            })?;
        let mut perms = metadata.permissions();
        if !perms.readonly() && !file_type.is_dir() {
            continue;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = perms.mode();
            let wanted = if file_type.is_dir() { mode | 0o700 } else { mode | 0o200 };
            if wanted == mode {
                continue;
            }
            perms.set_mode(wanted);
        }
        #[cfg(not(unix))]
        {
            if !perms.readonly() {
                continue;
            }
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
        }

        std::fs::set_permissions(entry.path(), perms)
            .map_err(ProbeError::fs("cannot make writable", entry.path()))?;
    }
    Ok(())
}

/// Recursively delete a directory, forcing read-only entries writable first.
///
/// A missing directory is not an error.
pub fn remove_dir_all_force(path: &Path) -> Result<()> {
    if std::fs::symlink_metadata(path).is_err() {
        return Ok(());
    }
    make_tree_writable(path)?;
    std::fs::remove_dir_all(path).map_err(ProbeError::fs("cannot remove directory", path))
}

/// Reset `path` to an empty directory.
pub fn recreate_dir(path: &Path) -> Result<()> {
    remove_dir_all_force(path)?;
    ensure_dir(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn set_readonly(path: &Path) {
        let mut perms = std::fs::metadata(path).unwrap().permissions();
        perms.set_readonly(true);
        std::fs::set_permissions(path, perms).unwrap();
    }

    #[test]
    fn test_remove_missing_dir_is_ok() {
        let dir = TempDir::new().unwrap();
        assert!(remove_dir_all_force(&dir.path().join("nope")).is_ok());
    }

    #[test]
    fn test_remove_tree_with_readonly_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("ring-0.17.8");
        std::fs::create_dir_all(root.join("src")).unwrap();
        let file = root.join("src/lib.rs");
        std::fs::write(&file, "fn main() {}").unwrap();
        set_readonly(&file);
        set_readonly(&root.join("src"));

        remove_dir_all_force(&root).unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn test_recreate_dir_empties_contents() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("work");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("stale.txt"), "old").unwrap();

        recreate_dir(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    }
}
