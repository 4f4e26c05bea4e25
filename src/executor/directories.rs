//! Directory operation handlers: Op::Dirs, Op::RemoveTree

use anyhow::{bail, Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Handle Op::Dirs: Create multiple directories
pub fn handle_dirs(paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
    }
    Ok(())
}

/// Handle Op::RemoveTree: `rm -rf --one-file-system`
///
/// Never descends into a directory on another filesystem; a mount point
/// inside the tree makes the removal fail instead. A missing path is not an
/// error.
pub fn handle_remove_tree(root: &Path) -> Result<()> {
    let md = match fs::symlink_metadata(root) {
        Ok(md) => md,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to stat {}", root.display()));
        }
    };
    if !md.is_dir() {
        fs::remove_file(root)
            .with_context(|| format!("Failed to remove {}", root.display()))?;
        return Ok(());
    }

    for entry in WalkDir::new(root)
        .follow_links(false)
        .same_file_system(true)
        .contents_first(true)
    {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        let path = entry.path();
        let result = if entry.file_type().is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        };
        match result {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) if entry.file_type().is_dir() && path != root && is_mount_point(path) => {
                bail!(
                    "refusing to cross filesystem boundary at {}: {}",
                    path.display(),
                    e
                );
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to remove {}", path.display()));
            }
        }
    }
    Ok(())
}

fn is_mount_point(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let parent = match path.parent() {
        Some(parent) => parent,
        None => return false,
    };
    match (fs::symlink_metadata(path), fs::symlink_metadata(parent)) {
        (Ok(a), Ok(b)) => a.dev() != b.dev(),
        _ => false,
    }
}
