//! File operation handlers: Op::WriteFile, Op::RemoveFile, Op::Symlink

use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Handle Op::WriteFile: Write a file with content
pub fn handle_writefile(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Handle Op::RemoveFile: `rm -f`
pub fn handle_remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

/// Handle Op::Symlink: Create a symlink
///
/// An existing link or file at `link` is replaced. An existing directory is
/// an error rather than getting the link created inside it.
pub fn handle_symlink(link: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    if link.is_symlink() || link.exists() {
        fs::remove_file(link)
            .with_context(|| format!("Failed to replace {}", link.display()))?;
    }
    std::os::unix::fs::symlink(target, link).with_context(|| {
        format!(
            "Failed to link {} -> {}",
            link.display(),
            target.display()
        )
    })?;
    Ok(())
}
