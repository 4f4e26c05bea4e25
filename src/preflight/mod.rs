//! Preflight checks for build validation.
//!
//! Validates that the host has the cross toolchain and autotools, and that
//! the upstream component's archive exists, before anything is touched.
//! This prevents cryptic errors halfway through a configure run.
//!
//! # Example
//!
//! ```rust
//! use rygel_builder::preflight::{command_exists, check_required_tools};
//!
//! if !command_exists("autoreconf") {
//!     println!("autoconf not installed");
//! }
//!
//! let tools = vec![("make".to_string(), "make".to_string())];
//! if let Err(e) = check_required_tools(&tools) {
//!     eprintln!("{}", e);
//! }
//! ```

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::config::BuildConfig;
use crate::process;

/// Check if a command exists on the host system.
pub fn command_exists(cmd: &str) -> bool {
    process::exists(cmd)
}

/// Host tools every build needs, as (command_name, package_name).
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("git", "git"),
    ("make", "make"),
    ("autoreconf", "autoconf"),
    ("automake", "automake"),
    ("libtoolize", "libtool"),
    ("pkg-config", "pkg-config"),
    ("valac", "valac"),
];

/// [`REQUIRED_TOOLS`] plus the cross compiler for `config.host`.
pub fn required_tools(config: &BuildConfig) -> Vec<(String, String)> {
    let mut tools: Vec<(String, String)> = REQUIRED_TOOLS
        .iter()
        .map(|(t, p)| (t.to_string(), p.to_string()))
        .collect();
    let host = &config.host;
    tools.push((format!("{host}-gcc"), format!("gcc-{host}")));
    tools
}

/// Check that specific tools are available.
///
/// # Returns
///
/// * `Ok(())` if all tools are found
/// * `Err` with list of missing tools and their packages
pub fn check_required_tools(tools: &[(String, String)]) -> Result<()> {
    let missing: Vec<String> = tools
        .iter()
        .filter(|(tool, _)| !command_exists(tool))
        .map(|(t, p)| format!("  {} (install: {})", t, p))
        .collect();

    if !missing.is_empty() {
        bail!("Missing required host tools:\n{}", missing.join("\n"));
    }
    Ok(())
}

/// Fail unless every upstream artifact exists.
pub fn require_upstream_artifacts(artifacts: &[PathBuf]) -> Result<()> {
    let missing: Vec<String> = artifacts
        .iter()
        .filter(|p| !p.is_file())
        .map(|p| format!("  {}", p.display()))
        .collect();

    if !missing.is_empty() {
        bail!(
            "Missing upstream artifacts (build the required components first):\n{}",
            missing.join("\n")
        );
    }
    Ok(())
}

/// Check that repositories are checked out.
pub fn require_checkouts(repos: &[PathBuf]) -> Result<()> {
    let missing: Vec<String> = repos
        .iter()
        .filter(|repo| !repo.join("autogen.sh").is_file())
        .map(|repo| format!("  {} (no autogen.sh)", repo.display()))
        .collect();

    if !missing.is_empty() {
        bail!("Source checkouts missing:\n{}", missing.join("\n"));
    }
    Ok(())
}

/// Everything `check` reports, collected into one error.
pub fn check_all(config: &BuildConfig) -> Result<()> {
    let problems: Vec<String> = [
        check_required_tools(&required_tools(config)),
        require_checkouts(&config.repos),
        require_upstream_artifacts(&config.requires_artifacts),
    ]
    .into_iter()
    .filter_map(|r| r.err().map(|e| e.to_string()))
    .collect();

    if !problems.is_empty() {
        bail!("{}", problems.join("\n"));
    }
    Ok(())
}

/// True when `target` exists and is at least as new as every input.
pub fn is_up_to_date(target: &Path, inputs: &[PathBuf]) -> Result<bool> {
    let target_time = match modified(target)? {
        Some(time) => time,
        None => return Ok(false),
    };
    for input in inputs {
        match modified(input)? {
            Some(time) if time <= target_time => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}

fn modified(path: &Path) -> Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(md) => md
            .modified()
            .map(Some)
            .with_context(|| format!("reading mtime of {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading metadata of {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_command_exists() {
        assert!(command_exists("ls"));
        assert!(!command_exists("definitely_not_a_real_command_12345"));
    }

    #[test]
    fn test_check_required_tools_failure_lists_package() {
        let tools = vec![
            ("ls".to_string(), "coreutils".to_string()),
            ("nonexistent_command_xyz".to_string(), "fake-package".to_string()),
        ];
        let err = check_required_tools(&tools).unwrap_err().to_string();
        assert!(err.contains("nonexistent_command_xyz (install: fake-package)"));
        assert!(!err.contains("coreutils"));
    }

    #[test]
    fn test_required_tools_include_cross_compiler() {
        let config = BuildConfig::defaults(Path::new("/pkg")).unwrap();
        let tools = required_tools(&config);
        assert!(tools
            .iter()
            .any(|(t, _)| t == "arm-linux-gnueabihf-gcc"));
    }

    #[test]
    fn test_require_upstream_artifacts() {
        let temp = TempDir::new().unwrap();
        let present = temp.path().join("gstreamer.tar.gz");
        fs::write(&present, b"x").unwrap();
        let absent = temp.path().join("other.tar.gz");

        require_upstream_artifacts(&[present.clone()]).unwrap();
        let err = require_upstream_artifacts(&[present, absent]).unwrap_err();
        assert!(err.to_string().contains("other.tar.gz"));
    }

    #[test]
    fn test_require_checkouts() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("gssdp");
        fs::create_dir_all(&repo).unwrap();
        assert!(require_checkouts(&[repo.clone()]).is_err());
        fs::write(repo.join("autogen.sh"), "#!/bin/sh\n").unwrap();
        require_checkouts(&[repo]).unwrap();
    }

    #[test]
    fn test_is_up_to_date() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("gstreamer.tar.gz");
        let target = temp.path().join("rygel.tar.gz");

        fs::write(&input, b"in").unwrap();
        assert!(!is_up_to_date(&target, &[input.clone()]).unwrap());

        fs::write(&target, b"out").unwrap();
        assert!(is_up_to_date(&target, &[input.clone()]).unwrap());

        let missing = temp.path().join("missing");
        assert!(!is_up_to_date(&target, &[input, missing]).unwrap());
    }
}
