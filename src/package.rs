//! Package descriptor consumed by the downstream image packaging stage.

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Development packages installed into the sysroot before building.
///
/// The codec libraries are really used by the gstreamer build, but the whole
/// sysroot is produced in one go so they live here.
pub const DEFAULT_SYSROOT_DEBS: &[&str] = &[
    "libmediaart-2.0-dev",
    // container formats
    "libogg-dev",
    // image formats
    "libpng-dev",
    "libjpeg-dev",
    // audio formats
    "libflac-dev",
    "libvorbis-dev",
    "libopus-dev",
    "libmpg123-dev",
    "liba52-0.7.4-dev",
    // video formats (software decoding)
    "libmpeg2-4-dev",
    "libtheora-dev",
];

/// Runtime packages installed into the target image.
pub const DEFAULT_ROOT_DEBS: &[&str] = &[
    "libgee-0.8-2",
    "libtiff5",
    "libgdk-pixbuf2.0-0",
    "libmediaart-2.0-0",
    // container formats
    "libogg0",
    // image formats
    "libjpeg62-turbo",
    "libpng12-0",
    // audio formats
    "libmpg123-0",
    "libopus0",
    "libvorbisenc2",
    "libflac8",
    "liba52-0.7.4",
    // video formats (software decoding)
    "libmpeg2-4",
    "libtheora0",
];

/// Components that must be built before this one.
pub const DEFAULT_REQUIRES: &[&str] = &["gstreamer"];

/// What this component hands to the image builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageDescriptor {
    pub requires: Vec<String>,
    pub sysroot_debs: Vec<String>,
    pub root_debs: Vec<String>,
    pub target: PathBuf,
    /// Post-build install steps. Empty for this component.
    pub install: Vec<String>,
}

impl PackageDescriptor {
    pub fn with_target(target: PathBuf) -> Self {
        Self {
            requires: to_strings(DEFAULT_REQUIRES),
            sysroot_debs: to_strings(DEFAULT_SYSROOT_DEBS),
            root_debs: to_strings(DEFAULT_ROOT_DEBS),
            target,
            install: Vec::new(),
        }
    }
}

/// Descriptor plus the state of the built archive, as printed by `describe`.
#[derive(Debug, Clone, Serialize)]
pub struct PackageReport<'a> {
    #[serde(flatten)]
    pub descriptor: &'a PackageDescriptor,
    pub target_exists: bool,
    pub target_sha256: Option<String>,
    pub target_size_bytes: Option<u64>,
}

impl<'a> PackageReport<'a> {
    pub fn for_descriptor(descriptor: &'a PackageDescriptor) -> Result<Self> {
        let (target_sha256, target_size_bytes) = if descriptor.target.is_file() {
            let (sha, size) = sha256_file(&descriptor.target)?;
            (Some(sha), Some(size))
        } else {
            (None, None)
        };
        Ok(Self {
            descriptor,
            target_exists: target_sha256.is_some(),
            target_sha256,
            target_size_bytes,
        })
    }
}

pub(crate) fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn sha256_file(path: &Path) -> Result<(String, u64)> {
    let f = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut r = BufReader::new(f);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let n = r.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((format!("{:x}", hasher.finalize()), size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let pkg = PackageDescriptor::with_target(PathBuf::from("/pkg/rygel.tar.gz"));
        assert_eq!(pkg.requires, vec!["gstreamer"]);
        assert!(pkg.sysroot_debs.contains(&"libmediaart-2.0-dev".to_string()));
        assert!(pkg.root_debs.contains(&"libgee-0.8-2".to_string()));
        assert!(pkg.install.is_empty());
    }

    #[test]
    fn test_report_without_target() {
        let pkg = PackageDescriptor::with_target(PathBuf::from("/nonexistent/rygel.tar.gz"));
        let report = PackageReport::for_descriptor(&pkg).unwrap();
        assert!(!report.target_exists);
        assert!(report.target_sha256.is_none());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["requires"][0], "gstreamer");
        assert_eq!(json["target_exists"], false);
    }

    #[test]
    fn test_report_hashes_target() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("rygel.tar.gz");
        std::fs::write(&target, b"hello").unwrap();

        let pkg = PackageDescriptor::with_target(target);
        let report = PackageReport::for_descriptor(&pkg).unwrap();
        assert_eq!(
            report.target_sha256.as_deref(),
            Some("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
        );
        assert_eq!(report.target_size_bytes, Some(5));
    }
}
