//! Build configuration.
//!
//! Everything the builder needs is in one [`BuildConfig`] value that is
//! threaded through planning and execution. It is usually loaded from a
//! `rygel.toml` next to the source checkouts; every key is optional and the
//! defaults reproduce the stock rygel build.
//!
//! ```toml
//! prefix = "/opt/rygel"
//! sysroot = "/work/sysroot"
//! jobs = 16
//!
//! [env]
//! PKG_CONFIG_LIBDIR = "/work/sysroot/usr/lib/arm-linux-gnueabihf/pkgconfig"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::package::{to_strings, PackageDescriptor};

/// Config file looked up in the working directory when none is given.
pub const CONFIG_FILE: &str = "rygel.toml";

/// Source checkouts in dependency order.
pub const DEFAULT_REPOS: &[&str] = &[
    "gssdp",
    "gupnp",
    "gupnp-av",
    "gupnp-dlna",
    "gupnp-tools",
    "rygel",
];

/// Options shared with every autotools component of the image build.
pub const DEFAULT_COMMON_OPTS: &[&str] = &[
    "--disable-static",
    "--disable-gtk-doc",
    "--disable-introspection",
];

pub const DEFAULT_NODEBUG_OPTS: &[&str] = &["--disable-debug"];

/// Extra options for the final repository: no UI, no docs, and only the
/// plugins that work headless on the device.
pub const DEFAULT_FINAL_OPTS: &[&str] = &[
    "--without-ui",
    "--disable-media-export-plugin",
    "--disable-tracker-plugin",
    "--disable-external-plugin",
    "--disable-ruih-plugin",
    "--disable-mpris-plugin",
    "--enable-apidocs=no",
];

/// Upstream archives, relative to the package directory.
pub const DEFAULT_REQUIRES_ARTIFACTS: &[&str] = &["../gstreamer/gstreamer.tar.gz"];

/// Directories that configure probes expect under the staged prefix before
/// anything has been installed.
pub const PRECREATED_PREFIX_DIRS: &[&str] = &["lib", "include/gstreamer-1.0"];

/// Fully resolved build configuration. All paths are absolute.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Component name, used for the loader config file and log tags.
    pub name: String,
    /// Install prefix on the target, e.g. `/opt/rygel`.
    pub prefix: String,
    pub stage: PathBuf,
    pub sysroot: PathBuf,
    pub host: String,
    pub build: String,
    pub jobs: usize,
    pub repos: Vec<PathBuf>,
    pub common_opts: Vec<String>,
    pub nodebug_opts: Vec<String>,
    pub final_opts: Vec<String>,
    /// Upstream archives that must exist before building.
    pub requires_artifacts: Vec<PathBuf>,
    /// Variables overlaid on the inherited environment.
    pub env: BTreeMap<String, String>,
    pub package: PackageDescriptor,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BuildToml {
    name: Option<String>,
    prefix: Option<String>,
    stage: Option<String>,
    target: Option<String>,
    sysroot: Option<String>,
    host: Option<String>,
    build: Option<String>,
    jobs: Option<usize>,
    repos: Option<Vec<String>>,
    common_opts: Option<Vec<String>>,
    nodebug_opts: Option<Vec<String>>,
    final_opts: Option<Vec<String>>,
    requires_artifacts: Option<Vec<String>>,
    env: Option<BTreeMap<String, String>>,
    package: Option<PackageToml>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PackageToml {
    requires: Option<Vec<String>>,
    sysroot_debs: Option<Vec<String>>,
    root_debs: Option<Vec<String>>,
    install: Option<Vec<String>>,
}

impl BuildConfig {
    /// Built-in configuration rooted at `base_dir`.
    pub fn defaults(base_dir: &Path) -> Result<Self> {
        Self::from_toml(BuildToml::default(), base_dir, "built-in defaults")
    }

    /// Load `path`, resolving relative paths against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading build config '{}'", path.display()))?;
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let base_dir = fs::canonicalize(parent)
            .with_context(|| format!("resolving config directory '{}'", parent.display()))?;
        Self::from_toml_str(&text, &base_dir)
            .with_context(|| format!("loading build config '{}'", path.display()))
    }

    pub fn from_toml_str(text: &str, base_dir: &Path) -> Result<Self> {
        let parsed: BuildToml = toml::from_str(text).context("parsing build config")?;
        Self::from_toml(parsed, base_dir, "build config")
    }

    /// `<dir>/rygel.toml` if present, else the defaults rooted at `dir`.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Self::defaults(dir)
        }
    }

    fn from_toml(raw: BuildToml, base_dir: &Path, origin: &str) -> Result<Self> {
        let resolve = |value: Option<String>, default: &str| {
            resolve_path(base_dir, value.as_deref().unwrap_or(default))
        };

        let name = raw.name.unwrap_or_else(|| "rygel".to_string());
        let prefix = raw.prefix.unwrap_or_else(|| format!("/opt/{name}"));
        let target = resolve(raw.target, &format!("{name}.tar.gz"));

        let pkg = raw.package.unwrap_or_default();
        let mut package = PackageDescriptor::with_target(target);
        if let Some(requires) = pkg.requires {
            package.requires = requires;
        }
        if let Some(debs) = pkg.sysroot_debs {
            package.sysroot_debs = debs;
        }
        if let Some(debs) = pkg.root_debs {
            package.root_debs = debs;
        }
        if let Some(install) = pkg.install {
            package.install = install;
        }

        let repos = or_defaults(raw.repos, DEFAULT_REPOS)
            .iter()
            .map(|r| resolve_path(base_dir, r))
            .collect();
        let requires_artifacts = or_defaults(raw.requires_artifacts, DEFAULT_REQUIRES_ARTIFACTS)
            .iter()
            .map(|r| resolve_path(base_dir, r))
            .collect();

        let config = Self {
            stage: resolve(raw.stage, "stage"),
            sysroot: resolve(raw.sysroot, "../../sysroot/sysroot"),
            host: raw.host.unwrap_or_else(|| "arm-linux-gnueabihf".to_string()),
            build: raw.build.unwrap_or_else(|| "x86_64-linux-gnu".to_string()),
            jobs: raw.jobs.unwrap_or(8),
            repos,
            common_opts: or_defaults(raw.common_opts, DEFAULT_COMMON_OPTS),
            nodebug_opts: or_defaults(raw.nodebug_opts, DEFAULT_NODEBUG_OPTS),
            final_opts: or_defaults(raw.final_opts, DEFAULT_FINAL_OPTS),
            requires_artifacts,
            env: raw.env.unwrap_or_default(),
            package,
            name,
            prefix,
        };
        config
            .validate()
            .with_context(|| format!("invalid {origin}"))?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.contains('/') {
            bail!("name must be a non-empty file name, got '{}'", self.name);
        }
        if !self.prefix.starts_with('/') || self.prefix.trim_matches('/').is_empty() {
            bail!("prefix must be an absolute path below '/', got '{}'", self.prefix);
        }
        if self.repos.len() < 2 {
            bail!(
                "at least two repositories are required, got {}",
                self.repos.len()
            );
        }
        if self.jobs == 0 {
            bail!("jobs must be at least 1");
        }
        Ok(())
    }

    /// Archive written by `build`.
    pub fn target(&self) -> &Path {
        &self.package.target
    }

    /// Prefix relative to a filesystem root, e.g. `opt/rygel`.
    pub fn relative_prefix(&self) -> &str {
        self.prefix.trim_start_matches('/')
    }

    /// `<stage>/<prefix>`, where `make install` puts everything.
    pub fn staged_prefix(&self) -> PathBuf {
        self.stage.join(self.relative_prefix())
    }

    /// `<sysroot>/<prefix>`, the published symlink.
    pub fn sysroot_prefix(&self) -> PathBuf {
        self.sysroot.join(self.relative_prefix())
    }

    /// Library directory as seen on the device.
    pub fn target_libdir(&self) -> String {
        format!("{}/lib", self.prefix.trim_end_matches('/'))
    }

    /// `<stage>/etc/ld.so.conf.d/opt-<name>.conf`.
    pub fn ld_conf_path(&self) -> PathBuf {
        self.stage
            .join("etc/ld.so.conf.d")
            .join(format!("opt-{}.conf", self.name))
    }

    /// Short name of a repository for log tags.
    pub fn repo_label(repo: &Path) -> String {
        repo.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| repo.display().to_string())
    }
}

fn or_defaults(value: Option<Vec<String>>, default: &[&str]) -> Vec<String> {
    value.unwrap_or_else(|| to_strings(default))
}

fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_stock_build() {
        let config = BuildConfig::defaults(Path::new("/pkg/rygel")).unwrap();
        assert_eq!(config.prefix, "/opt/rygel");
        assert_eq!(config.stage, PathBuf::from("/pkg/rygel/stage"));
        assert_eq!(config.target(), Path::new("/pkg/rygel/rygel.tar.gz"));
        assert_eq!(config.repos.len(), 6);
        assert_eq!(config.repos[0], PathBuf::from("/pkg/rygel/gssdp"));
        assert_eq!(config.repos[5], PathBuf::from("/pkg/rygel/rygel"));
        assert_eq!(config.jobs, 8);
        assert!(config.final_opts.contains(&"--without-ui".to_string()));
        assert_eq!(
            config.requires_artifacts,
            vec![PathBuf::from("/pkg/rygel/../gstreamer/gstreamer.tar.gz")]
        );
    }

    #[test]
    fn test_derived_paths() {
        let config = BuildConfig::defaults(Path::new("/pkg/rygel")).unwrap();
        assert_eq!(config.staged_prefix(), PathBuf::from("/pkg/rygel/stage/opt/rygel"));
        assert_eq!(config.target_libdir(), "/opt/rygel/lib");
        assert_eq!(
            config.ld_conf_path(),
            PathBuf::from("/pkg/rygel/stage/etc/ld.so.conf.d/opt-rygel.conf")
        );
        assert!(config.sysroot_prefix().ends_with("sysroot/opt/rygel"));
    }

    #[test]
    fn test_toml_overrides() {
        let config = BuildConfig::from_toml_str(
            r#"
            name = "mediad"
            sysroot = "/work/sysroot"
            jobs = 2
            repos = ["a", "/abs/b"]

            [env]
            PKG_CONFIG_LIBDIR = "/work/sysroot/usr/lib/pkgconfig"

            [package]
            root_debs = ["libfoo1"]
            "#,
            Path::new("/base"),
        )
        .unwrap();

        assert_eq!(config.prefix, "/opt/mediad");
        assert_eq!(config.target(), Path::new("/base/mediad.tar.gz"));
        assert_eq!(config.sysroot, PathBuf::from("/work/sysroot"));
        assert_eq!(config.repos, vec![PathBuf::from("/base/a"), PathBuf::from("/abs/b")]);
        assert_eq!(config.package.root_debs, vec!["libfoo1"]);
        assert_eq!(
            config.env.get("PKG_CONFIG_LIBDIR").map(String::as_str),
            Some("/work/sysroot/usr/lib/pkgconfig")
        );
        assert_eq!(config.ld_conf_path(), PathBuf::from("/base/stage/etc/ld.so.conf.d/opt-mediad.conf"));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        let err = BuildConfig::from_toml_str("prefx = \"/opt/x\"", Path::new("/base")).unwrap_err();
        assert!(format!("{err:#}").contains("prefx"));
    }

    #[test]
    fn test_rejects_relative_prefix() {
        assert!(BuildConfig::from_toml_str("prefix = \"opt/x\"", Path::new("/base")).is_err());
        assert!(BuildConfig::from_toml_str("prefix = \"/\"", Path::new("/base")).is_err());
    }

    #[test]
    fn test_rejects_single_repo() {
        let err = BuildConfig::from_toml_str("repos = [\"only\"]", Path::new("/base")).unwrap_err();
        assert!(format!("{err:#}").contains("at least two"));
    }

    #[test]
    fn test_discover_prefers_config_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "jobs = 3\n").unwrap();
        let config = BuildConfig::discover(temp.path()).unwrap();
        assert_eq!(config.jobs, 3);
        assert_eq!(config.stage, fs::canonicalize(temp.path()).unwrap().join("stage"));

        let empty = TempDir::new().unwrap();
        let config = BuildConfig::discover(empty.path()).unwrap();
        assert_eq!(config.jobs, 8);
    }
}
