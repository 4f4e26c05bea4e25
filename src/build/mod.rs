//! Sequential multi-repo builder.
//!
//! - [`env`] - inherited environment plus staged search paths
//! - [`plan`] - ordered operations for `build` and `clean`
//! - [`libtool`] - the `link_all_deplibs` fix-up applied after configure
//!
//! [`Builder`] ties them together: it derives the environment once, asks
//! [`plan`] for the operations and hands them to the executor.

pub mod env;
pub mod libtool;
pub mod plan;

use anyhow::{bail, Result};
use std::fmt;
use std::str::FromStr;

use crate::component::Op;
use crate::config::BuildConfig;
use crate::executor;
use crate::preflight;
use crate::process::Runner;

use env::BuildEnv;

/// The two top-level operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKind {
    Build,
    Clean,
}

impl fmt::Display for BuildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildKind::Build => write!(f, "build"),
            BuildKind::Clean => write!(f, "clean"),
        }
    }
}

impl FromStr for BuildKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "build" => Ok(BuildKind::Build),
            "clean" => Ok(BuildKind::Clean),
            other => bail!("unknown operation '{other}'; expected 'build' or 'clean'"),
        }
    }
}

/// Outcome of [`Builder::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Built,
    /// The archive is newer than every upstream artifact; nothing ran.
    UpToDate,
}

pub struct Builder {
    config: BuildConfig,
    env: BuildEnv,
}

impl Builder {
    /// `parent` is the upstream component's environment. The config's `[env]`
    /// table is overlaid on it before the staged search paths are appended.
    pub fn new(config: BuildConfig, mut parent: BuildEnv) -> Self {
        parent.overlay(&config.env);
        let env = parent.with_staged_prefix(&config.staged_prefix());
        Self { config, env }
    }

    /// Builder whose parent environment is this process's environment.
    pub fn from_process_env(config: BuildConfig) -> Self {
        Self::new(config, BuildEnv::inherit())
    }

    /// Environment every per-repository command runs with.
    pub fn env(&self) -> &BuildEnv {
        &self.env
    }

    pub fn plan(&self, kind: BuildKind) -> Vec<Op> {
        match kind {
            BuildKind::Build => plan::build_plan(&self.config, &self.env),
            BuildKind::Clean => plan::clean_plan(&self.config),
        }
    }

    /// Run the whole build, or skip it when the archive is current and
    /// `force` is false.
    pub fn build(&self, runner: &mut dyn Runner, force: bool) -> Result<BuildOutcome> {
        let tag = self.tag(BuildKind::Build);
        let target = self.config.target();

        preflight::require_upstream_artifacts(&self.config.requires_artifacts)?;

        if !force && preflight::is_up_to_date(target, &self.config.requires_artifacts)? {
            println!("[{tag}] {} is up to date", target.display());
            return Ok(BuildOutcome::UpToDate);
        }

        println!(
            "[{tag}] building {} repositories into {}",
            self.config.repos.len(),
            self.config.stage.display()
        );
        executor::execute(&self.plan(BuildKind::Build), runner, &tag)?;
        println!("[{tag}] wrote {}", target.display());
        Ok(BuildOutcome::Built)
    }

    /// Clean source trees and remove the stage and archive. Idempotent.
    pub fn clean(&self, runner: &mut dyn Runner) -> Result<()> {
        let tag = self.tag(BuildKind::Clean);
        executor::execute(&self.plan(BuildKind::Clean), runner, &tag)?;
        println!("[{tag}] done");
        Ok(())
    }

    fn tag(&self, kind: BuildKind) -> String {
        format!("{}:{kind}", self.config.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::env::{PKG_CONFIG_LIBDIR, XDG_DATA_DIRS};
    use std::path::Path;

    #[test]
    fn test_build_kind_parse() {
        assert_eq!("build".parse::<BuildKind>().unwrap(), BuildKind::Build);
        assert_eq!("clean".parse::<BuildKind>().unwrap(), BuildKind::Clean);
        assert!("deploy".parse::<BuildKind>().is_err());
        assert_eq!(BuildKind::Clean.to_string(), "clean");
    }

    #[test]
    fn test_config_env_overlays_parent_before_extension() {
        let config = BuildConfig::from_toml_str(
            "[env]\nXDG_DATA_DIRS = \"/from/config\"\n",
            Path::new("/pkg/rygel"),
        )
        .unwrap();
        let parent = BuildEnv::from_vars([
            (PKG_CONFIG_LIBDIR, "/parent/pkgconfig"),
            (XDG_DATA_DIRS, "/parent/share"),
        ]);

        let builder = Builder::new(config, parent);

        assert_eq!(
            builder.env().get(PKG_CONFIG_LIBDIR),
            Some("/parent/pkgconfig:/pkg/rygel/stage/opt/rygel/lib/pkgconfig")
        );
        assert_eq!(
            builder.env().get(XDG_DATA_DIRS),
            Some("/from/config:/pkg/rygel/stage/opt/rygel/share")
        );
    }

    #[test]
    fn test_missing_upstream_artifact_blocks_build() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = BuildConfig::defaults(temp.path()).unwrap();
        let builder = Builder::new(config, BuildEnv::default());

        struct Never;
        impl Runner for Never {
            fn run(&mut self, cmd: &crate::process::Cmd) -> Result<()> {
                panic!("unexpected command {}", cmd.render());
            }
        }

        let err = builder.build(&mut Never, false).unwrap_err();
        assert!(err.to_string().contains("gstreamer.tar.gz"));
    }
}
