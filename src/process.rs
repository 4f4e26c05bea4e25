//! Structured external commands.
//!
//! A [`Cmd`] is an argument vector with an explicit working directory and
//! environment. Nothing goes through a shell, so arguments never need
//! quoting. Commands are handed to a [`Runner`], which either spawns them
//! ([`SystemRunner`]) or, in tests, records them.
//!
//! # Example
//!
//! ```rust
//! use rygel_builder::process::Cmd;
//!
//! let cmd = Cmd::new("make")
//!     .args(["-j8", "-C", "gssdp"])
//!     .error_msg("compile failed");
//! assert_eq!(cmd.render(), "make -j8 -C gssdp");
//! ```

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::build::env::BuildEnv;

/// An external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: BTreeMap<String, String>,
    error_msg: Option<String>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            error_msg: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        let arg = path.to_string_lossy().into_owned();
        self.arg(arg)
    }

    /// Run the command from `dir` instead of the caller's directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Set every variable of `env` on the child.
    ///
    /// Variables not in `env` are still inherited from this process.
    pub fn build_env(mut self, env: &BuildEnv) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        self
    }

    /// Message prefixed to the error when the command fails.
    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    /// Human-readable form, quoted the way a POSIX shell would need it.
    ///
    /// Only used for logs and error messages.
    pub fn render(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(shell_quote(&self.program));
        parts.extend(self.args.iter().map(|a| shell_quote(a)));
        let line = parts.join(" ");
        match &self.cwd {
            Some(dir) => format!("(cd {} && {})", shell_quote(&dir.to_string_lossy()), line),
            None => line,
        }
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).envs(&self.env);
        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }
        command
    }
}

/// Executes commands on behalf of the builder.
pub trait Runner {
    /// Run `cmd` to completion. Any non-zero exit is an error.
    fn run(&mut self, cmd: &Cmd) -> Result<()>;
}

/// Spawns real processes with inherited stdio so build output streams to the
/// terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn run(&mut self, cmd: &Cmd) -> Result<()> {
        let status = cmd
            .to_command()
            .status()
            .with_context(|| format!("spawning `{}`", cmd.render()))?;

        if !status.success() {
            let prefix = cmd.error_msg.as_deref().unwrap_or("command failed");
            bail!("{}: `{}` exited with {}", prefix, cmd.render(), status);
        }
        Ok(())
    }
}

/// Check whether a program is on PATH.
pub fn exists(program: &str) -> bool {
    which::which(program).is_ok()
}

fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_quotes_only_when_needed() {
        let cmd = Cmd::new("sh").args(["-c", "echo it's here"]);
        assert_eq!(cmd.render(), r"sh -c 'echo it'\''s here'");
    }

    #[test]
    fn test_render_includes_working_directory() {
        let cmd = Cmd::new("./autogen.sh")
            .arg("--prefix=/opt/rygel")
            .current_dir("/src/gssdp");
        assert_eq!(
            cmd.render(),
            "(cd /src/gssdp && ./autogen.sh --prefix=/opt/rygel)"
        );
    }

    #[test]
    fn test_build_env_is_copied() {
        let env = BuildEnv::from_vars([("PKG_CONFIG_LIBDIR", "/a")]);
        let cmd = Cmd::new("make").build_env(&env);
        assert_eq!(cmd.env_var("PKG_CONFIG_LIBDIR"), Some("/a"));
    }

    #[test]
    fn test_system_runner_success() {
        SystemRunner.run(&Cmd::new("true")).unwrap();
    }

    #[test]
    fn test_system_runner_reports_failure() {
        let err = SystemRunner
            .run(&Cmd::new("false").error_msg("compile failed"))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("compile failed"));
        assert!(msg.contains("`false`"));
    }

    #[test]
    fn test_system_runner_honours_cwd_and_env() {
        let temp = tempfile::TempDir::new().unwrap();
        let env = BuildEnv::from_vars([("RYGEL_TEST_MARKER", "marker.txt")]);
        let cmd = Cmd::new("sh")
            .args(["-c", "touch \"$RYGEL_TEST_MARKER\""])
            .current_dir(temp.path())
            .build_env(&env);
        SystemRunner.run(&cmd).unwrap();
        assert!(temp.path().join("marker.txt").exists());
    }

    #[test]
    fn test_exists() {
        assert!(exists("sh"));
        assert!(!exists("definitely_not_a_real_command_12345"));
    }
}
