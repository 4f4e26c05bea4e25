//! Declarative build operations.
//!
//! A build or clean is described as an ordered list of [`Op`]s: WHAT has to
//! happen, not HOW. The [`crate::executor`] interprets them, so a plan can be
//! printed or inspected without touching the filesystem.
//!
//! # Example
//!
//! ```rust
//! use rygel_builder::component::{Op, Step};
//! use rygel_builder::process::Cmd;
//!
//! let ops = vec![
//!     Op::Dirs(vec!["/tmp/stage/opt/rygel/lib".into()]),
//!     Op::Run(Step::Compile, Cmd::new("make").args(["-j8", "-C", "gssdp"])),
//! ];
//! assert_eq!(ops[1].to_string(), "compile: make -j8 -C gssdp");
//! ```

use std::fmt;
use std::path::PathBuf;

use crate::artifact::Exclude;
use crate::process::Cmd;

/// What an external command is for. Only used for logging and inspection;
/// every step fails the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// `git clean` of a source checkout.
    Clean,
    /// `autogen.sh` with cross options.
    Configure,
    /// `make -jN`.
    Compile,
    /// `make install-strip` into the stage.
    Install,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Clean => write!(f, "clean"),
            Step::Configure => write!(f, "configure"),
            Step::Compile => write!(f, "compile"),
            Step::Install => write!(f, "install"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    // ─────────────────────────────────────────────────────────────────────
    // External commands
    // ─────────────────────────────────────────────────────────────────────
    /// Run a command; non-zero exit aborts.
    Run(Step, Cmd),

    /// Restore `link_all_deplibs=unknown` in `<repo>/libtool`.
    PatchLibtool(PathBuf),

    // ─────────────────────────────────────────────────────────────────────
    // Filesystem
    // ─────────────────────────────────────────────────────────────────────
    /// Create directories (create_dir_all).
    Dirs(Vec<PathBuf>),

    /// Remove a tree without crossing filesystem boundaries. Absent is fine.
    RemoveTree(PathBuf),

    /// Remove a file. Absent is fine.
    RemoveFile(PathBuf),

    /// Create or replace a symlink.
    Symlink { link: PathBuf, target: PathBuf },

    /// Write a file, creating parent directories.
    WriteFile(PathBuf, String),

    // ─────────────────────────────────────────────────────────────────────
    // Output
    // ─────────────────────────────────────────────────────────────────────
    /// gzip tar of `source` at `output`.
    Archive {
        source: PathBuf,
        output: PathBuf,
        excludes: Vec<Exclude>,
    },
}

impl Op {
    /// The command, for [`Op::Run`].
    pub fn cmd(&self) -> Option<&Cmd> {
        match self {
            Op::Run(_, cmd) => Some(cmd),
            _ => None,
        }
    }

    pub fn step(&self) -> Option<Step> {
        match self {
            Op::Run(step, _) => Some(*step),
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Run(step, cmd) => write!(f, "{step}: {}", cmd.render()),
            Op::PatchLibtool(repo) => write!(f, "patch: {}/libtool", repo.display()),
            Op::Dirs(paths) => {
                let joined = paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                write!(f, "mkdir -p {joined}")
            }
            Op::RemoveTree(path) => write!(f, "rm -rf --one-file-system {}", path.display()),
            Op::RemoveFile(path) => write!(f, "rm -f {}", path.display()),
            Op::Symlink { link, target } => {
                write!(f, "ln -sf {} {}", target.display(), link.display())
            }
            Op::WriteFile(path, content) => {
                write!(f, "write {} ({} bytes)", path.display(), content.len())
            }
            Op::Archive {
                source,
                output,
                excludes,
            } => {
                write!(f, "tar -C {}", source.display())?;
                for ex in excludes {
                    write!(f, " --exclude={ex}")?;
                }
                write!(f, " -czf {} .", output.display())
            }
        }
    }
}
