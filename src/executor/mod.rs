//! Op executor - interprets [`Op`] variants and performs the actual work.
//!
//! Filesystem operations are done in-process. External commands go through a
//! [`Runner`], which is the seam tests use to record commands instead of
//! spawning them.
//!
//! Execution stops at the first failing operation. Nothing is rolled back;
//! the stage and source trees stay as the last successful operation left
//! them.

pub mod directories;
pub mod files;

use anyhow::{Context, Result};

use crate::artifact::create_tar_gz;
use crate::build::libtool;
use crate::component::Op;
use crate::config::BuildConfig;
use crate::process::Runner;

/// Execute `ops` in order, stopping at the first error.
///
/// `tag` prefixes progress lines, e.g. `rygel:build`.
pub fn execute(ops: &[Op], runner: &mut dyn Runner, tag: &str) -> Result<()> {
    for (index, op) in ops.iter().enumerate() {
        execute_op(op, runner, tag)
            .with_context(|| format!("[{tag}] step {} of {} failed: {op}", index + 1, ops.len()))?;
    }
    Ok(())
}

/// Execute a single operation.
pub fn execute_op(op: &Op, runner: &mut dyn Runner, tag: &str) -> Result<()> {
    match op {
        Op::Run(step, cmd) => {
            let label = cmd
                .get_cwd()
                .map(BuildConfig::repo_label)
                .or_else(|| {
                    // `make -C <repo>` and `git -C <repo>` carry the repo as an argument.
                    cmd.get_args()
                        .windows(2)
                        .find(|w| w[0] == "-C")
                        .map(|w| BuildConfig::repo_label(std::path::Path::new(&w[1])))
                })
                .unwrap_or_default();
            println!("[{tag}:{label}] {step}");
            runner.run(cmd)?;
        }
        Op::PatchLibtool(repo) => {
            let replaced = libtool::revert_link_all_deplibs(repo)?;
            println!(
                "[{tag}:{}] patch libtool ({replaced} line(s))",
                BuildConfig::repo_label(repo)
            );
        }
        Op::Dirs(paths) => directories::handle_dirs(paths)?,
        Op::RemoveTree(path) => {
            println!("[{tag}] removing {}", path.display());
            directories::handle_remove_tree(path)?;
        }
        Op::RemoveFile(path) => files::handle_remove_file(path)?,
        Op::Symlink { link, target } => {
            println!("[{tag}] linking {} -> {}", link.display(), target.display());
            files::handle_symlink(link, target)?;
        }
        Op::WriteFile(path, content) => files::handle_writefile(path, content)?,
        Op::Archive {
            source,
            output,
            excludes,
        } => {
            println!("[{tag}] archiving {} -> {}", source.display(), output.display());
            let count = create_tar_gz(source, output, excludes)?;
            let size = std::fs::metadata(output)
                .with_context(|| format!("reading {}", output.display()))?
                .len();
            println!("[{tag}] archive written: {count} entries, {} KiB", size / 1024);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Step;
    use crate::process::Cmd;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        ran: Vec<Cmd>,
        fail_on: Option<&'static str>,
    }

    impl Runner for Recorder {
        fn run(&mut self, cmd: &Cmd) -> Result<()> {
            self.ran.push(cmd.clone());
            if Some(cmd.program()) == self.fail_on {
                anyhow::bail!("{} exited with 2", cmd.program());
            }
            Ok(())
        }
    }

    #[test]
    fn test_execute_runs_commands_and_filesystem_ops_in_order() {
        let temp = TempDir::new().unwrap();
        let conf = temp.path().join("stage/etc/ld.so.conf.d/opt-rygel.conf");
        let ops = vec![
            Op::Dirs(vec![temp.path().join("stage/opt/rygel/lib")]),
            Op::Run(Step::Compile, Cmd::new("make").args(["-C", "gssdp"])),
            Op::WriteFile(conf.clone(), "/opt/rygel/lib\n".into()),
        ];
        let mut runner = Recorder::default();

        execute(&ops, &mut runner, "test").unwrap();

        assert_eq!(runner.ran.len(), 1);
        assert!(temp.path().join("stage/opt/rygel/lib").is_dir());
        assert_eq!(fs::read_to_string(conf).unwrap(), "/opt/rygel/lib\n");
    }

    #[test]
    fn test_execute_stops_at_first_failure() {
        let temp = TempDir::new().unwrap();
        let marker = temp.path().join("after");
        let ops = vec![
            Op::Run(Step::Configure, Cmd::new("./autogen.sh")),
            Op::Run(Step::Compile, Cmd::new("make")),
            Op::WriteFile(marker.clone(), "x".into()),
        ];
        let mut runner = Recorder {
            fail_on: Some("./autogen.sh"),
            ..Default::default()
        };

        let err = execute(&ops, &mut runner, "test").unwrap_err();

        assert!(format!("{err:#}").contains("step 1 of 3"));
        assert_eq!(runner.ran.len(), 1);
        assert!(!marker.exists());
    }

    #[test]
    fn test_patch_libtool_op_requires_script() {
        let temp = TempDir::new().unwrap();
        let mut runner = Recorder::default();
        let op = Op::PatchLibtool(temp.path().to_path_buf());
        assert!(execute_op(&op, &mut runner, "test").is_err());

        fs::write(temp.path().join("libtool"), "link_all_deplibs=no\n").unwrap();
        execute_op(&op, &mut runner, "test").unwrap();
        assert_eq!(
            fs::read_to_string(temp.path().join("libtool")).unwrap(),
            "link_all_deplibs=unknown\n"
        );
    }
}
