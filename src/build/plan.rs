//! Build and clean plans.
//!
//! Everything here is a pure function of the configuration and environment:
//! the result is the ordered list of operations the executor will perform.

use std::path::Path;

use crate::artifact::Exclude;
use crate::build::env::BuildEnv;
use crate::component::{Op, Step};
use crate::config::{BuildConfig, PRECREATED_PREFIX_DIRS};
use crate::process::Cmd;

/// Paths under the prefix that only matter at build time.
const EXCLUDED_PREFIX_DIRS: &[&str] = &[
    "doc",
    "include",
    "lib/pkgconfig",
    "share/man",
    "share/locale",
    "share/aclocal",
    "share/bash-completion",
];

/// Libtool archives.
const EXCLUDED_SUFFIXES: &[&str] = &[".la"];

/// Arguments to `autogen.sh`: cross options, shared options, then
/// `extra_opts` verbatim.
pub fn configure_args(config: &BuildConfig, extra_opts: &[String]) -> Vec<String> {
    let sysroot = config.sysroot.display();
    let mut args = vec![
        format!("--host={}", config.host),
        format!("--build={}", config.build),
        format!("--prefix={}", config.prefix),
        format!("--with-sysroot={sysroot}"),
        format!("--with-libgcrypt-prefix={sysroot}/usr"),
    ];
    args.extend(config.common_opts.iter().cloned());
    args.extend(config.nodebug_opts.iter().cloned());
    args.extend(extra_opts.iter().cloned());
    args
}

/// configure → patch libtool → compile → install for one checkout.
pub fn repo_ops(config: &BuildConfig, env: &BuildEnv, repo: &Path, extra_opts: &[String]) -> Vec<Op> {
    let label = BuildConfig::repo_label(repo);
    let repo_arg = repo.to_string_lossy().into_owned();

    let configure = Cmd::new(repo.join("autogen.sh").to_string_lossy())
        .args(configure_args(config, extra_opts))
        .current_dir(repo)
        .build_env(env)
        .error_msg(format!("configuring {label}"));

    let compile = Cmd::new("make")
        .arg(format!("-j{}", config.jobs))
        .args(["-C", &repo_arg])
        .build_env(env)
        .error_msg(format!("compiling {label}"));

    // Serial on purpose: parallel install of gupnp-dlna is broken
    // (https://bugzilla.gnome.org/show_bug.cgi?id=720053).
    let install = Cmd::new("make")
        .args(["-C", &repo_arg])
        .arg(format!("DESTDIR={}", config.stage.display()))
        .arg("install-strip")
        .build_env(env)
        .error_msg(format!("installing {label}"));

    vec![
        Op::Run(Step::Configure, configure),
        Op::PatchLibtool(repo.to_path_buf()),
        Op::Run(Step::Compile, compile),
        Op::Run(Step::Install, install),
    ]
}

/// `git clean -dfxq` of every checkout.
pub fn git_clean_ops(config: &BuildConfig) -> Vec<Op> {
    config
        .repos
        .iter()
        .map(|repo| {
            let cmd = Cmd::new("git")
                .arg("-C")
                .arg_path(repo)
                .args(["clean", "-dfxq"])
                .error_msg(format!("cleaning {}", BuildConfig::repo_label(repo)));
            Op::Run(Step::Clean, cmd)
        })
        .collect()
}

/// Exclusions applied when archiving the stage.
pub fn archive_excludes(config: &BuildConfig) -> Vec<Exclude> {
    let prefix = Path::new(config.relative_prefix());
    EXCLUDED_PREFIX_DIRS
        .iter()
        .map(|dir| Exclude::Path(prefix.join(dir)))
        .chain(EXCLUDED_SUFFIXES.iter().map(|s| Exclude::Suffix(s.to_string())))
        .collect()
}

/// The full `build` sequence.
///
/// The first repository is built before the sysroot link exists; the
/// middle range stops two short of the end, so the second-to-last
/// repository is not built.
pub fn build_plan(config: &BuildConfig, env: &BuildEnv) -> Vec<Op> {
    let staged_prefix = config.staged_prefix();
    let repos = &config.repos;
    let mut ops = git_clean_ops(config);

    ops.push(Op::RemoveTree(config.stage.clone()));
    // A build that fails must not leave an archive the freshness check accepts.
    ops.push(Op::RemoveFile(config.target().to_path_buf()));
    ops.push(Op::Dirs(
        PRECREATED_PREFIX_DIRS
            .iter()
            .map(|dir| staged_prefix.join(dir))
            .collect(),
    ));

    if let Some(first) = repos.first() {
        ops.extend(repo_ops(config, env, first, &[]));
    }

    ops.push(Op::Dirs(vec![config.sysroot.join("opt")]));
    ops.push(Op::Symlink {
        link: config.sysroot_prefix(),
        target: staged_prefix.clone(),
    });

    let middle = repos.get(1..repos.len().saturating_sub(2)).unwrap_or(&[]);
    for repo in middle {
        ops.extend(repo_ops(config, env, repo, &[]));
    }

    if let Some(last) = repos.last() {
        ops.extend(repo_ops(config, env, last, &config.final_opts));
    }

    ops.push(Op::WriteFile(
        config.ld_conf_path(),
        format!("{}\n", config.target_libdir()),
    ));
    ops.push(Op::Archive {
        source: config.stage.clone(),
        output: config.target().to_path_buf(),
        excludes: archive_excludes(config),
    });
    ops
}

/// The `clean` sequence: source trees, stage, archive.
pub fn clean_plan(config: &BuildConfig) -> Vec<Op> {
    let mut ops = git_clean_ops(config);
    ops.push(Op::RemoveTree(config.stage.clone()));
    ops.push(Op::RemoveFile(config.target().to_path_buf()));
    ops
}
