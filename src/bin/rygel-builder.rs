use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rygel_builder::package::PackageReport;
use rygel_builder::process::SystemRunner;
use rygel_builder::{preflight, BuildConfig, BuildKind, BuildOutcome, Builder};

fn usage() -> &'static str {
    "Usage:\n  rygel-builder [--config <rygel.toml>] build [--force]\n  rygel-builder [--config <rygel.toml>] clean\n  rygel-builder [--config <rygel.toml>] plan [build|clean]\n  rygel-builder [--config <rygel.toml>] describe\n  rygel-builder [--config <rygel.toml>] check"
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, args) = split_config_flag(&args)?;
    let config = load_config(config_path.as_deref())?;

    match args.as_slice() {
        [build] if build == "build" => build_cmd(config, false),
        [build, force] if build == "build" && force == "--force" => build_cmd(config, true),
        [clean] if clean == "clean" => {
            Builder::from_process_env(config).clean(&mut SystemRunner)
        }
        [plan] if plan == "plan" => plan_cmd(config, BuildKind::Build),
        [plan, kind] if plan == "plan" => plan_cmd(config, kind.parse()?),
        [describe] if describe == "describe" => describe_cmd(&config),
        [check] if check == "check" => check_cmd(&config),
        _ => bail!(usage()),
    }
}

/// Pull `--config <path>` out of the argument list, wherever it appears.
fn split_config_flag(args: &[String]) -> Result<(Option<PathBuf>, Vec<String>)> {
    let mut config = None;
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let value = iter
                .next()
                .ok_or_else(|| anyhow::anyhow!("--config requires a path\n{}", usage()))?;
            config = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--config=") {
            config = Some(PathBuf::from(value));
        } else {
            rest.push(arg.clone());
        }
    }
    Ok((config, rest))
}

fn load_config(path: Option<&Path>) -> Result<BuildConfig> {
    match path {
        Some(path) => BuildConfig::load(path),
        None => {
            let cwd = std::env::current_dir().context("resolving current directory")?;
            BuildConfig::discover(&cwd)
        }
    }
}

fn build_cmd(config: BuildConfig, force: bool) -> Result<()> {
    let name = config.name.clone();
    let builder = Builder::from_process_env(config);
    match builder
        .build(&mut SystemRunner, force)
        .with_context(|| format!("building '{name}'"))?
    {
        BuildOutcome::Built => {}
        BuildOutcome::UpToDate => {
            println!("[{name}:build] nothing to do (use --force to rebuild)");
        }
    }
    Ok(())
}

fn plan_cmd(config: BuildConfig, kind: BuildKind) -> Result<()> {
    let builder = Builder::from_process_env(config);
    for (index, op) in builder.plan(kind).iter().enumerate() {
        println!("{:>3}  {op}", index + 1);
    }
    Ok(())
}

fn describe_cmd(config: &BuildConfig) -> Result<()> {
    let report = PackageReport::for_descriptor(&config.package)?;
    let json = serde_json::to_string_pretty(&report).context("serializing package descriptor")?;
    println!("{json}");
    Ok(())
}

fn check_cmd(config: &BuildConfig) -> Result<()> {
    preflight::check_all(config)?;
    println!("[{}:check] host tools, checkouts and upstream artifacts present", config.name);
    Ok(())
}
