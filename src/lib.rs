//! Cross-builds the UPnP/DLNA media-sharing stack for an ARM target.
//!
//! The stack is a chain of autotools projects (gssdp, gupnp, gupnp-av,
//! gupnp-dlna, gupnp-tools, rygel) that each need the previous ones
//! installed. They are built one after another into a shared stage
//! directory, which is then packed into a `.tar.gz` for the image builder.
//!
//! - **Configuration** - [`config::BuildConfig`], loaded from `rygel.toml`
//! - **Planning** - [`build::plan`] turns the config into ordered [`Op`]s
//! - **Execution** - [`executor`] performs them, running commands through a
//!   [`process::Runner`]
//! - **Output** - [`artifact::tarball`] writes the archive
//!
//! # Architecture
//!
//! ```text
//! rygel.toml ──► BuildConfig ──┐
//!                              ├──► plan::build_plan ──► Vec<Op> ──► executor ──► Runner
//! parent env ──► BuildEnv ─────┘                                        │
//!               (+ staged search paths)                                 └──► stage/, rygel.tar.gz
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use rygel_builder::{BuildConfig, Builder, process::SystemRunner};
//!
//! let config = BuildConfig::discover(&std::env::current_dir()?)?;
//! let builder = Builder::from_process_env(config);
//! builder.build(&mut SystemRunner, false)?;
//! ```

pub mod artifact;
pub mod build;
pub mod component;
pub mod config;
pub mod executor;
pub mod package;
pub mod preflight;
pub mod process;

pub use build::env::BuildEnv;
pub use build::{BuildKind, BuildOutcome, Builder};
pub use component::{Op, Step};
pub use config::BuildConfig;
pub use package::PackageDescriptor;
