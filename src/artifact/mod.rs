//! Output artifacts.
//!
//! - [`tarball`] - gzip tar of the stage with `tar --exclude`-style rules

pub mod tarball;

pub use tarball::{create_tar_gz, Exclude};
