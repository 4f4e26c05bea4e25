//! gzip-compressed tar archives of a stage directory.
//!
//! Entries are stored relative to the stage root with normalized ownership
//! (root:root) and mtime 0, in sorted order, so rebuilding an identical stage
//! gives an identical archive. The archive is written next to its final path
//! and renamed into place once complete; a failed run leaves no output.

use anyhow::{bail, Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fmt;
use std::fs::{self, File};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tar::Builder as TarBuilder;
use walkdir::WalkDir;

/// An exclusion rule, written the way `tar --exclude` takes it.
///
/// `./opt/rygel/doc` drops that path and everything below it, `*.la` drops
/// every entry whose name ends in `.la`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclude {
    /// A path relative to the archive root.
    Path(PathBuf),
    /// A file name suffix.
    Suffix(String),
}

impl Exclude {
    #[cfg(test)]
    pub(crate) fn parse(pattern: &str) -> Result<Self> {
        if let Some(suffix) = pattern.strip_prefix('*') {
            if suffix.is_empty() || suffix.contains(['*', '/']) {
                bail!("unsupported exclude pattern '{pattern}'");
            }
            return Ok(Exclude::Suffix(suffix.to_string()));
        }

        let rel = pattern.trim_start_matches("./").trim_end_matches('/');
        if rel.is_empty() || rel.starts_with('/') || rel.contains('*') {
            bail!("unsupported exclude pattern '{pattern}'");
        }
        Ok(Exclude::Path(PathBuf::from(rel)))
    }

    /// `rel` is relative to the archive root.
    pub fn matches(&self, rel: &Path) -> bool {
        match self {
            Exclude::Path(path) => rel.starts_with(path),
            Exclude::Suffix(suffix) => rel
                .file_name()
                .map(|n| n.to_string_lossy().ends_with(suffix.as_str()))
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for Exclude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclude::Path(path) => write!(f, "./{}", path.display()),
            Exclude::Suffix(suffix) => write!(f, "*{suffix}"),
        }
    }
}

/// Write `src_dir` as a `.tar.gz` at `out_path`, skipping excluded entries.
///
/// Excluded directories are not descended into. Symlinks are stored as
/// links. Returns the number of entries written.
pub fn create_tar_gz(src_dir: &Path, out_path: &Path, excludes: &[Exclude]) -> Result<usize> {
    if !src_dir.is_dir() {
        bail!("archive source is not a directory: {}", src_dir.display());
    }
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let tmp = partial_path(out_path);
    let count = match write_tar_gz(src_dir, &tmp, excludes) {
        Ok(count) => count,
        Err(e) => {
            if tmp.is_file() {
                let _ = fs::remove_file(&tmp);
            }
            return Err(e);
        }
    };
    fs::rename(&tmp, out_path).with_context(|| {
        format!("Failed to move {} to {}", tmp.display(), out_path.display())
    })?;
    Ok(count)
}

/// Sibling of `out_path` the archive is written to before the rename.
pub fn partial_path(out_path: &Path) -> PathBuf {
    let mut name = out_path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".tmp");
    out_path.with_file_name(name)
}

fn write_tar_gz(src_dir: &Path, out_path: &Path, excludes: &[Exclude]) -> Result<usize> {
    let out = File::create(out_path)
        .with_context(|| format!("Failed to create {}", out_path.display()))?;
    let encoder = GzEncoder::new(out, Compression::default());
    let mut builder = TarBuilder::new(encoder);

    let walker = WalkDir::new(src_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|ent| {
            let rel = ent.path().strip_prefix(src_dir).unwrap_or(ent.path());
            !excludes.iter().any(|ex| ex.matches(rel))
        });

    let mut count = 0;
    for ent in walker {
        let ent = ent.with_context(|| format!("walking {}", src_dir.display()))?;
        let p = ent.path();
        if p == src_dir {
            continue;
        }
        let rel = p.strip_prefix(src_dir).unwrap_or(p);
        append_entry(&mut builder, p, rel)
            .with_context(|| format!("archiving {}", p.display()))?;
        count += 1;
    }

    let encoder = builder
        .into_inner()
        .with_context(|| "Failed to finalize tar builder")?;
    let out = encoder
        .finish()
        .with_context(|| format!("Failed to finish {}", out_path.display()))?;
    out.sync_all()
        .with_context(|| format!("Failed to sync {}", out_path.display()))?;
    Ok(count)
}

fn append_entry(builder: &mut TarBuilder<GzEncoder<File>>, p: &Path, rel: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let md = fs::symlink_metadata(p)?;
    let mut header = tar::Header::new_gnu();
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mode(md.permissions().mode());

    if md.is_dir() {
        header.set_entry_type(tar::EntryType::Directory);
        header.set_size(0);
        header.set_cksum();
        builder.append_data(&mut header, rel, std::io::empty())?;
    } else if md.file_type().is_symlink() {
        let target = fs::read_link(p)?;
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        // Targets longer than the header field go into a GNU longlink record.
        builder.append_link(&mut header, rel, &target)?;
    } else if md.is_file() {
        let mut f = File::open(p)?;
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(md.len());
        header.set_cksum();
        builder.append_data(&mut header, rel, &mut f)?;
    } else {
        eprintln!("  [WARN] skipping special file {}", p.display());
    }
    Ok(())
}
