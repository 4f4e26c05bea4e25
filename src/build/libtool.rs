//! Fix-up for the `libtool` script generated by configure.
//!
//! Debian patches libtool to set `link_all_deplibs=no`, which breaks linking
//! against a sysroot when cross compiling
//! (<https://bugs.debian.org/cgi-bin/bugreport.cgi?bug=297726>). The upstream
//! value `unknown` is restored after every configure run.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Name of the generated script inside a configured source tree.
pub const LIBTOOL_SCRIPT: &str = "libtool";

const DEBIAN_LINE: &str = "link_all_deplibs=no";
const UPSTREAM_LINE: &str = "link_all_deplibs=unknown";

/// Rewrite `<repo>/libtool` in place. Returns how many lines changed.
///
/// A missing script is an error: configure must have produced it.
pub fn revert_link_all_deplibs(repo: &Path) -> Result<usize> {
    let script = repo.join(LIBTOOL_SCRIPT);
    let content = fs::read_to_string(&script)
        .with_context(|| format!("reading libtool script '{}'", script.display()))?;

    let (patched, replaced) = patch_link_all_deplibs(&content);
    if replaced > 0 {
        fs::write(&script, patched)
            .with_context(|| format!("writing libtool script '{}'", script.display()))?;
    }
    Ok(replaced)
}

/// Replace whole lines equal to `link_all_deplibs=no`.
pub fn patch_link_all_deplibs(content: &str) -> (String, usize) {
    let mut out = String::with_capacity(content.len() + 16);
    let mut replaced = 0;

    for line in content.split_inclusive('\n') {
        let (body, eol) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };
        if body == DEBIAN_LINE {
            out.push_str(UPSTREAM_LINE);
            replaced += 1;
        } else {
            out.push_str(body);
        }
        out.push_str(eol);
    }

    (out, replaced)
}
