//! Build environment handed to every per-repository command.
//!
//! The environment starts as a copy of the parent component's environment
//! (the gstreamer build) and is extended once with this component's staged
//! `pkg-config` and data directories, so each later repository can find the
//! ones built before it.

use std::collections::BTreeMap;
use std::path::Path;

/// Search path for `.pc` files.
pub const PKG_CONFIG_LIBDIR: &str = "PKG_CONFIG_LIBDIR";

/// Search path for shared data (vala bindings, gir, ...).
pub const XDG_DATA_DIRS: &str = "XDG_DATA_DIRS";

/// Ordered variable name → value mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnv {
    vars: BTreeMap<String, String>,
}

impl BuildEnv {
    /// Copy of this process's environment. Variables that are not valid
    /// UTF-8 are left out; they are still inherited by child processes.
    pub fn inherit() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Set every variable of `overrides`, replacing existing values.
    pub fn overlay(&mut self, overrides: &BTreeMap<String, String>) {
        self.vars
            .extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Append `path` to a colon-separated search path.
    ///
    /// An unset or empty variable becomes just `path`.
    pub fn append_path(&mut self, key: &str, path: &Path) {
        let path = path.to_string_lossy();
        let value = match self.vars.get(key).filter(|v| !v.is_empty()) {
            Some(existing) => format!("{existing}:{path}"),
            None => path.into_owned(),
        };
        self.vars.insert(key.to_string(), value);
    }

    /// Extend the search paths with the staged install prefix.
    ///
    /// `staged_prefix` is `<stage>/<prefix>`, e.g. `stage/opt/rygel`.
    pub fn with_staged_prefix(mut self, staged_prefix: &Path) -> Self {
        self.append_path(PKG_CONFIG_LIBDIR, &staged_prefix.join("lib/pkgconfig"));
        self.append_path(XDG_DATA_DIRS, &staged_prefix.join("share"));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_prefix_appends_to_parent_values() {
        let parent = BuildEnv::from_vars([
            (PKG_CONFIG_LIBDIR, "/sysroot/usr/lib/pkgconfig"),
            (XDG_DATA_DIRS, "/sysroot/usr/share"),
            ("CC", "arm-linux-gnueabihf-gcc"),
        ]);

        let env = parent
            .clone()
            .with_staged_prefix(Path::new("/pkg/stage/opt/rygel"));

        assert_eq!(
            env.get(PKG_CONFIG_LIBDIR),
            Some("/sysroot/usr/lib/pkgconfig:/pkg/stage/opt/rygel/lib/pkgconfig")
        );
        assert_eq!(
            env.get(XDG_DATA_DIRS),
            Some("/sysroot/usr/share:/pkg/stage/opt/rygel/share")
        );
        assert_eq!(env.get("CC"), parent.get("CC"));
    }

    #[test]
    fn test_append_to_unset_variable_has_no_leading_colon() {
        let env = BuildEnv::default().with_staged_prefix(Path::new("/s/opt/rygel"));
        assert_eq!(env.get(PKG_CONFIG_LIBDIR), Some("/s/opt/rygel/lib/pkgconfig"));
        assert_eq!(env.get(XDG_DATA_DIRS), Some("/s/opt/rygel/share"));
    }

    #[test]
    fn test_overlay_replaces_values() {
        let mut env = BuildEnv::from_vars([("A", "1"), ("B", "2")]);
        let overrides = BTreeMap::from([("B".to_string(), "3".to_string())]);
        env.overlay(&overrides);
        assert_eq!(env.get("A"), Some("1"));
        assert_eq!(env.get("B"), Some("3"));
    }
}
