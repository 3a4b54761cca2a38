//! Declarative file matching. A [`PatternSet`] is an ordered list of glob
//! strings where a leading `!` marks an exclusion. Excludes only ever remove
//! paths from the matched set; they never add to it.

use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;

use crate::error::PatternError;

/// A single file matched by a pattern set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matched {
    /// Path relative to the project root, e.g. `src/images/icons/x.png`.
    pub path: Utf8PathBuf,
    /// Path relative to the base of the pattern that matched it, e.g.
    /// `icons/x.png`. Pipelines use this to lay out the output tree.
    pub rel: Utf8PathBuf,
}

#[derive(Clone)]
struct Include {
    pattern: Pattern,
    /// Raw pattern text, joined onto the project root at resolve time.
    raw: String,
    /// Non-glob prefix of the pattern, used as the copy base and as the
    /// directory to register with the file watcher.
    base: Utf8PathBuf,
}

/// Ordered glob patterns with `!`-prefixed exclusions.
#[derive(Clone)]
pub struct PatternSet {
    includes: Vec<Include>,
    excludes: Vec<Pattern>,
}

impl PatternSet {
    pub fn new<I, S>(patterns: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut includes = Vec::new();
        let mut excludes = Vec::new();

        for pattern in patterns {
            let pattern = pattern.into();

            if let Some(negated) = pattern.strip_prefix('!') {
                excludes.push(Pattern::new(negated)?);
            } else {
                let base = glob_base(&pattern);
                includes.push(Include {
                    pattern: Pattern::new(&pattern)?,
                    raw: pattern,
                    base,
                });
            }
        }

        Ok(Self { includes, excludes })
    }

    /// Resolve the set against the filesystem, lazily, at call time.
    ///
    /// Results follow include-pattern declaration order; files matched by one
    /// pattern are sorted lexicographically. A path matching any exclude is
    /// never returned, even if it matches an include.
    pub fn resolve(&self, root: &Utf8Path) -> Result<Vec<Matched>, PatternError> {
        let mut seen = std::collections::HashSet::new();
        let mut matched = Vec::new();

        for include in &self.includes {
            let full = root.join(&include.raw);
            let mut batch = Vec::new();

            for entry in glob::glob(full.as_str())? {
                let path = match entry {
                    Ok(path) => path,
                    Err(err) => {
                        tracing::warn!("skipping unreadable path: {err}");
                        continue;
                    }
                };

                if !path.is_file() {
                    continue;
                }

                let path = Utf8PathBuf::try_from(path)?;
                let path = match path.strip_prefix(root) {
                    Ok(rel) => rel.to_path_buf(),
                    Err(_) => path,
                };

                if self.is_excluded(&path) {
                    continue;
                }

                batch.push(path);
            }

            batch.sort();

            for path in batch {
                if !seen.insert(path.clone()) {
                    continue;
                }

                let rel = match path.strip_prefix(&include.base) {
                    Ok(rel) => rel.to_path_buf(),
                    Err(_) => path.clone(),
                };

                matched.push(Matched { path, rel });
            }
        }

        Ok(matched)
    }

    /// Check a root-relative path against the set, without touching the
    /// filesystem. Used by the watch dispatcher to map change events to
    /// bindings.
    pub fn matches(&self, path: &Utf8Path) -> bool {
        if self.is_excluded(path) {
            return false;
        }

        self.includes
            .iter()
            .any(|include| include.pattern.matches(path.as_str()))
    }

    /// Distinct non-glob prefixes of the include patterns; these are the
    /// directories worth registering with a recursive file watcher.
    pub fn bases(&self) -> impl Iterator<Item = &Utf8Path> {
        self.includes.iter().map(|include| include.base.as_path())
    }

    fn is_excluded(&self, path: &Utf8Path) -> bool {
        self.excludes
            .iter()
            .any(|pattern| pattern.matches(path.as_str()))
    }
}

/// The leading part of a glob pattern up to the first component containing a
/// metacharacter. For a literal path this is its parent directory.
fn glob_base(pattern: &str) -> Utf8PathBuf {
    let meta = pattern
        .find(['*', '?', '['])
        .unwrap_or(pattern.len());

    match pattern[..meta].rfind('/') {
        Some(slash) => Utf8PathBuf::from(&pattern[..slash]),
        None => Utf8PathBuf::new(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    fn touch(root: &std::path::Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn excludes_always_win() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/scripts/app.js");
        touch(dir.path(), "src/scripts/vendor/lib.js");

        let set = PatternSet::new([
            "src/scripts/**/*.js",
            "!src/scripts/vendor/**/*.js",
        ])
        .unwrap();

        let root = Utf8Path::from_path(dir.path()).unwrap();
        let matched = set.resolve(root).unwrap();

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].path, Utf8Path::new("src/scripts/app.js"));
        assert!(!set.matches(Utf8Path::new("src/scripts/vendor/lib.js")));
        assert!(set.matches(Utf8Path::new("src/scripts/app.js")));
    }

    #[test]
    fn declaration_order_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "vendor/jquery.js");
        touch(dir.path(), "src/scripts/main.js");

        let set = PatternSet::new(["vendor/jquery.js", "src/scripts/main.js"]).unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let matched = set.resolve(root).unwrap();

        let paths: Vec<_> = matched.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, ["vendor/jquery.js", "src/scripts/main.js"]);
    }

    #[test]
    fn rel_is_relative_to_pattern_base() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/images/icons/x.png");

        let set = PatternSet::new(["src/images/**/*.png"]).unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let matched = set.resolve(root).unwrap();

        assert_eq!(matched[0].rel, Utf8Path::new("icons/x.png"));
    }

    #[test]
    fn literal_pattern_base_is_its_directory() {
        assert_eq!(glob_base("src/scripts/main.js"), "src/scripts");
        assert_eq!(glob_base("src/images/**/*.png"), "src/images");
        assert_eq!(glob_base("*.html"), "");
    }
}
