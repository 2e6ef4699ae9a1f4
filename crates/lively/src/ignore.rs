// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Ignore rules for watched paths.
//!
//! Patterns are anchored at the server root:
//!
//! - `drafts/notes.html` ignores exactly that file
//! - `drafts` or `drafts/` ignores the directory and everything beneath it
//! - `**/*.tmp` and `build/*.map` are globs (`*` stays within one segment)
//!
//! Absolute patterns are matched against absolute paths, which lets a rule
//! name something outside the root (a second watch path, for instance).

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};

use crate::error::{LivelyError, Result};

/// Decides whether a changed path should be dropped before dispatch.
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    root: PathBuf,
    relative: GlobSet,
    absolute: GlobSet,
    patterns: Vec<String>,
}

impl IgnoreMatcher {
    /// A matcher that ignores nothing.
    pub fn empty() -> Self {
        Self {
            root: PathBuf::new(),
            relative: GlobSet::empty(),
            absolute: GlobSet::empty(),
            patterns: Vec::new(),
        }
    }

    /// Compiles ignore patterns anchored at `root`.
    pub fn new<I, S>(root: impl Into<PathBuf>, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let root = root.into();
        let mut relative = GlobSetBuilder::new();
        let mut absolute = GlobSetBuilder::new();
        let mut kept = Vec::new();

        for pattern in patterns {
            let raw = pattern.as_ref();
            let cleaned = clean_pattern(raw);
            if cleaned.is_empty() {
                continue;
            }

            let (builder, anchored) = if cleaned.starts_with('/') {
                match Path::new(&cleaned).strip_prefix(&root) {
                    Ok(rel) => (&mut relative, to_slash(rel)),
                    Err(_) => (&mut absolute, cleaned.clone()),
                }
            } else {
                (&mut relative, cleaned.clone())
            };

            // The pattern itself, plus everything beneath it when it names a directory.
            for candidate in [anchored.clone(), format!("{}/**", anchored)] {
                let glob = GlobBuilder::new(&candidate)
                    .literal_separator(true)
                    .build()
                    .map_err(|e| LivelyError::pattern(raw, e))?;
                builder.add(glob);
            }
            kept.push(raw.to_string());
        }

        Ok(Self {
            root,
            relative: relative.build().map_err(|e| LivelyError::pattern("<set>", e))?,
            absolute: absolute.build().map_err(|e| LivelyError::pattern("<set>", e))?,
            patterns: kept,
        })
    }

    /// Returns true if changes to `path` must not trigger reloads.
    pub fn should_ignore(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        if let Ok(rel) = path.strip_prefix(&self.root) {
            if self.relative.is_match(to_slash(rel)) {
                return true;
            }
        } else if path.is_relative() && self.relative.is_match(to_slash(path)) {
            return true;
        }

        self.absolute.is_match(to_slash(path))
    }

    /// The configured patterns, as given.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// True when no patterns are configured.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for IgnoreMatcher {
    fn default() -> Self {
        Self::empty()
    }
}

fn clean_pattern(raw: &str) -> String {
    let mut p = raw.trim().replace('\\', "/");
    while let Some(rest) = p.strip_prefix("./") {
        p = rest.to_string();
    }
    while p.len() > 1 && p.ends_with('/') {
        p.pop();
    }
    p
}

fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(patterns: &[&str]) -> IgnoreMatcher {
        IgnoreMatcher::new("/site", patterns.iter().copied()).unwrap()
    }

    #[test]
    fn test_empty_ignores_nothing() {
        let m = IgnoreMatcher::empty();
        assert!(!m.should_ignore(Path::new("/site/index.html")));
        assert!(m.is_empty());
    }

    #[test]
    fn test_exact_file() {
        let m = matcher(&["drafts/notes.html"]);
        assert!(m.should_ignore(Path::new("/site/drafts/notes.html")));
        assert!(!m.should_ignore(Path::new("/site/drafts/other.html")));
    }

    #[test]
    fn test_directory_scope() {
        let m = matcher(&["node_modules/"]);
        assert!(m.should_ignore(Path::new("/site/node_modules")));
        assert!(m.should_ignore(Path::new("/site/node_modules/pkg/index.js")));
        assert!(!m.should_ignore(Path::new("/site/src/node_modules.txt")));
    }

    #[test]
    fn test_globs() {
        let m = matcher(&["**/*.tmp", "build/*.map"]);
        assert!(m.should_ignore(Path::new("/site/a/b/c.tmp")));
        assert!(m.should_ignore(Path::new("/site/build/app.js.map")));
        assert!(!m.should_ignore(Path::new("/site/build/sub/app.js.map")));
    }

    #[test]
    fn test_absolute_patterns() {
        let m = matcher(&["/site/private", "/elsewhere/cache"]);
        assert!(m.should_ignore(Path::new("/site/private/key.html")));
        assert!(m.should_ignore(Path::new("/elsewhere/cache/x.css")));
        assert!(!m.should_ignore(Path::new("/elsewhere/other.css")));
    }

    #[test]
    fn test_dot_slash_prefix() {
        let m = matcher(&["./drafts"]);
        assert!(m.should_ignore(Path::new("/site/drafts/a.html")));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let err = IgnoreMatcher::new("/site", ["a[b"]).unwrap_err();
        assert!(matches!(err, LivelyError::Pattern { .. }));
    }
}
