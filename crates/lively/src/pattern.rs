// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Reload pattern tokens.
//!
//! A [`ReloadPattern`] is an opaque string as far as the queue is concerned.
//! Two shapes are understood by the injected client script:
//!
//! - a URL glob such as `/`, `/docs/` or `**`: reload any page it matches
//! - `patch:<url>` such as `patch:/style.css`: swap that asset in place
//!
//! The only server-side interpretation is [`ReloadPattern::matches_page`],
//! used when a client subscribes with the page it is showing.

use globset::GlobBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};

const PATCH_PREFIX: &str = "patch:";

/// Token telling clients what to refresh.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReloadPattern(String);

impl ReloadPattern {
    /// Wraps a raw token as produced by a callback.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Full reload of pages matching a URL glob.
    pub fn page(url: impl AsRef<str>) -> Self {
        Self(url.as_ref().to_string())
    }

    /// Hot-patch of a single asset.
    pub fn patch(url: impl AsRef<str>) -> Self {
        Self(format!("{}{}", PATCH_PREFIX, url.as_ref()))
    }

    /// Full reload of every page.
    pub fn everything() -> Self {
        Self("**".to_string())
    }

    /// The raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Asset URL for `patch:` tokens.
    pub fn patched_asset(&self) -> Option<&str> {
        self.0.strip_prefix(PATCH_PREFIX)
    }

    /// Whether a client showing `page` should receive this token.
    ///
    /// Patch tokens go to everyone since any page may reference the asset.
    /// Page tokens are matched as globs where `*` stays within one segment.
    pub fn matches_page(&self, page: &str) -> bool {
        if self.patched_asset().is_some() {
            return true;
        }
        let page = normalize_page(page);
        match GlobBuilder::new(&self.0).literal_separator(true).build() {
            Ok(glob) => glob.compile_matcher().is_match(page.as_str()),
            Err(_) => self.0 == page,
        }
    }
}

impl fmt::Display for ReloadPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReloadPattern {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ReloadPattern {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// `/docs/index.html` and `/docs/` name the same page.
fn normalize_page(page: &str) -> String {
    let page = if page.starts_with('/') {
        page.to_string()
    } else {
        format!("/{}", page)
    };
    for index in ["index.html", "index.htm"] {
        if let Some(dir) = page.strip_suffix(index) {
            if dir.ends_with('/') {
                return dir.to_string();
            }
        }
    }
    page
}

/// Translates a source file under `root` to the URL it is served at.
///
/// Returns `None` when `path` is not inside `root`.
pub fn url_for_source(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    Some(format!("/{}", segments.join("/")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_patch_token_shape() {
        let p = ReloadPattern::patch("/style.css");
        assert_eq!(p.as_str(), "patch:/style.css");
        assert_eq!(p.patched_asset(), Some("/style.css"));
        assert_eq!(ReloadPattern::page("/").patched_asset(), None);
    }

    #[test]
    fn test_page_matching() {
        assert!(ReloadPattern::page("/").matches_page("/"));
        assert!(ReloadPattern::page("/").matches_page("/index.html"));
        assert!(!ReloadPattern::page("/").matches_page("/docs/"));
        assert!(ReloadPattern::page("/docs/").matches_page("/docs/index.htm"));
        assert!(ReloadPattern::everything().matches_page("/deep/nested/page.html"));
        assert!(ReloadPattern::page("/blog/*.html").matches_page("/blog/post.html"));
        assert!(!ReloadPattern::page("/blog/*.html").matches_page("/blog/2024/post.html"));
        assert!(ReloadPattern::page("/blog/**").matches_page("/blog/2024/post.html"));
    }

    #[test]
    fn test_patch_matches_every_page() {
        assert!(ReloadPattern::patch("/app.js").matches_page("/anything/"));
    }

    #[test]
    fn test_invalid_glob_falls_back_to_equality() {
        let p = ReloadPattern::page("/weird[");
        assert!(p.matches_page("/weird["));
        assert!(!p.matches_page("/weird"));
    }

    #[test]
    fn test_url_for_source() {
        let root = PathBuf::from("/site");
        assert_eq!(
            url_for_source(&root, Path::new("/site/index.html")),
            Some("/index.html".to_string())
        );
        assert_eq!(
            url_for_source(&root, Path::new("/site/css/style.css")),
            Some("/css/style.css".to_string())
        );
        assert_eq!(url_for_source(&root, Path::new("/other/a.css")), None);
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let json = serde_json::to_string(&vec![ReloadPattern::page("/")]).unwrap();
        assert_eq!(json, r#"["/"]"#);
    }
}
