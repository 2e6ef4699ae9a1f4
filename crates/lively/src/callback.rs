// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Reload callbacks.
//!
//! A [`ReloadCallback`] turns one [`ChangeEvent`] into zero or more
//! [`ReloadPattern`]s. The [`CallbackRegistry`] maps file extensions and
//! globs to callbacks:
//!
//! | Matcher        | Default callback   | Produces                       |
//! |----------------|--------------------|--------------------------------|
//! | `html`, `htm`  | [`HtmlCallback`]   | reload of the page's own URL   |
//! | `css`, `js`    | [`StaticCallback`] | `patch:<url>` for the asset    |
//!
//! Registering a callback under a matcher that already exists replaces the
//! previous one. Different matchers that all match a file all run, in
//! registration order.

use globset::{GlobBuilder, GlobMatcher};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{CallbackError, LivelyError, Result};
use crate::event::{ChangeEvent, ChangeKind};
use crate::pattern::{url_for_source, ReloadPattern};

/// Outcome of one callback invocation.
pub type CallbackResult = std::result::Result<Vec<ReloadPattern>, CallbackError>;

/// Turns a filesystem change into reload patterns.
pub trait ReloadCallback: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Produces patterns for a change to `event.path` under `root`.
    fn handle(&self, root: &Path, event: &ChangeEvent) -> CallbackResult;
}

/// Reloads the page an HTML file is served as.
///
/// `index.html` maps to its directory URL (`/docs/index.html` → `/docs/`).
/// Files outside the root cannot be mapped to a page and reload everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlCallback;

impl ReloadCallback for HtmlCallback {
    fn name(&self) -> &str {
        "html"
    }

    fn handle(&self, root: &Path, event: &ChangeEvent) -> CallbackResult {
        let Some(url) = url_for_source(root, &event.path) else {
            return Ok(vec![ReloadPattern::everything()]);
        };

        let page = ["index.html", "index.htm"]
            .iter()
            .find_map(|index| url.strip_suffix(index).filter(|dir| dir.ends_with('/')))
            .map(str::to_string)
            .unwrap_or(url);

        Ok(vec![ReloadPattern::page(page)])
    }
}

/// Hot-patches stylesheets and scripts without a full reload.
///
/// A deleted asset cannot be patched, so deletion reloads every page.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticCallback;

impl ReloadCallback for StaticCallback {
    fn name(&self) -> &str {
        "static"
    }

    fn handle(&self, root: &Path, event: &ChangeEvent) -> CallbackResult {
        if event.kind == ChangeKind::Deleted {
            return Ok(vec![ReloadPattern::everything()]);
        }
        Ok(vec![match url_for_source(root, &event.path) {
            Some(url) => ReloadPattern::patch(url),
            None => ReloadPattern::everything(),
        }])
    }
}

/// Adapts a closure into a [`ReloadCallback`].
pub struct FnCallback<F> {
    name: String,
    f: F,
}

impl<F> FnCallback<F>
where
    F: Fn(&Path, &ChangeEvent) -> CallbackResult + Send + Sync,
{
    /// Wraps `f` under `name`.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> ReloadCallback for FnCallback<F>
where
    F: Fn(&Path, &ChangeEvent) -> CallbackResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, root: &Path, event: &ChangeEvent) -> CallbackResult {
        (self.f)(root, event)
    }
}

/// Which changed files a registry entry applies to.
#[derive(Clone)]
pub enum CallbackMatcher {
    /// Lowercase extension without the dot.
    Extension(String),
    /// Glob anchored at the root (`*` stays within one segment).
    Glob {
        /// Source pattern, also the override key.
        pattern: String,
        /// Compiled matcher.
        matcher: GlobMatcher,
    },
}

impl CallbackMatcher {
    /// Matches files by extension; `"md"`, `".md"` and `"*.md"` are equivalent.
    pub fn extension(ext: &str) -> Self {
        let ext = ext.trim_start_matches("*.").trim_start_matches('.');
        CallbackMatcher::Extension(ext.to_ascii_lowercase())
    }

    /// Matches files by glob relative to the root.
    pub fn glob(pattern: &str) -> Result<Self> {
        let matcher = GlobBuilder::new(pattern.trim_start_matches("./"))
            .literal_separator(true)
            .build()
            .map_err(|e| LivelyError::pattern(pattern, e))?
            .compile_matcher();
        Ok(CallbackMatcher::Glob {
            pattern: pattern.to_string(),
            matcher,
        })
    }

    /// Extension when `raw` is a bare extension, glob otherwise.
    pub fn parse(raw: &str) -> Result<Self> {
        let bare = raw.trim_start_matches("*.").trim_start_matches('.');
        let is_extension = !bare.is_empty()
            && bare
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if is_extension {
            Ok(Self::extension(bare))
        } else {
            Self::glob(raw)
        }
    }

    /// Whether a change to `path` under `root` is covered.
    pub fn matches(&self, root: &Path, path: &Path) -> bool {
        match self {
            CallbackMatcher::Extension(ext) => path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext)),
            CallbackMatcher::Glob { matcher, .. } => match path.strip_prefix(root) {
                Ok(rel) => matcher.is_match(rel),
                Err(_) => matcher.is_match(path),
            },
        }
    }

    fn key(&self) -> (&'static str, &str) {
        match self {
            CallbackMatcher::Extension(ext) => ("ext", ext),
            CallbackMatcher::Glob { pattern, .. } => ("glob", pattern),
        }
    }
}

impl PartialEq for CallbackMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl fmt::Debug for CallbackMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackMatcher::Extension(ext) => write!(f, "Extension({:?})", ext),
            CallbackMatcher::Glob { pattern, .. } => write!(f, "Glob({:?})", pattern),
        }
    }
}

/// Mapping from matcher to callback, built before serving starts.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    entries: Vec<(CallbackMatcher, Arc<dyn ReloadCallback>)>,
}

impl CallbackRegistry {
    /// An empty registry; nothing produces patterns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in HTML and static asset callbacks.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let html: Arc<dyn ReloadCallback> = Arc::new(HtmlCallback);
        let assets: Arc<dyn ReloadCallback> = Arc::new(StaticCallback);
        for ext in ["html", "htm"] {
            registry.register(CallbackMatcher::extension(ext), html.clone());
        }
        for ext in ["css", "js"] {
            registry.register(CallbackMatcher::extension(ext), assets.clone());
        }
        registry
    }

    /// Adds `callback` for `matcher`, replacing any callback already
    /// registered under the same matcher.
    pub fn register(&mut self, matcher: CallbackMatcher, callback: Arc<dyn ReloadCallback>) {
        if let Some(entry) = self.entries.iter_mut().find(|(m, _)| *m == matcher) {
            tracing::debug!(?matcher, callback = callback.name(), "Overriding callback");
            entry.1 = callback;
        } else {
            self.entries.push((matcher, callback));
        }
    }

    /// Shorthand for [`register`](Self::register) with an extension matcher.
    pub fn register_extension(&mut self, ext: &str, callback: impl ReloadCallback + 'static) {
        self.register(CallbackMatcher::extension(ext), Arc::new(callback));
    }

    /// Callbacks applying to `path`, in registration order.
    pub fn matching<'a>(
        &'a self,
        root: &'a Path,
        path: &'a Path,
    ) -> impl Iterator<Item = &'a Arc<dyn ReloadCallback>> + 'a {
        self.entries
            .iter()
            .filter(move |(m, _)| m.matches(root, path))
            .map(|(_, cb)| cb)
    }

    /// Number of registered matchers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(m, cb)| (m, cb.name())))
            .finish()
    }
}
