// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! URL path to filesystem resolution.
//!
//! [`PathResolver::resolve`] is deterministic for a given filesystem state and
//! keeps no cache between requests, so a file edited between two requests is
//! always seen fresh.
//!
//! # Resolution Order
//!
//! 1. Strip query/fragment, percent-decode, strip the configured URL prefix
//! 2. Normalize `.`/`..` segments, rejecting anything that escapes the root
//! 3. Existing file: [`PathKind::File`]
//! 4. Existing directory: redirect to the slash-terminated URL, then
//!    `index.html`/`index.htm`, then a generated listing
//! 5. Extensionless module import: `path.js`
//! 6. Otherwise `<base>/404.html` as [`PathKind::CustomError`], or
//!    [`PathKind::NotFound`]

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LivelyError, Result};

/// Characters escaped in generated listing links.
const HREF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const INDEX_FILES: [&str; 2] = ["index.html", "index.htm"];

/// Settings for a [`PathResolver`].
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Directory content is served from.
    pub root: PathBuf,
    /// Directory searched for `<status>.html` error pages.
    pub base: PathBuf,
    /// URL prefix stripped before resolution (e.g. `/blog`).
    pub prefix: Option<String>,
    /// Treat requests without the prefix as not found.
    pub require_prefix: bool,
    /// Generate listings for directories without an index document.
    pub directory_listing: bool,
}

impl ResolverOptions {
    /// Options serving `root` with error pages from the same directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            base: root.clone(),
            root,
            prefix: None,
            require_prefix: false,
            directory_listing: true,
        }
    }

    /// Sets the error page directory.
    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = base.into();
        self
    }

    /// Sets the URL prefix to strip.
    pub fn with_prefix(mut self, prefix: impl Into<String>, required: bool) -> Self {
        self.prefix = Some(prefix.into());
        self.require_prefix = required;
        self
    }

    /// Enables or disables generated directory listings.
    pub fn with_directory_listing(mut self, enabled: bool) -> Self {
        self.directory_listing = enabled;
        self
    }
}

/// What a request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKind {
    /// A regular file (including a directory's index document).
    File,
    /// A directory without an index document; serve a generated listing.
    DirectoryIndex,
    /// A directory requested without its trailing slash.
    Redirect {
        /// Where to send the client.
        location: String,
    },
    /// Nothing found, but the base directory has a page for this status.
    CustomError {
        /// HTTP status the page stands for.
        status: u16,
    },
    /// Nothing found and no custom page.
    NotFound,
}

/// Resolved filesystem target for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPath {
    /// The URL path as requested (without query string).
    pub request_path: String,
    /// Absolute filesystem path, when there is something to read.
    pub fs_path: Option<PathBuf>,
    /// Resolution outcome.
    pub kind: PathKind,
}

impl ServerPath {
    /// HTTP status the response should carry.
    pub fn status(&self) -> u16 {
        match &self.kind {
            PathKind::File | PathKind::DirectoryIndex => 200,
            PathKind::Redirect { .. } => 301,
            PathKind::CustomError { status } => *status,
            PathKind::NotFound => 404,
        }
    }

    /// True if the response body is HTML and should carry the reload script.
    pub fn is_html(&self) -> bool {
        match &self.kind {
            PathKind::DirectoryIndex | PathKind::CustomError { .. } => true,
            PathKind::File => self.fs_path.as_deref().is_some_and(is_html_file),
            _ => false,
        }
    }

    fn not_found(request_path: &str) -> Self {
        Self {
            request_path: request_path.to_string(),
            fs_path: None,
            kind: PathKind::NotFound,
        }
    }
}

/// Maps request paths onto the served directory tree.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    base: PathBuf,
    prefix: Option<String>,
    require_prefix: bool,
    directory_listing: bool,
}

impl PathResolver {
    /// Creates a resolver, failing if root or base is not a directory.
    pub fn new(options: ResolverOptions) -> Result<Self> {
        if !options.root.is_dir() {
            return Err(LivelyError::missing_dir("Root", &options.root));
        }
        if !options.base.is_dir() {
            return Err(LivelyError::missing_dir("Base", &options.base));
        }

        let prefix = options
            .prefix
            .map(|p| format!("/{}", p.trim_matches('/')))
            .filter(|p| p != "/");

        Ok(Self {
            root: options.root.canonicalize()?,
            base: options.base.canonicalize()?,
            prefix,
            require_prefix: options.require_prefix,
            directory_listing: options.directory_listing,
        })
    }

    /// Canonical served root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical error page directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Normalized URL prefix, if any (always `/`-led, never `/`-terminated).
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Resolves a request path. Never fails; problems become not-found.
    pub fn resolve(&self, raw: &str) -> ServerPath {
        let request_path = raw.split(['?', '#']).next().unwrap_or_default();
        let request_path = if request_path.is_empty() { "/" } else { request_path };
        let decoded = percent_decode_str(request_path)
            .decode_utf8_lossy()
            .into_owned();

        match self.locate(request_path, &decoded, raw) {
            Ok(found) => found,
            Err(reason) => {
                let err = LivelyError::Resolution {
                    path: request_path.to_string(),
                    reason,
                };
                tracing::debug!("{}", err);
                self.not_found_page(request_path)
            }
        }
    }

    /// Finds `<base>/<status>.html`.
    pub fn error_page(&self, status: u16) -> Option<PathBuf> {
        let page = self.base.join(format!("{}.html", status));
        page.is_file().then_some(page)
    }

    /// Maps an URL path seen by a browser onto the root-relative URL space
    /// that reload patterns live in.
    pub fn page_url(&self, url: &str) -> Option<String> {
        let decoded = percent_decode_str(url).decode_utf8_lossy().into_owned();
        let stripped = match &self.prefix {
            Some(prefix) => strip_url_prefix(&decoded, prefix)?,
            None => decoded,
        };
        Some(if stripped.is_empty() { "/".to_string() } else { stripped })
    }

    fn not_found_page(&self, request_path: &str) -> ServerPath {
        match self.error_page(404) {
            Some(page) => ServerPath {
                request_path: request_path.to_string(),
                fs_path: Some(page),
                kind: PathKind::CustomError { status: 404 },
            },
            None => ServerPath::not_found(request_path),
        }
    }

    fn locate(
        &self,
        request_path: &str,
        decoded: &str,
        raw: &str,
    ) -> std::result::Result<ServerPath, String> {
        let relative = match &self.prefix {
            Some(prefix) => match strip_url_prefix(decoded, prefix) {
                Some(rest) => rest,
                None if self.require_prefix => return Err("missing URL prefix".to_string()),
                None => decoded.to_string(),
            },
            None => decoded.to_string(),
        };

        let segments = normalize_segments(&relative)?;
        let mut target = self.root.clone();
        target.extend(&segments);

        if target.exists() {
            self.ensure_within_root(&target)?;
        }

        let wants_dir = decoded.ends_with('/');

        if target.is_file() {
            if wants_dir && !segments.is_empty() {
                return Err("file requested as directory".to_string());
            }
            return Ok(ServerPath {
                request_path: request_path.to_string(),
                fs_path: Some(target),
                kind: PathKind::File,
            });
        }

        if target.is_dir() {
            if !wants_dir {
                let query = raw
                    .find('?')
                    .map(|i| &raw[i..])
                    .unwrap_or_default();
                return Ok(ServerPath {
                    request_path: request_path.to_string(),
                    fs_path: Some(target),
                    kind: PathKind::Redirect {
                        location: format!("{}/{}", request_path, query),
                    },
                });
            }

            for index in INDEX_FILES {
                let candidate = target.join(index);
                if candidate.is_file() {
                    return Ok(ServerPath {
                        request_path: request_path.to_string(),
                        fs_path: Some(candidate),
                        kind: PathKind::File,
                    });
                }
            }

            if self.directory_listing {
                return Ok(ServerPath {
                    request_path: request_path.to_string(),
                    fs_path: Some(target),
                    kind: PathKind::DirectoryIndex,
                });
            }
            return Err("directory has no index".to_string());
        }

        // `import "./util"` from an ES module
        if !wants_dir && target.extension().is_none() {
            let module = target.with_extension("js");
            if module.is_file() {
                self.ensure_within_root(&module)?;
                return Ok(ServerPath {
                    request_path: request_path.to_string(),
                    fs_path: Some(module),
                    kind: PathKind::File,
                });
            }
        }

        Err("no such file".to_string())
    }

    /// Symlinks may point anywhere; the real location must stay under root.
    fn ensure_within_root(&self, path: &Path) -> std::result::Result<(), String> {
        let canonical = path.canonicalize().map_err(|e| e.to_string())?;
        if canonical.starts_with(&self.root) {
            Ok(())
        } else {
            Err("path escapes root".to_string())
        }
    }
}

/// Strips `prefix` from `path`; `None` if `path` is outside it.
fn strip_url_prefix(path: &str, prefix: &str) -> Option<String> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest.to_string())
    } else {
        None
    }
}

fn normalize_segments(path: &str) -> std::result::Result<Vec<String>, String> {
    let mut segments: Vec<String> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err("path traversal outside root".to_string());
                }
            }
            s if s.contains('\\') || s.contains('\0') => {
                return Err("illegal character in path".to_string());
            }
            s => segments.push(s.to_string()),
        }
    }
    Ok(segments)
}

/// True for `.html`/`.htm` files.
pub fn is_html_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
}

/// Renders an HTML listing of `dir` for the URL `request_path`.
pub fn render_listing(dir: &Path, request_path: &str) -> std::io::Result<String> {
    let mut entries: Vec<(String, bool)> = fs::read_dir(dir)?
        .flatten()
        .map(|entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            (entry.file_name().to_string_lossy().into_owned(), is_dir)
        })
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let title = html_escape(&percent_decode_str(request_path).decode_utf8_lossy());
    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Directory listing for {0}</title>\n</head>\n<body>\n<h1>Directory listing for {0}</h1>\n<hr>\n<ul>\n",
        title
    );
    for (name, is_dir) in entries {
        let suffix = if is_dir { "/" } else { "" };
        let _ = writeln!(
            html,
            "<li><a href=\"{}{}\">{}{}</a></li>",
            utf8_percent_encode(&name, HREF),
            suffix,
            html_escape(&name),
            suffix
        );
    }
    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");
    Ok(html)
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn setup_site(dir: &Path) {
        fs::write(dir.join("index.html"), "<h1>Home</h1>").unwrap();
        fs::write(dir.join("style.css"), "body {}").unwrap();
        fs::create_dir_all(dir.join("docs")).unwrap();
        fs::write(dir.join("docs/index.htm"), "<h1>Docs</h1>").unwrap();
        fs::create_dir_all(dir.join("assets/img")).unwrap();
        fs::write(dir.join("assets/logo.svg"), "<svg/>").unwrap();
        fs::write(dir.join("util.js"), "export {}").unwrap();
    }

    fn resolver(dir: &Path) -> PathResolver {
        PathResolver::new(ResolverOptions::new(dir)).unwrap()
    }

    #[test]
    fn test_missing_root_is_config_error() {
        let err = PathResolver::new(ResolverOptions::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, LivelyError::Config(_)));
    }

    #[test]
    fn test_empty_path_maps_to_root_index() {
        let dir = tempdir().unwrap();
        setup_site(dir.path());
        let r = resolver(dir.path());

        for path in ["", "/"] {
            let sp = r.resolve(path);
            assert_eq!(sp.kind, PathKind::File);
            assert_eq!(sp.fs_path.unwrap(), r.root().join("index.html"));
        }
    }

    #[test]
    fn test_file_and_htm_index() {
        let dir = tempdir().unwrap();
        setup_site(dir.path());
        let r = resolver(dir.path());

        let css = r.resolve("/style.css?v=3");
        assert_eq!(css.kind, PathKind::File);
        assert!(!css.is_html());

        let docs = r.resolve("/docs/");
        assert_eq!(docs.fs_path.unwrap(), r.root().join("docs/index.htm"));
    }

    #[test]
    fn test_directory_redirect_keeps_query() {
        let dir = tempdir().unwrap();
        setup_site(dir.path());
        let r = resolver(dir.path());

        let sp = r.resolve("/docs?tab=1");
        assert_eq!(
            sp.kind,
            PathKind::Redirect {
                location: "/docs/?tab=1".to_string()
            }
        );
        assert_eq!(sp.status(), 301);
    }

    #[test]
    fn test_directory_listing_toggle() {
        let dir = tempdir().unwrap();
        setup_site(dir.path());

        let sp = resolver(dir.path()).resolve("/assets/");
        assert_eq!(sp.kind, PathKind::DirectoryIndex);
        assert!(sp.is_html());

        let strict =
            PathResolver::new(ResolverOptions::new(dir.path()).with_directory_listing(false))
                .unwrap();
        assert_eq!(strict.resolve("/assets/").kind, PathKind::NotFound);
    }

    #[test]
    fn test_traversal_is_rejected() {
        let dir = tempdir().unwrap();
        let site = dir.path().join("site");
        fs::create_dir_all(&site).unwrap();
        fs::write(dir.path().join("secret.txt"), "nope").unwrap();
        let r = resolver(&site);

        assert_eq!(r.resolve("/../secret.txt").kind, PathKind::NotFound);
        assert_eq!(r.resolve("/%2e%2e/secret.txt").kind, PathKind::NotFound);
        // Staying inside the root is fine
        fs::write(site.join("a.txt"), "a").unwrap();
        assert_eq!(r.resolve("/x/../a.txt").kind, PathKind::File);
    }

    #[test]
    fn test_custom_404_from_base() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("public");
        let base = dir.path().join("errors");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join("404.html"), "<h1>Lost</h1>").unwrap();

        let r = PathResolver::new(ResolverOptions::new(&root).with_base(&base)).unwrap();
        let sp = r.resolve("/missing");
        assert_eq!(sp.kind, PathKind::CustomError { status: 404 });
        assert_eq!(sp.status(), 404);
        assert_eq!(sp.fs_path.unwrap(), r.base().join("404.html"));
        assert!(r.error_page(500).is_none());
    }

    #[test]
    fn test_prefix_stripping() {
        let dir = tempdir().unwrap();
        setup_site(dir.path());

        let lenient =
            PathResolver::new(ResolverOptions::new(dir.path()).with_prefix("/blog/", false))
                .unwrap();
        assert_eq!(lenient.prefix(), Some("/blog"));
        assert_eq!(lenient.resolve("/blog/style.css").kind, PathKind::File);
        assert_eq!(lenient.resolve("/style.css").kind, PathKind::File);
        assert_eq!(lenient.resolve("/blogstyle.css").kind, PathKind::NotFound);
        assert_eq!(
            lenient.resolve("/blog").kind,
            PathKind::Redirect {
                location: "/blog/".to_string()
            }
        );

        let strict =
            PathResolver::new(ResolverOptions::new(dir.path()).with_prefix("blog", true)).unwrap();
        assert_eq!(strict.resolve("/style.css").kind, PathKind::NotFound);
        assert_eq!(strict.resolve("/blog/").kind, PathKind::File);
        assert_eq!(strict.page_url("/blog/docs/"), Some("/docs/".to_string()));
        assert_eq!(strict.page_url("/elsewhere"), None);
    }

    #[test]
    fn test_module_fallback() {
        let dir = tempdir().unwrap();
        setup_site(dir.path());
        let sp = resolver(dir.path()).resolve("/util");
        assert_eq!(sp.kind, PathKind::File);
        assert!(sp.fs_path.unwrap().ends_with("util.js"));
    }

    #[cfg(unix)]
    #[test]
    fn test_module_fallback_through_symlink_stays_in_root() {
        let dir = tempdir().unwrap();
        let site = dir.path().join("site");
        let outside = dir.path().join("outside");
        fs::create_dir_all(&site).unwrap();
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("secret.js"), "nope").unwrap();
        std::os::unix::fs::symlink(&outside, site.join("linked")).unwrap();

        let r = resolver(&site);
        assert_eq!(r.resolve("/linked/secret").kind, PathKind::NotFound);
        assert_eq!(r.resolve("/linked/secret.js").kind, PathKind::NotFound);
    }

    #[test]
    fn test_file_with_trailing_slash_is_not_found() {
        let dir = tempdir().unwrap();
        setup_site(dir.path());
        assert_eq!(resolver(dir.path()).resolve("/style.css/").kind, PathKind::NotFound);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let dir = tempdir().unwrap();
        setup_site(dir.path());
        let r = resolver(dir.path());
        for path in ["/", "/docs", "/assets/", "/nope", "/util"] {
            assert_eq!(r.resolve(path), r.resolve(path));
        }
    }

    #[test]
    fn test_listing_escapes_names() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a <b>.txt"), "x").unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();

        let html = render_listing(dir.path(), "/").unwrap();
        assert!(html.contains("<a href=\"sub/\">sub/</a>"));
        assert!(html.contains("href=\"a%20%3Cb%3E.txt\""));
        assert!(html.contains("a &lt;b&gt;.txt"));
    }
}
