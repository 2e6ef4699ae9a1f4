// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Server configuration.
//!
//! Configuration is loaded from `lively.toml` in the working directory (or the
//! file given with `--config`), then command-line flags are layered on top.
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! port = 3031
//! host = "localhost"
//! root = "site"
//! base = "site/errors"
//! prefix = "/docs"
//!
//! [watch]
//! # relative to root: site/content, site/partials
//! paths = ["content", "partials"]
//! ignore = ["drafts/", "**/*.tmp"]
//!
//! [queue]
//! retention_secs = 60
//!
//! [[callbacks]]
//! pattern = "md"
//! reload = ["{dir}", "/index.html"]
//!
//! [[callbacks]]
//! pattern = "data/*.json"
//! script = "reload.lua"
//! ```

use lively::{LivelyError, ResolverOptions, RetentionPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "lively.toml";

/// Main configuration structure loaded from `lively.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Filesystem watch settings.
    #[serde(default)]
    pub watch: WatchConfig,
    /// Reload queue retention.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Custom reload callbacks, applied over the built-in ones.
    #[serde(default)]
    pub callbacks: Vec<CallbackConfig>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind (default: "localhost").
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind (default: 3031).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served (default: ".").
    #[serde(default = "default_dir")]
    pub root: PathBuf,
    /// Directory searched for `<status>.html` error pages (default: ".").
    #[serde(default = "default_dir")]
    pub base: PathBuf,
    /// URL prefix stripped before resolution.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Treat requests without the prefix as not found.
    #[serde(default)]
    pub require_prefix: bool,
    /// Generate listings for directories without an index (default: true).
    #[serde(default = "default_true")]
    pub directory_listing: bool,
    /// Suppress per-request logging.
    #[serde(default)]
    pub quiet: bool,
    /// Open the browser once the server is listening.
    #[serde(default)]
    pub open: bool,
    /// Seconds a reload poll is held open before returning empty (default: 30).
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    /// Allow cross-origin requests (useful when pages are served elsewhere).
    #[serde(default)]
    pub cors: bool,
}

/// Filesystem watch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    /// Paths watched recursively, relative ones under the served root;
    /// empty means the root itself.
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    /// Ignore patterns, anchored at the served root.
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Debounce window for raw filesystem events (default: 100).
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

/// Reload queue retention configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Maximum age of retained patterns (default: 60).
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    /// Maximum number of retained patterns (default: 1024).
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Seconds after which a silent client stops pinning history (default: 90).
    #[serde(default = "default_client_ttl_secs")]
    pub client_ttl_secs: u64,
}

/// One custom callback.
///
/// Exactly one of `script` and `reload` must be set.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackConfig {
    /// Extension (`md`, `.md`, `*.md`) or root-relative glob.
    pub pattern: String,
    /// Lua file defining `handle(root, path, kind)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<PathBuf>,
    /// Pattern templates with `{url}` and `{dir}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reload: Option<Vec<String>>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3031
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_retention_secs() -> u64 {
    60
}

fn default_capacity() -> usize {
    1024
}

fn default_client_ttl_secs() -> u64 {
    90
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            root: default_dir(),
            base: default_dir(),
            prefix: None,
            require_prefix: false,
            directory_listing: true,
            quiet: false,
            open: false,
            poll_timeout_secs: default_poll_timeout(),
            cors: false,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            ignore: Vec::new(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
            capacity: default_capacity(),
            client_ttl_secs: default_client_ttl_secs(),
        }
    }
}

/// Values given on the command line; `None`/empty leaves the file value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--root`
    pub root: Option<PathBuf>,
    /// `--base`
    pub base: Option<PathBuf>,
    /// `--host`
    pub host: Option<String>,
    /// `--port`
    pub port: Option<u16>,
    /// `--prefix`
    pub prefix: Option<String>,
    /// Positional watch paths, relative to the served root.
    pub watch: Vec<PathBuf>,
    /// `--ignore`, appended to the configured patterns.
    pub ignore: Vec<String>,
    /// `--quiet`
    pub quiet: bool,
    /// `--open`
    pub open: bool,
}

impl Config {
    /// Loads configuration from `path`, or `lively.toml` when `None`.
    ///
    /// A missing default file yields the default configuration; a missing
    /// explicit file is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (config_path, explicit) = match path {
            Some(p) => (p, true),
            None => (Path::new(CONFIG_FILE), false),
        };

        if !config_path.exists() {
            if explicit {
                anyhow::bail!("Config file '{}' not found", config_path.display());
            }
            return Ok(Config::default());
        }

        let content = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", config_path.display(), e))?;
        tracing::debug!(path = %config_path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Layers command-line values over the loaded configuration.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(root) = overrides.root {
            self.server.root = root;
        }
        if let Some(base) = overrides.base {
            self.server.base = base;
        }
        if let Some(host) = overrides.host {
            self.server.host = host;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(prefix) = overrides.prefix {
            self.server.prefix = Some(prefix);
        }
        if !overrides.watch.is_empty() {
            self.watch.paths = overrides.watch;
        }
        self.watch.ignore.extend(overrides.ignore);
        self.server.quiet |= overrides.quiet;
        self.server.open |= overrides.open;
    }

    /// Checks values that would otherwise fail later at startup.
    ///
    /// Directory existence is checked when the resolver is built.
    pub fn validate(&self) -> lively::Result<()> {
        if self.server.port == 0 {
            return Err(LivelyError::Config("port must be non-zero".to_string()));
        }
        if self.server.poll_timeout_secs == 0 {
            return Err(LivelyError::Config(
                "poll_timeout_secs must be non-zero".to_string(),
            ));
        }
        for callback in &self.callbacks {
            match (&callback.script, &callback.reload) {
                (Some(_), None) | (None, Some(_)) => {}
                _ => {
                    return Err(LivelyError::Config(format!(
                        "callback for '{}' must set exactly one of 'script' or 'reload'",
                        callback.pattern
                    )))
                }
            }
        }
        Ok(())
    }

    /// Socket address string to bind.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Paths to watch; the served root when none are configured.
    ///
    /// Relative paths are joined onto the root, absolute ones kept.
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        if self.watch.paths.is_empty() {
            return vec![self.server.root.clone()];
        }
        self.watch
            .paths
            .iter()
            .map(|p| self.server.root.join(p))
            .collect()
    }

    /// Resolver options built from the server section.
    pub fn resolver_options(&self) -> ResolverOptions {
        let options = ResolverOptions::new(&self.server.root)
            .with_base(&self.server.base)
            .with_directory_listing(self.server.directory_listing);
        match &self.server.prefix {
            Some(prefix) => options.with_prefix(prefix, self.server.require_prefix),
            None => options,
        }
    }

    /// Queue retention built from the queue section.
    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_age: Duration::from_secs(self.queue.retention_secs),
            capacity: self.queue.capacity.max(1),
            client_ttl: Duration::from_secs(self.queue.client_ttl_secs),
        }
    }

    /// How long a reload poll is held open.
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.server.poll_timeout_secs)
    }

    /// Debounce window for the filesystem watcher.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.watch.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 3031);
        assert_eq!(config.server.root, PathBuf::from("."));
        assert!(config.server.directory_listing);
        assert!(!config.server.quiet);
        assert_eq!(config.watch.debounce_ms, 100);
        assert_eq!(config.queue.capacity, 1024);
        assert!(config.callbacks.is_empty());
        assert_eq!(config.watch_paths(), vec![PathBuf::from(".")]);
    }

    #[test]
    fn test_parse_full_file() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 8080
            root = "site"
            prefix = "/docs"

            [watch]
            paths = ["site", "partials"]
            ignore = ["drafts/"]

            [[callbacks]]
            pattern = "md"
            reload = ["{dir}"]
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.prefix.as_deref(), Some("/docs"));
        assert_eq!(
            config.watch_paths(),
            vec![PathBuf::from("site/site"), PathBuf::from("site/partials")]
        );
        assert_eq!(config.callbacks[0].reload, Some(vec!["{dir}".to_string()]));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_win() {
        let mut config = Config::default();
        config.watch.ignore.push("a".to_string());
        config.apply(Overrides {
            port: Some(9000),
            root: Some(PathBuf::from("public")),
            ignore: vec!["b".to_string()],
            quiet: true,
            ..Default::default()
        });

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.root, PathBuf::from("public"));
        assert_eq!(config.watch.ignore, vec!["a", "b"]);
        assert!(config.server.quiet);
        assert_eq!(config.watch_paths(), vec![PathBuf::from("public")]);
    }

    #[test]
    fn test_watch_paths_are_relative_to_root() {
        let mut config = Config::default();
        config.apply(Overrides {
            root: Some(PathBuf::from("public")),
            watch: vec![PathBuf::from("assets"), PathBuf::from("/srv/shared")],
            ..Default::default()
        });

        assert_eq!(
            config.watch_paths(),
            vec![PathBuf::from("public/assets"), PathBuf::from("/srv/shared")]
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(matches!(config.validate(), Err(LivelyError::Config(_))));

        let mut config = Config::default();
        config.callbacks.push(CallbackConfig {
            pattern: "md".to_string(),
            script: Some(PathBuf::from("x.lua")),
            reload: Some(vec!["/".to_string()]),
        });
        assert!(config.validate().is_err());

        config.callbacks[0].script = None;
        config.callbacks[0].reload = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_files() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Config::load(Some(&missing)).is_err());

        let file = dir.path().join("lively.toml");
        fs::write(&file, "[server]\nport = 4000\n").unwrap();
        assert_eq!(Config::load(Some(&file)).unwrap().server.port, 4000);
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("lively.toml");
        fs::write(&file, "[server\nport = ").unwrap();
        assert!(Config::load(Some(&file)).is_err());
    }
}
