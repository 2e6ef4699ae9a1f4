// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Writes a starter `lively.toml`.

use std::fs;
use std::path::Path;

use crate::config::CONFIG_FILE;

const STARTER_CONFIG: &str = r#"# lively configuration

[server]
host = "localhost"
port = 3031
root = "."
# Directory holding 404.html / 500.html
base = "."
# prefix = "/docs"
directory_listing = true
quiet = false
open = false

[watch]
# Defaults to the served root
# paths = ["."]
ignore = [".git", "node_modules"]
debounce_ms = 100

[queue]
retention_secs = 60
capacity = 1024
client_ttl_secs = 90

# Reload every page under the changed file's directory when Markdown changes:
# [[callbacks]]
# pattern = "md"
# reload = ["{dir}**"]

# Or decide in Lua with handle(root, path, kind):
# [[callbacks]]
# pattern = "data/*.json"
# script = "reload.lua"
"#;

/// Creates `lively.toml` in `dir`, refusing to overwrite unless `force`.
pub async fn run(dir: &Path, force: bool) -> anyhow::Result<()> {
    let path = dir.join(CONFIG_FILE);
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    fs::write(&path, STARTER_CONFIG)?;
    tracing::info!(path = %path.display(), "Wrote configuration");

    println!("Created {}", path.display());
    println!();
    println!("Next steps:");
    println!("  lively serve");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_starter_config_parses_and_validates() {
        let dir = tempdir().unwrap();
        run(dir.path(), false).await.unwrap();

        let config = Config::load(Some(&dir.path().join(CONFIG_FILE))).unwrap();
        assert_eq!(config.server.port, 3031);
        assert_eq!(config.watch.ignore, vec![".git", "node_modules"]);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "custom").unwrap();

        assert!(run(dir.path(), false).await.is_err());
        run(dir.path(), true).await.unwrap();
        assert!(fs::read_to_string(dir.path().join(CONFIG_FILE))
            .unwrap()
            .starts_with("# lively"));
    }
}
