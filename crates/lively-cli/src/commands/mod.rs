// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! - `serve`: serve a directory with live reload
//! - `watch`: run the change pipeline without HTTP and print patterns
//! - `init`: write a starter `lively.toml`

/// Starter configuration command.
pub mod init;
/// Live-reloading server command.
pub mod serve;
/// Headless watch command.
pub mod watch;

use std::sync::Arc;

use lively::{IgnoreMatcher, PathResolver, ReloadQueue, Watcher};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::extensions::build_registry;
use crate::watcher::FileWatcher;

/// Everything between the filesystem and the reload queue, running.
///
/// Dropping it stops the filesystem watcher; the dispatcher task then ends
/// when its channel closes.
pub struct Pipeline {
    /// Resolver for the configured root and base.
    pub resolver: PathResolver,
    /// Queue fed by the dispatcher.
    pub queue: Arc<ReloadQueue>,
    /// Live filesystem watcher.
    pub watcher: FileWatcher,
}

/// Validates `config`, then starts watching and dispatching.
///
/// Must be called inside a tokio runtime.
///
/// # Errors
///
/// Fails on invalid configuration, a missing root or base directory, a bad
/// ignore or callback pattern, or a watch path that cannot be watched.
pub fn start_pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    config.validate()?;

    let resolver = PathResolver::new(config.resolver_options())?;
    let ignore = IgnoreMatcher::new(resolver.root(), &config.watch.ignore)?;
    let registry = build_registry(&config.callbacks)?;
    let queue = Arc::new(ReloadQueue::new(config.retention_policy()));

    let (tx, rx) = mpsc::channel(256);
    let watcher = FileWatcher::new(&config.watch_paths(), config.debounce(), tx)?;

    let dispatcher = Watcher::new(resolver.root(), ignore, registry, queue.clone());
    tokio::spawn(dispatcher.run(rx));

    Ok(Pipeline {
        resolver,
        queue,
        watcher,
    })
}
