// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Development server components.
//!
//! # Components
//!
//! - `http`: static content through the path resolver, with script injection
//! - `livereload`: long-poll and WebSocket reload endpoints

/// HTTP server implementation using Axum.
pub mod http;
/// Long-poll and WebSocket reload endpoints.
pub mod livereload;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use lively::{PathResolver, ReloadQueue};

use self::http::{create_router, create_server, AppState};
use crate::config::Config;

/// The HTTP-facing half of live reload.
pub struct LiveReloadServer {
    resolver: PathResolver,
    queue: Arc<ReloadQueue>,
    quiet: bool,
    poll_timeout: Duration,
    cors: bool,
}

impl LiveReloadServer {
    /// Creates a server over `resolver` that drains `queue`.
    pub fn new(resolver: PathResolver, queue: Arc<ReloadQueue>) -> Self {
        Self {
            resolver,
            queue,
            quiet: false,
            poll_timeout: Duration::from_secs(30),
            cors: false,
        }
    }

    /// Creates a server configured from `config`.
    pub fn from_config(config: &Config, resolver: PathResolver, queue: Arc<ReloadQueue>) -> Self {
        Self::new(resolver, queue)
            .quiet(config.server.quiet)
            .poll_timeout(config.poll_timeout())
            .cors(config.server.cors)
    }

    /// Suppresses per-request logging.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Sets how long reload polls are held open.
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Allows cross-origin requests.
    pub fn cors(mut self, enabled: bool) -> Self {
        self.cors = enabled;
        self
    }

    /// The axum router, for serving or for driving in tests.
    pub fn router(&self) -> Router {
        let state = Arc::new(AppState {
            resolver: self.resolver.clone(),
            queue: self.queue.clone(),
            quiet: self.quiet,
            poll_timeout: self.poll_timeout,
        });
        create_router(state, self.cors)
    }

    /// Serves on an already bound listener until the process stops.
    pub async fn serve(self, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
        create_server(listener, self.router()).await
    }
}
