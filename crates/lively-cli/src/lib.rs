// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! lively CLI library.
//!
//! Wires the `lively` pipeline to the outside world: a `notify` watcher
//! feeding change events in, an axum server handing reload patterns out.
//!
//! # Features
//!
//! - **Static server** with directory listings, custom error pages and
//!   no-cache headers
//! - **Live reload** over long-poll or WebSocket, with CSS/JS hot-patching
//! - **Custom callbacks** as Lua scripts or pattern templates
//!
//! # Usage
//!
//! This crate is primarily used through the `lively` binary:
//!
//! ```bash
//! lively serve              # Serve the current directory
//! lively serve site --open  # Watch ./site and open the browser
//! lively watch              # Print reload patterns without serving
//! lively init               # Write a starter lively.toml
//! ```
//!
//! # Configuration
//!
//! Projects are configured via `lively.toml`; command-line flags win.

/// CLI commands (serve, watch, init).
pub mod commands;
/// Configuration from `lively.toml` and the command line.
pub mod config;
/// Lua and template reload callbacks.
pub mod extensions;
/// Tracing subscriber setup.
pub mod logging;
/// HTTP server with live reload endpoints.
pub mod server;
/// File system watching for live reload.
pub mod watcher;
