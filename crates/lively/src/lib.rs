// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! # lively
//!
//! The live-reload event pipeline behind the `lively` development server.
//!
//! A filesystem change travels through four stages before a browser sees it:
//!
//! ```text
//! ChangeEvent ──► Watcher ──► CallbackRegistry ──► ReloadQueue ──► clients
//!                   │
//!                   └─► IgnoreMatcher (drop ignored paths)
//! ```
//!
//! Requests for content go through [`PathResolver`], which maps a URL path to
//! a [`ServerPath`] (file, directory listing, redirect, custom error page or
//! not-found) without touching any shared state.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lively::{CallbackRegistry, ChangeEvent, IgnoreMatcher, ReloadQueue, Watcher};
//!
//! let queue = Arc::new(ReloadQueue::default());
//! let watcher = Watcher::new("site", IgnoreMatcher::empty(), CallbackRegistry::with_defaults(), queue.clone());
//!
//! watcher.dispatch(&ChangeEvent::modified("site/index.html"));
//! let batch = queue.next_batch(Some(lively::Cursor::START)).await;
//! assert_eq!(batch.patterns[0].as_str(), "/");
//! ```

/// Reload callbacks and the callback registry.
pub mod callback;
/// Client-side reload script and HTML injection.
pub mod client;
/// Error types.
pub mod error;
/// Filesystem change events.
pub mod event;
/// Ignore rules for watched paths.
pub mod ignore;
/// Reload pattern tokens and source-to-URL translation.
pub mod pattern;
/// Broadcast queue of pending reload patterns.
pub mod queue;
/// Request path to filesystem resolution.
pub mod resolver;
/// Change event dispatcher.
pub mod watcher;

pub use callback::{
    CallbackMatcher, CallbackRegistry, CallbackResult, FnCallback, HtmlCallback, ReloadCallback,
    StaticCallback,
};
pub use client::{inject_script, reload_script, RELOAD_ENDPOINT};
pub use error::{CallbackError, LivelyError, Result};
pub use event::{ChangeEvent, ChangeKind};
pub use ignore::IgnoreMatcher;
pub use pattern::{url_for_source, ReloadPattern};
pub use queue::{Batch, Cursor, ReloadQueue, RetentionPolicy};
pub use resolver::{PathKind, PathResolver, ResolverOptions, ServerPath};
pub use watcher::Watcher;
