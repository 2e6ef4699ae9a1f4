// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Change event dispatcher.
//!
//! The [`Watcher`] does not touch the filesystem itself. It receives
//! [`ChangeEvent`]s from whatever watch primitive feeds it, drops ignored
//! paths, runs every matching callback and enqueues the produced patterns.
//! Each event is handled on its own; nothing carries over between events.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::callback::CallbackRegistry;
use crate::event::ChangeEvent;
use crate::ignore::IgnoreMatcher;
use crate::pattern::ReloadPattern;
use crate::queue::ReloadQueue;

/// Routes change events through ignore rules and callbacks into the queue.
pub struct Watcher {
    root: PathBuf,
    ignore: IgnoreMatcher,
    callbacks: CallbackRegistry,
    queue: Arc<ReloadQueue>,
}

impl Watcher {
    /// Creates a dispatcher for files served from `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        ignore: IgnoreMatcher,
        callbacks: CallbackRegistry,
        queue: Arc<ReloadQueue>,
    ) -> Self {
        Self {
            root: root.into(),
            ignore,
            callbacks,
            queue,
        }
    }

    /// The server root handed to callbacks.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The queue patterns are pushed into.
    pub fn queue(&self) -> &Arc<ReloadQueue> {
        &self.queue
    }

    /// Patterns `event` would produce, without enqueueing them.
    ///
    /// A failing or panicking callback contributes nothing; the others still run.
    pub fn patterns_for(&self, event: &ChangeEvent) -> Vec<ReloadPattern> {
        if self.ignore.should_ignore(&event.path) {
            trace!(path = %event.path.display(), "Ignored change");
            return Vec::new();
        }

        let mut patterns = Vec::new();
        for callback in self.callbacks.matching(&self.root, &event.path) {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| callback.handle(&self.root, event)));
            match outcome {
                Ok(Ok(produced)) => patterns.extend(produced),
                Ok(Err(e)) => {
                    warn!(path = %event.path.display(), "{}", e);
                }
                Err(_) => {
                    warn!(
                        callback = callback.name(),
                        path = %event.path.display(),
                        "Callback panicked"
                    );
                }
            }
        }
        patterns
    }

    /// Handles one event and returns how many patterns were enqueued.
    ///
    /// Patterns from one event land in the queue as a contiguous run.
    pub fn dispatch(&self, event: &ChangeEvent) -> usize {
        let patterns = self.patterns_for(event);
        if patterns.is_empty() {
            return 0;
        }

        debug!(
            path = %event.path.display(),
            kind = event.kind.as_str(),
            patterns = ?patterns.iter().map(ReloadPattern::as_str).collect::<Vec<_>>(),
            "Queueing reload"
        );
        let count = patterns.len();
        self.queue.extend(patterns);
        count
    }

    /// Dispatches events until the sending side closes.
    pub async fn run(self, mut events: mpsc::Receiver<ChangeEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(&event);
        }
        debug!("Change event channel closed");
    }
}
