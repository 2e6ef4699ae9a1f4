// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! File system watching for live reload.
//!
//! `FileWatcher` turns debounced `notify` events into [`ChangeEvent`]s and
//! hands them to the dispatcher over a channel.
//!
//! # Features
//!
//! - Debounced file change events (100ms by default)
//! - Renames split into a delete of the old path and a create of the new one
//! - Directory and access-only events are dropped
//! - Recursive watching of any number of paths

use lively::{ChangeEvent, ChangeKind};
use notify::event::{MetadataKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Watches paths recursively and forwards file changes.
///
/// Watching stops when the value is dropped.
pub struct FileWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    paths: Vec<PathBuf>,
}

impl FileWatcher {
    /// Starts watching `paths`, sending every change to `tx`.
    ///
    /// # Errors
    ///
    /// Fails if a path does not exist or cannot be watched.
    pub fn new(
        paths: &[PathBuf],
        debounce: Duration,
        tx: mpsc::Sender<ChangeEvent>,
    ) -> anyhow::Result<Self> {
        let mut debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    for change in events.iter().flat_map(|e| changes_from(e)) {
                        // Runs on the debouncer thread, outside the runtime.
                        if tx.blocking_send(change).is_err() {
                            return;
                        }
                    }
                }
                Err(errors) => {
                    for error in errors {
                        tracing::warn!("Watch error: {}", error);
                    }
                }
            }
        })?;

        let mut watched = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path
                .canonicalize()
                .map_err(|e| anyhow::anyhow!("Cannot watch '{}': {}", path.display(), e))?;
            debouncer.watch(&path, RecursiveMode::Recursive)?;
            tracing::info!(path = %path.display(), "Watching");
            watched.push(path);
        }

        Ok(Self {
            _debouncer: debouncer,
            paths: watched,
        })
    }

    /// Canonical paths being watched.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

/// Maps one raw notification onto file change events.
pub fn changes_from(event: &Event) -> Vec<ChangeEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Remove(RemoveKind::Folder) => return Vec::new(),
        EventKind::Remove(_) => ChangeKind::Deleted,
        EventKind::Modify(ModifyKind::Name(mode)) => return renamed(mode, &event.paths),
        EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::Any | MetadataKind::WriteTime,
        )) => ChangeKind::Modified,
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };

    event
        .paths
        .iter()
        .filter(|p| kind == ChangeKind::Deleted || !p.is_dir())
        .map(|p| ChangeEvent::new(p.clone(), kind))
        .collect()
}

fn renamed(mode: RenameMode, paths: &[PathBuf]) -> Vec<ChangeEvent> {
    match (mode, paths) {
        (RenameMode::Both, [from, to]) => {
            let mut out = vec![ChangeEvent::deleted(from.clone())];
            if !to.is_dir() {
                out.push(ChangeEvent::created(to.clone()));
            }
            out
        }
        (RenameMode::From, _) => paths.iter().cloned().map(ChangeEvent::deleted).collect(),
        (RenameMode::To, _) => paths
            .iter()
            .filter(|p| !p.is_dir())
            .cloned()
            .map(ChangeEvent::created)
            .collect(),
        // Platforms that cannot tell which side they saw.
        _ => paths
            .iter()
            .filter(|p| !p.is_dir())
            .map(|p| {
                if p.exists() {
                    ChangeEvent::created(p.clone())
                } else {
                    ChangeEvent::deleted(p.clone())
                }
            })
            .collect(),
    }
}
