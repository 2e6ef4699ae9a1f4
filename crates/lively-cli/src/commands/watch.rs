// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Headless watch command: prints the patterns each change produces.

use console::style;
use tokio::signal;

use super::start_pipeline;
use crate::config::Config;

/// Runs the watch pipeline without HTTP until Ctrl+C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let pipeline = start_pipeline(&config)?;
    let queue = pipeline.queue.clone();

    for path in pipeline.watcher.paths() {
        println!("Watching for changes in: {}", path.display());
    }
    println!("Press Ctrl+C to stop...");
    println!();

    let mut cursor = queue.current();
    loop {
        tokio::select! {
            batch = queue.next_batch(Some(cursor)) => {
                cursor = batch.cursor;
                for pattern in &batch.patterns {
                    let label = if pattern.patched_asset().is_some() {
                        style("patch ").yellow()
                    } else {
                        style("reload").green()
                    };
                    println!("  {} {}", label, pattern);
                }
            }
            result = signal::ctrl_c() => {
                result?;
                break;
            }
        }
    }

    println!("\nStopping file watcher...");
    Ok(())
}
