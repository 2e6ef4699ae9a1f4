// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Live-reloading server command.

use console::style;

use super::start_pipeline;
use crate::config::Config;
use crate::server::LiveReloadServer;

/// Serves the configured root with live reload until the process stops.
///
/// Startup fails fast when the configuration is invalid, the root or base
/// directory is missing, or the address cannot be bound.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let pipeline = start_pipeline(&config)?;

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Cannot listen on {}: {}", addr, e))?;
    let port = listener.local_addr().map(|a| a.port()).unwrap_or(config.server.port);
    let url = format!(
        "http://{}:{}{}/",
        config.server.host,
        port,
        pipeline.resolver.prefix().unwrap_or("")
    );

    if !config.server.quiet {
        println!(
            "{} {}",
            style("Serving:").cyan(),
            style(pipeline.resolver.root().display()).dim()
        );
        for path in pipeline.watcher.paths() {
            println!("{} {}", style("Watching:").cyan(), style(path.display()).dim());
        }
        println!("{} {}", style("Server:").cyan(), style(&url).green().bold());
        println!();
    }
    tracing::info!(%url, "Listening");

    if config.server.open {
        if let Err(e) = open::that(&url) {
            tracing::warn!("Could not open browser: {}", e);
        }
    }

    let server = LiveReloadServer::from_config(
        &config,
        pipeline.resolver.clone(),
        pipeline.queue.clone(),
    );
    let result = server.serve(listener).await;
    drop(pipeline);
    result
}
