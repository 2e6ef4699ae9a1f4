// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Reload endpoints.
//!
//! `GET /__livereload?cursor=N&client=ID&path=PAGE` long-polls the queue and
//! answers `{"patterns": [...], "cursor": N}`. `GET /__livereload/ws` takes
//! the same query and pushes each batch over a WebSocket.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lively::{Batch, Cursor, LivelyError};
use serde::Deserialize;
use tokio::time::Instant;

use super::http::AppState;

/// Query string accepted by both reload endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ReloadQuery {
    /// Last cursor the client received; absent means "from now".
    pub cursor: Option<String>,
    /// Per-tab identifier used for queue retention.
    pub client: Option<String>,
    /// Page the client is showing, for subscription filtering.
    pub path: Option<String>,
}

struct Subscription {
    cursor: Option<Cursor>,
    client: Option<String>,
    page: Option<String>,
}

impl Subscription {
    fn parse(state: &AppState, query: ReloadQuery) -> Result<Self, Response> {
        let cursor = match query.cursor.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<Cursor>() {
                Ok(cursor) => Some(cursor),
                Err(_) => {
                    return Err((StatusCode::BAD_REQUEST, "Invalid cursor").into_response())
                }
            },
        };
        Ok(Self {
            cursor,
            client: query.client.filter(|c| !c.is_empty()),
            page: query.path.and_then(|p| state.resolver.page_url(&p)),
        })
    }

    /// Drops page patterns that do not concern this client's page.
    fn filter(&self, mut batch: Batch) -> Batch {
        if let Some(page) = &self.page {
            batch.patterns.retain(|p| p.matches_page(page));
        }
        batch
    }
}

/// Long-poll handler.
///
/// Holds the request until a relevant pattern arrives or the poll timeout
/// elapses. A client that disconnects drops this future, which releases the
/// wait without touching the queue.
pub async fn poll_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReloadQuery>,
) -> Response {
    let sub = match Subscription::parse(&state, query) {
        Ok(sub) => sub,
        Err(response) => return response,
    };

    let queue = &state.queue;
    let mut from = sub.cursor.unwrap_or_else(|| queue.current());
    queue.touch(sub.client.as_deref(), from);

    let deadline = Instant::now() + state.poll_timeout;
    let batch = loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let batch = sub.filter(queue.wait_batch(Some(from), remaining).await);
        // Patterns for other pages advance the cursor but keep the client waiting.
        if !batch.is_empty() || batch.cursor == from || remaining.is_zero() {
            break batch;
        }
        from = batch.cursor;
        queue.touch(sub.client.as_deref(), from);
    };

    queue.touch(sub.client.as_deref(), batch.cursor);
    Json(batch).into_response()
}

/// WebSocket upgrade handler for streamed batches.
pub async fn stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReloadQuery>,
) -> Response {
    match Subscription::parse(&state, query) {
        Ok(sub) => ws.on_upgrade(move |socket| handle_websocket(socket, state, sub)),
        Err(response) => response,
    }
}

async fn handle_websocket(mut socket: WebSocket, state: Arc<AppState>, sub: Subscription) {
    let queue = &state.queue;
    let mut from = sub.cursor.unwrap_or_else(|| queue.current());
    queue.touch(sub.client.as_deref(), from);

    loop {
        tokio::select! {
            batch = queue.next_batch(Some(from)) => {
                from = batch.cursor;
                queue.touch(sub.client.as_deref(), from);
                let batch = sub.filter(batch);
                if batch.is_empty() {
                    continue;
                }
                let text = match serde_json::to_string(&batch) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Failed to encode batch: {}", e);
                        continue;
                    }
                };
                if let Err(e) = socket.send(Message::Text(text)).await {
                    tracing::debug!("{}", LivelyError::Delivery(e.to_string()));
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!("WebSocket receive failed: {}", e);
                        break;
                    }
                }
            }
        }
    }

    if let Some(client) = &sub.client {
        queue.forget(client);
    }
    tracing::debug!("Reload stream closed");
}
