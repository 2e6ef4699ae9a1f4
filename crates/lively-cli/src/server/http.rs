// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP server for static content with live reload.
//!
//! Every non-reload request goes through [`PathResolver`]; HTML responses get
//! the reload script injected with the queue cursor current at serve time.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use lively::client::STREAM_ENDPOINT;
use lively::resolver::render_listing;
use lively::{
    inject_script, reload_script, Cursor, PathKind, PathResolver, ReloadQueue, RELOAD_ENDPOINT,
};
use tower_http::cors::CorsLayer;

use super::livereload::{poll_handler, stream_handler};

/// Shared application state for the server.
pub struct AppState {
    /// Maps request paths to files.
    pub resolver: PathResolver,
    /// Pending reload patterns.
    pub queue: Arc<ReloadQueue>,
    /// Suppress per-request logging.
    pub quiet: bool,
    /// How long a reload poll is held open.
    pub poll_timeout: Duration,
}

/// Builds the axum router: reload endpoints, then static content for
/// everything else.
pub fn create_router(state: Arc<AppState>, cors: bool) -> Router {
    let mut app = Router::new()
        .route(RELOAD_ENDPOINT, get(poll_handler))
        .route(STREAM_ENDPOINT, get(stream_handler));

    // The client script polls under the prefix so it works behind a proxy
    // that only forwards prefixed paths.
    if let Some(prefix) = state.resolver.prefix() {
        app = app
            .route(&format!("{}{}", prefix, RELOAD_ENDPOINT), get(poll_handler))
            .route(&format!("{}{}", prefix, STREAM_ENDPOINT), get(stream_handler));
    }

    let app = app.fallback(fallback_handler).with_state(state);
    if cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Serves `app` on an already bound listener until the process stops.
pub async fn create_server(listener: tokio::net::TcpListener, app: Router) -> anyhow::Result<()> {
    axum::serve(listener, app).await?;
    Ok(())
}

async fn fallback_handler(State(state): State<Arc<AppState>>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = if method == Method::GET || method == Method::HEAD {
        let raw = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        serve_path(&state, raw).await
    } else {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response()
    };

    if !state.quiet {
        tracing::info!(
            method = %method,
            path = %uri.path(),
            status = response.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "request"
        );
    }

    with_no_cache(response)
}

async fn serve_path(state: &AppState, raw: &str) -> Response {
    let target = state.resolver.resolve(raw);
    let status = StatusCode::from_u16(target.status()).unwrap_or(StatusCode::OK);
    if let PathKind::Redirect { location } = &target.kind {
        return Response::builder()
            .status(StatusCode::MOVED_PERMANENTLY)
            .header(header::LOCATION, location.as_str())
            .body(Body::empty())
            .unwrap_or_else(|_| (StatusCode::BAD_REQUEST, "Bad Request").into_response());
    }

    // Taken before any content is read so the page never claims a change it
    // does not contain.
    let cursor = state.queue.pin_current();

    match (&target.kind, target.fs_path.as_deref()) {
        (PathKind::DirectoryIndex, Some(dir)) => match render_listing(dir, &target.request_path) {
            Ok(listing) => html_response(state, StatusCode::OK, &listing, cursor),
            Err(e) => {
                tracing::error!(path = %dir.display(), "Failed to list directory: {}", e);
                error_response(state, StatusCode::INTERNAL_SERVER_ERROR, cursor).await
            }
        },
        (PathKind::File | PathKind::CustomError { .. }, Some(file)) => {
            match file_response(state, status, file, target.is_html(), cursor).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(path = %file.display(), "Failed to read file: {}", e);
                    error_response(state, StatusCode::INTERNAL_SERVER_ERROR, cursor).await
                }
            }
        }
        _ => error_response(state, StatusCode::NOT_FOUND, cursor).await,
    }
}

async fn file_response(
    state: &AppState,
    status: StatusCode,
    file: &Path,
    is_html: bool,
    cursor: Cursor,
) -> std::io::Result<Response> {
    let bytes = tokio::fs::read(file).await?;
    if is_html {
        return Ok(html_response(
            state,
            status,
            &String::from_utf8_lossy(&bytes),
            cursor,
        ));
    }

    let mime = mime_guess::from_path(file).first_or_octet_stream();
    Ok(Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, mime.to_string())
        .body(Body::from(bytes))
        .unwrap_or_else(|_| {
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to build response").into_response()
        }))
}

/// Serves `<base>/<status>.html` if present, otherwise a plain-text body.
async fn error_response(state: &AppState, status: StatusCode, cursor: Cursor) -> Response {
    if let Some(page) = state.resolver.error_page(status.as_u16()) {
        match tokio::fs::read(&page).await {
            Ok(bytes) => {
                return html_response(state, status, &String::from_utf8_lossy(&bytes), cursor)
            }
            Err(e) => tracing::warn!(path = %page.display(), "Failed to read error page: {}", e),
        }
    }
    (status, status.canonical_reason().unwrap_or("Error")).into_response()
}

fn html_response(state: &AppState, status: StatusCode, html: &str, cursor: Cursor) -> Response {
    let script = reload_script(cursor, state.resolver.prefix().unwrap_or(""));
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Body::from(inject_script(html, &script)))
        .unwrap_or_else(|_| {
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to build response").into_response()
        })
}

fn with_no_cache(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, header::HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, header::HeaderValue::from_static("0"));
    response
}
