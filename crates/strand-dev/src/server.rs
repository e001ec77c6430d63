//! HTTP server: bundle serving, static files, SPA fallback.

use crate::live::{self, live_socket, CLIENT_PATH, SOCKET_PATH};
use crate::proxy;
use crate::state::DevState;
use crate::watch;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strand_core::BuildError;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Dev server failure.
#[derive(Debug, thiserror::Error)]
pub enum DevError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Build the router. Exposed separately so tests can serve it on an
/// ephemeral port.
pub fn router(state: Arc<DevState>) -> Router {
    Router::new()
        .route(CLIENT_PATH, get(serve_client))
        .route(SOCKET_PATH, get(live_socket))
        .fallback(handle_request)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the dev server until the process is stopped.
///
/// Performs an initial build (a failure is reported but does not abort;
/// the first successful rebuild starts serving), starts the watcher, and
/// binds the configured address.
pub async fn run_server(state: Arc<DevState>, root: PathBuf) -> Result<(), DevError> {
    let initial_state = state.clone();
    let initial = tokio::task::spawn_blocking(move || initial_state.rebuild())
        .await
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    if let Err(err) = initial {
        warn!(code = err.code(), "initial build failed, serving will recover on next change");
    }

    let _watcher = watch::spawn(root, state.clone());

    let (host, port) = match &state.config.dev_server {
        Some(dev) => (dev.host.clone(), dev.port),
        None => ("127.0.0.1".to_string(), 8080),
    };
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| DevError::Bind { addr: addr.clone(), source })?;
    info!(addr = %addr, "dev server listening");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn serve_client() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        live::CLIENT_JS,
    )
}

/// Everything that is not a live-update endpoint: proxy rules first,
/// then the in-memory bundle, then static files, then the SPA fallback.
async fn handle_request(
    State(state): State<Arc<DevState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let path = uri.path().to_string();

    if let Some(dev) = &state.config.dev_server {
        if let Some(rule) = proxy::match_rule(&dev.proxy_rules, &path) {
            return proxy::forward(&state.http, rule, method, &uri, headers, body).await;
        }
    }

    let bundle_path = format!("/{}", state.config.output_filename);
    if path == bundle_path {
        return serve_bundle(&state, &headers);
    }
    if state.config.source_maps() && path == format!("{bundle_path}.map") {
        return serve_sourcemap(&state);
    }

    let static_dir = state
        .config
        .dev_server
        .as_ref()
        .map_or_else(|| state.config.output_dir.clone(), |dev| dev.static_dir.clone());

    if path == "/" {
        return serve_host_document(&state, &static_dir).await;
    }

    let relative = path.trim_start_matches('/');
    let candidate = static_dir.join(relative);
    if candidate.is_file() {
        return serve_static(&candidate).await;
    }

    // Extensionless paths are client-side routes and get the host
    // document; a missing file with an extension is a genuine 404.
    let has_extension = Path::new(relative)
        .extension()
        .is_some_and(|ext| !ext.is_empty());
    if has_extension {
        (StatusCode::NOT_FOUND, format!("not found: {path}")).into_response()
    } else {
        serve_host_document(&state, &static_dir).await
    }
}

/// Serve the current bundle from memory with an ETag derived from its
/// content hash.
fn serve_bundle(state: &DevState, headers: &HeaderMap) -> Response {
    let Some(bundle) = state.bundle() else {
        let message = state
            .last_error()
            .unwrap_or_else(|| "no bundle built yet".to_string());
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "application/javascript")],
            format!("console.error({});", serde_json::json!(message)),
        )
            .into_response();
    };

    let etag = format!("\"{}\"", bundle.hash);
    if headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == etag)
    {
        return StatusCode::NOT_MODIFIED.into_response();
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/javascript")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::ETAG, etag)
        .body(Body::from(bundle.code.clone()))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn serve_sourcemap(state: &DevState) -> Response {
    match state.bundle().and_then(|bundle| bundle.map.clone()) {
        Some(map) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/json"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            map,
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Serve `index.html` from the static directory, falling back to a
/// generated shell, with the live-update client injected when enabled.
async fn serve_host_document(state: &DevState, static_dir: &Path) -> Response {
    let mut html = match tokio::fs::read_to_string(static_dir.join("index.html")).await {
        Ok(html) => html,
        Err(_) => generate_host_document(&state.config.output_filename),
    };

    let live_update = state
        .config
        .dev_server
        .as_ref()
        .is_some_and(|dev| dev.live_update);
    if live_update && !html.contains(CLIENT_PATH) {
        let script = format!(r#"<script src="{CLIENT_PATH}"></script>"#);
        if let Some(pos) = html.find("</body>") {
            html.insert_str(pos, &format!("  {script}\n"));
        } else {
            html.push_str(&script);
        }
    }

    Html(html).into_response()
}

/// Shell document used when the static directory has no `index.html`.
fn generate_host_document(bundle_filename: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>strand</title>
</head>
<body>
  <div id="root"></div>
  <script src="/{bundle_filename}"></script>
</body>
</html>
"#
    )
}

async fn serve_static(path: &Path) -> Response {
    match tokio::fs::read(path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type(path))],
            bytes,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, format!("not found: {}", path.display())).into_response(),
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()).unwrap_or("") {
        "html" => "text/html",
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "css" => "text/css",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}
