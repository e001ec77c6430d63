//! Reverse proxy for API-style requests.
//!
//! Requests whose path matches a configured prefix are forwarded to the
//! rule's target with method, headers, query string, and body intact.
//! Rules are checked in configuration order and the first match wins.
//! An unreachable target yields a plain 502 rather than killing the
//! request task.

use axum::body::Body;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use strand_core::ProxyRule;
use tracing::{debug, warn};

/// Find the first rule whose prefix matches the request path.
pub fn match_rule<'a>(rules: &'a [ProxyRule], path: &str) -> Option<&'a ProxyRule> {
    rules.iter().find(|rule| path.starts_with(&rule.path_prefix))
}

/// Forward a matched request upstream and relay the response. Both the
/// request and response bodies stream; neither side is buffered whole.
pub async fn forward(
    client: &reqwest::Client,
    rule: &ProxyRule,
    method: Method,
    uri: &Uri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let mut target = rule.target.clone();
    target.set_path(uri.path());
    target.set_query(uri.query());

    debug!(prefix = %rule.path_prefix, target = %target, "proxying request");

    let mut upstream = client
        .request(method, target.as_str())
        .body(reqwest::Body::wrap_stream(body.into_data_stream()));
    for (name, value) in &headers {
        // Host must reflect the upstream target, and body framing is
        // regenerated for the streamed upstream request.
        if name == axum::http::header::HOST
            || name == axum::http::header::CONTENT_LENGTH
            || name == axum::http::header::TRANSFER_ENCODING
            || name == axum::http::header::CONNECTION
        {
            continue;
        }
        upstream = upstream.header(name, value);
    }

    match upstream.send().await {
        Ok(response) => {
            let status = response.status();
            let mut builder = Response::builder().status(status.as_u16());
            for (name, value) in response.headers() {
                if name == reqwest::header::TRANSFER_ENCODING
                    || name == reqwest::header::CONNECTION
                {
                    continue;
                }
                builder = builder.header(name, value);
            }
            let body = Body::from_stream(response.bytes_stream());
            builder
                .body(body)
                .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
        }
        Err(err) => {
            warn!(target = %rule.target, error = %err, "upstream unreachable");
            (
                StatusCode::BAD_GATEWAY,
                format!("upstream unreachable: {}", rule.target),
            )
                .into_response()
        }
    }
}
