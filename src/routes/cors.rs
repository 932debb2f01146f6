//! CORS response headers.
//!
//! Applied to every response after the handler ran, OPTIONS included, so a
//! WebDAV OPTIONS still reaches its handler and keeps its `DAV` header.

use crate::handlers::DAV_METHODS;
use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

const ALLOWED_HEADERS: [&str; 12] = [
    "authorization",
    "cache-control",
    "content-disposition",
    "content-encoding",
    "content-language",
    "content-type",
    "depth",
    "destination",
    "if-match",
    "if-none-match",
    "overwrite",
    "range",
];

const EXPOSED_HEADERS: [&str; 7] = [
    "content-length",
    "content-range",
    "content-type",
    "dav",
    "etag",
    "last-modified",
    "location",
];

/// Precomputed header values shared by every response.
#[derive(Clone)]
pub struct CorsPolicy {
    headers: Arc<Vec<(HeaderName, HeaderValue)>>,
}

impl CorsPolicy {
    pub fn new(max_age: u64) -> Self {
        let lists = [
            (header::ACCESS_CONTROL_ALLOW_METHODS, DAV_METHODS.join(", ")),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOWED_HEADERS.join(", ")),
            (header::ACCESS_CONTROL_EXPOSE_HEADERS, EXPOSED_HEADERS.join(", ")),
        ];
        let mut headers: Vec<(HeaderName, HeaderValue)> = lists
            .into_iter()
            .filter_map(|(name, value)| HeaderValue::from_str(&value).ok().map(|v| (name, v)))
            .collect();
        headers.push((
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("false"),
        ));
        headers.push((header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(max_age)));
        Self {
            headers: Arc::new(headers),
        }
    }
}

/// Echo the request `Origin` and attach the fixed CORS headers.
pub async fn apply_cors(State(policy): State<CorsPolicy>, request: Request, next: Next) -> Response {
    let origin = request.headers().get(header::ORIGIN).cloned();
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    if let Some(origin) = origin {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.append(header::VARY, HeaderValue::from_static("origin"));
    }
    for (name, value) in policy.headers.iter() {
        headers.insert(name.clone(), value.clone());
    }
    response
}
