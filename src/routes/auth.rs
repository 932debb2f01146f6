//! HTTP Basic authentication in front of every WebDAV handler.

use crate::config::Credentials;
use axum::{
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::warn;

/// Health endpoints that answer `GET` without credentials.
pub const PUBLIC_PATHS: [&str; 2] = ["/.gateway/healthz", "/.gateway/readyz"];

fn is_exempt(method: &Method, path: &str) -> bool {
    *method == Method::OPTIONS || (*method == Method::GET && PUBLIC_PATHS.contains(&path))
}

#[derive(Clone)]
pub struct BasicAuth {
    /// Full expected `Authorization` header value.
    expected: Arc<[u8]>,
}

impl BasicAuth {
    pub fn new(credentials: &Credentials) -> Self {
        let token = general_purpose::STANDARD.encode(format!(
            "{}:{}",
            credentials.username, credentials.password
        ));
        Self {
            expected: format!("Basic {}", token).into_bytes().into(),
        }
    }

    fn accepts(&self, value: Option<&HeaderValue>) -> bool {
        value.is_some_and(|v| bool::from(v.as_bytes().ct_eq(&self.expected)))
    }
}

/// Reject requests without valid credentials. OPTIONS and the health
/// endpoints are exempt; every other path, `/.gateway/` included, is not.
pub async fn require_basic_auth(
    State(auth): State<BasicAuth>,
    request: Request,
    next: Next,
) -> Response {
    if is_exempt(request.method(), request.uri().path())
        || auth.accepts(request.headers().get(header::AUTHORIZATION))
    {
        return next.run(request).await;
    }

    warn!(
        method = %request.method(),
        path = request.uri().path(),
        "rejected unauthenticated request"
    );
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, r#"Basic realm="webdav""#)],
        "authentication required",
    )
        .into_response()
}
