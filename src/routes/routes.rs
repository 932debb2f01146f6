//! Defines the gateway's HTTP surface.
//!
//! ## Structure
//! - **Reserved endpoints** (no authentication)
//!   - `GET /.gateway/healthz`: liveness
//!   - `GET /.gateway/readyz`: store reachability
//!
//! - **WebDAV resources**: every other path, any method, handled by
//!   [`dispatch`] (OPTIONS, GET, HEAD, PUT, DELETE, MKCOL, PROPFIND,
//!   PROPPATCH, COPY, MOVE).
//!
//! Layers, outermost first: request tracing, CORS, Basic authentication.

use crate::{
    config::Credentials,
    handlers::{
        dispatch,
        health_handlers::{healthz, readyz},
    },
    routes::{
        auth::{BasicAuth, require_basic_auth},
        cors::{CorsPolicy, apply_cors},
    },
    services::dav_service::DavService,
};
use axum::{Router, body::Body, extract::Request, middleware, routing::get};
use tower_http::trace::TraceLayer;
use tracing::info_span;
use uuid::Uuid;

/// Build the complete router around `service`.
///
/// `credentials == None` leaves the WebDAV surface unauthenticated.
pub fn routes(
    service: DavService,
    credentials: Option<&Credentials>,
    cors_max_age: u64,
) -> Router {
    let mut router = Router::new()
        .route("/.gateway/healthz", get(healthz))
        .route("/.gateway/readyz", get(readyz))
        .fallback(dispatch)
        .with_state(service);

    if let Some(credentials) = credentials {
        router = router.layer(middleware::from_fn_with_state(
            BasicAuth::new(credentials),
            require_basic_auth,
        ));
    }

    router
        .layer(middleware::from_fn_with_state(
            CorsPolicy::new(cors_max_age),
            apply_cors,
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                info_span!(
                    "request",
                    id = %Uuid::new_v4(),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
}
