//! Health & readiness handlers.
//!
//! - GET /.gateway/healthz  -> simple liveness ("ok")
//! - GET /.gateway/readyz   -> readiness that lists one key from the store

use crate::services::{dav_service::DavService, store::ListRequest};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

/// `GET /.gateway/healthz`
///
/// Liveness check. Never touches the store.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /.gateway/readyz`
///
/// Fetches a single listing page from the store. HTTP 200 when the store
/// answers, HTTP 503 otherwise.
pub async fn readyz(State(service): State<DavService>) -> impl IntoResponse {
    let started = Instant::now();
    let listed = service.store().list_page(&ListRequest::default()).await;
    let latency_ms = started.elapsed().as_millis() as u64;

    let (status, store) = match listed {
        Ok(_) => (
            StatusCode::OK,
            CheckStatus {
                ok: true,
                latency_ms,
                error: None,
            },
        ),
        Err(err) => {
            tracing::warn!(error = %err, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                CheckStatus {
                    ok: false,
                    latency_ms,
                    error: Some(err.to_string()),
                },
            )
        }
    };

    let body = ReadyResponse {
        status: if store.ok { "ok".into() } else { "error".into() },
        checked_at: Utc::now(),
        store,
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checked_at: DateTime<Utc>,
    store: CheckStatus,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    latency_ms: u64,
    error: Option<String>,
}
