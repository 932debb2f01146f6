//! WebDAV method handlers.
//!
//! axum's method router only knows the standard HTTP verbs, so every
//! resource path goes through [`dispatch`], which switches on the raw method
//! name. Each handler returns `Result<Response, AppError>`.

pub mod health_handlers;
mod read_handlers;
mod transfer_handlers;
mod write_handlers;

use crate::{
    errors::AppError,
    models::resource::{ResourcePath, is_collection_style},
    services::{dav_service::DavService, store::ByteStream},
};
use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, Uri, header},
    response::{IntoResponse, Response},
};
use futures::{StreamExt, TryStreamExt};
use std::io;
use tracing::{debug, warn};

/// Methods served on resource paths, as advertised by OPTIONS and CORS.
pub const DAV_METHODS: [&str; 10] = [
    "OPTIONS", "GET", "HEAD", "PUT", "DELETE", "MKCOL", "PROPFIND", "PROPPATCH", "COPY", "MOVE",
];

/// Upper bound on PROPFIND/PROPPATCH request bodies.
const MAX_XML_BODY: usize = 1024 * 1024;

/// A request after path normalization.
pub struct DavRequest {
    pub path: ResourcePath,
    /// The raw path ended with `/`.
    pub collection_style: bool,
    pub headers: HeaderMap,
    pub body: Body,
}

impl DavRequest {
    fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Declared request body length, if any.
    fn content_length(&self) -> Option<u64> {
        self.headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    }

    /// Buffer a small XML body.
    async fn xml_body(self) -> Result<Bytes, AppError> {
        axum::body::to_bytes(self.body, MAX_XML_BODY)
            .await
            .map_err(|err| AppError::bad_request(format!("could not read request body: {}", err)))
    }

    /// Hand the body to the store as a stream.
    fn body_stream(self) -> ByteStream {
        self.body
            .into_data_stream()
            .map_err(io::Error::other)
            .boxed()
    }
}

/// Value of a `Depth` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}

/// `Ok(None)` when absent, `Err` with the raw value when unrecognised.
fn depth(request: &DavRequest) -> Result<Option<Depth>, String> {
    let Some(value) = request.headers.get("depth") else {
        return Ok(None);
    };
    let raw = value.to_str().unwrap_or_default().trim();
    match raw.to_ascii_lowercase().as_str() {
        "0" => Ok(Some(Depth::Zero)),
        "1" => Ok(Some(Depth::One)),
        "infinity" => Ok(Some(Depth::Infinity)),
        _ => Err(raw.to_string()),
    }
}

/// `Overwrite: T|F`, `None` when absent.
fn overwrite(request: &DavRequest) -> Result<Option<bool>, AppError> {
    match request.header_str("overwrite").map(str::trim) {
        None => Ok(None),
        Some("T") | Some("t") => Ok(Some(true)),
        Some("F") | Some("f") => Ok(Some(false)),
        Some(other) => Err(AppError::bad_request(format!(
            "invalid Overwrite header `{}`",
            other
        ))),
    }
}

/// Resource path named by the `Destination` header (absolute URL or path).
fn destination(request: &DavRequest) -> Result<ResourcePath, AppError> {
    let raw = request
        .header_str("destination")
        .ok_or_else(|| AppError::bad_request("missing Destination header"))?;
    let uri: Uri = raw
        .parse()
        .map_err(|_| AppError::bad_request(format!("invalid Destination header `{}`", raw)))?;
    ResourcePath::from_url_path(uri.path())
        .map_err(|_| AppError::bad_request(format!("Destination `{}` is not valid UTF-8", raw)))
}

/// Entry point for every non-reserved path.
pub async fn dispatch(State(service): State<DavService>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let raw_path = parts.uri.path();
    let path = match ResourcePath::from_url_path(raw_path) {
        Ok(path) => path,
        Err(err) => {
            warn!(path = raw_path, error = %err, "request path is not valid UTF-8");
            return AppError::bad_request("request path is not valid UTF-8").into_response();
        }
    };
    let request = DavRequest {
        path,
        collection_style: is_collection_style(raw_path),
        headers: parts.headers,
        body,
    };
    let method = parts.method.as_str();
    debug!(method, path = %request.path, "dispatching");

    let result = match method {
        "OPTIONS" => Ok(read_handlers::options()),
        "GET" => read_handlers::get(&service, request, false).await,
        "HEAD" => read_handlers::get(&service, request, true).await,
        "PROPFIND" => read_handlers::propfind(&service, request).await,
        "PUT" => write_handlers::put(&service, request).await,
        "MKCOL" => write_handlers::mkcol(&service, request).await,
        "DELETE" => write_handlers::delete(&service, request).await,
        "PROPPATCH" => write_handlers::proppatch(&service, request).await,
        "COPY" => transfer_handlers::copy(&service, request).await,
        "MOVE" => transfer_handlers::move_resource(&service, request).await,
        other => Err(AppError::method_not_allowed(format!(
            "method {} is not supported",
            other
        ))),
    };

    match result {
        Ok(response) => response,
        Err(err) => {
            if err.status.is_client_error() {
                warn!(method, status = err.status.as_u16(), error = %err, "request rejected");
            }
            err.into_response()
        }
    }
}
