//! The object-store seam.
//!
//! Handlers only ever talk to an [`ObjectStore`]. "Not found" is not an
//! error here: `head` and `get` return `None` for a missing key, and every
//! other unsuccessful store response surfaces as a [`StoreError`].

use crate::models::object::{ObjectMeta, ObjectRecord};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::{fmt::Debug, io};
use thiserror::Error;

/// Streaming object body.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object store returned {status} for {operation} `{key}`")]
    Status {
        operation: &'static str,
        key: String,
        status: u16,
    },
    #[error("requested range not satisfiable for `{0}`")]
    RangeNotSatisfiable(String),
    #[error("batch delete failed for {failed} key(s), first `{first_key}`")]
    PartialDelete { failed: usize, first_key: String },
    #[error("malformed object store response: {0}")]
    Malformed(String),
    #[error("value cannot be sent as a header: {0}")]
    InvalidHeader(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One ListObjectsV2 request.
#[derive(Clone, Debug, Default)]
pub struct ListRequest {
    pub prefix: String,
    pub delimiter: Option<String>,
    pub continuation_token: Option<String>,
}

/// One page of listing results.
#[derive(Debug, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectRecord>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// A (possibly partial) object body with its record.
pub struct GetResponse {
    pub record: ObjectRecord,
    pub body: ByteStream,
    /// Length of `body`, which differs from `record.size` for ranges.
    pub content_length: u64,
    /// Set when the store served a byte range.
    pub content_range: Option<String>,
}

/// Operations the gateway needs from a flat key-value object store.
///
/// Every call is attempted exactly once; implementations must not retry.
#[async_trait]
pub trait ObjectStore: Send + Sync + Debug {
    /// Fetch an object's record, or `None` when the key does not exist.
    async fn head(&self, key: &str) -> StoreResult<Option<ObjectRecord>>;

    /// Fetch an object body, honouring an optional HTTP `Range` value.
    async fn get(&self, key: &str, range: Option<&str>) -> StoreResult<Option<GetResponse>>;

    /// Create or replace an object.
    async fn put(
        &self,
        key: &str,
        body: ByteStream,
        content_length: Option<u64>,
        meta: &ObjectMeta,
    ) -> StoreResult<()>;

    /// Remove a single key. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Remove up to 1000 keys in one request.
    async fn delete_many(&self, keys: &[String]) -> StoreResult<()>;

    /// Server-side copy, preserving metadata.
    async fn copy(&self, source: &str, destination: &str) -> StoreResult<()>;

    /// Fetch a single listing page.
    async fn list_page(&self, request: &ListRequest) -> StoreResult<ListPage>;
}

/// Wrap an in-memory buffer as a [`ByteStream`].
pub fn bytes_stream(bytes: Bytes) -> ByteStream {
    Box::pin(futures::stream::once(async move { Ok(bytes) }))
}
