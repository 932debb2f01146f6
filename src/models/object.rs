//! Represents an object stored under a key in the backing store.

use axum::http::{HeaderMap, header};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Metadata key that tags an object as a collection.
pub const RESOURCETYPE_KEY: &str = "resourcetype";

/// Sentinel value stored under [`RESOURCETYPE_KEY`] for collections.
pub const COLLECTION_MARKER: &str = "<collection />";

/// Standard HTTP representation headers persisted with an object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpMetadata {
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub content_language: Option<String>,
    pub content_encoding: Option<String>,
    pub cache_control: Option<String>,
}

impl HttpMetadata {
    /// Copy the representation headers present on an inbound request.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            content_type: get(header::CONTENT_TYPE),
            content_disposition: get(header::CONTENT_DISPOSITION),
            content_language: get(header::CONTENT_LANGUAGE),
            content_encoding: get(header::CONTENT_ENCODING),
            cache_control: get(header::CACHE_CONTROL),
        }
    }

    /// Header name/value pairs for the fields that are set.
    pub fn header_pairs(&self) -> Vec<(header::HeaderName, &str)> {
        [
            (header::CONTENT_TYPE, &self.content_type),
            (header::CONTENT_DISPOSITION, &self.content_disposition),
            (header::CONTENT_LANGUAGE, &self.content_language),
            (header::CONTENT_ENCODING, &self.content_encoding),
            (header::CACHE_CONTROL, &self.cache_control),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
        .collect()
    }
}

/// A single object as reported by the store.
///
/// Records produced by a listing carry only key, size, timestamp and ETag;
/// `http` and `metadata` are filled in when the record comes from a HEAD.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    /// Content hash as returned by the store, possibly quoted.
    pub etag: String,
    pub http: HttpMetadata,
    pub metadata: BTreeMap<String, String>,
}

impl ObjectRecord {
    pub fn is_collection(&self) -> bool {
        self.metadata.get(RESOURCETYPE_KEY).map(String::as_str) == Some(COLLECTION_MARKER)
    }

    /// The attributes that must survive a re-upload of this object.
    pub fn to_meta(&self) -> ObjectMeta {
        ObjectMeta {
            http: self.http.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Everything written alongside an object body on PUT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMeta {
    pub http: HttpMetadata,
    pub metadata: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Metadata for a collection sentinel object.
    pub fn collection(http: HttpMetadata) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(RESOURCETYPE_KEY.to_string(), COLLECTION_MARKER.to_string());
        Self { http, metadata }
    }
}
