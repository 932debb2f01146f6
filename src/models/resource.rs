//! Resource paths and their mapping onto object-store keys.
//!
//! A request path such as `/photos/2025/` normalizes to the resource path
//! `photos/2025`, which is used verbatim as the store key. The empty path is
//! the namespace root: an implicit collection that is never stored.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use std::{fmt, str::Utf8Error};

/// Characters left untouched when a key is placed in a URL path.
pub const PATH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// A normalized resource path (no leading slash, no trailing slash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourcePath(String);

impl ResourcePath {
    /// The namespace root.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Build from an already-decoded store key.
    pub fn from_key(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Normalize a raw (percent-encoded) URL path.
    ///
    /// Drops the leading slash and one trailing slash. No `.`/`..`
    /// resolution is performed. Escapes that do not decode to UTF-8 are
    /// rejected so that distinct URLs never share a key.
    pub fn from_url_path(raw: &str) -> Result<Self, Utf8Error> {
        let decoded = percent_decode_str(raw).decode_utf8()?;
        let trimmed = decoded.strip_prefix('/').unwrap_or(&decoded);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        Ok(Self(trimmed.to_string()))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The store key for this resource.
    pub fn key(&self) -> &str {
        &self.0
    }

    /// Last path segment; empty for the root.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Parent collection. `None` only for the root.
    pub fn parent(&self) -> Option<ResourcePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(pos) => Some(Self(self.0[..pos].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Listing prefix that selects this collection's descendants.
    pub fn child_prefix(&self) -> String {
        if self.is_root() {
            String::new()
        } else {
            format!("{}/", self.0)
        }
    }

    /// True when `self` equals `other` or lies underneath it.
    pub fn is_within(&self, other: &ResourcePath) -> bool {
        other.is_root() || self.0 == other.0 || self.0.starts_with(&other.child_prefix())
    }

    /// Map a descendant of `from` onto the same relative position under `to`.
    pub fn rebase(&self, from: &ResourcePath, to: &ResourcePath) -> Option<ResourcePath> {
        if self.0 == from.0 {
            return Some(to.clone());
        }
        let rest = self.0.strip_prefix(&from.child_prefix())?;
        if to.is_root() {
            Some(Self(rest.to_string()))
        } else {
            Some(Self(format!("{}/{}", to.0, rest)))
        }
    }

    /// Absolute, percent-encoded href. Collections end with `/`.
    pub fn href(&self, collection: bool) -> String {
        let mut href = format!("/{}", utf8_percent_encode(&self.0, PATH_ENCODE_SET));
        if collection && !self.is_root() {
            href.push('/');
        }
        href
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

/// Whether the raw request path uses collection style (trailing slash).
pub fn is_collection_style(raw: &str) -> bool {
    raw.ends_with('/')
}
