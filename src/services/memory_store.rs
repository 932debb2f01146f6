//! In-process object store.
//!
//! Mirrors the S3 backend's observable behaviour (lexicographic paginated
//! listing with continuation tokens and delimiter grouping, byte ranges,
//! batch delete, server-side copy) so the gateway can run without a remote
//! store and so handlers can be exercised end to end in tests.

use crate::{
    models::object::{ObjectMeta, ObjectRecord},
    services::store::{
        ByteStream, GetResponse, ListPage, ListRequest, ObjectStore, StoreError, StoreResult,
        bytes_stream,
    },
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures::TryStreamExt;
use std::{
    collections::{BTreeMap, BTreeSet},
    ops::Bound,
    sync::atomic::{AtomicUsize, Ordering},
};
use tokio::sync::RwLock;

/// Default number of entries per listing page, matching S3.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    record: ObjectRecord,
    data: Bytes,
}

#[derive(Debug)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    page_size: usize,
    /// Keys whose mutations fail with a 500, for exercising error paths.
    failing: RwLock<BTreeSet<String>>,
    calls: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl MemoryStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
            failing: RwLock::new(BTreeSet::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Make every write, copy or delete touching `key` fail.
    #[cfg(test)]
    pub async fn fail_on(&self, key: &str) {
        self.failing.write().await.insert(key.to_string());
    }

    /// Number of store calls served so far.
    #[cfg(test)]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Snapshot of every stored key.
    #[cfg(test)]
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn check_writable(&self, operation: &'static str, key: &str) -> StoreResult<()> {
        if self.failing.read().await.contains(key) {
            return Err(StoreError::Status {
                operation,
                key: key.to_string(),
                status: 500,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn head(&self, key: &str) -> StoreResult<Option<ObjectRecord>> {
        self.count();
        Ok(self.objects.read().await.get(key).map(|o| o.record.clone()))
    }

    async fn get(&self, key: &str, range: Option<&str>) -> StoreResult<Option<GetResponse>> {
        self.count();
        let Some(object) = self.objects.read().await.get(key).cloned() else {
            return Ok(None);
        };
        let total = object.data.len() as u64;
        let Some(range) = range else {
            return Ok(Some(GetResponse {
                record: object.record,
                body: bytes_stream(object.data),
                content_length: total,
                content_range: None,
            }));
        };

        let (start, end) = parse_byte_range(range, total)
            .ok_or_else(|| StoreError::RangeNotSatisfiable(key.to_string()))?;
        let slice = object.data.slice(start as usize..=end as usize);
        Ok(Some(GetResponse {
            record: object.record,
            content_length: slice.len() as u64,
            body: bytes_stream(slice),
            content_range: Some(format!("bytes {}-{}/{}", start, end, total)),
        }))
    }

    async fn put(
        &self,
        key: &str,
        body: ByteStream,
        _content_length: Option<u64>,
        meta: &ObjectMeta,
    ) -> StoreResult<()> {
        self.count();
        self.check_writable("put", key).await?;
        let data = body
            .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await?
            .freeze();
        let record = ObjectRecord {
            key: key.to_string(),
            size: data.len() as u64,
            last_modified: Utc::now(),
            etag: format!("\"{:x}\"", md5::compute(&data)),
            http: meta.http.clone(),
            metadata: meta.metadata.clone(),
        };
        self.objects
            .write()
            .await
            .insert(key.to_string(), StoredObject { record, data });
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.count();
        self.check_writable("delete", key).await?;
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> StoreResult<()> {
        self.count();
        let failing = self.failing.read().await;
        let mut objects = self.objects.write().await;
        let mut failed = Vec::new();
        for key in keys {
            if failing.contains(key) {
                failed.push(key.clone());
            } else {
                objects.remove(key);
            }
        }
        match failed.first() {
            None => Ok(()),
            Some(first) => Err(StoreError::PartialDelete {
                failed: failed.len(),
                first_key: first.clone(),
            }),
        }
    }

    async fn copy(&self, source: &str, destination: &str) -> StoreResult<()> {
        self.count();
        self.check_writable("copy", destination).await?;
        let mut objects = self.objects.write().await;
        let Some(mut copied) = objects.get(source).cloned() else {
            return Err(StoreError::Status {
                operation: "copy",
                key: source.to_string(),
                status: 404,
            });
        };
        copied.record.key = destination.to_string();
        copied.record.last_modified = Utc::now();
        objects.insert(destination.to_string(), copied);
        Ok(())
    }

    async fn list_page(&self, request: &ListRequest) -> StoreResult<ListPage> {
        self.count();
        let objects = self.objects.read().await;
        let token = request.continuation_token.as_deref();
        let lower = match token {
            Some(token) => Bound::Excluded(token.to_string()),
            None => Bound::Included(request.prefix.clone()),
        };

        let mut page = ListPage::default();
        let mut emitted = 0usize;
        let mut last_emitted: Option<String> = None;
        for (key, object) in objects.range((lower, Bound::Unbounded)) {
            if !key.starts_with(&request.prefix) {
                if key.as_str() > request.prefix.as_str() {
                    break;
                }
                continue;
            }
            // Resuming after a common prefix skips everything it grouped.
            if let (Some(token), Some(delimiter)) = (token, request.delimiter.as_deref()) {
                if token.ends_with(delimiter) && key.starts_with(token) {
                    continue;
                }
            }

            let grouped = request.delimiter.as_deref().and_then(|delimiter| {
                let rest = &key[request.prefix.len()..];
                rest.find(delimiter)
                    .map(|pos| format!("{}{}", request.prefix, &rest[..pos + delimiter.len()]))
            });
            if let Some(common) = &grouped {
                if page.common_prefixes.last() == Some(common) {
                    continue;
                }
            }

            if emitted == self.page_size {
                page.is_truncated = true;
                page.next_continuation_token = last_emitted;
                return Ok(page);
            }
            emitted += 1;
            match grouped {
                Some(common) => {
                    last_emitted = Some(common.clone());
                    page.common_prefixes.push(common);
                }
                None => {
                    last_emitted = Some(key.clone());
                    page.objects.push(object.record.clone());
                }
            }
        }
        Ok(page)
    }
}

/// Resolve a single `bytes=` range against an object of `total` bytes.
///
/// Returns inclusive `(start, end)` offsets, or `None` if unsatisfiable.
fn parse_byte_range(range: &str, total: u64) -> Option<(u64, u64)> {
    let ranges = range.trim().strip_prefix("bytes=")?;
    let (start, end) = ranges.split_once('-')?;
    if total == 0 {
        return None;
    }
    let (start, end) = match (start.trim(), end.trim()) {
        ("", suffix) => {
            let suffix: u64 = suffix.parse().ok()?;
            if suffix == 0 {
                return None;
            }
            (total.saturating_sub(suffix), total - 1)
        }
        (start, "") => (start.parse().ok()?, total - 1),
        (start, end) => (start.parse().ok()?, end.parse::<u64>().ok()?.min(total - 1)),
    };
    (start <= end && start < total).then_some((start, end))
}
