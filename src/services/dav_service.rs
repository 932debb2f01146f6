use crate::{
    models::{object::ObjectRecord, resource::ResourcePath},
    services::{
        fanout::FanOut,
        listing::list_objects,
        store::{ObjectStore, StoreError, StoreResult},
    },
};
use futures::{
    StreamExt, TryStreamExt,
    stream::BoxStream,
};
use std::sync::Arc;
use tracing::debug;

/// Shared state handed to every request handler.
#[derive(Clone, Debug)]
pub struct DavService {
    store: Arc<dyn ObjectStore>,
    fanout: FanOut,
    concurrency: usize,
}

impl DavService {
    pub fn new(store: Arc<dyn ObjectStore>, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            fanout: FanOut::new(store.clone(), concurrency),
            store,
            concurrency,
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn fanout(&self) -> &FanOut {
        &self.fanout
    }

    /// Record stored at `path`. The root is never stored and yields `None`.
    pub async fn head(&self, path: &ResourcePath) -> StoreResult<Option<ObjectRecord>> {
        if path.is_root() {
            return Ok(None);
        }
        self.store.head(path.key()).await
    }

    /// Whether `path` exists as a collection (the root always does).
    pub async fn is_collection(&self, path: &ResourcePath) -> StoreResult<bool> {
        if path.is_root() {
            return Ok(true);
        }
        Ok(self
            .store
            .head(path.key())
            .await?
            .is_some_and(|record| record.is_collection()))
    }

    /// Whether the parent of `path` exists and is a collection.
    pub async fn parent_is_collection(&self, path: &ResourcePath) -> StoreResult<bool> {
        match path.parent() {
            Some(parent) => {
                let ok = self.is_collection(&parent).await?;
                if !ok {
                    debug!(path = %path, parent = %parent, "parent is missing or not a collection");
                }
                Ok(ok)
            }
            None => Ok(true),
        }
    }

    /// Descendants of `path` with full metadata, in listing order.
    ///
    /// Listings carry no user metadata, so each entry is refreshed with a
    /// HEAD. An entry deleted in between keeps its listed record.
    pub fn children(
        &self,
        path: &ResourcePath,
        recursive: bool,
    ) -> BoxStream<'static, StoreResult<ObjectRecord>> {
        let store = self.store.clone();
        list_objects(self.store.clone(), path.child_prefix(), recursive)
            .map_ok(move |listed| {
                let store = store.clone();
                async move {
                    let hydrated = store.head(&listed.key).await?;
                    Ok::<_, StoreError>(hydrated.unwrap_or(listed))
                }
            })
            .try_buffered(self.concurrency)
            .boxed()
    }
}
