//! Subtree operations: recursive delete, copy and move.
//!
//! Descendants are pulled from a recursive listing and processed by at most
//! `concurrency` in-flight store calls. The subtree root's own operation runs
//! alongside its descendants. The first failure fails the whole operation;
//! calls that already completed are not undone.

use crate::{
    models::resource::ResourcePath,
    services::{
        listing::list_objects,
        store::{ObjectStore, StoreResult},
    },
};
use futures::{TryStreamExt, stream::TryChunksError};
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Instant,
};
use tracing::{debug, info};

/// Upper bound on keys per DeleteObjects request.
pub const DELETE_BATCH_SIZE: usize = 1000;

#[derive(Clone, Debug)]
pub struct FanOut {
    store: Arc<dyn ObjectStore>,
    concurrency: usize,
}

impl FanOut {
    pub fn new(store: Arc<dyn ObjectStore>, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Delete `root` and everything beneath it.
    ///
    /// For the namespace root this empties the whole store. Returns the
    /// number of keys removed.
    pub async fn delete_tree(&self, root: &ResourcePath) -> StoreResult<usize> {
        let started = Instant::now();
        let descendants = self.delete_descendants(root.child_prefix());
        let deleted = if root.is_root() {
            descendants.await?
        } else {
            let (count, ()) = tokio::try_join!(descendants, self.store.delete(root.key()))?;
            count + 1
        };
        info!(
            root = %root,
            deleted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "deleted subtree"
        );
        Ok(deleted)
    }

    /// Server-side copy `source` to `destination`, including every descendant
    /// when `recursive` is set. Returns the number of objects copied.
    pub async fn copy_tree(
        &self,
        source: &ResourcePath,
        destination: &ResourcePath,
        recursive: bool,
    ) -> StoreResult<usize> {
        let started = Instant::now();
        let own = self.store.copy(source.key(), destination.key());
        let copied = if recursive {
            let descendants = self.transfer_descendants(source, destination, false);
            let ((), count) = tokio::try_join!(own, descendants)?;
            count + 1
        } else {
            own.await?;
            1
        };
        info!(
            source = %source,
            destination = %destination,
            copied,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "copied subtree"
        );
        Ok(copied)
    }

    /// Move `source` and its descendants under `destination`, one
    /// copy-then-delete per object.
    pub async fn move_tree(
        &self,
        source: &ResourcePath,
        destination: &ResourcePath,
    ) -> StoreResult<usize> {
        let started = Instant::now();
        let own = async {
            self.store.copy(source.key(), destination.key()).await?;
            self.store.delete(source.key()).await
        };
        let descendants = self.transfer_descendants(source, destination, true);
        let ((), count) = tokio::try_join!(own, descendants)?;
        let moved = count + 1;
        info!(
            source = %source,
            destination = %destination,
            moved,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "moved subtree"
        );
        Ok(moved)
    }

    async fn delete_descendants(&self, prefix: String) -> StoreResult<usize> {
        let deleted = AtomicUsize::new(0);
        list_objects(self.store.clone(), prefix, true)
            .map_ok(|record| record.key)
            .try_chunks(DELETE_BATCH_SIZE)
            .map_err(|TryChunksError(_, err)| err)
            .try_for_each_concurrent(self.concurrency, |keys| {
                let deleted = &deleted;
                async move {
                    debug!(batch = keys.len(), first = %keys[0], "deleting batch");
                    self.store.delete_many(&keys).await?;
                    deleted.fetch_add(keys.len(), Ordering::Relaxed);
                    Ok(())
                }
            })
            .await?;
        Ok(deleted.into_inner())
    }

    async fn transfer_descendants(
        &self,
        source: &ResourcePath,
        destination: &ResourcePath,
        remove_source: bool,
    ) -> StoreResult<usize> {
        let transferred = AtomicUsize::new(0);
        list_objects(self.store.clone(), source.child_prefix(), true)
            .try_for_each_concurrent(self.concurrency, |record| {
                let transferred = &transferred;
                async move {
                    let from = ResourcePath::from_key(record.key);
                    // Listing under the child prefix only yields descendants.
                    let Some(to) = from.rebase(source, destination) else {
                        return Ok(());
                    };
                    self.store.copy(from.key(), to.key()).await?;
                    if remove_source {
                        self.store.delete(from.key()).await?;
                    }
                    transferred.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                }
            })
            .await?;
        Ok(transferred.into_inner())
    }
}
