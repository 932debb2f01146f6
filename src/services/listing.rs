//! Lazy enumeration of store keys under a prefix.
//!
//! Pages are fetched on demand as the stream is polled. The stream is
//! forward-only: consuming it again means building a new one, which starts
//! over from the first page.

use crate::{
    models::object::ObjectRecord,
    services::store::{ListRequest, ObjectStore, StoreError, StoreResult},
};
use futures::stream::{self, BoxStream, StreamExt};
use std::{collections::VecDeque, sync::Arc};
use tracing::{debug, warn};

/// Delimiter used for one-level listings.
pub const DELIMITER: &str = "/";

enum Cursor {
    Start,
    Next(String),
    Done,
}

struct ListingState {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    recursive: bool,
    cursor: Cursor,
    buffered: VecDeque<ObjectRecord>,
}

/// Stream every object under `prefix`, in store order.
///
/// With `recursive == false` only the immediate level is returned; deeper
/// keys are grouped by the store and skipped. A failed page ends the stream
/// with that error, as does a truncated page that cannot be resumed.
pub fn list_objects(
    store: Arc<dyn ObjectStore>,
    prefix: String,
    recursive: bool,
) -> BoxStream<'static, StoreResult<ObjectRecord>> {
    let state = ListingState {
        store,
        prefix,
        recursive,
        cursor: Cursor::Start,
        buffered: VecDeque::new(),
    };

    stream::try_unfold(state, |mut state| async move {
        loop {
            if let Some(record) = state.buffered.pop_front() {
                return Ok(Some((record, state)));
            }
            let continuation_token = match std::mem::replace(&mut state.cursor, Cursor::Done) {
                Cursor::Done => return Ok(None),
                Cursor::Start => None,
                Cursor::Next(token) => Some(token),
            };

            let request = ListRequest {
                prefix: state.prefix.clone(),
                delimiter: (!state.recursive).then(|| DELIMITER.to_string()),
                continuation_token,
            };
            let page = state.store.list_page(&request).await?;
            debug!(
                prefix = %state.prefix,
                objects = page.objects.len(),
                truncated = page.is_truncated,
                "fetched listing page"
            );

            state.buffered.extend(page.objects);
            if page.is_truncated {
                match page.next_continuation_token {
                    Some(token) => state.cursor = Cursor::Next(token),
                    None => {
                        warn!(prefix = %state.prefix, "truncated page carried no token");
                        return Err(StoreError::Malformed(format!(
                            "truncated listing of `{}` without a continuation token",
                            state.prefix
                        )));
                    }
                }
            }
        }
    })
    .boxed()
}
