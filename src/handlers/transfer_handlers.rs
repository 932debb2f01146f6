//! COPY and MOVE.
//!
//! Both run the same checks in the same order: request headers (400), root
//! involvement (403), overlapping paths (400), source existence (404),
//! destination parent (409) and finally the overwrite policy (412). They
//! differ in the accepted `Depth` values and in the overwrite default.

use super::{DavRequest, Depth, depth, destination, overwrite, write_handlers::delete_resource};
use crate::{
    errors::AppError,
    models::{object::ObjectRecord, resource::ResourcePath},
    services::dav_service::DavService,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::info;

struct Transfer {
    source: ResourcePath,
    destination: ResourcePath,
    source_record: ObjectRecord,
    /// The destination already existed before the operation.
    replaced: bool,
}

impl Transfer {
    fn status(&self) -> Response {
        if self.replaced {
            StatusCode::NO_CONTENT.into_response()
        } else {
            StatusCode::CREATED.into_response()
        }
    }
}

/// Checks shared by COPY and MOVE. Takes owned paths so no borrow of the
/// request body is held across store calls.
async fn prepare(
    service: &DavService,
    source: ResourcePath,
    destination: ResourcePath,
    allow_overwrite: bool,
    recursive: bool,
) -> Result<Transfer, AppError> {
    if source.is_root() || destination.is_root() {
        return Err(AppError::forbidden("the root collection cannot be copied or moved"));
    }
    if source == destination {
        return Err(AppError::bad_request("source and destination are the same"));
    }
    // Replacing an ancestor would delete the source before it is read.
    if source.is_within(&destination) {
        return Err(AppError::bad_request(format!(
            "{} lies inside {}",
            source, destination
        )));
    }

    let source_record = service
        .head(&source)
        .await?
        .ok_or_else(|| AppError::not_found(format!("{} not found", source)))?;
    if recursive && source_record.is_collection() && destination.is_within(&source) {
        return Err(AppError::bad_request(format!(
            "{} lies inside {}",
            destination, source
        )));
    }
    if !service.parent_is_collection(&destination).await? {
        return Err(AppError::conflict(format!(
            "parent of {} is missing or not a collection",
            destination
        )));
    }

    let replaced = service.head(&destination).await?.is_some();
    if replaced && !allow_overwrite {
        return Err(AppError::precondition_failed(format!(
            "{} exists and overwrite is not permitted",
            destination
        )));
    }

    Ok(Transfer {
        source,
        destination,
        source_record,
        replaced,
    })
}

/// `COPY`: `Depth: 0` copies only the target, `infinity` (the default)
/// copies a collection's whole subtree. Overwrite is allowed unless
/// `Overwrite: F` is sent.
pub async fn copy(service: &DavService, request: DavRequest) -> Result<Response, AppError> {
    let depth = match depth(&request) {
        Ok(None) | Ok(Some(Depth::Infinity)) => Depth::Infinity,
        Ok(Some(Depth::Zero)) => Depth::Zero,
        Ok(Some(Depth::One)) | Err(_) => {
            return Err(AppError::bad_request("COPY supports only Depth 0 or infinity"));
        }
    };
    let allow_overwrite = overwrite(&request)?.unwrap_or(true);
    let target = destination(&request)?;
    let transfer = prepare(
        service,
        request.path,
        target,
        allow_overwrite,
        depth == Depth::Infinity,
    )
    .await?;

    if transfer.replaced {
        delete_resource(service, &transfer.destination).await?;
    }
    let recursive = depth == Depth::Infinity && transfer.source_record.is_collection();
    let copied = service
        .fanout()
        .copy_tree(&transfer.source, &transfer.destination, recursive)
        .await?;
    info!(
        source = %transfer.source,
        destination = %transfer.destination,
        copied,
        replaced = transfer.replaced,
        "copy complete"
    );
    Ok(transfer.status())
}

/// `MOVE`: always the whole subtree. Replacing an existing destination
/// requires `Overwrite: T`.
pub async fn move_resource(service: &DavService, request: DavRequest) -> Result<Response, AppError> {
    match depth(&request) {
        Ok(None) | Ok(Some(Depth::Infinity)) => {}
        _ => return Err(AppError::bad_request("MOVE supports only Depth infinity")),
    }
    let allow_overwrite = overwrite(&request)?.unwrap_or(false);
    let target = destination(&request)?;
    let transfer = prepare(service, request.path, target, allow_overwrite, true).await?;

    if transfer.replaced {
        delete_resource(service, &transfer.destination).await?;
    }
    let moved = if transfer.source_record.is_collection() {
        service
            .fanout()
            .move_tree(&transfer.source, &transfer.destination)
            .await?
    } else {
        let store = service.store();
        store
            .copy(transfer.source.key(), transfer.destination.key())
            .await?;
        store.delete(transfer.source.key()).await?;
        1
    };
    info!(
        source = %transfer.source,
        destination = %transfer.destination,
        moved,
        replaced = transfer.replaced,
        "move complete"
    );
    Ok(transfer.status())
}
