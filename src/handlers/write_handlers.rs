//! PUT, MKCOL, DELETE and PROPPATCH.

use super::DavRequest;
use crate::{
    errors::AppError,
    models::{
        object::{HttpMetadata, ObjectMeta},
        properties::is_live_property,
        resource::ResourcePath,
    },
    services::{
        dav_service::DavService,
        dav_xml::{Multistatus, PatchAction, PatchOutcome, parse_proppatch},
        store::bytes_stream,
    },
};
use axum::{
    body::{Body, Bytes},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, info, warn};

async fn require_parent_collection(
    service: &DavService,
    path: &ResourcePath,
) -> Result<(), AppError> {
    if service.parent_is_collection(path).await? {
        Ok(())
    } else {
        Err(AppError::conflict(format!(
            "parent of {} is missing or not a collection",
            path
        )))
    }
}

/// `PUT`: create or replace a resource.
pub async fn put(service: &DavService, request: DavRequest) -> Result<Response, AppError> {
    if request.collection_style || request.path.is_root() {
        return Err(AppError::method_not_allowed(
            "cannot PUT to a collection-style path",
        ));
    }
    let path = request.path.clone();
    if service.head(&path).await?.is_some_and(|r| r.is_collection()) {
        return Err(AppError::method_not_allowed(format!(
            "{} is a collection",
            path
        )));
    }
    require_parent_collection(service, &path).await?;

    let meta = ObjectMeta {
        http: HttpMetadata::from_headers(&request.headers),
        ..ObjectMeta::default()
    };
    let length = request.content_length();
    service
        .store()
        .put(path.key(), request.body_stream(), length, &meta)
        .await?;
    info!(path = %path, length, "stored resource");
    Ok(StatusCode::CREATED.into_response())
}

/// `MKCOL`: create a collection sentinel object.
pub async fn mkcol(service: &DavService, request: DavRequest) -> Result<Response, AppError> {
    let path = &request.path;
    if path.is_root() || service.head(path).await?.is_some() {
        return Err(AppError::method_not_allowed(format!("{} already exists", path)));
    }
    require_parent_collection(service, path).await?;

    let meta = ObjectMeta::collection(HttpMetadata::from_headers(&request.headers));
    service
        .store()
        .put(path.key(), bytes_stream(Bytes::new()), Some(0), &meta)
        .await?;
    info!(path = %path, "created collection");
    Ok(StatusCode::CREATED.into_response())
}

/// Remove a resource, or a collection with its whole subtree.
///
/// Shared with MOVE, which clears an existing destination the same way.
pub(super) async fn delete_resource(
    service: &DavService,
    path: &ResourcePath,
) -> Result<(), AppError> {
    if path.is_root() {
        warn!("deleting every key in the store");
        service.fanout().delete_tree(path).await?;
        return Ok(());
    }
    let record = service
        .head(path)
        .await?
        .ok_or_else(|| AppError::not_found(format!("{} not found", path)))?;
    if record.is_collection() {
        service.fanout().delete_tree(path).await?;
    } else {
        service.store().delete(path.key()).await?;
        debug!(path = %path, "deleted resource");
    }
    Ok(())
}

/// `DELETE`
pub async fn delete(service: &DavService, request: DavRequest) -> Result<Response, AppError> {
    delete_resource(service, &request.path).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// `PROPPATCH`: merge property updates into the object's metadata.
///
/// The store cannot update metadata in place, so the object is re-uploaded
/// with its current body and the merged metadata. Live properties are
/// protected; naming one rejects the whole update and nothing is written.
pub async fn proppatch(service: &DavService, request: DavRequest) -> Result<Response, AppError> {
    let path = request.path.clone();
    if path.is_root() {
        return Err(AppError::forbidden("the root collection has no properties to patch"));
    }
    let record = service
        .head(&path)
        .await?
        .ok_or_else(|| AppError::not_found(format!("{} not found", path)))?;
    let ops = parse_proppatch(&request.xml_body().await?)?;

    let rejected = ops.iter().any(|op| is_live_property(&op.name));
    if rejected {
        warn!(path = %path, "update names a protected property");
    } else {
        let mut meta = record.to_meta();
        for op in &ops {
            match op.action {
                PatchAction::Set => {
                    meta.metadata.insert(op.name.clone(), op.value.clone());
                }
                PatchAction::Remove => {
                    meta.metadata.remove(&op.name);
                }
            }
        }

        let current = service
            .store()
            .get(path.key(), None)
            .await?
            .ok_or_else(|| AppError::not_found(format!("{} vanished during update", path)))?;
        service
            .store()
            .put(path.key(), current.body, Some(current.content_length), &meta)
            .await?;
        info!(path = %path, updates = ops.len(), "patched properties");
    }

    let mut multistatus = Multistatus::new();
    multistatus.push_proppatch(
        &path.href(record.is_collection()),
        ops.iter().map(|op| {
            let outcome = if is_live_property(&op.name) {
                PatchOutcome::Protected
            } else if rejected {
                PatchOutcome::FailedDependency
            } else {
                PatchOutcome::Applied
            };
            (op.name.as_str(), outcome)
        }),
    );
    let mut response = Response::new(Body::from(multistatus.finish()));
    *response.status_mut() = StatusCode::MULTI_STATUS;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/xml; charset=utf-8"),
    );
    Ok(response)
}
