//! OPTIONS, GET, HEAD and PROPFIND.

use super::{DAV_METHODS, DavRequest, Depth, depth};
use crate::{
    errors::AppError,
    models::{
        object::ObjectRecord,
        properties::{DavProperties, http_date},
        resource::ResourcePath,
    },
    services::{
        dav_service::DavService,
        dav_xml::{Multistatus, parse_propfind},
    },
};
use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use quick_xml::escape::escape;
use tracing::{debug, warn};

/// `OPTIONS`: advertise class 1 compliance and the supported methods.
pub fn options() -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    headers.insert(HeaderName::from_static("dav"), HeaderValue::from_static("1"));
    headers.insert(
        HeaderName::from_static("ms-author-via"),
        HeaderValue::from_static("DAV"),
    );
    if let Ok(allow) = HeaderValue::from_str(&DAV_METHODS.join(", ")) {
        headers.insert(header::ALLOW, allow);
    }
    response
}

/// `GET` / `HEAD`.
///
/// A collection-style path (`/dir/`) renders an HTML index of the immediate
/// children; anything else returns the object body, honouring `Range`.
pub async fn get(
    service: &DavService,
    request: DavRequest,
    head_only: bool,
) -> Result<Response, AppError> {
    if request.collection_style {
        return list_collection(service, &request.path, head_only).await;
    }

    let range = request.header_str("range");
    if head_only && range.is_none() {
        let record = service
            .head(&request.path)
            .await?
            .ok_or_else(|| AppError::not_found(format!("{} not found", request.path)))?;
        let mut response = StatusCode::OK.into_response();
        insert_object_headers(response.headers_mut(), &record, record.size);
        return Ok(response);
    }

    let object = service
        .store()
        .get(request.path.key(), range)
        .await?
        .ok_or_else(|| AppError::not_found(format!("{} not found", request.path)))?;

    let status = if object.content_range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let body = if head_only {
        Body::empty()
    } else {
        Body::from_stream(object.body)
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    let headers = response.headers_mut();
    insert_object_headers(headers, &object.record, object.content_length);
    if let Some(content_range) = object
        .content_range
        .as_deref()
        .and_then(|v| HeaderValue::from_str(v).ok())
    {
        headers.insert(header::CONTENT_RANGE, content_range);
    }
    Ok(response)
}

fn insert_object_headers(headers: &mut HeaderMap, record: &ObjectRecord, content_length: u64) {
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content_length));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    for (name, value) in record.http.header_pairs() {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(_) => warn!(key = %record.key, header = %name, "stored header value is not representable"),
        }
    }

    let etag = if record.etag.starts_with('"') {
        record.etag.clone()
    } else {
        format!("\"{}\"", record.etag)
    };
    if let Ok(etag) = HeaderValue::from_str(&etag) {
        headers.insert(header::ETAG, etag);
    }
    if let Ok(modified) = HeaderValue::from_str(&http_date(&record.last_modified)) {
        headers.insert(header::LAST_MODIFIED, modified);
    }
}

async fn list_collection(
    service: &DavService,
    path: &ResourcePath,
    head_only: bool,
) -> Result<Response, AppError> {
    if !path.is_root() && service.head(path).await?.is_none() {
        return Err(AppError::not_found(format!("{} not found", path)));
    }

    let title = escape(&path.href(true)).into_owned();
    let mut html = format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Index of {0}</title></head>\
         <body><h1>Index of {0}</h1><ul>",
        title
    );
    let mut children = service.children(path, false);
    let mut count = 0usize;
    while let Some(child) = children.try_next().await? {
        let child_path = ResourcePath::from_key(child.key.as_str());
        let collection = child.is_collection();
        let label = if collection {
            format!("{}/", child_path.name())
        } else {
            child_path.name().to_string()
        };
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>",
            escape(&child_path.href(collection)),
            escape(&label)
        ));
        count += 1;
    }
    html.push_str("</ul></body></html>");
    debug!(path = %path, entries = count, "rendered collection index");

    let length = html.len() as u64;
    let body = if head_only { Body::empty() } else { Body::from(html) };
    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    Ok(response)
}

/// `PROPFIND`: properties of the target and, for collections, its
/// children (`Depth: 1`) or whole subtree (`Depth: infinity`, the default).
pub async fn propfind(service: &DavService, request: DavRequest) -> Result<Response, AppError> {
    let depth = depth(&request)
        .map_err(|raw| AppError::forbidden(format!("unsupported Depth `{}`", raw)))?
        .unwrap_or(Depth::Infinity);
    let path = request.path.clone();

    let props = if path.is_root() {
        DavProperties::for_resource(None)
    } else {
        let record = service
            .head(&path)
            .await?
            .ok_or_else(|| AppError::not_found(format!("{} not found", path)))?;
        DavProperties::from_record(&record)
    };
    let wanted = parse_propfind(&request.xml_body().await?)?;

    let mut multistatus = Multistatus::new();
    multistatus.push_propfind(&path.href(props.is_collection()), &props, &wanted);
    let mut responses = 1usize;

    if props.is_collection() && depth != Depth::Zero {
        let mut children = service.children(&path, depth == Depth::Infinity);
        while let Some(child) = children.try_next().await? {
            let child_path = ResourcePath::from_key(child.key.as_str());
            multistatus.push_propfind(
                &child_path.href(child.is_collection()),
                &DavProperties::from_record(&child),
                &wanted,
            );
            responses += 1;
        }
    }
    debug!(path = %path, ?depth, responses, "propfind");

    let mut response = Response::new(Body::from(multistatus.finish()));
    *response.status_mut() = StatusCode::MULTI_STATUS;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/xml; charset=utf-8"),
    );
    Ok(response)
}
