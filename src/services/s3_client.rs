//! S3-compatible HTTP backend.
//!
//! Speaks ListObjectsV2, HEAD/GET/PUT/DELETE object, DeleteObjects and
//! CopyObject against a path-style endpoint (`{endpoint}/{bucket}/{key}`),
//! signing every request with SigV4. Keys are percent-encoded per segment.

use crate::{
    config::S3Settings,
    models::{
        object::{HttpMetadata, ObjectMeta, ObjectRecord},
        resource::PATH_ENCODE_SET,
    },
    services::{
        sigv4::{SigV4Signer, SignableRequest, UNSIGNED_PAYLOAD, amz_date, canonical_query, hex_sha256},
        store::{
            ByteStream, GetResponse, ListPage, ListRequest, ObjectStore, StoreError, StoreResult,
        },
    },
};
use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use base64::{Engine as _, engine::general_purpose};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use percent_encoding::utf8_percent_encode;
use reqwest::{Body, Url};
use quick_xml::se::to_string as to_xml;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, io};
use tracing::debug;

const META_PREFIX: &str = "x-amz-meta-";

#[derive(Debug)]
pub struct S3Store {
    http: reqwest::Client,
    /// `scheme://host[:port]`
    origin: String,
    /// Value of the `host` header.
    host: String,
    /// Encoded path of the bucket, e.g. `/prefix/my-bucket`.
    bucket_path: String,
    bucket: String,
    signer: SigV4Signer,
}

/// A request about to be signed and sent.
struct Outbound {
    method: Method,
    path: String,
    query: String,
    headers: BTreeMap<String, String>,
    body: Body,
    payload_hash: String,
}

impl Outbound {
    fn new(method: Method, path: String) -> Self {
        Self {
            method,
            path,
            query: String::new(),
            headers: BTreeMap::new(),
            body: Body::from(Bytes::new()),
            payload_hash: hex_sha256(b""),
        }
    }

    fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    fn buffered_body(mut self, bytes: Bytes) -> Self {
        self.payload_hash = hex_sha256(&bytes);
        self.body = Body::from(bytes);
        self
    }
}

impl S3Store {
    pub fn new(config: S3Settings) -> StoreResult<Self> {
        let base = Url::parse(&config.endpoint)
            .map_err(|err| StoreError::Malformed(format!("endpoint `{}`: {}", config.endpoint, err)))?;
        let host_name = base
            .host_str()
            .ok_or_else(|| StoreError::Malformed(format!("endpoint `{}` has no host", config.endpoint)))?;
        let host = match base.port() {
            Some(port) => format!("{}:{}", host_name, port),
            None => host_name.to_string(),
        };
        let bucket_path = format!(
            "{}/{}",
            base.path().trim_end_matches('/'),
            utf8_percent_encode(&config.bucket, PATH_ENCODE_SET)
        );

        Ok(Self {
            http: reqwest::Client::builder().build()?,
            origin: format!("{}://{}", base.scheme(), host),
            host,
            bucket_path,
            bucket: config.bucket,
            signer: SigV4Signer::new(
                config.access_key_id,
                config.secret_access_key,
                config.region,
            ),
        })
    }

    fn object_path(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.bucket_path,
            utf8_percent_encode(key, PATH_ENCODE_SET)
        )
    }

    async fn send(&self, outbound: Outbound) -> StoreResult<reqwest::Response> {
        let now = Utc::now();
        let mut headers = outbound.headers;
        headers.insert("host".into(), self.host.clone());
        headers.insert("x-amz-content-sha256".into(), outbound.payload_hash.clone());
        headers.insert("x-amz-date".into(), amz_date(&now));

        let authorization = self.signer.authorization(
            &SignableRequest {
                method: outbound.method.as_str(),
                canonical_uri: &outbound.path,
                canonical_query: &outbound.query,
                headers: &headers,
                payload_hash: &outbound.payload_hash,
            },
            &now,
        );

        let url = if outbound.query.is_empty() {
            format!("{}{}", self.origin, outbound.path)
        } else {
            format!("{}{}?{}", self.origin, outbound.path, outbound.query)
        };
        debug!(method = %outbound.method, %url, "object store request");

        let mut request = self
            .http
            .request(outbound.method, url)
            .header(header::AUTHORIZATION, authorization);
        for (name, value) in headers.iter().filter(|(name, _)| name.as_str() != "host") {
            request = request.header(name.as_str(), value.as_str());
        }
        Ok(request.body(outbound.body).send().await?)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn head(&self, key: &str) -> StoreResult<Option<ObjectRecord>> {
        let response = self
            .send(Outbound::new(Method::HEAD, self.object_path(key)))
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let size = header_u64(response.headers(), header::CONTENT_LENGTH).unwrap_or(0);
                Ok(Some(record_from_headers(key, size, response.headers())))
            }
            status => Err(status_error("head", key, status)),
        }
    }

    async fn get(&self, key: &str, range: Option<&str>) -> StoreResult<Option<GetResponse>> {
        let mut outbound = Outbound::new(Method::GET, self.object_path(key));
        if let Some(range) = range {
            outbound = outbound.header("range", range);
        }
        let response = self.send(outbound).await?;
        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::RANGE_NOT_SATISFIABLE => {
                return Err(StoreError::RangeNotSatisfiable(key.to_string()));
            }
            status if status.is_success() => {}
            status => return Err(status_error("get", key, status)),
        }

        let headers = response.headers();
        let content_length = header_u64(headers, header::CONTENT_LENGTH).unwrap_or(0);
        let content_range = headers
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let size = content_range
            .as_deref()
            .and_then(|r| r.rsplit('/').next())
            .and_then(|total| total.parse().ok())
            .unwrap_or(content_length);
        let record = record_from_headers(key, size, headers);
        let body: ByteStream = response.bytes_stream().map_err(io::Error::other).boxed();

        Ok(Some(GetResponse {
            record,
            body,
            content_length,
            content_range,
        }))
    }

    async fn put(
        &self,
        key: &str,
        body: ByteStream,
        content_length: Option<u64>,
        meta: &ObjectMeta,
    ) -> StoreResult<()> {
        let mut outbound = Outbound::new(Method::PUT, self.object_path(key));
        for (name, value) in meta.http.header_pairs() {
            outbound = outbound.header(name.as_str(), checked_header(value)?);
        }
        for (name, value) in &meta.metadata {
            outbound = outbound.header(&format!("{}{}", META_PREFIX, name), checked_header(value)?);
        }

        outbound = match content_length {
            Some(len) => {
                let mut outbound = outbound.header("content-length", len.to_string());
                outbound.body = Body::wrap_stream(body);
                outbound.payload_hash = UNSIGNED_PAYLOAD.to_string();
                outbound
            }
            None => {
                let buffered = body
                    .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                        acc.extend_from_slice(&chunk);
                        Ok(acc)
                    })
                    .await?;
                outbound.buffered_body(buffered.freeze())
            }
        };

        let response = self.send(outbound).await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            status => Err(status_error("put", key, status)),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let response = self
            .send(Outbound::new(Method::DELETE, self.object_path(key)))
            .await?;
        match response.status() {
            status if status.is_success() || status == StatusCode::NOT_FOUND => Ok(()),
            status => Err(status_error("delete", key, status)),
        }
    }

    async fn delete_many(&self, keys: &[String]) -> StoreResult<()> {
        let Some(first) = keys.first() else {
            return Ok(());
        };
        let body = Bytes::from(delete_request_body(keys)?);
        let content_md5 = general_purpose::STANDARD.encode(md5::compute(&body).0);

        let mut outbound = Outbound::new(Method::POST, self.bucket_path.clone())
            .header("content-md5", content_md5)
            .header("content-type", "application/xml")
            .buffered_body(body);
        outbound.query = canonical_query(&[("delete", "")]);

        let response = self.send(outbound).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error("delete_many", first, status));
        }
        let text = response.text().await?;
        let result: DeleteResultXml = quick_xml::de::from_str(&text)
            .map_err(|err| StoreError::Malformed(format!("DeleteResult: {}", err)))?;
        match result.errors.first() {
            None => Ok(()),
            Some(error) => Err(StoreError::PartialDelete {
                failed: result.errors.len(),
                first_key: error.key.clone(),
            }),
        }
    }

    async fn copy(&self, source: &str, destination: &str) -> StoreResult<()> {
        let copy_source = format!(
            "/{}/{}",
            utf8_percent_encode(&self.bucket, PATH_ENCODE_SET),
            utf8_percent_encode(source, PATH_ENCODE_SET)
        );
        let outbound = Outbound::new(Method::PUT, self.object_path(destination))
            .header("x-amz-copy-source", copy_source);
        let response = self.send(outbound).await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            status => Err(status_error("copy", source, status)),
        }
    }

    async fn list_page(&self, request: &ListRequest) -> StoreResult<ListPage> {
        let mut params = vec![("list-type", "2"), ("prefix", request.prefix.as_str())];
        if let Some(delimiter) = request.delimiter.as_deref() {
            params.push(("delimiter", delimiter));
        }
        if let Some(token) = request.continuation_token.as_deref() {
            params.push(("continuation-token", token));
        }
        let mut outbound = Outbound::new(Method::GET, self.bucket_path.clone());
        outbound.query = canonical_query(&params);

        let response = self.send(outbound).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error("list", &request.prefix, status));
        }
        let text = response.text().await?;
        parse_list_page(&text)
    }
}

fn status_error(operation: &'static str, key: &str, status: StatusCode) -> StoreError {
    StoreError::Status {
        operation,
        key: key.to_string(),
        status: status.as_u16(),
    }
}

fn checked_header(value: &str) -> StoreResult<&str> {
    HeaderValue::from_str(value)
        .map(|_| value)
        .map_err(|_| StoreError::InvalidHeader(value.to_string()))
}

fn header_u64(headers: &HeaderMap, name: header::HeaderName) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Build a record from HEAD/GET response headers.
fn record_from_headers(key: &str, size: u64, headers: &HeaderMap) -> ObjectRecord {
    let last_modified = headers
        .get(header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let etag = headers
        .get(header::ETAG)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let metadata = headers
        .iter()
        .filter_map(|(name, value)| {
            let name = name.as_str().strip_prefix(META_PREFIX)?;
            Some((name.to_string(), value.to_str().ok()?.to_string()))
        })
        .collect();

    ObjectRecord {
        key: key.to_string(),
        size,
        last_modified,
        etag,
        http: HttpMetadata::from_headers(headers),
        metadata,
    }
}

#[derive(Debug, Deserialize)]
struct ListBucketResultXml {
    #[serde(rename = "IsTruncated", default)]
    is_truncated: bool,
    #[serde(rename = "NextContinuationToken", default)]
    next_continuation_token: Option<String>,
    #[serde(rename = "Contents", default)]
    contents: Vec<ContentsXml>,
    #[serde(rename = "CommonPrefixes", default)]
    common_prefixes: Vec<CommonPrefixXml>,
}

#[derive(Debug, Deserialize)]
struct ContentsXml {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Size", default)]
    size: u64,
    #[serde(rename = "LastModified", default)]
    last_modified: String,
    #[serde(rename = "ETag", default)]
    etag: String,
}

#[derive(Debug, Deserialize)]
struct CommonPrefixXml {
    #[serde(rename = "Prefix")]
    prefix: String,
}

#[derive(Debug, Default, Deserialize)]
struct DeleteResultXml {
    #[serde(rename = "Error", default)]
    errors: Vec<DeleteErrorXml>,
}

#[derive(Debug, Deserialize)]
struct DeleteErrorXml {
    #[serde(rename = "Key", default)]
    key: String,
}

#[derive(Serialize)]
#[serde(rename = "Delete")]
struct DeleteRequestXml<'a> {
    #[serde(rename = "Quiet")]
    quiet: bool,
    #[serde(rename = "Object")]
    objects: Vec<DeleteObjectXml<'a>>,
}

#[derive(Serialize)]
struct DeleteObjectXml<'a> {
    #[serde(rename = "Key")]
    key: &'a str,
}

/// DeleteObjects request body for `keys`.
fn delete_request_body(keys: &[String]) -> StoreResult<String> {
    let request = DeleteRequestXml {
        quiet: true,
        objects: keys.iter().map(|key| DeleteObjectXml { key }).collect(),
    };
    let xml = to_xml(&request)
        .map_err(|err| StoreError::Malformed(format!("Delete request: {}", err)))?;
    Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{}", xml))
}

fn parse_list_page(xml: &str) -> StoreResult<ListPage> {
    let parsed: ListBucketResultXml = quick_xml::de::from_str(xml)
        .map_err(|err| StoreError::Malformed(format!("ListBucketResult: {}", err)))?;

    let objects = parsed
        .contents
        .into_iter()
        .map(|c| ObjectRecord {
            last_modified: DateTime::parse_from_rfc3339(&c.last_modified)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            key: c.key,
            size: c.size,
            etag: c.etag,
            http: HttpMetadata::default(),
            metadata: BTreeMap::new(),
        })
        .collect();

    Ok(ListPage {
        objects,
        common_prefixes: parsed.common_prefixes.into_iter().map(|p| p.prefix).collect(),
        is_truncated: parsed.is_truncated,
        next_continuation_token: parsed.next_continuation_token,
    })
}
