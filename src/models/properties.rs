//! WebDAV property set derived from an object record.
//!
//! Properties are never stored on their own. The live `DAV:` properties are
//! computed from the record; anything else lives in the object's metadata
//! map and is surfaced unchanged.

use crate::models::object::{COLLECTION_MARKER, ObjectRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;

/// Names of the live properties, in the order they are rendered.
pub const LIVE_PROPERTIES: [&str; 8] = [
    "creationdate",
    "displayname",
    "getcontentlanguage",
    "getcontentlength",
    "getcontenttype",
    "getetag",
    "getlastmodified",
    "resourcetype",
];

/// Flat property record plus an overflow map for custom properties.
///
/// Empty strings stand for "no value"; they still render as empty elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DavProperties {
    pub creationdate: String,
    pub displayname: String,
    pub getcontentlanguage: String,
    pub getcontentlength: String,
    pub getcontenttype: String,
    pub getetag: String,
    pub getlastmodified: String,
    pub resourcetype: String,
    pub custom: BTreeMap<String, String>,
}

impl DavProperties {
    /// Properties of `record`, or of the synthetic root when `None`.
    pub fn for_resource(record: Option<&ObjectRecord>) -> Self {
        match record {
            Some(record) => Self::from_record(record),
            None => Self::root(Utc::now()),
        }
    }

    pub fn root(now: DateTime<Utc>) -> Self {
        Self {
            creationdate: creation_date(&now),
            getcontentlength: "0".into(),
            getlastmodified: http_date(&now),
            resourcetype: COLLECTION_MARKER.into(),
            ..Self::default()
        }
    }

    /// The store does not track creation time, so `creationdate` reuses the
    /// last-modified timestamp. Metadata keys named like a live property
    /// never surface as custom properties.
    pub fn from_record(record: &ObjectRecord) -> Self {
        let custom = record
            .metadata
            .iter()
            .filter(|(k, _)| !is_live_property(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let http = &record.http;
        Self {
            creationdate: creation_date(&record.last_modified),
            displayname: http.content_disposition.clone().unwrap_or_default(),
            getcontentlanguage: http.content_language.clone().unwrap_or_default(),
            getcontentlength: record.size.to_string(),
            getcontenttype: http.content_type.clone().unwrap_or_default(),
            getetag: record.etag.trim_matches('"').to_string(),
            getlastmodified: http_date(&record.last_modified),
            resourcetype: if record.is_collection() {
                COLLECTION_MARKER.into()
            } else {
                String::new()
            },
            custom,
        }
    }

    pub fn is_collection(&self) -> bool {
        self.resourcetype == COLLECTION_MARKER
    }

    /// Look up a property by its local name.
    pub fn get(&self, name: &str) -> Option<&str> {
        let live = match name {
            "creationdate" => &self.creationdate,
            "displayname" => &self.displayname,
            "getcontentlanguage" => &self.getcontentlanguage,
            "getcontentlength" => &self.getcontentlength,
            "getcontenttype" => &self.getcontenttype,
            "getetag" => &self.getetag,
            "getlastmodified" => &self.getlastmodified,
            "resourcetype" => &self.resourcetype,
            other => return self.custom.get(other).map(String::as_str),
        };
        Some(live.as_str())
    }

    /// Every property: live ones first, then custom ones in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        LIVE_PROPERTIES
            .iter()
            .filter_map(|name| self.get(name).map(|v| (*name, v)))
            .chain(self.custom.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

/// Whether `name` is computed from the record rather than stored.
pub fn is_live_property(name: &str) -> bool {
    LIVE_PROPERTIES.contains(&name)
}

fn creation_date(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// RFC 1123 date as used by `getlastmodified` and `Last-Modified`.
pub fn http_date(ts: &DateTime<Utc>) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
