#![allow(missing_docs)]

//! Bucket and service listings built from Swift JSON listings

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::acl::Owner;
use crate::error::GatewayError;
use crate::oss_error::{OssError, OssResult};
use crate::request::OssRequest;

/// Reported for buckets whose creation time the backend does not expose.
pub const DEFAULT_CREATION_DATE: &str = "2009-02-03T16:45:09.000Z";

const ISO8601_MILLIS: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketEntry {
    pub name: String,
    pub creation_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub last_modified: String,
    /// Unquoted
    pub etag: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListBucketResult {
    pub name: String,
    pub prefix: String,
    pub marker: String,
    pub max_keys: u32,
    pub delimiter: Option<String>,
    pub encoding_type: Option<String>,
    pub is_truncated: bool,
    pub next_marker: Option<String>,
    pub contents: Vec<ObjectEntry>,
    pub common_prefixes: Vec<String>,
    pub owner: Owner,
    pub storage_class: String,
}

/// Query parameters of `GET bucket`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub prefix: String,
    pub delimiter: Option<String>,
    pub marker: String,
    pub max_keys: u32,
    pub encoding_type: Option<String>,
}

impl ListParams {
    /// Reads and validates listing parameters; `max-keys` is clamped to `ceiling`.
    pub fn from_request(req: &OssRequest, ceiling: u32) -> OssResult<Self> {
        let max_keys = match req.query_param("max-keys") {
            None => ceiling,
            Some(raw) => {
                let n: i64 = raw.trim().parse().map_err(|_| {
                    OssError::invalid_argument("Provided max-keys not an integer or within integer range")
                })?;
                if n < 0 {
                    return Err(OssError::invalid_argument(
                        "Argument maxKeys must be an integer between 0 and 2147483647",
                    ));
                }
                n.min(ceiling as i64) as u32
            }
        };
        let encoding_type = match req.query_param("encoding-type") {
            None => None,
            Some("url") => Some("url".to_string()),
            Some(_) => {
                return Err(OssError::invalid_argument(
                    "Invalid Encoding Method specified in Request",
                ))
            }
        };
        Ok(Self {
            prefix: req.query_param("prefix").unwrap_or("").to_string(),
            delimiter: req
                .query_param("delimiter")
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            marker: req.query_param("marker").unwrap_or("").to_string(),
            max_keys,
            encoding_type,
        })
    }

    /// Query for the backend container GET; one extra entry detects truncation.
    pub fn backend_query(&self) -> Vec<(String, String)> {
        let mut query = vec![
            ("format".to_string(), "json".to_string()),
            ("limit".to_string(), (self.max_keys as u64 + 1).to_string()),
        ];
        if !self.prefix.is_empty() {
            query.push(("prefix".to_string(), self.prefix.clone()));
        }
        if let Some(delimiter) = &self.delimiter {
            query.push(("delimiter".to_string(), delimiter.clone()));
        }
        if !self.marker.is_empty() {
            query.push(("marker".to_string(), self.marker.clone()));
        }
        query
    }
}

/// One row of a Swift container listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SwiftEntry {
    Subdir {
        subdir: String,
    },
    Object {
        name: String,
        #[serde(default)]
        hash: String,
        #[serde(default)]
        bytes: u64,
        #[serde(default)]
        last_modified: String,
    },
}

impl SwiftEntry {
    fn name(&self) -> &str {
        match self {
            SwiftEntry::Subdir { subdir } => subdir,
            SwiftEntry::Object { name, .. } => name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SwiftContainer {
    name: String,
    #[serde(default)]
    last_modified: Option<String>,
}

fn listing_error(e: serde_json::Error) -> OssError {
    GatewayError::SerializationError {
        reason: format!("backend listing: {}", e),
    }
    .into()
}

pub fn parse_container_listing(body: &[u8]) -> OssResult<Vec<SwiftEntry>> {
    serde_json::from_slice(body).map_err(listing_error)
}

pub fn parse_account_listing(body: &[u8]) -> OssResult<Vec<BucketEntry>> {
    let containers: Vec<SwiftContainer> = serde_json::from_slice(body).map_err(listing_error)?;
    let mut buckets: Vec<BucketEntry> = containers
        .into_iter()
        .map(|c| BucketEntry {
            creation_date: c
                .last_modified
                .as_deref()
                .map(iso8601_from_swift)
                .unwrap_or_else(|| DEFAULT_CREATION_DATE.to_string()),
            name: c.name,
        })
        .collect();
    buckets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(buckets)
}

enum Item {
    Key(ObjectEntry),
    Prefix(String),
}

impl Item {
    fn name(&self) -> &str {
        match self {
            Item::Key(e) => &e.key,
            Item::Prefix(p) => p,
        }
    }
}

/// Applies prefix, marker, delimiter and max-keys to backend entries.
///
/// Entries are re-filtered locally so the result is correct regardless of
/// how much of the query the backend honoured.
pub fn build_listing(
    bucket: &str,
    entries: Vec<SwiftEntry>,
    params: &ListParams,
    owner: Owner,
    storage_class: &str,
) -> ListBucketResult {
    let mut entries = entries;
    entries.sort_by(|a, b| a.name().cmp(b.name()));

    let mut items: Vec<Item> = Vec::new();
    for entry in entries {
        let name = entry.name();
        if !name.starts_with(&params.prefix) || name <= params.marker.as_str() {
            continue;
        }
        let grouped = params.delimiter.as_deref().and_then(|d| {
            name[params.prefix.len()..]
                .find(d)
                .map(|pos| name[..params.prefix.len() + pos + d.len()].to_string())
        });
        let item = match (grouped, entry) {
            (Some(prefix), _) => Item::Prefix(prefix),
            (None, SwiftEntry::Subdir { subdir }) => Item::Prefix(subdir),
            (
                None,
                SwiftEntry::Object {
                    name,
                    hash,
                    bytes,
                    last_modified,
                },
            ) => Item::Key(ObjectEntry {
                key: name,
                last_modified: iso8601_from_swift(&last_modified),
                etag: hash,
                size: bytes,
            }),
        };
        if let Item::Prefix(p) = &item {
            if p.as_str() <= params.marker.as_str() {
                continue;
            }
            if matches!(items.last(), Some(Item::Prefix(last)) if last == p) {
                continue;
            }
        }
        items.push(item);
    }

    let is_truncated = items.len() > params.max_keys as usize;
    items.truncate(params.max_keys as usize);
    let next_marker = if is_truncated && params.delimiter.is_some() {
        items.last().map(|i| i.name().to_string())
    } else {
        None
    };

    let mut contents = Vec::new();
    let mut common_prefixes = Vec::new();
    for item in items {
        match item {
            Item::Key(e) => contents.push(e),
            Item::Prefix(p) => common_prefixes.push(p),
        }
    }

    ListBucketResult {
        name: bucket.to_string(),
        prefix: params.prefix.clone(),
        marker: params.marker.clone(),
        max_keys: params.max_keys,
        delimiter: params.delimiter.clone(),
        encoding_type: params.encoding_type.clone(),
        is_truncated,
        next_marker,
        contents,
        common_prefixes,
        owner,
        storage_class: storage_class.to_string(),
    }
}

/// Swift listing timestamp (`2011-01-05T02:19:14.275290`, UTC) to OSS form.
pub fn iso8601_from_swift(ts: &str) -> String {
    let trimmed = ts.trim_end_matches('Z');
    match NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => naive.and_utc().format(ISO8601_MILLIS).to_string(),
        Err(_) => ts.to_string(),
    }
}

/// HTTP date (`Last-Modified`) to OSS form.
pub fn iso8601_from_http_date(date: &str) -> Option<String> {
    DateTime::parse_from_rfc2822(date)
        .ok()
        .map(|d| d.with_timezone(&Utc).format(ISO8601_MILLIS).to_string())
}

/// Current time at second resolution, as the backend records it.
pub fn iso8601_now() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S.000Z").to_string()
}
