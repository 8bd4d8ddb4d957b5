#![allow(missing_docs)]

//! Inbound OSS request model

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;

use crate::oss_error::{ErrorCode, OssError, OssResult};

/// HTTP verb of an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    Get,
    Head,
    Put,
    Post,
    Delete,
    /// Anything else; always answered with `MethodNotAllowed`
    Other(String),
}

impl Verb {
    pub fn parse(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Verb::Get,
            "HEAD" => Verb::Head,
            "PUT" => Verb::Put,
            "POST" => Verb::Post,
            "DELETE" => Verb::Delete,
            other => Verb::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Verb::Get => "GET",
            Verb::Head => "HEAD",
            Verb::Put => "PUT",
            Verb::Post => "POST",
            Verb::Delete => "DELETE",
            Verb::Other(m) => m.as_str(),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which kind of resource a path addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Service,
    Bucket,
    Object,
}

/// Query-selected sub-operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subresource {
    Acl,
    Logging,
    Location,
}

impl Subresource {
    /// All recognized subresources, in canonical (sorted) order.
    pub const ALL: [Subresource; 3] = [
        Subresource::Acl,
        Subresource::Location,
        Subresource::Logging,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subresource::Acl => "acl",
            Subresource::Logging => "logging",
            Subresource::Location => "location",
        }
    }

    /// First recognized subresource present in the query.
    pub fn from_query(query: &HashMap<String, String>) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|sub| query.contains_key(sub.as_str()))
    }
}

/// Bucket, key and subresource addressed by a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReference {
    /// Bucket name; empty for the service
    pub bucket: String,
    /// Object key
    pub key: Option<String>,
    /// Subresource tag
    pub subresource: Option<Subresource>,
}

impl ResourceReference {
    pub fn resource_type(&self) -> ResourceType {
        if self.bucket.is_empty() {
            ResourceType::Service
        } else if self.key.is_some() {
            ResourceType::Object
        } else {
            ResourceType::Bucket
        }
    }

    /// Path form used in `<Resource>` elements.
    pub fn path(&self) -> String {
        match &self.key {
            Some(key) => format!("/{}/{}", self.bucket, key),
            None => format!("/{}", self.bucket),
        }
    }

    pub fn key_str(&self) -> &str {
        self.key.as_deref().unwrap_or("")
    }
}

/// Inbound request as handed over by the listener.
///
/// Header names are stored lowercased; `path` is the raw, still
/// percent-encoded request path.
#[derive(Debug, Clone)]
pub struct OssRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl OssRequest {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            query: HashMap::new(),
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_lowercase(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(|s| s.as_str())
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_lowercase()).map(|s| s.as_str())
    }

    pub fn verb(&self) -> Verb {
        Verb::parse(&self.method)
    }

    /// Splits and percent-decodes the path into a resource reference.
    ///
    /// `/bucket/` addresses the bucket; `/bucket/a/b` addresses key `a/b`.
    pub fn resource(&self) -> OssResult<ResourceReference> {
        let decoded = urlencoding::decode(&self.path)
            .map_err(|_| OssError::new(ErrorCode::InvalidURI))?;
        let trimmed = decoded.trim_start_matches('/');
        let (bucket, key) = match trimmed.find('/') {
            Some(pos) => {
                let key = &trimmed[pos + 1..];
                let key = if key.is_empty() {
                    None
                } else {
                    Some(key.to_string())
                };
                (trimmed[..pos].to_string(), key)
            }
            None => (trimmed.to_string(), None),
        };
        Ok(ResourceReference {
            bucket,
            key,
            subresource: Subresource::from_query(&self.query),
        })
    }
}

/// Bucket naming rules.
///
/// DNS-compliant names are 3 to 63 characters of lowercase letters, digits,
/// `-` and `.`, starting and ending alphanumeric, without `..` and not shaped
/// like an IPv4 address. The relaxed rules only bound the length and forbid
/// `/`.
pub fn validate_bucket_name(name: &str, dns_compliant: bool) -> bool {
    if name.len() < 3 || name.len() > 255 || name.contains('/') {
        return false;
    }
    if !dns_compliant {
        return true;
    }
    if name.len() > 63 {
        return false;
    }
    let bytes = name.as_bytes();
    let edge_ok = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !edge_ok(bytes[0]) || !edge_ok(bytes[bytes.len() - 1]) {
        return false;
    }
    if !bytes
        .iter()
        .all(|&b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return false;
    }
    if name.contains("..") || name.contains(".-") || name.contains("-.") {
        return false;
    }
    name.parse::<std::net::Ipv4Addr>().is_err()
}
