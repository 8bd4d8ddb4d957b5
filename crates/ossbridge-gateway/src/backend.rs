#![allow(missing_docs)]

//! Swift backend seam: request/response values and path construction

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// One call against the Swift API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRequest {
    pub method: String,
    /// Already percent-encoded `/v1/...` path
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl BackendRequest {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_headers<I>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.headers.extend(headers);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Swift reply. Header names are lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl BackendResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_lowercase(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_lowercase()).map(|s| s.as_str())
    }
}

/// Transport to the Swift proxy.
///
/// Implementations return `Err` only for transport failures; every HTTP
/// status, error or not, comes back as a [`BackendResponse`].
#[async_trait]
pub trait Backend: Send + Sync {
    async fn send(&self, req: BackendRequest) -> Result<BackendResponse>;
}

/// Percent-encodes one path segment.
fn segment(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// Swift path for an account, container and object.
///
/// Object keys keep their `/` separators.
pub fn swift_path(account: &str, container: Option<&str>, object: Option<&str>) -> String {
    let mut path = format!("/v1/{}", segment(account));
    if let Some(container) = container {
        path.push('/');
        path.push_str(&segment(container));
        if let Some(object) = object {
            path.push('/');
            let encoded: Vec<String> = object.split('/').map(segment).collect();
            path.push_str(&encoded.join("/"));
        }
    }
    path
}

/// Backend identity for one request: the derived account and its token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub account: String,
    token: String,
}

impl Session {
    pub fn new(account: &str, token: &str) -> Self {
        Self {
            account: account.to_string(),
            token: token.to_string(),
        }
    }

    pub fn account_request(&self, method: &str) -> BackendRequest {
        self.authed(method, swift_path(&self.account, None, None))
    }

    pub fn container_request(&self, method: &str, container: &str) -> BackendRequest {
        self.authed(method, swift_path(&self.account, Some(container), None))
    }

    pub fn object_request(&self, method: &str, container: &str, object: &str) -> BackendRequest {
        self.authed(
            method,
            swift_path(&self.account, Some(container), Some(object)),
        )
    }

    /// `X-Copy-From` value for a source object.
    pub fn copy_from(container: &str, object: &str) -> String {
        let encoded: Vec<String> = object.split('/').map(segment).collect();
        format!("/{}/{}", segment(container), encoded.join("/"))
    }

    fn authed(&self, method: &str, path: String) -> BackendRequest {
        BackendRequest::new(method, &path).with_header("X-Auth-Token", &self.token)
    }
}
