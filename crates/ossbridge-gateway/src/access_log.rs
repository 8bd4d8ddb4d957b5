#![allow(missing_docs)]

//! Per-request access log line

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::info;

/// One completed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLogEntry {
    /// Unix timestamp in seconds
    pub timestamp: u64,
    /// Gateway-assigned request id, also returned as `x-oss-request-id`
    pub request_id: String,
    /// Inbound HTTP method
    pub method: String,
    /// Operation name (e.g., "GetObject"), empty when routing failed
    pub operation: String,
    /// `/bucket[/key]` as decoded from the path
    pub resource: String,
    /// `access[:tenant]`, empty before authentication
    pub requester: String,
    /// HTTP status returned to the client
    pub status: u16,
    /// OSS error code for failed requests
    pub error_code: Option<String>,
    /// Response body bytes
    pub bytes: u64,
    /// Duration in microseconds
    pub duration_us: u64,
}

impl AccessLogEntry {
    pub fn new(request_id: &str, method: &str, resource: &str) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            timestamp,
            request_id: request_id.to_string(),
            method: method.to_string(),
            operation: String::new(),
            resource: resource.to_string(),
            requester: String::new(),
            status: 0,
            error_code: None,
            bytes: 0,
            duration_us: 0,
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = operation.to_string();
        self
    }

    pub fn with_requester(mut self, requester: &str) -> Self {
        self.requester = requester.to_string();
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_error_code(mut self, code: &str) -> Self {
        self.error_code = Some(code.to_string());
        self
    }

    pub fn with_bytes(mut self, bytes: u64) -> Self {
        self.bytes = bytes;
        self
    }

    pub fn with_duration_us(mut self, duration_us: u64) -> Self {
        self.duration_us = duration_us;
        self
    }

    /// 4xx or 5xx
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// Format as structured string for tracing
    pub fn format_structured(&self) -> String {
        format!(
            "timestamp={} request_id={} method={} operation={} resource={} requester={} status={} error={} bytes={} duration_us={}",
            self.timestamp,
            self.request_id,
            self.method,
            if self.operation.is_empty() { "-" } else { &self.operation },
            self.resource,
            if self.requester.is_empty() { "-" } else { &self.requester },
            self.status,
            self.error_code.as_deref().unwrap_or("-"),
            self.bytes,
            self.duration_us
        )
    }

    /// Emits the entry on the `access` target.
    pub fn emit(&self) {
        info!(target: "access", "{}", self.format_structured());
    }
}
