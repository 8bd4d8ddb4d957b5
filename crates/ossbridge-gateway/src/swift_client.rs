//! reqwest-backed Swift proxy client

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use tracing::{debug, error};

use crate::backend::{Backend, BackendRequest, BackendResponse};
use crate::error::{GatewayError, Result};

/// HTTP client for a Swift proxy.
#[derive(Clone)]
pub struct SwiftClient {
    client: Client,
    base_url: String,
}

impl SwiftClient {
    /// Client for `base_url` (scheme, host and port; no trailing path).
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Backend for SwiftClient {
    async fn send(&self, req: BackendRequest) -> Result<BackendResponse> {
        let method = Method::from_bytes(req.method.as_bytes()).map_err(|_| {
            GatewayError::BackendError {
                reason: format!("invalid method {}", req.method),
            }
        })?;
        debug!(method = %method, path = %req.path, "backend request");

        let mut builder = self.client.request(method, self.url(&req.path));
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.body(req.body).send().await.map_err(|e| {
            error!("backend request failed: {}", e);
            GatewayError::BackendError {
                reason: e.to_string(),
            }
        })?;

        let status = response.status().as_u16();
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_lowercase(), v.to_string());
            }
        }
        let body = response.bytes().await?;
        debug!(status = status, "backend response");

        Ok(BackendResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join() {
        let client = SwiftClient::new("http://swift:8080/", 5);
        assert_eq!(client.url("/v1/AUTH_t"), "http://swift:8080/v1/AUTH_t");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let client = SwiftClient::new("http://127.0.0.1:1", 1);
        let err = client
            .send(BackendRequest::new("HEAD", "/v1/AUTH_t"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::BackendError { .. }));
    }
}
