//! Keystone v2.0 token endpoint client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error};

use crate::credentials::{IdentityReply, IdentityService};
use crate::error::{GatewayError, Result};

/// Identity service reached over HTTP at `<auth_uri>/v2.0/tokens`.
#[derive(Clone)]
pub struct KeystoneClient {
    client: Client,
    token_url: String,
}

impl KeystoneClient {
    /// Client for the identity service at `auth_base`.
    pub fn new(auth_base: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            token_url: format!("{}/v2.0/tokens", auth_base.trim_end_matches('/')),
        }
    }

    /// Token endpoint URL.
    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

#[async_trait]
impl IdentityService for KeystoneClient {
    async fn request_token(&self, payload: &Value) -> Result<IdentityReply> {
        debug!("Requesting token from {}", self.token_url);
        let response = self
            .client
            .post(&self.token_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach identity service: {}", e);
                GatewayError::IdentityError {
                    reason: e.to_string(),
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| GatewayError::IdentityError {
                reason: e.to_string(),
            })?;
        debug!("Identity service replied with status {}", status);

        Ok(IdentityReply {
            status,
            body: body.to_vec(),
        })
    }
}
