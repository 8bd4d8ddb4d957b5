//! Gateway configuration

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Listener address for the OSS endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindAddr {
    /// IP address to bind
    pub addr: String,
    /// TCP port
    pub port: u16,
}

impl BindAddr {
    /// Creates a new bind address.
    pub fn new(addr: &str, port: u16) -> Self {
        Self {
            addr: addr.to_string(),
            port,
        }
    }

    /// Default listener (all interfaces, port 8080).
    pub fn oss_default() -> Self {
        Self::new("0.0.0.0", 8080)
    }

    /// Parses into a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.addr, self.port)
            .parse()
            .map_err(|_| GatewayError::ConfigError {
                reason: format!("invalid bind address {}:{}", self.addr, self.port),
            })
    }
}

impl Default for BindAddr {
    fn default() -> Self {
        Self::oss_default()
    }
}

/// Process-wide gateway settings.
///
/// Built once at startup, validated, wrapped in an `Arc` and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// OSS listener
    pub bind: BindAddr,
    /// Swift proxy base URL, e.g. `http://127.0.0.1:8090`
    pub backend_url: String,
    /// Identity service base URL; `/v2.0/tokens` is appended
    pub auth_uri: String,
    /// Secret used to verify request signatures and sent to the identity service
    pub shared_secret: String,
    /// Prepended to the tenant id to form the backend account
    pub reseller_prefix: String,
    /// Region reported by `GET ?location` and accepted in bucket creation
    pub location: String,
    /// Default and ceiling for `max-keys`
    pub max_bucket_listing: u32,
    /// Segmented (static large) object handling on delete
    pub allow_multipart_uploads: bool,
    /// Enforce ACLs in the gateway instead of delegating to the backend
    pub oss_acl: bool,
    /// Apply DNS-compatible bucket naming rules
    pub dns_compliant_bucket_names: bool,
    /// Storage class reported in listings
    pub storage_class: String,
    /// Timeout for backend calls
    pub backend_timeout_secs: u64,
    /// Timeout for identity service calls
    pub auth_timeout_secs: u64,
    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: BindAddr::oss_default(),
            backend_url: "http://127.0.0.1:8090".to_string(),
            auth_uri: "http://127.0.0.1:35357".to_string(),
            shared_secret: String::new(),
            reseller_prefix: "AUTH_".to_string(),
            location: "oss-cn-hangzhou".to_string(),
            max_bucket_listing: 1000,
            allow_multipart_uploads: true,
            oss_acl: false,
            dns_compliant_bucket_names: true,
            storage_class: "STANDARD".to_string(),
            backend_timeout_secs: 30,
            auth_timeout_secs: 30,
            log_level: "info".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Loads a `.toml` or `.json` configuration file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => {
                let config: GatewayConfig = toml::from_str(&contents)?;
                Ok(config)
            }
            "json" => {
                let config: GatewayConfig = serde_json::from_str(&contents)?;
                Ok(config)
            }
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        }
    }

    /// Checks invariants the request pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        if self.shared_secret.is_empty() {
            return Err(GatewayError::ConfigError {
                reason: "shared_secret must be set".to_string(),
            });
        }
        if self.auth_uri.is_empty() {
            return Err(GatewayError::ConfigError {
                reason: "auth_uri must be set".to_string(),
            });
        }
        if self.backend_url.is_empty() {
            return Err(GatewayError::ConfigError {
                reason: "backend_url must be set".to_string(),
            });
        }
        if self.max_bucket_listing == 0 {
            return Err(GatewayError::ConfigError {
                reason: "max_bucket_listing must be positive".to_string(),
            });
        }
        self.bind.socket_addr()?;
        Ok(())
    }

    /// Identity service URL without a trailing slash.
    pub fn auth_base(&self) -> &str {
        self.auth_uri.trim_end_matches('/')
    }
}
