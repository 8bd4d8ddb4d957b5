//! Internal error types for the ossbridge gateway

use thiserror::Error;

/// Failures inside the gateway process that are not part of the OSS wire contract.
///
/// These never reach a client verbatim: the request pipeline logs them and
/// answers with an `InternalError` document.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Backend transport failure (connect, timeout, body read)
    #[error("Backend error: {reason}")]
    BackendError {
        /// The backend error details
        reason: String,
    },
    /// Identity service transport failure
    #[error("Identity service error: {reason}")]
    IdentityError {
        /// The identity service error details
        reason: String,
    },
    /// Invalid or unusable configuration
    #[error("Configuration error: {reason}")]
    ConfigError {
        /// The configuration problem
        reason: String,
    },
    /// Stored document could not be (de)serialized
    #[error("Serialization error: {reason}")]
    SerializationError {
        /// The serialization failure details
        reason: String,
    },
    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::SerializationError {
            reason: e.to_string(),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::BackendError {
            reason: e.to_string(),
        }
    }
}

/// Result type alias using GatewayError as the error type.
pub type Result<T> = std::result::Result<T, GatewayError>;
