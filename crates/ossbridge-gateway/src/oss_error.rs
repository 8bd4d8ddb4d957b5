#![allow(missing_docs)]

//! OSS wire error codes and the error record returned to clients

use std::fmt;

use thiserror::Error;
use tracing::error;

use crate::error::GatewayError;
use crate::oss_xml;

/// Error codes of the external protocol.
///
/// Each code carries a default HTTP status and message; an [`OssError`] may
/// override both when a specific stage needs to (the identity exchange, for
/// instance, reports `AccessDenied` as 401).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // authentication
    Unauthorized,
    AccessDenied,
    SignatureDoesNotMatch,
    InvalidURI,
    // resource
    NoSuchBucket,
    NoSuchKey,
    BucketAlreadyExists,
    BucketNotEmpty,
    InvalidBucketName,
    NoLoggingStatusForKey,
    InvalidLocationConstraint,
    // precondition
    PreconditionFailed,
    InvalidRange,
    // request
    MissingContentLength,
    EntityTooLarge,
    BadDigest,
    InvalidDigest,
    InvalidArgument,
    InvalidRequest,
    RequestTimeout,
    MethodNotAllowed,
    NotImplemented,
    MalformedACLError,
    MalformedXML,
    // server
    InternalError,
}

impl ErrorCode {
    /// Code string written into `<Code>`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Unauthorized",
            ErrorCode::AccessDenied => "AccessDenied",
            ErrorCode::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            ErrorCode::InvalidURI => "InvalidURI",
            ErrorCode::NoSuchBucket => "NoSuchBucket",
            ErrorCode::NoSuchKey => "NoSuchKey",
            ErrorCode::BucketAlreadyExists => "BucketAlreadyExists",
            ErrorCode::BucketNotEmpty => "BucketNotEmpty",
            ErrorCode::InvalidBucketName => "InvalidBucketName",
            ErrorCode::NoLoggingStatusForKey => "NoLoggingStatusForKey",
            ErrorCode::InvalidLocationConstraint => "InvalidLocationConstraint",
            ErrorCode::PreconditionFailed => "PreconditionFailed",
            ErrorCode::InvalidRange => "InvalidRange",
            ErrorCode::MissingContentLength => "MissingContentLength",
            ErrorCode::EntityTooLarge => "EntityTooLarge",
            ErrorCode::BadDigest => "BadDigest",
            ErrorCode::InvalidDigest => "InvalidDigest",
            ErrorCode::InvalidArgument => "InvalidArgument",
            ErrorCode::InvalidRequest => "InvalidRequest",
            ErrorCode::RequestTimeout => "RequestTimeout",
            ErrorCode::MethodNotAllowed => "MethodNotAllowed",
            ErrorCode::NotImplemented => "NotImplemented",
            ErrorCode::MalformedACLError => "MalformedACLError",
            ErrorCode::MalformedXML => "MalformedXML",
            ErrorCode::InternalError => "InternalError",
        }
    }

    /// Default HTTP status for the code.
    pub fn status(&self) -> u16 {
        match self {
            ErrorCode::Unauthorized => 401,
            ErrorCode::AccessDenied | ErrorCode::SignatureDoesNotMatch => 403,
            ErrorCode::NoSuchBucket | ErrorCode::NoSuchKey => 404,
            ErrorCode::MethodNotAllowed => 405,
            ErrorCode::BucketAlreadyExists | ErrorCode::BucketNotEmpty => 409,
            ErrorCode::MissingContentLength => 411,
            ErrorCode::PreconditionFailed => 412,
            ErrorCode::InvalidRange => 416,
            ErrorCode::InternalError => 500,
            ErrorCode::NotImplemented => 501,
            ErrorCode::InvalidURI
            | ErrorCode::InvalidBucketName
            | ErrorCode::NoLoggingStatusForKey
            | ErrorCode::InvalidLocationConstraint
            | ErrorCode::EntityTooLarge
            | ErrorCode::BadDigest
            | ErrorCode::InvalidDigest
            | ErrorCode::InvalidArgument
            | ErrorCode::InvalidRequest
            | ErrorCode::RequestTimeout
            | ErrorCode::MalformedACLError
            | ErrorCode::MalformedXML => 400,
        }
    }

    /// Default message written into `<Message>`.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Unauthorized",
            ErrorCode::AccessDenied => "Access Denied.",
            ErrorCode::SignatureDoesNotMatch => {
                "The request signature we calculated does not match the signature you provided. Check your key and signing method."
            }
            ErrorCode::InvalidURI => "Could not parse the specified URI",
            ErrorCode::NoSuchBucket => "The specified bucket does not exist",
            ErrorCode::NoSuchKey => "The specified key does not exist.",
            ErrorCode::BucketAlreadyExists => {
                "The requested bucket name is not available. The bucket namespace is shared by all users of the system. Please select a different name and try again."
            }
            ErrorCode::BucketNotEmpty => "The bucket you tried to delete is not empty",
            ErrorCode::InvalidBucketName => "The specified bucket is not valid",
            ErrorCode::NoLoggingStatusForKey => {
                "There is no such thing as a logging status sub-resource for a key"
            }
            ErrorCode::InvalidLocationConstraint => {
                "The specified location constraint is not valid"
            }
            ErrorCode::PreconditionFailed => {
                "At least one of the preconditions you specified did not hold."
            }
            ErrorCode::InvalidRange => "The requested range is not satisfiable",
            ErrorCode::MissingContentLength => {
                "You must provide the Content-Length HTTP header."
            }
            ErrorCode::EntityTooLarge => {
                "Your proposed upload exceeds the maximum allowed object size."
            }
            ErrorCode::BadDigest => {
                "The Content-MD5 you specified did not match what we received."
            }
            ErrorCode::InvalidDigest => "The Content-MD5 you specified was invalid",
            ErrorCode::InvalidArgument => "Invalid Argument",
            ErrorCode::InvalidRequest => "Invalid Request",
            ErrorCode::RequestTimeout => {
                "Your socket connection to the server was not read from or written to within the timeout period."
            }
            ErrorCode::MethodNotAllowed => {
                "The specified method is not allowed against this resource."
            }
            ErrorCode::NotImplemented => {
                "A header you provided implies functionality that is not implemented"
            }
            ErrorCode::MalformedACLError => {
                "The XML you provided was not well-formed or did not validate against our published schema"
            }
            ErrorCode::MalformedXML => {
                "The XML you provided was not well-formed or did not validate against our published schema."
            }
            ErrorCode::InternalError => {
                "We encountered an internal error. Please try again."
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal error outcome of one request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code} ({status}): {message}")]
pub struct OssError {
    /// External error code
    pub code: ErrorCode,
    /// HTTP status sent to the client
    pub status: u16,
    /// Human readable message
    pub message: String,
    /// `<Resource>` element, when known
    pub resource: Option<String>,
    /// `<BucketName>` element, when known
    pub bucket: Option<String>,
    /// `<Key>` element, when known
    pub key: Option<String>,
    /// Extra response headers (challenge headers and the like)
    pub headers: Vec<(String, String)>,
}

impl OssError {
    /// Error with the code's default status and message.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            status: code.status(),
            message: code.default_message().to_string(),
            resource: None,
            bucket: None,
            key: None,
            headers: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Shorthand for `InvalidArgument` with a specific message.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument).with_message(message)
    }

    /// Renders the `<Error>` document.
    pub fn to_xml(&self, request_id: &str) -> String {
        oss_xml::error_xml(self, request_id)
    }
}

impl From<ErrorCode> for OssError {
    fn from(code: ErrorCode) -> Self {
        OssError::new(code)
    }
}

impl From<GatewayError> for OssError {
    fn from(e: GatewayError) -> Self {
        error!("internal failure: {}", e);
        OssError::new(ErrorCode::InternalError)
    }
}

/// Result type for request handling stages.
pub type OssResult<T> = std::result::Result<T, OssError>;
