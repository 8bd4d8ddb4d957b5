//! Backend status to OSS error translation tables

use crate::oss_error::{ErrorCode, OssError};

/// The backend call a status came back from.
///
/// The same status means different things depending on the call: a 404 on a
/// container GET is a missing bucket, on an object PUT it is also a missing
/// bucket, on an object GET it is a missing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOp {
    /// GET account (bucket list)
    ListContainers,
    /// HEAD container
    HeadContainer,
    /// GET container (object list)
    GetContainer,
    /// PUT container
    PutContainer,
    /// POST container (ACL update)
    PostContainer,
    /// DELETE container
    DeleteContainer,
    /// HEAD object
    HeadObject,
    /// GET object
    GetObject,
    /// PUT object
    PutObject,
    /// HEAD of the copy source, with the source conditionals attached
    HeadCopySource,
    /// PUT object carrying `X-Copy-From`
    CopyObject,
    /// POST object (ACL update)
    PostObject,
    /// DELETE object
    DeleteObject,
}

impl BackendOp {
    /// Explicit status table for this operation.
    ///
    /// Returns `None` for statuses the operation has no specific entry for;
    /// [`translate`] then applies the 5xx rule or the operation's 4xx fallback.
    fn lookup(&self, status: u16) -> Option<ErrorCode> {
        // shared by every backend call
        match status {
            401 => return Some(ErrorCode::SignatureDoesNotMatch),
            403 => return Some(ErrorCode::AccessDenied),
            _ => {}
        }
        match (self, status) {
            (BackendOp::HeadContainer, 404)
            | (BackendOp::GetContainer, 404)
            | (BackendOp::PostContainer, 404)
            | (BackendOp::DeleteContainer, 404) => Some(ErrorCode::NoSuchBucket),
            (BackendOp::PutContainer, 202) => Some(ErrorCode::BucketAlreadyExists),
            (BackendOp::PutContainer, 400) => Some(ErrorCode::InvalidBucketName),
            (BackendOp::DeleteContainer, 409) => Some(ErrorCode::BucketNotEmpty),

            (BackendOp::HeadObject, 404)
            | (BackendOp::GetObject, 404)
            | (BackendOp::DeleteObject, 404)
            | (BackendOp::PostObject, 404) => Some(ErrorCode::NoSuchKey),
            (BackendOp::HeadObject, 412) | (BackendOp::GetObject, 412) => {
                Some(ErrorCode::PreconditionFailed)
            }
            (BackendOp::HeadObject, 416) | (BackendOp::GetObject, 416) => {
                Some(ErrorCode::InvalidRange)
            }

            (BackendOp::PutObject, 404) | (BackendOp::CopyObject, 404) => {
                Some(ErrorCode::NoSuchBucket)
            }
            (BackendOp::PutObject, 408) | (BackendOp::CopyObject, 408) => {
                Some(ErrorCode::RequestTimeout)
            }
            (BackendOp::PutObject, 411) => Some(ErrorCode::MissingContentLength),
            (BackendOp::PutObject, 413) | (BackendOp::CopyObject, 413) => {
                Some(ErrorCode::EntityTooLarge)
            }
            (BackendOp::PutObject, 422) => Some(ErrorCode::BadDigest),
            // conditionals never travel on the write, so a 412 here is a backend fault
            (BackendOp::PutObject, 412) | (BackendOp::CopyObject, 412) => {
                Some(ErrorCode::InternalError)
            }

            (BackendOp::HeadCopySource, 404) => Some(ErrorCode::NoSuchKey),
            (BackendOp::HeadCopySource, 304) | (BackendOp::HeadCopySource, 412) => {
                Some(ErrorCode::PreconditionFailed)
            }
            _ => None,
        }
    }

    /// Generic 4xx code for statuses absent from the table.
    pub fn fallback_4xx(&self) -> ErrorCode {
        match self {
            BackendOp::ListContainers
            | BackendOp::HeadContainer
            | BackendOp::GetContainer
            | BackendOp::PutContainer
            | BackendOp::PostContainer
            | BackendOp::DeleteContainer
            | BackendOp::HeadObject
            | BackendOp::GetObject
            | BackendOp::PostObject
            | BackendOp::DeleteObject => ErrorCode::InvalidRequest,
            BackendOp::PutObject | BackendOp::HeadCopySource | BackendOp::CopyObject => {
                ErrorCode::InvalidArgument
            }
        }
    }
}

/// Maps a backend status to an external error code.
///
/// `None` means the status is a success for this operation. Only 2xx
/// succeeds, plus 304 on a conditional object read; every other status the
/// backend should never send is an internal error.
pub fn translate(op: BackendOp, status: u16) -> Option<ErrorCode> {
    if let Some(code) = op.lookup(status) {
        return Some(code);
    }
    match (op, status) {
        (_, 200..=299) => None,
        (BackendOp::GetObject | BackendOp::HeadObject, 304) => None,
        (_, 400..=499) => Some(op.fallback_4xx()),
        _ => Some(ErrorCode::InternalError),
    }
}

/// Builds the error for a failed backend call, or `None` on success.
pub fn backend_error(op: BackendOp, status: u16, resource: &str) -> Option<OssError> {
    translate(op, status).map(|code| OssError::new(code).with_resource(resource))
}
