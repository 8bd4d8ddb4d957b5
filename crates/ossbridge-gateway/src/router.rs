//! Operation selection over resource type, verb and subresource

#![allow(missing_docs)]

use std::fmt;

use crate::oss_error::{ErrorCode, OssError, OssResult};
use crate::request::{OssRequest, ResourceReference, ResourceType, Subresource, Verb};

/// Header that turns an object PUT into a server-side copy.
pub const COPY_SOURCE_HEADER: &str = "x-oss-copy-source";

/// Operation a request resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListBuckets,
    GetBucket,
    HeadBucket,
    PutBucket,
    DeleteBucket,
    GetBucketAcl,
    PutBucketAcl,
    GetBucketLocation,
    GetBucketLogging,
    GetObject,
    HeadObject,
    PutObject,
    CopyObject,
    DeleteObject,
    GetObjectAcl,
    PutObjectAcl,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ListBuckets => "ListBuckets",
            Operation::GetBucket => "GetBucket",
            Operation::HeadBucket => "HeadBucket",
            Operation::PutBucket => "PutBucket",
            Operation::DeleteBucket => "DeleteBucket",
            Operation::GetBucketAcl => "GetBucketAcl",
            Operation::PutBucketAcl => "PutBucketAcl",
            Operation::GetBucketLocation => "GetBucketLocation",
            Operation::GetBucketLogging => "GetBucketLogging",
            Operation::GetObject => "GetObject",
            Operation::HeadObject => "HeadObject",
            Operation::PutObject => "PutObject",
            Operation::CopyObject => "CopyObject",
            Operation::DeleteObject => "DeleteObject",
            Operation::GetObjectAcl => "GetObjectAcl",
            Operation::PutObjectAcl => "PutObjectAcl",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Looks up the operation for a request.
///
/// Combinations the gateway does not serve yield `MethodNotAllowed`,
/// `NotImplemented` or `NoLoggingStatusForKey`.
pub fn select(
    resource_type: ResourceType,
    verb: &Verb,
    subresource: Option<Subresource>,
    copy: bool,
) -> OssResult<Operation> {
    use Operation::*;
    use ResourceType::{Bucket, Object, Service};
    use Subresource::{Acl, Location, Logging};

    let op = match (resource_type, verb, subresource) {
        (Service, Verb::Get, _) => ListBuckets,

        (Bucket, Verb::Get, None) => GetBucket,
        (Bucket, Verb::Head, None) => HeadBucket,
        (Bucket, Verb::Put, None) => PutBucket,
        (Bucket, Verb::Delete, None) => DeleteBucket,
        (Bucket, Verb::Get, Some(Acl)) => GetBucketAcl,
        (Bucket, Verb::Put, Some(Acl)) => PutBucketAcl,
        (Bucket, Verb::Get, Some(Location)) => GetBucketLocation,
        (Bucket, Verb::Get, Some(Logging)) => GetBucketLogging,
        (Bucket, Verb::Put, Some(Logging)) => return Err(ErrorCode::NotImplemented.into()),

        (Object, _, Some(Logging)) => return Err(ErrorCode::NoLoggingStatusForKey.into()),
        (Object, Verb::Get, None) => GetObject,
        (Object, Verb::Head, None) => HeadObject,
        (Object, Verb::Put, None) if copy => CopyObject,
        (Object, Verb::Put, None) => PutObject,
        (Object, Verb::Delete, None) => DeleteObject,
        (Object, Verb::Post, None) => return Err(ErrorCode::NotImplemented.into()),
        (Object, Verb::Get, Some(Acl)) => GetObjectAcl,
        (Object, Verb::Put, Some(Acl)) => PutObjectAcl,

        _ => return Err(OssError::new(ErrorCode::MethodNotAllowed)),
    };
    Ok(op)
}

/// [`select`] for a parsed request.
pub fn route(req: &OssRequest, resource: &ResourceReference) -> OssResult<Operation> {
    select(
        resource.resource_type(),
        &req.verb(),
        resource.subresource,
        req.header(COPY_SOURCE_HEADER).is_some(),
    )
}
