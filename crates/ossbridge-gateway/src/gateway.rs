//! Request pipeline: parse, validate, authenticate, route, execute
//!
//! Every inbound request runs through the same stages and stops at the first
//! error. Handlers receive a [`RequestContext`] holding the authenticated
//! backend session; every backend call they make goes through
//! [`RequestContext::call`], which applies the status translation table for
//! the operation.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error};
use uuid::Uuid;

use crate::access_log::AccessLogEntry;
use crate::acl::{AclTarget, Owner};
use crate::backend::{Backend, BackendRequest, BackendResponse, Session};
use crate::config::GatewayConfig;
use crate::credentials::{encode_token, string_to_sign, CredentialResolver, IdentityService};
use crate::error_map::{self, BackendOp};
use crate::oss_error::{ErrorCode, OssError, OssResult};
use crate::request::{validate_bucket_name, OssRequest, ResourceReference, ResourceType, Verb};
use crate::response::OssResponse;
use crate::router::{self, Operation};
use crate::{acl_ops, bucket_ops, object_ops, service_ops};

/// Header carrying the gateway request id.
pub const REQUEST_ID_HEADER: &str = "x-oss-request-id";

/// Authenticated state for one request, handed to operation handlers.
pub struct RequestContext<'a> {
    /// The inbound request
    pub req: &'a OssRequest,
    /// Decoded bucket, key and subresource
    pub resource: ResourceReference,
    /// `access[:tenant]` of the caller
    pub requester: String,
    /// Backend account and token
    pub session: Session,
    /// Gateway configuration
    pub config: &'a GatewayConfig,
    backend: &'a dyn Backend,
}

impl<'a> RequestContext<'a> {
    /// Context for an already-authenticated request.
    pub fn new(
        req: &'a OssRequest,
        resource: ResourceReference,
        requester: &str,
        session: Session,
        config: &'a GatewayConfig,
        backend: &'a dyn Backend,
    ) -> Self {
        Self {
            req,
            resource,
            requester: requester.to_string(),
            session,
            config,
            backend,
        }
    }

    /// Bucket (container) name.
    pub fn bucket(&self) -> &str {
        &self.resource.bucket
    }

    /// Object key, empty for bucket requests.
    pub fn key(&self) -> &str {
        self.resource.key_str()
    }

    /// Owner record for resources this request creates.
    pub fn owner(&self) -> Owner {
        Owner::new(&self.requester)
    }

    /// Whether the gateway enforces ACLs itself.
    pub fn acl_enabled(&self) -> bool {
        self.config.oss_acl
    }

    /// Sends a backend request and translates failure statuses for `op`.
    pub async fn call(&self, op: BackendOp, req: BackendRequest) -> OssResult<BackendResponse> {
        let resp = self.send(req).await?;
        match error_map::backend_error(op, resp.status, &self.resource.path()) {
            Some(err) => {
                debug!(op = ?op, status = resp.status, code = %err.code, "backend call failed");
                Err(err)
            }
            None => Ok(resp),
        }
    }

    /// Sends a backend request without status translation.
    pub async fn send(&self, req: BackendRequest) -> OssResult<BackendResponse> {
        debug!(method = %req.method, path = %req.path, "backend call");
        self.backend.send(req).await.map_err(OssError::from)
    }
}

/// The OSS front end over one Swift backend and one identity service.
pub struct Gateway {
    config: Arc<GatewayConfig>,
    backend: Arc<dyn Backend>,
    resolver: CredentialResolver,
}

impl Gateway {
    /// Creates a gateway; clients are shared by every request.
    pub fn new(
        config: Arc<GatewayConfig>,
        backend: Arc<dyn Backend>,
        identity: Arc<dyn IdentityService>,
    ) -> Self {
        let resolver = CredentialResolver::new(&config, identity);
        Self {
            config,
            backend,
            resolver,
        }
    }

    /// Gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Handles one request end to end. Never fails: errors become OSS error
    /// responses.
    pub async fn handle(&self, req: OssRequest) -> OssResponse {
        let started = Instant::now();
        let request_id = Uuid::new_v4().simple().to_string().to_uppercase();
        let mut trace = Trace::default();

        let result = self.process(&req, &mut trace).await;
        let mut resp = match result {
            Ok(resp) => resp,
            Err(err) => {
                let err = decorate(err, trace.resource.as_ref());
                trace.error_code = Some(err.code);
                OssResponse::from_error(&err, req.verb() == Verb::Head, &request_id)
            }
        };
        resp.set_header(REQUEST_ID_HEADER, &request_id);

        let mut entry = AccessLogEntry::new(
            &request_id,
            &req.method,
            &trace
                .resource
                .as_ref()
                .map(|r| r.path())
                .unwrap_or_else(|| req.path.clone()),
        )
        .with_requester(&trace.requester)
        .with_status(resp.status)
        .with_bytes(resp.body.len() as u64)
        .with_duration_us(started.elapsed().as_micros() as u64);
        if let Some(op) = trace.operation {
            entry = entry.with_operation(op.name());
        }
        if let Some(code) = trace.error_code {
            entry = entry.with_error_code(code.as_str());
        }
        entry.emit();

        resp
    }

    async fn process(&self, req: &OssRequest, trace: &mut Trace) -> OssResult<OssResponse> {
        let resource = req.resource()?;
        trace.resource = Some(resource.clone());

        if resource.resource_type() != ResourceType::Service
            && !validate_bucket_name(&resource.bucket, self.config.dns_compliant_bucket_names)
        {
            return Err(OssError::new(ErrorCode::InvalidBucketName));
        }

        let authorization = req
            .header("authorization")
            .ok_or_else(|| OssError::new(ErrorCode::AccessDenied))?;
        let token = match req
            .header("x-auth-token")
            .or_else(|| req.header("x-storage-token"))
        {
            Some(token) => token.to_string(),
            None => encode_token(&string_to_sign(req, &resource)),
        };
        let identity = self.resolver.authenticate(authorization, &token).await?;
        trace.requester = identity.requester.clone();

        let operation = router::route(req, &resource)?;
        trace.operation = Some(operation);
        debug!(operation = %operation, resource = %resource.path(), "dispatching");

        let session = Session::new(
            &identity.account(&self.config.reseller_prefix),
            &identity.token_id,
        );
        let ctx = RequestContext::new(
            req,
            resource,
            &identity.requester,
            session,
            &self.config,
            self.backend.as_ref(),
        );
        dispatch(operation, &ctx).await
    }
}

async fn dispatch(operation: Operation, ctx: &RequestContext<'_>) -> OssResult<OssResponse> {
    match operation {
        Operation::ListBuckets => service_ops::list_buckets(ctx).await,
        Operation::GetBucket => bucket_ops::get_bucket(ctx).await,
        Operation::HeadBucket => bucket_ops::head_bucket(ctx).await,
        Operation::PutBucket => bucket_ops::put_bucket(ctx).await,
        Operation::DeleteBucket => bucket_ops::delete_bucket(ctx).await,
        Operation::GetBucketLocation => bucket_ops::get_location(ctx).await,
        Operation::GetBucketLogging => bucket_ops::get_logging(ctx).await,
        Operation::GetBucketAcl => acl_ops::get_acl(ctx, AclTarget::Bucket).await,
        Operation::PutBucketAcl => acl_ops::put_acl(ctx, AclTarget::Bucket).await,
        Operation::GetObject => object_ops::get_object(ctx, false).await,
        Operation::HeadObject => object_ops::get_object(ctx, true).await,
        Operation::PutObject => object_ops::put_object(ctx).await,
        Operation::CopyObject => object_ops::copy_object(ctx).await,
        Operation::DeleteObject => object_ops::delete_object(ctx).await,
        Operation::GetObjectAcl => acl_ops::get_acl(ctx, AclTarget::Object).await,
        Operation::PutObjectAcl => acl_ops::put_acl(ctx, AclTarget::Object).await,
    }
}

/// What the pipeline learned before it finished, for the access log.
#[derive(Default)]
struct Trace {
    resource: Option<ResourceReference>,
    requester: String,
    operation: Option<Operation>,
    error_code: Option<ErrorCode>,
}

/// Fills in the resource, bucket and key an error document reports.
fn decorate(mut err: OssError, resource: Option<&ResourceReference>) -> OssError {
    let Some(resource) = resource else {
        return err;
    };
    if err.resource.is_none() {
        err.resource = Some(resource.path());
    }
    match err.code {
        ErrorCode::NoSuchBucket
        | ErrorCode::InvalidBucketName
        | ErrorCode::BucketAlreadyExists
        | ErrorCode::BucketNotEmpty => {
            if err.bucket.is_none() {
                err = err.with_bucket(resource.bucket.as_str());
            }
        }
        ErrorCode::NoSuchKey => {
            if err.key.is_none() {
                err.key = resource.key.clone();
            }
        }
        ErrorCode::InternalError => {
            error!(resource = %resource.path(), "request failed with internal error");
        }
        _ => {}
    }
    err
}
