//! Bucket operations: list, create, probe, delete, location and logging

use tracing::{debug, info};

use crate::acl::{self, AclTarget, Permission};
use crate::acl_ops::{authorize, authorize_owner, creation_headers, head_container};
use crate::error_map::BackendOp;
use crate::gateway::RequestContext;
use crate::listing::{self, ListParams};
use crate::oss_error::{ErrorCode, OssError, OssResult};
use crate::oss_xml;
use crate::response::OssResponse;

/// GET bucket: object listing with prefix, marker, delimiter and max-keys.
pub async fn get_bucket(ctx: &RequestContext<'_>) -> OssResult<OssResponse> {
    let params = ListParams::from_request(ctx.req, ctx.config.max_bucket_listing)?;

    let mut owner = ctx.owner();
    if ctx.acl_enabled() {
        let head = head_container(ctx).await?;
        if let Some(stored) = authorize(ctx, &head, Permission::Read)? {
            owner = stored.owner;
        }
    }

    let mut req = ctx.session.container_request("GET", ctx.bucket());
    for (k, v) in params.backend_query() {
        req = req.with_query(&k, &v);
    }
    let resp = ctx.call(BackendOp::GetContainer, req).await?;

    let entries = if resp.status == 204 || resp.body.is_empty() {
        Vec::new()
    } else {
        listing::parse_container_listing(&resp.body)?
    };
    let result = listing::build_listing(
        ctx.bucket(),
        entries,
        &params,
        owner,
        &ctx.config.storage_class,
    );
    debug!(
        bucket = %ctx.bucket(),
        keys = result.contents.len(),
        prefixes = result.common_prefixes.len(),
        truncated = result.is_truncated,
        "listed bucket"
    );
    Ok(OssResponse::ok().with_xml_body(oss_xml::list_objects_xml(&result)))
}

/// HEAD bucket: existence (and, with ACLs, read access).
pub async fn head_bucket(ctx: &RequestContext<'_>) -> OssResult<OssResponse> {
    let head = head_container(ctx).await?;
    if ctx.acl_enabled() {
        authorize(ctx, &head, Permission::Read)?;
    }
    Ok(OssResponse::ok())
}

/// PUT bucket: creates the container, recording its ACL when enabled.
pub async fn put_bucket(ctx: &RequestContext<'_>) -> OssResult<OssResponse> {
    if let Some(location) = oss_xml::parse_location_constraint(&ctx.req.body)? {
        if location != ctx.config.location {
            return Err(OssError::new(ErrorCode::InvalidLocationConstraint));
        }
    }
    let headers = creation_headers(ctx, AclTarget::Bucket)?;

    let req = ctx
        .session
        .container_request("PUT", ctx.bucket())
        .with_headers(headers);
    ctx.call(BackendOp::PutContainer, req).await?;
    info!(bucket = %ctx.bucket(), requester = %ctx.requester, "bucket created");

    Ok(OssResponse::ok().with_header("Location", &format!("/{}", ctx.bucket())))
}

/// DELETE bucket: owner only when ACLs are enabled; must be empty.
pub async fn delete_bucket(ctx: &RequestContext<'_>) -> OssResult<OssResponse> {
    if ctx.acl_enabled() {
        let head = head_container(ctx).await?;
        authorize_owner(ctx, &head)?;
    }
    let req = ctx.session.container_request("DELETE", ctx.bucket());
    ctx.call(BackendOp::DeleteContainer, req).await?;
    info!(bucket = %ctx.bucket(), requester = %ctx.requester, "bucket deleted");
    Ok(OssResponse::no_content())
}

/// GET bucket `?location`: the configured region.
pub async fn get_location(ctx: &RequestContext<'_>) -> OssResult<OssResponse> {
    owner_probe(ctx).await?;
    Ok(OssResponse::ok().with_xml_body(oss_xml::location_xml(&ctx.config.location)))
}

/// GET bucket `?logging`: logging is never enabled.
pub async fn get_logging(ctx: &RequestContext<'_>) -> OssResult<OssResponse> {
    owner_probe(ctx).await?;
    Ok(OssResponse::ok().with_xml_body(oss_xml::logging_status_xml()))
}

async fn owner_probe(ctx: &RequestContext<'_>) -> OssResult<()> {
    let head = head_container(ctx).await?;
    if ctx.acl_enabled() {
        authorize_owner(ctx, &head)?;
    } else {
        // still reject a stored ACL that cannot be read
        acl::decode(&head.headers)?;
    }
    Ok(())
}
