//! `?acl` on buckets and objects, plus the ACL checks other handlers share

use tracing::{debug, warn};

use crate::acl::{self, Acl, AclTarget, CannedAcl, Permission};
use crate::backend::BackendResponse;
use crate::error_map::BackendOp;
use crate::gateway::RequestContext;
use crate::metadata::SWIFT_META_PREFIX;
use crate::oss_error::{ErrorCode, OssError, OssResult};
use crate::oss_xml;
use crate::response::OssResponse;

/// Canned ACL request header.
pub const ACL_HEADER: &str = "x-oss-acl";

/// HEAD of the request's container.
pub(crate) async fn head_container(ctx: &RequestContext<'_>) -> OssResult<BackendResponse> {
    let req = ctx.session.container_request("HEAD", ctx.bucket());
    ctx.call(BackendOp::HeadContainer, req).await
}

/// HEAD of the request's object.
pub(crate) async fn head_object(ctx: &RequestContext<'_>) -> OssResult<BackendResponse> {
    let req = ctx.session.object_request("HEAD", ctx.bucket(), ctx.key());
    ctx.call(BackendOp::HeadObject, req).await
}

/// Checks `permission` against the ACL stored on a HEAD response.
///
/// Resources without a stored ACL were not created through the gateway; the
/// backend's own authorization applies to them.
pub(crate) fn authorize(
    ctx: &RequestContext<'_>,
    resp: &BackendResponse,
    permission: Permission,
) -> OssResult<Option<Acl>> {
    let stored = acl::decode(&resp.headers)?;
    if let Some(acl) = &stored {
        acl.authorize(&ctx.requester, permission)?;
    }
    Ok(stored)
}

/// Owner-only variant of [`authorize`].
pub(crate) fn authorize_owner(ctx: &RequestContext<'_>, resp: &BackendResponse) -> OssResult<()> {
    if let Some(acl) = acl::decode(&resp.headers)? {
        acl.authorize_owner(&ctx.requester)?;
    }
    Ok(())
}

/// Backend headers recording the ACL for a resource this request creates.
///
/// Empty when the gateway does not manage ACLs.
pub(crate) fn creation_headers(
    ctx: &RequestContext<'_>,
    target: AclTarget,
) -> OssResult<Vec<(String, String)>> {
    let acl = Acl::from_request_header(ctx.owner(), ctx.req.header(ACL_HEADER))?;
    if ctx.acl_enabled() {
        acl::encode(target, &acl)
    } else {
        Ok(Vec::new())
    }
}

/// GET `?acl`: the stored policy, or an owner-only one when none is stored.
pub async fn get_acl(ctx: &RequestContext<'_>, target: AclTarget) -> OssResult<OssResponse> {
    let resp = match target {
        AclTarget::Bucket => head_container(ctx).await?,
        AclTarget::Object => head_object(ctx).await?,
    };
    let stored = if ctx.acl_enabled() {
        authorize(ctx, &resp, Permission::ReadAcp)?
    } else {
        acl::decode(&resp.headers)?
    };
    let acl = stored.unwrap_or_else(|| Acl::private(ctx.owner()));
    Ok(OssResponse::ok().with_xml_body(oss_xml::acl_xml(&acl)))
}

enum Requested {
    Canned(CannedAcl),
    Policy(Acl),
}

fn requested_acl(ctx: &RequestContext<'_>) -> OssResult<Requested> {
    let has_body = !ctx.req.body.iter().all(|b| b.is_ascii_whitespace());
    match ctx.req.header(ACL_HEADER) {
        Some(_) if has_body => Err(OssError::new(ErrorCode::InvalidRequest)
            .with_message("Specifying both a canned ACL and an AccessControlPolicy is not allowed")),
        Some(value) => Ok(Requested::Canned(CannedAcl::parse(value)?)),
        None => Ok(Requested::Policy(oss_xml::parse_acl_xml(&ctx.req.body)?)),
    }
}

/// PUT `?acl`: replaces the stored ACL, keeping the current owner.
pub async fn put_acl(ctx: &RequestContext<'_>, target: AclTarget) -> OssResult<OssResponse> {
    let requested = requested_acl(ctx)?;

    let resp = match target {
        AclTarget::Bucket => head_container(ctx).await?,
        AclTarget::Object => head_object(ctx).await?,
    };
    let stored = if ctx.acl_enabled() {
        authorize(ctx, &resp, Permission::WriteAcp)?
    } else {
        acl::decode(&resp.headers)?
    };
    let owner = stored.map(|a| a.owner).unwrap_or_else(|| ctx.owner());

    let new_acl = match requested {
        Requested::Canned(canned) => Acl::canned(owner, canned),
        Requested::Policy(mut policy) => {
            if policy.owner.id != owner.id {
                warn!(requester = %ctx.requester, "acl owner change refused");
                return Err(OssError::new(ErrorCode::AccessDenied));
            }
            policy.owner = owner;
            policy
        }
    };
    let headers = acl::encode(target, &new_acl)?;

    match target {
        AclTarget::Bucket => {
            let req = ctx
                .session
                .container_request("POST", ctx.bucket())
                .with_headers(headers);
            ctx.call(BackendOp::PostContainer, req).await?;
        }
        AclTarget::Object => {
            // object POST replaces user metadata, so carry it over
            let kept = resp
                .headers
                .iter()
                .filter(|(k, _)| k.starts_with(SWIFT_META_PREFIX) || k.as_str() == "content-type")
                .map(|(k, v)| (k.clone(), v.clone()));
            let req = ctx
                .session
                .object_request("POST", ctx.bucket(), ctx.key())
                .with_headers(kept)
                .with_headers(headers);
            ctx.call(BackendOp::PostObject, req).await?;
        }
    }
    debug!(resource = %ctx.resource.path(), "acl updated");
    Ok(OssResponse::ok())
}

#[cfg(test)]
mod tests {
    use crate::acl::{self, Acl, AclTarget, CannedAcl, Owner, CONTAINER_ACL_HEADER, OBJECT_ACL_HEADER};
    use crate::backend::BackendResponse;
    use crate::config::GatewayConfig;
    use crate::testing::{self, body_str, gateway, gateway_with, signed, signed_as, REQUESTER};

    fn acl_config() -> GatewayConfig {
        GatewayConfig {
            oss_acl: true,
            ..testing::config()
        }
    }

    fn with_acl(resp: BackendResponse, target: AclTarget, acl: &Acl) -> BackendResponse {
        acl::encode(target, acl)
            .unwrap()
            .into_iter()
            .fold(resp, |r, (k, v)| r.with_header(&k, &v))
    }

    #[tokio::test]
    async fn test_get_bucket_acl_default_private() {
        let (gw, swift) = gateway();
        swift.on("HEAD", "/bucket", BackendResponse::new(204));
        let req = signed("GET", "/bucket").with_query("acl", "");
        let resp = gw.handle(req).await;
        assert_eq!(resp.status, 200);
        let body = body_str(&resp.body);
        assert!(body.contains("<AccessControlPolicy"));
        assert!(body.contains(&format!("<ID>{}</ID>", REQUESTER)));
        assert!(body.contains("<Permission>FULL_CONTROL</Permission>"));
    }

    #[tokio::test]
    async fn test_get_object_acl_stored() {
        let (gw, swift) = gateway();
        let stored = Acl::canned(Owner::new("owner:x"), CannedAcl::PublicRead);
        swift.on(
            "HEAD",
            "/bucket/obj",
            with_acl(BackendResponse::new(200), AclTarget::Object, &stored),
        );
        let resp = gw.handle(signed("GET", "/bucket/obj").with_query("acl", "")).await;
        assert_eq!(resp.status, 200);
        let body = body_str(&resp.body);
        assert!(body.contains("<ID>owner:x</ID>"));
        assert!(body.contains("<URI>http://acs.amazonaws.com/groups/global/AllUsers</URI>"));
        assert!(body.contains("<Permission>READ</Permission>"));
    }

    #[tokio::test]
    async fn test_get_acl_denied_without_read_acp() {
        let (gw, swift) = gateway_with(acl_config());
        let stored = Acl::private(Owner::new("someone:else"));
        swift.on(
            "HEAD",
            "/bucket",
            with_acl(BackendResponse::new(204), AclTarget::Bucket, &stored),
        );
        let resp = gw.handle(signed("GET", "/bucket").with_query("acl", "")).await;
        assert_eq!(resp.status, 403);
        assert!(body_str(&resp.body).contains("<Code>AccessDenied</Code>"));
    }

    #[tokio::test]
    async fn test_owner_reads_private_acl() {
        let (gw, swift) = gateway_with(acl_config());
        let stored = Acl::private(Owner::new("owner:x"));
        swift.on(
            "HEAD",
            "/bucket",
            with_acl(BackendResponse::new(204), AclTarget::Bucket, &stored),
        );
        let req = signed_as("owner:x", "GET", "/bucket").with_query("acl", "");
        let resp = gw.handle(req).await;
        assert_eq!(resp.status, 200);
        assert!(body_str(&resp.body).contains("<ID>owner:x</ID>"));
    }

    #[tokio::test]
    async fn test_put_bucket_acl_canned() {
        let (gw, swift) = gateway();
        swift.on("HEAD", "/bucket", BackendResponse::new(204));
        swift.on("POST", "/bucket", BackendResponse::new(204));
        let req = signed("PUT", "/bucket")
            .with_query("acl", "")
            .with_header("x-oss-acl", "public-read");
        let resp = gw.handle(req).await;
        assert_eq!(resp.status, 200);

        assert_eq!(
            swift.summary(),
            vec![
                ("HEAD".to_string(), "/bucket".to_string()),
                ("POST".to_string(), "/bucket".to_string())
            ]
        );
        let post = &swift.calls()[1];
        let stored = post.header(CONTAINER_ACL_HEADER).unwrap();
        let mut headers = std::collections::HashMap::new();
        headers.insert(CONTAINER_ACL_HEADER.to_string(), stored.to_string());
        let acl = acl::decode(&headers).unwrap().unwrap();
        assert_eq!(acl, Acl::canned(Owner::new(REQUESTER), CannedAcl::PublicRead));
    }

    #[tokio::test]
    async fn test_put_acl_invalid_canned_before_backend() {
        let (gw, swift) = gateway();
        let req = signed("PUT", "/bucket")
            .with_query("acl", "")
            .with_header("x-oss-acl", "everyone-gets-in");
        let resp = gw.handle(req).await;
        assert_eq!(resp.status, 400);
        assert!(body_str(&resp.body).contains("<Code>InvalidArgument</Code>"));
        assert!(swift.calls().is_empty());
    }

    #[tokio::test]
    async fn test_put_acl_malformed_body() {
        let (gw, swift) = gateway();
        let req = signed("PUT", "/bucket/obj")
            .with_query("acl", "")
            .with_body("<AccessControlPolicy><Owner>");
        let resp = gw.handle(req).await;
        assert_eq!(resp.status, 400);
        assert!(body_str(&resp.body).contains("<Code>MalformedACLError</Code>"));
        assert!(swift.calls().is_empty());
    }

    #[tokio::test]
    async fn test_put_object_acl_keeps_user_metadata() {
        let (gw, swift) = gateway();
        swift.on(
            "HEAD",
            "/bucket/obj",
            BackendResponse::new(200)
                .with_header("X-Object-Meta-Color", "blue")
                .with_header("Content-Type", "text/plain"),
        );
        swift.on("POST", "/bucket/obj", BackendResponse::new(202));
        let req = signed("PUT", "/bucket/obj")
            .with_query("acl", "")
            .with_header("x-oss-acl", "private");
        let resp = gw.handle(req).await;
        assert_eq!(resp.status, 200);

        let post = &swift.calls()[1];
        assert_eq!(post.header("x-object-meta-color"), Some("blue"));
        assert_eq!(post.header("content-type"), Some("text/plain"));
        assert!(post.header(OBJECT_ACL_HEADER).is_some());
    }

    #[tokio::test]
    async fn test_put_object_acl_missing_object() {
        let (gw, swift) = gateway();
        swift.on("HEAD", "/bucket/obj", BackendResponse::new(404));
        let req = signed("PUT", "/bucket/obj")
            .with_query("acl", "")
            .with_header("x-oss-acl", "private");
        let resp = gw.handle(req).await;
        assert_eq!(resp.status, 404);
        assert!(body_str(&resp.body).contains("<Code>NoSuchKey</Code>"));
        assert_eq!(swift.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_put_acl_owner_change_refused() {
        let (gw, swift) = gateway();
        swift.on("HEAD", "/bucket", BackendResponse::new(204));
        let body = r#"<AccessControlPolicy>
            <Owner><ID>intruder:x</ID></Owner>
            <AccessControlList>
              <Grant><Grantee><ID>intruder:x</ID></Grantee><Permission>FULL_CONTROL</Permission></Grant>
            </AccessControlList>
          </AccessControlPolicy>"#;
        let req = signed("PUT", "/bucket").with_query("acl", "").with_body(body);
        let resp = gw.handle(req).await;
        assert_eq!(resp.status, 403);
        assert_eq!(swift.calls().len(), 1);
    }
}
