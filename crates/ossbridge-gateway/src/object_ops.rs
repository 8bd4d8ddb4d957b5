//! Object operations: get, head, put, server-side copy and delete

use tracing::{debug, info};

use crate::acl::{AclTarget, Permission};
use crate::acl_ops::{authorize, creation_headers, head_container, head_object};
use crate::backend::Session;
use crate::error_map::BackendOp;
use crate::gateway::RequestContext;
use crate::listing::{iso8601_from_http_date, iso8601_now};
use crate::metadata::{self, quote_etag};
use crate::oss_error::{ErrorCode, OssError, OssResult};
use crate::oss_xml;
use crate::range::{self, RangeSpec};
use crate::response::OssResponse;
use crate::router::COPY_SOURCE_HEADER;

/// Conditional request headers forwarded on object GET/HEAD.
const CONDITIONAL_HEADERS: [(&str, &str); 4] = [
    ("if-match", "If-Match"),
    ("if-none-match", "If-None-Match"),
    ("if-modified-since", "If-Modified-Since"),
    ("if-unmodified-since", "If-Unmodified-Since"),
];

/// Copy-source conditions and the header each becomes on the source HEAD.
const COPY_SOURCE_CONDITIONS: [(&str, &str); 4] = [
    ("x-oss-copy-source-if-match", "If-Match"),
    ("x-oss-copy-source-if-none-match", "If-None-Match"),
    ("x-oss-copy-source-if-modified-since", "If-Modified-Since"),
    ("x-oss-copy-source-if-unmodified-since", "If-Unmodified-Since"),
];

const SELF_COPY_MESSAGE: &str = "This copy request is illegal because it is trying to copy an \
object to itself without changing the object's metadata, storage class, website redirect \
location or encryption attributes.";

/// GET or HEAD object, with range, conditional and `response-*` handling.
pub async fn get_object(ctx: &RequestContext<'_>, head: bool) -> OssResult<OssResponse> {
    let range = if head {
        None
    } else {
        ctx.req.header("range").and_then(RangeSpec::parse)
    };
    let (method, op) = if head {
        ("HEAD", BackendOp::HeadObject)
    } else {
        ("GET", BackendOp::GetObject)
    };

    // The ACL is read from a plain HEAD before any data or precondition
    // outcome reaches the requester.
    let acl_head = if ctx.acl_enabled() {
        let head_resp = head_object(ctx).await?;
        authorize(ctx, &head_resp, Permission::Read)?;
        Some(head_resp)
    } else {
        None
    };
    let conditional = CONDITIONAL_HEADERS
        .iter()
        .any(|(name, _)| ctx.req.header(name).is_some());

    let resp = match acl_head {
        Some(head_resp) if head && !conditional => head_resp,
        _ => {
            let mut req = ctx.session.object_request(method, ctx.bucket(), ctx.key());
            for (name, canonical) in CONDITIONAL_HEADERS {
                if let Some(value) = ctx.req.header(name) {
                    req = req.with_header(canonical, value);
                }
            }
            if let Some(spec) = &range {
                req = req.with_header("Range", &spec.to_header());
            }
            ctx.call(op, req).await?
        }
    };

    let mut out = OssResponse::new(resp.status).with_headers(metadata::to_external(&resp.headers));
    if resp.status == 304 {
        out.remove_header("Content-Length");
        return Ok(out);
    }

    if !head {
        let body = if resp.status == 206 {
            if let Some(content_range) = resp.header("content-range") {
                out.set_header("Content-Range", content_range);
            }
            resp.body
        } else {
            let ranged = range::slice(range, resp.body)?;
            out.status = ranged.status;
            if let Some(content_range) = &ranged.content_range {
                out.set_header("Content-Range", content_range);
            }
            ranged.body
        };
        out.set_header("Content-Length", &body.len().to_string());
        out = out.with_body(body);
    }
    metadata::apply_response_overrides(&mut out, &ctx.req.query);
    Ok(out)
}

/// PUT object.
pub async fn put_object(ctx: &RequestContext<'_>) -> OssResult<OssResponse> {
    let mut headers = metadata::to_backend(&ctx.req.headers)?;
    headers.extend(creation_headers(ctx, AclTarget::Object)?);

    if ctx.acl_enabled() {
        let head = head_container(ctx).await?;
        authorize(ctx, &head, Permission::Write)?;
    }

    let req = ctx
        .session
        .object_request("PUT", ctx.bucket(), ctx.key())
        .with_headers(headers)
        .with_body(ctx.req.body.clone());
    let resp = ctx.call(BackendOp::PutObject, req).await?;
    debug!(resource = %ctx.resource.path(), bytes = ctx.req.body.len(), "object stored");

    let mut out = OssResponse::ok();
    if let Some(etag) = resp.header("etag") {
        out.set_header("ETag", &quote_etag(etag));
    }
    Ok(out)
}

/// Parsed `x-oss-copy-source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySource {
    /// Source bucket
    pub bucket: String,
    /// Source key
    pub key: String,
}

impl CopySource {
    /// Parses `/bucket/key`; the leading slash is optional and a
    /// `?versionId=` suffix is ignored.
    pub fn parse(raw: &str) -> OssResult<Self> {
        let invalid = || {
            OssError::invalid_argument(
                "Copy Source must mention the source bucket and key: sourcebucket/sourcekey",
            )
        };
        let raw = raw.split('?').next().unwrap_or("");
        let decoded = urlencoding::decode(raw).map_err(|_| invalid())?;
        let trimmed = decoded.strip_prefix('/').unwrap_or(&decoded);
        let (bucket, key) = trimmed.split_once('/').ok_or_else(invalid)?;
        if bucket.is_empty() || key.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// `/bucket/key`
    pub fn path(&self) -> String {
        format!("/{}/{}", self.bucket, self.key)
    }
}

/// `x-oss-metadata-directive`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataDirective {
    /// Keep the source metadata
    Copy,
    /// Use the request's metadata
    Replace,
}

impl MetadataDirective {
    /// Reads the directive; absent means `COPY`.
    pub fn parse(value: Option<&str>) -> OssResult<Self> {
        match value {
            None | Some("COPY") => Ok(MetadataDirective::Copy),
            Some("REPLACE") => Ok(MetadataDirective::Replace),
            Some(_) => Err(OssError::invalid_argument(
                "Unknown metadata directive.",
            )),
        }
    }
}

/// PUT object with `x-oss-copy-source`: server-side copy.
pub async fn copy_object(ctx: &RequestContext<'_>) -> OssResult<OssResponse> {
    let source = CopySource::parse(ctx.req.header(COPY_SOURCE_HEADER).unwrap_or(""))?;
    if ctx.req.header("x-oss-copy-source-range").is_some() {
        return Err(OssError::invalid_argument(
            "Range copies are not supported",
        ));
    }
    let directive = MetadataDirective::parse(ctx.req.header("x-oss-metadata-directive"))?;
    let mut headers = match directive {
        MetadataDirective::Replace => metadata::to_backend(&ctx.req.headers)?,
        MetadataDirective::Copy => Vec::new(),
    };
    headers.extend(creation_headers(ctx, AclTarget::Object)?);

    let mut probe = ctx
        .session
        .object_request("HEAD", &source.bucket, &source.key);
    for (name, canonical) in COPY_SOURCE_CONDITIONS {
        if let Some(value) = ctx.req.header(name) {
            probe = probe.with_header(canonical, value);
        }
    }
    let src = ctx
        .call(BackendOp::HeadCopySource, probe)
        .await
        .map_err(|e| e.with_resource(source.path()).with_key(source.key.clone()))?;
    if ctx.acl_enabled() {
        authorize(ctx, &src, Permission::Read)?;
    }

    if source.bucket == ctx.bucket()
        && source.key == ctx.key()
        && directive == MetadataDirective::Copy
    {
        return Err(OssError::new(ErrorCode::InvalidRequest).with_message(SELF_COPY_MESSAGE));
    }

    if ctx.acl_enabled() {
        let dest = head_container(ctx).await?;
        authorize(ctx, &dest, Permission::Write)?;
    }

    let mut req = ctx
        .session
        .object_request("PUT", ctx.bucket(), ctx.key())
        .with_header("X-Copy-From", &Session::copy_from(&source.bucket, &source.key))
        .with_header("Content-Length", "0")
        .with_headers(headers);
    if directive == MetadataDirective::Replace {
        req = req.with_header("X-Fresh-Metadata", "true");
    }
    let resp = ctx.call(BackendOp::CopyObject, req).await?;
    info!(
        source = %source.path(),
        dest = %ctx.resource.path(),
        "object copied"
    );

    let last_modified = resp
        .header("last-modified")
        .and_then(iso8601_from_http_date)
        .unwrap_or_else(iso8601_now);
    let etag = resp.header("etag").or_else(|| src.header("etag")).unwrap_or("");
    Ok(OssResponse::ok().with_xml_body(oss_xml::copy_object_xml(&last_modified, etag)))
}

/// DELETE object; segmented objects take their segments with them.
pub async fn delete_object(ctx: &RequestContext<'_>) -> OssResult<OssResponse> {
    let mut container_seen = false;
    if ctx.acl_enabled() {
        let head = head_container(ctx).await?;
        authorize(ctx, &head, Permission::Write)?;
        container_seen = true;
    }

    let mut segmented = false;
    if ctx.config.allow_multipart_uploads {
        let probe = ctx.session.object_request("HEAD", ctx.bucket(), ctx.key());
        match ctx.call(BackendOp::HeadObject, probe).await {
            Ok(resp) => {
                segmented = resp
                    .header("x-static-large-object")
                    .map(|v| v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false);
            }
            Err(err) if err.code == ErrorCode::NoSuchKey => {
                return Err(missing(ctx, container_seen).await)
            }
            Err(err) => return Err(err),
        }
    }

    let mut req = ctx.session.object_request("DELETE", ctx.bucket(), ctx.key());
    if segmented {
        req = req.with_query("multipart-manifest", "delete");
    }
    match ctx.call(BackendOp::DeleteObject, req).await {
        Ok(_) => {
            debug!(resource = %ctx.resource.path(), segmented = segmented, "object deleted");
            Ok(OssResponse::no_content())
        }
        Err(err) if err.code == ErrorCode::NoSuchKey => Err(missing(ctx, container_seen).await),
        Err(err) => Err(err),
    }
}

/// Tells a missing bucket from a missing key after an object 404.
async fn missing(ctx: &RequestContext<'_>, container_seen: bool) -> OssError {
    if container_seen {
        return OssError::new(ErrorCode::NoSuchKey);
    }
    match head_container(ctx).await {
        Ok(_) => OssError::new(ErrorCode::NoSuchKey),
        Err(err) => err,
    }
}
