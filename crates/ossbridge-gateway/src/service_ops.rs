//! GET service: the requester's buckets

use tracing::debug;

use crate::error_map::BackendOp;
use crate::gateway::RequestContext;
use crate::listing;
use crate::oss_error::OssResult;
use crate::oss_xml;
use crate::response::OssResponse;

/// Lists the containers of the requester's account as buckets.
pub async fn list_buckets(ctx: &RequestContext<'_>) -> OssResult<OssResponse> {
    let req = ctx
        .session
        .account_request("GET")
        .with_query("format", "json");
    let resp = ctx.call(BackendOp::ListContainers, req).await?;

    let buckets = if resp.status == 204 || resp.body.is_empty() {
        Vec::new()
    } else {
        listing::parse_account_listing(&resp.body)?
    };
    debug!(count = buckets.len(), "listed buckets");

    Ok(OssResponse::ok().with_xml_body(oss_xml::list_buckets_xml(&ctx.owner(), &buckets)))
}
