//! HTTP front end: axum in, [`Gateway`] out

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use tracing::{debug, info, warn};

use crate::error::{GatewayError, Result};
use crate::gateway::Gateway;
use crate::request::OssRequest;
use crate::response::OssResponse;

/// Router sending every path and method to the gateway.
///
/// Object bodies are not size-limited here; the backend enforces its own
/// maximum object size.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .fallback(handle)
        .layer(DefaultBodyLimit::disable())
        .with_state(gateway)
}

/// Binds `addr` and serves until ctrl-c.
pub async fn serve(gateway: Arc<Gateway>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("OSS gateway listening on {}", addr);

    axum::serve(listener, router(gateway).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(GatewayError::IoError)?;
    info!("OSS gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn handle(
    State(gateway): State<Arc<Gateway>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let req = to_oss_request(&method, &uri, &headers, body);
    into_http(gateway.handle(req).await)
}

fn to_oss_request(method: &Method, uri: &Uri, headers: &HeaderMap, body: Bytes) -> OssRequest {
    let mut req = OssRequest::new(method.as_str(), uri.path()).with_body(body);
    req.query = parse_query(uri.query().unwrap_or(""));
    for (name, value) in headers {
        req = req.with_header(name.as_str(), &header_text(value));
    }
    req
}

/// Header value as text. UTF-8 is kept as is; other bytes map one to one
/// onto Latin-1 so nothing is lost before metadata encoding.
fn header_text(value: &HeaderValue) -> String {
    match std::str::from_utf8(value.as_bytes()) {
        Ok(text) => text.to_string(),
        Err(_) => {
            debug!("header value is not UTF-8, reading as Latin-1");
            value.as_bytes().iter().map(|&b| char::from(b)).collect()
        }
    }
}

/// Decodes a query string; valueless parameters such as `?acl` map to "".
pub fn parse_query(query: &str) -> HashMap<String, String> {
    let decode = |s: &str| -> String {
        let spaced = s.replace('+', " ");
        urlencoding::decode(&spaced)
            .map(|c| c.into_owned())
            .unwrap_or(spaced)
    };
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode(k), decode(v)),
            None => (decode(pair), String::new()),
        })
        .collect()
}

fn into_http(resp: OssResponse) -> Response {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut out = Response::new(Body::from(resp.body));
    *out.status_mut() = status;
    let headers = out.headers_mut();
    for (name, value) in resp.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "dropping unrepresentable response header"),
        }
    }
    out.into_response()
}
