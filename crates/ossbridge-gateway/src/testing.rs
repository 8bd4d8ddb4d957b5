//! In-memory Swift and identity service doubles for unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::backend::{Backend, BackendRequest, BackendResponse};
use crate::config::GatewayConfig;
use crate::credentials::{encode_token, sign, IdentityReply, IdentityService};
use crate::error::{GatewayError, Result};
use crate::gateway::Gateway;
use crate::request::OssRequest;

pub const SECRET: &str = "verysecret";
pub const ACCOUNT: &str = "AUTH_tenant1";
pub const REQUESTER: &str = "test:tester";

/// Scripted Swift proxy that records every call.
///
/// Responses are queued per `(method, path)`; the last queued response
/// repeats.
#[derive(Default)]
pub struct FakeSwift {
    responses: Mutex<HashMap<(String, String), VecDeque<BackendResponse>>>,
    calls: Mutex<Vec<BackendRequest>>,
}

impl FakeSwift {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response; `path` is relative to the test account, e.g. `/bucket/obj`.
    pub fn on(&self, method: &str, path: &str, resp: BackendResponse) -> &Self {
        let full = format!("/v1/{}{}", ACCOUNT, path);
        self.responses
            .lock()
            .unwrap()
            .entry((method.to_string(), full))
            .or_default()
            .push_back(resp);
        self
    }

    pub fn calls(&self) -> Vec<BackendRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// `(method, path)` of every call, with the account prefix stripped.
    pub fn summary(&self) -> Vec<(String, String)> {
        let prefix = format!("/v1/{}", ACCOUNT);
        self.calls()
            .into_iter()
            .map(|c| {
                let path = c.path.strip_prefix(&prefix).unwrap_or(&c.path).to_string();
                (c.method, path)
            })
            .collect()
    }
}

#[async_trait]
impl Backend for FakeSwift {
    async fn send(&self, req: BackendRequest) -> Result<BackendResponse> {
        self.calls.lock().unwrap().push(req.clone());
        let mut responses = self.responses.lock().unwrap();
        let queue = responses
            .get_mut(&(req.method.clone(), req.path.clone()))
            .ok_or_else(|| GatewayError::BackendError {
                reason: format!("no scripted response for {} {}", req.method, req.path),
            })?;
        let resp = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        resp.ok_or_else(|| GatewayError::BackendError {
            reason: "empty script".to_string(),
        })
    }
}

/// Identity service returning a fixed reply.
pub struct FakeIdentity {
    reply: Option<IdentityReply>,
    calls: Mutex<Vec<Value>>,
}

impl FakeIdentity {
    pub fn ok(token: &str, tenant: &str) -> Self {
        let body = json!({"access": {"token": {"id": token, "tenant": {"id": tenant, "name": "tester"}}}});
        Self::status(200, &body.to_string())
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            reply: Some(IdentityReply {
                status,
                body: body.as_bytes().to_vec(),
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reply: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityService for FakeIdentity {
    async fn request_token(&self, payload: &Value) -> Result<IdentityReply> {
        self.calls.lock().unwrap().push(payload.clone());
        self.reply.clone().ok_or_else(|| GatewayError::IdentityError {
            reason: "connection refused".to_string(),
        })
    }
}

pub fn config() -> GatewayConfig {
    GatewayConfig {
        shared_secret: SECRET.to_string(),
        ..GatewayConfig::default()
    }
}

/// Gateway over a fresh fake backend; returns both.
pub fn gateway_with(config: GatewayConfig) -> (Gateway, Arc<FakeSwift>) {
    let swift = Arc::new(FakeSwift::new());
    let identity = Arc::new(FakeIdentity::ok("tok-1", "tenant1"));
    let gateway = Gateway::new(Arc::new(config), swift.clone(), identity);
    (gateway, swift)
}

pub fn gateway() -> (Gateway, Arc<FakeSwift>) {
    gateway_with(config())
}

/// Request signed by [`REQUESTER`] with a valid token.
pub fn signed(method: &str, path: &str) -> OssRequest {
    signed_as(REQUESTER, method, path)
}

pub fn signed_as(access: &str, method: &str, path: &str) -> OssRequest {
    let message = format!("{}\n\n\n\n{}", method, path);
    let signature = sign(SECRET, message.as_bytes()).unwrap();
    OssRequest::new(method, path)
        .with_header("Authorization", &format!("OSS {}:{}", access, signature))
        .with_header("X-Auth-Token", &encode_token(&message))
}

pub fn body_str(body: &[u8]) -> String {
    String::from_utf8(body.to_vec()).unwrap()
}
