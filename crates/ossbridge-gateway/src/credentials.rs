//! Request signature verification and identity exchange
//!
//! A request carries `Authorization: OSS <access>[:<tenant>]:<signature>` and
//! a token that is the base64url-encoded string-to-sign. The signature is
//! checked against the shared secret, then the access key is exchanged at the
//! identity service for a backend token and tenant.

use std::sync::Arc;

use async_trait::async_trait;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::oss_error::{ErrorCode, OssError, OssResult};
use crate::request::{OssRequest, ResourceReference, Subresource};

type HmacSha1 = Hmac<Sha1>;

/// base64url with optional padding, as clients differ on trailing `=`.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Parsed `Authorization` header plus the signed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Access key
    pub access: String,
    /// Tenant to act as, from `access:tenant`
    pub tenant: Option<String>,
    /// Client signature (base64)
    pub signature: String,
}

impl Credentials {
    /// Parses the last whitespace-separated token as `access[:tenant]:signature`.
    pub fn parse(authorization: &str) -> OssResult<Self> {
        let invalid = || OssError::new(ErrorCode::InvalidURI);
        let trailing = authorization.split_whitespace().last().ok_or_else(invalid)?;
        let (access, signature) = trailing.rsplit_once(':').ok_or_else(invalid)?;
        let (access, tenant) = match access.split_once(':') {
            Some((access, tenant)) => (access, Some(tenant.to_string())),
            None => (access, None),
        };
        if access.is_empty() || signature.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            access: access.to_string(),
            tenant,
            signature: signature.to_string(),
        })
    }

    /// Id used as ACL owner/grantee: `access` or `access:tenant`.
    pub fn requester_id(&self) -> String {
        match &self.tenant {
            Some(tenant) => format!("{}:{}", self.access, tenant),
            None => self.access.clone(),
        }
    }
}

/// Backend identity obtained from the identity service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Backend token sent as `X-Auth-Token`
    pub token_id: String,
    /// Backend tenant id
    pub tenant_id: String,
    /// Requester id of the authenticated caller
    pub requester: String,
}

impl Identity {
    /// Backend account name: prefix plus tenant id, never prefixed twice.
    pub fn account(&self, reseller_prefix: &str) -> String {
        format!("{}{}", reseller_prefix, self.tenant_id)
    }
}

/// Raw identity-service reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityReply {
    /// HTTP status
    pub status: u16,
    /// Response body
    pub body: Vec<u8>,
}

/// Token endpoint of the identity service.
///
/// `Err` means the service could not be reached; any HTTP answer is `Ok`.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// POSTs `payload` to the token endpoint.
    async fn request_token(&self, payload: &Value) -> Result<IdentityReply>;
}

/// `base64(HMAC-SHA1(secret, message))`.
pub fn sign(secret: &str, message: &[u8]) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).map_err(|e| {
        GatewayError::ConfigError {
            reason: format!("unusable shared secret: {}", e),
        }
    })?;
    mac.update(message);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Decodes a (possibly percent-encoded) base64url token.
pub fn decode_token(token: &str) -> Option<Vec<u8>> {
    let unquoted = urlencoding::decode(token).ok()?;
    URL_SAFE_LENIENT.decode(unquoted.trim().as_bytes()).ok()
}

/// Encodes a string-to-sign as a token.
pub fn encode_token(string_to_sign: &str) -> String {
    base64::engine::general_purpose::URL_SAFE.encode(string_to_sign.as_bytes())
}

/// OSS string-to-sign for requests that arrive without a token header.
pub fn string_to_sign(req: &OssRequest, resource: &ResourceReference) -> String {
    let header = |name: &str| req.header(name).unwrap_or("").trim().to_string();
    let date = if req.header("x-oss-date").is_some() {
        String::new()
    } else {
        header("date")
    };

    let mut oss_headers: Vec<(String, String)> = req
        .headers
        .iter()
        .filter(|(k, _)| k.starts_with("x-oss-"))
        .map(|(k, v)| (k.clone(), v.trim().to_string()))
        .collect();
    oss_headers.sort();

    let mut out = format!(
        "{}\n{}\n{}\n{}\n",
        req.method.to_ascii_uppercase(),
        header("content-md5"),
        header("content-type"),
        date
    );
    for (name, value) in oss_headers {
        out.push_str(&format!("{}:{}\n", name, value));
    }

    out.push('/');
    if !resource.bucket.is_empty() {
        out.push_str(&resource.bucket);
        out.push('/');
        out.push_str(resource.key_str());
    }

    let mut params: Vec<String> = req
        .query
        .iter()
        .filter(|(k, _)| {
            Subresource::ALL.iter().any(|s| s.as_str() == k.as_str()) || k.starts_with("response-")
        })
        .map(|(k, v)| {
            if v.is_empty() {
                k.clone()
            } else {
                format!("{}={}", k, v)
            }
        })
        .collect();
    params.sort();
    if !params.is_empty() {
        out.push('?');
        out.push_str(&params.join("&"));
    }
    out
}

/// Verifies signatures and exchanges credentials for a backend identity.
pub struct CredentialResolver {
    shared_secret: String,
    identity: Arc<dyn IdentityService>,
}

impl CredentialResolver {
    /// Creates a resolver using the configured shared secret.
    pub fn new(config: &GatewayConfig, identity: Arc<dyn IdentityService>) -> Self {
        Self {
            shared_secret: config.shared_secret.clone(),
            identity,
        }
    }

    /// Checks the signature over `token` in constant time.
    pub fn verify(&self, creds: &Credentials, token: &str) -> OssResult<()> {
        let message = decode_token(token).ok_or_else(|| unauthorized(&creds.access))?;
        let expected = sign(&self.shared_secret, &message)?;
        let matches: bool = expected.as_bytes().ct_eq(creds.signature.as_bytes()).into();
        if matches {
            Ok(())
        } else {
            warn!(access = %creds.access, "signature mismatch");
            Err(unauthorized(&creds.access))
        }
    }

    /// Full authentication: parse, verify, exchange.
    pub async fn authenticate(&self, authorization: &str, token: &str) -> OssResult<Identity> {
        let creds = Credentials::parse(authorization)?;
        self.verify(&creds, token)?;
        self.exchange(&creds).await
    }

    async fn exchange(&self, creds: &Credentials) -> OssResult<Identity> {
        let payload = json!({
            "auth": {
                "passwordCredentials": {
                    "username": creds.access,
                    "password": self.shared_secret,
                },
                "tenantName": creds.tenant,
            }
        });
        debug!(access = %creds.access, "requesting backend token");

        let reply = match self.identity.request_token(&payload).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("identity service unreachable: {}", e);
                return Err(access_denied());
            }
        };
        if !(200..300).contains(&reply.status) {
            info!(access = %creds.access, status = reply.status, "identity service refused");
            return Err(access_denied());
        }

        let (token_id, tenant_id) = parse_token_reply(&reply.body).ok_or_else(|| {
            warn!(status = reply.status, "unreadable identity service reply");
            OssError::new(ErrorCode::InvalidURI)
        })?;
        debug!(tenant = %tenant_id, "identity exchange complete");
        Ok(Identity {
            token_id,
            tenant_id,
            requester: creds.requester_id(),
        })
    }
}

fn parse_token_reply(body: &[u8]) -> Option<(String, String)> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let token = value.get("access")?.get("token")?;
    let token_id = scalar(token.get("id")?)?;
    let tenant_id = scalar(token.get("tenant")?.get("id")?)?;
    Some((token_id, tenant_id))
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn unauthorized(realm: &str) -> OssError {
    let realm: String = realm.chars().filter(|c| *c != '"' && !c.is_control()).collect();
    OssError::new(ErrorCode::Unauthorized)
        .with_header("WWW-Authenticate", &format!("Swift realm=\"{}\"", realm))
}

fn access_denied() -> OssError {
    OssError::new(ErrorCode::AccessDenied)
        .with_status(401)
        .with_message("Access denied")
}
