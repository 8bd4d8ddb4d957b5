//! Header translation between the OSS and Swift namespaces

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::oss_error::{ErrorCode, OssError, OssResult};
use crate::response::OssResponse;

/// External custom-metadata prefix.
pub const OSS_META_PREFIX: &str = "x-oss-meta-";
/// Backend custom-metadata prefix.
pub const SWIFT_META_PREFIX: &str = "x-object-meta-";

/// Standard headers copied from backend responses, with their canonical case.
const RESPONSE_PASSTHROUGH: [(&str, &str); 9] = [
    ("content-type", "Content-Type"),
    ("content-disposition", "Content-Disposition"),
    ("content-language", "Content-Language"),
    ("cache-control", "Cache-Control"),
    ("expires", "Expires"),
    ("content-encoding", "Content-Encoding"),
    ("content-length", "Content-Length"),
    ("last-modified", "Last-Modified"),
    ("x-robots-tag", "X-Robots-Tag"),
];

/// Standard headers copied onto backend writes.
const REQUEST_PASSTHROUGH: [(&str, &str); 6] = [
    ("content-type", "Content-Type"),
    ("content-disposition", "Content-Disposition"),
    ("content-language", "Content-Language"),
    ("cache-control", "Cache-Control"),
    ("expires", "Expires"),
    ("content-encoding", "Content-Encoding"),
];

/// `response-*` query parameters and the header each one overrides.
pub const RESPONSE_OVERRIDES: [(&str, &str); 6] = [
    ("response-content-type", "Content-Type"),
    ("response-content-language", "Content-Language"),
    ("response-expires", "Expires"),
    ("response-cache-control", "Cache-Control"),
    ("response-content-disposition", "Content-Disposition"),
    ("response-content-encoding", "Content-Encoding"),
];

/// Backend response headers (lowercased names) to client headers.
///
/// Only custom metadata, the standard entity headers and the ETag survive;
/// system metadata and everything else backend-specific is dropped.
pub fn to_external(backend: &HashMap<String, String>) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for (name, value) in backend {
        if let Some(suffix) = name.strip_prefix(SWIFT_META_PREFIX) {
            out.push((format!("{}{}", OSS_META_PREFIX, suffix), decode_value(value)));
        } else if name == "etag" {
            out.push(("ETag".to_string(), quote_etag(value)));
        } else if let Some((_, canonical)) = RESPONSE_PASSTHROUGH.iter().find(|(n, _)| n == name) {
            out.push((canonical.to_string(), value.clone()));
        }
    }
    out.sort();
    out
}

/// Client request headers (lowercased names) to backend write headers.
///
/// `Content-MD5` becomes a hex `ETag` so the backend verifies the upload.
pub fn to_backend(external: &HashMap<String, String>) -> OssResult<Vec<(String, String)>> {
    let mut out = Vec::new();
    for (name, value) in external {
        if let Some(suffix) = name.strip_prefix(OSS_META_PREFIX) {
            out.push((format!("{}{}", SWIFT_META_PREFIX, suffix), encode_value(value)));
        } else if name == "content-md5" {
            out.push(("ETag".to_string(), md5_to_etag(value)?));
        } else if let Some((_, canonical)) = REQUEST_PASSTHROUGH.iter().find(|(n, _)| n == name) {
            out.push((canonical.to_string(), value.clone()));
        }
    }
    out.sort();
    Ok(out)
}

/// Wraps an ETag in double quotes unless it already is.
pub fn quote_etag(etag: &str) -> String {
    if etag.len() >= 2 && etag.starts_with('"') && etag.ends_with('"') {
        etag.to_string()
    } else {
        format!("\"{}\"", etag)
    }
}

/// Base64 `Content-MD5` to the hex digest the backend expects as ETag.
pub fn md5_to_etag(content_md5: &str) -> OssResult<String> {
    let digest = STANDARD
        .decode(content_md5.trim())
        .map_err(|_| OssError::new(ErrorCode::InvalidDigest))?;
    if digest.len() != 16 {
        return Err(OssError::new(ErrorCode::InvalidDigest));
    }
    Ok(hex::encode(digest))
}

/// Applies `response-*` query overrides to an object GET/HEAD response.
pub fn apply_response_overrides(resp: &mut OssResponse, query: &HashMap<String, String>) {
    for (param, header) in RESPONSE_OVERRIDES {
        if let Some(value) = query.get(param) {
            resp.set_header(header, value);
        }
    }
}

fn is_printable(value: &str) -> bool {
    value.bytes().all(|b| (0x20..=0x7e).contains(&b))
}

fn looks_encoded(value: &str) -> bool {
    value.starts_with("=?") && value.ends_with("?=")
}

/// Makes a metadata value header-safe.
///
/// Printable ASCII is left alone unless it would itself be mistaken for an
/// encoded word. Everything else becomes a UTF-8 encoded word, Q or B style,
/// whichever is shorter (Q on ties).
pub fn encode_value(value: &str) -> String {
    if is_printable(value) && !looks_encoded(value) {
        return value.to_string();
    }
    let q = q_encode(value.as_bytes());
    let b = STANDARD.encode(value.as_bytes());
    if q.len() <= b.len() {
        format!("=?UTF-8?Q?{}?=", q)
    } else {
        format!("=?UTF-8?B?{}?=", b)
    }
}

/// Inverse of [`encode_value`]; values that are not encoded words pass through.
pub fn decode_value(value: &str) -> String {
    decode_word(value).unwrap_or_else(|| value.to_string())
}

fn decode_word(value: &str) -> Option<String> {
    let inner = value.strip_prefix("=?")?.strip_suffix("?=")?;
    let mut parts = inner.splitn(3, '?');
    let charset = parts.next()?;
    let encoding = parts.next()?;
    let text = parts.next()?;
    if !charset.eq_ignore_ascii_case("utf-8") {
        return None;
    }
    let bytes = match encoding {
        "Q" | "q" => q_decode(text)?,
        "B" | "b" => STANDARD.decode(text).ok()?,
        _ => return None,
    };
    String::from_utf8(bytes).ok()
}

fn q_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for &b in bytes {
        match b {
            b' ' => out.push('_'),
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'!' | b'*' | b'+' | b'/' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("={:02X}", b)),
        }
    }
    out
}

fn q_decode(text: &str) -> Option<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b'=' => {
                let hex = text.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_encode_shortest_word() {
        assert_eq!(encode_value("\x04w"), "=?UTF-8?Q?=04w?=");
        assert_eq!(encode_value("h\x04"), "=?UTF-8?Q?h=04?=");
        assert_eq!(encode_value("\x04\x04\x04\x04\x04"), "=?UTF-8?B?BAQEBAQ=?=");
    }

    #[test]
    fn test_printable_untouched() {
        assert_eq!(encode_value("hello world"), "hello world");
        assert_eq!(decode_value("hello world"), "hello world");
    }

    #[test]
    fn test_encoded_looking_value_survives() {
        let value = "=?UTF-8?Q?abc?=";
        let encoded = encode_value(value);
        assert_ne!(encoded, value);
        assert_eq!(decode_value(&encoded), value);
    }

    #[test]
    fn test_decode_unknown_charset_passthrough() {
        assert_eq!(decode_value("=?ISO-8859-1?Q?abc?="), "=?ISO-8859-1?Q?abc?=");
        assert_eq!(decode_value("=?UTF-8?Q?=Z?="), "=?UTF-8?Q?=Z?=");
    }

    #[test]
    fn test_to_external_renames_and_filters() {
        let backend = map(&[
            ("x-object-meta-color", "red"),
            ("x-object-meta-blob", "=?UTF-8?Q?=04w?="),
            ("x-object-sysmeta-oss-acl", "{}"),
            ("etag", "0123abcd"),
            ("content-type", "text/plain"),
            ("x-robots-tag", "nofollow"),
            ("x-trans-id", "tx123"),
            ("x-timestamp", "1700000000.00000"),
        ]);
        let headers: HashMap<_, _> = to_external(&backend).into_iter().collect();
        assert_eq!(headers.get("x-oss-meta-color").map(|s| s.as_str()), Some("red"));
        assert_eq!(headers.get("x-oss-meta-blob").map(|s| s.as_str()), Some("\x04w"));
        assert_eq!(headers.get("ETag").map(|s| s.as_str()), Some("\"0123abcd\""));
        assert_eq!(headers.get("Content-Type").map(|s| s.as_str()), Some("text/plain"));
        assert_eq!(headers.get("X-Robots-Tag").map(|s| s.as_str()), Some("nofollow"));
        assert_eq!(headers.len(), 5);
    }

    #[test]
    fn test_to_backend_renames_and_md5() {
        let external = map(&[
            ("x-oss-meta-color", "red"),
            ("content-md5", "ffoHqOWd280dyE1MT4KuoQ=="),
            ("content-type", "text/plain"),
            ("authorization", "OSS a:b"),
            ("x-oss-copy-source", "/b/k"),
        ]);
        let headers: HashMap<_, _> = to_backend(&external).unwrap().into_iter().collect();
        assert_eq!(headers.get("x-object-meta-color").map(|s| s.as_str()), Some("red"));
        assert_eq!(
            headers.get("ETag").map(|s| s.as_str()),
            Some("7dfa07a8e59ddbcd1dc84d4c4f82aea1")
        );
        assert_eq!(headers.get("Content-Type").map(|s| s.as_str()), Some("text/plain"));
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn test_bad_md5() {
        let err = md5_to_etag("not base64!").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidDigest);
        let err = md5_to_etag("YWJj").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidDigest);
    }

    #[test]
    fn test_quote_etag() {
        assert_eq!(quote_etag("abc"), "\"abc\"");
        assert_eq!(quote_etag("\"abc\""), "\"abc\"");
    }

    #[test]
    fn test_response_overrides() {
        let mut resp = OssResponse::ok().with_header("Content-Type", "text/plain");
        let query = map(&[
            ("response-content-type", "image/png"),
            ("response-expires", "Thu, 01 Jan 2015 00:00:00 GMT"),
        ]);
        apply_response_overrides(&mut resp, &query);
        assert_eq!(resp.header("Content-Type"), Some("image/png"));
        assert_eq!(resp.header("Expires"), Some("Thu, 01 Jan 2015 00:00:00 GMT"));
    }

    proptest! {
        #[test]
        fn prop_printable_metadata_roundtrip(
            meta in prop::collection::hash_map("[a-z][a-z0-9-]{0,10}", "[ -~]{0,20}", 0..6)
        ) {
            let external: HashMap<String, String> = meta
                .into_iter()
                .map(|(k, v)| (format!("{}{}", OSS_META_PREFIX, k), v))
                .collect();
            let backend: HashMap<String, String> = to_backend(&external)
                .unwrap()
                .into_iter()
                .collect();
            let back: HashMap<String, String> = to_external(&backend).into_iter().collect();
            prop_assert_eq!(back, external);
        }

        #[test]
        fn prop_any_value_word_roundtrip(value in "\\PC{0,24}|[\\x00-\\x1f]{0,8}") {
            let encoded = encode_value(&value);
            prop_assert!(is_printable(&encoded));
            prop_assert_eq!(decode_value(&encoded), value);
        }
    }
}
