#![allow(missing_docs)]

//! Outbound OSS response

use bytes::Bytes;

use crate::oss_error::OssError;

/// Response produced by the gateway for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OssResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl OssResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_headers<I>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.headers.extend(headers);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_xml_body(mut self, xml: String) -> Self {
        self.body = Bytes::from(xml);
        if self.header("content-type").is_none() {
            self.headers
                .push(("Content-Type".to_string(), "application/xml".to_string()));
        }
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Replaces (or adds) a header, case-insensitively.
    pub fn set_header(&mut self, key: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
        self.headers.push((key.to_string(), value.to_string()));
    }

    pub fn remove_header(&mut self, key: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn no_content() -> Self {
        Self::new(204)
    }

    /// Error document for `err`; HEAD requests get the status without a body.
    pub fn from_error(err: &OssError, head: bool, request_id: &str) -> Self {
        let mut resp = Self::new(err.status).with_headers(err.headers.iter().cloned());
        if head {
            return resp;
        }
        resp = resp.with_xml_body(err.to_xml(request_id));
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oss_error::ErrorCode;

    #[test]
    fn test_xml_body_sets_content_type_once() {
        let resp = OssResponse::ok()
            .with_header("Content-Type", "text/xml")
            .with_xml_body("<a/>".to_string());
        assert_eq!(resp.header("content-type"), Some("text/xml"));
        let resp = OssResponse::ok().with_xml_body("<a/>".to_string());
        assert_eq!(resp.header("Content-Type"), Some("application/xml"));
    }

    #[test]
    fn test_set_header_replaces() {
        let mut resp = OssResponse::ok().with_header("ETag", "\"a\"");
        resp.set_header("etag", "\"b\"");
        assert_eq!(resp.headers.len(), 1);
        assert_eq!(resp.header("ETag"), Some("\"b\""));
        resp.remove_header("ETAG");
        assert!(resp.headers.is_empty());
    }

    #[test]
    fn test_from_error_with_body() {
        let err = OssError::new(ErrorCode::NoSuchKey).with_resource("/b/k");
        let resp = OssResponse::from_error(&err, false, "r1");
        assert_eq!(resp.status, 404);
        assert_eq!(resp.header("Content-Type"), Some("application/xml"));
        let body = String::from_utf8(resp.body.to_vec()).unwrap();
        assert!(body.contains("<Code>NoSuchKey</Code>"));
    }

    #[test]
    fn test_from_error_head_has_no_body() {
        let err = OssError::new(ErrorCode::NoSuchBucket);
        let resp = OssResponse::from_error(&err, true, "r1");
        assert_eq!(resp.status, 404);
        assert!(resp.body.is_empty());
    }

    #[test]
    fn test_from_error_carries_challenge() {
        let err = OssError::new(ErrorCode::Unauthorized)
            .with_header("WWW-Authenticate", "Swift realm=\"test\"");
        let resp = OssResponse::from_error(&err, false, "r1");
        assert_eq!(resp.status, 401);
        assert_eq!(resp.header("www-authenticate"), Some("Swift realm=\"test\""));
    }
}
