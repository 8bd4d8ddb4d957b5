#![allow(missing_docs)]

//! OSS XML documents: response serialization and request body parsing

use serde::Deserialize;

use crate::acl::{Acl, Grant, Grantee, Group, Owner, Permission};
use crate::listing::{BucketEntry, ListBucketResult};
use crate::oss_error::{ErrorCode, OssError, OssResult};

const XMLNS: &str = "http://doc.oss-cn-hangzhou.aliyuncs.com";
const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
const ALL_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AllUsers";
const AUTHENTICATED_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AuthenticatedUsers";

pub struct XmlBuilder {
    buf: String,
}

impl XmlBuilder {
    pub fn new() -> Self {
        Self { buf: String::new() }
    }

    pub fn header(&mut self) -> &mut Self {
        self.buf
            .push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        self
    }

    /// Opens `tag`; `tag` may carry attributes verbatim.
    pub fn open(&mut self, tag: &str) -> &mut Self {
        self.buf.push('<');
        self.buf.push_str(tag);
        self.buf.push('>');
        self
    }

    pub fn close(&mut self, tag: &str) -> &mut Self {
        self.buf.push_str("</");
        self.buf.push_str(tag);
        self.buf.push('>');
        self
    }

    pub fn elem(&mut self, tag: &str, value: &str) -> &mut Self {
        self.open(tag);
        self.text(value);
        self.close(tag)
    }

    pub fn text(&mut self, value: &str) -> &mut Self {
        escape_into(&mut self.buf, value);
        self
    }

    pub fn empty(&mut self, tag: &str) -> &mut Self {
        self.buf.push('<');
        self.buf.push_str(tag);
        self.buf.push_str("/>");
        self
    }

    pub fn elem_u64(&mut self, tag: &str, value: u64) -> &mut Self {
        self.elem(tag, &value.to_string())
    }

    pub fn elem_u32(&mut self, tag: &str, value: u32) -> &mut Self {
        self.elem(tag, &value.to_string())
    }

    pub fn elem_bool(&mut self, tag: &str, value: bool) -> &mut Self {
        self.elem(tag, if value { "true" } else { "false" })
    }

    pub fn elem_opt(&mut self, tag: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value {
            self.elem(tag, v);
        }
        self
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

impl Default for XmlBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_into(buf: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '&' => buf.push_str("&amp;"),
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            '"' => buf.push_str("&quot;"),
            '\'' => buf.push_str("&apos;"),
            _ => buf.push(c),
        }
    }
}

pub fn error_xml(err: &OssError, request_id: &str) -> String {
    let mut xb = XmlBuilder::new();
    xb.header();
    xb.open("Error");
    xb.elem("Code", err.code.as_str());
    xb.elem("Message", &err.message);
    xb.elem_opt("Resource", err.resource.as_deref());
    xb.elem_opt("BucketName", err.bucket.as_deref());
    xb.elem_opt("Key", err.key.as_deref());
    xb.elem("RequestId", request_id);
    xb.close("Error");
    xb.finish()
}

pub fn list_buckets_xml(owner: &Owner, buckets: &[BucketEntry]) -> String {
    let mut xb = XmlBuilder::new();
    xb.header();
    xb.open(&format!("ListAllMyBucketsResult xmlns=\"{}\"", XMLNS));
    owner_xml(&mut xb, owner);
    xb.open("Buckets");
    for bucket in buckets {
        xb.open("Bucket");
        xb.elem("Name", &bucket.name);
        xb.elem("CreationDate", &bucket.creation_date);
        xb.close("Bucket");
    }
    xb.close("Buckets");
    xb.close("ListAllMyBucketsResult");
    xb.finish()
}

pub fn list_objects_xml(result: &ListBucketResult) -> String {
    let url = result.encoding_type.as_deref() == Some("url");
    let enc = |s: &str| -> String {
        if url {
            urlencoding::encode(s).into_owned()
        } else {
            s.to_string()
        }
    };

    let mut xb = XmlBuilder::new();
    xb.header();
    xb.open(&format!("ListBucketResult xmlns=\"{}\"", XMLNS));
    xb.elem("Name", &result.name);
    xb.elem("Prefix", &enc(&result.prefix));
    xb.elem("Marker", &enc(&result.marker));
    xb.elem_u32("MaxKeys", result.max_keys);
    if let Some(delimiter) = &result.delimiter {
        xb.elem("Delimiter", &enc(delimiter));
    }
    xb.elem_opt("EncodingType", result.encoding_type.as_deref());
    xb.elem_bool("IsTruncated", result.is_truncated);
    if let Some(next) = &result.next_marker {
        xb.elem("NextMarker", &enc(next));
    }
    for obj in &result.contents {
        xb.open("Contents");
        xb.elem("Key", &enc(&obj.key));
        xb.elem("LastModified", &obj.last_modified);
        xb.elem("ETag", &format!("\"{}\"", obj.etag));
        xb.elem_u64("Size", obj.size);
        xb.elem("StorageClass", &result.storage_class);
        owner_xml(&mut xb, &result.owner);
        xb.close("Contents");
    }
    for prefix in &result.common_prefixes {
        xb.open("CommonPrefixes");
        xb.elem("Prefix", &enc(prefix));
        xb.close("CommonPrefixes");
    }
    xb.close("ListBucketResult");
    xb.finish()
}

pub fn copy_object_xml(last_modified: &str, etag: &str) -> String {
    let mut xb = XmlBuilder::new();
    xb.header();
    xb.open("CopyObjectResult");
    xb.elem("LastModified", last_modified);
    xb.elem("ETag", &format!("\"{}\"", etag.trim_matches('"')));
    xb.close("CopyObjectResult");
    xb.finish()
}

pub fn location_xml(location: &str) -> String {
    let mut xb = XmlBuilder::new();
    xb.header();
    xb.open(&format!("LocationConstraint xmlns=\"{}\"", XMLNS));
    xb.text(location);
    xb.close("LocationConstraint");
    xb.finish()
}

pub fn logging_status_xml() -> String {
    let mut xb = XmlBuilder::new();
    xb.header();
    xb.empty(&format!("BucketLoggingStatus xmlns=\"{}\"", XMLNS));
    xb.finish()
}

fn owner_xml(xb: &mut XmlBuilder, owner: &Owner) {
    xb.open("Owner");
    xb.elem("ID", &owner.id);
    xb.elem("DisplayName", &owner.display_name);
    xb.close("Owner");
}

pub fn acl_xml(acl: &Acl) -> String {
    let mut xb = XmlBuilder::new();
    xb.header();
    xb.open(&format!("AccessControlPolicy xmlns=\"{}\"", XMLNS));
    owner_xml(&mut xb, &acl.owner);
    xb.open("AccessControlList");
    for grant in &acl.grants {
        xb.open("Grant");
        match &grant.grantee {
            Grantee::User(id) => {
                xb.open(&format!(
                    "Grantee xmlns:xsi=\"{}\" xsi:type=\"CanonicalUser\"",
                    XSI
                ));
                xb.elem("ID", id);
                xb.elem("DisplayName", id);
            }
            Grantee::Group(group) => {
                xb.open(&format!("Grantee xmlns:xsi=\"{}\" xsi:type=\"Group\"", XSI));
                xb.elem("URI", group_uri(*group));
            }
        }
        xb.close("Grantee");
        xb.elem("Permission", grant.permission.as_str());
        xb.close("Grant");
    }
    xb.close("AccessControlList");
    xb.close("AccessControlPolicy");
    xb.finish()
}

fn group_uri(group: Group) -> &'static str {
    match group {
        Group::AllUsers => ALL_USERS_URI,
        Group::AuthenticatedUsers => AUTHENTICATED_USERS_URI,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyDoc {
    owner: OwnerDoc,
    #[serde(default)]
    access_control_list: AclListDoc,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OwnerDoc {
    #[serde(rename = "ID")]
    id: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AclListDoc {
    #[serde(rename = "Grant", default)]
    grants: Vec<GrantDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GrantDoc {
    grantee: GranteeDoc,
    permission: String,
}

#[derive(Debug, Deserialize)]
struct GranteeDoc {
    #[serde(rename = "ID", default)]
    id: Option<String>,
    #[serde(rename = "URI", default)]
    uri: Option<String>,
}

/// Parses an `AccessControlPolicy` request body.
pub fn parse_acl_xml(body: &[u8]) -> OssResult<Acl> {
    let malformed = || OssError::new(ErrorCode::MalformedACLError);
    let doc: PolicyDoc = quick_xml::de::from_reader(body).map_err(|_| malformed())?;

    let mut grants = Vec::with_capacity(doc.access_control_list.grants.len());
    for grant in doc.access_control_list.grants {
        let permission = Permission::parse(grant.permission.trim()).ok_or_else(malformed)?;
        let grantee = match (grant.grantee.id, grant.grantee.uri) {
            (Some(id), None) => Grantee::User(id),
            (None, Some(uri)) => match uri.trim() {
                ALL_USERS_URI => Grantee::Group(Group::AllUsers),
                AUTHENTICATED_USERS_URI => Grantee::Group(Group::AuthenticatedUsers),
                _ => return Err(malformed()),
            },
            _ => return Err(malformed()),
        };
        grants.push(Grant {
            grantee,
            permission,
        });
    }

    let display_name = doc.owner.display_name.unwrap_or_else(|| doc.owner.id.clone());
    Ok(Acl {
        owner: Owner {
            id: doc.owner.id,
            display_name,
        },
        grants,
    })
}

#[derive(Debug, Deserialize)]
struct CreateBucketConfiguration {
    #[serde(rename = "LocationConstraint", default)]
    location_constraint: Option<String>,
}

/// Location requested by a `CreateBucketConfiguration` body, if any.
pub fn parse_location_constraint(body: &[u8]) -> OssResult<Option<String>> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(None);
    }
    let doc: CreateBucketConfiguration = quick_xml::de::from_reader(body)
        .map_err(|_| OssError::new(ErrorCode::MalformedXML))?;
    Ok(doc
        .location_constraint
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::ObjectEntry;

    fn owner() -> Owner {
        Owner {
            id: "test:tester".to_string(),
            display_name: "test:tester".to_string(),
        }
    }

    #[test]
    fn test_escape() {
        let mut xb = XmlBuilder::new();
        xb.elem("Key", "a<b>&'\"");
        assert_eq!(xb.finish(), "<Key>a&lt;b&gt;&amp;&apos;&quot;</Key>");
    }

    #[test]
    fn test_error_xml_optional_elements() {
        let err = OssError::new(ErrorCode::InvalidArgument);
        let xml = error_xml(&err, "abc");
        assert!(xml.contains("<Code>InvalidArgument</Code>"));
        assert!(xml.contains("<Message>Invalid Argument</Message>"));
        assert!(!xml.contains("<Resource>"));
        assert!(!xml.contains("<Key>"));
    }

    fn listing() -> ListBucketResult {
        ListBucketResult {
            name: "bucket".to_string(),
            prefix: String::new(),
            marker: String::new(),
            max_keys: 1000,
            delimiter: Some("/".to_string()),
            encoding_type: None,
            is_truncated: false,
            next_marker: None,
            contents: vec![ObjectEntry {
                key: "a b".to_string(),
                last_modified: "2011-01-05T02:19:14.275Z".to_string(),
                etag: "0123".to_string(),
                size: 5,
            }],
            common_prefixes: vec!["dir/".to_string()],
            owner: owner(),
            storage_class: "STANDARD".to_string(),
        }
    }

    #[test]
    fn test_list_objects_xml_elements() {
        let xml = list_objects_xml(&listing());
        assert!(xml.contains("<Name>bucket</Name>"));
        assert!(xml.contains("<MaxKeys>1000</MaxKeys>"));
        assert!(xml.contains("<Delimiter>/</Delimiter>"));
        assert!(xml.contains("<IsTruncated>false</IsTruncated>"));
        assert!(xml.contains("<Key>a b</Key>"));
        assert!(xml.contains("<ETag>&quot;0123&quot;</ETag>"));
        assert!(xml.contains("<StorageClass>STANDARD</StorageClass>"));
        assert!(xml.contains("<ID>test:tester</ID>"));
        assert!(xml.contains("<CommonPrefixes><Prefix>dir/</Prefix></CommonPrefixes>"));
        assert!(!xml.contains("<EncodingType>"));
    }

    #[test]
    fn test_list_objects_xml_url_encoding() {
        let mut result = listing();
        result.encoding_type = Some("url".to_string());
        let xml = list_objects_xml(&result);
        assert!(xml.contains("<EncodingType>url</EncodingType>"));
        assert!(xml.contains("<Key>a%20b</Key>"));
        assert!(xml.contains("<Prefix>dir%2F</Prefix>"));
    }

    #[test]
    fn test_copy_object_xml() {
        let xml = copy_object_xml("2014-01-01T00:00:00.000Z", "abc");
        assert!(xml.contains("<LastModified>2014-01-01T00:00:00.000Z</LastModified>"));
        assert!(xml.contains("<ETag>&quot;abc&quot;</ETag>"));
    }

    #[test]
    fn test_location_xml() {
        let xml = location_xml("oss-cn-hangzhou");
        assert!(xml.ends_with(">oss-cn-hangzhou</LocationConstraint>"));
        assert!(xml.contains("<LocationConstraint xmlns="));
    }

    #[test]
    fn test_logging_status_xml_is_empty_element() {
        let xml = logging_status_xml();
        assert!(xml.contains("<BucketLoggingStatus xmlns="));
        assert!(xml.ends_with("/>"));
    }

    #[test]
    fn test_acl_xml_parse_back() {
        let acl = Acl {
            owner: owner(),
            grants: vec![
                Grant {
                    grantee: Grantee::User("test:tester".to_string()),
                    permission: Permission::FullControl,
                },
                Grant {
                    grantee: Grantee::Group(Group::AllUsers),
                    permission: Permission::Read,
                },
            ],
        };
        let xml = acl_xml(&acl);
        assert!(xml.contains("xsi:type=\"Group\""));
        assert!(xml.contains("<Permission>FULL_CONTROL</Permission>"));
        let parsed = parse_acl_xml(xml.as_bytes()).unwrap();
        assert_eq!(parsed, acl);
    }

    #[test]
    fn test_parse_acl_xml_rejects_garbage() {
        let err = parse_acl_xml(b"not xml at all").unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedACLError);
        let bad_perm = b"<AccessControlPolicy><Owner><ID>a</ID></Owner><AccessControlList><Grant><Grantee><ID>b</ID></Grantee><Permission>EVERYTHING</Permission></Grant></AccessControlList></AccessControlPolicy>";
        assert!(parse_acl_xml(bad_perm).is_err());
    }

    #[test]
    fn test_parse_location_constraint() {
        assert_eq!(parse_location_constraint(b"").unwrap(), None);
        let body = b"<CreateBucketConfiguration><LocationConstraint>oss-cn-beijing</LocationConstraint></CreateBucketConfiguration>";
        assert_eq!(
            parse_location_constraint(body).unwrap().as_deref(),
            Some("oss-cn-beijing")
        );
        let err = parse_location_constraint(b"<Create").unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedXML);
    }
}
