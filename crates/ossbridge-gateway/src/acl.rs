//! Bucket and object ACLs
//!
//! An [`Acl`] is stored on the backend as a single system-metadata header
//! holding a compact JSON document, so it survives object copies and is
//! invisible to clients reading user metadata.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::oss_error::{ErrorCode, OssError, OssResult};

/// Backend header holding a container ACL.
pub const CONTAINER_ACL_HEADER: &str = "x-container-sysmeta-oss-acl";
/// Backend header holding an object ACL.
pub const OBJECT_ACL_HEADER: &str = "x-object-sysmeta-oss-acl";

/// Resource owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    /// Requester id of the owner
    #[serde(rename = "ID")]
    pub id: String,
    /// Display name
    #[serde(rename = "DisplayName")]
    pub display_name: String,
}

impl Owner {
    /// Owner whose display name is its id.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: id.to_string(),
        }
    }
}

/// Predefined grantee groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Group {
    /// Everyone, identified or not
    AllUsers,
    /// Any identified requester
    AuthenticatedUsers,
}

/// Who a grant applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grantee {
    /// A single requester id
    #[serde(rename = "ID")]
    User(String),
    /// A predefined group
    Group(Group),
}

impl Grantee {
    fn matches(&self, requester: &str) -> bool {
        match self {
            Grantee::User(id) => id == requester,
            Grantee::Group(Group::AllUsers) => true,
            Grantee::Group(Group::AuthenticatedUsers) => !requester.is_empty(),
        }
    }
}

/// Grantable permissions. `FullControl` implies every other one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    /// Read object data or list a bucket
    Read,
    /// Create, overwrite or delete objects in a bucket
    Write,
    /// Read the ACL
    ReadAcp,
    /// Replace the ACL
    WriteAcp,
    /// All of the above
    FullControl,
}

impl Permission {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "READ",
            Permission::Write => "WRITE",
            Permission::ReadAcp => "READ_ACP",
            Permission::WriteAcp => "WRITE_ACP",
            Permission::FullControl => "FULL_CONTROL",
        }
    }

    /// Parses a wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "READ" => Some(Permission::Read),
            "WRITE" => Some(Permission::Write),
            "READ_ACP" => Some(Permission::ReadAcp),
            "WRITE_ACP" => Some(Permission::WriteAcp),
            "FULL_CONTROL" => Some(Permission::FullControl),
            _ => None,
        }
    }

    fn satisfies(&self, wanted: Permission) -> bool {
        *self == wanted || *self == Permission::FullControl
    }
}

/// One permission granted to one grantee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Grantee
    #[serde(rename = "Grantee")]
    pub grantee: Grantee,
    /// Permission
    #[serde(rename = "Permission")]
    pub permission: Permission,
}

/// Owner plus ordered grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    /// Owner; always authorized
    #[serde(rename = "Owner")]
    pub owner: Owner,
    /// Grants in the order they were given
    #[serde(rename = "Grant", default)]
    pub grants: Vec<Grant>,
}

/// Which kind of resource an ACL header belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclTarget {
    /// Backend container
    Bucket,
    /// Backend object
    Object,
}

impl AclTarget {
    /// Backend header carrying the ACL for this target.
    pub fn header(&self) -> &'static str {
        match self {
            AclTarget::Bucket => CONTAINER_ACL_HEADER,
            AclTarget::Object => OBJECT_ACL_HEADER,
        }
    }
}

/// Canned ACL names accepted in `x-oss-acl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannedAcl {
    /// Owner only
    Private,
    /// Owner plus anonymous read
    PublicRead,
    /// Owner plus anonymous read and write
    PublicReadWrite,
}

impl CannedAcl {
    /// Parses an `x-oss-acl` value.
    pub fn parse(value: &str) -> OssResult<Self> {
        match value.trim() {
            "private" => Ok(CannedAcl::Private),
            "public-read" => Ok(CannedAcl::PublicRead),
            "public-read-write" => Ok(CannedAcl::PublicReadWrite),
            other => Err(OssError::invalid_argument(format!(
                "unsupported x-oss-acl value: {}",
                other
            ))),
        }
    }
}

impl Acl {
    /// Owner-only ACL.
    pub fn private(owner: Owner) -> Self {
        Self::canned(owner, CannedAcl::Private)
    }

    /// Expands a canned ACL for `owner`.
    pub fn canned(owner: Owner, canned: CannedAcl) -> Self {
        let mut grants = vec![Grant {
            grantee: Grantee::User(owner.id.clone()),
            permission: Permission::FullControl,
        }];
        match canned {
            CannedAcl::Private => {}
            CannedAcl::PublicRead => grants.push(Grant {
                grantee: Grantee::Group(Group::AllUsers),
                permission: Permission::Read,
            }),
            CannedAcl::PublicReadWrite => {
                grants.push(Grant {
                    grantee: Grantee::Group(Group::AllUsers),
                    permission: Permission::Read,
                });
                grants.push(Grant {
                    grantee: Grantee::Group(Group::AllUsers),
                    permission: Permission::Write,
                });
            }
        }
        Self { owner, grants }
    }

    /// ACL for a new resource: the `x-oss-acl` canned ACL if given, else private.
    pub fn from_request_header(owner: Owner, header: Option<&str>) -> OssResult<Self> {
        match header {
            Some(value) => Ok(Self::canned(owner, CannedAcl::parse(value)?)),
            None => Ok(Self::private(owner)),
        }
    }

    /// Whether `requester` holds `permission`.
    ///
    /// An empty requester id is anonymous and only matches `AllUsers` grants.
    pub fn check(&self, requester: &str, permission: Permission) -> bool {
        if requester == self.owner.id {
            return true;
        }
        self.grants
            .iter()
            .any(|g| g.grantee.matches(requester) && g.permission.satisfies(permission))
    }

    /// Like [`Acl::check`], failing with `AccessDenied`.
    pub fn authorize(&self, requester: &str, permission: Permission) -> OssResult<()> {
        if self.check(requester, permission) {
            Ok(())
        } else {
            warn!(
                requester = requester,
                permission = permission.as_str(),
                "acl denied"
            );
            Err(OssError::new(ErrorCode::AccessDenied))
        }
    }

    /// Only the owner passes.
    pub fn authorize_owner(&self, requester: &str) -> OssResult<()> {
        if requester == self.owner.id {
            Ok(())
        } else {
            warn!(requester = requester, "acl denied: owner only");
            Err(OssError::new(ErrorCode::AccessDenied))
        }
    }
}

/// Backend headers storing `acl` on `target`.
pub fn encode(target: AclTarget, acl: &Acl) -> OssResult<Vec<(String, String)>> {
    let json = serde_json::to_string(acl).map_err(|e| {
        OssError::from(crate::error::GatewayError::SerializationError {
            reason: e.to_string(),
        })
    })?;
    Ok(vec![(target.header().to_string(), ascii_json(&json))])
}

/// ACL stored in backend headers (lowercased names), if any.
///
/// A present but unreadable document is an internal error: it was written by
/// this gateway and must parse.
pub fn decode(headers: &HashMap<String, String>) -> OssResult<Option<Acl>> {
    let raw = headers
        .get(CONTAINER_ACL_HEADER)
        .or_else(|| headers.get(OBJECT_ACL_HEADER));
    match raw {
        None => Ok(None),
        Some(value) => serde_json::from_str(value).map(Some).map_err(|e| {
            OssError::from(crate::error::GatewayError::SerializationError {
                reason: format!("stored acl: {}", e),
            })
        }),
    }
}

// Header values must stay ASCII; escape everything else as JSON \u sequences.
fn ascii_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{:04x}", unit);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn owner() -> Owner {
        Owner::new("test:tester")
    }

    fn to_map(headers: Vec<(String, String)>) -> HashMap<String, String> {
        headers.into_iter().collect()
    }

    #[test]
    fn test_owner_always_allowed() {
        let acl = Acl {
            owner: owner(),
            grants: Vec::new(),
        };
        assert!(acl.check("test:tester", Permission::Read));
        assert!(acl.check("test:tester", Permission::WriteAcp));
        assert!(!acl.check("other", Permission::Read));
    }

    #[test]
    fn test_full_control_subsumes() {
        let acl = Acl {
            owner: owner(),
            grants: vec![Grant {
                grantee: Grantee::User("bob".to_string()),
                permission: Permission::FullControl,
            }],
        };
        assert!(acl.check("bob", Permission::Write));
        assert!(acl.check("bob", Permission::ReadAcp));
        assert!(!acl.check("carol", Permission::Read));
    }

    #[test]
    fn test_exact_permission_only() {
        let acl = Acl {
            owner: owner(),
            grants: vec![Grant {
                grantee: Grantee::User("bob".to_string()),
                permission: Permission::Read,
            }],
        };
        assert!(acl.check("bob", Permission::Read));
        assert!(!acl.check("bob", Permission::Write));
    }

    #[test]
    fn test_groups() {
        let acl = Acl::canned(owner(), CannedAcl::PublicRead);
        assert!(acl.check("", Permission::Read));
        assert!(acl.check("anyone", Permission::Read));
        assert!(!acl.check("anyone", Permission::Write));

        let acl = Acl {
            owner: owner(),
            grants: vec![Grant {
                grantee: Grantee::Group(Group::AuthenticatedUsers),
                permission: Permission::Write,
            }],
        };
        assert!(acl.check("someone", Permission::Write));
        assert!(!acl.check("", Permission::Write));
    }

    #[test]
    fn test_canned_parse() {
        assert_eq!(CannedAcl::parse("private").unwrap(), CannedAcl::Private);
        assert_eq!(
            CannedAcl::parse("public-read-write").unwrap(),
            CannedAcl::PublicReadWrite
        );
        let err = CannedAcl::parse("authenticated-read").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_encode_header_name_by_target() {
        let acl = Acl::private(owner());
        let bucket = encode(AclTarget::Bucket, &acl).unwrap();
        assert_eq!(bucket[0].0, CONTAINER_ACL_HEADER);
        let object = encode(AclTarget::Object, &acl).unwrap();
        assert_eq!(object[0].0, OBJECT_ACL_HEADER);
    }

    #[test]
    fn test_encode_json_shape() {
        let acl = Acl::canned(owner(), CannedAcl::PublicRead);
        let headers = encode(AclTarget::Bucket, &acl).unwrap();
        assert_eq!(
            headers[0].1,
            r#"{"Owner":{"ID":"test:tester","DisplayName":"test:tester"},"Grant":[{"Grantee":{"ID":"test:tester"},"Permission":"FULL_CONTROL"},{"Grantee":{"Group":"AllUsers"},"Permission":"READ"}]}"#
        );
    }

    #[test]
    fn test_decode_absent_and_malformed() {
        assert_eq!(decode(&HashMap::new()).unwrap(), None);
        let mut headers = HashMap::new();
        headers.insert(OBJECT_ACL_HEADER.to_string(), "{not json".to_string());
        let err = decode(&headers).unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalError);
    }

    #[test]
    fn test_non_ascii_owner_roundtrip() {
        let acl = Acl::private(Owner::new("测试"));
        let headers = encode(AclTarget::Object, &acl).unwrap();
        assert!(headers[0].1.is_ascii());
        assert_eq!(decode(&to_map(headers)).unwrap(), Some(acl));
    }

    fn arb_permission() -> impl Strategy<Value = Permission> {
        prop_oneof![
            Just(Permission::Read),
            Just(Permission::Write),
            Just(Permission::ReadAcp),
            Just(Permission::WriteAcp),
            Just(Permission::FullControl),
        ]
    }

    fn arb_grantee() -> impl Strategy<Value = Grantee> {
        prop_oneof![
            "[a-z0-9:]{1,12}".prop_map(Grantee::User),
            Just(Grantee::Group(Group::AllUsers)),
            Just(Grantee::Group(Group::AuthenticatedUsers)),
        ]
    }

    fn arb_acl() -> impl Strategy<Value = Acl> {
        (
            "[a-z0-9:]{1,12}",
            "\\PC{0,12}",
            prop::collection::vec((arb_grantee(), arb_permission()), 0..6),
        )
            .prop_map(|(id, display_name, grants)| Acl {
                owner: Owner { id, display_name },
                grants: grants
                    .into_iter()
                    .map(|(grantee, permission)| Grant {
                        grantee,
                        permission,
                    })
                    .collect(),
            })
    }

    proptest! {
        #[test]
        fn prop_encode_decode_roundtrip(acl in arb_acl(), object in any::<bool>()) {
            let target = if object { AclTarget::Object } else { AclTarget::Bucket };
            let headers = encode(target, &acl).unwrap();
            prop_assert_eq!(decode(&to_map(headers)).unwrap(), Some(acl));
        }

        #[test]
        fn prop_owner_always_authorized(acl in arb_acl(), permission in arb_permission()) {
            let owner_id = acl.owner.id.clone();
            prop_assert!(acl.check(&owner_id, permission));
        }
    }
}
