//! Single byte-range requests

use bytes::Bytes;

use crate::oss_error::{ErrorCode, OssError, OssResult};

/// Syntactically valid `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// `bytes=a-b`
    FromTo(u64, u64),
    /// `bytes=a-`
    From(u64),
    /// `bytes=-n`
    Suffix(u64),
}

impl RangeSpec {
    /// Parses a `Range` header; anything malformed means "no range".
    ///
    /// Multi-range requests, reversed bounds and `bytes=-0` are all treated
    /// as malformed.
    pub fn parse(header: &str) -> Option<Self> {
        let spec = header.trim().strip_prefix("bytes=")?;
        if spec.contains(',') {
            return None;
        }
        let (start, end) = spec.split_once('-')?;
        let (start, end) = (start.trim(), end.trim());
        match (start.is_empty(), end.is_empty()) {
            (true, true) => None,
            (true, false) => match end.parse::<u64>().ok()? {
                0 => None,
                n => Some(RangeSpec::Suffix(n)),
            },
            (false, true) => Some(RangeSpec::From(start.parse().ok()?)),
            (false, false) => {
                let a: u64 = start.parse().ok()?;
                let b: u64 = end.parse().ok()?;
                if a > b {
                    None
                } else {
                    Some(RangeSpec::FromTo(a, b))
                }
            }
        }
    }

    /// Inclusive byte bounds within an entity of `total` bytes.
    pub fn resolve(&self, total: u64) -> OssResult<(u64, u64)> {
        let unsatisfiable = || OssError::new(ErrorCode::InvalidRange);
        match *self {
            RangeSpec::FromTo(a, b) => {
                if a >= total {
                    return Err(unsatisfiable());
                }
                Ok((a, b.min(total - 1)))
            }
            RangeSpec::From(a) => {
                if a >= total {
                    return Err(unsatisfiable());
                }
                Ok((a, total - 1))
            }
            RangeSpec::Suffix(n) => {
                if total == 0 {
                    return Err(unsatisfiable());
                }
                Ok((total.saturating_sub(n), total - 1))
            }
        }
    }

    /// Header form for forwarding to the backend.
    pub fn to_header(&self) -> String {
        match *self {
            RangeSpec::FromTo(a, b) => format!("bytes={}-{}", a, b),
            RangeSpec::From(a) => format!("bytes={}-", a),
            RangeSpec::Suffix(n) => format!("bytes=-{}", n),
        }
    }
}

/// `Content-Range` value for inclusive bounds.
pub fn content_range(start: u64, end: u64, total: u64) -> String {
    format!("bytes {}-{}/{}", start, end, total)
}

/// Entity after range application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranged {
    /// 200 or 206
    pub status: u16,
    /// Possibly truncated body
    pub body: Bytes,
    /// `Content-Range` for partial responses
    pub content_range: Option<String>,
}

/// Applies `range` to a complete entity.
pub fn slice(range: Option<RangeSpec>, body: Bytes) -> OssResult<Ranged> {
    let Some(spec) = range else {
        return Ok(Ranged {
            status: 200,
            body,
            content_range: None,
        });
    };
    let total = body.len() as u64;
    let (start, end) = spec.resolve(total)?;
    Ok(Ranged {
        status: 206,
        body: body.slice(start as usize..=end as usize),
        content_range: Some(content_range(start, end, total)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn five() -> Bytes {
        Bytes::from_static(b"hello")
    }

    fn apply(header: &str) -> OssResult<Ranged> {
        slice(RangeSpec::parse(header), five())
    }

    #[test]
    fn test_first_four() {
        let r = apply("bytes=0-3").unwrap();
        assert_eq!(r.status, 206);
        assert_eq!(r.body.len(), 4);
        assert_eq!(r.content_range.as_deref(), Some("bytes 0-3/5"));
    }

    #[test]
    fn test_suffix() {
        let r = apply("bytes=-3").unwrap();
        assert_eq!(r.status, 206);
        assert_eq!(&r.body[..], b"llo");
        assert_eq!(r.content_range.as_deref(), Some("bytes 2-4/5"));
    }

    #[test]
    fn test_open_ended() {
        let r = apply("bytes=1-").unwrap();
        assert_eq!(&r.body[..], b"ello");
        assert_eq!(r.content_range.as_deref(), Some("bytes 1-4/5"));
    }

    #[test]
    fn test_end_clamped() {
        let r = apply("bytes=3-100").unwrap();
        assert_eq!(&r.body[..], b"lo");
        assert_eq!(r.content_range.as_deref(), Some("bytes 3-4/5"));
    }

    #[test]
    fn test_unsatisfiable() {
        let err = apply("bytes=5-10").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRange);
        assert_eq!(err.status, 416);
    }

    #[test]
    fn test_malformed_is_full_entity() {
        for header in ["hoge", "bytes=", "bytes=5-1", "bytes=a-b", "bytes=-0", "bytes=0-1,3-4"] {
            let r = apply(header).unwrap();
            assert_eq!(r.status, 200, "{}", header);
            assert_eq!(r.body.len(), 5);
            assert!(r.content_range.is_none());
        }
    }

    #[test]
    fn test_to_header() {
        assert_eq!(RangeSpec::FromTo(0, 3).to_header(), "bytes=0-3");
        assert_eq!(RangeSpec::Suffix(3).to_header(), "bytes=-3");
        assert_eq!(RangeSpec::From(2).to_header(), "bytes=2-");
    }
}
