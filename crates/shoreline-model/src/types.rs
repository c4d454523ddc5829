//! Buckets, object metadata, and listing pages.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// User-defined object metadata.
///
/// Keys are stored lowercase without the `x-amz-meta-` wire prefix. A
/// `BTreeMap` keeps header emission order deterministic.
pub type UserMetadata = BTreeMap<String, String>;

/// A named container for objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    /// The bucket name, unique within a backend.
    pub name: String,
    /// When the bucket was created.
    pub created_at: DateTime<Utc>,
}

/// Metadata describing one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// The object key (percent-decoded, `/`-separated).
    pub key: String,
    /// Payload length in bytes.
    pub size: u64,
    /// Lowercase hex MD5 of the payload, unquoted.
    ///
    /// Quoting happens at the HTTP boundary; storage and providers always
    /// hold the bare 32-character digest.
    pub etag: String,
    /// MIME content type.
    pub content_type: String,
    /// Last modification time, seconds resolution.
    pub last_modified: DateTime<Utc>,
    /// User-defined metadata without the wire prefix.
    pub user_metadata: UserMetadata,
    /// Set when the ETag is the backend's native hash rather than a true
    /// MD5 (remote backend with a missing or stale cache entry).
    pub etag_is_native_hash: bool,
}

impl ObjectInfo {
    /// Returns the ETag in wire format (quoted).
    #[must_use]
    pub fn quoted_etag(&self) -> String {
        format!("\"{}\"", self.etag)
    }
}

/// Default content type for objects uploaded without one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// One page of a bucket listing.
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    /// Objects on this page, in lexicographic key order.
    pub objects: Vec<ObjectInfo>,
    /// Distinct common prefixes encountered, in lexicographic order.
    pub common_prefixes: Vec<String>,
    /// Whether more keys remain after this page.
    pub is_truncated: bool,
    /// The key to resume from, set only when truncated.
    pub next_key: Option<String>,
}

/// Per-key outcome of a DeleteObjects request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The key was deleted (or did not exist; deletion is idempotent).
    Deleted {
        /// The object key.
        key: String,
    },
    /// The deletion failed.
    Failed {
        /// The object key.
        key: String,
        /// The S3 error code string.
        code: String,
        /// The error message.
        message: String,
    },
}

impl DeleteOutcome {
    /// The key this outcome refers to.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Deleted { key } | Self::Failed { key, .. } => key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_quote_etag_on_demand() {
        let info = ObjectInfo {
            key: "a.txt".to_owned(),
            size: 2,
            etag: "c1a5298f939e87e8f962a5edfc206918".to_owned(),
            content_type: DEFAULT_CONTENT_TYPE.to_owned(),
            last_modified: Utc::now(),
            user_metadata: UserMetadata::new(),
            etag_is_native_hash: false,
        };
        assert_eq!(info.quoted_etag(), "\"c1a5298f939e87e8f962a5edfc206918\"");
    }

    #[test]
    fn test_should_expose_key_from_delete_outcome() {
        let ok = DeleteOutcome::Deleted { key: "a".to_owned() };
        let bad = DeleteOutcome::Failed {
            key: "b".to_owned(),
            code: "InternalError".to_owned(),
            message: "boom".to_owned(),
        };
        assert_eq!(ok.key(), "a");
        assert_eq!(bad.key(), "b");
    }
}
