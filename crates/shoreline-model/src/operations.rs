//! The set of S3 operations served by the gateway.

use std::fmt;

/// All S3 operations this gateway dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum S3Operation {
    /// GET on the service root.
    ListBuckets,
    /// PUT on a bucket.
    CreateBucket,
    /// DELETE on a bucket.
    DeleteBucket,
    /// HEAD on a bucket.
    HeadBucket,
    /// GET on a bucket (v1 listing).
    ListObjects,
    /// GET on a bucket with `list-type=2`.
    ListObjectsV2,
    /// POST on a bucket with `?delete`.
    DeleteObjects,
    /// PUT on an object.
    PutObject,
    /// PUT on an object with `x-amz-copy-source`.
    CopyObject,
    /// GET on an object.
    GetObject,
    /// HEAD on an object.
    HeadObject,
    /// DELETE on an object.
    DeleteObject,
}

impl S3Operation {
    /// Returns the operation name as used in AWS documentation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListBuckets => "ListBuckets",
            Self::CreateBucket => "CreateBucket",
            Self::DeleteBucket => "DeleteBucket",
            Self::HeadBucket => "HeadBucket",
            Self::ListObjects => "ListObjects",
            Self::ListObjectsV2 => "ListObjectsV2",
            Self::DeleteObjects => "DeleteObjects",
            Self::PutObject => "PutObject",
            Self::CopyObject => "CopyObject",
            Self::GetObject => "GetObject",
            Self::HeadObject => "HeadObject",
            Self::DeleteObject => "DeleteObject",
        }
    }

    /// Whether this operation mutates backend state.
    ///
    /// Used to reject writes against a read-only provider before touching
    /// the backend.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::CreateBucket
                | Self::DeleteBucket
                | Self::DeleteObjects
                | Self::PutObject
                | Self::CopyObject
                | Self::DeleteObject
        )
    }
}

impl fmt::Display for S3Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_classify_mutations() {
        assert!(S3Operation::PutObject.is_mutation());
        assert!(S3Operation::DeleteBucket.is_mutation());
        assert!(!S3Operation::GetObject.is_mutation());
        assert!(!S3Operation::ListBuckets.is_mutation());
        assert!(!S3Operation::HeadObject.is_mutation());
    }

    #[test]
    fn test_should_display_operation_name() {
        assert_eq!(S3Operation::ListObjectsV2.to_string(), "ListObjectsV2");
    }
}
