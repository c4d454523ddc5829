//! Provider error taxonomy.
//!
//! Every backend failure is expressed as a [`StoreError`] and mapped onto
//! the S3 error code table at the HTTP boundary.

use shoreline_model::{S3Error, S3ErrorCode};

/// Errors produced by storage providers and the MD5 cache.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The bucket does not exist.
    #[error("bucket {0:?} does not exist")]
    BucketNotFound(String),

    /// The bucket already exists (single-tenant, so always owned by the caller).
    #[error("bucket {0:?} already exists")]
    BucketAlreadyExists(String),

    /// The bucket still contains objects.
    #[error("bucket {0:?} is not empty")]
    BucketNotEmpty(String),

    /// The object does not exist.
    #[error("object {bucket}/{key} does not exist")]
    ObjectNotFound {
        /// The bucket name.
        bucket: String,
        /// The object key.
        key: String,
    },

    /// The key cannot be mapped onto this backend.
    #[error("invalid object key {0:?}: {1}")]
    InvalidKey(String, String),

    /// The streamed body's MD5 does not match the client's declared digest.
    #[error("digest mismatch: expected {expected}, computed {computed}")]
    DigestMismatch {
        /// The digest the client declared.
        expected: String,
        /// The digest computed from the streamed body.
        computed: String,
    },

    /// The requested range cannot be satisfied against the object size.
    #[error("unsatisfiable range for object of {size} bytes")]
    RangeNotSatisfiable {
        /// The object's total size.
        size: u64,
    },

    /// A write was attempted against a read-only provider.
    #[error("provider is read-only")]
    ReadOnly,

    /// The backend is temporarily unreachable (timeouts, connection loss).
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Local filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// MD5 cache failure.
    #[error("cache error: {0}")]
    Cache(#[from] sqlx::Error),

    /// Unrecoverable backend state (corrupt sidecars, protocol violations).
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for S3Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::BucketNotFound(bucket) => S3Error::no_such_bucket(bucket),
            StoreError::BucketAlreadyExists(bucket) => {
                S3Error::bucket_already_owned_by_you(bucket)
            }
            StoreError::BucketNotEmpty(bucket) => S3Error::bucket_not_empty(bucket),
            StoreError::ObjectNotFound { bucket, key } => {
                S3Error::no_such_key(format!("{bucket}/{key}"))
            }
            StoreError::InvalidKey(key, reason) => {
                S3Error::invalid_argument(format!("invalid key {key:?}: {reason}"))
            }
            StoreError::DigestMismatch { expected, computed } => S3Error::with_message(
                S3ErrorCode::BadDigest,
                format!("expected MD5 {expected}, received body hashed to {computed}"),
            ),
            StoreError::RangeNotSatisfiable { size } => {
                S3Error::invalid_range(format!("object is {size} bytes"))
            }
            StoreError::ReadOnly => S3Error::access_denied("read-only backend"),
            StoreError::Unavailable(detail) => S3Error::service_unavailable(detail),
            StoreError::Io(err) => S3Error::internal_error(err.to_string()).with_source(err),
            StoreError::Cache(err) => S3Error::internal_error(err.to_string()).with_source(err),
            StoreError::Internal(detail) => S3Error::internal_error(detail),
        }
    }
}
