//! The storage provider contract.
//!
//! One capability set, implemented per backend and injected into the
//! request dispatcher at startup as `Arc<dyn StorageProvider>`. Bodies flow
//! as chunked byte streams in both directions so providers can bound memory
//! and tee hashes while writing.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use shoreline_model::types::DeleteOutcome;
use shoreline_model::{Bucket, ObjectInfo, ObjectPage, UserMetadata};

use crate::error::StoreError;

/// A chunked byte stream flowing into or out of a provider.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Wrap a fully buffered body as a [`ByteStream`].
#[must_use]
pub fn stream_from_bytes(body: Bytes) -> ByteStream {
    stream::once(async move { Ok(body) }).boxed()
}

/// Collect a [`ByteStream`] into memory. Test and small-body helper.
///
/// # Errors
///
/// Propagates the first stream error.
pub async fn collect_stream(mut body: ByteStream) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    while let Some(chunk) = body.next().await {
        out.extend_from_slice(&chunk?);
    }
    Ok(out)
}

/// A client-requested byte range, before resolution against the object size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=start-end`, both inclusive.
    FromTo(u64, u64),
    /// `bytes=start-`.
    From(u64),
    /// `bytes=-suffix`: the last `suffix` bytes.
    Suffix(u64),
}

impl ByteRange {
    /// Resolve against an object size into inclusive `(start, end)` offsets.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RangeNotSatisfiable`] when the range selects no
    /// bytes of the object.
    pub fn resolve(self, size: u64) -> Result<(u64, u64), StoreError> {
        if size == 0 {
            return Err(StoreError::RangeNotSatisfiable { size });
        }
        match self {
            Self::FromTo(start, end) => {
                if start > end || start >= size {
                    return Err(StoreError::RangeNotSatisfiable { size });
                }
                Ok((start, end.min(size - 1)))
            }
            Self::From(start) => {
                if start >= size {
                    return Err(StoreError::RangeNotSatisfiable { size });
                }
                Ok((start, size - 1))
            }
            Self::Suffix(suffix) => {
                if suffix == 0 {
                    return Err(StoreError::RangeNotSatisfiable { size });
                }
                Ok((size.saturating_sub(suffix), size - 1))
            }
        }
    }
}

/// Options accompanying a PutObject body.
#[derive(Debug, Clone)]
pub struct PutOptions {
    /// The object's content type.
    pub content_type: String,
    /// User metadata, already stripped of the wire prefix.
    pub user_metadata: UserMetadata,
    /// Lowercase hex MD5 the client declared via Content-MD5, if any.
    /// A mismatch against the streamed body fails the write with BadDigest.
    pub expected_md5: Option<String>,
}

impl Default for PutOptions {
    fn default() -> Self {
        Self {
            content_type: shoreline_model::types::DEFAULT_CONTENT_TYPE.to_owned(),
            user_metadata: UserMetadata::new(),
            expected_md5: None,
        }
    }
}

/// Listing parameters, already normalized by the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    /// Only keys beginning with this prefix are listed.
    pub prefix: String,
    /// Keys sharing a prefix up to the first delimiter past `prefix` are
    /// rolled into common prefixes. Empty disables grouping.
    pub delimiter: String,
    /// Resume strictly after this key (decoded marker or continuation token).
    pub start_after: String,
    /// Page size, already capped at 1000.
    pub max_keys: usize,
}

/// The result of a GetObject call.
pub struct GetObjectResult {
    /// Full object metadata (size is the complete object size, not the
    /// range length).
    pub info: ObjectInfo,
    /// The resolved inclusive byte range when one was requested.
    pub range: Option<(u64, u64)>,
    /// The payload bytes, limited to the range when one was requested.
    pub body: ByteStream,
}

/// The contract every storage backend satisfies.
///
/// Object-safe so the dispatcher can hold `Arc<dyn StorageProvider>`.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// List all buckets in name order.
    async fn list_buckets(&self) -> Result<Vec<Bucket>, StoreError>;

    /// Create a bucket. Fails with [`StoreError::BucketAlreadyExists`] if
    /// it already exists.
    async fn create_bucket(&self, bucket: &str) -> Result<Bucket, StoreError>;

    /// Delete an empty bucket. Fails with [`StoreError::BucketNotEmpty`]
    /// when objects remain, [`StoreError::BucketNotFound`] when absent.
    async fn delete_bucket(&self, bucket: &str) -> Result<(), StoreError>;

    /// Existence probe.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError>;

    /// Store an object, streaming the body while hashing it. The returned
    /// metadata carries the authoritative MD5 ETag.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        opts: PutOptions,
    ) -> Result<ObjectInfo, StoreError>;

    /// Fetch an object's metadata and payload, optionally range-limited.
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> Result<GetObjectResult, StoreError>;

    /// Fetch an object's metadata alone.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo, StoreError>;

    /// Delete an object. Deleting an absent key succeeds (idempotent).
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError>;

    /// Delete a batch of keys, reporting a per-key outcome in input order.
    async fn delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> Result<Vec<DeleteOutcome>, StoreError>;

    /// Copy an object. When source and destination coincide, only metadata
    /// is refreshed.
    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<ObjectInfo, StoreError>;

    /// List one page of a bucket, keys in lexicographic UTF-8 order.
    async fn list_objects(
        &self,
        bucket: &str,
        params: &ListParams,
    ) -> Result<ObjectPage, StoreError>;

    /// Whether write operations are disabled for this provider.
    fn is_readonly(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_resolve_explicit_ranges() {
        assert_eq!(ByteRange::FromTo(0, 0).resolve(2).unwrap(), (0, 0));
        assert_eq!(ByteRange::FromTo(0, 499).resolve(1000).unwrap(), (0, 499));
        // End clamps to the last byte.
        assert_eq!(ByteRange::FromTo(500, 9999).resolve(1000).unwrap(), (500, 999));
    }

    #[test]
    fn test_should_resolve_open_and_suffix_ranges() {
        assert_eq!(ByteRange::From(500).resolve(1000).unwrap(), (500, 999));
        assert_eq!(ByteRange::Suffix(500).resolve(1000).unwrap(), (500, 999));
        // Oversized suffix selects the whole object.
        assert_eq!(ByteRange::Suffix(5000).resolve(1000).unwrap(), (0, 999));
    }

    #[test]
    fn test_should_reject_unsatisfiable_ranges() {
        assert!(ByteRange::From(1000).resolve(1000).is_err());
        assert!(ByteRange::FromTo(5, 2).resolve(1000).is_err());
        assert!(ByteRange::Suffix(0).resolve(1000).is_err());
        assert!(ByteRange::FromTo(0, 0).resolve(0).is_err());
    }

    #[tokio::test]
    async fn test_should_round_trip_byte_streams() {
        let stream = stream_from_bytes(Bytes::from_static(b"hello"));
        let collected = collect_stream(stream).await.unwrap();
        assert_eq!(collected, b"hello");
    }
}
