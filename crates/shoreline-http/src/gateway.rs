//! The gateway handler: routed operations against a storage provider.
//!
//! One [`Gateway`] serves the whole request surface, holding the provider
//! chosen at startup behind `Arc<dyn StorageProvider>`. Preconditions
//! (bucket naming, conditional headers, ranges) are enforced here; storage
//! semantics live in the provider.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use shoreline_model::types::{DeleteOutcome, DEFAULT_CONTENT_TYPE};
use shoreline_model::{validate_bucket_name, S3Error, S3ErrorCode, S3Operation};
use shoreline_store::provider::stream_from_bytes;
use shoreline_store::{PutOptions, StorageProvider};
use shoreline_xml::serialize::{ListBucketResultV1, ListBucketResultV2};
use shoreline_xml::{CopyObjectResult, ListAllMyBucketsResult};
use tracing::{debug, warn};

use crate::body::S3ResponseBody;
use crate::dispatch::S3Handler;
use crate::request::{
    check_conditionals, encode_continuation_token, extract_user_metadata, parse_content_md5,
    parse_copy_source, parse_list_request, parse_range_header,
};
use crate::response::{empty_response, object_headers, xml_response};
use crate::router::RoutingContext;

/// Owner identity reported by ListBuckets for this single-tenant gateway.
const OWNER: &str = "shoreline";

/// The gateway handler over a storage provider.
#[derive(Clone)]
pub struct Gateway {
    provider: Arc<dyn StorageProvider>,
}

impl Gateway {
    /// Create a gateway over the given provider.
    #[must_use]
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self { provider }
    }

    async fn handle(
        &self,
        op: S3Operation,
        parts: http::request::Parts,
        body: Bytes,
        ctx: RoutingContext,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        // Read-only deployments reject mutations before the provider sees
        // them. Providers enforce the same rule at the storage boundary.
        if op.is_mutation() && self.provider.is_readonly() {
            return Err(S3Error::access_denied(op.as_str()));
        }

        match op {
            S3Operation::ListBuckets => self.list_buckets().await,
            S3Operation::CreateBucket => self.create_bucket(&require_bucket(&ctx)?).await,
            S3Operation::DeleteBucket => self.delete_bucket(&require_bucket(&ctx)?).await,
            S3Operation::HeadBucket => self.head_bucket(&require_bucket(&ctx)?).await,
            S3Operation::ListObjects => self.list_objects(&require_bucket(&ctx)?, &ctx, false).await,
            S3Operation::ListObjectsV2 => self.list_objects(&require_bucket(&ctx)?, &ctx, true).await,
            S3Operation::DeleteObjects => {
                self.delete_objects(&require_bucket(&ctx)?, &body).await
            }
            S3Operation::PutObject => {
                self.put_object(&require_bucket(&ctx)?, &require_key(&ctx)?, &parts, body)
                    .await
            }
            S3Operation::CopyObject => {
                self.copy_object(&require_bucket(&ctx)?, &require_key(&ctx)?, &parts)
                    .await
            }
            S3Operation::GetObject => {
                self.get_object(&require_bucket(&ctx)?, &require_key(&ctx)?, &parts)
                    .await
            }
            S3Operation::HeadObject => {
                self.head_object(&require_bucket(&ctx)?, &require_key(&ctx)?, &parts)
                    .await
            }
            S3Operation::DeleteObject => {
                self.delete_object(&require_bucket(&ctx)?, &require_key(&ctx)?).await
            }
        }
    }

    async fn list_buckets(&self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let buckets = self.provider.list_buckets().await?;
        xml_response(&ListAllMyBucketsResult {
            owner_id: OWNER.to_owned(),
            owner_display_name: OWNER.to_owned(),
            buckets,
        })
    }

    async fn create_bucket(&self, bucket: &str) -> Result<http::Response<S3ResponseBody>, S3Error> {
        validate_bucket_name(bucket)?;
        self.provider.create_bucket(bucket).await?;
        http::Response::builder()
            .status(http::StatusCode::OK)
            .header(http::header::LOCATION, format!("/{bucket}"))
            .body(S3ResponseBody::empty())
            .map_err(|err| S3Error::internal_error(err.to_string()))
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<http::Response<S3ResponseBody>, S3Error> {
        self.provider.delete_bucket(bucket).await?;
        empty_response(http::StatusCode::NO_CONTENT)
    }

    async fn head_bucket(&self, bucket: &str) -> Result<http::Response<S3ResponseBody>, S3Error> {
        if self.provider.bucket_exists(bucket).await? {
            empty_response(http::StatusCode::OK)
        } else {
            Err(S3Error::no_such_bucket(bucket))
        }
    }

    async fn list_objects(
        &self,
        bucket: &str,
        ctx: &RoutingContext,
        v2: bool,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let list = parse_list_request(ctx, v2)?;
        let page = self.provider.list_objects(bucket, &list.params).await?;

        debug!(
            bucket,
            prefix = %list.params.prefix,
            count = page.objects.len(),
            truncated = page.is_truncated,
            "listing served"
        );

        if v2 {
            let key_count =
                u32::try_from(page.objects.len() + page.common_prefixes.len()).unwrap_or(0);
            xml_response(&ListBucketResultV2 {
                name: bucket.to_owned(),
                prefix: list.params.prefix,
                delimiter: list.delimiter,
                max_keys: list.max_keys,
                key_count,
                is_truncated: page.is_truncated,
                continuation_token: list.continuation_token,
                next_continuation_token: page
                    .next_key
                    .as_deref()
                    .map(encode_continuation_token),
                contents: page.objects,
                common_prefixes: page.common_prefixes,
            })
        } else {
            xml_response(&ListBucketResultV1 {
                name: bucket.to_owned(),
                prefix: list.params.prefix,
                marker: list.marker,
                delimiter: list.delimiter,
                max_keys: list.max_keys,
                is_truncated: page.is_truncated,
                next_marker: page.next_key,
                contents: page.objects,
                common_prefixes: page.common_prefixes,
            })
        }
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        body: &[u8],
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let request = shoreline_xml::parse_delete_request(body)
            .map_err(|err| S3Error::malformed_xml(err.to_string()))?;

        let keys: Vec<String> = request.objects.iter().map(|o| o.key.clone()).collect();
        for key in &keys {
            shoreline_model::validate_object_key(key)?;
        }

        let outcomes = self.provider.delete_objects(bucket, &keys).await?;
        for outcome in &outcomes {
            if let DeleteOutcome::Failed { code, .. } = outcome {
                warn!(bucket, key = outcome.key(), code = %code, "batch delete entry failed");
            }
        }

        xml_response(&shoreline_xml::serialize::DeleteResult {
            outcomes,
            quiet: request.quiet,
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        parts: &http::request::Parts,
        body: Bytes,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let expected_md5 = parse_content_md5(&parts.headers)?;
        let content_type = parts
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_owned();
        let user_metadata = extract_user_metadata(&parts.headers);

        let info = self
            .provider
            .put_object(
                bucket,
                key,
                stream_from_bytes(body),
                PutOptions {
                    content_type,
                    user_metadata,
                    expected_md5,
                },
            )
            .await?;

        http::Response::builder()
            .status(http::StatusCode::OK)
            .header(http::header::ETAG, info.quoted_etag())
            .body(S3ResponseBody::empty())
            .map_err(|err| S3Error::internal_error(err.to_string()))
    }

    async fn copy_object(
        &self,
        bucket: &str,
        key: &str,
        parts: &http::request::Parts,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let source = parts
            .headers
            .get("x-amz-copy-source")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| S3Error::invalid_argument("x-amz-copy-source header is required"))?;
        let (src_bucket, src_key) = parse_copy_source(source)?;

        let info = self
            .provider
            .copy_object(&src_bucket, &src_key, bucket, key)
            .await?;

        xml_response(&CopyObjectResult {
            etag: info.quoted_etag(),
            last_modified: info.last_modified,
        })
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        parts: &http::request::Parts,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let range = parse_range_header(&parts.headers)?;
        let result = self.provider.get_object(bucket, key, range).await?;
        check_conditionals(&parts.headers, &result.info.etag)?;

        let mut builder = object_headers(http::Response::builder(), &result.info)
            .header(http::header::ACCEPT_RANGES, "bytes");

        builder = match result.range {
            Some((start, end)) => builder
                .status(http::StatusCode::PARTIAL_CONTENT)
                .header(http::header::CONTENT_LENGTH, end - start + 1)
                .header(
                    http::header::CONTENT_RANGE,
                    format!("bytes {start}-{end}/{}", result.info.size),
                ),
            None => builder
                .status(http::StatusCode::OK)
                .header(http::header::CONTENT_LENGTH, result.info.size),
        };

        builder
            .body(S3ResponseBody::streaming(result.body))
            .map_err(|err| S3Error::internal_error(err.to_string()))
    }

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        parts: &http::request::Parts,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let info = self.provider.head_object(bucket, key).await?;
        check_conditionals(&parts.headers, &info.etag)?;

        object_headers(http::Response::builder(), &info)
            .status(http::StatusCode::OK)
            .header(http::header::ACCEPT_RANGES, "bytes")
            .header(http::header::CONTENT_LENGTH, info.size)
            .body(S3ResponseBody::empty())
            .map_err(|err| S3Error::internal_error(err.to_string()))
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        self.provider.delete_object(bucket, key).await?;
        empty_response(http::StatusCode::NO_CONTENT)
    }
}

impl S3Handler for Gateway {
    fn handle_operation(
        &self,
        op: S3Operation,
        parts: http::request::Parts,
        body: Bytes,
        ctx: RoutingContext,
    ) -> Pin<Box<dyn Future<Output = Result<http::Response<S3ResponseBody>, S3Error>> + Send>> {
        let gateway = self.clone();
        Box::pin(async move { gateway.handle(op, parts, body, ctx).await })
    }
}

fn require_bucket(ctx: &RoutingContext) -> Result<String, S3Error> {
    ctx.bucket
        .clone()
        .ok_or_else(|| S3Error::with_message(S3ErrorCode::InvalidRequest, "Bucket name required"))
}

fn require_key(ctx: &RoutingContext) -> Result<String, S3Error> {
    ctx.key
        .clone()
        .ok_or_else(|| S3Error::with_message(S3ErrorCode::InvalidRequest, "Object key required"))
}
