//! Typed extraction of request parameters.
//!
//! Listing options, range headers, conditional headers, user metadata, and
//! the copy-source header all arrive as loosely-typed strings; this module
//! turns them into the values the gateway and providers consume.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use shoreline_model::{S3Error, S3ErrorCode, UserMetadata};
use shoreline_store::{ByteRange, ListParams};

use crate::router::RoutingContext;

/// Default and maximum page size for listings.
pub const MAX_KEYS_CAP: usize = 1000;

/// Wire prefix of user metadata headers.
const META_PREFIX: &str = "x-amz-meta-";

/// Listing parameters plus the wire fields echoed back in responses.
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    /// Normalized provider parameters.
    pub params: ListParams,
    /// The raw `marker` (v1), echoed back.
    pub marker: String,
    /// The raw `continuation-token` (v2), echoed back.
    pub continuation_token: Option<String>,
    /// The raw `delimiter`, echoed back when present.
    pub delimiter: Option<String>,
    /// The effective max-keys after capping.
    pub max_keys: u32,
}

/// Parse listing parameters for v1 (`marker`) or v2 (`continuation-token`,
/// `start-after`) semantics.
///
/// # Errors
///
/// Returns `InvalidArgument` for unparseable `max-keys` or a continuation
/// token that is not base64 of a key.
pub fn parse_list_request(ctx: &RoutingContext, v2: bool) -> Result<ListRequest, S3Error> {
    let prefix = ctx.query("prefix").unwrap_or("").to_owned();
    let delimiter = ctx.query("delimiter").filter(|d| !d.is_empty()).map(ToOwned::to_owned);

    let max_keys = match ctx.query("max-keys") {
        None => MAX_KEYS_CAP,
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| S3Error::invalid_argument("max-keys must be a non-negative integer"))?
            .min(MAX_KEYS_CAP),
    };

    let marker = if v2 { String::new() } else { ctx.query("marker").unwrap_or("").to_owned() };
    let continuation_token = if v2 {
        ctx.query("continuation-token").map(ToOwned::to_owned)
    } else {
        None
    };

    // Resume position: v1 uses the marker key directly; v2 prefers the
    // continuation token (base64 of the last key) over start-after.
    let start_after = if v2 {
        match &continuation_token {
            Some(token) => decode_continuation_token(token)?,
            None => ctx.query("start-after").unwrap_or("").to_owned(),
        }
    } else {
        marker.clone()
    };

    Ok(ListRequest {
        params: ListParams {
            prefix,
            delimiter: delimiter.clone().unwrap_or_default(),
            start_after,
            max_keys,
        },
        marker,
        continuation_token,
        delimiter,
        max_keys: u32::try_from(max_keys).unwrap_or(1000),
    })
}

/// Encode a continuation token: base64 of the last returned key.
#[must_use]
pub fn encode_continuation_token(key: &str) -> String {
    BASE64.encode(key.as_bytes())
}

/// Decode a continuation token back into a key.
///
/// # Errors
///
/// Returns `InvalidArgument` for tokens that are not base64 UTF-8.
pub fn decode_continuation_token(token: &str) -> Result<String, S3Error> {
    let bytes = BASE64
        .decode(token)
        .map_err(|_| S3Error::invalid_argument("The continuation token provided is incorrect"))?;
    String::from_utf8(bytes)
        .map_err(|_| S3Error::invalid_argument("The continuation token provided is incorrect"))
}

/// Parse a `Range` header into a [`ByteRange`].
///
/// Only single ranges are supported. A header that is not `bytes=`-shaped
/// is ignored (`None`), matching S3's lenient treatment; a multi-range or
/// structurally broken `bytes=` header is an error.
///
/// # Errors
///
/// Returns `InvalidRange` for multi-range or malformed `bytes=` values.
pub fn parse_range_header(headers: &http::HeaderMap) -> Result<Option<ByteRange>, S3Error> {
    let Some(raw) = headers.get(http::header::RANGE).and_then(|v| v.to_str().ok()) else {
        return Ok(None);
    };
    let Some(spec) = raw.strip_prefix("bytes=") else {
        return Ok(None);
    };

    if spec.contains(',') {
        return Err(S3Error::invalid_range(raw));
    }

    let range = if let Some(suffix) = spec.strip_prefix('-') {
        let n = suffix.parse().map_err(|_| S3Error::invalid_range(raw))?;
        ByteRange::Suffix(n)
    } else if let Some(start) = spec.strip_suffix('-') {
        let start = start.parse().map_err(|_| S3Error::invalid_range(raw))?;
        ByteRange::From(start)
    } else {
        let (start, end) = spec.split_once('-').ok_or_else(|| S3Error::invalid_range(raw))?;
        let start = start.parse().map_err(|_| S3Error::invalid_range(raw))?;
        let end = end.parse().map_err(|_| S3Error::invalid_range(raw))?;
        ByteRange::FromTo(start, end)
    };

    Ok(Some(range))
}

/// Decode a `Content-MD5` header into lowercase hex.
///
/// # Errors
///
/// Returns `InvalidArgument` when the value is not base64 of 16 bytes.
pub fn parse_content_md5(headers: &http::HeaderMap) -> Result<Option<String>, S3Error> {
    let Some(raw) = headers.get("content-md5").and_then(|v| v.to_str().ok()) else {
        return Ok(None);
    };

    let digest = BASE64
        .decode(raw)
        .map_err(|_| S3Error::invalid_argument("The Content-MD5 you specified was invalid"))?;
    if digest.len() != 16 {
        return Err(S3Error::invalid_argument(
            "The Content-MD5 you specified was invalid",
        ));
    }
    Ok(Some(hex::encode(digest)))
}

/// Collect `x-amz-meta-*` headers into user metadata, keys lowercased and
/// the wire prefix stripped.
#[must_use]
pub fn extract_user_metadata(headers: &http::HeaderMap) -> UserMetadata {
    let mut metadata = UserMetadata::new();
    for (name, value) in headers {
        let name = name.as_str();
        if let Some(suffix) = name.strip_prefix(META_PREFIX) {
            if let Ok(value) = value.to_str() {
                metadata.insert(suffix.to_ascii_lowercase(), value.to_owned());
            }
        }
    }
    metadata
}

/// Parse an `x-amz-copy-source` header into `(bucket, key)`.
///
/// Accepts `/bucket/key` and `bucket/key`; the key is percent-decoded. A
/// `?versionId=` suffix is accepted and ignored (versioning is out of
/// surface).
///
/// # Errors
///
/// Returns `InvalidArgument` when the value has no bucket/key split.
pub fn parse_copy_source(raw: &str) -> Result<(String, String), S3Error> {
    let source = raw.strip_prefix('/').unwrap_or(raw);
    let source = source.split_once('?').map_or(source, |(path, _)| path);

    let (bucket, key) = source.split_once('/').ok_or_else(|| {
        S3Error::invalid_argument("x-amz-copy-source must be in the form bucket/key")
    })?;
    if bucket.is_empty() || key.is_empty() {
        return Err(S3Error::invalid_argument(
            "x-amz-copy-source must name both a bucket and a key",
        ));
    }

    let key = percent_encoding::percent_decode_str(key)
        .decode_utf8()
        .map_err(|_| S3Error::invalid_argument("x-amz-copy-source key is not valid UTF-8"))?
        .into_owned();
    shoreline_model::validate_object_key(&key)?;

    Ok((bucket.to_owned(), key))
}

/// Evaluate `If-Match`/`If-None-Match` against the current ETag.
///
/// Returns `Err(PreconditionFailed)` or `Err(NotModified)` when a condition
/// blocks the request; `NotModified` carries status 304 and renders without
/// a body.
///
/// # Errors
///
/// As described: 412 or 304 as [`S3Error`] values.
pub fn check_conditionals(headers: &http::HeaderMap, etag: &str) -> Result<(), S3Error> {
    if let Some(condition) = headers.get("if-match").and_then(|v| v.to_str().ok()) {
        if !etag_condition_matches(condition, etag) {
            return Err(S3Error::precondition_failed("If-Match"));
        }
    }

    if let Some(condition) = headers.get("if-none-match").and_then(|v| v.to_str().ok()) {
        if etag_condition_matches(condition, etag) {
            return Err(S3Error::new(S3ErrorCode::NotModified));
        }
    }

    Ok(())
}

/// Whether a (possibly comma-separated, possibly `*`) condition value
/// matches the given unquoted ETag.
fn etag_condition_matches(condition: &str, etag: &str) -> bool {
    condition.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || unquote(candidate) == etag
    })
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use shoreline_model::S3Operation;

    use super::*;

    fn ctx(params: &[(&str, &str)]) -> RoutingContext {
        RoutingContext {
            bucket: Some("b1".to_owned()),
            key: None,
            operation: S3Operation::ListObjectsV2,
            query_params: params
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        }
    }

    fn headers(pairs: &[(&str, &str)]) -> http::HeaderMap {
        let mut map = http::HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                http::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                http::header::HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_should_default_and_cap_max_keys() {
        let list = parse_list_request(&ctx(&[]), true).unwrap();
        assert_eq!(list.params.max_keys, 1000);

        let list = parse_list_request(&ctx(&[("max-keys", "5")]), true).unwrap();
        assert_eq!(list.params.max_keys, 5);

        let list = parse_list_request(&ctx(&[("max-keys", "99999")]), true).unwrap();
        assert_eq!(list.params.max_keys, 1000);

        assert!(parse_list_request(&ctx(&[("max-keys", "abc")]), true).is_err());
    }

    #[test]
    fn test_should_resume_from_v1_marker_and_v2_token() {
        let list = parse_list_request(&ctx(&[("marker", "after-me")]), false).unwrap();
        assert_eq!(list.params.start_after, "after-me");

        let token = encode_continuation_token("after-me");
        let list = parse_list_request(&ctx(&[("continuation-token", &token)]), true).unwrap();
        assert_eq!(list.params.start_after, "after-me");

        assert!(parse_list_request(&ctx(&[("continuation-token", "!!!")]), true).is_err());
    }

    #[test]
    fn test_should_round_trip_continuation_tokens() {
        let token = encode_continuation_token("photos/2026/img.jpg");
        assert_eq!(decode_continuation_token(&token).unwrap(), "photos/2026/img.jpg");
    }

    #[test]
    fn test_should_parse_range_forms() {
        let map = headers(&[("range", "bytes=0-0")]);
        assert_eq!(parse_range_header(&map).unwrap(), Some(ByteRange::FromTo(0, 0)));

        let map = headers(&[("range", "bytes=5-")]);
        assert_eq!(parse_range_header(&map).unwrap(), Some(ByteRange::From(5)));

        let map = headers(&[("range", "bytes=-3")]);
        assert_eq!(parse_range_header(&map).unwrap(), Some(ByteRange::Suffix(3)));

        assert_eq!(parse_range_header(&headers(&[])).unwrap(), None);
        // Non-bytes units are ignored, not rejected.
        let map = headers(&[("range", "items=0-5")]);
        assert_eq!(parse_range_header(&map).unwrap(), None);
        // Multi-range is rejected.
        let map = headers(&[("range", "bytes=0-1,3-4")]);
        assert!(parse_range_header(&map).is_err());
    }

    #[test]
    fn test_should_decode_content_md5_to_hex() {
        // base64 of the MD5 of "Hi".
        let map = headers(&[("content-md5", "waUpj5Oeh+j5YqXt/CBpGA==")]);
        assert_eq!(
            parse_content_md5(&map).unwrap().as_deref(),
            Some("c1a5298f939e87e8f962a5edfc206918")
        );

        let map = headers(&[("content-md5", "not-base64!")]);
        assert!(parse_content_md5(&map).is_err());

        // Valid base64 of the wrong length.
        let map = headers(&[("content-md5", "YWJj")]);
        assert!(parse_content_md5(&map).is_err());
    }

    #[test]
    fn test_should_extract_user_metadata() {
        let map = headers(&[
            ("x-amz-meta-Owner", "backup-tool"),
            ("x-amz-meta-mtime", "1700000000"),
            ("content-type", "text/plain"),
        ]);
        let meta = extract_user_metadata(&map);
        assert_eq!(meta.len(), 2);
        assert_eq!(meta.get("owner").map(String::as_str), Some("backup-tool"));
        assert_eq!(meta.get("mtime").map(String::as_str), Some("1700000000"));
    }

    #[test]
    fn test_should_parse_copy_source_forms() {
        assert_eq!(
            parse_copy_source("/src-bucket/a/b.txt").unwrap(),
            ("src-bucket".to_owned(), "a/b.txt".to_owned())
        );
        assert_eq!(
            parse_copy_source("src-bucket/a%20b.txt").unwrap(),
            ("src-bucket".to_owned(), "a b.txt".to_owned())
        );
        assert_eq!(
            parse_copy_source("src-bucket/k?versionId=null").unwrap(),
            ("src-bucket".to_owned(), "k".to_owned())
        );
        assert!(parse_copy_source("just-a-bucket").is_err());
        assert!(parse_copy_source("/bucket/").is_err());
    }

    #[test]
    fn test_should_evaluate_conditionals() {
        let etag = "c1a5298f939e87e8f962a5edfc206918";

        let map = headers(&[("if-match", "\"c1a5298f939e87e8f962a5edfc206918\"")]);
        assert!(check_conditionals(&map, etag).is_ok());

        let map = headers(&[("if-match", "\"other\"")]);
        let err = check_conditionals(&map, etag).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::PreconditionFailed);

        let map = headers(&[("if-none-match", "\"c1a5298f939e87e8f962a5edfc206918\"")]);
        let err = check_conditionals(&map, etag).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::NotModified);

        let map = headers(&[("if-none-match", "*")]);
        let err = check_conditionals(&map, etag).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::NotModified);

        let map = headers(&[("if-none-match", "\"other\"")]);
        assert!(check_conditionals(&map, etag).is_ok());
    }
}
