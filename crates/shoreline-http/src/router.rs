//! Request canonicalization and operation identification.
//!
//! The router turns a raw HTTP request into a normalized view: the bucket
//! (from the first path segment, or the Host prefix in virtual-host style),
//! the percent-decoded key with `/` preserved, the deduplicated query map
//! (bare parameters like `?delete` keep an empty value), and the identified
//! operation.
//!
//! Keys are bounded at canonicalization time: a decoded key containing NUL
//! or longer than 1024 bytes never reaches a provider.

use http::Method;
use percent_encoding::percent_decode_str;
use shoreline_model::{S3Error, S3ErrorCode, S3Operation};

/// Query markers for S3 features this gateway does not provide. Routing
/// them to `NotImplemented` keeps probing clients working instead of
/// silently treating the request as a listing or a put.
const UNSUPPORTED_SUBRESOURCES: &[&str] = &[
    "accelerate",
    "acl",
    "attributes",
    "cors",
    "encryption",
    "legal-hold",
    "lifecycle",
    "location",
    "logging",
    "notification",
    "object-lock",
    "ownershipControls",
    "policy",
    "publicAccessBlock",
    "requestPayment",
    "retention",
    "tagging",
    "torrent",
    "uploadId",
    "uploads",
    "versioning",
    "versions",
    "website",
];

/// Routing configuration.
#[derive(Debug, Clone)]
pub struct S3Router {
    /// The base domain for virtual-host-style addressing.
    pub domain: String,
    /// Whether virtual-host-style addressing is enabled.
    pub virtual_hosting: bool,
}

/// The canonicalized view of one request.
#[derive(Debug, Clone)]
pub struct RoutingContext {
    /// The resolved bucket name, if any.
    pub bucket: Option<String>,
    /// The resolved, percent-decoded object key, if any.
    pub key: Option<String>,
    /// The identified operation.
    pub operation: S3Operation,
    /// Deduplicated query parameters in request order.
    pub query_params: Vec<(String, String)>,
}

impl RoutingContext {
    /// Look up a query parameter value by name.
    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether a query parameter is present (including bare markers).
    #[must_use]
    pub fn has_query(&self, name: &str) -> bool {
        self.query_params.iter().any(|(k, _)| k == name)
    }
}

impl S3Router {
    /// Create a router.
    #[must_use]
    pub fn new(domain: impl Into<String>, virtual_hosting: bool) -> Self {
        Self {
            domain: domain.into(),
            virtual_hosting,
        }
    }

    /// Canonicalize a request and identify its operation.
    ///
    /// # Errors
    ///
    /// Returns an [`S3Error`] for oversized or NUL-carrying keys,
    /// unsupported methods, and subresources outside the gateway's surface.
    pub fn resolve<B>(&self, req: &http::Request<B>) -> Result<RoutingContext, S3Error> {
        let query_params = parse_query(req.uri().query().unwrap_or(""));

        let vhost_bucket = if self.virtual_hosting {
            host_bucket(req.headers(), &self.domain)
        } else {
            None
        };

        let path = req.uri().path();
        let (bucket, key) = if let Some(bucket) = vhost_bucket {
            // Virtual hosting: the entire path is the key.
            let raw_key = path.strip_prefix('/').unwrap_or(path);
            let key = if raw_key.is_empty() {
                None
            } else {
                Some(decode_key(raw_key)?)
            };
            (Some(bucket), key)
        } else {
            split_path(path)?
        };

        let operation = identify_operation(
            req.method(),
            bucket.is_some(),
            key.is_some(),
            &query_params,
            req.headers(),
        )?;

        Ok(RoutingContext {
            bucket,
            key,
            operation,
            query_params,
        })
    }
}

/// Extract the bucket from a `bucket.domain` Host header, if it matches.
fn host_bucket(headers: &http::HeaderMap, domain: &str) -> Option<String> {
    let host = headers.get(http::header::HOST)?.to_str().ok()?;
    let host = host.split(':').next().unwrap_or(host);

    let suffix = format!(".{domain}");
    let bucket = host.strip_suffix(&suffix)?;
    if bucket.is_empty() {
        None
    } else {
        Some(bucket.to_owned())
    }
}

/// Split a path-style URI into bucket and key.
fn split_path(path: &str) -> Result<(Option<String>, Option<String>), S3Error> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return Ok((None, None));
    }

    match trimmed.split_once('/') {
        Some((bucket, rest)) => {
            let key = if rest.is_empty() {
                None
            } else {
                Some(decode_key(rest)?)
            };
            Ok((Some(decode_component(bucket)), key))
        }
        None => Ok((Some(decode_component(trimmed)), None)),
    }
}

/// Percent-decode a key, enforcing the NUL and length bounds.
fn decode_key(raw: &str) -> Result<String, S3Error> {
    let key = decode_component(raw);
    shoreline_model::validate_object_key(&key)?;
    Ok(key)
}

fn decode_component(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Parse a query string, deduplicating by name (first occurrence wins) and
/// keeping bare markers with empty values.
fn parse_query(query: &str) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = Vec::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = match pair.split_once('=') {
            Some((name, value)) => (decode_component(name), decode_component(value)),
            None => (decode_component(pair), String::new()),
        };
        if !params.iter().any(|(existing, _)| *existing == name) {
            params.push((name, value));
        }
    }
    params
}

fn has(params: &[(String, String)], name: &str) -> bool {
    params.iter().any(|(k, _)| k == name)
}

fn value<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

fn first_unsupported(params: &[(String, String)]) -> Option<&str> {
    UNSUPPORTED_SUBRESOURCES
        .iter()
        .copied()
        .find(|name| has(params, name))
}

/// The operation table: (method, bucket?, key?, query markers, headers).
fn identify_operation(
    method: &Method,
    has_bucket: bool,
    has_key: bool,
    params: &[(String, String)],
    headers: &http::HeaderMap,
) -> Result<S3Operation, S3Error> {
    match (method, has_bucket, has_key) {
        (&Method::GET, false, false) => Ok(S3Operation::ListBuckets),

        (method, true, false) => bucket_operation(method, params),
        (method, true, true) => object_operation(method, params, headers),

        (_, false, true) => Err(S3Error::with_message(
            S3ErrorCode::InvalidRequest,
            "Object key specified without bucket",
        )),
        (_, false, false) => Err(S3Error::method_not_allowed(method.as_str())),
    }
}

fn bucket_operation(
    method: &Method,
    params: &[(String, String)],
) -> Result<S3Operation, S3Error> {
    if let Some(subresource) = first_unsupported(params) {
        // `?delete` is ours; everything else on a bucket is out of surface.
        if !(method == Method::POST && subresource == "delete") {
            return Err(S3Error::not_implemented(subresource));
        }
    }

    match *method {
        Method::GET => {
            if value(params, "list-type") == Some("2") {
                Ok(S3Operation::ListObjectsV2)
            } else {
                Ok(S3Operation::ListObjects)
            }
        }
        Method::PUT => Ok(S3Operation::CreateBucket),
        Method::DELETE => Ok(S3Operation::DeleteBucket),
        Method::HEAD => Ok(S3Operation::HeadBucket),
        Method::POST => {
            if has(params, "delete") {
                Ok(S3Operation::DeleteObjects)
            } else {
                Err(S3Error::method_not_allowed("POST"))
            }
        }
        _ => Err(S3Error::method_not_allowed(method.as_str())),
    }
}

fn object_operation(
    method: &Method,
    params: &[(String, String)],
    headers: &http::HeaderMap,
) -> Result<S3Operation, S3Error> {
    if let Some(subresource) = first_unsupported(params) {
        return Err(S3Error::not_implemented(subresource));
    }

    match *method {
        Method::GET => Ok(S3Operation::GetObject),
        Method::HEAD => Ok(S3Operation::HeadObject),
        Method::DELETE => Ok(S3Operation::DeleteObject),
        Method::PUT => {
            if headers.contains_key("x-amz-copy-source") {
                Ok(S3Operation::CopyObject)
            } else {
                Ok(S3Operation::PutObject)
            }
        }
        _ => Err(S3Error::method_not_allowed(method.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use http::Request;

    use super::*;

    fn router() -> S3Router {
        S3Router::new("s3.localhost", true)
    }

    fn path_router() -> S3Router {
        S3Router::new("s3.localhost", false)
    }

    fn request(method: Method, uri: &str) -> Request<()> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("Host", "s3.localhost:10001")
            .body(())
            .expect("valid request")
    }

    #[test]
    fn test_should_route_service_listing() {
        let ctx = path_router().resolve(&request(Method::GET, "/")).unwrap();
        assert!(ctx.bucket.is_none());
        assert_eq!(ctx.operation, S3Operation::ListBuckets);
    }

    #[test]
    fn test_should_route_bucket_operations() {
        let cases = [
            (Method::PUT, S3Operation::CreateBucket),
            (Method::DELETE, S3Operation::DeleteBucket),
            (Method::HEAD, S3Operation::HeadBucket),
            (Method::GET, S3Operation::ListObjects),
        ];
        for (method, expected) in cases {
            let ctx = path_router().resolve(&request(method, "/b1")).unwrap();
            assert_eq!(ctx.bucket.as_deref(), Some("b1"));
            assert!(ctx.key.is_none());
            assert_eq!(ctx.operation, expected);
        }
    }

    #[test]
    fn test_should_route_listing_variants() {
        let ctx = path_router()
            .resolve(&request(Method::GET, "/b1?list-type=2&prefix=p&delimiter=%2F"))
            .unwrap();
        assert_eq!(ctx.operation, S3Operation::ListObjectsV2);
        assert_eq!(ctx.query("prefix"), Some("p"));
        assert_eq!(ctx.query("delimiter"), Some("/"));

        let ctx = path_router()
            .resolve(&request(Method::GET, "/b1?prefix=p"))
            .unwrap();
        assert_eq!(ctx.operation, S3Operation::ListObjects);
    }

    #[test]
    fn test_should_route_object_operations() {
        let cases = [
            (Method::PUT, S3Operation::PutObject),
            (Method::GET, S3Operation::GetObject),
            (Method::HEAD, S3Operation::HeadObject),
            (Method::DELETE, S3Operation::DeleteObject),
        ];
        for (method, expected) in cases {
            let ctx = path_router().resolve(&request(method, "/b1/a/b.txt")).unwrap();
            assert_eq!(ctx.bucket.as_deref(), Some("b1"));
            assert_eq!(ctx.key.as_deref(), Some("a/b.txt"));
            assert_eq!(ctx.operation, expected);
        }
    }

    #[test]
    fn test_should_route_copy_object_by_header() {
        let req = Request::builder()
            .method(Method::PUT)
            .uri("/b1/dst.txt")
            .header("Host", "s3.localhost:10001")
            .header("x-amz-copy-source", "/src-bucket/src.txt")
            .body(())
            .unwrap();
        let ctx = path_router().resolve(&req).unwrap();
        assert_eq!(ctx.operation, S3Operation::CopyObject);
    }

    #[test]
    fn test_should_route_delete_objects_post() {
        let ctx = path_router()
            .resolve(&request(Method::POST, "/b1?delete"))
            .unwrap();
        assert_eq!(ctx.operation, S3Operation::DeleteObjects);
        assert_eq!(ctx.query("delete"), Some(""));
    }

    #[test]
    fn test_should_resolve_virtual_host_bucket() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/my/key.txt")
            .header("Host", "photos.s3.localhost:10001")
            .body(())
            .unwrap();
        let ctx = router().resolve(&req).unwrap();
        assert_eq!(ctx.bucket.as_deref(), Some("photos"));
        assert_eq!(ctx.key.as_deref(), Some("my/key.txt"));
        assert_eq!(ctx.operation, S3Operation::GetObject);
    }

    #[test]
    fn test_should_ignore_host_when_virtual_hosting_disabled() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header("Host", "photos.s3.localhost:10001")
            .body(())
            .unwrap();
        let ctx = path_router().resolve(&req).unwrap();
        assert!(ctx.bucket.is_none());
        assert_eq!(ctx.operation, S3Operation::ListBuckets);
    }

    #[test]
    fn test_should_decode_percent_encoded_keys() {
        let ctx = path_router()
            .resolve(&request(Method::GET, "/b1/my%20file%2Bplus.txt"))
            .unwrap();
        assert_eq!(ctx.key.as_deref(), Some("my file+plus.txt"));
    }

    #[test]
    fn test_should_reject_oversized_keys() {
        let long = "k".repeat(1025);
        let err = path_router()
            .resolve(&request(Method::GET, &format!("/b1/{long}")))
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::KeyTooLongError);
    }

    #[test]
    fn test_should_reject_nul_in_keys() {
        let err = path_router()
            .resolve(&request(Method::GET, "/b1/bad%00key"))
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_should_refuse_unsupported_subresources() {
        for uri in ["/b1?acl", "/b1?versioning", "/b1/k?tagging", "/b1/k?uploads"] {
            let err = path_router().resolve(&request(Method::GET, uri)).unwrap_err();
            assert_eq!(err.code, S3ErrorCode::NotImplemented, "uri {uri}");
        }
    }

    #[test]
    fn test_should_reject_unsupported_methods() {
        let err = path_router()
            .resolve(&request(Method::PATCH, "/b1"))
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::MethodNotAllowed);
    }

    #[test]
    fn test_should_keep_bare_query_markers() {
        let params = parse_query("delete&prefix=x");
        assert_eq!(params.len(), 2);
        assert!(has(&params, "delete"));
        assert_eq!(value(&params, "delete"), Some(""));
    }

    #[test]
    fn test_should_deduplicate_query_parameters() {
        let params = parse_query("prefix=a&prefix=b");
        assert_eq!(params.len(), 1);
        assert_eq!(value(&params, "prefix"), Some("a"));
    }
}
