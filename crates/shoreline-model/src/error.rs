//! The S3 error taxonomy.
//!
//! [`S3ErrorCode`] enumerates the wire-level error codes the gateway can
//! return, each paired with its default HTTP status and default message.
//! [`S3Error`] is the concrete error value carried through the request path
//! and rendered as the S3 `Error` XML document.

use std::fmt;

/// Well-known S3 error codes served by this gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum S3ErrorCode {
    /// Access denied (also used for expired presigned URLs).
    #[default]
    AccessDenied,
    /// The Content-MD5 or expected digest did not match the received body.
    BadDigest,
    /// The bucket already exists and is owned by the caller.
    BucketAlreadyOwnedByYou,
    /// The bucket still contains objects.
    BucketNotEmpty,
    /// Unrecoverable backend failure.
    InternalError,
    /// A request argument is malformed.
    InvalidArgument,
    /// The bucket name violates the S3 naming rules.
    InvalidBucketName,
    /// The requested byte range cannot be satisfied.
    InvalidRange,
    /// The request is structurally invalid.
    InvalidRequest,
    /// The object key exceeds 1024 bytes.
    KeyTooLongError,
    /// The request XML body could not be parsed.
    MalformedXML,
    /// The HTTP method is not supported for the resource.
    MethodNotAllowed,
    /// The request lacks a Content-Length header.
    MissingContentLength,
    /// Authentication is required but no credentials were supplied.
    MissingSecurityHeader,
    /// The bucket does not exist.
    NoSuchBucket,
    /// The object does not exist.
    NoSuchKey,
    /// The operation is recognized but not provided by this gateway.
    NotImplemented,
    /// Conditional GET/HEAD matched; HTTP 304.
    NotModified,
    /// A request precondition (If-Match and friends) failed.
    PreconditionFailed,
    /// The request timestamp is outside the accepted skew window.
    RequestTimeTooSkewed,
    /// The backend is temporarily unreachable.
    ServiceUnavailable,
    /// The request signature did not verify.
    SignatureDoesNotMatch,
    /// The x-amz-content-sha256 header does not match the body.
    XAmzContentSHA256Mismatch,
}

impl S3ErrorCode {
    /// Returns the wire representation of the error code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::BadDigest => "BadDigest",
            Self::BucketAlreadyOwnedByYou => "BucketAlreadyOwnedByYou",
            Self::BucketNotEmpty => "BucketNotEmpty",
            Self::InternalError => "InternalError",
            Self::InvalidArgument => "InvalidArgument",
            Self::InvalidBucketName => "InvalidBucketName",
            Self::InvalidRange => "InvalidRange",
            Self::InvalidRequest => "InvalidRequest",
            Self::KeyTooLongError => "KeyTooLongError",
            Self::MalformedXML => "MalformedXML",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::MissingContentLength => "MissingContentLength",
            Self::MissingSecurityHeader => "MissingSecurityHeader",
            Self::NoSuchBucket => "NoSuchBucket",
            Self::NoSuchKey => "NoSuchKey",
            Self::NotImplemented => "NotImplemented",
            Self::NotModified => "NotModified",
            Self::PreconditionFailed => "PreconditionFailed",
            Self::RequestTimeTooSkewed => "RequestTimeTooSkewed",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            Self::XAmzContentSHA256Mismatch => "XAmzContentSHA256Mismatch",
        }
    }

    /// Returns the default HTTP status code for this error.
    #[must_use]
    pub fn default_status_code(&self) -> http::StatusCode {
        match self {
            Self::NotModified => http::StatusCode::NOT_MODIFIED,
            Self::BadDigest
            | Self::InvalidArgument
            | Self::InvalidBucketName
            | Self::InvalidRequest
            | Self::KeyTooLongError
            | Self::MalformedXML
            | Self::XAmzContentSHA256Mismatch => http::StatusCode::BAD_REQUEST,
            Self::AccessDenied
            | Self::MissingSecurityHeader
            | Self::RequestTimeTooSkewed
            | Self::SignatureDoesNotMatch => http::StatusCode::FORBIDDEN,
            Self::NoSuchBucket | Self::NoSuchKey => http::StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => http::StatusCode::METHOD_NOT_ALLOWED,
            Self::BucketAlreadyOwnedByYou | Self::BucketNotEmpty => http::StatusCode::CONFLICT,
            Self::MissingContentLength => http::StatusCode::LENGTH_REQUIRED,
            Self::PreconditionFailed => http::StatusCode::PRECONDITION_FAILED,
            Self::InvalidRange => http::StatusCode::RANGE_NOT_SATISFIABLE,
            Self::ServiceUnavailable => http::StatusCode::SERVICE_UNAVAILABLE,
            Self::InternalError => http::StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotImplemented => http::StatusCode::NOT_IMPLEMENTED,
        }
    }

    /// Returns the default message for this error.
    #[must_use]
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::AccessDenied => "Access Denied",
            Self::BadDigest => "The Content-MD5 you specified did not match what we received",
            Self::BucketAlreadyOwnedByYou => {
                "Your previous request to create the named bucket succeeded and you already own it"
            }
            Self::BucketNotEmpty => "The bucket you tried to delete is not empty",
            Self::InternalError => "We encountered an internal error. Please try again.",
            Self::InvalidArgument => "Invalid Argument",
            Self::InvalidBucketName => "The specified bucket is not valid",
            Self::InvalidRange => "The requested range is not satisfiable",
            Self::InvalidRequest => "Invalid Request",
            Self::KeyTooLongError => "Your key is too long",
            Self::MalformedXML => {
                "The XML you provided was not well-formed or did not validate against our published schema"
            }
            Self::MethodNotAllowed => "The specified method is not allowed against this resource",
            Self::MissingContentLength => "You must provide the Content-Length HTTP header",
            Self::MissingSecurityHeader => "Your request is missing a required header",
            Self::NoSuchBucket => "The specified bucket does not exist",
            Self::NoSuchKey => "The specified key does not exist",
            Self::NotImplemented => "A header you provided implies functionality that is not implemented",
            Self::NotModified => "Not Modified",
            Self::PreconditionFailed => {
                "At least one of the pre-conditions you specified did not hold"
            }
            Self::RequestTimeTooSkewed => {
                "The difference between the request time and the server's time is too large"
            }
            Self::ServiceUnavailable => "Please reduce your request rate",
            Self::SignatureDoesNotMatch => {
                "The request signature we calculated does not match the signature you provided"
            }
            Self::XAmzContentSHA256Mismatch => {
                "The provided 'x-amz-content-sha256' header does not match what was computed"
            }
        }
    }
}

impl fmt::Display for S3ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An S3 error response carried through the request path.
#[derive(Debug)]
pub struct S3Error {
    /// The error code.
    pub code: S3ErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The resource that caused the error (bucket or key).
    pub resource: Option<String>,
    /// The HTTP status code to respond with.
    pub status_code: http::StatusCode,
    /// The underlying source error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for S3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for S3Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl S3Error {
    /// Create an error from a code with its default message and status.
    #[must_use]
    pub fn new(code: S3ErrorCode) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: code.default_message().to_owned(),
            code,
            resource: None,
            source: None,
        }
    }

    /// Create an error with a custom message.
    #[must_use]
    pub fn with_message(code: S3ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: message.into(),
            code,
            resource: None,
            source: None,
        }
    }

    /// Attach the resource (bucket or key) that caused this error.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Attach the underlying source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Create a NoSuchBucket error naming the bucket.
    #[must_use]
    pub fn no_such_bucket(bucket: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NoSuchBucket).with_resource(bucket)
    }

    /// Create a NoSuchKey error naming the key.
    #[must_use]
    pub fn no_such_key(key: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NoSuchKey).with_resource(key)
    }

    /// Create a BucketAlreadyOwnedByYou error naming the bucket.
    #[must_use]
    pub fn bucket_already_owned_by_you(bucket: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::BucketAlreadyOwnedByYou).with_resource(bucket)
    }

    /// Create a BucketNotEmpty error naming the bucket.
    #[must_use]
    pub fn bucket_not_empty(bucket: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::BucketNotEmpty).with_resource(bucket)
    }

    /// Create an AccessDenied error naming the resource.
    #[must_use]
    pub fn access_denied(resource: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::AccessDenied).with_resource(resource)
    }

    /// Create an InternalError with a custom message.
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_message(S3ErrorCode::InternalError, message)
    }

    /// Create an InvalidArgument error with a custom message.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::with_message(S3ErrorCode::InvalidArgument, message)
    }

    /// Create an InvalidRange error naming the offending range.
    #[must_use]
    pub fn invalid_range(range: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::InvalidRange).with_resource(range)
    }

    /// Create a MalformedXML error with detail.
    #[must_use]
    pub fn malformed_xml(detail: impl Into<String>) -> Self {
        Self::with_message(S3ErrorCode::MalformedXML, detail)
    }

    /// Create a MethodNotAllowed error naming the method.
    #[must_use]
    pub fn method_not_allowed(method: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::MethodNotAllowed).with_resource(method)
    }

    /// Create a NotImplemented error naming the feature.
    #[must_use]
    pub fn not_implemented(detail: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NotImplemented).with_resource(detail)
    }

    /// Create a PreconditionFailed error naming the condition.
    #[must_use]
    pub fn precondition_failed(condition: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::PreconditionFailed).with_resource(condition)
    }

    /// Create a ServiceUnavailable error with detail.
    #[must_use]
    pub fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::with_message(S3ErrorCode::ServiceUnavailable, detail)
    }
}

/// Create an [`S3Error`] from an error code identifier.
///
/// # Examples
///
/// ```
/// use shoreline_model::s3_error;
/// use shoreline_model::error::S3ErrorCode;
///
/// let err = s3_error!(NoSuchBucket);
/// assert_eq!(err.code, S3ErrorCode::NoSuchBucket);
///
/// let err = s3_error!(InvalidArgument, "max-keys must be a number");
/// assert_eq!(err.message, "max-keys must be a number");
/// ```
#[macro_export]
macro_rules! s3_error {
    ($code:ident) => {
        $crate::error::S3Error::new($crate::error::S3ErrorCode::$code)
    };
    ($code:ident, $msg:expr) => {
        $crate::error::S3Error::with_message($crate::error::S3ErrorCode::$code, $msg)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_map_codes_to_expected_status() {
        assert_eq!(
            S3ErrorCode::NoSuchBucket.default_status_code(),
            http::StatusCode::NOT_FOUND
        );
        assert_eq!(
            S3ErrorCode::BucketNotEmpty.default_status_code(),
            http::StatusCode::CONFLICT
        );
        assert_eq!(
            S3ErrorCode::SignatureDoesNotMatch.default_status_code(),
            http::StatusCode::FORBIDDEN
        );
        assert_eq!(
            S3ErrorCode::InvalidRange.default_status_code(),
            http::StatusCode::RANGE_NOT_SATISFIABLE
        );
        assert_eq!(
            S3ErrorCode::ServiceUnavailable.default_status_code(),
            http::StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_should_render_code_as_wire_string() {
        assert_eq!(S3ErrorCode::BucketAlreadyOwnedByYou.as_str(), "BucketAlreadyOwnedByYou");
        assert_eq!(S3ErrorCode::XAmzContentSHA256Mismatch.as_str(), "XAmzContentSHA256Mismatch");
    }

    #[test]
    fn test_should_build_error_with_resource() {
        let err = S3Error::no_such_bucket("photos");
        assert_eq!(err.code, S3ErrorCode::NoSuchBucket);
        assert_eq!(err.resource.as_deref(), Some("photos"));
        assert_eq!(err.status_code, http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_should_expand_error_macro() {
        let err = s3_error!(PreconditionFailed);
        assert_eq!(err.code, S3ErrorCode::PreconditionFailed);

        let err = s3_error!(BadDigest, "expected abc got def");
        assert_eq!(err.message, "expected abc got def");
        assert_eq!(err.status_code, http::StatusCode::BAD_REQUEST);
    }
}
