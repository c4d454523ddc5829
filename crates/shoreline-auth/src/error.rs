//! Authentication error types.

/// Errors produced while authenticating a request.
///
/// The HTTP layer maps these onto S3 error codes: signature and header
/// failures become `SignatureDoesNotMatch`, timestamp failures become
/// `RequestTimeTooSkewed`, expired presigned URLs become `AccessDenied`,
/// and a missing `Authorization` header becomes `MissingSecurityHeader`.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No `Authorization` header and no presigned query parameters.
    #[error("request carries no authentication information")]
    MissingAuthHeader,

    /// The `Authorization` header could not be parsed.
    #[error("malformed Authorization header")]
    InvalidAuthHeader,

    /// The access key id does not match the configured credential.
    #[error("unknown access key id: {0}")]
    UnknownAccessKey(String),

    /// The computed signature differs from the provided one.
    #[error("signature mismatch")]
    SignatureDoesNotMatch,

    /// The request timestamp is outside the accepted skew window.
    #[error("request time too skewed")]
    RequestTimeTooSkewed,

    /// The request carries no parseable timestamp.
    #[error("missing or malformed request date")]
    InvalidDate,

    /// A presigned URL was used after its expiry.
    #[error("presigned URL has expired")]
    RequestExpired,

    /// A required presigned query parameter is absent or malformed.
    #[error("missing or invalid query parameter: {0}")]
    MissingQueryParam(String),

    /// The presigned algorithm is not `AWS4-HMAC-SHA256`.
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The credential scope string is malformed.
    #[error("malformed credential scope")]
    InvalidCredential,

    /// A signed header is absent from the request.
    #[error("signed header missing from request: {0}")]
    MissingHeader(String),

    /// The body digest does not match `x-amz-content-sha256`.
    #[error("payload hash does not match x-amz-content-sha256")]
    PayloadHashMismatch,

    /// An aws-chunked frame is structurally invalid.
    #[error("malformed aws-chunked frame: {0}")]
    InvalidChunk(String),

    /// An aws-chunked frame's signature does not continue the chain.
    #[error("chunk signature mismatch")]
    ChunkSignatureMismatch,
}
