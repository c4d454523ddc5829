//! Authentication glue: scheme selection and payload verification.
//!
//! Chooses among SigV4 header auth, SigV2 header auth, and the two
//! presigned-URL forms; cross-checks `x-amz-content-sha256` against the
//! collected body; and decodes aws-chunked payloads so only the chunk
//! bytes reach the dispatcher.

use bytes::Bytes;
use shoreline_auth::{
    decode_chunked_body, hash_payload, is_presigned_v2, is_presigned_v4, is_sigv2, is_sigv4,
    verify_presigned_v2, verify_presigned_v4, verify_sigv2, verify_sigv4, AuthError,
    ChunkVerifier, StaticCredentials,
};
use shoreline_model::{S3Error, S3ErrorCode};
use tracing::debug;

/// Sentinel for unsigned payloads.
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Sentinel for aws-chunked payloads.
const STREAMING_PAYLOAD: &str = "STREAMING-AWS4-HMAC-SHA256-PAYLOAD";

/// Per-request authenticator over the process credential pair.
#[derive(Debug, Clone)]
pub struct RequestAuthenticator {
    credentials: StaticCredentials,
}

impl RequestAuthenticator {
    /// Create an authenticator for the configured credentials.
    #[must_use]
    pub fn new(credentials: StaticCredentials) -> Self {
        Self { credentials }
    }

    /// Authenticate a request, returning the body to dispatch.
    ///
    /// For aws-chunked uploads the returned body is the decoded payload;
    /// otherwise it is the input body unchanged.
    ///
    /// # Errors
    ///
    /// Returns an [`S3Error`] carrying the appropriate S3 auth error code.
    pub fn authenticate(
        &self,
        parts: &http::request::Parts,
        body: Bytes,
    ) -> Result<Bytes, S3Error> {
        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        if let Some(header) = auth_header {
            if is_sigv4(header) {
                return self.authenticate_sigv4(parts, body);
            }
            if is_sigv2(header) {
                verify_sigv2(parts, &self.credentials).map_err(auth_error_to_s3)?;
                return Ok(body);
            }
            return Err(auth_error_to_s3(AuthError::InvalidAuthHeader));
        }

        let query = parts.uri.query().unwrap_or("");
        if is_presigned_v4(query) {
            verify_presigned_v4(parts, &self.credentials).map_err(auth_error_to_s3)?;
            return Ok(body);
        }
        if is_presigned_v2(query) {
            verify_presigned_v2(parts, &self.credentials).map_err(auth_error_to_s3)?;
            return Ok(body);
        }

        Err(auth_error_to_s3(AuthError::MissingAuthHeader))
    }

    fn authenticate_sigv4(
        &self,
        parts: &http::request::Parts,
        body: Bytes,
    ) -> Result<Bytes, S3Error> {
        let declared = parts
            .headers
            .get("x-amz-content-sha256")
            .and_then(|v| v.to_str().ok())
            .unwrap_or(UNSIGNED_PAYLOAD)
            .to_owned();

        // A concrete declared hash must match the body we actually read;
        // reject before anything can become visible.
        if declared != UNSIGNED_PAYLOAD && declared != STREAMING_PAYLOAD {
            let computed = hash_payload(&body);
            if !declared.eq_ignore_ascii_case(&computed) {
                debug!(%declared, %computed, "payload hash mismatch");
                return Err(auth_error_to_s3(AuthError::PayloadHashMismatch));
            }
        }

        let result =
            verify_sigv4(parts, &declared, &self.credentials).map_err(auth_error_to_s3)?;

        match result.streaming {
            Some(ctx) => {
                let mut verifier = ChunkVerifier::new(ctx);
                let decoded =
                    decode_chunked_body(&body, &mut verifier).map_err(auth_error_to_s3)?;
                Ok(Bytes::from(decoded))
            }
            None => Ok(body),
        }
    }
}

/// Map authentication failures onto the S3 error table.
fn auth_error_to_s3(err: AuthError) -> S3Error {
    let code = match &err {
        AuthError::MissingAuthHeader => S3ErrorCode::MissingSecurityHeader,
        AuthError::RequestTimeTooSkewed | AuthError::InvalidDate => {
            S3ErrorCode::RequestTimeTooSkewed
        }
        AuthError::RequestExpired => S3ErrorCode::AccessDenied,
        AuthError::PayloadHashMismatch => S3ErrorCode::XAmzContentSHA256Mismatch,
        AuthError::InvalidChunk(_) => S3ErrorCode::InvalidRequest,
        AuthError::SignatureDoesNotMatch
        | AuthError::ChunkSignatureMismatch
        | AuthError::InvalidAuthHeader
        | AuthError::UnknownAccessKey(_)
        | AuthError::InvalidCredential
        | AuthError::UnsupportedAlgorithm(_)
        | AuthError::MissingQueryParam(_)
        | AuthError::MissingHeader(_) => S3ErrorCode::SignatureDoesNotMatch,
    };

    let mut s3 = S3Error::with_message(code, err.to_string());
    if matches!(err, AuthError::RequestExpired) {
        s3.message = "Request has expired".to_owned();
    }
    s3
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use sha2::{Digest, Sha256};
    use shoreline_auth::canonical::canonical_request;
    use shoreline_auth::sigv4::{build_string_to_sign, compute_signature, derive_signing_key};

    use super::*;

    const ACCESS_KEY: &str = "shoreline";
    const SECRET_KEY: &str = "shoreline-secret";

    fn authenticator() -> RequestAuthenticator {
        RequestAuthenticator::new(StaticCredentials::new(ACCESS_KEY, SECRET_KEY))
    }

    /// Sign a request the way an SDK would and return the built parts.
    fn signed_request(method: &str, uri_path: &str, body: &[u8]) -> http::request::Parts {
        let now = Utc::now();
        let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let payload_hash = hash_payload(body);

        let signed_headers = vec![
            "host".to_owned(),
            "x-amz-content-sha256".to_owned(),
            "x-amz-date".to_owned(),
        ];
        let mut headers = http::HeaderMap::new();
        headers.insert("host", "localhost:10001".parse().unwrap());
        headers.insert("x-amz-content-sha256", payload_hash.parse().unwrap());
        headers.insert("x-amz-date", timestamp.parse().unwrap());

        let canonical = canonical_request(
            method,
            uri_path,
            "",
            &headers,
            &signed_headers,
            &payload_hash,
        );
        let scope = format!("{date}/us-east-1/s3/aws4_request");
        let string_to_sign = build_string_to_sign(
            &timestamp,
            &scope,
            &hex::encode(Sha256::digest(canonical.as_bytes())),
        );
        let key = derive_signing_key(SECRET_KEY, &date, "us-east-1", "s3");
        let signature = compute_signature(&key, &string_to_sign);

        let auth = format!(
            "AWS4-HMAC-SHA256 Credential={ACCESS_KEY}/{date}/us-east-1/s3/aws4_request, \
             SignedHeaders=host;x-amz-content-sha256;x-amz-date, Signature={signature}"
        );

        let (parts, ()) = http::Request::builder()
            .method(method)
            .uri(format!("http://localhost:10001{uri_path}"))
            .header("host", "localhost:10001")
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &timestamp)
            .header(http::header::AUTHORIZATION, auth)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn test_should_accept_signed_request_with_matching_payload() {
        let body = Bytes::from_static(b"Hi");
        let parts = signed_request("PUT", "/b1/hello.txt", b"Hi");
        let out = authenticator().authenticate(&parts, body.clone()).unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn test_should_reject_payload_hash_mismatch() {
        // Signed for "Hi" but carrying different bytes.
        let parts = signed_request("PUT", "/b1/hello.txt", b"Hi");
        let err = authenticator()
            .authenticate(&parts, Bytes::from_static(b"tampered"))
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::XAmzContentSHA256Mismatch);
    }

    #[test]
    fn test_should_require_credentials() {
        let (parts, ()) = http::Request::builder()
            .method("GET")
            .uri("http://localhost:10001/b1")
            .body(())
            .unwrap()
            .into_parts();
        let err = authenticator()
            .authenticate(&parts, Bytes::new())
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::MissingSecurityHeader);
    }

    #[test]
    fn test_should_reject_unknown_auth_scheme() {
        let (parts, ()) = http::Request::builder()
            .method("GET")
            .uri("http://localhost:10001/b1")
            .header(http::header::AUTHORIZATION, "Bearer token")
            .body(())
            .unwrap()
            .into_parts();
        let err = authenticator()
            .authenticate(&parts, Bytes::new())
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::SignatureDoesNotMatch);
    }
}
