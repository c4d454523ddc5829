//! AWS Signature Version 2 verification.
//!
//! SigV2 signs an HMAC-SHA1 over:
//!
//! ```text
//! StringToSign = HTTP-Verb + "\n" +
//!                Content-MD5 + "\n" +
//!                Content-Type + "\n" +
//!                Date + "\n" +
//!                CanonicalizedAmzHeaders +
//!                CanonicalizedResource
//! ```
//!
//! and sends `Authorization: AWS <AWSAccessKeyId>:<Base64(signature)>`.
//! When `x-amz-date` is present it supersedes `Date` and the Date slot in
//! the string to sign is left empty.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::credentials::CredentialProvider;
use crate::error::AuthError;
use crate::sigv4::AuthResult;

type HmacSha1 = Hmac<Sha1>;

/// Maximum tolerated difference between request time and server time.
const MAX_CLOCK_SKEW_SECS: i64 = 15 * 60;

/// Sub-resource query parameters included in the canonicalized resource,
/// in the order prescribed by the SigV2 specification.
const SUB_RESOURCES: &[&str] = &[
    "acl",
    "delete",
    "location",
    "logging",
    "notification",
    "partNumber",
    "policy",
    "requestPayment",
    "torrent",
    "uploadId",
    "uploads",
    "versionId",
    "versioning",
    "versions",
    "website",
];

/// Check whether the `Authorization` header uses the SigV2 scheme.
#[must_use]
pub fn is_sigv2(auth_header: &str) -> bool {
    auth_header.starts_with("AWS ") && !auth_header.starts_with("AWS4-")
}

/// Verify a SigV2-signed request.
///
/// # Errors
///
/// Returns an [`AuthError`] when the header is malformed, the access key is
/// unknown, the date is outside the skew window, or the signature does not
/// match.
pub fn verify_sigv2(
    parts: &http::request::Parts,
    credentials: &dyn CredentialProvider,
) -> Result<AuthResult, AuthError> {
    let auth_header = parts
        .headers
        .get(http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let (access_key_id, provided) = parse_sigv2_header(auth_header)?;

    debug!(access_key_id = %access_key_id, "verifying SigV2 request");

    check_request_date(parts)?;

    let secret_key = credentials.secret_key(&access_key_id)?;
    let string_to_sign = string_to_sign(parts);
    let expected = sign(&secret_key, &string_to_sign);

    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(AuthResult {
            access_key_id,
            region: String::new(),
            service: "s3".to_owned(),
            signed_headers: Vec::new(),
            streaming: None,
        })
    } else {
        debug!(expected = %expected, provided = %provided, "SigV2 signature mismatch");
        Err(AuthError::SignatureDoesNotMatch)
    }
}

/// Parse `AWS <AKID>:<signature>`.
fn parse_sigv2_header(header: &str) -> Result<(String, String), AuthError> {
    let rest = header
        .strip_prefix("AWS ")
        .ok_or(AuthError::InvalidAuthHeader)?;
    let (access_key_id, signature) = rest.split_once(':').ok_or(AuthError::InvalidAuthHeader)?;
    if access_key_id.is_empty() || signature.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok((access_key_id.to_owned(), signature.to_owned()))
}

/// Enforce the 15-minute skew window on the request date.
///
/// The timestamp comes from `x-amz-date` when present, otherwise `Date`.
/// Both RFC 2822 dates and the ISO 8601 basic format are accepted.
fn check_request_date(parts: &http::request::Parts) -> Result<(), AuthError> {
    let raw = header_value(parts, "x-amz-date");
    let raw = if raw.is_empty() {
        header_value(parts, "date")
    } else {
        raw
    };
    if raw.is_empty() {
        return Err(AuthError::InvalidDate);
    }

    let request_time = parse_http_date(&raw).ok_or(AuthError::InvalidDate)?;
    let skew = (Utc::now().naive_utc() - request_time).num_seconds().abs();
    if skew > MAX_CLOCK_SKEW_SECS {
        return Err(AuthError::RequestTimeTooSkewed);
    }
    Ok(())
}

fn parse_http_date(raw: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc2822(raw)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%SZ").ok())
}

/// Build the SigV2 string to sign from the request parts.
fn string_to_sign(parts: &http::request::Parts) -> String {
    let method = parts.method.as_str();
    let content_md5 = header_value(parts, "content-md5");
    let content_type = header_value(parts, "content-type");

    // x-amz-date supersedes Date; the Date slot is then left empty.
    let date = if parts.headers.contains_key("x-amz-date") {
        String::new()
    } else {
        header_value(parts, "date")
    };

    let amz_headers = canonicalized_amz_headers(parts);
    let resource = canonicalized_resource(parts);

    format!("{method}\n{content_md5}\n{content_type}\n{date}\n{amz_headers}{resource}")
}

/// Lowercased, sorted `x-amz-*` headers, one `name:value\n` line each,
/// multi-value headers comma-joined.
fn canonicalized_amz_headers(parts: &http::request::Parts) -> String {
    let mut amz: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &parts.headers {
        let name = name.as_str();
        if name.starts_with("x-amz-") {
            amz.entry(name.to_owned())
                .or_default()
                .push(value.to_str().unwrap_or("").trim().to_owned());
        }
    }

    let mut out = String::new();
    for (name, values) in &amz {
        out.push_str(name);
        out.push(':');
        out.push_str(&values.join(","));
        out.push('\n');
    }
    out
}

/// The request path plus the signed sub-resource parameters, sorted.
fn canonicalized_resource(parts: &http::request::Parts) -> String {
    let path = parts.uri.path();
    let query = parts.uri.query().unwrap_or("");

    let mut sub_params: Vec<(&str, Option<String>)> = Vec::new();
    for param in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = match param.split_once('=') {
            Some((k, v)) if !v.is_empty() => {
                let decoded = percent_encoding::percent_decode_str(v)
                    .decode_utf8_lossy()
                    .into_owned();
                (k, Some(decoded))
            }
            Some((k, _)) => (k, None),
            None => (param, None),
        };
        if SUB_RESOURCES.contains(&key) {
            sub_params.push((key, value));
        }
    }

    sub_params.sort_by(|a, b| a.0.cmp(b.0));

    if sub_params.is_empty() {
        return path.to_owned();
    }

    let joined = sub_params
        .iter()
        .map(|(k, v)| match v {
            Some(v) => format!("{k}={v}"),
            None => (*k).to_owned(),
        })
        .collect::<Vec<_>>()
        .join("&");
    format!("{path}?{joined}")
}

/// Compute `Base64(HMAC-SHA1(secret, string_to_sign))`.
pub(crate) fn sign(secret_key: &str, string_to_sign: &str) -> String {
    let mut mac =
        HmacSha1::new_from_slice(secret_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(string_to_sign.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

fn header_value(parts: &http::request::Parts, name: &str) -> String {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_owned()
}
