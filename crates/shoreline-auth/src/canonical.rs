//! Canonical request construction for AWS Signature Version 4.
//!
//! The canonical request is the byte string both sides hash and sign:
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n\n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! Path segments are percent-encoded once (the S3-compatible rule; the
//! double-encode variant applies only to non-S3 services). Query parameter
//! bytes are preserved exactly as the client sent them, because clients
//! disagree about which characters to encode and the server must reproduce
//! whatever encoding was signed.

use std::collections::BTreeMap;

use http::HeaderMap;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::AuthError;

/// Characters percent-encoded in URI path segments: everything except the
/// RFC 3986 unreserved set. `/` never reaches the encoder because paths are
/// split into segments first.
const SEGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Assemble the full canonical request string.
#[must_use]
pub fn canonical_request(
    method: &str,
    path: &str,
    query: &str,
    headers: &HeaderMap,
    signed_headers: &[String],
    payload_hash: &str,
) -> String {
    let uri = canonical_uri(path);
    let query = canonical_query_string(query);
    let header_block = canonical_headers(headers, signed_headers);
    let signed = signed_headers_line(signed_headers);

    format!("{method}\n{uri}\n{query}\n{header_block}\n\n{signed}\n{payload_hash}")
}

/// Canonicalize the URI path: decode each segment, then re-encode it once.
///
/// Decoding first keeps already-encoded and raw paths canonically identical,
/// so `/hello world` and `/hello%20world` sign the same bytes.
///
/// # Examples
///
/// ```
/// use shoreline_auth::canonical::canonical_uri;
///
/// assert_eq!(canonical_uri(""), "/");
/// assert_eq!(canonical_uri("/a b/c"), "/a%20b/c");
/// assert_eq!(canonical_uri("/a%20b/c"), "/a%20b/c");
/// ```
#[must_use]
pub fn canonical_uri(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_owned();
    }

    path.split('/')
        .map(|segment| {
            let decoded = percent_decode_str(segment).decode_utf8_lossy();
            utf8_percent_encode(&decoded, SEGMENT_ENCODE_SET).to_string()
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Canonicalize the query string: split into pairs, sort by name then value,
/// rejoin. Raw bytes are preserved (no decode/re-encode round trip).
///
/// # Examples
///
/// ```
/// use shoreline_auth::canonical::canonical_query_string;
///
/// assert_eq!(canonical_query_string("b=2&a=1"), "a=1&b=2");
/// assert_eq!(canonical_query_string("acl"), "acl=");
/// ```
#[must_use]
pub fn canonical_query_string(query: &str) -> String {
    let mut pairs: Vec<(&str, &str)> = query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|p| p.split_once('=').unwrap_or((p, "")))
        .collect();

    pairs.sort_unstable();

    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the canonical headers block for the signed header names.
///
/// Names are lowercased, values trimmed with internal whitespace collapsed,
/// duplicate headers comma-joined, and the block sorted by name. Only the
/// headers listed in `signed_headers` appear.
#[must_use]
pub fn canonical_headers(headers: &HeaderMap, signed_headers: &[String]) -> String {
    let mut by_name: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let name = name.as_str().to_ascii_lowercase();
        let value = collapse_whitespace(value.to_str().unwrap_or("").trim());
        by_name
            .entry(name)
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    let mut names: Vec<&str> = signed_headers.iter().map(String::as_str).collect();
    names.sort_unstable();

    names
        .iter()
        .filter_map(|name| by_name.get(*name).map(|value| format!("{name}:{value}")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the `SignedHeaders` line: sorted, semicolon-joined.
#[must_use]
pub fn signed_headers_line(signed_headers: &[String]) -> String {
    let mut names: Vec<&str> = signed_headers.iter().map(String::as_str).collect();
    names.sort_unstable();
    names.join(";")
}

/// Ensure every signed header is actually present on the request.
///
/// # Errors
///
/// Returns [`AuthError::MissingHeader`] naming the first absent header.
pub fn require_signed_headers(headers: &HeaderMap, signed: &[String]) -> Result<(), AuthError> {
    for name in signed {
        if !headers.contains_key(name.as_str()) {
            return Err(AuthError::MissingHeader(name.clone()));
        }
    }
    Ok(())
}

fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_gap = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !in_gap {
                out.push(' ');
                in_gap = true;
            }
        } else {
            out.push(ch);
            in_gap = false;
        }
    }
    out
}
