//! Bucket-name and object-key validation.
//!
//! Bucket names follow the [AWS naming rules](https://docs.aws.amazon.com/AmazonS3/latest/userguide/bucketnamingrules.html)
//! subset this gateway enforces; object keys are bounded byte strings that
//! must survive percent-decoding intact.

use std::net::Ipv4Addr;

use crate::error::{S3Error, S3ErrorCode};

/// Minimum bucket name length.
const MIN_BUCKET_NAME_LEN: usize = 3;

/// Maximum bucket name length.
const MAX_BUCKET_NAME_LEN: usize = 63;

/// Maximum object key length in bytes, after percent-decoding.
pub const MAX_KEY_BYTES: usize = 1024;

/// Validate an S3 bucket name.
///
/// Rules enforced:
/// - 3-63 characters
/// - lowercase letters, digits, hyphens, and dots only
/// - begins and ends with a letter or digit
/// - no consecutive dots, no dot adjacent to a hyphen
/// - not formatted as an IPv4 address
///
/// # Errors
///
/// Returns an [`S3Error`] with code `InvalidBucketName` naming the reason.
///
/// # Examples
///
/// ```
/// use shoreline_model::validate_bucket_name;
///
/// assert!(validate_bucket_name("backups-2026").is_ok());
/// assert!(validate_bucket_name("No").is_err());
/// assert!(validate_bucket_name("-leading").is_err());
/// ```
pub fn validate_bucket_name(name: &str) -> Result<(), S3Error> {
    let invalid = |reason: &str| {
        S3Error::with_message(
            S3ErrorCode::InvalidBucketName,
            format!("Bucket name {name:?} is invalid: {reason}"),
        )
        .with_resource(name)
    };

    if !(MIN_BUCKET_NAME_LEN..=MAX_BUCKET_NAME_LEN).contains(&name.len()) {
        return Err(invalid("must be between 3 and 63 characters long"));
    }

    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return Err(invalid(
            "only lowercase letters, digits, hyphens, and dots are allowed",
        ));
    }

    let bytes = name.as_bytes();
    let first = bytes[0];
    let last = bytes[bytes.len() - 1];
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return Err(invalid("must begin and end with a letter or digit"));
    }

    if name.contains("..") {
        return Err(invalid("must not contain consecutive dots"));
    }

    if name.contains(".-") || name.contains("-.") {
        return Err(invalid("dots must not be adjacent to hyphens"));
    }

    if name.parse::<Ipv4Addr>().is_ok() {
        return Err(invalid("must not be formatted as an IP address"));
    }

    Ok(())
}

/// Validate an object key after percent-decoding.
///
/// Keys must be 1-1024 bytes and must not contain a NUL byte.
///
/// # Errors
///
/// Returns `KeyTooLongError` for oversized keys and `InvalidArgument` for
/// empty keys or keys containing NUL.
pub fn validate_object_key(key: &str) -> Result<(), S3Error> {
    if key.is_empty() {
        return Err(S3Error::invalid_argument("Object key must not be empty"));
    }

    if key.len() > MAX_KEY_BYTES {
        return Err(
            S3Error::with_message(
                S3ErrorCode::KeyTooLongError,
                format!(
                    "Object key is {} bytes; the maximum is {MAX_KEY_BYTES}",
                    key.len()
                ),
            )
            .with_resource(key),
        );
    }

    if key.contains('\0') {
        return Err(S3Error::invalid_argument("Object key must not contain NUL bytes"));
    }

    Ok(())
}
