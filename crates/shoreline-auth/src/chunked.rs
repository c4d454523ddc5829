//! aws-chunked streaming payload verification.
//!
//! Clients that declare `x-amz-content-sha256: STREAMING-AWS4-HMAC-SHA256-PAYLOAD`
//! send the body as a sequence of signed frames:
//!
//! ```text
//! <hex-size>;chunk-signature=<sig>\r\n
//! <chunk bytes>\r\n
//! ...
//! 0;chunk-signature=<sig>\r\n
//! \r\n
//! ```
//!
//! Each frame's signature continues a rolling chain seeded by the
//! request-level signature:
//!
//! ```text
//! sig_n = HMAC(kSigning, "AWS4-HMAC-SHA256-PAYLOAD" \n timestamp \n scope
//!                        \n sig_{n-1} \n SHA256("") \n SHA256(chunk_n))
//! ```
//!
//! Decoding is a small state machine (ExpectHeader -> ExpectBody ->
//! ExpectCrlf -> Eof) rather than nested control flow; only the chunk
//! payload bytes survive decoding.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::AuthError;
use crate::sigv4::StreamingContext;

/// The algorithm tag of the chunk string to sign.
const CHUNK_ALGORITHM: &str = "AWS4-HMAC-SHA256-PAYLOAD";

/// Hex SHA-256 of the empty string, the fixed middle field of every chunk
/// string to sign.
const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Verifies the rolling signature chain of an aws-chunked payload.
#[derive(Debug)]
pub struct ChunkVerifier {
    signing_key: [u8; 32],
    timestamp: String,
    scope: String,
    previous_signature: String,
}

impl ChunkVerifier {
    /// Seed a verifier from the request-level authentication result.
    #[must_use]
    pub fn new(ctx: StreamingContext) -> Self {
        Self {
            signing_key: ctx.signing_key,
            timestamp: ctx.timestamp,
            scope: ctx.scope,
            previous_signature: ctx.seed_signature,
        }
    }

    /// Verify one chunk against the chain and advance it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ChunkSignatureMismatch`] when the provided
    /// signature does not continue the chain.
    pub fn verify_chunk(&mut self, provided: &str, chunk: &[u8]) -> Result<(), AuthError> {
        let string_to_sign = format!(
            "{CHUNK_ALGORITHM}\n{}\n{}\n{}\n{EMPTY_SHA256}\n{}",
            self.timestamp,
            self.scope,
            self.previous_signature,
            hex::encode(Sha256::digest(chunk)),
        );
        let expected = crate::sigv4::compute_signature(&self.signing_key, &string_to_sign);

        if !bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
            return Err(AuthError::ChunkSignatureMismatch);
        }

        self.previous_signature = expected;
        Ok(())
    }
}

/// Decoder states, advanced frame by frame.
enum State {
    /// At the start of a `size;chunk-signature=sig\r\n` header line.
    ExpectHeader,
    /// Inside a chunk body of the given remaining length.
    ExpectBody { size: usize, signature: String },
    /// At the `\r\n` that terminates a chunk body.
    ExpectCrlf,
    /// The zero-length final chunk was consumed.
    Eof,
}

/// Decode an aws-chunked body, verifying every frame signature.
///
/// Returns the concatenated chunk payloads; framing and signatures never
/// reach the storage provider.
///
/// # Errors
///
/// Returns [`AuthError::InvalidChunk`] for structural violations and
/// [`AuthError::ChunkSignatureMismatch`] for a broken signature chain.
pub fn decode_chunked_body(body: &[u8], verifier: &mut ChunkVerifier) -> Result<Vec<u8>, AuthError> {
    let mut decoded = Vec::with_capacity(body.len());
    let mut pos = 0usize;
    let mut state = State::ExpectHeader;

    loop {
        match state {
            State::ExpectHeader => {
                let line_end = find_crlf(body, pos)
                    .ok_or_else(|| AuthError::InvalidChunk("truncated chunk header".to_owned()))?;
                let header = std::str::from_utf8(&body[pos..line_end])
                    .map_err(|_| AuthError::InvalidChunk("non-UTF-8 chunk header".to_owned()))?;
                pos = line_end + 2;

                let (size, signature) = parse_chunk_header(header)?;
                if size == 0 {
                    // Final frame signs the empty payload.
                    verifier.verify_chunk(&signature, b"")?;
                    state = State::Eof;
                } else {
                    state = State::ExpectBody { size, signature };
                }
            }
            State::ExpectBody { size, signature } => {
                if pos + size > body.len() {
                    return Err(AuthError::InvalidChunk("truncated chunk body".to_owned()));
                }
                let chunk = &body[pos..pos + size];
                verifier.verify_chunk(&signature, chunk)?;
                decoded.extend_from_slice(chunk);
                pos += size;
                state = State::ExpectCrlf;
            }
            State::ExpectCrlf => {
                if body.len() < pos + 2 || &body[pos..pos + 2] != b"\r\n" {
                    return Err(AuthError::InvalidChunk(
                        "missing CRLF after chunk body".to_owned(),
                    ));
                }
                pos += 2;
                state = State::ExpectHeader;
            }
            State::Eof => {
                // Trailer lines (checksums) and the final CRLF may follow;
                // nothing after the zero chunk reaches the payload.
                return Ok(decoded);
            }
        }
    }
}

/// Parse `<hex-size>;chunk-signature=<sig>`.
fn parse_chunk_header(header: &str) -> Result<(usize, String), AuthError> {
    let (size_str, rest) = header
        .split_once(';')
        .ok_or_else(|| AuthError::InvalidChunk("missing chunk-signature".to_owned()))?;

    let size = usize::from_str_radix(size_str.trim(), 16)
        .map_err(|_| AuthError::InvalidChunk(format!("invalid chunk size {size_str:?}")))?;

    let signature = rest
        .strip_prefix("chunk-signature=")
        .ok_or_else(|| AuthError::InvalidChunk("missing chunk-signature".to_owned()))?;
    if signature.len() != 64 || !signature.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AuthError::InvalidChunk("malformed chunk signature".to_owned()));
    }

    Ok((size, signature.to_owned()))
}

fn find_crlf(data: &[u8], start: usize) -> Option<usize> {
    if start >= data.len() {
        return None;
    }
    (start..data.len().saturating_sub(1)).find(|&i| data[i] == b'\r' && data[i + 1] == b'\n')
}
