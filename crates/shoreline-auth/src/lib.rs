//! Request authentication for the Shoreline S3 gateway.
//!
//! Incoming requests are verified against the gateway's single credential
//! pair using one of four mechanisms:
//!
//! - **SigV4 header auth** - the `Authorization: AWS4-HMAC-SHA256 ...`
//!   scheme used by every modern AWS SDK ([`sigv4`])
//! - **SigV2 header auth** - the legacy `Authorization: AWS AKID:sig`
//!   scheme still emitted by older backup tools ([`sigv2`])
//! - **Presigned URLs** - both the V4 `X-Amz-*` and the V2
//!   `AWSAccessKeyId`/`Expires`/`Signature` query forms ([`presigned`])
//! - **aws-chunked uploads** - `STREAMING-AWS4-HMAC-SHA256-PAYLOAD` bodies
//!   whose frames carry a rolling signature chain ([`chunked`])
//!
//! The gateway may also run with authentication disabled, in which case none
//! of this crate is consulted.

pub mod canonical;
pub mod chunked;
pub mod credentials;
pub mod error;
pub mod presigned;
pub mod sigv2;
pub mod sigv4;

pub use chunked::{decode_chunked_body, ChunkVerifier};
pub use credentials::{CredentialProvider, StaticCredentials};
pub use error::AuthError;
pub use presigned::{is_presigned_v2, is_presigned_v4, verify_presigned_v2, verify_presigned_v4};
pub use sigv2::{is_sigv2, verify_sigv2};
pub use sigv4::{hash_payload, is_sigv4, verify_sigv4, AuthResult, StreamingContext};
