//! The HTTP layer of the Shoreline S3 gateway.
//!
//! Ties the request path together:
//!
//! ```text
//! HTTP Request
//!   -> S3HttpService (hyper Service)
//!     -> health check interception
//!     -> S3Router (virtual hosting + canonicalization + operation table)
//!     -> body collection
//!     -> RequestAuthenticator (SigV2 / SigV4 / presigned / aws-chunked)
//!     -> dispatch_operation (S3Handler trait)
//!     -> Gateway (preconditions + provider calls + XML rendering)
//!     -> common response headers (x-amz-request-id, Server)
//!   <- HTTP Response
//! ```
//!
//! # Modules
//!
//! - [`router`] - Request canonicalization and operation identification
//! - [`request`] - Typed extraction of listing/range/conditional parameters
//! - [`auth`] - Authentication scheme selection and payload verification
//! - [`dispatch`] - The [`S3Handler`](dispatch::S3Handler) seam
//! - [`gateway`] - The handler implementation over a storage provider
//! - [`response`] - Response construction, including error documents
//! - [`body`] - Buffered, streaming, and empty response bodies
//! - [`service`] - The hyper `Service` implementation

#![allow(clippy::result_large_err)]

pub mod auth;
pub mod body;
pub mod dispatch;
pub mod gateway;
pub mod request;
pub mod response;
pub mod router;
pub mod service;

pub use body::S3ResponseBody;
pub use dispatch::S3Handler;
pub use gateway::Gateway;
pub use router::{RoutingContext, S3Router};
pub use service::{S3HttpConfig, S3HttpService};
