//! Shared domain types for the Shoreline S3 gateway.
//!
//! This crate defines the vocabulary every other Shoreline crate speaks:
//!
//! - [`types`] - Buckets, object metadata, listing pages
//! - [`error`] - The S3 error taxonomy ([`S3Error`], [`S3ErrorCode`]) with
//!   wire-accurate codes, messages, and HTTP status mappings
//! - [`operations`] - The set of S3 operations the gateway serves
//! - [`validation`] - Bucket-name and object-key validation rules

// S3Error is the pervasive domain error, used as Result<T, S3Error> on the
// request path. Its size is inherent to its fields; boxing it everywhere
// would add indirection for no benefit.
#![allow(clippy::result_large_err)]

pub mod error;
pub mod operations;
pub mod types;
pub mod validation;

pub use error::{S3Error, S3ErrorCode};
pub use operations::S3Operation;
pub use types::{Bucket, ObjectInfo, ObjectPage, UserMetadata};
pub use validation::{validate_bucket_name, validate_object_key};
