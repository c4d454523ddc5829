//! Storage backends for the Shoreline S3 gateway.
//!
//! The gateway's request layer speaks to one [`StorageProvider`] chosen at
//! startup:
//!
//! - [`LocalProvider`] - buckets as directories under a data root, payloads
//!   alongside JSON metadata sidecars
//! - [`DrimeProvider`] - buckets as Drime Cloud folders, with a durable
//!   [`Md5Cache`] supplying S3-compatible ETags the remote backend cannot
//!   produce itself
//!
//! # Modules
//!
//! - [`provider`] - The provider contract and byte-stream body types
//! - [`local`] - The filesystem backend
//! - [`remote`] - The Drime Cloud backend and its API client
//! - [`cache`] - The sqlite-backed MD5 cache
//! - [`listing`] - Shared listing pagination (prefix/delimiter/marker)

pub mod cache;
pub mod error;
pub mod listing;
pub mod local;
pub mod provider;
pub mod remote;

pub use cache::{CacheEntry, CacheStats, Md5Cache};
pub use error::StoreError;
pub use local::LocalProvider;
pub use provider::{
    ByteRange, ByteStream, GetObjectResult, ListParams, PutOptions, StorageProvider,
};
pub use remote::{DrimeClient, DrimeProvider, MigrationReport};
