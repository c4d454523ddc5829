//! S3 wire-format XML for the Shoreline gateway.
//!
//! Response documents follow the AWS RestXml conventions:
//!
//! - XML declaration: `<?xml version="1.0" encoding="UTF-8"?>`
//! - Root elements carry the S3 namespace, children carry no prefix
//! - Timestamps: ISO 8601 with millisecond resolution and a trailing `Z`
//! - ETags: wrapped in double quotes on the wire
//!
//! # Modules
//!
//! - [`serialize`] - Response documents (`ListAllMyBucketsResult`,
//!   `ListBucketResult`, `CopyObjectResult`, `DeleteResult`)
//! - [`deserialize`] - Request bodies (the DeleteObjects `Delete` document)
//! - [`error`] - Codec errors and the S3 `Error` response document

pub mod deserialize;
pub mod error;
pub mod serialize;

pub use deserialize::{parse_delete_request, DeleteRequest, ObjectIdentifier};
pub use error::{error_to_xml, XmlError};
pub use serialize::{
    to_xml, CopyObjectResult, ListAllMyBucketsResult, ListBucketResultV1, ListBucketResultV2,
    S3Serialize,
};
