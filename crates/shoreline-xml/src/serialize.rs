//! Response document serialization.
//!
//! Each response document implements [`S3Serialize`], writing its child
//! elements into a `quick_xml::Writer`; [`to_xml`] wraps the content with
//! the XML declaration and the namespaced root element.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesText, Event};
use quick_xml::Writer;
use shoreline_model::types::DeleteOutcome;
use shoreline_model::{Bucket, ObjectInfo};

use crate::error::XmlError;

/// The S3 XML namespace carried on every response root element.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Trait for serializing response documents to S3 XML.
///
/// Implementors write their content as child elements; the root element and
/// namespace are handled by [`to_xml`]. Uses `io::Result` because the
/// `quick_xml::Writer` content closures require it.
pub trait S3Serialize {
    /// The root element name of this document.
    const ROOT: &'static str;

    /// Serialize this value as XML child elements into the given writer.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if writing to the underlying writer fails.
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()>;
}

/// Serialize a document as a complete S3 XML response body.
///
/// # Errors
///
/// Returns [`XmlError`] if serialization fails (writing to the in-memory
/// buffer does not fail in practice).
pub fn to_xml<T: S3Serialize>(value: &T) -> Result<Vec<u8>, XmlError> {
    let mut buf = Vec::with_capacity(512);
    let mut writer = Writer::new(&mut buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer
        .create_element(T::ROOT)
        .with_attribute(("xmlns", S3_NAMESPACE))
        .write_inner_content(|w| value.serialize_xml(w))?;

    Ok(buf)
}

/// Format a timestamp as ISO 8601 with millisecond resolution and `Z`.
#[must_use]
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn write_text<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::from_escaped(quick_xml::escape::partial_escape(
            text,
        )))?;
    Ok(())
}

fn write_opt_text<W: Write>(writer: &mut Writer<W>, tag: &str, text: Option<&str>) -> io::Result<()> {
    if let Some(text) = text {
        write_text(writer, tag, text)?;
    }
    Ok(())
}

fn write_bool<W: Write>(writer: &mut Writer<W>, tag: &str, value: bool) -> io::Result<()> {
    write_text(writer, tag, if value { "true" } else { "false" })
}

/// Write one `<Contents>` entry of a listing.
fn write_contents<W: Write>(writer: &mut Writer<W>, object: &ObjectInfo) -> io::Result<()> {
    writer.create_element("Contents").write_inner_content(|w| {
        write_text(w, "Key", &object.key)?;
        write_text(w, "LastModified", &format_timestamp(&object.last_modified))?;
        write_text(w, "ETag", &object.quoted_etag())?;
        write_text(w, "Size", &object.size.to_string())?;
        write_text(w, "StorageClass", "STANDARD")
    })?;
    Ok(())
}

/// Write the `<CommonPrefixes>` entries of a listing.
fn write_common_prefixes<W: Write>(writer: &mut Writer<W>, prefixes: &[String]) -> io::Result<()> {
    for prefix in prefixes {
        writer
            .create_element("CommonPrefixes")
            .write_inner_content(|w| write_text(w, "Prefix", prefix))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ListAllMyBucketsResult
// ---------------------------------------------------------------------------

/// The `ListAllMyBucketsResult` document returned by ListBuckets.
#[derive(Debug, Clone)]
pub struct ListAllMyBucketsResult {
    /// The canonical owner id reported for the single-tenant gateway.
    pub owner_id: String,
    /// The owner display name.
    pub owner_display_name: String,
    /// All buckets, in name order.
    pub buckets: Vec<Bucket>,
}

impl S3Serialize for ListAllMyBucketsResult {
    const ROOT: &'static str = "ListAllMyBucketsResult";

    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Owner").write_inner_content(|w| {
            write_text(w, "ID", &self.owner_id)?;
            write_text(w, "DisplayName", &self.owner_display_name)
        })?;
        writer.create_element("Buckets").write_inner_content(|w| {
            for bucket in &self.buckets {
                w.create_element("Bucket").write_inner_content(|w| {
                    write_text(w, "Name", &bucket.name)?;
                    write_text(w, "CreationDate", &format_timestamp(&bucket.created_at))
                })?;
            }
            Ok::<(), io::Error>(())
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ListBucketResult (v1 and v2)
// ---------------------------------------------------------------------------

/// The v1 `ListBucketResult` document.
#[derive(Debug, Clone, Default)]
pub struct ListBucketResultV1 {
    /// The bucket name.
    pub name: String,
    /// The prefix filter, echoed back (possibly empty).
    pub prefix: String,
    /// The marker this page started from, echoed back.
    pub marker: String,
    /// The delimiter, echoed back when present.
    pub delimiter: Option<String>,
    /// The effective max-keys.
    pub max_keys: u32,
    /// Whether more keys remain.
    pub is_truncated: bool,
    /// The marker for the next page, set when truncated and a delimiter
    /// grouped keys away.
    pub next_marker: Option<String>,
    /// Objects on this page.
    pub contents: Vec<ObjectInfo>,
    /// Common prefixes on this page.
    pub common_prefixes: Vec<String>,
}

impl S3Serialize for ListBucketResultV1 {
    const ROOT: &'static str = "ListBucketResult";

    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text(writer, "Name", &self.name)?;
        write_text(writer, "Prefix", &self.prefix)?;
        write_text(writer, "Marker", &self.marker)?;
        write_opt_text(writer, "NextMarker", self.next_marker.as_deref())?;
        write_text(writer, "MaxKeys", &self.max_keys.to_string())?;
        write_opt_text(writer, "Delimiter", self.delimiter.as_deref())?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        for object in &self.contents {
            write_contents(writer, object)?;
        }
        write_common_prefixes(writer, &self.common_prefixes)
    }
}

/// The v2 `ListBucketResult` document (`list-type=2`).
#[derive(Debug, Clone, Default)]
pub struct ListBucketResultV2 {
    /// The bucket name.
    pub name: String,
    /// The prefix filter, echoed back (possibly empty).
    pub prefix: String,
    /// The delimiter, echoed back when present.
    pub delimiter: Option<String>,
    /// The effective max-keys.
    pub max_keys: u32,
    /// Number of keys plus common prefixes on this page.
    pub key_count: u32,
    /// Whether more keys remain.
    pub is_truncated: bool,
    /// The continuation token this page started from, echoed back.
    pub continuation_token: Option<String>,
    /// The token for the next page, set when truncated.
    pub next_continuation_token: Option<String>,
    /// Objects on this page.
    pub contents: Vec<ObjectInfo>,
    /// Common prefixes on this page.
    pub common_prefixes: Vec<String>,
}

impl S3Serialize for ListBucketResultV2 {
    const ROOT: &'static str = "ListBucketResult";

    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text(writer, "Name", &self.name)?;
        write_text(writer, "Prefix", &self.prefix)?;
        write_opt_text(writer, "Delimiter", self.delimiter.as_deref())?;
        write_text(writer, "MaxKeys", &self.max_keys.to_string())?;
        write_text(writer, "KeyCount", &self.key_count.to_string())?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        write_opt_text(writer, "ContinuationToken", self.continuation_token.as_deref())?;
        write_opt_text(
            writer,
            "NextContinuationToken",
            self.next_continuation_token.as_deref(),
        )?;
        for object in &self.contents {
            write_contents(writer, object)?;
        }
        write_common_prefixes(writer, &self.common_prefixes)
    }
}

// ---------------------------------------------------------------------------
// CopyObjectResult
// ---------------------------------------------------------------------------

/// The `CopyObjectResult` document returned by CopyObject.
#[derive(Debug, Clone)]
pub struct CopyObjectResult {
    /// The quoted ETag of the destination object.
    pub etag: String,
    /// The destination's last-modified time.
    pub last_modified: DateTime<Utc>,
}

impl S3Serialize for CopyObjectResult {
    const ROOT: &'static str = "CopyObjectResult";

    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text(writer, "ETag", &self.etag)?;
        write_text(writer, "LastModified", &format_timestamp(&self.last_modified))
    }
}

// ---------------------------------------------------------------------------
// DeleteResult
// ---------------------------------------------------------------------------

/// The `DeleteResult` document returned by DeleteObjects.
///
/// Outcomes are emitted in request order. With `quiet` set, successful
/// deletions are suppressed and only errors appear.
#[derive(Debug, Clone)]
pub struct DeleteResult {
    /// Per-key outcomes, in request order.
    pub outcomes: Vec<DeleteOutcome>,
    /// Whether the client asked for quiet mode.
    pub quiet: bool,
}

impl S3Serialize for DeleteResult {
    const ROOT: &'static str = "DeleteResult";

    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        for outcome in &self.outcomes {
            match outcome {
                DeleteOutcome::Deleted { key } => {
                    if !self.quiet {
                        writer
                            .create_element("Deleted")
                            .write_inner_content(|w| write_text(w, "Key", key))?;
                    }
                }
                DeleteOutcome::Failed { key, code, message } => {
                    writer.create_element("Error").write_inner_content(|w| {
                        write_text(w, "Key", key)?;
                        write_text(w, "Code", code)?;
                        write_text(w, "Message", message)
                    })?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use shoreline_model::types::UserMetadata;

    use super::*;

    fn sample_object(key: &str) -> ObjectInfo {
        ObjectInfo {
            key: key.to_owned(),
            size: 2,
            etag: "c1a5298f939e87e8f962a5edfc206918".to_owned(),
            content_type: "text/plain".to_owned(),
            last_modified: Utc.with_ymd_and_hms(2026, 2, 3, 16, 45, 9).unwrap(),
            user_metadata: UserMetadata::new(),
            etag_is_native_hash: false,
        }
    }

    #[test]
    fn test_should_serialize_list_buckets_document() {
        let doc = ListAllMyBucketsResult {
            owner_id: "shoreline".to_owned(),
            owner_display_name: "shoreline".to_owned(),
            buckets: vec![Bucket {
                name: "backups".to_owned(),
                created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            }],
        };
        let xml = String::from_utf8(to_xml(&doc).unwrap()).unwrap();
        assert!(xml.contains(
            "<ListAllMyBucketsResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">"
        ));
        assert!(xml.contains("<Name>backups</Name>"));
        assert!(xml.contains("<CreationDate>2026-01-01T00:00:00.000Z</CreationDate>"));
    }

    #[test]
    fn test_should_serialize_v2_listing_with_common_prefixes() {
        let doc = ListBucketResultV2 {
            name: "b1".to_owned(),
            prefix: String::new(),
            delimiter: Some("/".to_owned()),
            max_keys: 1000,
            key_count: 3,
            is_truncated: false,
            continuation_token: None,
            next_continuation_token: None,
            contents: vec![sample_object("a"), sample_object("b")],
            common_prefixes: vec!["a/".to_owned()],
        };
        let xml = String::from_utf8(to_xml(&doc).unwrap()).unwrap();
        assert!(xml.contains("<KeyCount>3</KeyCount>"));
        assert!(xml.contains("<IsTruncated>false</IsTruncated>"));
        assert!(xml.contains("<ETag>\"c1a5298f939e87e8f962a5edfc206918\"</ETag>"));
        assert!(xml.contains("<CommonPrefixes><Prefix>a/</Prefix></CommonPrefixes>"));
        // Entries keep listing order.
        let a = xml.find("<Key>a</Key>").unwrap();
        let b = xml.find("<Key>b</Key>").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_should_serialize_v1_listing_with_next_marker() {
        let doc = ListBucketResultV1 {
            name: "b1".to_owned(),
            prefix: "p".to_owned(),
            marker: String::new(),
            delimiter: None,
            max_keys: 1,
            is_truncated: true,
            next_marker: Some("p/last".to_owned()),
            contents: vec![sample_object("p/last")],
            common_prefixes: vec![],
        };
        let xml = String::from_utf8(to_xml(&doc).unwrap()).unwrap();
        assert!(xml.contains("<NextMarker>p/last</NextMarker>"));
        assert!(xml.contains("<IsTruncated>true</IsTruncated>"));
    }

    #[test]
    fn test_should_serialize_delete_result_in_request_order() {
        let doc = DeleteResult {
            outcomes: vec![
                DeleteOutcome::Deleted { key: "hello.txt".to_owned() },
                DeleteOutcome::Failed {
                    key: "locked.txt".to_owned(),
                    code: "InternalError".to_owned(),
                    message: "boom".to_owned(),
                },
            ],
            quiet: false,
        };
        let xml = String::from_utf8(to_xml(&doc).unwrap()).unwrap();
        let deleted = xml.find("<Deleted><Key>hello.txt</Key></Deleted>").unwrap();
        let error = xml.find("<Error><Key>locked.txt</Key>").unwrap();
        assert!(deleted < error);
        assert!(xml.contains("<Code>InternalError</Code>"));
    }

    #[test]
    fn test_should_suppress_deleted_entries_in_quiet_mode() {
        let doc = DeleteResult {
            outcomes: vec![DeleteOutcome::Deleted { key: "hello.txt".to_owned() }],
            quiet: true,
        };
        let xml = String::from_utf8(to_xml(&doc).unwrap()).unwrap();
        assert!(!xml.contains("<Deleted>"));
    }

    #[test]
    fn test_should_serialize_copy_object_result() {
        let doc = CopyObjectResult {
            etag: "\"c1a5298f939e87e8f962a5edfc206918\"".to_owned(),
            last_modified: Utc.with_ymd_and_hms(2026, 2, 3, 16, 45, 9).unwrap(),
        };
        let xml = String::from_utf8(to_xml(&doc).unwrap()).unwrap();
        assert!(xml.contains("<ETag>\"c1a5298f939e87e8f962a5edfc206918\"</ETag>"));
        assert!(xml.contains("<LastModified>2026-02-03T16:45:09.000Z</LastModified>"));
    }

    #[test]
    fn test_should_escape_keys_in_listing() {
        let mut object = sample_object("a&b<c>.txt");
        object.etag = "d41d8cd98f00b204e9800998ecf8427e".to_owned();
        let doc = ListBucketResultV1 {
            name: "b1".to_owned(),
            max_keys: 1000,
            contents: vec![object],
            ..Default::default()
        };
        let xml = String::from_utf8(to_xml(&doc).unwrap()).unwrap();
        assert!(xml.contains("<Key>a&amp;b&lt;c&gt;.txt</Key>"));
    }
}
