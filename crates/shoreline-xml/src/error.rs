//! Codec errors and the S3 `Error` response document.

use quick_xml::events::{BytesDecl, BytesText, Event};
use quick_xml::Writer;

/// Errors produced while encoding or decoding S3 XML.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// The document is not well-formed XML.
    #[error("malformed XML: {0}")]
    Malformed(String),
    /// A required element is absent.
    #[error("missing element: {0}")]
    MissingElement(String),
    /// The DeleteObjects body names more than 1000 objects.
    #[error("too many objects in delete request: {0} (limit 1000)")]
    TooManyObjects(usize),
    /// Underlying writer failure.
    #[error("XML write failed: {0}")]
    Write(#[from] std::io::Error),
}

impl From<quick_xml::Error> for XmlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Render the S3 `Error` response document.
///
/// ```xml
/// <?xml version="1.0" encoding="UTF-8"?>
/// <Error>
///   <Code>NoSuchKey</Code>
///   <Message>The specified key does not exist</Message>
///   <Resource>/bucket/key</Resource>
///   <RequestId>...</RequestId>
/// </Error>
/// ```
///
/// Infallible: errors are rendered into a pre-allocated buffer and the
/// element content is plain text.
#[must_use]
pub fn error_to_xml(
    code: &str,
    message: &str,
    resource: Option<&str>,
    request_id: &str,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    let mut writer = Writer::new(&mut buf);

    // Writing to a Vec cannot fail; discard the io::Result plumbing.
    let _ = writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)));
    let _ = writer.create_element("Error").write_inner_content(|w| {
        w.create_element("Code")
            .write_text_content(BytesText::new(code))?;
        w.create_element("Message")
            .write_text_content(BytesText::new(message))?;
        if let Some(resource) = resource {
            w.create_element("Resource")
                .write_text_content(BytesText::new(resource))?;
        }
        w.create_element("RequestId")
            .write_text_content(BytesText::new(request_id))?;
        Ok::<(), std::io::Error>(())
    });

    buf
}
