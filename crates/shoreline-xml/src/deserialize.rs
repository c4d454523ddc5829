//! Request body parsing.
//!
//! The only XML request body the gateway accepts is the DeleteObjects
//! `Delete` document:
//!
//! ```xml
//! <Delete>
//!   <Quiet>true</Quiet>
//!   <Object><Key>a.txt</Key></Object>
//!   <Object><Key>b.txt</Key><VersionId>null</VersionId></Object>
//! </Delete>
//! ```

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::XmlError;

/// The cap on `Object` entries in one DeleteObjects request.
pub const MAX_DELETE_OBJECTS: usize = 1000;

/// One `<Object>` entry of a delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectIdentifier {
    /// The object key.
    pub key: String,
    /// The version id, accepted and ignored (versioning is not provided).
    pub version_id: Option<String>,
}

/// A parsed DeleteObjects request body.
#[derive(Debug, Clone, Default)]
pub struct DeleteRequest {
    /// The keys to delete, in request order.
    pub objects: Vec<ObjectIdentifier>,
    /// Whether the response should suppress successful deletions.
    pub quiet: bool,
}

/// Parse a DeleteObjects request body.
///
/// # Errors
///
/// Returns [`XmlError::Malformed`] for documents that are not well-formed
/// or lack a `Delete` root, [`XmlError::MissingElement`] for `Object`
/// entries without a `Key`, and [`XmlError::TooManyObjects`] when the
/// 1000-entry cap is exceeded.
pub fn parse_delete_request(body: &[u8]) -> Result<DeleteRequest, XmlError> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    // Find the root element.
    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                if start.name().as_ref() != b"Delete" {
                    return Err(XmlError::Malformed(format!(
                        "expected Delete root, found {}",
                        String::from_utf8_lossy(start.name().as_ref())
                    )));
                }
                break;
            }
            Event::Eof => return Err(XmlError::MissingElement("Delete".to_owned())),
            _ => {}
        }
    }

    let mut request = DeleteRequest::default();

    loop {
        match reader.read_event()? {
            Event::Start(start) => match start.name().as_ref() {
                b"Object" => {
                    let object = parse_object_entry(&mut reader)?;
                    request.objects.push(object);
                    if request.objects.len() > MAX_DELETE_OBJECTS {
                        return Err(XmlError::TooManyObjects(request.objects.len()));
                    }
                }
                b"Quiet" => {
                    request.quiet = read_text(&mut reader)?.trim() == "true";
                }
                _ => skip_element(&mut reader)?,
            },
            Event::End(_) => return Ok(request),
            Event::Eof => return Err(XmlError::Malformed("unterminated Delete element".to_owned())),
            _ => {}
        }
    }
}

/// Parse one `<Object>` entry; the reader sits just past its start tag.
fn parse_object_entry(reader: &mut Reader<&[u8]>) -> Result<ObjectIdentifier, XmlError> {
    let mut key: Option<String> = None;
    let mut version_id: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => match start.name().as_ref() {
                b"Key" => key = Some(read_text(reader)?),
                b"VersionId" => version_id = Some(read_text(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) => break,
            Event::Eof => {
                return Err(XmlError::Malformed("unterminated Object element".to_owned()))
            }
            _ => {}
        }
    }

    let key = key.ok_or_else(|| XmlError::MissingElement("Object/Key".to_owned()))?;
    Ok(ObjectIdentifier { key, version_id })
}

/// Read the text content of the current element through its end tag.
fn read_text(reader: &mut Reader<&[u8]>) -> Result<String, XmlError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(event) => {
                let unescaped = event
                    .unescape()
                    .map_err(|e| XmlError::Malformed(e.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::End(_) => return Ok(text),
            Event::Eof => return Err(XmlError::Malformed("unexpected EOF in text".to_owned())),
            _ => {}
        }
    }
}

/// Skip the current element and all of its children.
fn skip_element(reader: &mut Reader<&[u8]>) -> Result<(), XmlError> {
    let mut depth = 1u32;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => return Err(XmlError::Malformed("unexpected EOF".to_owned())),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_delete_request_preserving_order() {
        let body = br#"<?xml version="1.0" encoding="UTF-8"?>
            <Delete xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
                <Object><Key>hello.txt</Key></Object>
                <Object><Key>ghost.txt</Key><VersionId>null</VersionId></Object>
            </Delete>"#;
        let request = parse_delete_request(body).unwrap();
        assert_eq!(request.objects.len(), 2);
        assert_eq!(request.objects[0].key, "hello.txt");
        assert_eq!(request.objects[1].key, "ghost.txt");
        assert_eq!(request.objects[1].version_id.as_deref(), Some("null"));
        assert!(!request.quiet);
    }

    #[test]
    fn test_should_parse_quiet_flag() {
        let body = b"<Delete><Quiet>true</Quiet><Object><Key>a</Key></Object></Delete>";
        let request = parse_delete_request(body).unwrap();
        assert!(request.quiet);
    }

    #[test]
    fn test_should_unescape_keys() {
        let body = b"<Delete><Object><Key>a&amp;b.txt</Key></Object></Delete>";
        let request = parse_delete_request(body).unwrap();
        assert_eq!(request.objects[0].key, "a&b.txt");
    }

    #[test]
    fn test_should_reject_missing_key() {
        let body = b"<Delete><Object><VersionId>1</VersionId></Object></Delete>";
        assert!(matches!(
            parse_delete_request(body),
            Err(XmlError::MissingElement(_))
        ));
    }

    #[test]
    fn test_should_reject_wrong_root() {
        let body = b"<Remove><Object><Key>a</Key></Object></Remove>";
        assert!(matches!(parse_delete_request(body), Err(XmlError::Malformed(_))));
    }

    #[test]
    fn test_should_reject_more_than_a_thousand_objects() {
        let mut body = String::from("<Delete>");
        for i in 0..1001 {
            body.push_str(&format!("<Object><Key>k{i}</Key></Object>"));
        }
        body.push_str("</Delete>");
        assert!(matches!(
            parse_delete_request(body.as_bytes()),
            Err(XmlError::TooManyObjects(1001))
        ));
    }

    #[test]
    fn test_should_ignore_unknown_elements() {
        let body = b"<Delete><Ignored><Nested/></Ignored><Object><Key>a</Key></Object></Delete>";
        let request = parse_delete_request(body).unwrap();
        assert_eq!(request.objects.len(), 1);
    }
}
