//! Response construction.
//!
//! Success responses carry either an XML document, object bytes, or no
//! body; every error renders as the S3 `Error` document with the matching
//! HTTP status.

use chrono::{DateTime, Utc};
use shoreline_model::{ObjectInfo, S3Error};
use shoreline_xml::serialize::S3Serialize;

use crate::body::S3ResponseBody;

/// Build a 200 response around an XML document.
///
/// # Errors
///
/// Returns an [`S3Error`] when serialization fails.
pub fn xml_response<T: S3Serialize>(document: &T) -> Result<http::Response<S3ResponseBody>, S3Error> {
    xml_response_with_status(http::StatusCode::OK, document)
}

/// Build an XML response with an explicit status.
///
/// # Errors
///
/// Returns an [`S3Error`] when serialization fails.
pub fn xml_response_with_status<T: S3Serialize>(
    status: http::StatusCode,
    document: &T,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    let xml = shoreline_xml::to_xml(document)
        .map_err(|err| S3Error::internal_error(err.to_string()))?;
    http::Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/xml")
        .body(S3ResponseBody::from_xml(xml))
        .map_err(|err| S3Error::internal_error(err.to_string()))
}

/// Build an empty response with the given status.
///
/// # Errors
///
/// Returns an [`S3Error`] when response construction fails.
pub fn empty_response(status: http::StatusCode) -> Result<http::Response<S3ResponseBody>, S3Error> {
    http::Response::builder()
        .status(status)
        .body(S3ResponseBody::empty())
        .map_err(|err| S3Error::internal_error(err.to_string()))
}

/// Format a timestamp as an HTTP date (`Last-Modified`, `Date`).
#[must_use]
pub fn http_date(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Attach the standard object metadata headers (ETag, Content-Type,
/// Last-Modified, `x-amz-meta-*`) to a response builder.
pub fn object_headers(
    mut builder: http::response::Builder,
    info: &ObjectInfo,
) -> http::response::Builder {
    builder = builder
        .header(http::header::ETAG, info.quoted_etag())
        .header(http::header::CONTENT_TYPE, info.content_type.clone())
        .header(http::header::LAST_MODIFIED, http_date(&info.last_modified));

    for (name, value) in &info.user_metadata {
        builder = builder.header(format!("x-amz-meta-{name}"), value.clone());
    }
    builder
}

/// Render an error as the S3 `Error` document.
#[must_use]
pub fn error_to_response(err: &S3Error, request_id: &str) -> http::Response<S3ResponseBody> {
    // 304 responses carry no body by definition.
    if err.status_code == http::StatusCode::NOT_MODIFIED {
        return http::Response::builder()
            .status(err.status_code)
            .body(S3ResponseBody::empty())
            .unwrap_or_default();
    }

    let xml = shoreline_xml::error_to_xml(
        err.code.as_str(),
        &err.message,
        err.resource.as_deref(),
        request_id,
    );

    http::Response::builder()
        .status(err.status_code)
        .header(http::header::CONTENT_TYPE, "application/xml")
        .body(S3ResponseBody::from_xml(xml))
        .unwrap_or_else(|_| {
            http::Response::builder()
                .status(http::StatusCode::INTERNAL_SERVER_ERROR)
                .body(S3ResponseBody::empty())
                .expect("static response should be valid")
        })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use http_body_util::BodyExt;
    use shoreline_model::types::UserMetadata;
    use shoreline_model::S3ErrorCode;
    use shoreline_xml::CopyObjectResult;

    use super::*;

    #[tokio::test]
    async fn test_should_build_xml_response() {
        let doc = CopyObjectResult {
            etag: "\"abc\"".to_owned(),
            last_modified: Utc.with_ymd_and_hms(2026, 2, 3, 16, 45, 9).unwrap(),
        };
        let resp = xml_response(&doc).unwrap();
        assert_eq!(resp.status(), http::StatusCode::OK);
        assert_eq!(
            resp.headers().get("content-type").and_then(|v| v.to_str().ok()),
            Some("application/xml")
        );
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(std::str::from_utf8(&body).unwrap().contains("<CopyObjectResult"));
    }

    #[test]
    fn test_should_render_error_document_with_status() {
        let err = S3Error::no_such_bucket("missing");
        let resp = error_to_response(&err, "req-1");
        assert_eq!(resp.status(), http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_should_render_not_modified_without_body() {
        let err = S3Error::new(S3ErrorCode::NotModified);
        let resp = error_to_response(&err, "req-1");
        assert_eq!(resp.status(), http::StatusCode::NOT_MODIFIED);
        assert!(matches!(resp.into_body(), S3ResponseBody::Empty));
    }

    #[test]
    fn test_should_attach_object_headers() {
        let mut metadata = UserMetadata::new();
        metadata.insert("owner".to_owned(), "backup".to_owned());
        let info = ObjectInfo {
            key: "k".to_owned(),
            size: 2,
            etag: "c1a5298f939e87e8f962a5edfc206918".to_owned(),
            content_type: "text/plain".to_owned(),
            last_modified: Utc.with_ymd_and_hms(2026, 2, 3, 16, 45, 9).unwrap(),
            user_metadata: metadata,
            etag_is_native_hash: false,
        };

        let resp = object_headers(http::Response::builder(), &info)
            .body(())
            .unwrap();
        let headers = resp.headers();
        assert_eq!(
            headers.get("etag").and_then(|v| v.to_str().ok()),
            Some("\"c1a5298f939e87e8f962a5edfc206918\"")
        );
        assert_eq!(
            headers.get("last-modified").and_then(|v| v.to_str().ok()),
            Some("Tue, 03 Feb 2026 16:45:09 GMT")
        );
        assert_eq!(
            headers.get("x-amz-meta-owner").and_then(|v| v.to_str().ok()),
            Some("backup")
        );
    }
}
