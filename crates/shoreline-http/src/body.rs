//! Response body types: buffered, streaming, and empty.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use http_body_util::Full;

/// The response body used throughout the gateway.
///
/// - **Buffered** for XML documents and error payloads
/// - **Streaming** for object payloads flowing out of a provider
/// - **Empty** for 204s, HEAD responses, and bare 200s
#[derive(Default)]
pub enum S3ResponseBody {
    /// Fully materialized body.
    Buffered(Full<Bytes>),
    /// Chunked body streamed from a storage provider.
    Streaming(BoxStream<'static, std::io::Result<Bytes>>),
    /// No body.
    #[default]
    Empty,
}

impl S3ResponseBody {
    /// Create a buffered body from bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Buffered(Full::new(data.into()))
    }

    /// Create a buffered body from an XML document.
    #[must_use]
    pub fn from_xml(xml: Vec<u8>) -> Self {
        Self::Buffered(Full::new(Bytes::from(xml)))
    }

    /// Create a streaming body from a provider byte stream.
    #[must_use]
    pub fn streaming(stream: BoxStream<'static, std::io::Result<Bytes>>) -> Self {
        Self::Streaming(stream)
    }

    /// Create an empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }
}

impl fmt::Debug for S3ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffered(full) => f.debug_tuple("Buffered").field(full).finish(),
            Self::Streaming(_) => f.write_str("Streaming(..)"),
            Self::Empty => f.write_str("Empty"),
        }
    }
}

impl http_body::Body for S3ResponseBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered(full) => Pin::new(full)
                .poll_frame(cx)
                .map_err(|never| match never {}),
            Self::Streaming(stream) => match stream.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    Poll::Ready(Some(Ok(http_body::Frame::data(chunk))))
                }
                Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(err))),
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            },
            Self::Empty => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered(full) => full.is_end_stream(),
            Self::Streaming(_) => false,
            Self::Empty => true,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Buffered(full) => full.size_hint(),
            Self::Streaming(_) => http_body::SizeHint::default(),
            Self::Empty => http_body::SizeHint::with_exact(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;
    use http_body::Body;
    use http_body_util::BodyExt;

    use super::*;

    #[test]
    fn test_should_report_empty_body_as_end_of_stream() {
        let body = S3ResponseBody::empty();
        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));
    }

    #[test]
    fn test_should_size_buffered_bodies() {
        let body = S3ResponseBody::from_bytes(Bytes::from_static(b"hello"));
        assert!(!body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(5));
    }

    #[tokio::test]
    async fn test_should_collect_streaming_body() {
        let chunks: Vec<std::io::Result<Bytes>> =
            vec![Ok(Bytes::from_static(b"ab")), Ok(Bytes::from_static(b"cd"))];
        let body = S3ResponseBody::streaming(stream::iter(chunks).boxed());
        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(collected, Bytes::from_static(b"abcd"));
    }

    #[tokio::test]
    async fn test_should_propagate_stream_errors() {
        let chunks: Vec<std::io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"ab")),
            Err(std::io::Error::other("backend dropped")),
        ];
        let body = S3ResponseBody::streaming(stream::iter(chunks).boxed());
        assert!(body.collect().await.is_err());
    }
}
