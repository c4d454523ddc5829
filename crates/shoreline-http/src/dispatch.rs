//! The seam between the HTTP layer and the gateway logic.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use shoreline_model::{S3Error, S3Operation};

use crate::body::S3ResponseBody;
use crate::router::RoutingContext;

/// Trait the gateway logic implements to receive routed operations.
///
/// Boxed futures keep the trait object-safe so the service can hold
/// `Arc<dyn S3Handler>`.
pub trait S3Handler: Send + Sync + 'static {
    /// Handle one routed S3 operation and produce the HTTP response.
    fn handle_operation(
        &self,
        op: S3Operation,
        parts: http::request::Parts,
        body: Bytes,
        ctx: RoutingContext,
    ) -> Pin<Box<dyn Future<Output = Result<http::Response<S3ResponseBody>, S3Error>> + Send>>;
}

/// Dispatch a routed request to the handler.
pub async fn dispatch_operation<H: S3Handler + ?Sized>(
    handler: &H,
    parts: http::request::Parts,
    body: Bytes,
    ctx: RoutingContext,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    tracing::debug!(
        operation = %ctx.operation,
        bucket = ?ctx.bucket,
        key = ?ctx.key,
        "dispatching S3 operation"
    );
    handler.handle_operation(ctx.operation, parts, body, ctx).await
}
