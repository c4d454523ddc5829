//! The hyper `Service` tying the request pipeline together.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::Service;
use shoreline_auth::StaticCredentials;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::RequestAuthenticator;
use crate::body::S3ResponseBody;
use crate::dispatch::{dispatch_operation, S3Handler};
use crate::response::{error_to_response, http_date};
use crate::router::S3Router;

/// Configuration for the HTTP service.
#[derive(Debug, Clone)]
pub struct S3HttpConfig {
    /// Base domain for virtual-host-style addressing.
    pub domain: String,
    /// Whether virtual-host-style addressing is enabled.
    pub virtual_hosting: bool,
    /// Disable authentication entirely (`--no-auth`).
    pub no_auth: bool,
    /// The gateway's credential pair; unused when `no_auth` is set.
    pub credentials: StaticCredentials,
}

impl Default for S3HttpConfig {
    fn default() -> Self {
        Self {
            domain: "s3.localhost".to_owned(),
            virtual_hosting: true,
            no_auth: false,
            credentials: StaticCredentials::new("shoreline", "shoreline-secret"),
        }
    }
}

/// The S3 HTTP service.
pub struct S3HttpService<H: S3Handler> {
    handler: Arc<H>,
    router: S3Router,
    authenticator: Option<Arc<RequestAuthenticator>>,
}

impl<H: S3Handler> S3HttpService<H> {
    /// Build the service from a handler and configuration.
    #[must_use]
    pub fn new(handler: H, config: &S3HttpConfig) -> Self {
        let router = S3Router::new(&config.domain, config.virtual_hosting);
        let authenticator = if config.no_auth {
            None
        } else {
            Some(Arc::new(RequestAuthenticator::new(config.credentials.clone())))
        };
        Self {
            handler: Arc::new(handler),
            router,
            authenticator,
        }
    }
}

impl<H: S3Handler> Clone for S3HttpService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            router: self.router.clone(),
            authenticator: self.authenticator.clone(),
        }
    }
}

impl<H: S3Handler> Service<http::Request<Incoming>> for S3HttpService<H> {
    type Response = http::Response<S3ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move {
            let request_id = Uuid::new_v4().simple().to_string();
            let is_head = req.method() == http::Method::HEAD;

            let mut response = process(req, &service, &request_id).await;

            // HEAD responses never carry a body, error documents included.
            if is_head {
                *response.body_mut() = S3ResponseBody::empty();
            }

            Ok(common_headers(response, &request_id))
        })
    }
}

/// Run one request through routing, authentication, and dispatch.
async fn process<H: S3Handler>(
    req: http::Request<Incoming>,
    service: &S3HttpService<H>,
    request_id: &str,
) -> http::Response<S3ResponseBody> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    debug!(%method, %uri, request_id, "processing request");

    if method == http::Method::GET && matches!(uri.path(), "/_health" | "/health") {
        return health_response();
    }

    let ctx = match service.router.resolve(&req) {
        Ok(ctx) => ctx,
        Err(err) => {
            warn!(%method, %uri, error = %err, request_id, "failed to route request");
            return error_to_response(&err, request_id);
        }
    };

    let (parts, incoming) = req.into_parts();
    let body = match incoming.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            warn!(error = %err, request_id, "failed to read request body");
            let err = shoreline_model::S3Error::internal_error("Failed to read request body");
            return error_to_response(&err, request_id);
        }
    };

    let body = match &service.authenticator {
        Some(authenticator) => match authenticator.authenticate(&parts, body) {
            Ok(body) => body,
            Err(err) => {
                info!(%method, %uri, code = %err.code, request_id, "authentication rejected");
                return error_to_response(&err, request_id);
            }
        },
        None => body,
    };

    info!(
        operation = %ctx.operation,
        bucket = ?ctx.bucket,
        key = ?ctx.key,
        request_id,
        "serving S3 operation"
    );

    match dispatch_operation(service.handler.as_ref(), parts, body, ctx).await {
        Ok(response) => response,
        Err(err) => {
            debug!(error = %err, request_id, "operation returned error");
            error_to_response(&err, request_id)
        }
    }
}

fn health_response() -> http::Response<S3ResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(S3ResponseBody::from_bytes(Bytes::from_static(
            br#"{"status":"running","service":"s3"}"#,
        )))
        .expect("static health response should be valid")
}

/// Stamp the headers every response carries.
fn common_headers(
    mut response: http::Response<S3ResponseBody>,
    request_id: &str,
) -> http::Response<S3ResponseBody> {
    let headers = response.headers_mut();
    if let Ok(value) = http::header::HeaderValue::from_str(request_id) {
        headers.insert("x-amz-request-id", value);
    }
    headers.insert(
        http::header::SERVER,
        http::header::HeaderValue::from_static("Shoreline"),
    );
    if let Ok(value) = http::header::HeaderValue::from_str(&http_date(&chrono::Utc::now())) {
        headers.insert(http::header::DATE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_produce_health_response() {
        let resp = health_response();
        assert_eq!(resp.status(), http::StatusCode::OK);
        assert_eq!(
            resp.headers().get("content-type").and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
    }

    #[test]
    fn test_should_stamp_common_headers() {
        let resp = http::Response::builder()
            .status(http::StatusCode::OK)
            .body(S3ResponseBody::empty())
            .unwrap();
        let resp = common_headers(resp, "req-42");
        assert_eq!(
            resp.headers().get("x-amz-request-id").and_then(|v| v.to_str().ok()),
            Some("req-42")
        );
        assert_eq!(
            resp.headers().get("server").and_then(|v| v.to_str().ok()),
            Some("Shoreline")
        );
        assert!(resp.headers().contains_key("date"));
    }

    #[test]
    fn test_should_default_config_sensibly() {
        let config = S3HttpConfig::default();
        assert!(config.virtual_hosting);
        assert!(!config.no_auth);
        assert_eq!(config.domain, "s3.localhost");
    }
}
