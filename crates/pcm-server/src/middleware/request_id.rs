//! Request ID middleware for tracing requests.
//!
//! Incoming `x-request-id` values are kept; requests without one get a
//! UUID v4. The id is echoed on the response and recorded on the request's
//! tracing span.

use axum::{extract::Request, middleware::Next, response::Response};
use http::{HeaderName, HeaderValue};
use tower_http::request_id::{MakeRequestId, RequestId, SetRequestIdLayer};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Generate UUID-based request IDs.
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Tower layer for request ID generation.
pub type RequestIdLayer = SetRequestIdLayer<MakeRequestUuid>;

/// Create a new request ID layer.
pub fn request_id_layer() -> RequestIdLayer {
    SetRequestIdLayer::new(HeaderName::from_static(REQUEST_ID_HEADER), MakeRequestUuid)
}

/// Middleware that runs the request inside a span carrying its ID and
/// copies the ID to the response headers.
pub async fn propagate_request_id(request: Request, next: Next) -> Response {
    let request_id = request.headers().get(REQUEST_ID_HEADER).cloned();

    let span = tracing::info_span!(
        "request",
        request_id = request_id
            .as_ref()
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-"),
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span).await;

    if let Some(id) = request_id {
        response.headers_mut().insert(REQUEST_ID_HEADER, id);
    }

    response
}
