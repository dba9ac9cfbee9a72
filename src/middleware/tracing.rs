// ABOUTME: Request tracing helpers for correlation and structured logging
// ABOUTME: Generates request IDs and creates spans for HTTP requests and background jobs

use std::time::Duration;

use http::{HeaderName, HeaderValue, Request, Response};
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::Span;
use uuid::Uuid;

/// Header carrying the correlation id in both directions
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Generates `req_<uuid>` ids for requests that arrive without one
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = format!("req_{}", Uuid::new_v4().simple());
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Create a tracing span for HTTP requests
///
/// Used as the `make_span_with` hook of `TraceLayer`; the request id header is
/// already set by `SetRequestIdLayer` when this runs.
pub fn create_request_span<B>(request: &Request<B>) -> Span {
    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id,
        user_id = tracing::field::Empty,
        auth_method = tracing::field::Empty,
        success = tracing::field::Empty,
        status_code = tracing::field::Empty,
        duration_ms = tracing::field::Empty,
    )
}

/// `on_response` hook of `TraceLayer`: fills in the outcome fields of the request span
pub fn record_response<B>(response: &Response<B>, latency: Duration, span: &Span) {
    span.record("status_code", response.status().as_u16());
    span.record("duration_ms", u64::try_from(latency.as_millis()).unwrap_or(u64::MAX));
    tracing::debug!(
        status_code = response.status().as_u16(),
        duration_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
        "Request finished"
    );
}

/// Create a tracing span for one delivery attempt of a background job
pub fn create_job_span(job_id: Uuid, kind: &str, attempt: u32) -> Span {
    tracing::info_span!(
        "job",
        job_id = %job_id,
        kind = %kind,
        attempt = attempt,
        duration_ms = tracing::field::Empty,
        success = tracing::field::Empty,
    )
}
