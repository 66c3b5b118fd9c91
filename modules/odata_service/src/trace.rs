//! Request ids and the per-request tracing span.
//!
//! Every request gets an `x-request-id` (generated unless the client sent
//! one) and runs inside an `odata_request` span that names the OData
//! protocol, service and entity set it addresses.

use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Request, Response};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::request_id::{MakeRequestId, RequestId};
use tower_http::trace::{DefaultOnRequest, TraceLayer};
use tracing::field::Empty;
use tracing::Span;

pub fn request_id_header() -> HeaderName {
    HeaderName::from_static("x-request-id")
}

/// Request id carried by `headers`, or `"n/a"`.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(request_id_header())
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| "n/a".to_string())
}

#[derive(Clone, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _req: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Some(RequestId::new(id.parse().ok()?))
    }
}

/// What an OData request path addresses. All parts are empty for paths
/// outside the `/odata/v4` and `/v2` mounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ODataTarget<'a> {
    pub protocol: Option<&'static str>,
    pub service: Option<&'a str>,
    pub entity_set: Option<&'a str>,
}

pub fn odata_target(path: &str) -> ODataTarget<'_> {
    let (protocol, rest) = if let Some(rest) = path.strip_prefix("/odata/v4/") {
        ("v4", rest)
    } else if let Some(rest) = path.strip_prefix("/v2/") {
        ("v2", rest)
    } else {
        return ODataTarget::default();
    };

    let mut segments = rest.split('/');
    let service = segments.next().filter(|s| !s.is_empty());
    // `Books(201)` and `Books/$count` both address `Books`; `$metadata` is no set.
    let entity_set = segments
        .next()
        .map(|s| s.split_once('(').map_or(s, |(name, _)| name))
        .filter(|s| !s.is_empty() && !s.starts_with('$'));

    ODataTarget {
        protocol: service.map(|_| protocol),
        service,
        entity_set: service.and(entity_set),
    }
}

fn make_span(req: &Request<Body>) -> Span {
    let target = odata_target(req.uri().path());
    tracing::info_span!(
        "odata_request",
        method = %req.method(),
        path = %req.uri().path(),
        request_id = %request_id(req.headers()),
        protocol = target.protocol,
        service = target.service,
        entity_set = target.entity_set,
        status = Empty,
        latency_ms = Empty
    )
}

fn record_response(res: &Response<Body>, latency: Duration, span: &Span) {
    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
    span.record("status", res.status().as_u16());
    span.record("latency_ms", latency_ms);
    tracing::debug!(parent: span, status = res.status().as_u16(), latency_ms, "request finished");
}

#[allow(clippy::type_complexity)]
pub fn trace_layer() -> TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    fn(&Request<Body>) -> Span,
    DefaultOnRequest,
    fn(&Response<Body>, Duration, &Span),
> {
    TraceLayer::new_for_http()
        .make_span_with(make_span as fn(&Request<Body>) -> Span)
        .on_response(record_response as fn(&Response<Body>, Duration, &Span))
}
