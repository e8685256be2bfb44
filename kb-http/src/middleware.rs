//! Request-id/trace-id and security-header middleware, carried over in
//! spirit from `dog-axum::app::ensure_request_id` and generalized to also
//! mint the `X-Trace-ID` header spec.md §6 requires.

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use kb_core::IdGenerator;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Carried in request extensions so handlers can stamp both ids onto log
/// events and error bodies without re-parsing headers.
#[derive(Debug, Clone)]
pub struct RequestIdContext {
    pub request_id: String,
    pub trace_id: String,
}

pub async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    let request_id_name = HeaderName::from_static(REQUEST_ID_HEADER);
    let trace_id_name = HeaderName::from_static(TRACE_ID_HEADER);

    let request_id = req
        .headers()
        .get(&request_id_name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let trace_id = req
        .headers()
        .get(&trace_id_name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| IdGenerator::global().next_id_string());

    req.extensions_mut().insert(RequestIdContext { request_id: request_id.clone(), trace_id: trace_id.clone() });

    let mut res = next.run(req).await;

    if let Ok(v) = HeaderValue::from_str(&request_id) {
        res.headers_mut().entry(request_id_name).or_insert(v);
    }
    if let Ok(v) = HeaderValue::from_str(&trace_id) {
        res.headers_mut().entry(trace_id_name).or_insert(v);
    }
    res
}

/// The "standard security headers" spec.md §6 names without enumerating;
/// values taken from the original FastAPI middleware stack.
pub async fn security_headers(req: Request<Body>, next: Next) -> Response {
    let mut res = next.run(req).await;
    let headers = res.headers_mut();
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    res
}
