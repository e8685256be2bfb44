use axum::middleware as axum_middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::{request_context, security_headers};
use crate::state::AppState;

/// Builds the HTTP edge router, grounded on `dog-axum`'s `AxumApp` wiring:
/// request-id assurance and security headers wrap every route, with tracing
/// around the whole stack.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/analyze", post(handlers::analyze_email))
        .route("/api/v1/analyze/subjects", post(handlers::analyze_subjects))
        .route("/api/v1/status/{job_id}", get(handlers::get_status))
        .route("/api/v1/results/{job_id}", get(handlers::get_results))
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/health/detailed", get(handlers::health_detailed))
        .layer(axum_middleware::from_fn(security_headers))
        .layer(axum_middleware::from_fn(request_context))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
