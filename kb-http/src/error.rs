//! The `{error:{code,message,details,request_id}}` envelope spec.md §6
//! requires for the 429 body, generalized to every error path the edge
//! returns.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kb_core::KbError;
use serde_json::{json, Value};

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Value>,
    request_id: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into(), details: None, request_id: None }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_failed", message)
    }

    /// spec.md §6's literal rate-limit body shape.
    pub fn rate_limit_exceeded(limit: u32, reset_at_unix: i64) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded", "rate limit exceeded")
            .with_details(json!({"limit": limit, "period": "minute", "reset_at": reset_at_unix}))
    }
}

impl From<KbError> for ApiError {
    fn from(e: KbError) -> Self {
        match e {
            KbError::Validation(msg) => ApiError::bad_request(msg),
            KbError::Authorization(msg) => ApiError::unauthorized(msg),
            KbError::RateLimited { retry_after_secs } => {
                Self::new(StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded", "rate limit exceeded")
                    .with_details(json!({"retry_after_secs": retry_after_secs}))
            }
            KbError::NotFound(msg) => ApiError::not_found(msg),
            KbError::Transient(msg) => Self::new(StatusCode::SERVICE_UNAVAILABLE, "transient_error", msg),
            KbError::Fatal(msg) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "details": self.details,
                "request_id": self.request_id.unwrap_or_default(),
            }
        });
        (self.status, Json(body)).into_response()
    }
}
