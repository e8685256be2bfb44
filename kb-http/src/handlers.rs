use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use kb_core::model::{JobStatus, JobType, SourceType};
use kb_queue::JobMessage;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::{rate_limit_headers, require_permission};
use crate::error::ApiError;
use crate::models::{JobResponse, StatusResponse, SubjectAnalysisRequest};
use crate::state::AppState;

const INGEST_PRIORITY: u8 = 8;

async fn ingest(
    state: &AppState,
    owner: &str,
    job_type: JobType,
    source: SourceType,
    payload: Value,
) -> Result<String, ApiError> {
    let job_id = kb_core::IdGenerator::global().next_id_string();

    let mut record = kb_repository::JobRecord::new(job_id.clone(), owner.to_string(), source.clone(), job_type, payload.clone());
    record.priority = kb_core::JobPriority::new(INGEST_PRIORITY);
    state.repository.create(record).await.map_err(ApiError::from)?;

    let message = JobMessage::new(job_type.as_str(), source.as_str(), owner, payload).with_priority(INGEST_PRIORITY.into());
    state.backend.enqueue(state.queue_ctx(), message).await.map_err(|e| ApiError::from(kb_core::KbError::transient(e.to_string())))?;

    info!(job_id, owner, job_type = job_type.as_str(), "job ingested");
    Ok(job_id)
}

pub async fn analyze_email(State(state): State<AppState>, headers: HeaderMap, Json(email): Json<Value>) -> Result<Response, ApiError> {
    let auth = require_permission(&state, &headers, "analyze").await?;
    let job_id = ingest(&state, &auth.ctx.client_id, JobType::EmailAnalysis, SourceType::Email, email).await?;
    Ok((axum::http::StatusCode::ACCEPTED, rate_limit_headers(&auth.rate_limit), Json(JobResponse::pending(&job_id))).into_response())
}

pub async fn analyze_subjects(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SubjectAnalysisRequest>,
) -> Result<Response, ApiError> {
    let auth = require_permission(&state, &headers, "analyze").await?;
    if req.subjects.is_empty() {
        return Err(ApiError::bad_request("subjects must not be empty"));
    }
    let payload = json!({"subjects": req.subjects, "min_confidence": req.min_confidence});
    let job_id = ingest(&state, &auth.ctx.client_id, JobType::SubjectAnalysis, SourceType::Email, payload).await?;
    Ok((axum::http::StatusCode::ACCEPTED, rate_limit_headers(&auth.rate_limit), Json(JobResponse::pending(&job_id))).into_response())
}

async fn load_owned_record(state: &AppState, headers: &HeaderMap, job_id: &str, permission: &str) -> Result<(kb_repository::JobRecord, crate::auth::Authorized), ApiError> {
    let auth = require_permission(state, headers, permission).await?;
    let record = state.repository.get_record(job_id).await.map_err(|_| ApiError::not_found(format!("job {job_id} not found")))?;
    // Ownership check mirrors the original's client_id comparison: a job
    // belonging to another tenant 404s rather than 403ing, to avoid leaking
    // which job ids exist.
    if record.owner != auth.ctx.client_id {
        return Err(ApiError::not_found(format!("job {job_id} not found")));
    }
    Ok((record, auth))
}

pub async fn get_status(State(state): State<AppState>, headers: HeaderMap, Path(job_id): Path<String>) -> Result<Response, ApiError> {
    let (record, auth) = load_owned_record(&state, &headers, &job_id, "status").await?;

    let progress = record.status.progress_estimate();
    let response = match &record.status {
        JobStatus::Completed { .. } => StatusResponse {
            job_id: record.job_id.clone(),
            status: "completed",
            progress,
            results_url: Some(format!("/api/v1/results/{}", record.job_id)),
            error: None,
        },
        JobStatus::Failed { error, .. } => {
            StatusResponse { job_id: record.job_id.clone(), status: "failed", progress, results_url: None, error: Some(error.clone()) }
        }
        other => StatusResponse { job_id: record.job_id.clone(), status: other.name(), progress, results_url: None, error: None },
    };

    Ok((rate_limit_headers(&auth.rate_limit), Json(response)).into_response())
}

pub async fn get_results(State(state): State<AppState>, headers: HeaderMap, Path(job_id): Path<String>) -> Result<Response, ApiError> {
    let (record, auth) = load_owned_record(&state, &headers, &job_id, "results").await?;

    if !matches!(record.status, JobStatus::Completed { .. }) {
        warn!(job_id, status = record.status.name(), "results requested before job completed");
        return Err(ApiError::not_found(format!("results for job {job_id} not available yet")));
    }

    let results = record.results.ok_or_else(|| ApiError::not_found(format!("results for job {job_id} not found")))?;

    // Subject analysis already shapes its own `{results, job_id}` envelope
    // (kb-processors::SubjectAnalysisProcessor); email analysis is wrapped
    // under an `analysis` key, matching the original's dispatch on job type.
    let body = match record.job_type {
        JobType::SubjectAnalysis => results,
        _ => json!({"analysis": results}),
    };

    Ok((rate_limit_headers(&auth.rate_limit), Json(body)).into_response())
}

pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub async fn health_detailed(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    require_permission(&state, &headers, "manage_keys").await?;

    let cache_ok = state.cache.ping().await;
    let vector_ok = state.vector_store.ping().await;
    let all_ok = cache_ok && vector_ok;

    Ok(Json(json!({
        "status": if all_ok { "ok" } else { "degraded" },
        "components": {
            "api": "ok",
            "cache": if cache_ok { "ok" } else { "error" },
            "vector_store": if vector_ok { "ok" } else { "error" },
        },
        "timestamp": Utc::now().timestamp(),
    })))
}
