//! Request/response bodies, grounded on `app/models/email.py`'s
//! `EmailSchema`/`JobResponse`/`StatusResponse`/`SubjectAnalysisRequest`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct SubjectAnalysisRequest {
    pub subjects: Vec<String>,
    #[serde(default)]
    pub min_confidence: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobResponse {
    pub job_id: String,
    pub status: &'static str,
    pub status_url: String,
}

impl JobResponse {
    pub fn pending(job_id: &str) -> Self {
        Self { job_id: job_id.to_string(), status: "pending", status_url: format!("/api/v1/status/{job_id}") }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub job_id: String,
    pub status: &'static str,
    pub progress: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
