use chrono::{DateTime, Utc};
use kb_core::{JobPriority, JobStatus, JobType, SourceType};
use serde::{Deserialize, Serialize};

/// The durable record a [`crate::JobRepository`] stores per task, shared by
/// all three backends regardless of how they physically lay it out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub owner: String,
    pub source: SourceType,
    pub job_type: JobType,
    pub status: JobStatus,
    pub priority: JobPriority,
    pub payload: serde_json::Value,
    pub results: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(job_id: String, owner: String, source: SourceType, job_type: JobType, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            owner,
            source,
            job_type,
            status: JobStatus::Pending,
            priority: JobPriority::default(),
            payload,
            results: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
