use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobId;

/// Minimal stable event protocol for structured observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobEvent {
    Enqueued { job_id: JobId, tenant_id: String, queue: String, job_type: String, at: DateTime<Utc> },
    Leased { job_id: JobId, lock_expires_at: DateTime<Utc>, at: DateTime<Utc> },
    /// Janitor reset `Processing -> Pending` on lock expiry.
    Reclaimed { job_id: JobId, at: DateTime<Utc> },
    Completed { job_id: JobId, at: DateTime<Utc> },
    Failed { job_id: JobId, error: String, at: DateTime<Utc> },
}

impl JobEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Enqueued { .. } => "enqueued",
            Self::Leased { .. } => "leased",
            Self::Reclaimed { .. } => "reclaimed",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn job_id(&self) -> &JobId {
        match self {
            Self::Enqueued { job_id, .. }
            | Self::Leased { job_id, .. }
            | Self::Reclaimed { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::Failed { job_id, .. } => job_id,
        }
    }

    pub fn timestamp(&self) -> &DateTime<Utc> {
        match self {
            Self::Enqueued { at, .. }
            | Self::Leased { at, .. }
            | Self::Reclaimed { at, .. }
            | Self::Completed { at, .. }
            | Self::Failed { at, .. } => at,
        }
    }
}
