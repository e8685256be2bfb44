use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JobId, JobMessage, LeaseToken};

/// Job status lifecycle, narrowed to spec.md §3's five states plus the
/// janitor-driven `Processing -> Pending` edge on lock expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Scheduled,
    Processing { lock_expires_at: DateTime<Utc> },
    Completed { completed_at: DateTime<Utc> },
    Failed { failed_at: DateTime<Utc>, error: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, Self::Processing { .. })
    }

    pub fn is_eligible(&self, _now: DateTime<Utc>) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::Processing { .. } => "processing",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Mutable runtime state tracked by the broker for one queued task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub tenant_id: String,
    pub message: JobMessage,
    pub status: JobStatus,
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub lease_token: Option<LeaseToken>,
    pub results: Option<serde_json::Value>,
}

impl JobRecord {
    pub fn new(job_id: JobId, tenant_id: String, message: JobMessage) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            tenant_id,
            message,
            status: JobStatus::Pending,
            attempt: 0,
            created_at: now,
            updated_at: now,
            last_error: None,
            lease_token: None,
            results: None,
        }
    }

    pub fn lock_expires_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            JobStatus::Processing { lock_expires_at } => Some(lock_expires_at),
            _ => None,
        }
    }

    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, JobStatus::Processing { lock_expires_at } if lock_expires_at < now)
    }

    pub fn start_processing(&mut self, lease_token: LeaseToken, lock_expires_at: DateTime<Utc>) {
        self.status = JobStatus::Processing { lock_expires_at };
        self.lease_token = Some(lease_token);
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self, results: serde_json::Value) {
        self.status = JobStatus::Completed { completed_at: Utc::now() };
        self.results = Some(results);
        self.lease_token = None;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, error: String) {
        self.status = JobStatus::Failed { failed_at: Utc::now(), error: error.clone() };
        self.last_error = Some(error);
        self.lease_token = None;
        self.updated_at = Utc::now();
    }

    /// Janitor edge: reclaim an expired lock back to pending for redelivery.
    pub fn reclaim_to_pending(&mut self) {
        self.status = JobStatus::Pending;
        self.lease_token = None;
        self.last_error = Some("lock expired, reclaimed by janitor".to_string());
        self.updated_at = Utc::now();
    }
}

/// A job leased out to a worker for processing.
#[derive(Debug, Clone)]
pub struct LeasedJob {
    pub record: JobRecord,
    pub lease_token: LeaseToken,
    pub lock_expires_at: DateTime<Utc>,
}

impl LeasedJob {
    pub fn job_id(&self) -> &JobId {
        &self.record.job_id
    }

    pub fn message(&self) -> &JobMessage {
        &self.record.message
    }

    pub fn lease_valid(&self, now: DateTime<Utc>) -> bool {
        self.lock_expires_at > now
    }
}
