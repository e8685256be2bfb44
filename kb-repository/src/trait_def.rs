use async_trait::async_trait;
use kb_core::{JobStatus, KbResult, SourceType};

use crate::record::JobRecord;

/// Storage contract for job data, status, results, and error, grounded on
/// `app/worker/repository.py`'s `JobRepository` interface. Three backends
/// implement it: a KV store (the default), a relational store with
/// row-level locking for high-throughput claim contention, and a vector
/// store for sources whose canonical record already lives there.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Seed a new row at ingestion, grounded on `store_job_data`'s
    /// create-if-absent write. Overwrites any existing row with the same id.
    async fn create(&self, record: JobRecord) -> KbResult<()>;

    async fn get_data(&self, job_id: &str) -> KbResult<serde_json::Value>;

    async fn get_type(&self, job_id: &str) -> KbResult<kb_core::JobType>;

    async fn store_results(&self, job_id: &str, results: serde_json::Value) -> KbResult<()>;

    async fn update_status(&self, job_id: &str, status: JobStatus) -> KbResult<()>;

    async fn store_error(&self, job_id: &str, error: String) -> KbResult<()>;

    /// Atomically transition a claimable job (`Pending`/`Scheduled`) to
    /// `Processing`. Returns `false` if another worker already claimed it.
    async fn claim(&self, job_id: &str, lock_expires_at: chrono::DateTime<chrono::Utc>) -> KbResult<bool>;

    /// One scheduler-sweep page of claimable jobs for a source, oldest first.
    async fn list_pending(&self, source: &SourceType, limit: usize) -> KbResult<Vec<JobRecord>>;

    /// Reset `Processing -> Pending` for jobs whose lock has expired.
    /// Returns the number reclaimed.
    async fn reap_expired_locks(&self, source: &SourceType) -> KbResult<usize>;

    async fn get_record(&self, job_id: &str) -> KbResult<JobRecord>;
}
