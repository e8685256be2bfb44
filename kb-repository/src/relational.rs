#![cfg(feature = "relational-backend")]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kb_core::{JobPriority, JobStatus, JobType, KbError, KbResult, SourceType};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Row};
use std::str::FromStr;

use crate::record::JobRecord;
use crate::trait_def::JobRepository;

/// Relational [`JobRepository`] backend for deployments that already run
/// Postgres as their system of record, grounded on
/// `app/worker/repository_postgres.py`. Claim contention is resolved with
/// `SELECT ... FOR UPDATE SKIP LOCKED` so concurrent workers never block on
/// each other, only race to acquire distinct rows.
pub struct RelationalJobRepository {
    pool: PgPool,
}

#[derive(FromRow)]
struct Row_ {
    job_id: String,
    owner: String,
    source: String,
    job_type: String,
    status: String,
    lock_expires_at: Option<DateTime<Utc>>,
    priority: i16,
    payload: serde_json::Value,
    results: Option<serde_json::Value>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Row_ {
    fn into_record(self) -> KbResult<JobRecord> {
        let status = match self.status.as_str() {
            "pending" => JobStatus::Pending,
            "scheduled" => JobStatus::Scheduled,
            "processing" => JobStatus::Processing { lock_expires_at: self.lock_expires_at.unwrap_or_else(Utc::now) },
            "completed" => JobStatus::Completed { completed_at: self.updated_at },
            "failed" => JobStatus::Failed { failed_at: self.updated_at, error: self.error.clone().unwrap_or_default() },
            other => return Err(KbError::fatal(format!("unknown job status in row: {other}"))),
        };
        Ok(JobRecord {
            job_id: self.job_id,
            owner: self.owner,
            source: SourceType::from(self.source.as_str()),
            job_type: JobType::from_str(&self.job_type).map_err(KbError::fatal)?,
            status,
            priority: JobPriority::new(self.priority.clamp(0, 255) as u8),
            payload: self.payload,
            results: self.results,
            error: self.error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl RelationalJobRepository {
    pub async fn connect(database_url: &str) -> KbResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| KbError::fatal(format!("postgres connect failed: {e}")))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl JobRepository for RelationalJobRepository {
    async fn create(&self, record: JobRecord) -> KbResult<()> {
        sqlx::query(
            "INSERT INTO jobs (job_id, owner, source, job_type, status, priority, payload, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, 'pending', $5, $6, $7, $7) \
             ON CONFLICT (job_id) DO UPDATE SET payload = EXCLUDED.payload, updated_at = EXCLUDED.updated_at",
        )
        .bind(&record.job_id)
        .bind(&record.owner)
        .bind(record.source.as_str())
        .bind(record.job_type.as_str())
        .bind(record.priority.value() as i16)
        .bind(&record.payload)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| KbError::transient(e.to_string()))?;
        Ok(())
    }

    async fn get_data(&self, job_id: &str) -> KbResult<serde_json::Value> {
        let row = sqlx::query("SELECT payload FROM jobs WHERE job_id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| KbError::transient(e.to_string()))?
            .ok_or_else(|| KbError::not_found(format!("job {job_id}")))?;
        Ok(row.try_get("payload").map_err(|e| KbError::fatal(e.to_string()))?)
    }

    async fn get_type(&self, job_id: &str) -> KbResult<JobType> {
        let row = sqlx::query("SELECT job_type FROM jobs WHERE job_id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| KbError::transient(e.to_string()))?
            .ok_or_else(|| KbError::not_found(format!("job {job_id}")))?;
        let job_type: String = row.try_get("job_type").map_err(|e| KbError::fatal(e.to_string()))?;
        JobType::from_str(&job_type).map_err(KbError::fatal)
    }

    async fn store_results(&self, job_id: &str, results: serde_json::Value) -> KbResult<()> {
        sqlx::query("UPDATE jobs SET results = $2, status = 'completed', updated_at = now() WHERE job_id = $1")
            .bind(job_id)
            .bind(results)
            .execute(&self.pool)
            .await
            .map_err(|e| KbError::transient(e.to_string()))?;
        Ok(())
    }

    async fn update_status(&self, job_id: &str, status: JobStatus) -> KbResult<()> {
        let lock_expires_at = match &status {
            JobStatus::Processing { lock_expires_at } => Some(*lock_expires_at),
            _ => None,
        };
        sqlx::query("UPDATE jobs SET status = $2, lock_expires_at = $3, updated_at = now() WHERE job_id = $1")
            .bind(job_id)
            .bind(status.name())
            .bind(lock_expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| KbError::transient(e.to_string()))?;
        Ok(())
    }

    async fn store_error(&self, job_id: &str, error: String) -> KbResult<()> {
        sqlx::query("UPDATE jobs SET error = $2, status = 'failed', updated_at = now() WHERE job_id = $1")
            .bind(job_id)
            .bind(error)
            .execute(&self.pool)
            .await
            .map_err(|e| KbError::transient(e.to_string()))?;
        Ok(())
    }

    async fn claim(&self, job_id: &str, lock_expires_at: DateTime<Utc>) -> KbResult<bool> {
        let mut tx = self.pool.begin().await.map_err(|e| KbError::transient(e.to_string()))?;
        let row = sqlx::query("SELECT status FROM jobs WHERE job_id = $1 FOR UPDATE SKIP LOCKED")
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| KbError::transient(e.to_string()))?;
        let Some(row) = row else { return Ok(false) };
        let status: String = row.try_get("status").map_err(|e| KbError::fatal(e.to_string()))?;
        if status != "pending" && status != "scheduled" {
            return Ok(false);
        }
        sqlx::query("UPDATE jobs SET status = 'processing', lock_expires_at = $2, updated_at = now() WHERE job_id = $1")
            .bind(job_id)
            .bind(lock_expires_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| KbError::transient(e.to_string()))?;
        tx.commit().await.map_err(|e| KbError::transient(e.to_string()))?;
        Ok(true)
    }

    /// Claims a page of `pending` rows into `scheduled` in one statement: the
    /// CTE locks candidate rows with `FOR UPDATE SKIP LOCKED` (same pattern as
    /// [`Self::claim`]) so two concurrent sweeps never return the same job,
    /// and the enclosing `UPDATE ... RETURNING` makes the read and the
    /// transition atomic (spec.md §4.3).
    async fn list_pending(&self, source: &SourceType, limit: usize) -> KbResult<Vec<JobRecord>> {
        let rows: Vec<Row_> = sqlx::query_as(
            "WITH claimed AS ( \
                 SELECT job_id FROM jobs \
                 WHERE source = $1 AND status = 'pending' \
                 ORDER BY created_at ASC LIMIT $2 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             UPDATE jobs SET status = 'scheduled', updated_at = now() \
             FROM claimed WHERE jobs.job_id = claimed.job_id \
             RETURNING jobs.job_id, jobs.owner, jobs.source, jobs.job_type, jobs.status, jobs.lock_expires_at, \
                       jobs.priority, jobs.payload, jobs.results, jobs.error, jobs.created_at, jobs.updated_at",
        )
        .bind(source.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| KbError::transient(e.to_string()))?;
        rows.into_iter().map(Row_::into_record).collect()
    }

    async fn reap_expired_locks(&self, source: &SourceType) -> KbResult<usize> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'pending', lock_expires_at = NULL, updated_at = now() \
             WHERE source = $1 AND status = 'processing' AND lock_expires_at < now()",
        )
        .bind(source.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| KbError::transient(e.to_string()))?;
        Ok(result.rows_affected() as usize)
    }

    async fn get_record(&self, job_id: &str) -> KbResult<JobRecord> {
        let row: Row_ = sqlx::query_as(
            "SELECT job_id, owner, source, job_type, status, lock_expires_at, priority, payload, results, error, created_at, updated_at \
             FROM jobs WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| KbError::transient(e.to_string()))?
        .ok_or_else(|| KbError::not_found(format!("job {job_id}")))?;
        row.into_record()
    }
}
