use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kb_cache::TwoTierCache;
use kb_core::{JobStatus, JobType, KbError, KbResult, SourceType};

use crate::record::JobRecord;
use crate::trait_def::JobRepository;

const RESULTS_TTL_SECS: u64 = 60 * 60 * 24 * 7;
const RECORD_TTL_SECS: u64 = 60 * 60 * 24 * 7;
const LOCK_TTL_SECS: i64 = 300;

fn record_key(job_id: &str) -> String {
    format!("job:{job_id}:record")
}

/// Default [`JobRepository`] backend: a flat `job:{id}:record` key per job in
/// [`TwoTierCache`], mirroring `app/worker/repository.py`'s `RedisJobRepository`
/// key layout (`job:{id}:data`/`:type`/`:status`/`:results`/`:error`)
/// collapsed into one JSON blob so status/results/error mutations stay
/// atomic at the key instead of needing a multi-key transaction.
pub struct KvJobRepository {
    cache: Arc<TwoTierCache>,
}

impl KvJobRepository {
    pub fn new(cache: Arc<TwoTierCache>) -> Self {
        Self { cache }
    }

    async fn load(&self, job_id: &str) -> KbResult<JobRecord> {
        let body = self
            .cache
            .get(&record_key(job_id))
            .await?
            .ok_or_else(|| KbError::not_found(format!("job {job_id}")))?;
        serde_json::from_str(&body).map_err(KbError::from)
    }

    async fn save(&self, record: &JobRecord) -> KbResult<()> {
        let body = serde_json::to_string(record)?;
        self.cache.setex(&record_key(&record.job_id), RECORD_TTL_SECS, &body).await
    }

    pub async fn put(&self, record: JobRecord) -> KbResult<()> {
        self.save(&record).await
    }
}

#[async_trait]
impl JobRepository for KvJobRepository {
    async fn create(&self, record: JobRecord) -> KbResult<()> {
        self.save(&record).await
    }

    async fn get_data(&self, job_id: &str) -> KbResult<serde_json::Value> {
        Ok(self.load(job_id).await?.payload)
    }

    async fn get_type(&self, job_id: &str) -> KbResult<JobType> {
        Ok(self.load(job_id).await?.job_type)
    }

    async fn store_results(&self, job_id: &str, results: serde_json::Value) -> KbResult<()> {
        let mut record = self.load(job_id).await?;
        record.results = Some(results);
        record.status = JobStatus::Completed { completed_at: Utc::now() };
        record.updated_at = Utc::now();
        self.cache.setex(&record_key(job_id), RESULTS_TTL_SECS, &serde_json::to_string(&record)?).await
    }

    async fn update_status(&self, job_id: &str, status: JobStatus) -> KbResult<()> {
        let mut record = self.load(job_id).await?;
        record.status = status;
        record.updated_at = Utc::now();
        self.save(&record).await
    }

    async fn store_error(&self, job_id: &str, error: String) -> KbResult<()> {
        let mut record = self.load(job_id).await?;
        record.error = Some(error.clone());
        record.status = JobStatus::Failed { failed_at: Utc::now(), error };
        record.updated_at = Utc::now();
        self.save(&record).await
    }

    async fn claim(&self, job_id: &str, lock_expires_at: DateTime<Utc>) -> KbResult<bool> {
        let mut record = self.load(job_id).await?;
        if !record.status.is_claimable() {
            return Ok(false);
        }
        record.status = JobStatus::Processing { lock_expires_at };
        record.updated_at = Utc::now();
        self.save(&record).await?;
        Ok(true)
    }

    /// Scans the `job:*:record` keyspace; acceptable at the poll-fallback
    /// scale this backend targets (spec.md §9), not a substitute for an
    /// indexed query under sustained high job volume. Matched records are
    /// transitioned `Pending -> Scheduled` and saved before returning, so a
    /// repeated sweep never re-lists the same job (spec.md §4.3).
    async fn list_pending(&self, source: &SourceType, limit: usize) -> KbResult<Vec<JobRecord>> {
        let keys = self.cache.keys("job:*:record").await?;
        let mut candidates = Vec::new();
        for key in keys {
            let Some(body) = self.cache.get(&key).await? else { continue };
            let Ok(record) = serde_json::from_str::<JobRecord>(&body) else { continue };
            if &record.source == source && matches!(record.status, JobStatus::Pending) {
                candidates.push(record);
            }
            if candidates.len() >= limit {
                break;
            }
        }
        candidates.sort_by_key(|r| r.created_at);

        let mut scheduled = Vec::with_capacity(candidates.len());
        for mut record in candidates {
            record.status = JobStatus::Scheduled;
            record.updated_at = Utc::now();
            self.save(&record).await?;
            scheduled.push(record);
        }
        Ok(scheduled)
    }

    async fn reap_expired_locks(&self, source: &SourceType) -> KbResult<usize> {
        let keys = self.cache.keys("job:*:record").await?;
        let now = Utc::now();
        let mut reclaimed = 0;
        for key in keys {
            let Some(body) = self.cache.get(&key).await? else { continue };
            let Ok(mut record) = serde_json::from_str::<JobRecord>(&body) else { continue };
            if &record.source != source {
                continue;
            }
            if let JobStatus::Processing { lock_expires_at } = record.status {
                if lock_expires_at < now {
                    record.status = JobStatus::Pending;
                    record.updated_at = now;
                    self.save(&record).await?;
                    reclaimed += 1;
                }
            }
        }
        Ok(reclaimed)
    }

    async fn get_record(&self, job_id: &str) -> KbResult<JobRecord> {
        self.load(job_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_cache::{MemoryDurableTier, MemoryFastTier};

    fn build() -> KvJobRepository {
        let cache = Arc::new(TwoTierCache::new(Arc::new(MemoryFastTier::new()), Arc::new(MemoryDurableTier::new())));
        KvJobRepository::new(cache)
    }

    fn sample() -> JobRecord {
        JobRecord::new("job-1".into(), "alice@example.com".into(), SourceType::Email, JobType::EmailAnalysis, serde_json::json!({"subject": "hi"}))
    }

    #[tokio::test]
    async fn stores_and_loads_a_record() {
        let repo = build();
        repo.put(sample()).await.unwrap();
        assert_eq!(repo.get_type("job-1").await.unwrap(), JobType::EmailAnalysis);
    }

    #[tokio::test]
    async fn claim_transitions_pending_to_processing_once() {
        let repo = build();
        repo.put(sample()).await.unwrap();
        let lock_expires_at = Utc::now() + chrono::Duration::seconds(60);
        assert!(repo.claim("job-1", lock_expires_at).await.unwrap());
        assert!(!repo.claim("job-1", lock_expires_at).await.unwrap());
    }

    #[tokio::test]
    async fn store_error_marks_job_failed() {
        let repo = build();
        repo.put(sample()).await.unwrap();
        repo.store_error("job-1", "boom".into()).await.unwrap();
        let record = repo.get_record("job-1").await.unwrap();
        assert!(matches!(record.status, JobStatus::Failed { .. }));
        assert_eq!(record.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn reap_expired_locks_resets_to_pending() {
        let repo = build();
        let mut record = sample();
        record.status = JobStatus::Processing { lock_expires_at: Utc::now() - chrono::Duration::seconds(1) };
        repo.put(record).await.unwrap();
        let reclaimed = repo.reap_expired_locks(&SourceType::Email).await.unwrap();
        assert_eq!(reclaimed, 1);
        let record = repo.get_record("job-1").await.unwrap();
        assert!(matches!(record.status, JobStatus::Pending));
    }

    #[tokio::test]
    async fn list_pending_filters_by_source_and_claimability() {
        let repo = build();
        repo.put(sample()).await.unwrap();
        let mut done = sample();
        done.job_id = "job-2".into();
        done.status = JobStatus::Completed { completed_at: Utc::now() };
        repo.put(done).await.unwrap();

        let pending = repo.list_pending(&SourceType::Email, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].job_id, "job-1");
    }

    #[tokio::test]
    async fn list_pending_transitions_to_scheduled_and_does_not_repeat() {
        let repo = build();
        repo.put(sample()).await.unwrap();

        let first_sweep = repo.list_pending(&SourceType::Email, 10).await.unwrap();
        assert_eq!(first_sweep.len(), 1);
        assert!(matches!(first_sweep[0].status, JobStatus::Scheduled));

        let record = repo.get_record("job-1").await.unwrap();
        assert!(matches!(record.status, JobStatus::Scheduled));

        let second_sweep = repo.list_pending(&SourceType::Email, 10).await.unwrap();
        assert!(second_sweep.is_empty());
    }
}
