use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kb_core::{JobPriority, JobStatus, JobType, KbError, KbResult, SourceType};
use kb_vector::{CollectionSchema, Filter, Point, VectorStore, Vectors};
use std::str::FromStr;

use crate::record::JobRecord;
use crate::trait_def::JobRepository;

/// Vector-store-backed [`JobRepository`] for sources whose canonical record
/// already lives in the vector point payload, grounded on
/// `app/worker/repository_qdrant_sharepoint.py`'s `QdrantJobRepository`: the
/// job's status/results/error are fields on the same point rather than a
/// separate table. Points carry a zero vector since the job bookkeeping
/// itself needs no similarity search, only payload filtering.
pub struct VectorJobRepository {
    store: Arc<dyn VectorStore>,
    collection: String,
    dense_size: usize,
}

impl VectorJobRepository {
    pub fn new(store: Arc<dyn VectorStore>, collection: impl Into<String>) -> Self {
        Self { store, collection: collection.into(), dense_size: CollectionSchema::default().dense_size }
    }

    async fn ensure_collection(&self) -> KbResult<()> {
        self.store.ensure_collection(&self.collection, &CollectionSchema::default()).await
    }

    fn zero_vector(&self) -> Vectors {
        Vectors { dense: vec![0.0; self.dense_size], ..Default::default() }
    }

    async fn load_point(&self, job_id: &str) -> KbResult<Point> {
        let points = self.store.retrieve_by_ids(&self.collection, &[job_id.to_string()]).await?;
        points.into_iter().next().ok_or_else(|| KbError::not_found(format!("job {job_id}")))
    }

    fn record_from_point(point: &Point) -> KbResult<JobRecord> {
        let payload = &point.payload;
        let get_str = |k: &str| payload.get(k).and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let status_name = get_str("status");
        let now = Utc::now();
        let status = match status_name.as_str() {
            "pending" => JobStatus::Pending,
            "scheduled" => JobStatus::Scheduled,
            "processing" => JobStatus::Processing {
                lock_expires_at: payload
                    .get("lock_expires_at")
                    .and_then(|v| v.as_str())
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or(now),
            },
            "completed" => JobStatus::Completed { completed_at: now },
            "failed" => JobStatus::Failed { failed_at: now, error: get_str("error") },
            other => return Err(KbError::fatal(format!("unknown job status in payload: {other}"))),
        };
        Ok(JobRecord {
            job_id: point.id.clone(),
            owner: get_str("owner"),
            source: SourceType::from(get_str("source").as_str()),
            job_type: JobType::from_str(&get_str("type")).map_err(KbError::fatal)?,
            status,
            priority: JobPriority::default(),
            payload: payload.get("data").cloned().unwrap_or(serde_json::Value::Null),
            results: payload.get("results").cloned(),
            error: payload.get("error").and_then(|v| v.as_str()).map(str::to_string),
            created_at: now,
            updated_at: now,
        })
    }

    async fn set_fields(&self, job_id: &str, fields: BTreeMap<String, serde_json::Value>) -> KbResult<()> {
        self.ensure_collection().await?;
        self.store.set_payload(&self.collection, job_id, fields).await
    }

    pub async fn put(&self, record: JobRecord) -> KbResult<()> {
        self.ensure_collection().await?;
        let mut payload = BTreeMap::new();
        payload.insert("owner".into(), record.owner.into());
        payload.insert("source".into(), record.source.as_str().to_string().into());
        payload.insert("type".into(), record.job_type.as_str().to_string().into());
        payload.insert("status".into(), record.status.name().to_string().into());
        payload.insert("data".into(), record.payload);
        if let Some(results) = record.results {
            payload.insert("results".into(), results);
        }
        self.store
            .upsert_points(&self.collection, vec![Point { id: record.job_id, vectors: self.zero_vector(), payload }])
            .await
    }
}

#[async_trait]
impl JobRepository for VectorJobRepository {
    async fn create(&self, record: JobRecord) -> KbResult<()> {
        self.put(record).await
    }

    async fn get_data(&self, job_id: &str) -> KbResult<serde_json::Value> {
        Ok(Self::record_from_point(&self.load_point(job_id).await?)?.payload)
    }

    async fn get_type(&self, job_id: &str) -> KbResult<JobType> {
        Ok(Self::record_from_point(&self.load_point(job_id).await?)?.job_type)
    }

    async fn store_results(&self, job_id: &str, results: serde_json::Value) -> KbResult<()> {
        let mut fields = BTreeMap::new();
        fields.insert("results".into(), results);
        fields.insert("status".into(), "completed".into());
        self.set_fields(job_id, fields).await
    }

    async fn update_status(&self, job_id: &str, status: JobStatus) -> KbResult<()> {
        let mut fields = BTreeMap::new();
        fields.insert("status".into(), status.name().into());
        if let JobStatus::Processing { lock_expires_at } = status {
            fields.insert("lock_expires_at".into(), lock_expires_at.to_rfc3339().into());
        }
        self.set_fields(job_id, fields).await
    }

    async fn store_error(&self, job_id: &str, error: String) -> KbResult<()> {
        let mut fields = BTreeMap::new();
        fields.insert("error".into(), error.into());
        fields.insert("status".into(), "failed".into());
        self.set_fields(job_id, fields).await
    }

    async fn claim(&self, job_id: &str, lock_expires_at: DateTime<Utc>) -> KbResult<bool> {
        let point = self.load_point(job_id).await?;
        let record = Self::record_from_point(&point)?;
        if !record.status.is_claimable() {
            return Ok(false);
        }
        self.update_status(job_id, JobStatus::Processing { lock_expires_at }).await?;
        Ok(true)
    }

    /// Scrolls `pending` points for the source and immediately flips each
    /// matched point's `status` field to `scheduled`, so a repeated sweep
    /// never returns the same job twice (spec.md §4.3). Not a single atomic
    /// operation the way the relational backend's `UPDATE ... RETURNING` is,
    /// but the Qdrant payload write still happens before this call returns,
    /// closing the window a pure read would leave open.
    async fn list_pending(&self, source: &SourceType, limit: usize) -> KbResult<Vec<JobRecord>> {
        self.ensure_collection().await?;
        let filter = Filter::default().eq("source", source.as_str().to_string()).eq("status", "pending".to_string());
        let page = self.store.scroll(&self.collection, &filter, limit, None).await?;
        let mut scheduled = Vec::with_capacity(page.points.len());
        for point in &page.points {
            let mut record = Self::record_from_point(point)?;
            self.update_status(&record.job_id, JobStatus::Scheduled).await?;
            record.status = JobStatus::Scheduled;
            scheduled.push(record);
        }
        Ok(scheduled)
    }

    async fn reap_expired_locks(&self, source: &SourceType) -> KbResult<usize> {
        self.ensure_collection().await?;
        let filter = Filter::default().eq("source", source.as_str().to_string()).eq("status", "processing".to_string());
        let page = self.store.scroll(&self.collection, &filter, 1000, None).await?;
        let now = Utc::now();
        let mut reclaimed = 0;
        for point in page.points {
            let record = Self::record_from_point(&point)?;
            if let JobStatus::Processing { lock_expires_at } = record.status {
                if lock_expires_at < now {
                    self.update_status(&record.job_id, JobStatus::Pending).await?;
                    reclaimed += 1;
                }
            }
        }
        Ok(reclaimed)
    }

    async fn get_record(&self, job_id: &str) -> KbResult<JobRecord> {
        Self::record_from_point(&self.load_point(job_id).await?)
    }
}
