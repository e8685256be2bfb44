use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use tokio_stream::empty;

use crate::{
    backend::{BoxStream, QueueBackend},
    types::LeaseToken,
    JobEvent, JobId, JobMessage, JobRecord, JobStatus, LeasedJob, QueueCapabilities, QueueCtx, QueueError, QueueResult,
};

const LOCK_TTL_SECS: i64 = 300;

fn record_key(job_id: &JobId) -> String {
    format!("kb:queue:job:{job_id}")
}

fn list_key(tenant_id: &str, queue: &str) -> String {
    format!("kb:queue:list:{tenant_id}:{queue}")
}

/// Redis-backed broker grounded on `app/celery/worker.py`'s Celery/Redis
/// broker: a per-tenant/queue list for delivery, job records in a flat
/// keyspace. Priority is honored at enqueue time (LPUSH for high priority,
/// RPUSH otherwise) rather than via Celery's native priority queues.
pub struct RedisBackend {
    connection_manager: redis::aio::ConnectionManager,
}

impl RedisBackend {
    pub async fn connect(url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(url).map_err(|e| QueueError::Internal(e.to_string()))?;
        let connection_manager = client.get_connection_manager().await.map_err(|e| QueueError::Internal(e.to_string()))?;
        Ok(Self { connection_manager })
    }

    async fn save(&self, record: &JobRecord) -> QueueResult<()> {
        let mut conn = self.connection_manager.clone();
        let body = serde_json::to_string(record)?;
        conn.set::<_, _, ()>(record_key(&record.job_id), body).await.map_err(|e| QueueError::Internal(e.to_string()))
    }

    async fn load(&self, job_id: &JobId) -> QueueResult<JobRecord> {
        let mut conn = self.connection_manager.clone();
        let body: Option<String> = conn.get(record_key(job_id)).await.map_err(|e| QueueError::Internal(e.to_string()))?;
        let body = body.ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl QueueBackend for RedisBackend {
    async fn enqueue(&self, ctx: QueueCtx, message: JobMessage) -> QueueResult<JobId> {
        let job_id = JobId::new();
        let record = JobRecord::new(job_id.clone(), ctx.tenant_id.clone(), message.clone());
        self.save(&record).await?;

        let mut conn = self.connection_manager.clone();
        let key = list_key(&ctx.tenant_id, &message.queue);
        if message.priority.as_u8() >= 8 {
            conn.lpush::<_, _, ()>(&key, job_id.to_string()).await
        } else {
            conn.rpush::<_, _, ()>(&key, job_id.to_string()).await
        }
        .map_err(|e| QueueError::Internal(e.to_string()))?;

        Ok(job_id)
    }

    async fn dequeue(&self, ctx: QueueCtx, queues: &[&str]) -> QueueResult<Option<LeasedJob>> {
        let mut conn = self.connection_manager.clone();
        for queue_name in queues {
            let key = list_key(&ctx.tenant_id, queue_name);
            let popped: Option<String> = conn
                .lpop(&key, std::num::NonZeroUsize::new(1))
                .await
                .map_err(|e| QueueError::Internal(e.to_string()))?;
            let Some(job_id_str) = popped else { continue };
            let job_id = JobId::from(job_id_str);

            let mut record = self.load(&job_id).await?;
            if !matches!(record.status, JobStatus::Pending) {
                continue;
            }

            let now = Utc::now();
            let lease_token = LeaseToken::new();
            let lock_expires_at = now + chrono::Duration::seconds(LOCK_TTL_SECS);
            record.attempt += 1;
            record.start_processing(lease_token.clone(), lock_expires_at);
            self.save(&record).await?;

            return Ok(Some(LeasedJob { record, lease_token, lock_expires_at }));
        }
        Ok(None)
    }

    async fn ack_complete(&self, ctx: QueueCtx, job_id: JobId, lease_token: LeaseToken, results: serde_json::Value) -> QueueResult<()> {
        let mut record = self.load(&job_id).await?;
        if record.tenant_id != ctx.tenant_id {
            return Err(QueueError::JobNotFound(job_id.to_string()));
        }
        if record.status.is_terminal() {
            return Err(QueueError::JobAlreadyTerminal);
        }
        if record.lease_token.as_ref() != Some(&lease_token) {
            return Err(QueueError::InvalidLeaseToken);
        }
        record.complete(results);
        self.save(&record).await
    }

    async fn ack_fail(&self, ctx: QueueCtx, job_id: JobId, lease_token: LeaseToken, error: String) -> QueueResult<()> {
        let mut record = self.load(&job_id).await?;
        if record.tenant_id != ctx.tenant_id {
            return Err(QueueError::JobNotFound(job_id.to_string()));
        }
        if record.status.is_terminal() {
            return Err(QueueError::JobAlreadyTerminal);
        }
        if record.lease_token.as_ref() != Some(&lease_token) {
            return Err(QueueError::InvalidLeaseToken);
        }
        record.fail(error);
        self.save(&record).await
    }

    async fn cancel(&self, ctx: QueueCtx, job_id: JobId) -> QueueResult<bool> {
        let mut record = self.load(&job_id).await?;
        if record.tenant_id != ctx.tenant_id {
            return Err(QueueError::JobNotFound(job_id.to_string()));
        }
        if record.status.is_terminal() {
            return Ok(false);
        }
        record.fail("canceled by operator".to_string());
        self.save(&record).await?;
        Ok(true)
    }

    async fn get_status(&self, ctx: QueueCtx, job_id: JobId) -> QueueResult<JobStatus> {
        let record = self.load(&job_id).await?;
        if record.tenant_id != ctx.tenant_id {
            return Err(QueueError::JobNotFound(job_id.to_string()));
        }
        Ok(record.status)
    }

    async fn get_record(&self, ctx: QueueCtx, job_id: JobId) -> QueueResult<JobRecord> {
        let record = self.load(&job_id).await?;
        if record.tenant_id != ctx.tenant_id {
            return Err(QueueError::JobNotFound(job_id.to_string()));
        }
        Ok(record)
    }

    fn event_stream(&self, _ctx: QueueCtx) -> BoxStream<JobEvent> {
        // No server-side fan-out in the Redis backend; operators poll get_status.
        Box::pin(empty())
    }

    fn capabilities(&self) -> QueueCapabilities {
        QueueCapabilities { delayed: false, scheduled_at: false, cancel: true, lease_extend: false, priority: true, idempotency: false, dead_letter_queue: false }
    }
}
