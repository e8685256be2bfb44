use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::{
    backend::{BoxStream, QueueBackend},
    types::LeaseToken,
    JobEvent, JobId, JobMessage, JobRecord, JobStatus, LeasedJob, QueueCapabilities, QueueCtx, QueueError, QueueResult,
};

const LOCK_TTL_SECS: i64 = 300;

type TenantQueues = HashMap<String, HashMap<String, VecDeque<JobId>>>;
type IdempotencyMap = HashMap<(String, String, String, String), JobId>;

/// In-memory backend for testing and single-process development.
pub struct MemoryBackend {
    pub(crate) jobs: Arc<RwLock<HashMap<JobId, JobRecord>>>,
    pub(crate) queues: Arc<RwLock<TenantQueues>>,
    pub(crate) idempotency: Arc<RwLock<IdempotencyMap>>,
    pub(crate) event_broadcaster: broadcast::Sender<JobEvent>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (event_broadcaster, _) = broadcast::channel(1000);
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            queues: Arc::new(RwLock::new(HashMap::new())),
            idempotency: Arc::new(RwLock::new(HashMap::new())),
            event_broadcaster,
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryBackend {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
            queues: self.queues.clone(),
            idempotency: self.idempotency.clone(),
            event_broadcaster: self.event_broadcaster.clone(),
        }
    }
}

#[async_trait]
impl QueueBackend for MemoryBackend {
    async fn enqueue(&self, ctx: QueueCtx, message: JobMessage) -> QueueResult<JobId> {
        if let Some(ref key) = message.idempotency_key {
            let scope = (ctx.tenant_id.clone(), message.queue.clone(), message.job_type.clone(), key.clone());
            if let Some(existing_job_id) = self.idempotency.read().get(&scope).cloned() {
                let jobs = self.jobs.read();
                if let Some(existing) = jobs.get(&existing_job_id) {
                    if !existing.status.is_terminal() {
                        return Ok(existing_job_id);
                    }
                }
            }
        }

        let job_id = JobId::new();
        let now = Utc::now();
        let record = JobRecord::new(job_id.clone(), ctx.tenant_id.clone(), message.clone());
        self.jobs.write().insert(job_id.clone(), record);

        let mut queues = self.queues.write();
        let tenant_queues = queues.entry(ctx.tenant_id.clone()).or_default();
        let queue = tenant_queues.entry(message.queue.clone()).or_default();

        let insert_pos = {
            let jobs = self.jobs.read();
            queue
                .iter()
                .position(|existing_job_id| {
                    jobs.get(existing_job_id)
                        .map(|existing| message.priority > existing.message.priority)
                        .unwrap_or(true)
                })
                .unwrap_or(queue.len())
        };
        queue.insert(insert_pos, job_id.clone());

        if let Some(ref key) = message.idempotency_key {
            let scope = (ctx.tenant_id.clone(), message.queue.clone(), message.job_type.clone(), key.clone());
            self.idempotency.write().insert(scope, job_id.clone());
        }

        let _ = self.event_broadcaster.send(JobEvent::Enqueued {
            job_id: job_id.clone(),
            tenant_id: ctx.tenant_id,
            queue: message.queue,
            job_type: message.job_type,
            at: now,
        });

        Ok(job_id)
    }

    async fn dequeue(&self, ctx: QueueCtx, queues: &[&str]) -> QueueResult<Option<LeasedJob>> {
        let now = Utc::now();

        for queue_name in queues {
            let job_id = {
                let mut queues_lock = self.queues.write();
                let Some(tenant_queues) = queues_lock.get_mut(&ctx.tenant_id) else { continue };
                let Some(queue) = tenant_queues.get_mut(*queue_name) else { continue };

                let mut found = None;
                for (index, candidate) in queue.iter().enumerate() {
                    let jobs = self.jobs.read();
                    if let Some(record) = jobs.get(candidate) {
                        if matches!(record.status, JobStatus::Pending) {
                            found = Some(index);
                            break;
                        }
                    }
                }
                found.and_then(|index| queue.remove(index))
            };

            let Some(job_id) = job_id else { continue };
            let mut jobs = self.jobs.write();
            if let Some(record) = jobs.get_mut(&job_id) {
                if !matches!(record.status, JobStatus::Pending) {
                    continue;
                }
                let lease_token = LeaseToken::new();
                let lock_expires_at = now + chrono::Duration::seconds(LOCK_TTL_SECS);
                record.attempt += 1;
                record.start_processing(lease_token.clone(), lock_expires_at);

                let _ = self.event_broadcaster.send(JobEvent::Leased { job_id: job_id.clone(), lock_expires_at, at: now });

                return Ok(Some(LeasedJob { record: record.clone(), lease_token, lock_expires_at }));
            }
        }

        Ok(None)
    }

    async fn ack_complete(&self, ctx: QueueCtx, job_id: JobId, lease_token: LeaseToken, results: serde_json::Value) -> QueueResult<()> {
        let now = Utc::now();
        let mut jobs = self.jobs.write();
        let record = jobs.get_mut(&job_id).ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))?;

        if record.tenant_id != ctx.tenant_id {
            return Err(QueueError::JobNotFound(job_id.to_string()));
        }
        if record.status.is_terminal() {
            return Err(QueueError::JobAlreadyTerminal);
        }
        if record.lease_token.as_ref() != Some(&lease_token) {
            return Err(QueueError::InvalidLeaseToken);
        }
        if let Some(lock_expires_at) = record.lock_expires_at() {
            if now > lock_expires_at {
                return Err(QueueError::LeaseExpired);
            }
        }

        record.complete(results);
        let _ = self.event_broadcaster.send(JobEvent::Completed { job_id, at: now });
        Ok(())
    }

    async fn ack_fail(&self, ctx: QueueCtx, job_id: JobId, lease_token: LeaseToken, error: String) -> QueueResult<()> {
        let now = Utc::now();
        let mut jobs = self.jobs.write();
        let record = jobs.get_mut(&job_id).ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))?;

        if record.tenant_id != ctx.tenant_id {
            return Err(QueueError::JobNotFound(job_id.to_string()));
        }
        if record.status.is_terminal() {
            return Err(QueueError::JobAlreadyTerminal);
        }
        if record.lease_token.as_ref() != Some(&lease_token) {
            return Err(QueueError::InvalidLeaseToken);
        }

        record.fail(error.clone());
        let _ = self.event_broadcaster.send(JobEvent::Failed { job_id, error, at: now });
        Ok(())
    }

    async fn cancel(&self, ctx: QueueCtx, job_id: JobId) -> QueueResult<bool> {
        let now = Utc::now();
        let mut jobs = self.jobs.write();
        let record = jobs.get_mut(&job_id).ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))?;

        if record.tenant_id != ctx.tenant_id {
            return Err(QueueError::JobNotFound(job_id.to_string()));
        }
        if record.status.is_terminal() {
            return Ok(false);
        }

        record.fail("canceled by operator".to_string());
        let _ = self.event_broadcaster.send(JobEvent::Failed { job_id, error: "canceled by operator".to_string(), at: now });
        Ok(true)
    }

    async fn get_status(&self, ctx: QueueCtx, job_id: JobId) -> QueueResult<JobStatus> {
        let jobs = self.jobs.read();
        let record = jobs.get(&job_id).ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))?;
        if record.tenant_id != ctx.tenant_id {
            return Err(QueueError::JobNotFound(job_id.to_string()));
        }
        Ok(record.status.clone())
    }

    async fn get_record(&self, ctx: QueueCtx, job_id: JobId) -> QueueResult<JobRecord> {
        let jobs = self.jobs.read();
        let record = jobs.get(&job_id).ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))?;
        if record.tenant_id != ctx.tenant_id {
            return Err(QueueError::JobNotFound(job_id.to_string()));
        }
        Ok(record.clone())
    }

    fn event_stream(&self, _ctx: QueueCtx) -> BoxStream<JobEvent> {
        let receiver = self.event_broadcaster.subscribe();
        use tokio_stream::{wrappers::BroadcastStream, StreamExt};
        Box::pin(BroadcastStream::new(receiver).filter_map(|result| result.ok()))
    }

    fn capabilities(&self) -> QueueCapabilities {
        QueueCapabilities { delayed: true, scheduled_at: true, cancel: true, lease_extend: false, priority: true, idempotency: true, dead_letter_queue: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobMessage;

    fn ctx() -> QueueCtx {
        QueueCtx::new("tenant-1".to_string())
    }

    fn message() -> JobMessage {
        JobMessage::new("embedding", "email", "tenant-1", serde_json::json!({"subject": "hi"}))
    }

    #[tokio::test]
    async fn enqueue_then_dequeue_leases_the_job() {
        let backend = MemoryBackend::new();
        let job_id = backend.enqueue(ctx(), message()).await.unwrap();
        let leased = backend.dequeue(ctx(), &["default"]).await.unwrap().unwrap();
        assert_eq!(*leased.job_id(), job_id);
        assert_eq!(leased.record.attempt, 1);
    }

    #[tokio::test]
    async fn idempotency_key_dedupes_non_terminal_jobs() {
        let backend = MemoryBackend::new();
        let message = message().with_idempotency_key("dedupe-1");
        let job_id1 = backend.enqueue(ctx(), message.clone()).await.unwrap();
        let job_id2 = backend.enqueue(ctx(), message).await.unwrap();
        assert_eq!(job_id1, job_id2);
    }

    #[tokio::test]
    async fn cancel_marks_non_terminal_jobs_failed() {
        let backend = MemoryBackend::new();
        let job_id = backend.enqueue(ctx(), message()).await.unwrap();
        assert!(backend.cancel(ctx(), job_id.clone()).await.unwrap());
        let status = backend.get_status(ctx(), job_id).await.unwrap();
        assert!(matches!(status, JobStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn ack_complete_requires_matching_lease_token() {
        let backend = MemoryBackend::new();
        let job_id = backend.enqueue(ctx(), message()).await.unwrap();
        backend.dequeue(ctx(), &["default"]).await.unwrap();
        let bogus = LeaseToken::new();
        let result = backend.ack_complete(ctx(), job_id, bogus, serde_json::json!({})).await;
        assert!(matches!(result, Err(QueueError::InvalidLeaseToken)));
    }
}
