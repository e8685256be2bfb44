use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::{backend::memory::storage::MemoryBackend, JobEvent, JobStatus, QueueResult};

const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Periodic janitor that resets `Processing -> Pending` on lock expiry
/// (spec.md §4.1 invariant, §4.7 state machine), bounding broker
/// redelivery at [`MAX_DELIVERY_ATTEMPTS`] before giving up permanently.
pub struct JobReaper {
    backend: Arc<MemoryBackend>,
    interval: Duration,
}

impl JobReaper {
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self { backend, interval: Duration::from_secs(30) }
    }

    pub fn with_interval(backend: Arc<MemoryBackend>, interval: Duration) -> Self {
        Self { backend, interval }
    }

    pub async fn start(self) -> QueueResult<()> {
        let mut ticker = interval(self.interval);
        info!(interval_secs = self.interval.as_secs(), "starting job reaper");

        loop {
            ticker.tick().await;
            match self.reap_expired_locks().await {
                Ok(0) => debug!("no expired locks found"),
                Ok(n) => info!(reclaimed = n, "reclaimed expired locks"),
                Err(e) => warn!(error = %e, "error during reaping"),
            }
        }
    }

    pub async fn reap_expired_locks(&self) -> QueueResult<usize> {
        let now = Utc::now();
        let expired: Vec<_> = {
            let jobs = self.backend.jobs.read();
            jobs.iter()
                .filter(|(_, record)| record.lease_expired(now))
                .map(|(job_id, record)| (job_id.clone(), record.attempt, record.message.max_delivery_attempts.max(MAX_DELIVERY_ATTEMPTS)))
                .collect()
        };

        let mut reclaimed = 0;
        for (job_id, attempt, max_attempts) in expired {
            let mut jobs = self.backend.jobs.write();
            let Some(record) = jobs.get_mut(&job_id) else { continue };
            if !record.lease_expired(now) {
                continue;
            }

            if attempt >= max_attempts {
                record.fail("exceeded maximum delivery attempts".to_string());
                let _ = self.backend.event_broadcaster.send(JobEvent::Failed {
                    job_id: job_id.clone(),
                    error: "exceeded maximum delivery attempts".to_string(),
                    at: now,
                });
            } else {
                record.reclaim_to_pending();
                let mut queues = self.backend.queues.write();
                let tenant_queues = queues.entry(record.tenant_id.clone()).or_default();
                let queue = tenant_queues.entry(record.message.queue.clone()).or_default();
                queue.push_front(job_id.clone());
                let _ = self.backend.event_broadcaster.send(JobEvent::Reclaimed { job_id: job_id.clone(), at: now });
            }
            reclaimed += 1;
        }

        Ok(reclaimed)
    }
}

impl MemoryBackend {
    pub async fn force_lock_expiry(&self, job_id: crate::JobId) {
        let mut jobs = self.jobs.write();
        if let Some(record) = jobs.get_mut(&job_id) {
            if let JobStatus::Processing { ref mut lock_expires_at } = record.status {
                *lock_expires_at = Utc::now() - chrono::Duration::seconds(1);
                record.updated_at = Utc::now();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::QueueBackend;
    use crate::{JobMessage, QueueCtx};

    fn ctx() -> QueueCtx {
        QueueCtx::new("tenant-1".to_string())
    }

    #[tokio::test]
    async fn expired_lock_returns_to_pending_for_redelivery() {
        let backend = Arc::new(MemoryBackend::new());
        let message = JobMessage::new("embedding", "email", "tenant-1", serde_json::json!({}));
        let job_id = backend.enqueue(ctx(), message).await.unwrap();
        backend.dequeue(ctx(), &["default"]).await.unwrap();

        backend.force_lock_expiry(job_id.clone()).await;
        let reaper = JobReaper::new(backend.clone());
        assert_eq!(reaper.reap_expired_locks().await.unwrap(), 1);

        let relet = backend.dequeue(ctx(), &["default"]).await.unwrap();
        assert!(relet.is_some());
        assert_eq!(relet.unwrap().record.attempt, 2);
    }

    #[tokio::test]
    async fn exhausted_delivery_attempts_fail_permanently() {
        let backend = Arc::new(MemoryBackend::new());
        let message = JobMessage::new("embedding", "email", "tenant-1", serde_json::json!({})).with_queue("default");
        let job_id = backend.enqueue(ctx(), message).await.unwrap();

        for _ in 0..3 {
            backend.dequeue(ctx(), &["default"]).await.unwrap();
            backend.force_lock_expiry(job_id.clone()).await;
            JobReaper::new(backend.clone()).reap_expired_locks().await.unwrap();
        }

        let status = backend.get_status(ctx(), job_id).await.unwrap();
        assert!(matches!(status, JobStatus::Failed { .. }));
    }
}
