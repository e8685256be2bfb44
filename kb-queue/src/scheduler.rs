use std::sync::Arc;
use std::time::Duration;

use kb_core::SourceType;
use kb_repository::JobRepository;
use tracing::{debug, info, warn};

use crate::{
    backend::QueueBackend,
    types::JobMessage,
    QueueCtx, QueueResult,
};

const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_BATCH_SIZE: usize = 50;
const MIN_BATCH_SIZE: usize = 5;

/// Periodic sweep that promotes repository-pending jobs into broker tasks,
/// grounded on `app/celery/tasks_embedding*.py`'s periodic `get_pending_jobs`
/// tasks. No teacher counterpart: `dog-queue` assumed callers enqueue
/// directly, but spec.md §4.7 requires a repository-to-broker bridge for
/// sources that land jobs straight in the repository (e.g. an upload
/// endpoint) without going through the broker first.
pub struct Scheduler<R: JobRepository, B: QueueBackend> {
    repository: Arc<R>,
    backend: Arc<B>,
    sources: Vec<SourceType>,
    sweep_interval: Duration,
    batch_size: usize,
}

impl<R: JobRepository, B: QueueBackend> Scheduler<R, B> {
    pub fn new(repository: Arc<R>, backend: Arc<B>, sources: Vec<SourceType>) -> Self {
        Self { repository, backend, sources, sweep_interval: DEFAULT_SWEEP_INTERVAL, batch_size: DEFAULT_BATCH_SIZE }
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Run sweeps until `shutdown` resolves.
    pub async fn run(&self, ctx: QueueCtx, mut shutdown: tokio::sync::oneshot::Receiver<()>) -> QueueResult<()> {
        info!(sources = ?self.sources, interval = ?self.sweep_interval, "scheduler started");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("scheduler shutdown requested");
                    break;
                }
                _ = tokio::time::sleep(self.sweep_interval) => {
                    if let Err(e) = self.sweep_once(&ctx).await {
                        warn!(error = %e, "scheduler sweep failed");
                    }
                }
            }
        }
        Ok(())
    }

    /// One sweep per configured source: reap expired locks, then enqueue
    /// claimable jobs as broker tasks. Batch size shrinks when a source
    /// keeps returning a full page, a crude backpressure signal that the
    /// repository has more pending work than the broker is draining.
    pub async fn sweep_once(&self, ctx: &QueueCtx) -> QueueResult<usize> {
        let mut enqueued = 0;
        for source in &self.sources {
            let reclaimed = self.repository.reap_expired_locks(source).await.map_err(crate::QueueError::Processor)?;
            if reclaimed > 0 {
                debug!(%source, reclaimed, "scheduler reclaimed expired locks");
            }

            let batch_size = if reclaimed > self.batch_size / 2 { MIN_BATCH_SIZE } else { self.batch_size };
            let pending = self.repository.list_pending(source, batch_size).await.map_err(crate::QueueError::Processor)?;

            for record in pending {
                let message = JobMessage::new(record.job_type.as_str(), source.as_str(), record.owner.clone(), record.payload.clone())
                    .with_priority(record.priority.value().into());
                self.backend.enqueue(ctx.clone(), message).await?;
                enqueued += 1;
            }
        }
        Ok(enqueued)
    }
}
