pub mod memory;

#[cfg(feature = "redis-backend")]
pub mod redis;

use async_trait::async_trait;
use futures_core::Stream;
use std::pin::Pin;

use crate::{JobEvent, JobId, JobMessage, JobRecord, JobStatus, LeasedJob, QueueCapabilities, QueueCtx, QueueResult, types::LeaseToken};

pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send + 'static>>;

/// Storage primitives for the broker (spec.md §4.7). Delivery is
/// at-least-once; the claim step downstream in `kb-repository` makes
/// double-processing observable and rejectable.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    async fn enqueue(&self, ctx: QueueCtx, message: JobMessage) -> QueueResult<JobId>;

    /// Lease-based dequeue: only jobs with `run_at <= now` in `Pending`.
    async fn dequeue(&self, ctx: QueueCtx, queues: &[&str]) -> QueueResult<Option<LeasedJob>>;

    async fn ack_complete(&self, ctx: QueueCtx, job_id: JobId, lease_token: LeaseToken, results: serde_json::Value) -> QueueResult<()>;

    async fn ack_fail(&self, ctx: QueueCtx, job_id: JobId, lease_token: LeaseToken, error: String) -> QueueResult<()>;

    /// Cancel a non-terminal job; it is recorded as `Failed` rather than a
    /// distinct canceled state since spec.md §3's status enum has none.
    async fn cancel(&self, ctx: QueueCtx, job_id: JobId) -> QueueResult<bool>;

    async fn get_status(&self, ctx: QueueCtx, job_id: JobId) -> QueueResult<JobStatus>;

    async fn get_record(&self, ctx: QueueCtx, job_id: JobId) -> QueueResult<JobRecord>;

    fn event_stream(&self, ctx: QueueCtx) -> BoxStream<JobEvent>;

    fn capabilities(&self) -> QueueCapabilities;
}
