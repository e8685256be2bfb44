//! kb-queue: the broker, scheduler sweep, and worker runtime (spec.md §4.7).
//!
//! Jobs move through five states — `Pending`, `Scheduled`, `Processing`,
//! `Completed`, `Failed` — with one extra edge a plain state diagram
//! doesn't show: a janitor resets an expired `Processing` lock back to
//! `Pending` so a crashed worker never strands a task. Delivery is
//! at-least-once; a lease token on every dequeue makes double-delivery
//! observable and rejectable at ack time.
//!
//! ```ignore
//! let backend = MemoryBackend::new();
//! let ctx = QueueCtx::new("tenant-1".to_string());
//! let message = JobMessage::new("embedding", "email", "alice@example.com", serde_json::json!({}));
//! let job_id = backend.enqueue(ctx, message).await?;
//! ```

pub mod backend;
pub mod error;
pub mod observability;
pub mod poll;
pub mod runtime;
pub mod scheduler;
pub mod types;

pub use backend::QueueBackend;
pub use error::{QueueError, QueueResult};
pub use observability::{LiveMetrics, ObservabilityLayer, PerformanceAnalytics};
pub use poll::PollLoop;
pub use runtime::{WorkerConfig, WorkerHandle, WorkerRuntime};
pub use scheduler::Scheduler;
pub use types::{
    JobEvent, JobId, JobMessage, JobPriority, JobRecord, JobStatus, LeaseToken, LeasedJob,
    QueueCapabilities, QueueCtx,
};

#[cfg(feature = "redis-backend")]
pub use backend::redis::RedisBackend;

pub mod prelude {
    pub use crate::{
        JobEvent, JobId, JobMessage, JobPriority, JobRecord, JobStatus, LeasedJob, PollLoop,
        QueueBackend, QueueCapabilities, QueueCtx, QueueError, QueueResult, Scheduler,
        WorkerConfig, WorkerHandle, WorkerRuntime,
    };
    pub use async_trait::async_trait;
}
