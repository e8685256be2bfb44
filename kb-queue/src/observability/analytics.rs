use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;
use chrono::Utc;

use crate::{JobEvent, JobId, QueueCtx};

/// Production-grade observability layer.
#[derive(Clone)]
pub struct ObservabilityLayer {
    event_broadcaster: broadcast::Sender<JobEvent>,
    metrics: Arc<super::LiveMetrics>,
}

impl ObservabilityLayer {
    pub fn new() -> Self {
        let (event_broadcaster, _) = broadcast::channel(10000);
        Self { event_broadcaster, metrics: Arc::new(super::LiveMetrics::new()) }
    }

    pub async fn record_job_enqueued(&self, ctx: &QueueCtx, job_id: &JobId, job_type: &str, queue: &str) {
        let event = JobEvent::Enqueued {
            job_id: job_id.clone(),
            tenant_id: ctx.tenant_id.clone(),
            queue: queue.to_string(),
            job_type: job_type.to_string(),
            at: Utc::now(),
        };
        let _ = self.event_broadcaster.send(event);
        self.metrics.increment_jobs_enqueued(job_type);
        debug!(%job_id, job_type, "recorded job enqueued");
    }

    pub async fn record_job_completed(&self, job_id: &JobId, job_type: &str) {
        let event = JobEvent::Completed { job_id: job_id.clone(), at: Utc::now() };
        let _ = self.event_broadcaster.send(event);
        self.metrics.increment_jobs_completed(job_type);
        debug!(%job_id, job_type, "recorded job completed");
    }

    pub async fn record_job_failed(&self, job_id: &JobId, job_type: &str, error: &str) {
        let event = JobEvent::Failed { job_id: job_id.clone(), error: error.to_string(), at: Utc::now() };
        let _ = self.event_broadcaster.send(event);
        self.metrics.increment_jobs_failed(job_type);
        debug!(%job_id, job_type, error, "recorded job failed");
    }

    pub async fn record_job_reclaimed(&self, job_id: &JobId, job_type: &str) {
        let event = JobEvent::Reclaimed { job_id: job_id.clone(), at: Utc::now() };
        let _ = self.event_broadcaster.send(event);
        self.metrics.increment_jobs_reclaimed(job_type);
        debug!(%job_id, job_type, "recorded job reclaimed by janitor");
    }

    pub fn event_stream(&self) -> broadcast::Receiver<JobEvent> {
        self.event_broadcaster.subscribe()
    }

    pub fn metrics(&self) -> &super::LiveMetrics {
        &self.metrics
    }
}

impl Default for ObservabilityLayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Derived rates over the lifetime counters in [`LiveMetrics`].
pub struct PerformanceAnalytics {
    observability: Arc<ObservabilityLayer>,
}

impl PerformanceAnalytics {
    pub fn new(observability: Arc<ObservabilityLayer>) -> Self {
        Self { observability }
    }

    pub fn success_rate(&self) -> f64 {
        let completed = self.observability.metrics.jobs_completed() as f64;
        let failed = self.observability.metrics.jobs_failed() as f64;
        let total = completed + failed;
        if total == 0.0 {
            100.0
        } else {
            (completed / total) * 100.0
        }
    }

    pub fn reclaim_rate(&self) -> f64 {
        let reclaimed = self.observability.metrics.jobs_reclaimed() as f64;
        let enqueued = self.observability.metrics.jobs_enqueued() as f64;
        if enqueued == 0.0 {
            0.0
        } else {
            (reclaimed / enqueued) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn success_rate_is_100_percent_with_no_jobs() {
        let layer = ObservabilityLayer::new();
        let analytics = PerformanceAnalytics::new(Arc::new(layer));
        assert_eq!(analytics.success_rate(), 100.0);
    }

    #[tokio::test]
    async fn success_rate_reflects_failures() {
        let layer = Arc::new(ObservabilityLayer::new());
        layer.record_job_completed(&JobId::new(), "embedding").await;
        layer.record_job_failed(&JobId::new(), "embedding", "boom").await;
        let analytics = PerformanceAnalytics::new(layer);
        assert_eq!(analytics.success_rate(), 50.0);
    }
}
