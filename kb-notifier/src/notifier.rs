use async_trait::async_trait;

/// A job-completion notifier. Failure is logged, never propagated: the job
/// is complete regardless of notification outcome (spec.md §4.8).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, data: &serde_json::Value, job_id: &str, trace_id: &str);
}
