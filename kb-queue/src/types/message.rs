use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobPriority;

/// Immutable broker task submission (spec.md §4.7: "task payloads are
/// JSON, task IDs equal Job IDs").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    pub job_type: String,
    pub source: String,
    pub owner: String,
    pub payload: serde_json::Value,
    pub queue: String,
    pub priority: JobPriority,
    pub max_delivery_attempts: u32,
    pub run_at: DateTime<Utc>,
    pub idempotency_key: Option<String>,
}

impl JobMessage {
    pub fn new(job_type: impl Into<String>, source: impl Into<String>, owner: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            job_type: job_type.into(),
            source: source.into(),
            owner: owner.into(),
            payload,
            queue: "default".to_string(),
            priority: JobPriority::default(),
            max_delivery_attempts: 3,
            run_at: Utc::now(),
            idempotency_key: None,
        }
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_run_at(mut self, run_at: DateTime<Utc>) -> Self {
        self.run_at = run_at;
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn is_eligible(&self) -> bool {
        self.run_at <= Utc::now()
    }

    /// Broker task name, e.g. `email_embedding.task_processing` (spec.md §4.7).
    pub fn task_name(&self) -> String {
        format!("{}_{}.task_processing", self.source, self.job_type)
    }
}
