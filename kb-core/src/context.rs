//! Structural carrier for the fields every `tracing` span in the request and
//! job-processing paths must carry (spec.md §7): `trace_id` always, `job_id`
//! and `owner` once a job exists. Threaded through handler and processor
//! signatures instead of ambient thread-local state, so a processor can't
//! log or notify without a trace id in hand.

/// Per-request/per-job tracing and ownership context.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub trace_id: String,
    pub job_id: Option<String>,
    pub owner: Option<String>,
}

impl RequestContext {
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self { trace_id: trace_id.into(), job_id: None, owner: None }
    }

    pub fn with_job(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_all_fields() {
        let ctx = RequestContext::new("trace-1").with_job("job-1").with_owner("acme");
        assert_eq!(ctx.trace_id, "trace-1");
        assert_eq!(ctx.job_id.as_deref(), Some("job-1"));
        assert_eq!(ctx.owner.as_deref(), Some("acme"));
    }
}
