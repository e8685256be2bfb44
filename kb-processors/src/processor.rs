use async_trait::async_trait;
use kb_core::{KbResult, RequestContext};

/// Uniform processor signature (spec.md §4.6): `(payload, ctx) -> results`.
/// `ctx` carries `trace_id`/`job_id`/`owner` structurally (spec.md §7)
/// instead of three loose string parameters.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, payload: serde_json::Value, ctx: &RequestContext) -> KbResult<serde_json::Value>;
}
