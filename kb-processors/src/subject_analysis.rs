//! Grounded on `SubjectAnalysisProcessor.process` / `analyze_subjects`.

use crate::llm::LlmProvider;
use crate::processor::Processor;
use async_trait::async_trait;
use kb_core::{KbError, KbResult, RequestContext};
use std::sync::Arc;
use tracing::info;

const MAX_SUBJECTS: usize = 100;
const SYSTEM_PROMPT: &str = "You cluster email subject lines into topical groups. \
Return a JSON object: {\"results\": [{\"tag\": str, \"cluster\": str, \"subject\": str}]}.";

pub struct SubjectAnalysisProcessor {
    llm: Arc<dyn LlmProvider>,
}

impl SubjectAnalysisProcessor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Processor for SubjectAnalysisProcessor {
    async fn process(&self, payload: serde_json::Value, ctx: &RequestContext) -> KbResult<serde_json::Value> {
        let mut subjects: Vec<String> = payload
            .get("subjects")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();

        if subjects.is_empty() {
            return Err(KbError::validation("no subjects provided for analysis"));
        }
        subjects.truncate(MAX_SUBJECTS);

        info!(job_id = ctx.job_id.as_deref(), trace_id = %ctx.trace_id, count = subjects.len(), "running subject analysis");

        let subjects_text = subjects.iter().map(|s| format!("- \"{s}\"")).collect::<Vec<_>>().join("\n");
        let raw = self.llm.complete_json(SYSTEM_PROMPT, &subjects_text).await?;
        let mut parsed: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| KbError::transient(format!("llm returned invalid json: {e}")))?;

        if let Some(obj) = parsed.as_object_mut() {
            obj.insert("job_id".to_string(), serde_json::json!(ctx.job_id));
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmProvider;

    #[tokio::test]
    async fn rejects_empty_subject_list() {
        let processor = SubjectAnalysisProcessor::new(Arc::new(MockLlmProvider { response: "{}".into() }));
        let ctx = RequestContext::new("trace-1").with_job("job-1").with_owner("acme");
        let err = processor.process(serde_json::json!({}), &ctx).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn attaches_job_id_to_results() {
        let response = serde_json::json!({"results": [{"tag":"billing","cluster":"finance","subject":"Invoice due"}]});
        let processor = SubjectAnalysisProcessor::new(Arc::new(MockLlmProvider { response: response.to_string() }));
        let payload = serde_json::json!({"subjects": ["Invoice due"]});
        let ctx = RequestContext::new("trace-1").with_job("job-1").with_owner("acme");
        let result = processor.process(payload, &ctx).await.unwrap();
        assert_eq!(result["job_id"], "job-1");
        assert_eq!(result["results"][0]["tag"], "billing");
    }
}
