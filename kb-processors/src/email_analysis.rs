//! Grounded on `OpenAIService.analyze_email` / `_extract_email_text`.

use crate::llm::LlmProvider;
use crate::processor::Processor;
use async_trait::async_trait;
use kb_core::{KbResult, RequestContext};
use std::sync::Arc;
use tracing::info;

const SYSTEM_PROMPT: &str = "You analyze a single email and extract entities and action items. \
Return a JSON object: {\"entities\": [{\"name\": str, \"type\": str}], \
\"action_items\": [{\"description\": str, \"status\": str, \"priority\": str}], \"summary\": str}.";

pub struct EmailAnalysisProcessor {
    llm: Arc<dyn LlmProvider>,
    internal_domains: Vec<String>,
}

impl EmailAnalysisProcessor {
    pub fn new(llm: Arc<dyn LlmProvider>, internal_domains: Vec<String>) -> Self {
        Self { llm, internal_domains }
    }

    fn canonical_text(payload: &serde_json::Value) -> String {
        let get = |k: &str| payload.get(k).and_then(|v| v.as_str()).unwrap_or("");
        let attachments = payload
            .get("attachments")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|a| a.get("filename").and_then(|f| f.as_str()))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();

        format!(
            "Subject: {}\nFrom: {}\nTo: {}\nDate: {}\nCc: {}\nAttachments: {}\n\n{}",
            get("subject"),
            get("from"),
            get("to"),
            get("date"),
            get("cc"),
            attachments,
            get("body"),
        )
    }

    fn source_category(&self, sender: &str) -> &'static str {
        let domain = sender.rsplit('@').next().unwrap_or("").to_lowercase();
        if self.internal_domains.iter().any(|d| d.eq_ignore_ascii_case(&domain)) {
            "internal"
        } else {
            "external"
        }
    }
}

#[async_trait]
impl Processor for EmailAnalysisProcessor {
    async fn process(&self, payload: serde_json::Value, ctx: &RequestContext) -> KbResult<serde_json::Value> {
        info!(job_id = ctx.job_id.as_deref(), trace_id = %ctx.trace_id, "running email analysis");

        let text = Self::canonical_text(&payload);
        let raw = self.llm.complete_json(SYSTEM_PROMPT, &text).await?;
        let mut parsed: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| kb_core::KbError::transient(format!("llm returned invalid json: {e}")))?;

        let sender = payload.get("from").and_then(|v| v.as_str()).unwrap_or("");
        if let Some(obj) = parsed.as_object_mut() {
            obj.insert("job_id".to_string(), serde_json::json!(ctx.job_id));
            obj.insert("source_category".to_string(), serde_json::json!(self.source_category(sender)));
            obj.entry("entities").or_insert_with(|| serde_json::json!([]));
            obj.entry("action_items").or_insert_with(|| serde_json::json!([]));
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmProvider;

    #[tokio::test]
    async fn classifies_internal_sender_by_domain() {
        let response = serde_json::json!({"entities": [], "action_items": [], "summary": "s"});
        let processor = EmailAnalysisProcessor::new(
            Arc::new(MockLlmProvider { response: response.to_string() }),
            vec!["acme.com".to_string()],
        );
        let payload = serde_json::json!({"from": "alice@acme.com", "subject": "hi"});
        let ctx = RequestContext::new("trace-1").with_job("job-1").with_owner("acme");
        let result = processor.process(payload, &ctx).await.unwrap();
        assert_eq!(result["source_category"], "internal");
    }

    #[tokio::test]
    async fn classifies_unknown_domain_as_external() {
        let response = serde_json::json!({});
        let processor = EmailAnalysisProcessor::new(
            Arc::new(MockLlmProvider { response: response.to_string() }),
            vec!["acme.com".to_string()],
        );
        let payload = serde_json::json!({"from": "bob@outsider.com"});
        let ctx = RequestContext::new("trace-1").with_job("job-1").with_owner("acme");
        let result = processor.process(payload, &ctx).await.unwrap();
        assert_eq!(result["source_category"], "external");
    }
}
