//! Wraps [`EmbeddingPipeline`] behind the uniform processor signature.
//! Grounded on `EmbeddingMailProcessor.process`: a job payload carries
//! either an inline body (subject + raw text, base64 attachments) or a
//! blob reference (`r2_object_key`/mime/size) resolved by an injected
//! [`BlobFetcher`] before chunking.

use crate::processor::Processor;
use async_trait::async_trait;
use base64::Engine;
use kb_core::{KbError, KbResult, RequestContext};
use kb_embedding::{AttachmentInput, BlobFetcher, DocumentInput, EmbeddingPipeline, NoopBlobFetcher};
use std::sync::Arc;
use tracing::info;

pub struct EmbeddingProcessor {
    pipeline: Arc<EmbeddingPipeline>,
    fetcher: Arc<dyn BlobFetcher>,
}

impl EmbeddingProcessor {
    pub fn new(pipeline: Arc<EmbeddingPipeline>) -> Self {
        Self { pipeline, fetcher: Arc::new(NoopBlobFetcher) }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn BlobFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Resolves the document body: a blob reference (`r2_object_key`) is
    /// fetched through `self.fetcher` before chunking; otherwise the body is
    /// the inline `subject`/`raw_text` pair.
    async fn resolve_body(&self, payload: &serde_json::Value) -> KbResult<(Vec<u8>, String)> {
        if let Some(key) = payload.get("r2_object_key").and_then(|v| v.as_str()) {
            let mime = payload.get("mime").and_then(|v| v.as_str()).unwrap_or("text/plain").to_string();
            let bytes = self.fetcher.fetch(key).await?;
            if let Some(expected) = payload.get("size_bytes").and_then(|v| v.as_u64()) {
                if bytes.len() as u64 != expected {
                    return Err(KbError::validation(format!(
                        "blob {key} size mismatch: expected {expected}, fetched {}",
                        bytes.len()
                    )));
                }
            }
            return Ok((bytes, mime));
        }

        let subject = payload.get("subject").and_then(|v| v.as_str()).unwrap_or("");
        let raw_text = payload.get("raw_text").and_then(|v| v.as_str()).unwrap_or("");
        let body = if subject.is_empty() { raw_text.to_string() } else { format!("{subject}\n\n{raw_text}") };
        Ok((body.into_bytes(), "text/html".to_string()))
    }

    async fn parse_input(&self, payload: &serde_json::Value, job_id: &str, owner: &str) -> KbResult<DocumentInput> {
        let (bytes, mime) = self.resolve_body(payload).await?;

        let source = payload.get("source").and_then(|v| v.as_str()).unwrap_or("email").to_string();
        let tags = payload
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        let sensitivity = payload.get("sensitivity").and_then(|v| v.as_str()).map(String::from);

        let mut attachments = Vec::new();
        if let Some(list) = payload.get("attachments").and_then(|v| v.as_array()) {
            for attachment in list {
                let filename = attachment.get("filename").and_then(|v| v.as_str()).unwrap_or("unnamed").to_string();
                let mime = attachment.get("mimetype").and_then(|v| v.as_str()).unwrap_or("").to_string();
                let content_b64 = attachment.get("content_base64").and_then(|v| v.as_str());
                let Some(content_b64) = content_b64 else { continue };
                let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(content_b64) else { continue };
                attachments.push(AttachmentInput { filename, mime, bytes });
            }
        }

        Ok(DocumentInput {
            job_id: job_id.to_string(),
            owner: owner.to_string(),
            source,
            source_id: job_id.to_string(),
            mime,
            bytes,
            tags,
            sensitivity,
            attachments,
        })
    }
}

#[async_trait]
impl Processor for EmbeddingProcessor {
    async fn process(&self, payload: serde_json::Value, ctx: &RequestContext) -> KbResult<serde_json::Value> {
        let job_id = ctx.job_id.as_deref().unwrap_or(&ctx.trace_id);
        let owner = ctx.owner.as_deref().unwrap_or("");
        let input = self.parse_input(&payload, job_id, owner).await?;
        if input.bytes.is_empty() {
            info!(job_id, trace_id = %ctx.trace_id, "no text provided for embedding");
            return Ok(serde_json::json!({"job_id": job_id, "trace_id": ctx.trace_id, "embedding": null}));
        }

        let report = self.pipeline.run(&input).await.map_err(|e| match e {
            KbError::Validation(msg) => KbError::Validation(msg),
            other => other,
        })?;

        Ok(serde_json::json!({
            "job_id": job_id,
            "trace_id": ctx.trace_id,
            "chunk_count": report.chunks_total,
            "points_persisted": report.points_persisted,
            "failed_attachments": report.failed_attachments,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_embedding::MockEmbeddingProvider;
    use kb_vector::InMemoryVectorStore;

    fn ctx() -> RequestContext {
        RequestContext::new("trace-1").with_job("job-1").with_owner("acme")
    }

    fn pipeline() -> Arc<EmbeddingPipeline> {
        Arc::new(EmbeddingPipeline::new(Arc::new(MockEmbeddingProvider::default()), Arc::new(InMemoryVectorStore::new())))
    }

    struct FakeFetcher {
        bytes: Vec<u8>,
    }

    #[async_trait]
    impl BlobFetcher for FakeFetcher {
        async fn fetch(&self, _object_key: &str) -> KbResult<Vec<u8>> {
            Ok(self.bytes.clone())
        }
    }

    #[tokio::test]
    async fn embeds_inline_body_text() {
        let processor = EmbeddingProcessor::new(pipeline());
        let payload = serde_json::json!({"subject": "hi", "raw_text": "body text here"});
        let result = processor.process(payload, &ctx()).await.unwrap();
        assert!(result["points_persisted"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn empty_body_short_circuits() {
        let processor = EmbeddingProcessor::new(pipeline());
        let result = processor.process(serde_json::json!({}), &ctx()).await.unwrap();
        assert!(result["embedding"].is_null());
    }

    #[tokio::test]
    async fn fetches_blob_reference_before_chunking() {
        let fetcher = Arc::new(FakeFetcher { bytes: b"fetched document body".to_vec() });
        let processor = EmbeddingProcessor::new(pipeline()).with_fetcher(fetcher);
        let payload = serde_json::json!({"r2_object_key": "attachments/abc123", "mime": "text/plain", "size_bytes": 22});
        let result = processor.process(payload, &ctx()).await.unwrap();
        assert!(result["points_persisted"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn blob_reference_size_mismatch_is_rejected() {
        let fetcher = Arc::new(FakeFetcher { bytes: b"short".to_vec() });
        let processor = EmbeddingProcessor::new(pipeline()).with_fetcher(fetcher);
        let payload = serde_json::json!({"r2_object_key": "attachments/abc123", "size_bytes": 999});
        let err = processor.process(payload, &ctx()).await;
        assert!(err.is_err());
    }
}
