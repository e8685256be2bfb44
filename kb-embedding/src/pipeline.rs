//! Orchestrates size gate -> extract -> chunk -> batch embed -> point
//! assembly -> attachment recursion -> persist (spec.md §4.5).

use crate::chunker::TextChunker;
use crate::extract::{extract_text, DocumentExtractor, NoopExtractor};
use crate::provider::EmbeddingProvider;
use kb_core::{KbError, KbResult};
use kb_vector::{Filter, Payload, Point, VectorStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_TEXT_SIZE_BYTES: usize = 500 * 1024;
const EMBED_BATCH_SIZE: usize = 10;
const CONTENT_PREVIEW_CHARS: usize = 100;
const DEFAULT_SENSITIVITY: &str = "internal";

#[derive(Debug, Clone, Default)]
pub struct AttachmentInput {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub job_id: String,
    pub owner: String,
    pub source: String,
    pub source_id: String,
    pub mime: String,
    pub bytes: Vec<u8>,
    pub tags: Vec<String>,
    pub sensitivity: Option<String>,
    pub attachments: Vec<AttachmentInput>,
}

pub struct EmbeddingPipeline {
    chunker: TextChunker,
    provider: Arc<dyn EmbeddingProvider>,
    extractor: Arc<dyn DocumentExtractor>,
    store: Arc<dyn VectorStore>,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub points_persisted: usize,
    pub chunks_total: usize,
    pub failed_attachments: Vec<String>,
}

impl EmbeddingPipeline {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            chunker: TextChunker::default(),
            provider,
            extractor: Arc::new(NoopExtractor),
            store,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn DocumentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_chunker(mut self, chunker: TextChunker) -> Self {
        self.chunker = chunker;
        self
    }

    /// Runs the full pipeline for a document and its attachments, persisting
    /// every produced point into `{owner}_knowledge_base`.
    pub async fn run(&self, input: &DocumentInput) -> KbResult<PipelineReport> {
        let collection = kb_core::knowledge_base_collection(&input.owner);
        self.store
            .ensure_collection(&collection, &kb_vector::CollectionSchema::default())
            .await?;

        let mut report = PipelineReport::default();

        let body_points = self
            .process_document(input, &input.bytes, &input.mime, None)
            .await?;
        report.chunks_total += body_points.len();
        if !body_points.is_empty() {
            self.store.upsert_points(&collection, body_points).await?;
            report.points_persisted += report.chunks_total;
        }

        for attachment in &input.attachments {
            match self
                .process_document(input, &attachment.bytes, &attachment.mime, Some(attachment))
                .await
            {
                Ok(points) => {
                    let count = points.len();
                    if !points.is_empty() {
                        self.store.upsert_points(&collection, points).await?;
                    }
                    report.chunks_total += count;
                    report.points_persisted += count;
                }
                Err(err) => {
                    warn!(filename = %attachment.filename, error = %err, "attachment embedding failed, isolating");
                    report.failed_attachments.push(attachment.filename.clone());
                }
            }
        }

        info!(
            job_id = %input.job_id,
            points = report.points_persisted,
            attachments_failed = report.failed_attachments.len(),
            "embedding pipeline complete"
        );
        Ok(report)
    }

    async fn process_document(
        &self,
        input: &DocumentInput,
        bytes: &[u8],
        mime: &str,
        attachment: Option<&AttachmentInput>,
    ) -> KbResult<Vec<Point>> {
        if bytes.len() as u64 > MAX_FILE_SIZE_BYTES {
            return Err(KbError::validation(format!(
                "document exceeds max size: {} bytes",
                bytes.len()
            )));
        }

        let extracted = extract_text(bytes, mime, self.extractor.as_ref())?;
        let mut text = extracted.as_plain();
        if text.len() > MAX_TEXT_SIZE_BYTES {
            warn!(job_id = %input.job_id, original_len = text.len(), "truncating text to max size");
            text.truncate(MAX_TEXT_SIZE_BYTES);
        }

        let chunks = self.chunker.chunk_text(&text);
        let mut points = Vec::with_capacity(chunks.len());

        for batch_start in (0..chunks.len()).step_by(EMBED_BATCH_SIZE) {
            let batch_end = (batch_start + EMBED_BATCH_SIZE).min(chunks.len());
            let batch = &chunks[batch_start..batch_end];
            match self.provider.embed_batch(batch).await {
                Ok(vectors) => {
                    for (offset, vector) in vectors.into_iter().enumerate() {
                        let chunk_index = batch_start + offset;
                        points.push(self.assemble_point(input, attachment, &chunks[chunk_index], chunk_index, vector));
                    }
                }
                Err(err) => {
                    warn!(job_id = %input.job_id, batch_start, error = %err, "embedding batch failed, continuing");
                }
            }
        }

        Ok(points)
    }

    fn assemble_point(
        &self,
        input: &DocumentInput,
        attachment: Option<&AttachmentInput>,
        content: &str,
        chunk_index: usize,
        vectors: kb_vector::Vectors,
    ) -> Point {
        let preview: String = content.chars().take(CONTENT_PREVIEW_CHARS).collect();
        let mut payload: Payload = BTreeMap::new();
        payload.insert("job_id".into(), serde_json::json!(input.job_id));
        payload.insert("chunk_index".into(), serde_json::json!(chunk_index));
        payload.insert("content".into(), serde_json::json!(content));
        payload.insert("content_preview".into(), serde_json::json!(preview));
        payload.insert(
            "sensitivity".into(),
            serde_json::json!(input.sensitivity.clone().unwrap_or_else(|| DEFAULT_SENSITIVITY.to_string())),
        );
        payload.insert("tags".into(), serde_json::json!(input.tags));
        payload.insert("source".into(), serde_json::json!(input.source));
        payload.insert("source_id".into(), serde_json::json!(input.source_id));
        payload.insert("owner".into(), serde_json::json!(input.owner));
        if let Some(attachment) = attachment {
            payload.insert("attachment_filename".into(), serde_json::json!(attachment.filename));
        }

        Point { id: Uuid::new_v4().to_string(), vectors, payload }
    }
}

/// Builds the scroll filter for "all points belonging to this job", used by
/// callers that need to re-read what a prior run persisted.
pub fn job_filter(job_id: &str) -> Filter {
    Filter::default().eq("job_id", job_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockEmbeddingProvider;
    use kb_vector::InMemoryVectorStore;

    fn input(body: &str) -> DocumentInput {
        DocumentInput {
            job_id: "job-1".into(),
            owner: "acme".into(),
            source: "email".into(),
            source_id: "msg-1".into(),
            mime: "text/plain".into(),
            bytes: body.as_bytes().to_vec(),
            tags: vec!["inbox".into()],
            sensitivity: None,
            attachments: vec![],
        }
    }

    #[tokio::test]
    async fn persists_one_point_per_chunk() {
        let store = Arc::new(InMemoryVectorStore::new());
        let pipeline = EmbeddingPipeline::new(Arc::new(MockEmbeddingProvider::default()), store.clone());
        let report = pipeline.run(&input("short body text")).await.unwrap();
        assert_eq!(report.points_persisted, 1);

        let collection = kb_core::knowledge_base_collection("acme");
        let page = store.scroll(&collection, &job_filter("job-1"), 10, None).await.unwrap();
        assert_eq!(page.points.len(), 1);
        assert_eq!(page.points[0].payload.get("chunk_index").unwrap(), &serde_json::json!(0));
    }

    #[tokio::test]
    async fn oversized_document_is_rejected() {
        let store = Arc::new(InMemoryVectorStore::new());
        let pipeline = EmbeddingPipeline::new(Arc::new(MockEmbeddingProvider::default()), store);
        let mut doc = input("x");
        doc.bytes = vec![0u8; MAX_FILE_SIZE_BYTES as usize + 1];
        let result = pipeline.run(&doc).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn attachment_failure_does_not_block_body_points() {
        let store = Arc::new(InMemoryVectorStore::new());
        let pipeline = EmbeddingPipeline::new(Arc::new(MockEmbeddingProvider::default()), store.clone());
        let mut doc = input("the body embeds fine");
        doc.attachments.push(AttachmentInput {
            filename: "bad.xyz".into(),
            mime: "application/x-unsupported".into(),
            bytes: vec![1, 2, 3],
        });
        let report = pipeline.run(&doc).await.unwrap();
        assert_eq!(report.failed_attachments, vec!["bad.xyz".to_string()]);
        assert!(report.points_persisted >= 1);
    }
}
