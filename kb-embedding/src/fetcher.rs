//! Resolves a blob-reference job payload (`r2_object_key`/mime/size) to
//! bytes, mirroring `EmbeddingMailProcessor.process`'s injected fetcher for
//! the blob-reference input shape as opposed to an inline body. Mirrors the
//! `EmbeddingProvider`/`DocumentExtractor` out-of-scope-collaborator pattern:
//! the object store itself is external, this is only the seam.

use async_trait::async_trait;
use kb_core::{KbError, KbResult};

#[async_trait]
pub trait BlobFetcher: Send + Sync {
    async fn fetch(&self, object_key: &str) -> KbResult<Vec<u8>>;
}

/// A fetcher that refuses every key; used when no blob store is configured
/// and only inline-body payloads are expected.
pub struct NoopBlobFetcher;

#[async_trait]
impl BlobFetcher for NoopBlobFetcher {
    async fn fetch(&self, object_key: &str) -> KbResult<Vec<u8>> {
        Err(KbError::validation(format!("no blob fetcher configured for key {object_key}")))
    }
}
