//! The embedding model itself is an external collaborator (spec.md §1):
//! this trait is the seam, grounded on `app/services/embedding_service.py`'s
//! three-model call (`dense_embedding_model` / `bm25_embedding_model` /
//! `late_interaction_embedding_model`).

use async_trait::async_trait;
use kb_core::KbResult;
use kb_vector::{SparseVector, Vectors};

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a batch of chunks, returning one [`Vectors`] per input chunk
    /// in the same order. A batch failure should be surfaced as an `Err`;
    /// the pipeline logs and continues with the next batch.
    async fn embed_batch(&self, chunks: &[String]) -> KbResult<Vec<Vectors>>;
}

/// Deterministic provider for tests and local development: dense vector is
/// a simple bag-of-bytes hash projected into a fixed dimension, sparse is a
/// token-count histogram, late-interaction is one row per token capped at
/// 8 tokens. Grounded on `app/services/mock_service.py`'s role as a stand-in
/// for the real ML model.
pub struct MockEmbeddingProvider {
    pub dense_dim: usize,
    pub late_interaction_dim: usize,
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self { dense_dim: 16, late_interaction_dim: 8 }
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, chunks: &[String]) -> KbResult<Vec<Vectors>> {
        Ok(chunks.iter().map(|chunk| self.embed_one(chunk)).collect())
    }
}

impl MockEmbeddingProvider {
    fn embed_one(&self, chunk: &str) -> Vectors {
        let mut dense = vec![0.0f32; self.dense_dim];
        for (i, byte) in chunk.bytes().enumerate() {
            dense[i % self.dense_dim] += byte as f32 / 255.0;
        }

        let mut indices = Vec::new();
        let mut values = Vec::new();
        for word in chunk.split_whitespace().take(32) {
            let idx = (fnv1a(word.as_bytes()) % 4096) as u32;
            indices.push(idx);
            values.push(1.0);
        }

        let late_interaction = chunk
            .split_whitespace()
            .take(self.late_interaction_dim)
            .map(|word| {
                let mut row = vec![0.0f32; self.late_interaction_dim];
                row[(fnv1a(word.as_bytes()) as usize) % self.late_interaction_dim] = 1.0;
                row
            })
            .collect();

        Vectors { dense, sparse: SparseVector { indices, values }, late_interaction }
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_embeds_every_chunk_in_order() {
        let provider = MockEmbeddingProvider::default();
        let chunks = vec!["hello world".to_string(), "goodbye".to_string()];
        let vectors = provider.embed_batch(&chunks).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].dense.len(), provider.dense_dim);
    }
}
