pub mod chunker;
pub mod extract;
pub mod fetcher;
pub mod pipeline;
pub mod provider;

pub use chunker::TextChunker;
pub use extract::{DocumentExtractor, ExtractedText, NoopExtractor};
pub use fetcher::{BlobFetcher, NoopBlobFetcher};
pub use pipeline::{job_filter, AttachmentInput, DocumentInput, EmbeddingPipeline, PipelineReport};
pub use provider::{EmbeddingProvider, MockEmbeddingProvider};
