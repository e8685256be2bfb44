pub mod email_analysis;
pub mod embedding;
pub mod llm;
pub mod processor;
pub mod registry;
pub mod subject_analysis;

pub use email_analysis::EmailAnalysisProcessor;
pub use embedding::EmbeddingProcessor;
pub use llm::{LlmClient, LlmProvider, MockLlmProvider, RotatingLlmProvider};
pub use processor::Processor;
pub use registry::ProcessorRegistry;
pub use subject_analysis::SubjectAnalysisProcessor;
