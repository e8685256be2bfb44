use crate::processor::Processor;
use kb_core::{JobType, KbError, KbResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Maps `job_type` to a processor (spec.md §4.6).
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: HashMap<JobType, Arc<dyn Processor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job_type: JobType, processor: Arc<dyn Processor>) -> &mut Self {
        self.processors.insert(job_type, processor);
        self
    }

    pub fn resolve(&self, job_type: JobType) -> KbResult<Arc<dyn Processor>> {
        self.processors
            .get(&job_type)
            .cloned()
            .ok_or_else(|| KbError::validation(format!("no processor registered for job type {job_type}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmProvider;
    use crate::subject_analysis::SubjectAnalysisProcessor;

    #[test]
    fn resolves_registered_processor() {
        let mut registry = ProcessorRegistry::new();
        registry.register(
            JobType::SubjectAnalysis,
            Arc::new(SubjectAnalysisProcessor::new(Arc::new(MockLlmProvider { response: "{}".into() }))),
        );
        assert!(registry.resolve(JobType::SubjectAnalysis).is_ok());
        assert!(registry.resolve(JobType::Embedding).is_err());
    }
}
