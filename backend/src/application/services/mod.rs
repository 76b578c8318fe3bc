pub mod embedding_service;
pub mod job_registry;
pub mod processing_service;

pub use embedding_service::{
    estimate_token_count, EmbeddingError, EmbeddingGenerator, EmbeddingGeneratorConfig,
    EmbeddingResult, EmbeddingRun,
};
pub use job_registry::{JobRegistry, JobRegistryConfig, ProcessingJob};
pub use processing_service::{
    DocumentProcessingService, ProcessingConfig, ProcessingError, ProcessingResult,
};
