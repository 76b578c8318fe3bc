pub mod dto;
pub mod ports;
pub mod repositories;
pub mod services;
pub mod use_cases;

// Re-export key types to avoid naming conflicts
pub use dto::{
    AgentRagStats, BatchOutcome, HealthReport, ProcessingOutcome, QueryOptions, QueryResponse,
    QueryResult, ResultMetadata, ServiceHealth, VerificationReport,
};
pub use ports::{
    BlobStore, CollectionInfo, EmbeddingProvider, ProviderEmbedding, ScoredRecord, SearchFilter,
    VectorPayload, VectorStore,
};
pub use repositories::DocumentRepository;
pub use services::{
    DocumentProcessingService, EmbeddingError, EmbeddingGenerator, EmbeddingGeneratorConfig,
    JobRegistry, JobRegistryConfig, ProcessingConfig, ProcessingError, ProcessingJob,
    ProcessingResult,
};
pub use use_cases::{PollConfig, PollOutcome, PollProcessingStatus, QueryDocuments, VerifyDocumentVectors};
