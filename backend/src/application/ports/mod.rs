//! Async seams to the external collaborators of the pipeline
mod blob_store;
mod embedding_provider;
mod vector_store;

pub use blob_store::BlobStore;
pub use embedding_provider::{EmbeddingProvider, ProviderEmbedding, HEALTH_CHECK_TEXT};
pub use vector_store::{CollectionInfo, ScoredRecord, SearchFilter, VectorPayload, VectorStore};
