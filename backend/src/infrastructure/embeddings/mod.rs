/// Chunking, embedding providers and vector stores
mod fastembed_service;
mod memory_store;
mod openai_provider;
mod qdrant_store;
mod text_chunker;

pub use fastembed_service::FastEmbedService;
pub use memory_store::InMemoryVectorStore;
pub use openai_provider::{OpenAiConfig, OpenAiEmbeddingProvider, DEFAULT_OPENAI_BASE_URL};
pub use qdrant_store::{QdrantVectorStore, DEFAULT_COLLECTION_NAME};
pub use text_chunker::{ChunkerConfig, TextChunker};
