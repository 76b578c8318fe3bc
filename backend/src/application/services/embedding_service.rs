/// Batched embedding generation for chunks and retrieval queries
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::dto::ServiceHealth;
use crate::application::ports::EmbeddingProvider;
use crate::domain::base::{DomainError, DomainResult};
use crate::domain::entities::{Chunk, EmbeddedChunk};
use crate::domain::value_objects::EmbeddingVector;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("Failed to generate embedding for chunk {chunk_index}: {message}")]
    EmbeddingFailed { chunk_index: usize, message: String },

    #[error("Failed to generate query embedding: {0}")]
    QueryEmbeddingFailed(String),
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Configuration for the embedding generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingGeneratorConfig {
    /// Chunks embedded concurrently per batch
    pub batch_size: usize,
    /// Pause between consecutive batches to stay under provider rate limits
    pub batch_pause: Duration,
    /// Conservative per-chunk token ceiling
    pub max_tokens_per_chunk: usize,
}

impl Default for EmbeddingGeneratorConfig {
    fn default() -> Self {
        EmbeddingGeneratorConfig {
            batch_size: 10,
            batch_pause: Duration::from_millis(100),
            max_tokens_per_chunk: 8000,
        }
    }
}

impl EmbeddingGeneratorConfig {
    pub fn validate(&self) -> DomainResult<()> {
        if self.batch_size == 0 {
            return Err(DomainError::InvalidValue(
                "embedding batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Embedded chunks of one document plus what it cost to produce them
#[derive(Debug, Clone)]
pub struct EmbeddingRun {
    pub embedded: Vec<EmbeddedChunk>,
    pub batches: usize,
    pub total_tokens: u64,
}

/// Rough token estimate used by callers before sending text to a provider
pub fn estimate_token_count(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Service that turns chunks and queries into vectors through an [`EmbeddingProvider`]
pub struct EmbeddingGenerator {
    config: EmbeddingGeneratorConfig,
    provider: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingGenerator {
    pub fn new(
        config: EmbeddingGeneratorConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> DomainResult<Self> {
        config.validate()?;
        info!(
            "Initializing EmbeddingGenerator with model {} ({} dimensions), batch size {}",
            provider.model(),
            provider.dimension_count(),
            config.batch_size
        );
        Ok(EmbeddingGenerator { config, provider })
    }

    pub fn config(&self) -> &EmbeddingGeneratorConfig {
        &self.config
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub fn dimension_count(&self) -> usize {
        self.provider.dimension_count()
    }

    pub fn is_within_token_limit(&self, text: &str) -> bool {
        estimate_token_count(text) <= self.config.max_tokens_per_chunk
    }

    /// Embed every chunk, batch by batch, preserving chunk order.
    ///
    /// Chunks inside a batch are embedded concurrently. The first failing chunk
    /// aborts the whole run and no embeddings are returned.
    pub async fn embed_chunks(&self, chunks: Vec<Chunk>) -> EmbeddingResult<EmbeddingRun> {
        let total = chunks.len();
        let batch_count = total.div_ceil(self.config.batch_size);
        info!(
            "Generating embeddings for {} chunks in {} batches",
            total, batch_count
        );

        let mut embedded = Vec::with_capacity(total);
        let mut pending = chunks.into_iter().peekable();
        let mut batches = 0;

        while pending.peek().is_some() {
            let batch: Vec<Chunk> = pending.by_ref().take(self.config.batch_size).collect();
            batches += 1;
            debug!(
                "Embedding batch {}/{} ({} chunks)",
                batches,
                batch_count,
                batch.len()
            );

            let results = try_join_all(batch.into_iter().map(|chunk| self.embed_chunk(chunk))).await?;
            embedded.extend(results);

            if pending.peek().is_some() && !self.config.batch_pause.is_zero() {
                tokio::time::sleep(self.config.batch_pause).await;
            }
        }

        let total_tokens = embedded.iter().map(|e| u64::from(e.tokens)).sum();
        info!(
            "Generated {} embeddings using {} tokens",
            embedded.len(),
            total_tokens
        );

        Ok(EmbeddingRun {
            embedded,
            batches,
            total_tokens,
        })
    }

    async fn embed_chunk(&self, chunk: Chunk) -> EmbeddingResult<EmbeddedChunk> {
        let chunk_index = chunk.index();
        if !self.is_within_token_limit(chunk.text()) {
            warn!(
                "Chunk {} is estimated at {} tokens, above the {} token ceiling",
                chunk_index,
                estimate_token_count(chunk.text()),
                self.config.max_tokens_per_chunk
            );
        }

        let failed = |message: String| EmbeddingError::EmbeddingFailed {
            chunk_index,
            message,
        };

        let response = self
            .provider
            .embed(chunk.text())
            .await
            .map_err(|e| failed(format!("{:#}", e)))?;
        let vector = self.validate_vector(response.vector).map_err(failed)?;

        Ok(EmbeddedChunk::new(chunk, vector, response.tokens))
    }

    /// Embed a retrieval query
    pub async fn embed_query(&self, text: &str) -> EmbeddingResult<EmbeddingVector> {
        debug!("Generating query embedding (length: {})", text.len());

        let response = self
            .provider
            .embed(text)
            .await
            .map_err(|e| EmbeddingError::QueryEmbeddingFailed(format!("{:#}", e)))?;

        self.validate_vector(response.vector)
            .map_err(EmbeddingError::QueryEmbeddingFailed)
    }

    fn validate_vector(&self, values: Vec<f32>) -> Result<EmbeddingVector, String> {
        let expected = self.provider.dimension_count();
        if values.len() != expected {
            return Err(format!(
                "expected {} dimensions, got {}",
                expected,
                values.len()
            ));
        }
        EmbeddingVector::new(values).map_err(|e| e.to_string())
    }

    pub async fn health_check(&self) -> ServiceHealth {
        self.provider.health_check().await
    }
}
