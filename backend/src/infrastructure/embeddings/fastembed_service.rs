/// FastEmbed provider for local embedding generation
use anyhow::{Context, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel as FastEmbedModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::application::ports::{EmbeddingProvider, ProviderEmbedding};
use crate::application::services::estimate_token_count;
use crate::domain::value_objects::EmbeddingModel;

/// Embedding provider backed by an in-process ONNX model.
///
/// Inference is CPU bound, so every call runs on the blocking pool.
pub struct FastEmbedService {
    model: Arc<Mutex<TextEmbedding>>,
    model_type: EmbeddingModel,
}

impl FastEmbedService {
    /// Load the model, downloading it on first use
    pub async fn new(model_type: EmbeddingModel) -> Result<Self> {
        info!("Initializing FastEmbed service with model: {}", model_type);

        let fastembed_model = match model_type {
            EmbeddingModel::AllMiniLML6V2 => FastEmbedModel::AllMiniLML6V2,
            other => anyhow::bail!("{} is not available through fastembed", other),
        };

        let model = tokio::task::spawn_blocking(move || {
            TextEmbedding::try_new(
                InitOptions::new(fastembed_model).with_show_download_progress(true),
            )
        })
        .await
        .context("FastEmbed initialization task panicked")?
        .context("Failed to initialize FastEmbed model")?;

        info!("FastEmbed model initialized successfully");

        Ok(FastEmbedService {
            model: Arc::new(Mutex::new(model)),
            model_type,
        })
    }

    pub async fn new_default() -> Result<Self> {
        Self::new(EmbeddingModel::AllMiniLML6V2).await
    }

    pub fn model_type(&self) -> EmbeddingModel {
        self.model_type
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedService {
    async fn embed(&self, text: &str) -> Result<ProviderEmbedding> {
        debug!("Generating embedding for text (length: {})", text.len());

        let model = Arc::clone(&self.model);
        let input = text.to_string();
        let tokens = estimate_token_count(text) as u32;

        let vector = tokio::task::spawn_blocking(move || -> Result<Vec<f32>> {
            let mut model = model
                .lock()
                .map_err(|_| anyhow::anyhow!("FastEmbed model lock poisoned"))?;
            let embeddings = model
                .embed(vec![input], None)
                .context("Failed to generate embedding")?;
            embeddings
                .into_iter()
                .next()
                .context("No embedding returned")
        })
        .await
        .context("FastEmbed task panicked")??;

        Ok(ProviderEmbedding { vector, tokens })
    }

    fn model(&self) -> &str {
        self.model_type.as_str()
    }

    fn dimension_count(&self) -> usize {
        self.model_type.dimension_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::EmbeddingVector;

    #[tokio::test]
    async fn test_rejects_hosted_model() {
        let result = FastEmbedService::new(EmbeddingModel::TextEmbedding3Small).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    #[ignore] // Downloads the model on first run
    async fn test_embed_single_text() {
        let service = FastEmbedService::new_default().await.unwrap();
        assert_eq!(service.model(), "all-MiniLM-L6-v2");

        let embedding = service
            .embed("This is a test sentence for embedding generation.")
            .await
            .unwrap();
        assert_eq!(embedding.vector.len(), 384);
        assert!(embedding.tokens > 0);
    }

    #[tokio::test]
    #[ignore] // Downloads the model on first run
    async fn test_health_check_reports_dimensions() {
        let service = FastEmbedService::new_default().await.unwrap();
        let health = service.health_check().await;
        assert!(health.healthy);
        assert_eq!(health.dimensions, Some(384));
    }

    #[tokio::test]
    #[ignore] // Downloads the model on first run
    async fn test_embedding_similarity() {
        let service = FastEmbedService::new_default().await.unwrap();

        let embed = |text: &'static str| {
            let service = &service;
            async move {
                EmbeddingVector::new(service.embed(text).await.unwrap().vector).unwrap()
            }
        };
        let pricing = embed("Our enterprise plan costs 40 dollars per seat.").await;
        let related = embed("How much does the enterprise tier cost?").await;
        let unrelated = embed("The weather is nice today.").await;

        let sim_related = pricing.cosine_similarity(&related).unwrap();
        let sim_unrelated = pricing.cosine_similarity(&unrelated).unwrap();
        assert!(sim_related > sim_unrelated);
    }
}
