use anyhow::Result;
use async_trait::async_trait;

use crate::application::dto::ServiceHealth;

pub const HEALTH_CHECK_TEXT: &str = "Health check test";

/// One embedding returned by a provider together with the tokens it billed
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEmbedding {
    pub vector: Vec<f32>,
    pub tokens: u32,
}

/// Turns a single text into a fixed-dimension vector.
///
/// There is no batch endpoint; callers get throughput by issuing concurrent calls.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<ProviderEmbedding>;

    /// Identifier persisted on processed documents
    fn model(&self) -> &str;

    fn dimension_count(&self) -> usize;

    async fn health_check(&self) -> ServiceHealth {
        match self.embed(HEALTH_CHECK_TEXT).await {
            Ok(embedding) if embedding.vector.len() == self.dimension_count() => {
                ServiceHealth::healthy("Embedding service is working")
                    .with_model(self.model(), embedding.vector.len())
            }
            Ok(embedding) => ServiceHealth::unhealthy(format!(
                "Expected {} dimensions, provider returned {}",
                self.dimension_count(),
                embedding.vector.len()
            )),
            Err(e) => ServiceHealth::unhealthy(format!("{:#}", e)),
        }
    }
}
