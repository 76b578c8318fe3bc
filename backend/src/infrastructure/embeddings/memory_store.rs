/// In-process vector store with exact cosine search
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::dto::ServiceHealth;
use crate::application::ports::{
    CollectionInfo, ScoredRecord, SearchFilter, VectorPayload, VectorStore,
};
use crate::domain::entities::EmbeddedChunk;
use crate::domain::value_objects::{AgentId, DocumentId, EmbeddingVector};

struct StoredPoint {
    id: String,
    vector: EmbeddingVector,
    payload: VectorPayload,
}

/// Brute-force store for offline runs and tests; same contract as the Qdrant store
pub struct InMemoryVectorStore {
    dimension_count: usize,
    points: Mutex<Vec<StoredPoint>>,
}

impl InMemoryVectorStore {
    pub fn new(dimension_count: usize) -> Self {
        InMemoryVectorStore {
            dimension_count,
            points: Mutex::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.points.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.points.lock().await.is_empty()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(
        &self,
        document_id: &DocumentId,
        agent_id: &AgentId,
        chunks: &[EmbeddedChunk],
    ) -> Result<usize> {
        for embedded in chunks {
            anyhow::ensure!(
                embedded.embedding.dimension_count() == self.dimension_count,
                "Vector dimension mismatch: expected {}, got {}",
                self.dimension_count,
                embedded.embedding.dimension_count()
            );
        }

        let mut points = self.points.lock().await;
        points.extend(chunks.iter().map(|embedded| StoredPoint {
            id: uuid::Uuid::new_v4().to_string(),
            vector: embedded.embedding.clone(),
            payload: VectorPayload::new(document_id, agent_id, embedded),
        }));
        debug!("Stored {} vectors for document {}", chunks.len(), document_id);
        Ok(chunks.len())
    }

    async fn delete_by_document(&self, document_id: &DocumentId) -> Result<()> {
        let mut points = self.points.lock().await;
        points.retain(|point| point.payload.document_id != document_id.as_str());
        Ok(())
    }

    async fn search(
        &self,
        query: &EmbeddingVector,
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredRecord>> {
        let points = self.points.lock().await;
        let mut scored = Vec::new();
        for point in points.iter().filter(|point| filter.matches(&point.payload)) {
            let score = query.cosine_similarity(&point.vector)?;
            scored.push(ScoredRecord {
                id: point.id.clone(),
                score,
                payload: point.payload.clone(),
            });
        }

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn count_by_document(&self, document_id: &DocumentId) -> Result<u64> {
        let points = self.points.lock().await;
        Ok(points
            .iter()
            .filter(|point| point.payload.document_id == document_id.as_str())
            .count() as u64)
    }

    async fn collection_info(&self) -> Result<CollectionInfo> {
        Ok(CollectionInfo {
            name: "in-memory".to_string(),
            vector_size: self.dimension_count,
            points_count: Some(self.len().await as u64),
            status: "green".to_string(),
        })
    }

    async fn health_check(&self) -> ServiceHealth {
        ServiceHealth::healthy(format!(
            "In-memory store holding {} vectors",
            self.len().await
        ))
    }
}
