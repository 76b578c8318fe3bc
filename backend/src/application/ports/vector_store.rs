use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::application::dto::ServiceHealth;
use crate::domain::entities::{ChunkMetadata, EmbeddedChunk};
use crate::domain::value_objects::{AgentId, DocumentId, EmbeddingVector};

/// Payload stored alongside every vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorPayload {
    pub document_id: String,
    pub agent_id: String,
    pub chunk_index: usize,
    pub text: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

impl VectorPayload {
    pub fn new(document_id: &DocumentId, agent_id: &AgentId, embedded: &EmbeddedChunk) -> Self {
        VectorPayload {
            document_id: document_id.as_str().to_string(),
            agent_id: agent_id.as_str().to_string(),
            chunk_index: embedded.chunk.index(),
            text: embedded.chunk.text().to_string(),
            metadata: embedded.chunk.metadata().clone(),
        }
    }
}

/// Search restriction; present fields are ANDed, absent fields are unrestricted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub agent_id: Option<AgentId>,
    pub document_ids: Option<Vec<DocumentId>>,
}

impl SearchFilter {
    pub fn for_agent(agent_id: AgentId) -> Self {
        SearchFilter {
            agent_id: Some(agent_id),
            document_ids: None,
        }
    }

    pub fn for_documents(document_ids: Vec<DocumentId>) -> Self {
        SearchFilter {
            agent_id: None,
            document_ids: Some(document_ids),
        }
    }

    pub fn with_documents(mut self, document_ids: Vec<DocumentId>) -> Self {
        self.document_ids = Some(document_ids);
        self
    }

    pub fn matches(&self, payload: &VectorPayload) -> bool {
        let agent_ok = self
            .agent_id
            .as_ref()
            .map_or(true, |agent| agent.as_str() == payload.agent_id);
        let document_ok = self.document_ids.as_ref().map_or(true, |ids| {
            ids.iter().any(|id| id.as_str() == payload.document_id)
        });
        agent_ok && document_ok
    }
}

/// A stored record returned by similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    /// Store-generated point id
    pub id: String,
    pub score: f32,
    pub payload: VectorPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInfo {
    pub name: String,
    pub vector_size: usize,
    pub points_count: Option<u64>,
    pub status: String,
}

/// One logical cosine-similarity collection shared by all agents
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection and payload indexes; existing ones are left alone
    async fn initialize(&self) -> Result<()>;

    /// Write one record per chunk under fresh store-generated ids and wait for
    /// acknowledgement. Returns the number of records written.
    async fn upsert(
        &self,
        document_id: &DocumentId,
        agent_id: &AgentId,
        chunks: &[EmbeddedChunk],
    ) -> Result<usize>;

    /// Remove every record of a document; a no-op for unknown documents
    async fn delete_by_document(&self, document_id: &DocumentId) -> Result<()>;

    /// Most similar records first
    async fn search(
        &self,
        query: &EmbeddingVector,
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredRecord>>;

    async fn count_by_document(&self, document_id: &DocumentId) -> Result<u64>;

    async fn collection_info(&self) -> Result<CollectionInfo>;

    async fn health_check(&self) -> ServiceHealth;
}
