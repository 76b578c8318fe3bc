/// Qdrant vector store for document chunks
use anyhow::{Context, Result};
use async_trait::async_trait;
use qdrant_client::{
    Payload,
    Qdrant,
    qdrant::{
        point_id::PointIdOptions, value::Kind, Condition, CountPointsBuilder,
        CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, DeletePointsBuilder,
        Distance, FieldType, Filter, PointId, PointStruct, SearchPointsBuilder,
        UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
    },
};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::application::dto::ServiceHealth;
use crate::application::ports::{
    CollectionInfo, ScoredRecord, SearchFilter, VectorPayload, VectorStore,
};
use crate::domain::entities::{ChunkMetadata, EmbeddedChunk};
use crate::domain::value_objects::{AgentId, DocumentId, EmbeddingVector};

pub const DEFAULT_COLLECTION_NAME: &str = "salesai-documents";

/// Points written per upsert request
const UPSERT_BATCH_SIZE: usize = 256;

/// Payload fields that get a keyword index for filtering
const INDEXED_FIELDS: [&str; 2] = ["documentId", "agentId"];

/// Vector store implementation using Qdrant
pub struct QdrantVectorStore {
    client: Qdrant,
    collection_name: String,
    dimension_count: usize,
}

impl QdrantVectorStore {
    /// Connect to a Qdrant server. The collection is created by [`VectorStore::initialize`].
    ///
    /// # Arguments
    /// * `url` - Qdrant gRPC URL (e.g., "http://localhost:6334")
    /// * `api_key` - Optional API key for hosted clusters
    /// * `collection_name` - Name of the shared collection
    /// * `dimension_count` - Vector dimension of the configured embedding model
    pub fn new(
        url: &str,
        api_key: Option<String>,
        collection_name: impl Into<String>,
        dimension_count: usize,
    ) -> Result<Self> {
        info!("Connecting to Qdrant at {}", url);

        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .build()
            .context("Failed to connect to Qdrant")?;

        Ok(QdrantVectorStore {
            client,
            collection_name: collection_name.into(),
            dimension_count,
        })
    }

    /// Create a new store with default local connection
    pub fn new_local(collection_name: impl Into<String>, dimension_count: usize) -> Result<Self> {
        Self::new("http://localhost:6334", None, collection_name, dimension_count)
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    async fn collection_exists(&self) -> Result<bool> {
        let collections = self.client.list_collections().await?;
        Ok(collections
            .collections
            .iter()
            .any(|c| c.name == self.collection_name))
    }

    async fn create_collection(&self) -> Result<()> {
        let result = self
            .client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection_name).vectors_config(
                    VectorParamsBuilder::new(self.dimension_count as u64, Distance::Cosine),
                ),
            )
            .await;

        match result {
            Ok(_) => {
                info!(
                    "Created collection '{}' with {} dimensions",
                    self.collection_name, self.dimension_count
                );
                Ok(())
            }
            Err(e) if is_already_exists(&e.to_string()) => {
                info!("Collection '{}' already exists", self.collection_name);
                Ok(())
            }
            Err(e) => Err(e).context("Failed to create collection"),
        }
    }

    async fn create_payload_index(&self, field: &str) -> Result<()> {
        let result = self
            .client
            .create_field_index(
                CreateFieldIndexCollectionBuilder::new(
                    &self.collection_name,
                    field,
                    FieldType::Keyword,
                )
                .wait(true),
            )
            .await;

        match result {
            Ok(_) => {
                debug!("Payload index on '{}' ready", field);
                Ok(())
            }
            Err(e) if is_already_exists(&e.to_string()) => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to create index on {}", field)),
        }
    }

    /// Delete the collection (useful for testing)
    pub async fn delete_collection(&self) -> Result<()> {
        self.client
            .delete_collection(&self.collection_name)
            .await
            .context("Failed to delete collection")?;
        info!("Deleted collection: {}", self.collection_name);
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn initialize(&self) -> Result<()> {
        if self.collection_exists().await? {
            info!("Collection '{}' already exists", self.collection_name);
        } else {
            info!("Creating collection: {}", self.collection_name);
            self.create_collection().await?;
        }

        for field in INDEXED_FIELDS {
            self.create_payload_index(field).await?;
        }
        Ok(())
    }

    async fn upsert(
        &self,
        document_id: &DocumentId,
        agent_id: &AgentId,
        chunks: &[EmbeddedChunk],
    ) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        debug!(
            "Upserting {} vectors for document {}",
            chunks.len(),
            document_id
        );

        for batch in chunks.chunks(UPSERT_BATCH_SIZE) {
            let points = batch
                .iter()
                .map(|embedded| build_point(document_id, agent_id, embedded))
                .collect::<Result<Vec<_>>>()?;

            self.client
                .upsert_points(
                    UpsertPointsBuilder::new(&self.collection_name, points).wait(true),
                )
                .await
                .context("Failed to upsert vectors")?;
        }

        Ok(chunks.len())
    }

    async fn delete_by_document(&self, document_id: &DocumentId) -> Result<()> {
        debug!("Deleting all vectors for document: {}", document_id);

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection_name)
                    .points(document_filter(document_id))
                    .wait(true),
            )
            .await
            .context("Failed to delete document vectors")?;

        Ok(())
    }

    async fn search(
        &self,
        query: &EmbeddingVector,
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredRecord>> {
        debug!("Searching with limit: {}", limit);

        let mut request = SearchPointsBuilder::new(
            &self.collection_name,
            query.dimensions().to_vec(),
            limit as u64,
        )
        .with_payload(true);
        if let Some(filter) = search_filter(filter) {
            request = request.filter(filter);
        }

        let search_result = self
            .client
            .search_points(request)
            .await
            .context("Search failed")?;

        let results: Vec<ScoredRecord> = search_result
            .result
            .into_iter()
            .map(|point| ScoredRecord {
                id: point.id.map(point_id_string).unwrap_or_default(),
                score: point.score,
                payload: payload_from(&point.payload),
            })
            .collect();

        debug!("Found {} results", results.len());
        Ok(results)
    }

    async fn count_by_document(&self, document_id: &DocumentId) -> Result<u64> {
        let response = self
            .client
            .count(
                CountPointsBuilder::new(&self.collection_name)
                    .filter(document_filter(document_id))
                    .exact(true),
            )
            .await
            .context("Failed to count document vectors")?;

        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    async fn collection_info(&self) -> Result<CollectionInfo> {
        let collection = self
            .client
            .collection_info(&self.collection_name)
            .await
            .context("Failed to get collection info")?;

        let (points_count, status) = match collection.result {
            Some(result) => (result.points_count, result.status().as_str_name().to_lowercase()),
            None => (None, "unknown".to_string()),
        };

        Ok(CollectionInfo {
            name: self.collection_name.clone(),
            vector_size: self.dimension_count,
            points_count,
            status,
        })
    }

    async fn health_check(&self) -> ServiceHealth {
        match self.client.health_check().await {
            Ok(reply) => match self.collection_exists().await {
                Ok(true) => ServiceHealth::healthy(format!(
                    "Qdrant {} is reachable, collection '{}' present",
                    reply.version, self.collection_name
                )),
                Ok(false) => ServiceHealth::unhealthy(format!(
                    "Collection '{}' does not exist",
                    self.collection_name
                )),
                Err(e) => ServiceHealth::unhealthy(format!("{:#}", e)),
            },
            Err(e) => {
                warn!("Qdrant health check failed: {}", e);
                ServiceHealth::unhealthy(format!("Qdrant unreachable: {}", e))
            }
        }
    }
}

/// One point per chunk under a fresh UUID; the chunk index only lives in the payload
fn build_point(
    document_id: &DocumentId,
    agent_id: &AgentId,
    embedded: &EmbeddedChunk,
) -> Result<PointStruct> {
    let payload: Payload = json!({
        "documentId": document_id.as_str(),
        "agentId": agent_id.as_str(),
        "chunkIndex": embedded.chunk.index(),
        "text": embedded.chunk.text(),
        "metadata": embedded.chunk.metadata(),
    })
    .try_into()
    .context("Failed to serialize payload")?;

    Ok(PointStruct::new(
        uuid::Uuid::new_v4().to_string(),
        embedded.embedding.dimensions().to_vec(),
        payload,
    ))
}

fn is_already_exists(message: &str) -> bool {
    message.to_lowercase().contains("already exists")
}

fn document_filter(document_id: &DocumentId) -> Filter {
    Filter::must([Condition::matches(
        "documentId",
        document_id.as_str().to_string(),
    )])
}

/// Translate the port filter; `None` when it places no restriction
fn search_filter(filter: &SearchFilter) -> Option<Filter> {
    let mut conditions = Vec::new();
    if let Some(agent_id) = &filter.agent_id {
        conditions.push(Condition::matches("agentId", agent_id.as_str().to_string()));
    }
    if let Some(document_ids) = &filter.document_ids {
        let ids: Vec<String> = document_ids.iter().map(|id| id.as_str().to_string()).collect();
        conditions.push(Condition::matches("documentId", ids));
    }

    if conditions.is_empty() {
        None
    } else {
        Some(Filter::must(conditions))
    }
}

fn point_id_string(id: PointId) -> String {
    match id.point_id_options {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

fn payload_from(payload: &HashMap<String, QdrantValue>) -> VectorPayload {
    let string_field = |key: &str| {
        payload
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_default()
    };

    let metadata = match payload.get("metadata").map(to_json) {
        Some(Value::Object(map)) => map,
        _ => ChunkMetadata::new(),
    };

    VectorPayload {
        document_id: string_field("documentId"),
        agent_id: string_field("agentId"),
        chunk_index: payload
            .get("chunkIndex")
            .and_then(|v| v.as_integer())
            .map(|i| i.max(0) as usize)
            .unwrap_or_default(),
        text: string_field("text"),
        metadata,
    }
}

fn to_json(value: &QdrantValue) -> Value {
    match &value.kind {
        Some(Kind::NullValue(_)) | None => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(*b),
        Some(Kind::IntegerValue(i)) => Value::from(*i),
        Some(Kind::DoubleValue(d)) => Value::from(*d),
        Some(Kind::StringValue(s)) => Value::String(s.clone()),
        Some(Kind::ListValue(list)) => Value::Array(list.values.iter().map(to_json).collect()),
        Some(Kind::StructValue(fields)) => Value::Object(
            fields
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Chunk;

    fn agent(id: &str) -> AgentId {
        AgentId::new(id).unwrap()
    }

    fn doc(id: &str) -> DocumentId {
        DocumentId::new(id).unwrap()
    }

    fn embedded(document_id: &DocumentId, index: usize, text: &str, value: f32) -> EmbeddedChunk {
        let mut metadata = ChunkMetadata::new();
        metadata.insert("documentName".to_string(), json!("handbook.pdf"));
        let chunk = Chunk::new(index, text.to_string(), 0, text.len(), document_id.clone(), metadata);
        EmbeddedChunk::new(chunk, EmbeddingVector::new(vec![value; 384]).unwrap(), 4)
    }

    #[test]
    fn test_empty_filter_is_unrestricted() {
        assert!(search_filter(&SearchFilter::default()).is_none());
    }

    #[test]
    fn test_filter_combines_agent_and_documents() {
        let filter = search_filter(
            &SearchFilter::for_agent(agent("agent-1")).with_documents(vec![doc("a"), doc("b")]),
        )
        .unwrap();
        assert_eq!(filter.must.len(), 2);
    }

    #[test]
    fn test_already_exists_detection() {
        assert!(is_already_exists("Wrong input: Collection `x` already exists!"));
        assert!(!is_already_exists("connection refused"));
    }

    #[test]
    fn test_payload_round_trip_through_qdrant_values() {
        let chunk = embedded(&doc("doc-1"), 3, "Refund policy", 0.1);
        let point = build_point(&doc("doc-1"), &agent("agent-1"), &chunk).unwrap();

        let payload = payload_from(&point.payload);
        assert_eq!(payload.document_id, "doc-1");
        assert_eq!(payload.agent_id, "agent-1");
        assert_eq!(payload.chunk_index, 3);
        assert_eq!(payload.text, "Refund policy");
        assert_eq!(payload.metadata["documentName"], json!("handbook.pdf"));
    }

    #[test]
    fn test_point_ids_are_fresh_uuids() {
        let chunk = embedded(&doc("doc-1"), 0, "text", 0.1);
        let first = build_point(&doc("doc-1"), &agent("a"), &chunk).unwrap();
        let second = build_point(&doc("doc-1"), &agent("a"), &chunk).unwrap();

        let first_id = first.id.map(point_id_string).unwrap();
        let second_id = second.id.map(point_id_string).unwrap();
        assert_ne!(first_id, second_id);
        assert!(uuid::Uuid::parse_str(&first_id).is_ok());
    }

    // These tests require a running Qdrant instance
    // Run with: docker run -p 6333:6333 -p 6334:6334 qdrant/qdrant

    async fn create_test_store() -> QdrantVectorStore {
        let collection_name = format!("test_collection_{}", uuid::Uuid::new_v4());
        let store = QdrantVectorStore::new_local(collection_name, 384).unwrap();
        store.initialize().await.unwrap();
        store
    }

    #[tokio::test]
    #[ignore] // Requires running Qdrant instance
    async fn test_initialize_is_idempotent() {
        let store = create_test_store().await;
        store.initialize().await.unwrap();

        let info = store.collection_info().await.unwrap();
        assert_eq!(info.points_count, Some(0));
        assert_eq!(info.vector_size, 384);
        assert!(store.health_check().await.healthy);

        let _ = store.delete_collection().await;
    }

    #[tokio::test]
    #[ignore] // Requires running Qdrant instance
    async fn test_upsert_search_and_delete() {
        let store = create_test_store().await;
        let document = doc("doc-1");
        let chunks: Vec<EmbeddedChunk> = (0..5)
            .map(|i| embedded(&document, i, &format!("Content {}", i), 0.1 + i as f32 * 0.1))
            .collect();

        let written = store.upsert(&document, &agent("agent-1"), &chunks).await.unwrap();
        assert_eq!(written, 5);
        assert_eq!(store.count_by_document(&document).await.unwrap(), 5);

        let query = EmbeddingVector::new(vec![0.1; 384]).unwrap();
        let results = store
            .search(&query, 3, &SearchFilter::for_agent(agent("agent-1")))
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));

        let other_agent = store
            .search(&query, 3, &SearchFilter::for_agent(agent("agent-2")))
            .await
            .unwrap();
        assert!(other_agent.is_empty());

        store.delete_by_document(&document).await.unwrap();
        assert_eq!(store.count_by_document(&document).await.unwrap(), 0);
        store.delete_by_document(&document).await.unwrap();

        let _ = store.delete_collection().await;
    }
}
