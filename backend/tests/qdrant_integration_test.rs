/// End-to-end tests against a local Qdrant server with SQLite and file storage
mod common;

use common::{agent, product_brochure, test_config, HashEmbeddingProvider, HASH_DIMENSIONS};
use rag_backend::application::{
    dto::QueryOptions,
    ports::VectorStore,
    services::{DocumentProcessingService, EmbeddingGenerator, EmbeddingGeneratorConfig},
};
use rag_backend::domain::{base::Entity, value_objects::ProcessingStatus};
use rag_backend::infrastructure::embeddings::QdrantVectorStore;
use rag_backend::infrastructure::persistence::SqliteDocumentRepository;
use rag_backend::infrastructure::storage::FsBlobStore;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

struct LiveStack {
    service: DocumentProcessingService<SqliteDocumentRepository>,
    store: Arc<QdrantVectorStore>,
    _blobs: TempDir,
}

async fn live_stack() -> LiveStack {
    let collection = format!("rag-test-{}", uuid::Uuid::new_v4());
    let store = Arc::new(QdrantVectorStore::new_local(collection, HASH_DIMENSIONS).unwrap());
    let blobs = TempDir::new().unwrap();

    let embeddings = EmbeddingGenerator::new(
        EmbeddingGeneratorConfig::default(),
        Arc::new(HashEmbeddingProvider::new()),
    )
    .unwrap();
    let service = DocumentProcessingService::new(
        test_config(),
        Arc::new(Mutex::new(SqliteDocumentRepository::new_in_memory().unwrap())),
        Arc::new(FsBlobStore::new(blobs.path())),
        Arc::new(embeddings),
        store.clone(),
    )
    .unwrap();
    service.initialize().await.unwrap();

    LiveStack {
        service,
        store,
        _blobs: blobs,
    }
}

#[tokio::test]
#[ignore] // Requires running Qdrant instance
async fn test_ingest_query_delete_against_qdrant() {
    let stack = live_stack().await;
    let agent = agent("agent-1");

    let document = stack
        .service
        .register_document(&agent, "brochure.txt", "text/plain", product_brochure().as_bytes())
        .await
        .unwrap();
    let outcome = stack
        .service
        .process_document(&agent, document.id())
        .await
        .unwrap();
    assert!(outcome.success, "{:?}", outcome.error);

    let report = stack
        .service
        .verify_document_vectors(&agent, document.id())
        .await
        .unwrap();
    assert!(report.consistent);

    let info = stack.store.collection_info().await.unwrap();
    assert_eq!(info.vector_size, HASH_DIMENSIONS);

    let response = stack
        .service
        .query(
            "Which integrations are available?",
            &QueryOptions::for_agent(agent.clone()).with_threshold(0.0),
        )
        .await;
    assert!(response.success, "{:?}", response.error);
    assert!(!response.results.is_empty());
    assert!(response
        .results
        .windows(2)
        .all(|pair| pair[0].score >= pair[1].score));

    let other = stack
        .service
        .query(
            "Which integrations are available?",
            &QueryOptions::for_agent(common::agent("agent-2")).with_threshold(0.0),
        )
        .await;
    assert!(other.results.is_empty());

    stack.service.delete_document(&agent, document.id()).await.unwrap();
    assert_eq!(stack.store.count_by_document(document.id()).await.unwrap(), 0);

    stack.store.delete_collection().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires running Qdrant instance
async fn test_reprocess_does_not_duplicate_points() {
    let stack = live_stack().await;
    let agent = agent("agent-1");

    let document = stack
        .service
        .register_document(&agent, "brochure.txt", "text/plain", product_brochure().as_bytes())
        .await
        .unwrap();
    let first = stack
        .service
        .process_document(&agent, document.id())
        .await
        .unwrap();
    let second = stack
        .service
        .reprocess_document(&agent, document.id())
        .await
        .unwrap();

    assert_eq!(first.vector_count, second.vector_count);
    assert_eq!(
        stack.store.count_by_document(document.id()).await.unwrap(),
        second.vector_count as u64
    );

    let stats = stack.service.agent_stats(&agent).await.unwrap();
    assert_eq!(stats.processed_documents, 1);
    assert_eq!(stats.total_vectors, second.vector_count);

    let status = stack
        .service
        .processing_status(&agent, document.id())
        .await
        .unwrap();
    assert_eq!(status.status, ProcessingStatus::Completed);

    stack.store.delete_collection().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires running Qdrant instance
async fn test_initialize_is_idempotent() {
    let stack = live_stack().await;

    stack.store.initialize().await.unwrap();
    let health = stack.store.health_check().await;
    assert!(health.healthy, "{}", health.message);

    stack.store.delete_collection().await.unwrap();
}
