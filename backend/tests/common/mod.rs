//! Offline fakes shared by the integration tests
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use rag_backend::application::{
    ports::{EmbeddingProvider, ProviderEmbedding},
    repositories::DocumentRepository,
    services::{
        DocumentProcessingService, EmbeddingGenerator, EmbeddingGeneratorConfig,
        JobRegistryConfig, ProcessingConfig,
    },
};
use rag_backend::domain::{
    aggregates::Document,
    base::Entity,
    value_objects::{AgentId, DocumentId},
    DomainResult,
};
use rag_backend::infrastructure::embeddings::{ChunkerConfig, InMemoryVectorStore};
use rag_backend::infrastructure::storage::InMemoryBlobStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const HASH_DIMENSIONS: usize = 64;

/// In-memory repository implementation for testing
pub struct InMemoryDocumentRepository {
    documents: HashMap<DocumentId, Document>,
}

impl InMemoryDocumentRepository {
    pub fn new() -> Self {
        Self {
            documents: HashMap::new(),
        }
    }
}

impl DocumentRepository for InMemoryDocumentRepository {
    fn save(&mut self, document: Document) -> DomainResult<()> {
        self.documents.insert(document.id().clone(), document);
        Ok(())
    }

    fn find_by_id(&self, id: &DocumentId) -> DomainResult<Option<Document>> {
        Ok(self.documents.get(id).cloned())
    }

    fn find_by_agent(&self, agent_id: &AgentId) -> DomainResult<Vec<Document>> {
        let mut documents: Vec<Document> = self
            .documents
            .values()
            .filter(|d| d.agent_id() == agent_id)
            .cloned()
            .collect();
        documents.sort_by_key(|d| d.snapshot().uploaded_at);
        Ok(documents)
    }

    fn delete(&mut self, id: &DocumentId) -> DomainResult<bool> {
        Ok(self.documents.remove(id).is_some())
    }
}

/// Deterministic bag-of-words embedding: each word lands in a hashed bucket.
///
/// Identical texts embed identically, so a chunk queried with its own text
/// scores 1.0.
pub struct HashEmbeddingProvider {
    delay: Duration,
    fail_marker: Option<&'static str>,
    calls: AtomicUsize,
}

impl HashEmbeddingProvider {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            fail_marker: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call sleeps first, keeping jobs in flight long enough to observe
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Calls whose text contains the marker fail
    pub fn failing_on(mut self, marker: &'static str) -> Self {
        self.fail_marker = Some(marker);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn bucket(word: &str) -> usize {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in word.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash % HASH_DIMENSIONS as u64) as usize
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<ProviderEmbedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(marker) = self.fail_marker {
            if text.contains(marker) {
                anyhow::bail!("provider rejected input containing {}", marker);
            }
        }

        let mut vector = vec![0.0f32; HASH_DIMENSIONS];
        let mut words = 0u32;
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[bucket(&word.to_lowercase())] += 1.0;
            words += 1;
        }

        Ok(ProviderEmbedding {
            vector,
            tokens: words,
        })
    }

    fn model(&self) -> &str {
        "hash-embedding"
    }

    fn dimension_count(&self) -> usize {
        HASH_DIMENSIONS
    }
}

pub struct Harness {
    pub service: DocumentProcessingService<InMemoryDocumentRepository>,
    pub repository: Arc<Mutex<InMemoryDocumentRepository>>,
    pub vector_store: Arc<InMemoryVectorStore>,
    pub blob_store: Arc<InMemoryBlobStore>,
    pub provider: Arc<HashEmbeddingProvider>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_provider(HashEmbeddingProvider::new())
    }

    pub fn with_provider(provider: HashEmbeddingProvider) -> Self {
        Self::build(provider, test_config())
    }

    pub fn build(provider: HashEmbeddingProvider, config: ProcessingConfig) -> Self {
        let provider = Arc::new(provider);
        let repository = Arc::new(Mutex::new(InMemoryDocumentRepository::new()));
        let vector_store = Arc::new(InMemoryVectorStore::new(HASH_DIMENSIONS));
        let blob_store = Arc::new(InMemoryBlobStore::new());

        let embeddings = Arc::new(
            EmbeddingGenerator::new(
                EmbeddingGeneratorConfig {
                    batch_size: 4,
                    batch_pause: Duration::ZERO,
                    ..Default::default()
                },
                provider.clone(),
            )
            .unwrap(),
        );

        let service = DocumentProcessingService::new(
            config,
            repository.clone(),
            blob_store.clone(),
            embeddings,
            vector_store.clone(),
        )
        .unwrap();

        Self {
            service,
            repository,
            vector_store,
            blob_store,
            provider,
        }
    }

    pub async fn document(&self, id: &DocumentId) -> Option<Document> {
        self.repository.lock().await.find_by_id(id).unwrap()
    }

    /// Register a plain-text document without starting its pipeline
    pub async fn upload_text(&self, agent: &AgentId, name: &str, text: &str) -> DocumentId {
        self.service
            .register_document(agent, name, "text/plain", text.as_bytes())
            .await
            .unwrap()
            .id()
            .clone()
    }
}

/// Small chunks, no pauses, manual processing
pub fn test_config() -> ProcessingConfig {
    ProcessingConfig {
        chunker: ChunkerConfig {
            chunk_size: 200,
            overlap: 40,
        },
        document_pause: Duration::ZERO,
        auto_process: false,
        jobs: JobRegistryConfig::default(),
    }
}

pub fn agent(id: &str) -> AgentId {
    AgentId::new(id).unwrap()
}

/// Product copy long enough to span several 200-character chunks
pub fn product_brochure() -> String {
    [
        "Acme Analytics gives revenue teams a live view of every deal in the pipeline.",
        "Dashboards refresh every five minutes and can be shared with read-only links.",
        "The Starter plan costs 29 dollars per seat per month and includes five dashboards.",
        "The Enterprise plan costs 79 dollars per seat per month with unlimited dashboards.",
        "Enterprise customers also receive single sign-on, audit logs and a dedicated manager.",
        "Data is encrypted at rest with AES-256 and in transit with TLS 1.3.",
        "Native integrations cover Salesforce, HubSpot, Slack and Google Sheets.",
        "Support is available around the clock by chat, and by phone on Enterprise.",
    ]
    .join(" ")
}
