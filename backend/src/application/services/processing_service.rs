/// Per-document RAG pipeline: extract, chunk, embed, store
use anyhow::Context;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::embedding_service::{EmbeddingError, EmbeddingGenerator};
use super::job_registry::{JobRegistry, JobRegistryConfig, ProcessingJob};
use crate::application::dto::{
    AgentRagStats, BatchOutcome, HealthReport, ProcessingOutcome, QueryOptions, QueryResponse,
    VerificationReport,
};
use crate::application::ports::{BlobStore, VectorStore};
use crate::application::repositories::DocumentRepository;
use crate::application::use_cases::{QueryDocuments, VerifyDocumentVectors};
use crate::domain::aggregates::{Document, ProcessingStats, RagMetadata};
use crate::domain::base::{DomainError, DomainResult, Entity};
use crate::domain::entities::ChunkMetadata;
use crate::domain::value_objects::{
    AgentId, ContentType, DocumentId, JobKey, Milestone, ProcessingStatus,
};
use crate::infrastructure::embeddings::{ChunkerConfig, TextChunker};
use crate::infrastructure::parsers::{ExtractionError, TextExtractor};

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("Blob store error: {0}")]
    BlobStore(String),

    #[error("Failed to write vectors: {0}")]
    VectorStoreWriteFailed(String),

    #[error("Failed to read vectors: {0}")]
    VectorStoreReadFailed(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("No processing job found for {0}")]
    JobNotFound(String),

    #[error("Document {0} is already being processed")]
    AlreadyProcessing(String),

    #[error("Processing of {0} was cancelled")]
    Cancelled(String),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

pub type ProcessingResult<T> = Result<T, ProcessingError>;

/// Configuration for the processing service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingConfig {
    pub chunker: ChunkerConfig,
    /// Pause between documents in batch mode
    pub document_pause: Duration,
    /// Start the pipeline as soon as a document is registered
    pub auto_process: bool,
    pub jobs: JobRegistryConfig,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        ProcessingConfig {
            chunker: ChunkerConfig::default(),
            document_pause: Duration::from_secs(1),
            auto_process: true,
            jobs: JobRegistryConfig::default(),
        }
    }
}

/// How a run enters the processing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Start,
    Reprocess,
}

/// Control handles of one in-flight run
#[derive(Clone)]
struct RunHandle {
    id: u64,
    cancel: CancellationToken,
    /// Fired once the run has settled, or its future was dropped
    finished: CancellationToken,
}

struct ServiceInner<R> {
    config: ProcessingConfig,
    repository: Arc<Mutex<R>>,
    blob_store: Arc<dyn BlobStore>,
    extractor: TextExtractor,
    chunker: TextChunker,
    embeddings: Arc<EmbeddingGenerator>,
    vector_store: Arc<dyn VectorStore>,
    jobs: Arc<JobRegistry>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    runs: Mutex<HashMap<JobKey, RunHandle>>,
    next_run: AtomicU64,
}

/// Drives documents through the pipeline and owns their processing state.
///
/// The durable [`Document`] record is the source of truth; the job registry is
/// a process-local progress cache. Background runs are tracked and can be
/// cancelled individually or all at once through [`shutdown`](Self::shutdown).
pub struct DocumentProcessingService<R> {
    inner: Arc<ServiceInner<R>>,
}

impl<R> Clone for DocumentProcessingService<R> {
    fn clone(&self) -> Self {
        DocumentProcessingService {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> DocumentProcessingService<R>
where
    R: DocumentRepository + Send + 'static,
{
    pub fn new(
        config: ProcessingConfig,
        repository: Arc<Mutex<R>>,
        blob_store: Arc<dyn BlobStore>,
        embeddings: Arc<EmbeddingGenerator>,
        vector_store: Arc<dyn VectorStore>,
    ) -> DomainResult<Self> {
        let chunker = TextChunker::new(config.chunker)?;
        let jobs = Arc::new(JobRegistry::new(config.jobs));

        Ok(DocumentProcessingService {
            inner: Arc::new(ServiceInner {
                config,
                repository,
                blob_store,
                extractor: TextExtractor::new(),
                chunker,
                embeddings,
                vector_store,
                jobs,
                tracker: TaskTracker::new(),
                shutdown: CancellationToken::new(),
                runs: Mutex::new(HashMap::new()),
                next_run: AtomicU64::new(0),
            }),
        })
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.inner.config
    }

    /// Progress cache shared with pollers
    pub fn job_registry(&self) -> Arc<JobRegistry> {
        Arc::clone(&self.inner.jobs)
    }

    /// Bootstrap the vector collection and check both external services
    pub async fn initialize(&self) -> anyhow::Result<HealthReport> {
        info!("Initializing document processing service");

        self.inner
            .vector_store
            .initialize()
            .await
            .context("Failed to initialize vector store")?;

        let report = self.health_check().await;
        if !report.healthy {
            anyhow::bail!(
                "Service unhealthy (vector store: {}, embeddings: {})",
                report.vector_store.message,
                report.embeddings.message
            );
        }

        info!("Document processing service initialized");
        Ok(report)
    }

    /// Store a newly uploaded document as pending and, when auto-processing is
    /// enabled, start its pipeline in the background.
    pub async fn register_document(
        &self,
        agent_id: &AgentId,
        name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> ProcessingResult<Document> {
        if ContentType::from_mime(content_type).is_none() {
            return Err(ExtractionError::UnsupportedFormat(content_type.to_string()).into());
        }

        let document_id = DocumentId::generate();
        let storage_key = format!("agents/{}/{}/{}", agent_id, document_id, name);

        self.inner
            .blob_store
            .put(&storage_key, bytes)
            .await
            .map_err(|e| ProcessingError::BlobStore(format!("{:#}", e)))?;

        let document = Document::new(
            document_id,
            agent_id.clone(),
            name,
            content_type,
            bytes.len() as u64,
            storage_key,
        );
        self.save(document.clone()).await?;
        info!(
            "Registered document {} ({}) for agent {}",
            document.id(),
            name,
            agent_id
        );

        if self.inner.config.auto_process {
            if let Err(e) = self.spawn_document(agent_id, document.id()).await {
                warn!("Failed to start processing of {}: {}", document.id(), e);
            }
        }

        Ok(document)
    }

    /// Run the pipeline for a pending document and wait for it to finish.
    ///
    /// Stage failures are persisted on the document and reported in the outcome;
    /// only precondition failures are returned as errors.
    pub async fn process_document(
        &self,
        agent_id: &AgentId,
        document_id: &DocumentId,
    ) -> ProcessingResult<ProcessingOutcome> {
        let (key, document, run) = self.begin(agent_id, document_id, Entry::Start).await?;
        Ok(self.execute(key, document, run).await)
    }

    /// Re-run the pipeline for a document in any state
    pub async fn reprocess_document(
        &self,
        agent_id: &AgentId,
        document_id: &DocumentId,
    ) -> ProcessingResult<ProcessingOutcome> {
        let (key, document, run) = self.begin(agent_id, document_id, Entry::Reprocess).await?;
        Ok(self.execute(key, document, run).await)
    }

    /// Start processing in the background; returns once the job is registered
    pub async fn spawn_document(
        &self,
        agent_id: &AgentId,
        document_id: &DocumentId,
    ) -> ProcessingResult<()> {
        self.spawn(agent_id, document_id, Entry::Start).await
    }

    pub async fn spawn_reprocess(
        &self,
        agent_id: &AgentId,
        document_id: &DocumentId,
    ) -> ProcessingResult<()> {
        self.spawn(agent_id, document_id, Entry::Reprocess).await
    }

    async fn spawn(
        &self,
        agent_id: &AgentId,
        document_id: &DocumentId,
        entry: Entry,
    ) -> ProcessingResult<()> {
        let (key, document, run) = self.begin(agent_id, document_id, entry).await?;
        let service = self.clone();
        self.inner.tracker.spawn(async move {
            service.execute(key, document, run).await;
        });
        Ok(())
    }

    /// Process every document of an agent that has not been processed yet,
    /// strictly one at a time.
    pub async fn process_agent_documents(&self, agent_id: &AgentId) -> ProcessingResult<BatchOutcome> {
        let documents: Vec<Document> = self
            .inner
            .repository
            .lock()
            .await
            .find_by_agent(agent_id)?
            .into_iter()
            .filter(|document| !document.is_rag_processed())
            .collect();

        info!(
            "Processing {} unprocessed documents for agent {}",
            documents.len(),
            agent_id
        );

        let mut batch = BatchOutcome::default();
        for (position, document) in documents.iter().enumerate() {
            if self.inner.shutdown.is_cancelled() {
                warn!("Batch for agent {} stopped by shutdown", agent_id);
                break;
            }

            let entry = if document.status() == ProcessingStatus::Pending {
                Entry::Start
            } else {
                Entry::Reprocess
            };
            match self.begin(agent_id, document.id(), entry).await {
                Ok((key, document, run)) => batch.record(self.execute(key, document, run).await),
                Err(ProcessingError::AlreadyProcessing(_)) => {
                    info!("Skipping document {}: another run holds it", document.id());
                    batch.skip(document.id().clone());
                }
                Err(e) => {
                    warn!("Could not start document {}: {}", document.id(), e);
                    batch.record(ProcessingOutcome::failed(document.id().clone(), e.to_string(), 0));
                }
            }

            let has_next = position + 1 < documents.len();
            if has_next && !self.inner.config.document_pause.is_zero() {
                tokio::time::sleep(self.inner.config.document_pause).await;
            }
        }

        info!(
            "Batch for agent {} finished: {} successful, {} failed, {} skipped",
            agent_id,
            batch.successful,
            batch.failed,
            batch.skipped.len()
        );
        Ok(batch)
    }

    /// Run [`process_agent_documents`](Self::process_agent_documents) in the background
    pub fn spawn_agent_batch(&self, agent_id: AgentId) {
        let service = self.clone();
        self.inner.tracker.spawn(async move {
            if let Err(e) = service.process_agent_documents(&agent_id).await {
                error!("Batch processing for agent {} failed: {}", agent_id, e);
            }
        });
    }

    /// Delete a document, its vectors and its raw bytes.
    ///
    /// An in-flight run is cancelled and awaited first, so a vector write it
    /// already sent cannot land after the cleanup. Vector and blob cleanup
    /// failures are logged and do not stop the delete.
    pub async fn delete_document(
        &self,
        agent_id: &AgentId,
        document_id: &DocumentId,
    ) -> ProcessingResult<()> {
        let document = self.load_owned(agent_id, document_id).await?;
        let key = JobKey::new(agent_id.clone(), document_id.clone());

        while let Some(run) = self.signal_cancel(&key).await {
            info!("Waiting for in-flight processing of {} to stop", document_id);
            run.finished.cancelled().await;
            self.release_run(&key, run.id).await;
        }
        self.inner.jobs.remove(&key).await;

        if let Err(e) = self.inner.vector_store.delete_by_document(document_id).await {
            warn!("Failed to delete vectors for document {}: {:#}", document_id, e);
        }
        if let Err(e) = self.inner.blob_store.delete(document.storage_key()).await {
            warn!("Failed to delete stored bytes for document {}: {:#}", document_id, e);
        }

        self.inner.repository.lock().await.delete(document_id)?;
        info!("Deleted document {} for agent {}", document_id, agent_id);
        Ok(())
    }

    /// Signal a running job to stop. Returns false when no job is running.
    pub async fn cancel(&self, agent_id: &AgentId, document_id: &DocumentId) -> bool {
        let key = JobKey::new(agent_id.clone(), document_id.clone());
        self.signal_cancel(&key).await.is_some()
    }

    async fn signal_cancel(&self, key: &JobKey) -> Option<RunHandle> {
        let run = self.inner.runs.lock().await.get(key).cloned()?;
        run.cancel.cancel();
        Some(run)
    }

    /// Cancel every running job and wait for background tasks to finish
    pub async fn shutdown(&self) {
        info!("Shutting down document processing service");
        self.inner.shutdown.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        info!("All processing tasks stopped");
    }

    pub async fn query(&self, text: &str, options: &QueryOptions) -> QueryResponse {
        QueryDocuments::new(
            Arc::clone(&self.inner.embeddings),
            Arc::clone(&self.inner.vector_store),
        )
        .execute(text, options)
        .await
    }

    pub async fn verify_document_vectors(
        &self,
        agent_id: &AgentId,
        document_id: &DocumentId,
    ) -> ProcessingResult<VerificationReport> {
        VerifyDocumentVectors::new(
            Arc::clone(&self.inner.repository),
            Arc::clone(&self.inner.vector_store),
        )
        .execute(agent_id, document_id)
        .await
    }

    pub async fn processing_status(
        &self,
        agent_id: &AgentId,
        document_id: &DocumentId,
    ) -> ProcessingResult<ProcessingJob> {
        let key = JobKey::new(agent_id.clone(), document_id.clone());
        self.inner
            .jobs
            .get(&key)
            .await
            .ok_or_else(|| ProcessingError::JobNotFound(key.to_string()))
    }

    pub async fn agent_processing_statuses(&self, agent_id: &AgentId) -> Vec<ProcessingJob> {
        self.inner.jobs.list_by_agent(agent_id).await
    }

    pub async fn agent_stats(&self, agent_id: &AgentId) -> ProcessingResult<AgentRagStats> {
        let documents = self.inner.repository.lock().await.find_by_agent(agent_id)?;

        let total_documents = documents.len();
        let processed: Vec<&Document> = documents.iter().filter(|d| d.is_rag_processed()).collect();
        let processing_rate = if total_documents == 0 {
            0
        } else {
            ((processed.len() as f64 / total_documents as f64) * 100.0).round() as u32
        };

        Ok(AgentRagStats {
            total_documents,
            processed_documents: processed.len(),
            total_vectors: processed.iter().map(|d| d.vector_count()).sum(),
            total_text_length: processed.iter().map(|d| d.text_length()).sum(),
            processing_rate,
        })
    }

    pub async fn health_check(&self) -> HealthReport {
        let vector_store = self.inner.vector_store.health_check().await;
        let embeddings = self.inner.embeddings.health_check().await;
        let jobs = self.inner.jobs.active().await;
        HealthReport::new(vector_store, embeddings, jobs)
    }

    /// Claim the lease and mirror the processing state into the durable record.
    /// Nothing durable is touched when the lease is already held.
    async fn begin(
        &self,
        agent_id: &AgentId,
        document_id: &DocumentId,
        entry: Entry,
    ) -> ProcessingResult<(JobKey, Document, RunHandle)> {
        if self.inner.shutdown.is_cancelled() {
            return Err(ProcessingError::Cancelled(document_id.to_string()));
        }

        let mut document = self.load_owned(agent_id, document_id).await?;
        let key = JobKey::new(agent_id.clone(), document_id.clone());

        if !self.inner.jobs.try_begin(&key, document.name()).await {
            return Err(ProcessingError::AlreadyProcessing(document_id.to_string()));
        }

        let entered = match entry {
            Entry::Start => document.start_processing(),
            Entry::Reprocess => {
                document.reprocess();
                Ok(())
            }
        };
        let persisted = match entered {
            Ok(()) => self.save(document.clone()).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = persisted {
            self.inner.jobs.remove(&key).await;
            return Err(e);
        }

        let run = RunHandle {
            id: self.inner.next_run.fetch_add(1, Ordering::Relaxed),
            cancel: self.inner.shutdown.child_token(),
            finished: CancellationToken::new(),
        };
        self.inner.runs.lock().await.insert(key.clone(), run.clone());

        info!(
            "Started processing document {} ({}) for agent {}",
            document_id,
            document.name(),
            agent_id
        );
        Ok((key, document, run))
    }

    /// Run all stages and settle the outcome on the document and job
    async fn execute(&self, key: JobKey, mut document: Document, run: RunHandle) -> ProcessingOutcome {
        let _finished = run.finished.clone().drop_guard();
        let started = Instant::now();

        let result = self.run_stages(&key, &mut document, &run.cancel).await;
        let outcome = match result {
            Ok(metadata) => self.settle_success(&key, document, metadata, started).await,
            Err(e) => self.settle_failure(&key, document, e, started).await,
        };

        self.release_run(&key, run.id).await;
        outcome
    }

    /// Forget the run's handles unless a newer run already replaced them
    async fn release_run(&self, key: &JobKey, run_id: u64) {
        let mut runs = self.inner.runs.lock().await;
        if runs.get(key).is_some_and(|run| run.id == run_id) {
            runs.remove(key);
        }
    }

    async fn settle_success(
        &self,
        key: &JobKey,
        mut document: Document,
        metadata: RagMetadata,
        started: Instant,
    ) -> ProcessingOutcome {
        let vector_count = metadata.vector_count;
        let stats = metadata.stats.clone();

        let persisted = match document.complete(metadata) {
            Ok(()) => self.save_existing(document).await,
            Err(e) => Err(e.into()),
        };
        let elapsed = elapsed_ms(started);

        match persisted {
            Ok(()) => {
                self.inner.jobs.complete(key).await;
                info!(
                    "Document {} processed: {} vectors in {} ms",
                    key.document_id, vector_count, elapsed
                );
                ProcessingOutcome::succeeded(key.document_id.clone(), vector_count, stats, elapsed)
            }
            Err(e) => {
                error!(
                    "Vectors for document {} were written but its metadata could not be saved: {}",
                    key.document_id, e
                );
                self.inner.jobs.fail(key, &e.to_string()).await;
                ProcessingOutcome::failed(key.document_id.clone(), e.to_string(), elapsed)
            }
        }
    }

    async fn settle_failure(
        &self,
        key: &JobKey,
        mut document: Document,
        failure: ProcessingError,
        started: Instant,
    ) -> ProcessingOutcome {
        let message = failure.to_string();
        error!("Processing of document {} failed: {}", key.document_id, message);

        let persisted = match document.fail(message.clone()) {
            Ok(()) => self.save_existing(document).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = persisted {
            error!(
                "Could not persist failed state of document {}: {}",
                key.document_id, e
            );
        }

        self.inner.jobs.fail(key, &message).await;
        ProcessingOutcome::failed(key.document_id.clone(), message, elapsed_ms(started))
    }

    async fn run_stages(
        &self,
        key: &JobKey,
        document: &mut Document,
        cancel: &CancellationToken,
    ) -> ProcessingResult<RagMetadata> {
        // Extract
        self.checkpoint(key, document, Milestone::Extracting, cancel).await?;
        let storage_key = document.storage_key().to_string();
        let bytes = interruptible(cancel, key, async {
            self.inner
                .blob_store
                .fetch(&storage_key)
                .await
                .map_err(|e| ProcessingError::BlobStore(format!("{:#}", e)))
        })
        .await?;

        let extractor = self.inner.extractor;
        let content_type = document.content_type().to_string();
        let file_name = document.name().to_string();
        let extracted = interruptible(cancel, key, async {
            let name = file_name.clone();
            let joined =
                tokio::task::spawn_blocking(move || extractor.extract(&bytes, &content_type, &name))
                    .await;
            match joined {
                Ok(result) => result.map_err(ProcessingError::from),
                Err(e) => Err(ProcessingError::from(ExtractionError::ExtractionFailed {
                    file_name: file_name.clone(),
                    reason: format!("extraction task failed: {}", e),
                })),
            }
        })
        .await?;

        // Chunk
        let chunk_metadata = chunk_metadata(document, extracted.char_count());
        let chunks = self
            .inner
            .chunker
            .chunk_text(&extracted.text, document.id(), &chunk_metadata);
        if chunks.is_empty() {
            return Err(ExtractionError::EmptyContent(document.name().to_string()).into());
        }
        let chunk_count = chunks.len();
        let total_chunk_chars: usize = chunks.iter().map(|c| c.size()).sum();
        debug!("Document {} split into {} chunks", document.id(), chunk_count);

        // Embed
        self.checkpoint(key, document, Milestone::Embedding, cancel).await?;
        let run = interruptible(cancel, key, async {
            self.inner
                .embeddings
                .embed_chunks(chunks)
                .await
                .map_err(ProcessingError::from)
        })
        .await?;

        // Store: the write runs to completion, a cancel is honoured once it returns
        self.checkpoint(key, document, Milestone::Storing, cancel).await?;
        self.inner
            .vector_store
            .delete_by_document(document.id())
            .await
            .map_err(|e| ProcessingError::VectorStoreWriteFailed(format!("{:#}", e)))?;
        let vector_count = self
            .inner
            .vector_store
            .upsert(document.id(), document.agent_id(), &run.embedded)
            .await
            .map_err(|e| ProcessingError::VectorStoreWriteFailed(format!("{:#}", e)))?;

        if cancel.is_cancelled() {
            if let Err(e) = self.inner.vector_store.delete_by_document(document.id()).await {
                warn!(
                    "Failed to discard vectors of cancelled document {}: {:#}",
                    document.id(),
                    e
                );
            }
            return Err(ProcessingError::Cancelled(key.document_id.to_string()));
        }

        // Finalize
        self.checkpoint(key, document, Milestone::Finalizing, cancel).await?;

        let text_length = extracted.char_count();
        Ok(RagMetadata {
            vector_count,
            text_length,
            chunk_count,
            embedding_model: self.inner.embeddings.model().to_string(),
            stats: ProcessingStats {
                original_length: text_length,
                chunks_created: chunk_count,
                avg_chunk_size: (total_chunk_chars as f64 / chunk_count as f64).round() as usize,
                skipped_pages: extracted.skipped_pages,
                total_tokens: run.total_tokens,
            },
            processed_at: Utc::now(),
        })
    }

    /// Advance the job and mirror the milestone into the durable record
    async fn checkpoint(
        &self,
        key: &JobKey,
        document: &mut Document,
        milestone: Milestone,
        cancel: &CancellationToken,
    ) -> ProcessingResult<()> {
        if cancel.is_cancelled() {
            return Err(ProcessingError::Cancelled(key.document_id.to_string()));
        }
        debug!("Document {}: {}", key.document_id, milestone.message());
        self.inner.jobs.advance(key, milestone).await;
        document.record_milestone(milestone)?;
        self.save(document.clone()).await
    }

    async fn load_owned(&self, agent_id: &AgentId, document_id: &DocumentId) -> ProcessingResult<Document> {
        let document = self.inner.repository.lock().await.find_by_id(document_id)?;
        match document {
            Some(document) if document.agent_id() == agent_id => Ok(document),
            _ => Err(ProcessingError::DocumentNotFound(document_id.to_string())),
        }
    }

    async fn save(&self, document: Document) -> ProcessingResult<()> {
        self.inner.repository.lock().await.save(document)?;
        Ok(())
    }

    /// Save unless the document was deleted while its job was running
    async fn save_existing(&self, document: Document) -> ProcessingResult<()> {
        let mut repository = self.inner.repository.lock().await;
        if repository.find_by_id(document.id())?.is_none() {
            debug!("Document {} was deleted during processing", document.id());
            return Ok(());
        }
        repository.save(document)?;
        Ok(())
    }
}

fn chunk_metadata(document: &Document, text_length: usize) -> ChunkMetadata {
    let mut metadata = ChunkMetadata::new();
    metadata.insert("documentId".to_string(), Value::from(document.id().as_str()));
    metadata.insert("documentName".to_string(), Value::from(document.name()));
    metadata.insert("documentSize".to_string(), Value::from(document.size_bytes()));
    metadata.insert("mimeType".to_string(), Value::from(document.content_type()));
    metadata.insert("storageKey".to_string(), Value::from(document.storage_key()));
    metadata.insert(
        "uploadedAt".to_string(),
        Value::from(document.snapshot().uploaded_at.to_rfc3339()),
    );
    metadata.insert("extractedAt".to_string(), Value::from(Utc::now().to_rfc3339()));
    metadata.insert("originalTextLength".to_string(), Value::from(text_length as u64));
    metadata
}

/// Race a stage against the run's cancel token
async fn interruptible<T, F>(cancel: &CancellationToken, key: &JobKey, stage: F) -> ProcessingResult<T>
where
    F: Future<Output = ProcessingResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProcessingError::Cancelled(key.document_id.to_string())),
        result = stage => result,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
