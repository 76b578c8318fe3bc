/// Domain aggregates
use super::base::{DomainError, DomainResult, Entity};
use super::value_objects::{AgentId, DocumentId, Milestone, ProcessingStatus, Progress};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics captured while processing a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStats {
    pub original_length: usize,
    pub chunks_created: usize,
    pub avg_chunk_size: usize,
    /// Pages of a paginated document whose text could not be read
    pub skipped_pages: usize,
    pub total_tokens: u64,
}

/// Result of a successful pipeline run, persisted onto the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RagMetadata {
    pub vector_count: usize,
    pub text_length: usize,
    pub chunk_count: usize,
    pub embedding_model: String,
    pub stats: ProcessingStats,
    pub processed_at: DateTime<Utc>,
}

/// Plain view of every persisted document field
///
/// Used by repositories to load and store documents without bypassing the
/// lifecycle rules enforced by [`Document`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    pub id: DocumentId,
    pub agent_id: AgentId,
    pub name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub storage_key: String,
    pub status: ProcessingStatus,
    pub progress: Progress,
    pub error: Option<String>,
    pub rag_processed: bool,
    pub vector_count: usize,
    pub chunk_count: usize,
    pub text_length: usize,
    pub embedding_model: Option<String>,
    pub stats: Option<ProcessingStats>,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// A Document is the aggregate root for an uploaded product document.
/// It owns the durable side of the processing state machine:
/// `pending -> processing -> {completed, failed}`, with `reprocess` as the
/// only way back into `processing` from a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    state: DocumentSnapshot,
}

impl Document {
    /// Create a freshly uploaded, pending document
    pub fn new(
        id: DocumentId,
        agent_id: AgentId,
        name: impl Into<String>,
        content_type: impl Into<String>,
        size_bytes: u64,
        storage_key: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Document {
            state: DocumentSnapshot {
                id,
                agent_id,
                name: name.into(),
                content_type: content_type.into(),
                size_bytes,
                storage_key: storage_key.into(),
                status: ProcessingStatus::Pending,
                progress: Progress::zero(),
                error: None,
                rag_processed: false,
                vector_count: 0,
                chunk_count: 0,
                text_length: 0,
                embedding_model: None,
                stats: None,
                uploaded_at: now,
                processed_at: None,
                updated_at: now,
            },
        }
    }

    /// Rebuild a document from persisted state
    pub fn from_snapshot(snapshot: DocumentSnapshot) -> Self {
        Document { state: snapshot }
    }

    pub fn snapshot(&self) -> &DocumentSnapshot {
        &self.state
    }

    pub fn into_snapshot(self) -> DocumentSnapshot {
        self.state
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.state.agent_id
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn content_type(&self) -> &str {
        &self.state.content_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.state.size_bytes
    }

    pub fn storage_key(&self) -> &str {
        &self.state.storage_key
    }

    pub fn status(&self) -> ProcessingStatus {
        self.state.status
    }

    pub fn progress(&self) -> Progress {
        self.state.progress
    }

    pub fn error(&self) -> Option<&str> {
        self.state.error.as_deref()
    }

    pub fn is_rag_processed(&self) -> bool {
        self.state.rag_processed
    }

    pub fn vector_count(&self) -> usize {
        self.state.vector_count
    }

    pub fn chunk_count(&self) -> usize {
        self.state.chunk_count
    }

    pub fn text_length(&self) -> usize {
        self.state.text_length
    }

    pub fn embedding_model(&self) -> Option<&str> {
        self.state.embedding_model.as_deref()
    }

    pub fn stats(&self) -> Option<&ProcessingStats> {
        self.state.stats.as_ref()
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.state.processed_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.state.updated_at
    }

    /// First run of a pending document
    pub fn start_processing(&mut self) -> DomainResult<()> {
        if self.state.status != ProcessingStatus::Pending {
            return Err(DomainError::BusinessRuleViolation(format!(
                "Document {} is {} and cannot start processing without a reprocess request",
                self.state.id, self.state.status
            )));
        }
        self.enter_processing();
        Ok(())
    }

    /// Explicit re-entry into processing from any state, including a stalled run
    pub fn reprocess(&mut self) {
        self.enter_processing();
    }

    fn enter_processing(&mut self) {
        self.state.status = ProcessingStatus::Processing;
        self.state.progress = Milestone::Started.progress();
        self.state.error = None;
        self.touch();
    }

    /// Mirror a pipeline checkpoint into the document
    pub fn record_milestone(&mut self, milestone: Milestone) -> DomainResult<()> {
        self.ensure_processing("record progress")?;
        self.state.progress = milestone.progress();
        self.touch();
        Ok(())
    }

    pub fn complete(&mut self, metadata: RagMetadata) -> DomainResult<()> {
        self.ensure_processing("complete")?;
        self.state.status = ProcessingStatus::Completed;
        self.state.progress = Progress::complete();
        self.state.error = None;
        self.state.rag_processed = true;
        self.state.vector_count = metadata.vector_count;
        self.state.text_length = metadata.text_length;
        self.state.chunk_count = metadata.chunk_count;
        self.state.embedding_model = Some(metadata.embedding_model);
        self.state.stats = Some(metadata.stats);
        self.state.processed_at = Some(metadata.processed_at);
        self.touch();
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> DomainResult<()> {
        self.ensure_processing("fail")?;
        self.state.status = ProcessingStatus::Failed;
        self.state.progress = Progress::zero();
        self.state.error = Some(error.into());
        self.touch();
        Ok(())
    }

    fn ensure_processing(&self, action: &str) -> DomainResult<()> {
        if self.state.status != ProcessingStatus::Processing {
            return Err(DomainError::InvalidOperation(format!(
                "Cannot {} document {} while it is {}",
                action, self.state.id, self.state.status
            )));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.state.updated_at = Utc::now();
    }
}

impl Entity for Document {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.state.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_document() -> Document {
        Document::new(
            DocumentId::new("doc-1").unwrap(),
            AgentId::new("agent-1").unwrap(),
            "pricing.pdf",
            "application/pdf",
            2048,
            "agents/agent-1/pricing.pdf",
        )
    }

    fn metadata(vectors: usize) -> RagMetadata {
        RagMetadata {
            vector_count: vectors,
            text_length: 4200,
            chunk_count: vectors,
            embedding_model: "text-embedding-3-small".to_string(),
            stats: ProcessingStats {
                original_length: 4200,
                chunks_created: vectors,
                avg_chunk_size: 900,
                skipped_pages: 1,
                total_tokens: 1050,
            },
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_document_is_pending() {
        let doc = pending_document();
        assert_eq!(doc.status(), ProcessingStatus::Pending);
        assert_eq!(doc.progress().value(), 0);
        assert!(!doc.is_rag_processed());
        assert_eq!(doc.id().as_str(), "doc-1");
    }

    #[test]
    fn test_successful_lifecycle() {
        let mut doc = pending_document();
        doc.start_processing().unwrap();
        assert_eq!(doc.status(), ProcessingStatus::Processing);

        doc.record_milestone(Milestone::Embedding).unwrap();
        assert_eq!(doc.progress().value(), 50);

        doc.complete(metadata(5)).unwrap();
        assert_eq!(doc.status(), ProcessingStatus::Completed);
        assert_eq!(doc.progress().value(), 100);
        assert!(doc.is_rag_processed());
        assert_eq!(doc.vector_count(), 5);
        assert_eq!(doc.chunk_count(), 5);
        assert_eq!(doc.stats().unwrap().skipped_pages, 1);
        assert_eq!(doc.embedding_model(), Some("text-embedding-3-small"));
    }

    #[test]
    fn test_failed_lifecycle() {
        let mut doc = pending_document();
        doc.start_processing().unwrap();
        doc.record_milestone(Milestone::Storing).unwrap();
        doc.fail("vector store unavailable").unwrap();

        assert_eq!(doc.status(), ProcessingStatus::Failed);
        assert_eq!(doc.progress().value(), 0);
        assert_eq!(doc.error(), Some("vector store unavailable"));
    }

    #[test]
    fn test_terminal_document_requires_reprocess() {
        let mut doc = pending_document();
        doc.start_processing().unwrap();
        doc.complete(metadata(3)).unwrap();

        assert!(doc.start_processing().is_err());
        assert!(doc.record_milestone(Milestone::Extracting).is_err());
        assert!(doc.fail("late failure").is_err());

        doc.reprocess();
        assert_eq!(doc.status(), ProcessingStatus::Processing);
        doc.complete(metadata(4)).unwrap();
        assert_eq!(doc.vector_count(), 4);
    }

    #[test]
    fn test_reprocess_clears_previous_error() {
        let mut doc = pending_document();
        doc.start_processing().unwrap();
        doc.fail("boom").unwrap();

        doc.reprocess();
        assert_eq!(doc.error(), None);
        assert_eq!(doc.progress().value(), 0);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut doc = pending_document();
        doc.start_processing().unwrap();
        let restored = Document::from_snapshot(doc.snapshot().clone());
        assert_eq!(restored, doc);
    }
}
