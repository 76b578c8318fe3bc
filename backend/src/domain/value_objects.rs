/// Value objects for the domain layer
use super::base::{DomainError, DomainResult, ValueObject};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for an uploaded product Document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidValue("DocumentId cannot be empty".to_string()));
        }
        Ok(DocumentId(id))
    }

    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        DocumentId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for DocumentId {}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the agent (tenant) that owns a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidValue("AgentId cannot be empty".to_string()));
        }
        Ok(AgentId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for AgentId {}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key of an in-flight processing job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobKey {
    pub agent_id: AgentId,
    pub document_id: DocumentId,
}

impl JobKey {
    pub fn new(agent_id: AgentId, document_id: DocumentId) -> Self {
        JobKey {
            agent_id,
            document_id,
        }
    }
}

impl ValueObject for JobKey {}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.agent_id, self.document_id)
    }
}

/// Content types the text extractor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    PlainText,
    Pdf,
    /// Office Open XML word-processing document (.docx)
    Docx,
    /// Legacy Word declaration (.doc)
    MsWord,
}

impl ContentType {
    pub const PLAIN_TEXT: &'static str = "text/plain";
    pub const PDF: &'static str = "application/pdf";
    pub const DOCX: &'static str =
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
    pub const MSWORD: &'static str = "application/msword";

    /// Resolve a declared MIME type, ignoring parameters such as `charset`
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        match essence.as_str() {
            Self::PLAIN_TEXT => Some(ContentType::PlainText),
            Self::PDF => Some(ContentType::Pdf),
            Self::DOCX => Some(ContentType::Docx),
            Self::MSWORD => Some(ContentType::MsWord),
            _ => None,
        }
    }

    pub fn as_mime(&self) -> &'static str {
        match self {
            ContentType::PlainText => Self::PLAIN_TEXT,
            ContentType::Pdf => Self::PDF,
            ContentType::Docx => Self::DOCX,
            ContentType::MsWord => Self::MSWORD,
        }
    }

    /// Best-effort guess from a file extension, used by the CLI
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "txt" | "text" | "md" => Some(ContentType::PlainText),
            "pdf" => Some(ContentType::Pdf),
            "docx" => Some(ContentType::Docx),
            "doc" => Some(ContentType::MsWord),
            _ => None,
        }
    }
}

impl ValueObject for ContentType {}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_mime())
    }
}

/// Lifecycle status of a document's RAG processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }
}

impl FromStr for ProcessingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            other => Err(DomainError::InvalidValue(format!(
                "Unknown processing status: {}",
                other
            ))),
        }
    }
}

impl ValueObject for ProcessingStatus {}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Processing progress as a percentage in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Progress(u8);

impl Progress {
    pub fn new(value: u8) -> DomainResult<Self> {
        if value > 100 {
            return Err(DomainError::InvalidValue(format!(
                "Progress must be within 0..=100, got {}",
                value
            )));
        }
        Ok(Progress(value))
    }

    pub fn zero() -> Self {
        Progress(0)
    }

    pub fn complete() -> Self {
        Progress(100)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl ValueObject for Progress {}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Fixed checkpoints of the processing pipeline
///
/// Only these are mirrored into the durable document record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    Started,
    Extracting,
    Embedding,
    Storing,
    Finalizing,
    Done,
}

impl Milestone {
    pub fn progress(&self) -> Progress {
        match self {
            Milestone::Started => Progress(0),
            Milestone::Extracting => Progress(20),
            Milestone::Embedding => Progress(50),
            Milestone::Storing => Progress(80),
            Milestone::Finalizing => Progress(95),
            Milestone::Done => Progress(100),
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Milestone::Started => "Queued for processing",
            Milestone::Extracting => "Extracting text from document...",
            Milestone::Embedding => "Generating embeddings...",
            Milestone::Storing => "Storing vectors in database...",
            Milestone::Finalizing => "Finalizing...",
            Milestone::Done => "Completed successfully",
        }
    }
}

/// Embedding models known to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EmbeddingModel {
    /// OpenAI hosted model
    #[default]
    TextEmbedding3Small,
    /// Local model served through fastembed
    AllMiniLML6V2,
}

impl EmbeddingModel {
    pub fn dimension_count(&self) -> usize {
        match self {
            EmbeddingModel::TextEmbedding3Small => 1536,
            EmbeddingModel::AllMiniLML6V2 => 384,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingModel::TextEmbedding3Small => "text-embedding-3-small",
            EmbeddingModel::AllMiniLML6V2 => "all-MiniLM-L6-v2",
        }
    }
}

impl FromStr for EmbeddingModel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text-embedding-3-small" => Ok(EmbeddingModel::TextEmbedding3Small),
            "all-MiniLM-L6-v2" | "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
            other => Err(DomainError::InvalidValue(format!(
                "Unknown embedding model: {}",
                other
            ))),
        }
    }
}

impl ValueObject for EmbeddingModel {}

impl fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fixed-length embedding vector
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector {
    values: Vec<f32>,
}

impl EmbeddingVector {
    pub fn new(values: Vec<f32>) -> DomainResult<Self> {
        if values.is_empty() {
            return Err(DomainError::InvalidValue(
                "Embedding vector cannot be empty".to_string(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(DomainError::InvalidValue(
                "Embedding vector contains non-finite values".to_string(),
            ));
        }
        Ok(EmbeddingVector { values })
    }

    pub fn dimensions(&self) -> &[f32] {
        &self.values
    }

    pub fn dimension_count(&self) -> usize {
        self.values.len()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.values
    }

    /// Cosine similarity in [-1, 1]; zero-magnitude vectors score 0
    pub fn cosine_similarity(&self, other: &EmbeddingVector) -> DomainResult<f32> {
        if self.dimension_count() != other.dimension_count() {
            return Err(DomainError::InvalidOperation(format!(
                "Dimension mismatch: {} vs {}",
                self.dimension_count(),
                other.dimension_count()
            )));
        }

        let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        if norm_a == 0.0 || norm_b == 0.0 {
            return Ok(0.0);
        }
        Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
    }
}

impl ValueObject for EmbeddingVector {}
