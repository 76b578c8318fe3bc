use crate::domain::aggregates::ProcessingStats;
use crate::domain::value_objects::DocumentId;
use serde::Serialize;

/// Structured result of one document pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOutcome {
    pub success: bool,
    pub document_id: DocumentId,
    pub vector_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ProcessingStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub processing_time_ms: u64,
}

impl ProcessingOutcome {
    pub fn succeeded(
        document_id: DocumentId,
        vector_count: usize,
        stats: ProcessingStats,
        processing_time_ms: u64,
    ) -> Self {
        ProcessingOutcome {
            success: true,
            document_id,
            vector_count,
            stats: Some(stats),
            error: None,
            processing_time_ms,
        }
    }

    pub fn failed(document_id: DocumentId, error: impl Into<String>, processing_time_ms: u64) -> Self {
        ProcessingOutcome {
            success: false,
            document_id,
            vector_count: 0,
            stats: None,
            error: Some(error.into()),
            processing_time_ms,
        }
    }
}

/// Result of processing every unprocessed document of an agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub processed_count: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<ProcessingOutcome>,
    /// Left alone because another run held them; not counted as processed
    pub skipped: Vec<DocumentId>,
}

impl BatchOutcome {
    pub fn record(&mut self, outcome: ProcessingOutcome) {
        self.processed_count += 1;
        if outcome.success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(outcome);
    }

    pub fn skip(&mut self, document_id: DocumentId) {
        self.skipped.push(document_id);
    }
}

/// Aggregate RAG statistics for one agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRagStats {
    pub total_documents: usize,
    pub processed_documents: usize,
    pub total_vectors: usize,
    pub total_text_length: usize,
    /// Percentage of documents processed, rounded to the nearest integer
    pub processing_rate: u32,
}

/// Persisted vector count compared with what the vector store actually holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub document_id: DocumentId,
    pub expected_vectors: usize,
    pub actual_vectors: u64,
    pub consistent: bool,
}

impl VerificationReport {
    pub fn new(document_id: DocumentId, expected_vectors: usize, actual_vectors: u64) -> Self {
        VerificationReport {
            document_id,
            expected_vectors,
            actual_vectors,
            consistent: expected_vectors as u64 == actual_vectors,
        }
    }
}
