use crate::domain::value_objects::{AgentId, DocumentId};
use serde::Serialize;

pub const DEFAULT_QUERY_LIMIT: usize = 5;
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.3;

/// Retrieval query parameters
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    /// Restrict results to one agent's documents
    pub agent_id: Option<AgentId>,
    /// Restrict results to specific documents
    pub document_ids: Option<Vec<DocumentId>>,
    /// Maximum number of results requested from the vector store
    pub limit: usize,
    /// Minimum similarity score for a result to be returned
    pub threshold: f32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            agent_id: None,
            document_ids: None,
            limit: DEFAULT_QUERY_LIMIT,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl QueryOptions {
    pub fn for_agent(agent_id: AgentId) -> Self {
        QueryOptions {
            agent_id: Some(agent_id),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_document_ids(mut self, document_ids: Vec<DocumentId>) -> Self {
        self.document_ids = Some(document_ids);
        self
    }
}

/// Metadata returned with each retrieved chunk
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub document_id: String,
    pub agent_id: String,
    pub chunk_index: usize,
    pub point_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub score: f32,
    pub content: String,
    pub metadata: ResultMetadata,
}

/// Best-effort retrieval response; failures are reported, never raised
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub success: bool,
    pub results: Vec<QueryResult>,
    pub result_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResponse {
    pub fn found(results: Vec<QueryResult>) -> Self {
        QueryResponse {
            success: true,
            result_count: results.len(),
            results,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        QueryResponse {
            success: false,
            results: Vec::new(),
            result_count: 0,
            error: Some(error.into()),
        }
    }
}
