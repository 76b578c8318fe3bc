use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::dto::{QueryOptions, QueryResponse, QueryResult, ResultMetadata};
use crate::application::ports::{ScoredRecord, SearchFilter, VectorStore};
use crate::application::services::{EmbeddingGenerator, ProcessingError, ProcessingResult};

/// Use case for retrieving the document chunks most relevant to a query
///
/// Retrieval is best-effort: any failure is reported as an unsuccessful,
/// empty response instead of an error.
pub struct QueryDocuments {
    embeddings: Arc<EmbeddingGenerator>,
    vector_store: Arc<dyn VectorStore>,
}

impl QueryDocuments {
    pub fn new(embeddings: Arc<EmbeddingGenerator>, vector_store: Arc<dyn VectorStore>) -> Self {
        Self {
            embeddings,
            vector_store,
        }
    }

    pub async fn execute(&self, text: &str, options: &QueryOptions) -> QueryResponse {
        match self.search(text, options).await {
            Ok(results) => {
                info!("Query returned {} relevant chunks", results.len());
                QueryResponse::found(results)
            }
            Err(e) => {
                warn!("Query failed: {}", e);
                QueryResponse::failed(e.to_string())
            }
        }
    }

    async fn search(&self, text: &str, options: &QueryOptions) -> ProcessingResult<Vec<QueryResult>> {
        if options.limit == 0 {
            return Ok(Vec::new());
        }

        let query = self.embeddings.embed_query(text).await?;
        let filter = SearchFilter {
            agent_id: options.agent_id.clone(),
            document_ids: options.document_ids.clone(),
        };

        let records = self
            .vector_store
            .search(&query, options.limit, &filter)
            .await
            .map_err(|e| ProcessingError::VectorStoreReadFailed(format!("{:#}", e)))?;
        let candidates = records.len();

        let mut results: Vec<QueryResult> = records
            .into_iter()
            .filter(|record| record.score >= options.threshold)
            .map(to_query_result)
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!(
            "{} of {} candidates passed threshold {}",
            results.len(),
            candidates,
            options.threshold
        );
        Ok(results)
    }
}

fn to_query_result(record: ScoredRecord) -> QueryResult {
    let document_name = record
        .payload
        .metadata
        .get("documentName")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    QueryResult {
        score: record.score,
        content: record.payload.text,
        metadata: ResultMetadata {
            document_id: record.payload.document_id,
            agent_id: record.payload.agent_id,
            chunk_index: record.payload.chunk_index,
            point_id: record.id,
            document_name,
        },
    }
}
