use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::application::dto::VerificationReport;
use crate::application::ports::VectorStore;
use crate::application::repositories::DocumentRepository;
use crate::application::services::{ProcessingError, ProcessingResult};
use crate::domain::value_objects::{AgentId, DocumentId};

/// Use case for reconciling a document's persisted vector count with the
/// records actually held by the vector store
///
/// A crash between writing vectors and saving document metadata leaves the two
/// out of step; this check makes that visible.
pub struct VerifyDocumentVectors<R> {
    repository: Arc<Mutex<R>>,
    vector_store: Arc<dyn VectorStore>,
}

impl<R: DocumentRepository> VerifyDocumentVectors<R> {
    pub fn new(repository: Arc<Mutex<R>>, vector_store: Arc<dyn VectorStore>) -> Self {
        Self {
            repository,
            vector_store,
        }
    }

    pub async fn execute(
        &self,
        agent_id: &AgentId,
        document_id: &DocumentId,
    ) -> ProcessingResult<VerificationReport> {
        let expected = {
            let repository = self.repository.lock().await;
            match repository.find_by_id(document_id)? {
                Some(document) if document.agent_id() == agent_id => document.vector_count(),
                _ => return Err(ProcessingError::DocumentNotFound(document_id.to_string())),
            }
        };

        let actual = self
            .vector_store
            .count_by_document(document_id)
            .await
            .map_err(|e| ProcessingError::VectorStoreReadFailed(format!("{:#}", e)))?;

        let report = VerificationReport::new(document_id.clone(), expected, actual);
        if report.consistent {
            info!("Document {} has {} vectors as recorded", document_id, actual);
        } else {
            warn!(
                "Document {} records {} vectors but the store holds {}",
                document_id, expected, actual
            );
        }
        Ok(report)
    }
}
