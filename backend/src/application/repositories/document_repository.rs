use crate::domain::{
    aggregates::Document,
    value_objects::{AgentId, DocumentId},
    DomainResult,
};

/// Repository trait for the durable side of Document aggregates.
///
/// Each call is a single-document read or write; no transaction spans
/// several documents.
pub trait DocumentRepository {
    /// Saves a document, replacing any stored state with the same id.
    fn save(&mut self, document: Document) -> DomainResult<()>;

    /// Returns `Ok(None)` when the document does not exist.
    fn find_by_id(&self, id: &DocumentId) -> DomainResult<Option<Document>>;

    /// All documents owned by an agent, oldest upload first.
    fn find_by_agent(&self, agent_id: &AgentId) -> DomainResult<Vec<Document>>;

    /// Returns `Ok(true)` if the document was deleted, `Ok(false)` if it was not found.
    fn delete(&mut self, id: &DocumentId) -> DomainResult<bool>;
}
