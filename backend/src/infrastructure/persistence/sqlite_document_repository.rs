use crate::application::repositories::DocumentRepository;
use crate::domain::aggregates::{Document, DocumentSnapshot, ProcessingStats};
use crate::domain::base::DomainError;
use crate::domain::value_objects::{AgentId, DocumentId, ProcessingStatus, Progress};
use crate::domain::DomainResult;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Result as SqliteResult, Row};

const SELECT_COLUMNS: &str = "SELECT id, agent_id, name, content_type, size_bytes, storage_key,
        status, progress, error, rag_processed, vector_count, chunk_count, text_length,
        embedding_model, stats, uploaded_at, processed_at, updated_at
     FROM documents";

/// Raw column values of one `documents` row
struct DocumentRow {
    id: String,
    agent_id: String,
    name: String,
    content_type: String,
    size_bytes: i64,
    storage_key: String,
    status: String,
    progress: i64,
    error: Option<String>,
    rag_processed: bool,
    vector_count: i64,
    chunk_count: i64,
    text_length: i64,
    embedding_model: Option<String>,
    stats: Option<String>,
    uploaded_at: String,
    processed_at: Option<String>,
    updated_at: String,
}

impl DocumentRow {
    fn from_row(row: &Row<'_>) -> SqliteResult<Self> {
        Ok(DocumentRow {
            id: row.get(0)?,
            agent_id: row.get(1)?,
            name: row.get(2)?,
            content_type: row.get(3)?,
            size_bytes: row.get(4)?,
            storage_key: row.get(5)?,
            status: row.get(6)?,
            progress: row.get(7)?,
            error: row.get(8)?,
            rag_processed: row.get(9)?,
            vector_count: row.get(10)?,
            chunk_count: row.get(11)?,
            text_length: row.get(12)?,
            embedding_model: row.get(13)?,
            stats: row.get(14)?,
            uploaded_at: row.get(15)?,
            processed_at: row.get(16)?,
            updated_at: row.get(17)?,
        })
    }

    fn into_document(self) -> DomainResult<Document> {
        let stats = match self.stats {
            Some(json) => Some(serde_json::from_str::<ProcessingStats>(&json).map_err(|e| {
                DomainError::InvalidValue(format!("Corrupt stats for {}: {}", self.id, e))
            })?),
            None => None,
        };
        let progress = u8::try_from(self.progress)
            .map_err(|_| DomainError::InvalidValue(format!("Invalid progress: {}", self.progress)))
            .and_then(Progress::new)?;

        Ok(Document::from_snapshot(DocumentSnapshot {
            id: DocumentId::new(self.id)?,
            agent_id: AgentId::new(self.agent_id)?,
            name: self.name,
            content_type: self.content_type,
            size_bytes: self.size_bytes.max(0) as u64,
            storage_key: self.storage_key,
            status: self.status.parse::<ProcessingStatus>()?,
            progress,
            error: self.error,
            rag_processed: self.rag_processed,
            vector_count: self.vector_count.max(0) as usize,
            chunk_count: self.chunk_count.max(0) as usize,
            text_length: self.text_length.max(0) as usize,
            embedding_model: self.embedding_model,
            stats,
            uploaded_at: parse_timestamp(&self.uploaded_at)?,
            processed_at: self.processed_at.as_deref().map(parse_timestamp).transpose()?,
            updated_at: parse_timestamp(&self.updated_at)?,
        }))
    }
}

/// Fixed-width UTC so that text ordering matches time ordering
fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DomainError::InvalidValue(format!("Invalid timestamp '{}': {}", value, e)))
}

fn db_error(e: rusqlite::Error) -> DomainError {
    DomainError::InvalidOperation(format!("Database error: {}", e))
}

/// SQLite-based implementation of the DocumentRepository trait
pub struct SqliteDocumentRepository {
    conn: Connection,
}

impl SqliteDocumentRepository {
    /// Create a new SQLite repository with the given connection
    pub fn new(conn: Connection) -> Self {
        SqliteDocumentRepository { conn }
    }

    /// Create a new in-memory SQLite repository (useful for testing)
    pub fn new_in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::initialize_database(&conn)?;
        Ok(SqliteDocumentRepository { conn })
    }

    /// Create a new file-based SQLite repository
    pub fn new_with_path(path: impl AsRef<std::path::Path>) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        super::schema::initialize_database(&conn)?;
        Ok(SqliteDocumentRepository { conn })
    }

    fn upsert_row(&self, doc: &DocumentSnapshot) -> DomainResult<()> {
        let stats = doc
            .stats
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DomainError::InvalidValue(format!("Unserializable stats: {}", e)))?;

        self.conn
            .execute(
                "INSERT OR REPLACE INTO documents (id, agent_id, name, content_type, size_bytes,
                    storage_key, status, progress, error, rag_processed, vector_count, chunk_count,
                    text_length, embedding_model, stats, uploaded_at, processed_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                params![
                    doc.id.as_str(),
                    doc.agent_id.as_str(),
                    doc.name,
                    doc.content_type,
                    doc.size_bytes as i64,
                    doc.storage_key,
                    doc.status.as_str(),
                    doc.progress.value() as i64,
                    doc.error,
                    doc.rag_processed,
                    doc.vector_count as i64,
                    doc.chunk_count as i64,
                    doc.text_length as i64,
                    doc.embedding_model,
                    stats,
                    format_timestamp(doc.uploaded_at),
                    doc.processed_at.map(format_timestamp),
                    format_timestamp(doc.updated_at),
                ],
            )
            .map_err(db_error)?;
        Ok(())
    }
}

impl DocumentRepository for SqliteDocumentRepository {
    fn save(&mut self, document: Document) -> DomainResult<()> {
        self.upsert_row(document.snapshot())
    }

    fn find_by_id(&self, id: &DocumentId) -> DomainResult<Option<Document>> {
        let row = self.conn.query_row(
            &format!("{} WHERE id = ?1", SELECT_COLUMNS),
            params![id.as_str()],
            DocumentRow::from_row,
        );

        match row {
            Ok(row) => row.into_document().map(Some),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(db_error(e)),
        }
    }

    fn find_by_agent(&self, agent_id: &AgentId) -> DomainResult<Vec<Document>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "{} WHERE agent_id = ?1 ORDER BY uploaded_at, rowid",
                SELECT_COLUMNS
            ))
            .map_err(db_error)?;

        let rows = stmt
            .query_map(params![agent_id.as_str()], DocumentRow::from_row)
            .map_err(db_error)?
            .collect::<SqliteResult<Vec<_>>>()
            .map_err(db_error)?;

        rows.into_iter().map(DocumentRow::into_document).collect()
    }

    fn delete(&mut self, id: &DocumentId) -> DomainResult<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM documents WHERE id = ?1", params![id.as_str()])
            .map_err(db_error)?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::RagMetadata;
    use crate::domain::value_objects::Milestone;

    fn document(id: &str, agent: &str) -> Document {
        Document::new(
            DocumentId::new(id).unwrap(),
            AgentId::new(agent).unwrap(),
            format!("{}.pdf", id),
            "application/pdf",
            2048,
            format!("agents/{}/{}/{}.pdf", agent, id, id),
        )
    }

    #[test]
    fn test_save_and_find_pending_document() {
        let mut repo = SqliteDocumentRepository::new_in_memory().unwrap();
        let doc = document("doc-1", "agent-1");
        repo.save(doc.clone()).unwrap();

        let found = repo.find_by_id(&DocumentId::new("doc-1").unwrap()).unwrap().unwrap();
        assert_eq!(found.status(), ProcessingStatus::Pending);
        assert_eq!(found.name(), "doc-1.pdf");
        assert_eq!(found.size_bytes(), 2048);
        assert_eq!(found.storage_key(), "agents/agent-1/doc-1/doc-1.pdf");
        assert_eq!(found.snapshot().uploaded_at.timestamp_micros(), doc.snapshot().uploaded_at.timestamp_micros());
    }

    #[test]
    fn test_find_missing_document() {
        let repo = SqliteDocumentRepository::new_in_memory().unwrap();
        let found = repo.find_by_id(&DocumentId::new("nope").unwrap()).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_completed_document_round_trips_metadata() {
        let mut repo = SqliteDocumentRepository::new_in_memory().unwrap();
        let mut doc = document("doc-1", "agent-1");
        doc.start_processing().unwrap();
        doc.record_milestone(Milestone::Embedding).unwrap();
        doc.complete(RagMetadata {
            vector_count: 4,
            text_length: 3200,
            chunk_count: 4,
            embedding_model: "text-embedding-3-small".to_string(),
            stats: ProcessingStats {
                original_length: 3200,
                chunks_created: 4,
                avg_chunk_size: 800,
                skipped_pages: 1,
                total_tokens: 820,
            },
            processed_at: Utc::now(),
        })
        .unwrap();
        repo.save(doc).unwrap();

        let found = repo.find_by_id(&DocumentId::new("doc-1").unwrap()).unwrap().unwrap();
        assert_eq!(found.status(), ProcessingStatus::Completed);
        assert!(found.is_rag_processed());
        assert_eq!(found.vector_count(), 4);
        assert_eq!(found.progress().value(), 100);
        assert_eq!(found.embedding_model(), Some("text-embedding-3-small"));
        assert_eq!(found.stats().unwrap().skipped_pages, 1);
        assert!(found.processed_at().is_some());
    }

    #[test]
    fn test_failed_document_keeps_error() {
        let mut repo = SqliteDocumentRepository::new_in_memory().unwrap();
        let mut doc = document("doc-1", "agent-1");
        doc.start_processing().unwrap();
        doc.fail("No text content extracted").unwrap();
        repo.save(doc).unwrap();

        let found = repo.find_by_id(&DocumentId::new("doc-1").unwrap()).unwrap().unwrap();
        assert_eq!(found.status(), ProcessingStatus::Failed);
        assert_eq!(found.error(), Some("No text content extracted"));
        assert_eq!(found.progress().value(), 0);
    }

    #[test]
    fn test_save_replaces_existing_row() {
        let mut repo = SqliteDocumentRepository::new_in_memory().unwrap();
        let mut doc = document("doc-1", "agent-1");
        repo.save(doc.clone()).unwrap();
        doc.start_processing().unwrap();
        repo.save(doc).unwrap();

        let all = repo.find_by_agent(&AgentId::new("agent-1").unwrap()).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status(), ProcessingStatus::Processing);
    }

    #[test]
    fn test_find_by_agent_is_scoped_and_ordered() {
        let mut repo = SqliteDocumentRepository::new_in_memory().unwrap();
        repo.save(document("doc-1", "agent-1")).unwrap();
        repo.save(document("doc-2", "agent-2")).unwrap();
        repo.save(document("doc-3", "agent-1")).unwrap();

        let docs = repo.find_by_agent(&AgentId::new("agent-1").unwrap()).unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.snapshot().id.as_str()).collect();
        assert_eq!(ids, vec!["doc-1", "doc-3"]);
    }

    #[test]
    fn test_delete() {
        let mut repo = SqliteDocumentRepository::new_in_memory().unwrap();
        repo.save(document("doc-1", "agent-1")).unwrap();

        let id = DocumentId::new("doc-1").unwrap();
        assert!(repo.delete(&id).unwrap());
        assert!(!repo.delete(&id).unwrap());
        assert!(repo.find_by_id(&id).unwrap().is_none());
    }

    #[test]
    fn test_file_backed_repository_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("documents.db");
        {
            let mut repo = SqliteDocumentRepository::new_with_path(&path).unwrap();
            repo.save(document("doc-1", "agent-1")).unwrap();
        }

        let repo = SqliteDocumentRepository::new_with_path(&path).unwrap();
        assert!(repo.find_by_id(&DocumentId::new("doc-1").unwrap()).unwrap().is_some());
    }
}
