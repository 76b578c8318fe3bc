use rusqlite::{Connection, Result};

/// Initialize the SQLite database with the required schema.
/// This function is idempotent and can be safely called multiple times.
pub fn initialize_database(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            agent_id TEXT NOT NULL,
            name TEXT NOT NULL,
            content_type TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            storage_key TEXT NOT NULL,
            status TEXT NOT NULL,
            progress INTEGER NOT NULL,
            error TEXT,
            rag_processed INTEGER NOT NULL,
            vector_count INTEGER NOT NULL,
            chunk_count INTEGER NOT NULL,
            text_length INTEGER NOT NULL,
            embedding_model TEXT,
            stats TEXT,
            uploaded_at TEXT NOT NULL,
            processed_at TEXT,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_agent ON documents(agent_id, uploaded_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status)",
        [],
    )?;

    Ok(())
}
