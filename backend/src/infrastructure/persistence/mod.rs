mod schema;
mod sqlite_document_repository;

pub use schema::initialize_database;
pub use sqlite_document_repository::SqliteDocumentRepository;
