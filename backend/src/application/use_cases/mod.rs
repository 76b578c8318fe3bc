pub mod poll_status;
pub mod query_documents;
pub mod verify_vectors;

pub use poll_status::{PollConfig, PollOutcome, PollProcessingStatus};
pub use query_documents::QueryDocuments;
pub use verify_vectors::VerifyDocumentVectors;
