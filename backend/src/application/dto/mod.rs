mod health;
mod processing;
mod query;

pub use health::{HealthReport, ServiceHealth};
pub use processing::{AgentRagStats, BatchOutcome, ProcessingOutcome, VerificationReport};
pub use query::{QueryOptions, QueryResponse, QueryResult, ResultMetadata};
