use crate::application::services::ProcessingJob;
use serde::Serialize;

/// Health of one external dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub healthy: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
}

impl ServiceHealth {
    pub fn healthy(message: impl Into<String>) -> Self {
        ServiceHealth {
            healthy: true,
            message: message.into(),
            model: None,
            dimensions: None,
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        ServiceHealth {
            healthy: false,
            message: message.into(),
            model: None,
            dimensions: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = Some(model.into());
        self.dimensions = Some(dimensions);
        self
    }
}

/// Combined health of the pipeline and its in-flight work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub healthy: bool,
    pub vector_store: ServiceHealth,
    pub embeddings: ServiceHealth,
    pub active_jobs: usize,
    pub jobs: Vec<ProcessingJob>,
}

impl HealthReport {
    pub fn new(vector_store: ServiceHealth, embeddings: ServiceHealth, jobs: Vec<ProcessingJob>) -> Self {
        HealthReport {
            healthy: vector_store.healthy && embeddings.healthy,
            vector_store,
            embeddings,
            active_jobs: jobs.len(),
            jobs,
        }
    }
}
