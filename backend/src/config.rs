/// Runtime configuration from command-line flags and environment
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::application::services::{EmbeddingGeneratorConfig, JobRegistryConfig, ProcessingConfig};
use crate::domain::value_objects::EmbeddingModel;
use crate::infrastructure::embeddings::{
    ChunkerConfig, OpenAiConfig, DEFAULT_COLLECTION_NAME, DEFAULT_OPENAI_BASE_URL,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbeddingBackend {
    /// Hosted OpenAI embeddings
    Openai,
    /// Local ONNX model through fastembed
    Fastembed,
}

#[derive(Debug, Clone, Args)]
pub struct AppConfig {
    /// Qdrant gRPC endpoint
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6334")]
    pub qdrant_url: String,

    #[arg(long, env = "QDRANT_API_KEY", hide_env_values = true)]
    pub qdrant_api_key: Option<String>,

    /// Collection shared by all agents
    #[arg(long, env = "RAG_COLLECTION", default_value = DEFAULT_COLLECTION_NAME)]
    pub collection: String,

    #[arg(long, env = "EMBEDDING_BACKEND", value_enum, default_value_t = EmbeddingBackend::Openai)]
    pub embedding_backend: EmbeddingBackend,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    pub openai_base_url: String,

    /// Defaults to the backend's standard model
    #[arg(long, env = "EMBEDDING_MODEL")]
    pub embedding_model: Option<String>,

    #[arg(long, env = "RAG_CHUNK_SIZE", default_value_t = 1000)]
    pub chunk_size: usize,

    #[arg(long, env = "RAG_CHUNK_OVERLAP", default_value_t = 200)]
    pub chunk_overlap: usize,

    /// Chunks embedded concurrently
    #[arg(long, env = "RAG_EMBEDDING_BATCH_SIZE", default_value_t = 10)]
    pub embedding_batch_size: usize,

    #[arg(long, env = "RAG_EMBEDDING_BATCH_PAUSE_MS", default_value_t = 100)]
    pub embedding_batch_pause_ms: u64,

    /// Pause between documents in batch processing
    #[arg(long, env = "RAG_DOCUMENT_PAUSE_MS", default_value_t = 1000)]
    pub document_pause_ms: u64,

    #[arg(long, env = "RAG_COMPLETED_JOB_TTL_SECS", default_value_t = 30)]
    pub completed_job_ttl_secs: u64,

    #[arg(long, env = "RAG_FAILED_JOB_TTL_SECS", default_value_t = 300)]
    pub failed_job_ttl_secs: u64,

    #[arg(long, env = "RAG_DATABASE_PATH", default_value = "rag-documents.db")]
    pub database_path: PathBuf,

    /// Directory holding uploaded document bytes
    #[arg(long, env = "RAG_BLOB_ROOT", default_value = "rag-blobs")]
    pub blob_root: PathBuf,

    /// Process documents as soon as they are ingested
    #[arg(long, env = "RAG_AUTO_PROCESS", default_value_t = true, action = clap::ArgAction::Set)]
    pub auto_process: bool,
}

impl AppConfig {
    pub fn embedding_model(&self) -> Result<EmbeddingModel> {
        let model = match &self.embedding_model {
            Some(name) => name.parse::<EmbeddingModel>()?,
            None => match self.embedding_backend {
                EmbeddingBackend::Openai => EmbeddingModel::TextEmbedding3Small,
                EmbeddingBackend::Fastembed => EmbeddingModel::AllMiniLML6V2,
            },
        };

        let supported = match self.embedding_backend {
            EmbeddingBackend::Openai => model == EmbeddingModel::TextEmbedding3Small,
            EmbeddingBackend::Fastembed => model == EmbeddingModel::AllMiniLML6V2,
        };
        anyhow::ensure!(
            supported,
            "Model {} is not served by the {:?} backend",
            model,
            self.embedding_backend
        );
        Ok(model)
    }

    /// Vector dimension of the collection, fixed by the embedding model
    pub fn vector_dimension(&self) -> Result<usize> {
        Ok(self.embedding_model()?.dimension_count())
    }

    pub fn openai_config(&self) -> Result<OpenAiConfig> {
        let api_key = self
            .openai_api_key
            .clone()
            .context("OPENAI_API_KEY is required for the openai embedding backend")?;
        let mut config = OpenAiConfig::new(api_key);
        config.base_url = self.openai_base_url.clone();
        config.model = self.embedding_model()?;
        Ok(config)
    }

    pub fn chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig {
            chunk_size: self.chunk_size,
            overlap: self.chunk_overlap,
        }
    }

    pub fn embedding_config(&self) -> EmbeddingGeneratorConfig {
        EmbeddingGeneratorConfig {
            batch_size: self.embedding_batch_size,
            batch_pause: Duration::from_millis(self.embedding_batch_pause_ms),
            ..EmbeddingGeneratorConfig::default()
        }
    }

    pub fn processing_config(&self) -> ProcessingConfig {
        ProcessingConfig {
            chunker: self.chunker_config(),
            document_pause: Duration::from_millis(self.document_pause_ms),
            auto_process: self.auto_process,
            jobs: JobRegistryConfig {
                completed_ttl: Duration::from_secs(self.completed_job_ttl_secs),
                failed_ttl: Duration::from_secs(self.failed_job_ttl_secs),
            },
        }
    }

    /// Check every derived config before anything is wired
    pub fn validate(&self) -> Result<()> {
        self.embedding_model()?;
        self.chunker_config().validate()?;
        self.embedding_config().validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: AppConfig,
    }

    fn parse(args: &[&str]) -> AppConfig {
        let mut argv = vec!["rag-backend"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().config
    }

    #[test]
    fn test_defaults_map_to_library_configs() {
        let config = parse(&["--collection", "test-docs", "--embedding-backend", "openai"]);

        assert_eq!(config.collection, "test-docs");
        assert_eq!(config.chunker_config(), ChunkerConfig::default());
        assert_eq!(config.embedding_config().batch_size, 10);
        assert_eq!(config.processing_config().jobs, JobRegistryConfig::default());
        assert_eq!(config.processing_config().document_pause, Duration::from_secs(1));
    }

    #[test]
    fn test_dimension_follows_backend() {
        let openai = parse(&["--embedding-backend", "openai"]);
        assert_eq!(openai.vector_dimension().unwrap(), 1536);

        let local = parse(&["--embedding-backend", "fastembed"]);
        assert_eq!(local.embedding_model().unwrap(), EmbeddingModel::AllMiniLML6V2);
        assert_eq!(local.vector_dimension().unwrap(), 384);
    }

    #[test]
    fn test_rejects_model_from_other_backend() {
        let config = parse(&[
            "--embedding-backend",
            "fastembed",
            "--embedding-model",
            "text-embedding-3-small",
        ]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_overlap_of_half_a_window() {
        let config = parse(&["--embedding-backend", "openai", "--chunk-size", "400", "--chunk-overlap", "200"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_auto_process_can_be_disabled() {
        let config = parse(&["--embedding-backend", "openai", "--auto-process", "false"]);
        assert!(!config.processing_config().auto_process);
    }

    #[test]
    fn test_openai_config_requires_key() {
        let mut config = parse(&["--embedding-backend", "openai"]);
        config.openai_api_key = None;
        assert!(config.openai_config().is_err());

        config.openai_api_key = Some("sk-test".to_string());
        config.openai_base_url = "http://localhost:9000/v1".to_string();
        let openai = config.openai_config().unwrap();
        assert_eq!(openai.base_url, "http://localhost:9000/v1");
        assert_eq!(openai.model, EmbeddingModel::TextEmbedding3Small);
    }
}
