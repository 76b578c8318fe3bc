use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rag_backend::application::ports::{EmbeddingProvider, VectorStore};
use rag_backend::application::{
    DocumentProcessingService, EmbeddingGenerator, PollConfig, PollOutcome, PollProcessingStatus,
    QueryOptions,
};
use rag_backend::config::{AppConfig, EmbeddingBackend};
use rag_backend::domain::base::Entity;
use rag_backend::domain::value_objects::{AgentId, ContentType, DocumentId, JobKey};
use rag_backend::infrastructure::embeddings::{
    FastEmbedService, OpenAiEmbeddingProvider, QdrantVectorStore,
};
use rag_backend::infrastructure::persistence::SqliteDocumentRepository;
use rag_backend::infrastructure::storage::FsBlobStore;

type Service = DocumentProcessingService<SqliteDocumentRepository>;

#[derive(Parser)]
#[command(name = "rag-backend")]
#[command(about = "Ingest product documents and query them for sales agents")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the vector collection and check external services
    Init,

    /// Upload a document for an agent and process it
    Ingest {
        agent: String,
        file: PathBuf,

        /// MIME type; guessed from the file extension when omitted
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Process every unprocessed document of an agent, one at a time
    ProcessAgent { agent: String },

    /// Retrieve the chunks most relevant to a question
    Query {
        agent: String,
        text: String,

        #[arg(long, default_value_t = 5)]
        limit: usize,

        #[arg(long, default_value_t = 0.3)]
        threshold: f32,
    },

    /// Document and vector totals for an agent
    Stats { agent: String },

    /// Compare a document's recorded vector count with the vector store
    Verify { agent: String, document: String },

    /// Delete a document with its vectors and stored bytes
    Delete { agent: String, document: String },

    /// Report vector store and embedding provider health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rag_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    cli.config.validate()?;
    let service = build_service(&cli.config).await?;

    let result = run(&service, cli.command).await;
    service.shutdown().await;
    result
}

async fn build_service(config: &AppConfig) -> Result<Service> {
    let provider: Arc<dyn EmbeddingProvider> = match config.embedding_backend {
        EmbeddingBackend::Openai => Arc::new(OpenAiEmbeddingProvider::new(config.openai_config()?)?),
        EmbeddingBackend::Fastembed => {
            Arc::new(FastEmbedService::new(config.embedding_model()?).await?)
        }
    };
    let embeddings = Arc::new(EmbeddingGenerator::new(config.embedding_config(), provider)?);

    let vector_store: Arc<dyn VectorStore> = Arc::new(QdrantVectorStore::new(
        &config.qdrant_url,
        config.qdrant_api_key.clone(),
        config.collection.clone(),
        config.vector_dimension()?,
    )?);

    let repository = SqliteDocumentRepository::new_with_path(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
    let blob_store = Arc::new(FsBlobStore::new(config.blob_root.clone()));

    let service = DocumentProcessingService::new(
        config.processing_config(),
        Arc::new(Mutex::new(repository)),
        blob_store,
        embeddings,
        vector_store,
    )?;
    Ok(service)
}

async fn run(service: &Service, command: Commands) -> Result<()> {
    match command {
        Commands::Init => {
            let report = service.initialize().await?;
            print_json(&report)
        }
        Commands::Ingest {
            agent,
            file,
            content_type,
        } => ingest(service, &AgentId::new(agent)?, &file, content_type).await,
        Commands::ProcessAgent { agent } => {
            let batch = service.process_agent_documents(&AgentId::new(agent)?).await?;
            print_json(&batch)
        }
        Commands::Query {
            agent,
            text,
            limit,
            threshold,
        } => {
            let options = QueryOptions::for_agent(AgentId::new(agent)?)
                .with_limit(limit)
                .with_threshold(threshold);
            let response = service.query(&text, &options).await;
            print_json(&response)
        }
        Commands::Stats { agent } => {
            let stats = service.agent_stats(&AgentId::new(agent)?).await?;
            print_json(&stats)
        }
        Commands::Verify { agent, document } => {
            let report = service
                .verify_document_vectors(&AgentId::new(agent)?, &DocumentId::new(document)?)
                .await?;
            if !report.consistent {
                warn!(
                    "Document {} expects {} vectors but the store holds {}",
                    report.document_id, report.expected_vectors, report.actual_vectors
                );
            }
            print_json(&report)
        }
        Commands::Delete { agent, document } => {
            let document_id = DocumentId::new(document)?;
            service
                .delete_document(&AgentId::new(agent)?, &document_id)
                .await?;
            info!("Deleted document {}", document_id);
            Ok(())
        }
        Commands::Health => {
            let report = service.health_check().await;
            print_json(&report)?;
            if !report.healthy {
                anyhow::bail!("Service is unhealthy");
            }
            Ok(())
        }
    }
}

async fn ingest(
    service: &Service,
    agent_id: &AgentId,
    file: &Path,
    content_type: Option<String>,
) -> Result<()> {
    let content_type = match content_type {
        Some(content_type) => content_type,
        None => file
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ContentType::from_extension)
            .map(|ct| ct.as_mime().to_string())
            .with_context(|| format!("Cannot infer content type of {}", file.display()))?,
    };
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", file.display()))?;
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let document = service
        .register_document(agent_id, name, &content_type, &bytes)
        .await?;
    info!("Uploaded {} as document {}", name, document.id());

    if !service.config().auto_process {
        let outcome = service.process_document(agent_id, document.id()).await?;
        return print_json(&outcome);
    }

    let key = JobKey::new(agent_id.clone(), document.id().clone());
    let poller = PollProcessingStatus::new(service.job_registry(), PollConfig::default());
    let outcome = poller
        .execute(&key, |job| {
            info!("[{}] {}", job.progress, job.message);
        })
        .await;

    match outcome {
        PollOutcome::Completed(job) => print_json(&job),
        PollOutcome::Failed(job) => {
            print_json(&job)?;
            anyhow::bail!(
                "Processing failed: {}",
                job.error.unwrap_or_else(|| "unknown error".to_string())
            )
        }
        PollOutcome::TimedOut { attempts } => {
            anyhow::bail!("Gave up waiting after {} status checks", attempts)
        }
        PollOutcome::NotTracked => {
            anyhow::bail!("Processing of {} did not start", document.id())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
