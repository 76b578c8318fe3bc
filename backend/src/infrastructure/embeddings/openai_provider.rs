/// OpenAI-compatible embedding provider
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::application::ports::{EmbeddingProvider, ProviderEmbedding};
use crate::domain::value_objects::EmbeddingModel;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection settings for the OpenAI embeddings endpoint
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: EmbeddingModel,
    pub timeout: Duration,
    /// Total attempts per call, including the first
    pub max_retries: usize,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        OpenAiConfig {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: EmbeddingModel::TextEmbedding3Small,
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// Embeds one text per request; rate limits and server errors are retried with
/// capped exponential backoff.
#[derive(Clone)]
pub struct OpenAiEmbeddingProvider {
    client: Client,
    endpoint: String,
    model: EmbeddingModel,
    max_retries: usize,
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        anyhow::ensure!(!config.api_key.trim().is_empty(), "missing OpenAI API key");

        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid OpenAI API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .context("failed to build OpenAI HTTP client")?;
        let endpoint = format!("{}/embeddings", config.base_url.trim_end_matches('/'));

        info!(
            "OpenAI embedding provider ready ({} via {})",
            config.model, endpoint
        );

        Ok(Self {
            client,
            endpoint,
            model: config.model,
            max_retries: config.max_retries.max(1),
        })
    }

    async fn request(&self, text: &str) -> Result<EmbeddingResponse> {
        let mut attempt = 0usize;
        loop {
            let request = EmbeddingRequest {
                model: self.model.as_str(),
                input: text,
            };
            match self.client.post(&self.endpoint).json(&request).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp
                            .json::<EmbeddingResponse>()
                            .await
                            .context("failed to parse OpenAI embeddings response");
                    }
                    let body = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!("OpenAI returned {}, retrying (attempt {})", status, attempt + 1);
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    anyhow::bail!("OpenAI embeddings request failed ({}): {}", status, body);
                }
                Err(err) => {
                    let transient = err.is_connect() || err.is_timeout() || err.is_request();
                    if transient && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!("OpenAI request error ({}), retrying (attempt {})", err, attempt + 1);
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(err).context("OpenAI embeddings request failed");
                }
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<ProviderEmbedding> {
        debug!("Requesting embedding (length: {})", text.len());
        let response = self.request(text).await?;
        response.into_embedding()
    }

    fn model(&self) -> &str {
        self.model.as_str()
    }

    fn dimension_count(&self) -> usize {
        self.model.dimension_count()
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u32,
}

impl EmbeddingResponse {
    fn into_embedding(self) -> Result<ProviderEmbedding> {
        let tokens = self.usage.map(|u| u.total_tokens).unwrap_or(0);
        let data = self
            .data
            .into_iter()
            .next()
            .context("OpenAI response contained no embedding")?;
        Ok(ProviderEmbedding {
            vector: data.embedding,
            tokens,
        })
    }
}
