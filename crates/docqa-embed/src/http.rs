//! HTTP embedding provider for OpenAI-compatible APIs
//!
//! Works with any endpoint speaking the `/v1/embeddings` request/response
//! shape, including hosted APIs that expose an OpenAI-compatible surface and
//! local servers (vLLM, Ollama, text-embeddings-inference).

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use docqa_core::config::EmbeddingSettings;
use docqa_core::error::{Error, Result};
use docqa_core::traits::Embedder;

#[derive(Debug)]
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dim: usize,
    max_batch: usize,
    id: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
    encoding_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl HttpEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        info!(
            endpoint = %settings.endpoint,
            model = %settings.model,
            "initializing HTTP embedding provider"
        );

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match settings.resolve_api_key() {
            Some(key) => {
                let value = HeaderValue::from_str(&format!("Bearer {key}"))
                    .map_err(|e| Error::InvalidConfig(format!("invalid API key format: {e}")))?;
                headers.insert(AUTHORIZATION, value);
            }
            None => warn!(
                env = %settings.api_key_env,
                "no API key configured for {}",
                settings.endpoint
            ),
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            dim: settings.dimension,
            max_batch: settings.batch_size.max(1),
            id: format!("http:{}:d{}", settings.model, settings.dimension),
        })
    }

    fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
            // Only OpenAI's text-embedding-3 family accepts a requested size.
            dimensions: self.model.contains("text-embedding-3").then_some(self.dim),
            encoding_format: "float",
        };
        debug!(
            endpoint = %self.endpoint,
            texts = texts.len(),
            "sending embedding request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| Error::provider(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .unwrap_or_else(|| "unspecified".to_string());
            return Err(Error::provider(format!("rate limited, retry after {retry_after}")));
        }
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(Error::provider(format!("API returned {status}: {message}")));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .map_err(|e| Error::provider(format!("malformed embedding response: {e}")))?;
        order_by_index(parsed.data, texts.len())
    }
}

/// Place response rows by their `index`, rejecting gaps and duplicates.
fn order_by_index(data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(Error::provider(format!(
            "API returned {} embeddings for {} texts",
            data.len(),
            expected
        )));
    }
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for row in data {
        let slot = slots
            .get_mut(row.index)
            .filter(|slot| slot.is_none())
            .ok_or_else(|| Error::provider(format!("unexpected embedding index {}", row.index)))?;
        *slot = Some(row.embedding);
    }
    slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| Error::provider("missing embedding rows in response"))
}

impl Embedder for HttpEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_batch(&self) -> usize {
        self.max_batch
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts)
    }
}
