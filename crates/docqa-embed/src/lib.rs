//! docqa-embed
//!
//! Embedding providers behind `docqa_core::traits::Embedder`:
//! - `HashEmbedder`: deterministic feature hashing, no model or network
//! - `HttpEmbedder`: OpenAI-compatible `/embeddings` endpoint
//! - `BatchingEmbedder`: splits large inputs, retries failed batches and
//!   fails the whole call if any batch stays failed
pub mod batch;
pub mod hash;
pub mod http;

use std::time::Duration;
use tracing::info;

use docqa_core::config::{EmbeddingSettings, ProviderKind};
use docqa_core::error::Result;
use docqa_core::traits::Embedder;

pub use batch::{BatchOutcome, BatchPolicy, BatchingEmbedder};
pub use hash::HashEmbedder;
pub use http::HttpEmbedder;

/// Build the configured provider wrapped in the batching/retry layer.
pub fn embedder_from_settings(
    settings: &EmbeddingSettings,
) -> Result<BatchingEmbedder<Box<dyn Embedder>>> {
    let inner: Box<dyn Embedder> = match settings.provider {
        ProviderKind::Hash => Box::new(HashEmbedder::new(settings.dimension)),
        ProviderKind::Http => Box::new(HttpEmbedder::new(settings)?),
    };
    info!(provider = inner.id(), dim = inner.dim(), "embedding provider ready");
    let policy = BatchPolicy {
        batch_size: settings.batch_size,
        max_retries: settings.max_retries,
        backoff: Duration::from_millis(settings.retry_backoff_ms),
    };
    Ok(BatchingEmbedder::new(inner, policy))
}
