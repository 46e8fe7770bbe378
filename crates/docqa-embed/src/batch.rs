use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use docqa_core::error::{Error, Result};
use docqa_core::traits::Embedder;

#[derive(Debug, Clone)]
pub struct BatchPolicy {
    pub batch_size: usize,
    /// Extra attempts per batch after the first failure.
    pub max_retries: u32,
    /// Sleep before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Result of one batch after all of its attempts.
#[derive(Debug)]
pub enum BatchOutcome {
    Embedded(Vec<Vec<f32>>),
    Failed { attempts: u32, error: Error },
}

impl BatchOutcome {
    pub fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded(_))
    }
}

/// Splits inputs into provider-sized batches and validates every response.
///
/// A batch is accepted only if it returns one vector per input, each of the
/// provider's dimension. The embedding array returned by
/// [`Embedder::embed_batch`] therefore always matches the input length, or the
/// call fails with `EmbeddingProvider` naming the first failed batch.
pub struct BatchingEmbedder<E> {
    inner: E,
    policy: BatchPolicy,
}

impl<E: Embedder> BatchingEmbedder<E> {
    pub fn new(inner: E, policy: BatchPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    fn batch_size(&self) -> usize {
        self.policy.batch_size.min(self.inner.max_batch()).max(1)
    }

    /// Number of batches `n` texts are split into.
    pub fn batch_count(&self, n: usize) -> usize {
        n.div_ceil(self.batch_size())
    }

    /// Embed every batch and report each outcome, without stopping at the
    /// first failure.
    pub fn embed_batches(&self, texts: &[String]) -> Vec<BatchOutcome> {
        texts
            .chunks(self.batch_size())
            .enumerate()
            .map(|(index, batch)| self.embed_one(index, batch))
            .collect()
    }

    /// Embed all texts, calling `on_batch` with the number of texts done after
    /// each successful batch. Stops at the first batch that still fails after
    /// its retries.
    pub fn embed_with_progress(
        &self,
        texts: &[String],
        mut on_batch: impl FnMut(usize),
    ) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for (index, batch) in texts.chunks(self.batch_size()).enumerate() {
            match self.embed_one(index, batch) {
                BatchOutcome::Embedded(vectors) => out.extend(vectors),
                BatchOutcome::Failed { attempts, error } => {
                    return Err(Error::EmbeddingProvider {
                        batch: index,
                        reason: format!("{} (after {attempts} attempts)", reason_of(&error)),
                    });
                }
            }
            on_batch(out.len());
        }
        debug!(
            texts = texts.len(),
            provider = self.inner.id(),
            "embedded all batches"
        );
        Ok(out)
    }

    fn embed_one(&self, index: usize, batch: &[String]) -> BatchOutcome {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = self
                .inner
                .embed_batch(batch)
                .and_then(|vectors| self.validate(batch.len(), vectors));
            match result {
                Ok(vectors) => return BatchOutcome::Embedded(vectors),
                Err(error) if attempt > self.policy.max_retries => {
                    warn!(batch = index, attempts = attempt, %error, "embedding batch failed");
                    return BatchOutcome::Failed {
                        attempts: attempt,
                        error,
                    };
                }
                Err(error) => {
                    warn!(batch = index, attempt, %error, "embedding batch failed, retrying");
                    thread::sleep(self.policy.backoff * attempt);
                }
            }
        }
    }

    fn validate(&self, expected: usize, vectors: Vec<Vec<f32>>) -> Result<Vec<Vec<f32>>> {
        if vectors.len() != expected {
            return Err(Error::provider(format!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                expected
            )));
        }
        let dim = self.inner.dim();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(Error::DimensionMismatch {
                expected: dim,
                actual: bad.len(),
            });
        }
        Ok(vectors)
    }
}

fn reason_of(error: &Error) -> String {
    match error {
        Error::EmbeddingProvider { reason, .. } => reason.clone(),
        other => other.to_string(),
    }
}

impl<E: Embedder> Embedder for BatchingEmbedder<E> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn max_batch(&self) -> usize {
        usize::MAX
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_with_progress(texts, |_| {})
    }
}
