use thiserror::Error;

/// Failures raised by the retrieval core and its collaborators.
///
/// Index and fusion code returns these directly and never logs-and-continues;
/// only the orchestrator decides whether a failure degrades or aborts a query.
#[derive(Debug, Error)]
pub enum Error {
    #[error("search attempted against an empty corpus")]
    EmptyCorpus,

    #[error("vector dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding provider failed on batch {batch}: {reason}")]
    EmbeddingProvider { batch: usize, reason: String },

    #[error("invalid rank input: {0}")]
    InvalidRankInput(String),

    #[error("no indexed content for document '{0}'")]
    NoIndexedContent(String),

    #[error("corpus misaligned: {chunks} chunks but {embeddings} embeddings")]
    CorpusMisaligned { chunks: usize, embeddings: usize },

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("index failure: {0}")]
    Index(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a provider failure that is not tied to a specific batch.
    pub fn provider(reason: impl Into<String>) -> Self {
        Self::EmbeddingProvider {
            batch: 0,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
