//! Layered configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `DOCQA_*` env vars (nested keys separated by `__`, e.g.
//! `DOCQA_RETRIEVAL__FINAL_K=5`). Also expands `~` and `${VAR}` in
//! user-supplied paths.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::data_processor::ChunkingConfig;

pub const ENV_PREFIX: &str = "DOCQA_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingConfig,
    pub session: SessionSettings,
}

/// Top-k sizes and fusion parameters for the question path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub dense_k: usize,
    pub sparse_k: usize,
    pub final_k: usize,
    pub rrf_k: usize,
    /// Continue with one retrieval method when the other fails.
    pub allow_degraded: bool,
    /// Documents whose built indices are kept per retriever.
    pub cache_capacity: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            dense_k: 10,
            sparse_k: 10,
            final_k: 10,
            rrf_k: 60,
            allow_degraded: true,
            cache_capacity: 32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Offline feature-hashing embedder.
    Hash,
    /// OpenAI-compatible `/embeddings` endpoint.
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: ProviderKind,
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    pub api_key_env: String,
    pub dimension: usize,
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Hash,
            model: "text-embedding-004".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta/openai/embeddings"
                .to_string(),
            api_key: None,
            api_key_env: "DOCQA_EMBEDDING_API_KEY".to_string(),
            dimension: 768,
            batch_size: 100,
            max_retries: 2,
            retry_backoff_ms: 500,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingSettings {
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| env::var(&self.api_key_env).ok())
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub ttl_secs: u64,
    pub max_sessions: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 1800,
            max_sessions: 20,
        }
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    pub fn load_from(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => {
                figment = figment.merge(Toml::file(dir.join("config.dev.toml")))
            }
            "prod" | "production" => {
                figment = figment.merge(Toml::file(dir.join("config.prod.toml")))
            }
            "test" | "testing" => {
                figment = figment.merge(Toml::file(dir.join("config.test.toml")))
            }
            _ => {}
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the typed settings tree.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

impl Settings {
    pub fn validate(&self) -> crate::Result<()> {
        let invalid = |msg: &str| Err(crate::Error::InvalidConfig(msg.to_string()));
        let r = &self.retrieval;
        if r.rrf_k == 0 {
            return invalid("retrieval.rrf_k must be positive");
        }
        if r.final_k == 0 || r.dense_k == 0 || r.sparse_k == 0 {
            return invalid("retrieval top-k values must be positive");
        }
        if r.cache_capacity == 0 {
            return invalid("retrieval.cache_capacity must be positive");
        }
        if self.embedding.dimension == 0 {
            return invalid("embedding.dimension must be positive");
        }
        if self.embedding.batch_size == 0 {
            return invalid("embedding.batch_size must be positive");
        }
        if self.chunking.chunk_size == 0 {
            return invalid("chunking.chunk_size must be positive");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return invalid("chunking.chunk_overlap must be smaller than chunking.chunk_size");
        }
        if self.session.max_sessions == 0 {
            return invalid("session.max_sessions must be positive");
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
