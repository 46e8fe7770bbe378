//! Domain types shared by the dense, sparse and hybrid engines.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Zero-based position of a chunk within its document.
pub type ChunkId = usize;

/// A fragment of a source document that is independently retrieved.
///
/// - `id`: position in the chunk sequence at creation time
/// - `text`: the non-empty text payload
/// - `page`: source page reference, informational only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub page: Option<u32>,
}

impl Chunk {
    pub fn new(id: ChunkId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            page: None,
        }
    }
}

/// Indicates which engine produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Text,
    Fused,
}

/// One entry of a ranked list.
///
/// `score` is engine-specific but higher is always better. `rank` is the
/// zero-based position within the list it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: ChunkId,
    pub score: f32,
    pub rank: usize,
    pub source: SourceKind,
}

/// Project `(id, score)` pairs, already ordered best-first, into ranked hits.
pub fn rank_hits(
    scored: impl IntoIterator<Item = (ChunkId, f32)>,
    source: SourceKind,
) -> Vec<SearchHit> {
    scored
        .into_iter()
        .enumerate()
        .map(|(rank, (chunk_id, score))| SearchHit {
            chunk_id,
            score,
            rank,
            source,
        })
        .collect()
}

/// The chunk sequence and its embeddings for one ingested upload.
///
/// The two sequences correspond by position. `version` is a content hash of
/// the chunks and their embeddings and changes whenever either does.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub chunks: Vec<Chunk>,
    pub embeddings: Vec<Vec<f32>>,
    pub version: String,
    pub sources: Vec<String>,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
        sources: Vec<String>,
    ) -> Result<Self> {
        let id = id.into();
        if chunks.is_empty() || embeddings.is_empty() {
            return Err(Error::NoIndexedContent(id));
        }
        if chunks.len() != embeddings.len() {
            return Err(Error::CorpusMisaligned {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        let dim = embeddings[0].len();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dim) {
            return Err(Error::DimensionMismatch {
                expected: dim,
                actual: bad.len(),
            });
        }
        let version = content_version(&chunks, &embeddings);
        Ok(Self {
            id,
            chunks,
            embeddings,
            version,
            sources,
        })
    }

    pub fn dim(&self) -> usize {
        self.embeddings.first().map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Hex blake3 digest over chunk ids, texts and embedding values.
pub fn content_version(chunks: &[Chunk], embeddings: &[Vec<f32>]) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in chunks {
        hasher.update(&(c.id as u64).to_le_bytes());
        hasher.update(&(c.text.len() as u64).to_le_bytes());
        hasher.update(c.text.as_bytes());
    }
    hasher.update(&(embeddings.len() as u64).to_le_bytes());
    for row in embeddings {
        hasher.update(&(row.len() as u64).to_le_bytes());
        for value in row {
            hasher.update(&value.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

/// A retrieved chunk handed to the answer generator, in fused order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub chunk_id: ChunkId,
    pub text: String,
    pub page: Option<u32>,
    pub fused_score: f32,
}

/// Records that one retrieval method was skipped for a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Degradation {
    DenseUnavailable(String),
    SparseUnavailable(String),
}

/// Output of the retrieval path: the question plus its passages.
///
/// An empty `passages` list means nothing relevant was found; failures are
/// reported as errors instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Retrieval {
    pub question: String,
    pub passages: Vec<Passage>,
    pub degraded: Option<Degradation>,
}

impl Retrieval {
    pub fn texts(&self) -> Vec<&str> {
        self.passages.iter().map(|p| p.text.as_str()).collect()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}
