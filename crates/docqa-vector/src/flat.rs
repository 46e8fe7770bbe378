use std::cmp::Ordering;
use tracing::debug;

use docqa_core::error::{Error, Result};
use docqa_core::traits::VectorSearcher;
use docqa_core::types::{rank_hits, ChunkId, SearchHit, SourceKind};

/// Brute-force inner-product index. Vectors are stored row-major in one
/// contiguous buffer; row `i` belongs to chunk `i`.
#[derive(Debug, Clone)]
pub struct FlatIpIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatIpIndex {
    /// Build from the full embedding array of a document.
    ///
    /// Fails with `EmptyCorpus` when there are no vectors and with
    /// `DimensionMismatch` when rows differ in length.
    pub fn build(embeddings: &[Vec<f32>]) -> Result<Self> {
        let first = embeddings.first().ok_or(Error::EmptyCorpus)?;
        let dim = first.len();
        if dim == 0 {
            return Err(Error::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }
        let mut data = Vec::with_capacity(dim * embeddings.len());
        for row in embeddings {
            if row.len() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        debug!(vectors = embeddings.len(), dim, "built flat inner-product index");
        Ok(Self { dim, data })
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Up to `k` `(chunk_id, similarity)` pairs, best first. Equal scores keep
    /// corpus order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(ChunkId, f32)>> {
        if self.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }
        let mut scored: Vec<(ChunkId, f32)> = self
            .data
            .chunks_exact(self.dim)
            .map(|row| inner_product(row, query))
            .enumerate()
            .collect();
        scored.sort_by(|a, b| descending(a.1, b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k.min(self.len()));
        Ok(scored)
    }
}

impl VectorSearcher for FlatIpIndex {
    fn len(&self) -> usize {
        FlatIpIndex::len(self)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        Ok(rank_hits(self.search(query_vec, k)?, SourceKind::Vector))
    }
}

pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

// NaN sorts last.
fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}
