//! Reciprocal Rank Fusion over ranked chunk-id lists.
//!
//! Each id at zero-based rank `r` of a list earns `1 / (r + k_const)`; the
//! contributions are summed across lists (and across repeated occurrences in
//! one list). Only ranks matter, so lists from engines with incomparable
//! scores can be merged.
use indexmap::IndexMap;
use tracing::debug;

use docqa_core::error::{Error, Result};
use docqa_core::types::{ChunkId, SearchHit, SourceKind};

pub const DEFAULT_RRF_K: usize = 60;

/// One fused identifier with its accumulated score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedId {
    pub chunk_id: ChunkId,
    pub score: f64,
}

/// Fuse `lists` (each best-first) into one best-first ranking.
///
/// The output holds every id seen in any list exactly once. Equal scores
/// keep the order in which ids were first seen, walking the lists in order.
pub fn reciprocal_rank_fusion<L: AsRef<[ChunkId]>>(
    lists: &[L],
    k_const: usize,
) -> Result<Vec<FusedId>> {
    if k_const == 0 {
        return Err(Error::InvalidRankInput(
            "rrf damping constant must be positive".to_string(),
        ));
    }
    let mut scores: IndexMap<ChunkId, f64> = IndexMap::new();
    for list in lists {
        for (rank, &id) in list.as_ref().iter().enumerate() {
            *scores.entry(id).or_insert(0.0) += 1.0 / (rank as f64 + k_const as f64);
        }
    }

    let mut fused: Vec<FusedId> = scores
        .into_iter()
        .map(|(chunk_id, score)| FusedId { chunk_id, score })
        .collect();
    // Stable: ties stay in first-seen order.
    fused.sort_by(|a, b| b.score.total_cmp(&a.score));
    debug!(
        lists = lists.len(),
        fused = fused.len(),
        k_const,
        "reciprocal rank fusion"
    );
    Ok(fused)
}

/// Convenience form returning only the ordered ids.
pub fn fuse_ids<L: AsRef<[ChunkId]>>(lists: &[L], k_const: usize) -> Result<Vec<ChunkId>> {
    Ok(reciprocal_rank_fusion(lists, k_const)?
        .into_iter()
        .map(|f| f.chunk_id)
        .collect())
}

/// Fuse engine hit lists, re-ranking by their list positions.
pub fn fuse_hits(lists: &[Vec<SearchHit>], k_const: usize) -> Result<Vec<SearchHit>> {
    let id_lists: Vec<Vec<ChunkId>> = lists
        .iter()
        .map(|l| l.iter().map(|h| h.chunk_id).collect())
        .collect();
    Ok(reciprocal_rank_fusion(&id_lists, k_const)?
        .into_iter()
        .enumerate()
        .map(|(rank, f)| SearchHit {
            chunk_id: f.chunk_id,
            score: f.score as f32,
            rank,
            source: SourceKind::Fused,
        })
        .collect())
}
