//! docqa-hybrid
//!
//! Fuses dense (flat inner product) and sparse (BM25) rankings with
//! Reciprocal Rank Fusion and resolves the winners to passages for the
//! answer generator. Also hosts the upload path that feeds the session store.
pub mod fusion;
pub mod ingest;
pub mod retriever;

pub use fusion::{fuse_hits, fuse_ids, reciprocal_rank_fusion, FusedId, DEFAULT_RRF_K};
pub use ingest::Ingestor;
pub use retriever::{DocumentIndexes, Retriever};
