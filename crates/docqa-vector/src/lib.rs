//! docqa-vector
//!
//! Exact inner-product search over one document's chunk embeddings. The index
//! is built from the full embedding array and is read-only afterwards.
pub mod flat;

pub use flat::FlatIpIndex;
