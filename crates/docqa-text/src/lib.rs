//! docqa-text
//!
//! BM25 lexical search over one document's chunks, built on an in-memory
//! Tantivy index. See `tantivy_utils` for the schema and the analyzer that
//! lower-cases and splits on Unicode whitespace only.
pub mod bm25;
pub mod tantivy_utils;

pub use bm25::Bm25Index;
pub use tantivy_utils::tokenize;
