use std::sync::Arc;

use crate::error::Result;
use crate::types::{Document, SearchHit};

/// Maps texts to fixed-length vectors, one per input, in input order.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `hash:d768`).
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    /// Largest batch the provider accepts in one call.
    fn max_batch(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

impl<E: Embedder + ?Sized> Embedder for Arc<E> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn max_batch(&self) -> usize {
        (**self).max_batch()
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn max_batch(&self) -> usize {
        (**self).max_batch()
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }
}

/// Lexical search over one document's chunks.
pub trait TextSearcher: Send + Sync {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>>;
}

/// Similarity search over one document's chunk vectors.
pub trait VectorSearcher: Send + Sync {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn dim(&self) -> usize;
    fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchHit>>;
}

/// Supplies a session's document; the core never looks documents up itself.
pub trait DocumentStore: Send + Sync {
    fn document(&self, session_id: &str) -> Option<Arc<Document>>;
}
