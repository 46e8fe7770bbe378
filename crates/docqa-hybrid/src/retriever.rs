use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use docqa_core::config::RetrievalSettings;
use docqa_core::error::{Error, Result};
use docqa_core::traits::{DocumentStore, Embedder, TextSearcher, VectorSearcher};
use docqa_core::types::{Chunk, Degradation, Document, Passage, Retrieval, SearchHit};
use docqa_text::Bm25Index;
use docqa_vector::FlatIpIndex;

use crate::fusion::fuse_hits;

/// Dense and sparse indices built for one document.
pub struct DocumentIndexes {
    pub text: Bm25Index,
    pub vector: FlatIpIndex,
}

impl DocumentIndexes {
    pub fn build(chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<Self> {
        Ok(Self {
            text: Bm25Index::build(chunks)?,
            vector: FlatIpIndex::build(embeddings)?,
        })
    }
}

type CacheKey = (String, String);

/// Question-time path: embed, search dense and sparse, fuse, resolve.
///
/// Built indices are memoized per `(document id, content version)` in a
/// cache owned by this instance. The version covers chunks and embeddings.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    settings: RetrievalSettings,
    cache: Mutex<LruCache<CacheKey, Arc<DocumentIndexes>>>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, settings: RetrievalSettings) -> Result<Self> {
        let capacity = NonZeroUsize::new(settings.cache_capacity).ok_or_else(|| {
            Error::InvalidConfig("retrieval.cache_capacity must be positive".to_string())
        })?;
        if settings.rrf_k == 0 {
            return Err(Error::InvalidConfig(
                "retrieval.rrf_k must be positive".to_string(),
            ));
        }
        Ok(Self {
            embedder,
            settings,
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Number of documents with indices currently cached.
    pub fn cached_documents(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    /// Retrieve against a chunk sequence and its embeddings, building fresh
    /// indices for this call.
    pub fn retrieve(
        &self,
        question: &str,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<Retrieval> {
        check_corpus("<inline>", chunks, embeddings)?;
        let indexes = DocumentIndexes::build(chunks, embeddings)?;
        self.retrieve_with(question, chunks, &indexes.vector, &indexes.text)
    }

    /// Retrieve against a stored document, reusing cached indices while its
    /// content version is unchanged.
    pub fn retrieve_document(&self, question: &str, document: &Document) -> Result<Retrieval> {
        check_corpus(&document.id, &document.chunks, &document.embeddings)?;
        let indexes = self.indexes_for(document)?;
        self.retrieve_with(question, &document.chunks, &indexes.vector, &indexes.text)
    }

    /// Resolve the session's document through `store` and retrieve against it.
    pub fn retrieve_session(
        &self,
        store: &dyn DocumentStore,
        session_id: &str,
        question: &str,
    ) -> Result<Retrieval> {
        let document = store
            .document(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        self.retrieve_document(question, &document)
    }

    /// Run the fused retrieval over prepared searchers.
    ///
    /// With `allow_degraded`, a failure of exactly one method is recorded in
    /// [`Retrieval::degraded`] and the other method's ranking is used alone.
    pub fn retrieve_with(
        &self,
        question: &str,
        chunks: &[Chunk],
        vector: &dyn VectorSearcher,
        text: &dyn TextSearcher,
    ) -> Result<Retrieval> {
        if chunks.is_empty() || vector.is_empty() || text.is_empty() {
            return Err(Error::NoIndexedContent("<searchers>".to_string()));
        }
        let dense = self.dense_hits(question, vector);
        let sparse = text.search(question, self.settings.sparse_k);

        let allow = self.settings.allow_degraded;
        let (lists, degraded) = match (dense, sparse) {
            (Ok(d), Ok(s)) => (vec![d, s], None),
            (Err(e), Ok(s)) if allow => {
                warn!(error = %e, "dense retrieval failed, continuing with BM25 only");
                (vec![s], Some(Degradation::DenseUnavailable(e.to_string())))
            }
            (Ok(d), Err(e)) if allow => {
                warn!(error = %e, "sparse retrieval failed, continuing with dense only");
                (vec![d], Some(Degradation::SparseUnavailable(e.to_string())))
            }
            (Err(e), _) | (_, Err(e)) => return Err(e),
        };

        let mut fused = fuse_hits(&lists, self.settings.rrf_k)?;
        fused.truncate(self.settings.final_k);
        let passages = resolve(&fused, chunks);
        debug!(
            passages = passages.len(),
            degraded = degraded.is_some(),
            "retrieval complete"
        );
        Ok(Retrieval {
            question: question.to_string(),
            passages,
            degraded,
        })
    }

    fn dense_hits(&self, question: &str, vector: &dyn VectorSearcher) -> Result<Vec<SearchHit>> {
        let mut vectors = self.embedder.embed_batch(&[question.to_string()])?;
        if vectors.len() != 1 {
            return Err(Error::provider(format!(
                "expected 1 query embedding, got {}",
                vectors.len()
            )));
        }
        let query_vec = vectors.remove(0);
        vector.search_vec(&query_vec, self.settings.dense_k)
    }

    fn indexes_for(&self, document: &Document) -> Result<Arc<DocumentIndexes>> {
        let key = (document.id.clone(), document.version.clone());
        if let Some(hit) = self.cache.lock().get(&key) {
            debug!(document = %document.id, "index cache hit");
            return Ok(Arc::clone(hit));
        }
        let built = Arc::new(DocumentIndexes::build(
            &document.chunks,
            &document.embeddings,
        )?);
        info!(
            document = %document.id,
            chunks = document.len(),
            "built document indices"
        );
        self.cache.lock().put(key, Arc::clone(&built));
        Ok(built)
    }
}

fn check_corpus(id: &str, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
    if chunks.is_empty() || embeddings.is_empty() {
        return Err(Error::NoIndexedContent(id.to_string()));
    }
    if chunks.len() != embeddings.len() {
        return Err(Error::CorpusMisaligned {
            chunks: chunks.len(),
            embeddings: embeddings.len(),
        });
    }
    Ok(())
}

fn resolve(fused: &[SearchHit], chunks: &[Chunk]) -> Vec<Passage> {
    let mut dropped = 0usize;
    let passages: Vec<Passage> = fused
        .iter()
        .filter_map(|hit| match chunks.get(hit.chunk_id) {
            Some(chunk) => Some(Passage {
                chunk_id: chunk.id,
                text: chunk.text.clone(),
                page: chunk.page,
                fused_score: hit.score,
            }),
            None => {
                dropped += 1;
                None
            }
        })
        .collect();
    if dropped > 0 {
        warn!(
            dropped,
            corpus = chunks.len(),
            "fused ids beyond the chunk sequence dropped"
        );
    }
    passages
}
