use std::path::Path;
use std::sync::Arc;
use tracing::info;

use docqa_core::data_processor::DataProcessor;
use docqa_core::error::{Error, Result};
use docqa_core::session::SessionStore;
use docqa_core::traits::Embedder;
use docqa_core::types::{Chunk, Document};
use docqa_embed::BatchingEmbedder;

/// Upload path: split text, embed every chunk, store the document under its
/// session and then evict expired or surplus sessions.
///
/// Embedding goes through [`BatchingEmbedder`], so a batch that keeps failing
/// aborts the upload instead of leaving chunks without vectors.
pub struct Ingestor<E> {
    embedder: Arc<BatchingEmbedder<E>>,
    processor: DataProcessor,
    store: Arc<SessionStore>,
}

impl<E: Embedder> Ingestor<E> {
    pub fn new(
        embedder: Arc<BatchingEmbedder<E>>,
        processor: DataProcessor,
        store: Arc<SessionStore>,
    ) -> Self {
        Self {
            embedder,
            processor,
            store,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn ingest(&self, session_id: &str, source_name: &str, text: &str) -> Result<Arc<Document>> {
        self.ingest_with_progress(session_id, source_name, text, |_, _| {})
    }

    /// As [`ingest`](Self::ingest), reporting `(embedded, total)` chunk counts
    /// after every batch.
    pub fn ingest_with_progress(
        &self,
        session_id: &str,
        source_name: &str,
        text: &str,
        on_batch: impl FnMut(usize, usize),
    ) -> Result<Arc<Document>> {
        let chunks = self.processor.split_text(text);
        self.store_chunks(session_id, vec![source_name.to_string()], chunks, on_batch)
    }

    /// Ingest a file, or every `.txt`/`.md` file under a directory.
    pub fn ingest_path(
        &self,
        session_id: &str,
        path: &Path,
        on_batch: impl FnMut(usize, usize),
    ) -> Result<Arc<Document>> {
        let chunks = self.processor.process_path(path)?;
        self.store_chunks(session_id, vec![path.display().to_string()], chunks, on_batch)
    }

    fn store_chunks(
        &self,
        session_id: &str,
        sources: Vec<String>,
        chunks: Vec<Chunk>,
        mut on_batch: impl FnMut(usize, usize),
    ) -> Result<Arc<Document>> {
        if chunks.is_empty() {
            return Err(Error::NoIndexedContent(session_id.to_string()));
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let total = texts.len();
        let embeddings = self
            .embedder
            .embed_with_progress(&texts, |done| on_batch(done, total))?;
        let document = Document::new(session_id, chunks, embeddings, sources)?;

        info!(
            session = session_id,
            chunks = document.len(),
            batches = self.embedder.batch_count(total),
            "document ingested"
        );
        let stored = self.store.insert(session_id, document);
        self.store.cleanup();
        Ok(stored)
    }
}
