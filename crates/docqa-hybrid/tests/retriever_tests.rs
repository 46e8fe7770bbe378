use std::sync::Arc;
use std::time::Duration;

use docqa_core::config::RetrievalSettings;
use docqa_core::data_processor::{ChunkingConfig, DataProcessor};
use docqa_core::session::SessionStore;
use docqa_core::traits::{Embedder, TextSearcher};
use docqa_core::types::{Chunk, Degradation, Document, SearchHit};
use docqa_core::Error;
use docqa_embed::{BatchPolicy, BatchingEmbedder, HashEmbedder};
use docqa_hybrid::{Ingestor, Retriever};
use docqa_text::Bm25Index;
use docqa_vector::FlatIpIndex;

/// Returns the same query vector for every text.
struct FixedEmbedder {
    vector: Vec<f32>,
}

impl FixedEmbedder {
    fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }
}

impl Embedder for FixedEmbedder {
    fn id(&self) -> &str {
        "fixed"
    }

    fn dim(&self) -> usize {
        self.vector.len()
    }

    fn max_batch(&self) -> usize {
        64
    }

    fn embed_batch(&self, texts: &[String]) -> docqa_core::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| self.vector.clone()).collect())
    }
}

struct DownEmbedder;

impl Embedder for DownEmbedder {
    fn id(&self) -> &str {
        "down"
    }

    fn dim(&self) -> usize {
        3
    }

    fn max_batch(&self) -> usize {
        64
    }

    fn embed_batch(&self, _texts: &[String]) -> docqa_core::Result<Vec<Vec<f32>>> {
        Err(Error::provider("service unavailable"))
    }
}

struct BrokenText;

impl TextSearcher for BrokenText {
    fn len(&self) -> usize {
        3
    }

    fn search(&self, _query: &str, _k: usize) -> docqa_core::Result<Vec<SearchHit>> {
        Err(Error::Index("segment unreadable".to_string()))
    }
}

fn recipes() -> Vec<Chunk> {
    ["apple pie recipe", "banana bread recipe", "car engine repair"]
        .iter()
        .enumerate()
        .map(|(i, t)| Chunk::new(i, *t))
        .collect()
}

fn axes() -> Vec<Vec<f32>> {
    vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]]
}

/// Dense ranking for this query is [2, 1, 0].
fn leaning_to_engines() -> Arc<dyn Embedder> {
    Arc::new(FixedEmbedder::new(vec![0.0, 0.5, 1.0]))
}

fn settings() -> RetrievalSettings {
    RetrievalSettings::default()
}

fn ids(retrieval: &docqa_core::types::Retrieval) -> Vec<usize> {
    retrieval.passages.iter().map(|p| p.chunk_id).collect()
}

#[test]
fn passages_follow_fused_order() {
    let retriever = Retriever::new(leaning_to_engines(), settings()).expect("retriever");
    let out = retriever
        .retrieve("recipe for bread", &recipes(), &axes())
        .expect("retrieve");

    // dense [2, 1, 0] + sparse [1, 0, 2]
    assert_eq!(ids(&out), vec![1, 2, 0]);
    assert_eq!(
        out.texts(),
        vec!["banana bread recipe", "car engine repair", "apple pie recipe"]
    );
    assert_eq!(out.question, "recipe for bread");
    assert!(!out.is_degraded());
    let expected = (1.0f64 / 61.0 + 1.0 / 60.0) as f32;
    assert!((out.passages[0].fused_score - expected).abs() < 1e-6);
}

#[test]
fn final_k_bounds_the_passages() {
    let settings = RetrievalSettings {
        final_k: 2,
        ..settings()
    };
    let retriever = Retriever::new(leaning_to_engines(), settings).expect("retriever");
    let out = retriever
        .retrieve("recipe for bread", &recipes(), &axes())
        .expect("retrieve");
    assert_eq!(ids(&out), vec![1, 2]);
}

#[test]
fn hash_embeddings_end_to_end() {
    let embedder = HashEmbedder::new(256);
    let chunks = recipes();
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).expect("embed");

    let retriever = Retriever::new(Arc::new(embedder), settings()).expect("retriever");
    let first = retriever
        .retrieve("recipe for bread", &chunks, &embeddings)
        .expect("retrieve");
    let again = retriever
        .retrieve("recipe for bread", &chunks, &embeddings)
        .expect("retrieve");

    assert_eq!(first, again);
    let mut seen = ids(&first);
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1, 2]);
}

#[test]
fn empty_document_has_no_indexed_content() {
    let retriever = Retriever::new(leaning_to_engines(), settings()).expect("retriever");
    assert!(matches!(
        retriever.retrieve("q", &[], &[]),
        Err(Error::NoIndexedContent(_))
    ));
    assert!(matches!(
        retriever.retrieve("q", &recipes(), &[]),
        Err(Error::NoIndexedContent(_))
    ));
}

#[test]
fn misaligned_embeddings_are_rejected() {
    let retriever = Retriever::new(leaning_to_engines(), settings()).expect("retriever");
    let err = retriever.retrieve("q", &recipes(), &axes()[..2]).unwrap_err();
    assert!(matches!(
        err,
        Error::CorpusMisaligned {
            chunks: 3,
            embeddings: 2
        }
    ));
}

#[test]
fn dense_failure_degrades_to_sparse() {
    let retriever = Retriever::new(Arc::new(DownEmbedder), settings()).expect("retriever");
    let out = retriever
        .retrieve("recipe for bread", &recipes(), &axes())
        .expect("degraded retrieval");

    assert_eq!(ids(&out), vec![1, 0, 2]);
    match out.degraded {
        Some(Degradation::DenseUnavailable(reason)) => {
            assert!(reason.contains("service unavailable"), "{reason}")
        }
        other => panic!("unexpected degradation: {other:?}"),
    }
}

#[test]
fn query_dimension_mismatch_degrades_or_fails() {
    let short_query: Arc<dyn Embedder> = Arc::new(FixedEmbedder::new(vec![1.0, 0.0]));

    let lenient = Retriever::new(Arc::clone(&short_query), settings()).expect("retriever");
    let out = lenient
        .retrieve("recipe for bread", &recipes(), &axes())
        .expect("degraded retrieval");
    assert!(matches!(out.degraded, Some(Degradation::DenseUnavailable(_))));

    let strict_settings = RetrievalSettings {
        allow_degraded: false,
        ..settings()
    };
    let strict = Retriever::new(short_query, strict_settings).expect("retriever");
    let err = strict
        .retrieve("recipe for bread", &recipes(), &axes())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::DimensionMismatch {
            expected: 3,
            actual: 2
        }
    ));
}

#[test]
fn sparse_failure_degrades_to_dense() {
    let retriever = Retriever::new(leaning_to_engines(), settings()).expect("retriever");
    let vector = FlatIpIndex::build(&axes()).expect("index");
    let out = retriever
        .retrieve_with("recipe for bread", &recipes(), &vector, &BrokenText)
        .expect("degraded retrieval");

    assert_eq!(ids(&out), vec![2, 1, 0]);
    assert!(matches!(out.degraded, Some(Degradation::SparseUnavailable(_))));
}

#[test]
fn both_methods_failing_is_an_error() {
    let retriever = Retriever::new(Arc::new(DownEmbedder), settings()).expect("retriever");
    let vector = FlatIpIndex::build(&axes()).expect("index");
    let err = retriever
        .retrieve_with("q", &recipes(), &vector, &BrokenText)
        .unwrap_err();
    assert!(matches!(err, Error::EmbeddingProvider { .. }));
}

#[test]
fn ids_beyond_the_chunk_sequence_are_dropped() {
    let retriever = Retriever::new(leaning_to_engines(), settings()).expect("retriever");
    let chunks = recipes()[..2].to_vec();
    let vector = FlatIpIndex::build(&axes()).expect("index");
    let text = Bm25Index::build(&chunks).expect("index");

    let out = retriever
        .retrieve_with("recipe for bread", &chunks, &vector, &text)
        .expect("retrieve");
    assert_eq!(ids(&out), vec![1, 0]);
}

#[test]
fn document_indices_are_cached_per_version() {
    let retriever = Retriever::new(leaning_to_engines(), settings()).expect("retriever");
    let doc = Document::new("doc-1", recipes(), axes(), vec![]).expect("document");

    let cached = retriever
        .retrieve_document("recipe for bread", &doc)
        .expect("first");
    let again = retriever
        .retrieve_document("recipe for bread", &doc)
        .expect("second");
    assert_eq!(cached, again);
    let fresh = retriever
        .retrieve("recipe for bread", &doc.chunks, &doc.embeddings)
        .expect("fresh");
    assert_eq!(cached, fresh);
    assert_eq!(retriever.cached_documents(), 1);

    let mut edited = recipes();
    edited[2].text = "bread engine".to_string();
    let revised = Document::new("doc-1", edited, axes(), vec![]).expect("document");
    assert_ne!(doc.version, revised.version);
    retriever.retrieve_document("recipe for bread", &revised).expect("revised");
    assert_eq!(retriever.cached_documents(), 2);

    retriever.clear_cache();
    assert_eq!(retriever.cached_documents(), 0);
}

#[test]
fn cached_indices_follow_changed_embeddings() {
    let retriever = Retriever::new(leaning_to_engines(), settings()).expect("retriever");
    let doc = Document::new("s1", recipes(), axes(), vec![]).expect("document");
    let before = retriever
        .retrieve_document("recipe for bread", &doc)
        .expect("first");
    assert_eq!(ids(&before), vec![1, 2, 0]);

    let mut reversed = axes();
    reversed.reverse();
    let reembedded = Document::new("s1", recipes(), reversed, vec![]).expect("document");
    assert_ne!(doc.version, reembedded.version);

    let cached = retriever
        .retrieve_document("recipe for bread", &reembedded)
        .expect("re-embedded");
    let fresh = retriever
        .retrieve("recipe for bread", &reembedded.chunks, &reembedded.embeddings)
        .expect("fresh");
    assert_eq!(cached, fresh);
    // dense [0, 1, 2] + sparse [1, 0, 2]
    assert_eq!(ids(&cached), vec![0, 1, 2]);
}

#[test]
fn cache_capacity_evicts_least_recent() {
    let settings = RetrievalSettings {
        cache_capacity: 1,
        ..settings()
    };
    let retriever = Retriever::new(leaning_to_engines(), settings).expect("retriever");
    for id in ["a", "b", "c"] {
        let doc = Document::new(id, recipes(), axes(), vec![]).expect("document");
        retriever.retrieve_document("recipe", &doc).expect("retrieve");
    }
    assert_eq!(retriever.cached_documents(), 1);
}

#[test]
fn invalid_settings_are_rejected() {
    let no_cache = RetrievalSettings {
        cache_capacity: 0,
        ..settings()
    };
    assert!(matches!(
        Retriever::new(leaning_to_engines(), no_cache),
        Err(Error::InvalidConfig(_))
    ));
    let no_damping = RetrievalSettings {
        rrf_k: 0,
        ..settings()
    };
    assert!(matches!(
        Retriever::new(leaning_to_engines(), no_damping),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn sessions_resolve_through_the_store() {
    let store = SessionStore::new(Duration::from_secs(60), 4);
    let doc = Document::new("s1", recipes(), axes(), vec!["recipes.txt".to_string()])
        .expect("document");
    store.insert("s1", doc);
    let retriever = Retriever::new(leaning_to_engines(), settings()).expect("retriever");

    let out = retriever
        .retrieve_session(&store, "s1", "recipe for bread")
        .expect("retrieve");
    assert_eq!(ids(&out), vec![1, 2, 0]);

    let err = retriever
        .retrieve_session(&store, "missing", "recipe for bread")
        .unwrap_err();
    assert!(matches!(err, Error::SessionNotFound(ref id) if id == "missing"));
}

fn ingestor<E: Embedder>(embedder: E, store: Arc<SessionStore>) -> Ingestor<E> {
    let policy = BatchPolicy {
        batch_size: 2,
        max_retries: 0,
        backoff: Duration::ZERO,
    };
    let processor = DataProcessor::with_config(ChunkingConfig {
        chunk_size: 60,
        chunk_overlap: 8,
    });
    Ingestor::new(Arc::new(BatchingEmbedder::new(embedder, policy)), processor, store)
}

const MANUAL: &str = "The pump must be primed before first use.\n\n\
Replace the filter cartridge every six months.\n\n\
Bread dough rises best in a warm kitchen.\n\n\
Store the engine oil away from heat.";

#[test]
fn ingested_upload_is_retrievable_by_session() {
    let store = Arc::new(SessionStore::new(Duration::from_secs(60), 4));
    let ingest = ingestor(HashEmbedder::new(128), Arc::clone(&store));

    let mut progress = Vec::new();
    let doc = ingest
        .ingest_with_progress("s1", "manual.txt", MANUAL, |done, total| {
            progress.push((done, total))
        })
        .expect("ingest");
    assert_eq!(doc.len(), 4);
    assert_eq!(doc.sources, vec!["manual.txt".to_string()]);
    assert_eq!(progress, vec![(2, 4), (4, 4)]);
    assert_eq!(store.len(), 1);

    let retriever =
        Retriever::new(Arc::new(HashEmbedder::new(128)), settings()).expect("retriever");
    let out = retriever
        .retrieve_session(store.as_ref(), "s1", "when does bread dough rise")
        .expect("retrieve");
    assert_eq!(out.passages.len(), 4);
    assert!(out.texts().contains(&"Bread dough rises best in a warm kitchen."));
}

#[test]
fn blank_upload_has_no_indexed_content() {
    let store = Arc::new(SessionStore::new(Duration::from_secs(60), 4));
    let ingest = ingestor(HashEmbedder::new(16), Arc::clone(&store));
    assert!(matches!(
        ingest.ingest("s1", "empty.txt", "  \n\n "),
        Err(Error::NoIndexedContent(_))
    ));
    assert!(store.is_empty());
}

#[test]
fn failed_embedding_aborts_the_upload() {
    let store = Arc::new(SessionStore::new(Duration::from_secs(60), 4));
    let ingest = ingestor(DownEmbedder, Arc::clone(&store));
    let err = ingest.ingest("s1", "manual.txt", MANUAL).unwrap_err();
    assert!(matches!(err, Error::EmbeddingProvider { batch: 0, .. }));
    assert!(store.is_empty());
}

#[test]
fn ingesting_beyond_capacity_evicts_the_oldest_session() {
    let store = Arc::new(SessionStore::new(Duration::from_secs(60), 2));
    let ingest = ingestor(HashEmbedder::new(16), Arc::clone(&store));
    for session in ["s1", "s2", "s3"] {
        ingest.ingest(session, "manual.txt", MANUAL).expect("ingest");
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(store.len(), 2);
    assert!(store.get("s1").is_none());
    assert!(store.get("s3").is_some());
}

#[test]
fn ingest_path_reads_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("manual.txt");
    std::fs::write(&path, MANUAL).expect("write");

    let store = Arc::new(SessionStore::new(Duration::from_secs(60), 4));
    let ingest = ingestor(HashEmbedder::new(16), Arc::clone(&store));
    let doc = ingest.ingest_path("s1", &path, |_, _| {}).expect("ingest");
    assert_eq!(doc.len(), 4);
    assert!(Arc::ptr_eq(&doc, &store.get("s1").expect("stored")));
}
