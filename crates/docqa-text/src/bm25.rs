use std::collections::HashSet;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::debug;

use docqa_core::error::{Error, Result};
use docqa_core::traits::TextSearcher;
use docqa_core::types::{rank_hits, Chunk, ChunkId, SearchHit, SourceKind};

use crate::tantivy_utils::{build_schema, register_tokenizer, tokenize, ChunkFields};

const WRITER_HEAP_BYTES: usize = 20_000_000;

fn index_err(e: tantivy::TantivyError) -> Error {
    Error::Index(e.to_string())
}

/// BM25 index over one chunk sequence.
///
/// Every chunk is scored for every query: chunks without a matching term
/// score zero and follow the matches in corpus order, so a search returns
/// `min(k, len)` ids whatever the query.
pub struct Bm25Index {
    reader: IndexReader,
    fields: ChunkFields,
    len: usize,
}

impl Bm25Index {
    pub fn build(chunks: &[Chunk]) -> Result<Self> {
        if chunks.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);
        register_tokenizer(&index);

        // One indexing thread keeps a single segment in insertion order.
        let mut writer: IndexWriter = index
            .writer_with_num_threads(1, WRITER_HEAP_BYTES)
            .map_err(index_err)?;
        for chunk in chunks {
            writer
                .add_document(doc!(
                    fields.chunk_id => chunk.id as u64,
                    fields.text => chunk.text.clone()
                ))
                .map_err(index_err)?;
        }
        writer.commit().map_err(index_err)?;

        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(index_err)?;
        debug!(chunks = chunks.len(), "built BM25 index");
        Ok(Self {
            reader,
            fields,
            len: chunks.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Score every chunk against `question` and return the top `k`
    /// `(chunk_id, score)` pairs. Equal scores keep corpus order.
    pub fn search(&self, question: &str, k: usize) -> Result<Vec<(ChunkId, f32)>> {
        if self.len == 0 {
            return Err(Error::EmptyCorpus);
        }
        let tokens = tokenize(question);
        let mut scored = self.score_matches(&tokens)?;
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let matched: HashSet<ChunkId> = scored.iter().map(|(id, _)| *id).collect();
        scored.extend(
            (0..self.len)
                .filter(|id| !matched.contains(id))
                .map(|id| (id, 0.0)),
        );
        scored.truncate(k.min(self.len));
        debug!(
            terms = tokens.len(),
            matches = matched.len(),
            returned = scored.len(),
            "BM25 search"
        );
        Ok(scored)
    }

    fn score_matches(&self, tokens: &[String]) -> Result<Vec<(ChunkId, f32)>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        // Repeated query terms contribute once per occurrence.
        let clauses: Vec<(Occur, Box<dyn Query>)> = tokens
            .iter()
            .map(|t| {
                let term = Term::from_field_text(self.fields.text, t);
                let query: Box<dyn Query> =
                    Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
                (Occur::Should, query)
            })
            .collect();
        let query = BooleanQuery::new(clauses);

        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(self.len))
            .map_err(index_err)?;
        let mut scored = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address).map_err(index_err)?;
            let id = doc
                .get_first(self.fields.chunk_id)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| Error::Index("stored chunk id missing".to_string()))?;
            scored.push((id as ChunkId, score));
        }
        Ok(scored)
    }

    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}

impl TextSearcher for Bm25Index {
    fn len(&self) -> usize {
        self.len
    }

    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        Ok(rank_hits(Bm25Index::search(self, query, k)?, SourceKind::Text))
    }
}
