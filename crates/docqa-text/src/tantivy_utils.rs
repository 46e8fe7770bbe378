use std::str::CharIndices;

use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED};
use tantivy::tokenizer::{LowerCaser, TextAnalyzer, Token, TokenStream, Tokenizer};
use tantivy::Index;

pub const TOKENIZER_NAME: &str = "whitespace_lower";

pub struct ChunkFields {
    pub chunk_id: Field,
    pub text: Field,
}

pub fn build_schema() -> (Schema, ChunkFields) {
    let mut schema_builder = Schema::builder();
    let chunk_id = schema_builder.add_u64_field("chunk_id", STORED);
    let text_field_indexing = TextFieldIndexing::default()
        .set_tokenizer(TOKENIZER_NAME)
        .set_index_option(IndexRecordOption::WithFreqs);
    let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
    let text = schema_builder.add_text_field("text", text_options);
    (schema_builder.build(), ChunkFields { chunk_id, text })
}

/// Splits on any Unicode whitespace (`char::is_whitespace`), so no-break and
/// em spaces separate terms like ordinary spaces do.
#[derive(Clone, Default)]
pub struct UnicodeWhitespaceTokenizer {
    token: Token,
}

pub struct UnicodeWhitespaceTokenStream<'a> {
    text: &'a str,
    chars: CharIndices<'a>,
    token: &'a mut Token,
}

impl Tokenizer for UnicodeWhitespaceTokenizer {
    type TokenStream<'a> = UnicodeWhitespaceTokenStream<'a>;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> UnicodeWhitespaceTokenStream<'a> {
        self.token.reset();
        UnicodeWhitespaceTokenStream {
            text,
            chars: text.char_indices(),
            token: &mut self.token,
        }
    }
}

impl UnicodeWhitespaceTokenStream<'_> {
    fn search_token_end(&mut self) -> usize {
        (&mut self.chars)
            .filter(|(_, c)| c.is_whitespace())
            .map(|(offset, _)| offset)
            .next()
            .unwrap_or(self.text.len())
    }
}

impl TokenStream for UnicodeWhitespaceTokenStream<'_> {
    fn advance(&mut self) -> bool {
        self.token.text.clear();
        self.token.position = self.token.position.wrapping_add(1);
        while let Some((offset_from, c)) = self.chars.next() {
            if !c.is_whitespace() {
                let offset_to = self.search_token_end();
                self.token.offset_from = offset_from;
                self.token.offset_to = offset_to;
                self.token.text.push_str(&self.text[offset_from..offset_to]);
                return true;
            }
        }
        false
    }

    fn token(&self) -> &Token {
        self.token
    }

    fn token_mut(&mut self) -> &mut Token {
        self.token
    }
}

/// No stemming and no stop words: terms are exactly the lower-cased
/// whitespace-separated pieces of the text.
pub fn analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(UnicodeWhitespaceTokenizer::default())
        .filter(LowerCaser)
        .build()
}

pub fn register_tokenizer(index: &Index) {
    index.tokenizers().register(TOKENIZER_NAME, analyzer());
}

/// Tokenize with the same analyzer used for indexing.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut analyzer = analyzer();
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    while stream.advance() {
        tokens.push(stream.token().text.clone());
    }
    tokens
}
