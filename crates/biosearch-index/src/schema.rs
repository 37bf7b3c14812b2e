//! Paper schema and tokenizer registration.
//!
//! Text fields (title, abstract, authors, keywords) run through a
//! lowercasing, stop-word-stripping analyzer; categorical fields are raw
//! keyword strings; `year` is a stored fast field so the recency tweak and
//! the tie-break sort can read it cheaply.

use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, FAST, INDEXED, STORED,
    STRING,
};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

use biosearch_core::types::SearchField;

pub const TOKENIZER_NAME: &str = "text_with_stopwords";

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "will", "with", "or", "but", "not", "this",
    "these", "they", "them", "their", "there", "then", "than", "so", "if", "when", "where", "why",
    "how", "what", "which", "who", "whom", "whose", "can", "could", "should", "would", "may",
    "might", "must", "shall", "do", "does", "did", "have", "had", "having",
];

/// Resolved field handles, looked up once at open time.
#[derive(Debug, Clone)]
pub struct PaperFields {
    pub id: Field,
    pub title: Field,
    pub abstract_text: Field,
    pub authors: Field,
    pub keywords: Field,
    pub organism: Field,
    pub mission: Field,
    pub environment: Field,
    pub source: Field,
    pub doi: Field,
    pub url: Field,
    pub year: Field,
    pub has_doi: Field,
    pub has_osdr: Field,
}

impl PaperFields {
    pub fn from_schema(schema: &Schema) -> tantivy::Result<Self> {
        Ok(Self {
            id: schema.get_field("id")?,
            title: schema.get_field("title")?,
            abstract_text: schema.get_field("abstract")?,
            authors: schema.get_field("authors")?,
            keywords: schema.get_field("keywords")?,
            organism: schema.get_field("organism")?,
            mission: schema.get_field("mission")?,
            environment: schema.get_field("environment")?,
            source: schema.get_field("source")?,
            doi: schema.get_field("doi")?,
            url: schema.get_field("url")?,
            year: schema.get_field("year")?,
            has_doi: schema.get_field("has_doi")?,
            has_osdr: schema.get_field("has_osdr")?,
        })
    }

    pub fn resolve(&self, field: SearchField) -> Field {
        match field {
            SearchField::Title => self.title,
            SearchField::Abstract => self.abstract_text,
            SearchField::Authors => self.authors,
            SearchField::Keywords => self.keywords,
            SearchField::Organism => self.organism,
            SearchField::Mission => self.mission,
            SearchField::Environment => self.environment,
            SearchField::Source => self.source,
        }
    }
}

pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    let text_indexing = TextFieldIndexing::default()
        .set_tokenizer(TOKENIZER_NAME)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let text_options = TextOptions::default()
        .set_indexing_options(text_indexing)
        .set_stored();

    schema_builder.add_text_field("id", STRING | STORED);
    schema_builder.add_text_field("title", text_options.clone());
    schema_builder.add_text_field("abstract", text_options.clone());
    schema_builder.add_text_field("authors", text_options.clone());
    schema_builder.add_text_field("keywords", text_options);
    schema_builder.add_text_field("organism", STRING | STORED);
    schema_builder.add_text_field("mission", STRING | STORED);
    schema_builder.add_text_field("environment", STRING | STORED);
    schema_builder.add_text_field("source", STRING | STORED);
    schema_builder.add_text_field("doi", STRING | STORED);
    schema_builder.add_text_field("url", STRING | STORED);
    schema_builder.add_i64_field("year", INDEXED | STORED | FAST);
    schema_builder.add_bool_field("has_doi", INDEXED | STORED);
    schema_builder.add_bool_field("has_osdr", INDEXED | STORED);
    schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
    let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(StopWordFilter::remove(
            STOP_WORDS.iter().map(|s| (*s).to_string()),
        ))
        .build();
    index.tokenizers().register(TOKENIZER_NAME, tokenizer);
}

/// Query-side analysis matching the indexed text fields: lowercase,
/// alphanumeric runs only, stop words removed. Keeps term queries and
/// phrase queries aligned with what the analyzer put in the index.
pub fn analyze(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}
