use std::collections::BTreeMap;
use std::path::Path;

use tantivy::collector::{Count, DocSetCollector, TopDocs};
use tantivy::schema::Value;
use tantivy::snippet::SnippetGenerator;
use tantivy::{DocId, Index, IndexReader, Score, SegmentReader, TantivyDocument};

use biosearch_core::config::{IndexConfig, RecencyConfig, SearchTuning};
use biosearch_core::error::{Error, Result};
use biosearch_core::traits::DocumentIndex;
use biosearch_core::types::{Document, FacetCounts, RetrievalResult, SearchPage, StructuredQuery};

use crate::compile::QueryCompiler;
use crate::schema::{build_schema, register_tokenizer, PaperFields};

// ES-style highlight fragment sizes
const TITLE_FRAGMENT_CHARS: usize = 100;
const ABSTRACT_FRAGMENT_CHARS: usize = 150;

/// Tantivy-backed document index adapter.
///
/// Owns the index storage and the scoring contract: weighted text relevance
/// from the compiled query plus an additive gaussian recency boost read off
/// the `year` fast field. Pages come back sorted by score descending, ties
/// by year descending.
pub struct PaperIndex {
    index: Index,
    reader: IndexReader,
    fields: PaperFields,
    recency: RecencyConfig,
    origin_year: i32,
    fuzzy_max_distance: u8,
    writer_heap_bytes: usize,
}

impl PaperIndex {
    /// Create a fresh index at `config.dir`, wiping whatever was there.
    pub fn create(config: &IndexConfig, recency: &RecencyConfig, tuning: &SearchTuning) -> Result<Self> {
        let dir = Path::new(&config.dir);
        if dir.exists() {
            std::fs::remove_dir_all(dir).map_err(unavailable)?;
        }
        std::fs::create_dir_all(dir).map_err(unavailable)?;
        let index = Index::create_in_dir(dir, build_schema()).map_err(unavailable)?;
        Self::from_index(index, config, recency, tuning)
    }

    /// Open an existing index at `config.dir`.
    pub fn open(config: &IndexConfig, recency: &RecencyConfig, tuning: &SearchTuning) -> Result<Self> {
        let index = Index::open_in_dir(Path::new(&config.dir)).map_err(unavailable)?;
        Self::from_index(index, config, recency, tuning)
    }

    fn from_index(
        index: Index,
        config: &IndexConfig,
        recency: &RecencyConfig,
        tuning: &SearchTuning,
    ) -> Result<Self> {
        register_tokenizer(&index);
        let fields = PaperFields::from_schema(&index.schema()).map_err(unavailable)?;
        let reader = index.reader().map_err(unavailable)?;
        Ok(Self {
            index,
            reader,
            fields,
            recency: recency.clone(),
            origin_year: recency.resolved_origin(),
            fuzzy_max_distance: tuning.fuzzy_max_distance,
            writer_heap_bytes: config.writer_heap_bytes,
        })
    }

    /// Write a batch of documents and commit. Empty optional fields are
    /// simply absent from the stored document.
    pub fn add_documents(&self, documents: &[Document]) -> Result<usize> {
        let mut writer = self
            .index
            .writer(self.writer_heap_bytes)
            .map_err(unavailable)?;
        for document in documents {
            writer.add_document(self.to_tantivy(document)).map_err(unavailable)?;
        }
        writer.commit().map_err(unavailable)?;
        self.reader.reload().map_err(unavailable)?;
        tracing::info!(count = documents.len(), "indexed documents");
        Ok(documents.len())
    }

    fn to_tantivy(&self, document: &Document) -> TantivyDocument {
        let mut doc = TantivyDocument::default();
        doc.add_text(self.fields.id, &document.id);
        doc.add_text(self.fields.title, &document.title);
        doc.add_text(self.fields.abstract_text, &document.abstract_text);
        doc.add_text(self.fields.authors, &document.authors);
        doc.add_text(self.fields.keywords, &document.keywords);
        doc.add_text(self.fields.url, &document.url);
        if let Some(year) = document.year {
            doc.add_i64(self.fields.year, i64::from(year));
        }
        for (field, value) in [
            (self.fields.organism, &document.organism),
            (self.fields.mission, &document.mission),
            (self.fields.environment, &document.environment),
            (self.fields.source, &document.source),
            (self.fields.doi, &document.doi),
        ] {
            if let Some(value) = value {
                doc.add_text(field, value);
            }
        }
        doc.add_bool(self.fields.has_doi, document.has_doi);
        doc.add_bool(self.fields.has_osdr, document.has_osdr);
        doc
    }

    fn restore(&self, doc: &TantivyDocument) -> Document {
        let text = |field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let optional = |field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Document {
            id: text(self.fields.id),
            title: text(self.fields.title),
            abstract_text: text(self.fields.abstract_text),
            authors: text(self.fields.authors),
            keywords: text(self.fields.keywords),
            year: doc
                .get_first(self.fields.year)
                .and_then(|v| v.as_i64())
                .map(|y| y as i32),
            organism: optional(self.fields.organism),
            mission: optional(self.fields.mission),
            environment: optional(self.fields.environment),
            source: optional(self.fields.source),
            doi: optional(self.fields.doi),
            url: text(self.fields.url),
            has_doi: doc
                .get_first(self.fields.has_doi)
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            has_osdr: doc
                .get_first(self.fields.has_osdr)
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        }
    }

    fn highlighters(
        &self,
        searcher: &tantivy::Searcher,
        query: &dyn tantivy::query::Query,
    ) -> (Option<SnippetGenerator>, Option<SnippetGenerator>) {
        let title = SnippetGenerator::create(searcher, query, self.fields.title)
            .ok()
            .map(|mut g| {
                g.set_max_num_chars(TITLE_FRAGMENT_CHARS);
                g
            });
        let abstract_ = SnippetGenerator::create(searcher, query, self.fields.abstract_text)
            .ok()
            .map(|mut g| {
                g.set_max_num_chars(ABSTRACT_FRAGMENT_CHARS);
                g
            });
        (title, abstract_)
    }
}

impl DocumentIndex for PaperIndex {
    fn search(&self, query: &StructuredQuery) -> Result<SearchPage> {
        let searcher = self.reader.searcher();
        let compiler = QueryCompiler::new(&self.fields, self.fuzzy_max_distance);
        let compiled = compiler.compile(query);

        let page_size = query.page_size.max(1);
        let recency = self.recency.clone();
        let origin = self.origin_year;
        let collector = TopDocs::with_limit(page_size)
            .and_offset(query.offset)
            .tweak_score(move |segment_reader: &SegmentReader| {
                let years = segment_reader.fast_fields().i64("year").ok();
                let recency = recency.clone();
                move |doc: DocId, score: Score| {
                    let boost = years
                        .as_ref()
                        .and_then(|column| column.first(doc))
                        .map_or(0.0, |year| recency.boost(origin, year as i32));
                    score + boost
                }
            });

        let (total, top_docs) = searcher
            .search(&compiled, &(Count, collector))
            .map_err(unavailable)?;

        let (title_snippets, abstract_snippets) = if query.highlight {
            self.highlighters(&searcher, &*compiled)
        } else {
            (None, None)
        };

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address).map_err(unavailable)?;
            let mut highlights = std::collections::HashMap::new();
            if let Some(generator) = &title_snippets {
                let html = generator.snippet_from_doc(&doc).to_html();
                if !html.is_empty() {
                    highlights.insert("title".to_string(), vec![html]);
                }
            }
            if let Some(generator) = &abstract_snippets {
                let html = generator.snippet_from_doc(&doc).to_html();
                if !html.is_empty() {
                    highlights.insert("abstract".to_string(), vec![html]);
                }
            }
            hits.push(RetrievalResult {
                document: self.restore(&doc),
                score,
                highlights,
            });
        }

        // score descending, ties by year descending, missing year last
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.document
                        .year
                        .unwrap_or(i32::MIN)
                        .cmp(&a.document.year.unwrap_or(i32::MIN))
                })
        });

        Ok(SearchPage { total, hits })
    }

    fn recent(&self, limit: usize) -> Result<SearchPage> {
        let searcher = self.reader.searcher();
        let collector =
            TopDocs::with_limit(limit.max(1)).tweak_score(move |segment_reader: &SegmentReader| {
                let years = segment_reader.fast_fields().i64("year").ok();
                move |doc: DocId, _score: Score| {
                    years
                        .as_ref()
                        .and_then(|column| column.first(doc))
                        .unwrap_or(i64::MIN)
                }
            });
        let (total, top_docs) = searcher
            .search(&tantivy::query::AllQuery, &(Count, collector))
            .map_err(unavailable)?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (_year, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address).map_err(unavailable)?;
            hits.push(RetrievalResult {
                document: self.restore(&doc),
                score: 0.0,
                highlights: std::collections::HashMap::new(),
            });
        }
        Ok(SearchPage { total, hits })
    }

    fn facet_counts(&self) -> Result<FacetCounts> {
        let searcher = self.reader.searcher();
        let addresses = searcher
            .search(&tantivy::query::AllQuery, &DocSetCollector)
            .map_err(unavailable)?;

        let mut organisms: BTreeMap<String, u64> = BTreeMap::new();
        let mut missions: BTreeMap<String, u64> = BTreeMap::new();
        let mut environments: BTreeMap<String, u64> = BTreeMap::new();
        let mut sources: BTreeMap<String, u64> = BTreeMap::new();
        let mut years: BTreeMap<i32, u64> = BTreeMap::new();

        for address in addresses {
            let doc: TantivyDocument = searcher.doc(address).map_err(unavailable)?;
            let document = self.restore(&doc);
            for (bucket, value) in [
                (&mut organisms, document.organism),
                (&mut missions, document.mission),
                (&mut environments, document.environment),
                (&mut sources, document.source),
            ] {
                if let Some(value) = value {
                    *bucket.entry(value).or_insert(0) += 1;
                }
            }
            if let Some(year) = document.year {
                *years.entry(year).or_insert(0) += 1;
            }
        }

        Ok(FacetCounts {
            organisms: by_count_desc(organisms),
            missions: by_count_desc(missions),
            environments: by_count_desc(environments),
            sources: by_count_desc(sources),
            years: years.into_iter().collect(),
        })
    }
}

fn by_count_desc(bucket: BTreeMap<String, u64>) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> = bucket.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries
}

fn unavailable(e: impl std::fmt::Display) -> Error {
    Error::IndexUnavailable(e.to_string())
}
