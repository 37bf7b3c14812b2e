//! The retrieval façade: query building, the relaxation cascade and
//! deduplication behind one `retrieve` call.

use biosearch_core::config::SearchTuning;
use biosearch_core::error::Result;
use biosearch_core::traits::DocumentIndex;
use biosearch_core::types::{FacetCounts, Query, RetrievalOutcome, RetrievalResult};

use crate::builder::QueryBuilder;
use crate::dedup::Deduplicator;

/// Runs up to three progressively looser queries until a stage target is
/// met, merging stages through the deduplicator. Callers never get a hard
/// empty response while the corpus has documents: the last tier returns the
/// most recent papers with `fallback = true`.
pub struct RetrievalGateway<I: DocumentIndex> {
    index: I,
    builder: QueryBuilder,
    tuning: SearchTuning,
}

impl<I: DocumentIndex> RetrievalGateway<I> {
    pub fn new(index: I, tuning: SearchTuning) -> Self {
        Self {
            index,
            builder: QueryBuilder::new(tuning.clone()),
            tuning,
        }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn facet_counts(&self) -> Result<FacetCounts> {
        self.index.facet_counts()
    }

    pub fn retrieve(&self, query: &Query) -> RetrievalOutcome {
        let page_size = self.builder.effective_page_size(query);
        let target = self.tuning.stage_target(page_size);

        let mut dedup = Deduplicator::new();
        let mut results: Vec<RetrievalResult> = Vec::new();
        let mut total = 0usize;

        // stage 1: the query exactly as built
        let primary = self.builder.build(query);
        match self.index.search(&primary) {
            Ok(page) => {
                total = page.total;
                let kept = dedup.merge(&mut results, page.hits);
                tracing::debug!(total, kept, "primary stage");
            }
            Err(e) => {
                tracing::warn!(error = %e, "primary search failed, relaxing");
            }
        }

        // stage 2: looser text matching; pointless without free text
        if results.len() < target && !query.free_text.trim().is_empty() {
            let relaxed = self.builder.build_relaxed(query);
            match self.index.search(&relaxed) {
                Ok(page) => {
                    total = total.max(page.total);
                    let kept = dedup.merge(&mut results, page.hits);
                    tracing::debug!(kept, "relaxed stage");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "relaxed search failed");
                }
            }
        }

        // stage 3: recency-sorted fallback, only when nothing matched at all
        if results.is_empty() {
            tracing::info!("no matches, returning most recent documents");
            return match self.index.recent(self.tuning.fallback_cap) {
                Ok(page) => {
                    dedup.merge(&mut results, page.hits);
                    RetrievalOutcome {
                        total: results.len(),
                        results,
                        fallback: true,
                        degraded: None,
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "fallback search failed");
                    RetrievalOutcome {
                        total: 0,
                        results: Vec::new(),
                        fallback: true,
                        degraded: Some(e.to_string()),
                    }
                }
            };
        }

        results.truncate(page_size);
        RetrievalOutcome {
            total,
            results,
            fallback: false,
            degraded: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biosearch_core::error::Error;
    use biosearch_core::types::{Document, SearchPage, StructuredQuery};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted index: pops one canned response per `search` call.
    struct ScriptedIndex {
        responses: Mutex<Vec<Result<SearchPage>>>,
        recent: Result<SearchPage>,
    }

    impl ScriptedIndex {
        fn new(responses: Vec<Result<SearchPage>>, recent: Result<SearchPage>) -> Self {
            Self {
                responses: Mutex::new(responses),
                recent,
            }
        }
    }

    impl DocumentIndex for ScriptedIndex {
        fn search(&self, _query: &StructuredQuery) -> Result<SearchPage> {
            let mut responses = self.responses.lock().expect("lock");
            if responses.is_empty() {
                return Ok(SearchPage::default());
            }
            responses.remove(0)
        }

        fn recent(&self, _limit: usize) -> Result<SearchPage> {
            match &self.recent {
                Ok(page) => Ok(page.clone()),
                Err(e) => Err(Error::IndexUnavailable(e.to_string())),
            }
        }

        fn facet_counts(&self) -> Result<FacetCounts> {
            Ok(FacetCounts::default())
        }
    }

    fn page(titles: &[&str]) -> SearchPage {
        let hits: Vec<RetrievalResult> = titles
            .iter()
            .enumerate()
            .map(|(i, t)| RetrievalResult {
                document: Document {
                    title: (*t).to_string(),
                    url: format!("https://example.org/{t}"),
                    ..Document::default()
                },
                score: 10.0 - i as f32,
                highlights: HashMap::new(),
            })
            .collect();
        SearchPage {
            total: hits.len(),
            hits,
        }
    }

    fn text_query(text: &str) -> Query {
        Query {
            free_text: text.to_string(),
            ..Query::default()
        }
    }

    #[test]
    fn cascade_stops_at_primary_when_target_met() {
        let index = ScriptedIndex::new(
            vec![
                Ok(page(&["a", "b", "c", "d", "e", "f"])),
                // would panic the test if consumed: script exhausted below
            ],
            Ok(page(&["recent"])),
        );
        let gateway = RetrievalGateway::new(index, SearchTuning::default());
        let outcome = gateway.retrieve(&text_query("bone"));
        assert_eq!(outcome.results.len(), 6);
        assert!(!outcome.fallback);
        // a single scripted response was enough
        assert!(gateway.index().responses.lock().unwrap().is_empty());
    }

    #[test]
    fn thin_primary_results_are_topped_up_by_relaxed_stage() {
        let index = ScriptedIndex::new(
            vec![
                Ok(page(&["a", "b"])),
                Ok(page(&["b", "c", "d"])), // "b" is a duplicate
            ],
            Ok(page(&["recent"])),
        );
        let gateway = RetrievalGateway::new(index, SearchTuning::default());
        let outcome = gateway.retrieve(&text_query("bone"));
        let titles: Vec<&str> = outcome
            .results
            .iter()
            .map(|h| h.document.title.as_str())
            .collect();
        assert_eq!(titles, vec!["a", "b", "c", "d"]);
        assert!(!outcome.fallback);
    }

    #[test]
    fn facet_only_query_skips_relaxed_stage() {
        let index = ScriptedIndex::new(
            vec![Ok(page(&["a"])), Ok(page(&["should-not-be-consumed"]))],
            Ok(page(&["recent"])),
        );
        let gateway = RetrievalGateway::new(index, SearchTuning::default());
        let mut query = Query::default();
        query
            .facets
            .insert("organism".to_string(), vec!["Mouse".to_string()]);
        let outcome = gateway.retrieve(&query);
        assert_eq!(outcome.results.len(), 1);
        // the relaxed response must still be sitting in the script
        assert_eq!(gateway.index().responses.lock().unwrap().len(), 1);
    }

    #[test]
    fn empty_accumulation_triggers_recency_fallback() {
        let index = ScriptedIndex::new(
            vec![Ok(page(&[])), Ok(page(&[]))],
            Ok(page(&["newest", "older"])),
        );
        let gateway = RetrievalGateway::new(index, SearchTuning::default());
        let outcome = gateway.retrieve(&text_query("qzxv nonsense"));
        assert!(outcome.fallback);
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.degraded.is_none());
    }

    #[test]
    fn index_failure_everywhere_degrades_to_flagged_empty() {
        let index = ScriptedIndex::new(
            vec![
                Err(Error::IndexUnavailable("down".to_string())),
                Err(Error::IndexUnavailable("down".to_string())),
            ],
            Err(Error::IndexUnavailable("still down".to_string())),
        );
        let gateway = RetrievalGateway::new(index, SearchTuning::default());
        let outcome = gateway.retrieve(&text_query("anything"));
        assert!(outcome.results.is_empty());
        assert!(outcome.fallback);
        assert!(outcome.degraded.is_some());
    }
}
