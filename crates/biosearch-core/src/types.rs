//! Domain types shared by the index adapter, the retrieval gateway and the
//! grounded-answer engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashMap;

/// A paper record as stored in the document index.
///
/// Immutable once retrieved; the engine only ever reads these. Field
/// normalization (column-name variants, BOMs, stray whitespace) happens once
/// at ingestion, never here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub authors: String,
    #[serde(default)]
    pub keywords: String,
    pub year: Option<i32>,
    pub organism: Option<String>,
    pub mission: Option<String>,
    pub environment: Option<String>,
    pub source: Option<String>,
    pub doi: Option<String>,
    pub url: String,
    #[serde(default)]
    pub has_doi: bool,
    #[serde(default)]
    pub has_osdr: bool,
}

impl Document {
    /// Identity used to detect duplicates across cascade stages.
    /// Case-sensitive exact match on both components.
    pub fn identity_key(&self) -> (String, String) {
        (self.title.clone(), self.url.clone())
    }
}

/// A user-facing retrieval request. Constructed per request, never persisted.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub free_text: String,
    /// Facet name -> selected values. Unknown facet names are dropped by the
    /// query builder with a warning.
    pub facets: BTreeMap<String, Vec<String>>,
    pub ranges: Vec<RangeFilter>,
    pub flags: Vec<FlagFilter>,
    pub page_size: usize,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct RangeFilter {
    pub field: String,
    pub gte: Option<i64>,
    pub lte: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct FlagFilter {
    pub field: String,
    pub value: bool,
}

/// Searchable fields of the paper schema, so clause construction never
/// guesses at field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Title,
    Abstract,
    Authors,
    Keywords,
    Organism,
    Mission,
    Environment,
    Source,
}

impl SearchField {
    pub fn name(self) -> &'static str {
        match self {
            SearchField::Title => "title",
            SearchField::Abstract => "abstract",
            SearchField::Authors => "authors",
            SearchField::Keywords => "keywords",
            SearchField::Organism => "organism",
            SearchField::Mission => "mission",
            SearchField::Environment => "environment",
            SearchField::Source => "source",
        }
    }

    /// Keyword fields hold a single untokenized value; text fields are
    /// analyzed and support fuzzy/phrase matching.
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            SearchField::Organism
                | SearchField::Mission
                | SearchField::Environment
                | SearchField::Source
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WeightedField {
    pub field: SearchField,
    pub weight: f32,
}

/// One scoring clause of a structured query.
#[derive(Debug, Clone)]
pub enum Clause {
    /// Field-weighted match of every query term, with optional per-term
    /// fuzziness. All terms must match within at least one field.
    MultiMatch {
        text: String,
        fields: Vec<WeightedField>,
        fuzzy: bool,
    },
    /// Looser variant: any term in any field produces a hit.
    BestFields {
        text: String,
        fields: Vec<WeightedField>,
    },
    /// Per-term fuzzy match against a single field.
    Fuzzy { field: SearchField, text: String },
    /// Exact phrase, used as a ranking boost for near-exact matches.
    Phrase {
        field: SearchField,
        text: String,
        boost: f32,
    },
    /// Matches documents carrying any of the given values in any of the
    /// given fields. The single-facet broaden policy is built from this.
    AnyOf {
        values: Vec<String>,
        fields: Vec<SearchField>,
    },
    MatchAll,
}

/// Hard filters. Always enforced; never contribute to the score and never
/// loosened by stages 1-2 of the relaxation cascade.
#[derive(Debug, Clone)]
pub enum Filter {
    YearRange { gte: Option<i64>, lte: Option<i64> },
    HasDoi(bool),
    HasOsdr(bool),
}

/// Backend-agnostic query representation handed to the index adapter.
///
/// `must` clauses are ANDed and required; `should` clauses only reorder,
/// they never eliminate a document once a `must` clause matched it.
#[derive(Debug, Clone, Default)]
pub struct StructuredQuery {
    pub must: Vec<Clause>,
    pub should: Vec<Clause>,
    pub filters: Vec<Filter>,
    pub page_size: usize,
    pub offset: usize,
    pub highlight: bool,
}

/// A single ranked hit.
///
/// Ordering invariant: pages are sorted by `score` descending, ties broken
/// by `document.year` descending (missing year last).
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub document: Document,
    pub score: f32,
    pub highlights: HashMap<String, Vec<String>>,
}

/// What the index adapter returns for one structured query.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub total: usize,
    pub hits: Vec<RetrievalResult>,
}

/// The retrieval gateway's final product: one deduplicated ranked page.
#[derive(Debug, Clone, Default)]
pub struct RetrievalOutcome {
    pub total: usize,
    pub results: Vec<RetrievalResult>,
    /// True when the universal fallback tier produced these results, i.e.
    /// nothing matched the actual request.
    pub fallback: bool,
    /// Set only when even the fallback tier failed; results are then empty.
    pub degraded: Option<String>,
}

/// Value -> document-count aggregations for the faceted UI.
#[derive(Debug, Clone, Default)]
pub struct FacetCounts {
    pub organisms: Vec<(String, u64)>,
    pub missions: Vec<(String, u64)>,
    pub environments: Vec<(String, u64)>,
    pub sources: Vec<(String, u64)>,
    pub years: Vec<(i32, u64)>,
}

/// One citeable source of a generated answer. `index` is 1-based and matches
/// the inline `[#]` markers; index `i` always names the `i`-th document of
/// the context block handed to the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub index: usize,
    pub title: String,
    pub url: String,
    pub year: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_key_is_case_sensitive() {
        let a = Document {
            title: "Mice in Orbit".into(),
            url: "https://example.org/a".into(),
            ..Document::default()
        };
        let b = Document {
            title: "mice in orbit".into(),
            url: "https://example.org/a".into(),
            ..Document::default()
        };
        assert_ne!(a.identity_key(), b.identity_key());
        assert_eq!(a.identity_key(), a.clone().identity_key());
    }

    #[test]
    fn keyword_fields_are_flagged() {
        assert!(SearchField::Organism.is_keyword());
        assert!(SearchField::Mission.is_keyword());
        assert!(!SearchField::Title.is_keyword());
        assert!(!SearchField::Abstract.is_keyword());
    }
}
