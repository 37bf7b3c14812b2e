//! Structured-query construction, including the facet broaden/narrow policy.
//!
//! One selected facet is exploratory: a single required any-of clause that
//! matches the facet's values across its own field *and* title/abstract, so
//! adjacent material surfaces. Two or more facets express intersectional
//! intent: one required clause per facet, ANDed. Hard filters (year range,
//! boolean flags) apply identically in every case.

use biosearch_core::config::SearchTuning;
use biosearch_core::types::{
    Clause, Filter, Query, SearchField, StructuredQuery, WeightedField,
};

const FACET_PHRASE_BOOST: f32 = 1.5;

pub struct QueryBuilder {
    tuning: SearchTuning,
}

impl QueryBuilder {
    pub fn new(tuning: SearchTuning) -> Self {
        Self { tuning }
    }

    /// Page size after clamping to the configured bounds. Zero means "use
    /// the default".
    pub fn effective_page_size(&self, query: &Query) -> usize {
        let requested = if query.page_size == 0 {
            self.tuning.default_page_size
        } else {
            query.page_size
        };
        requested.clamp(1, self.tuning.max_page_size)
    }

    /// Stage-1 query: exactly what the user asked for.
    pub fn build(&self, query: &Query) -> StructuredQuery {
        let mut must = Vec::new();
        let mut should = Vec::new();

        let text = query.free_text.trim();
        if !text.is_empty() {
            must.push(Clause::MultiMatch {
                text: text.to_string(),
                fields: self.weighted_text_fields(),
                fuzzy: true,
            });
            should.push(Clause::Phrase {
                field: SearchField::Title,
                text: text.to_string(),
                boost: self.tuning.title_phrase_boost,
            });
        }

        for (field, values) in Self::facet_groups(query) {
            should.extend(values.iter().map(|value| Clause::Phrase {
                field: SearchField::Title,
                text: value.clone(),
                boost: FACET_PHRASE_BOOST,
            }));
            must.push(Clause::AnyOf {
                values,
                fields: vec![field, SearchField::Title, SearchField::Abstract],
            });
        }

        if must.is_empty() {
            // no text and no facets: a well-formed query still goes out
            must.push(Clause::MatchAll);
        }

        StructuredQuery {
            must,
            should,
            filters: Self::hard_filters(query),
            page_size: self.effective_page_size(query),
            offset: query.offset,
            highlight: true,
        }
    }

    /// Stage-2 query: required AND text semantics dropped in favor of an OR
    /// of looser match strategies, so partial term overlap still hits.
    /// Facet clauses and hard filters stay required.
    pub fn build_relaxed(&self, query: &Query) -> StructuredQuery {
        let mut must: Vec<Clause> = Self::facet_groups(query)
            .into_iter()
            .map(|(field, values)| Clause::AnyOf {
                values,
                fields: vec![field, SearchField::Title, SearchField::Abstract],
            })
            .collect();

        let mut should = Vec::new();
        let text = query.free_text.trim();
        if !text.is_empty() {
            should.push(Clause::BestFields {
                text: text.to_string(),
                fields: self.weighted_text_fields(),
            });
            should.push(Clause::Fuzzy {
                field: SearchField::Abstract,
                text: text.to_string(),
            });
            should.push(Clause::Fuzzy {
                field: SearchField::Title,
                text: text.to_string(),
            });
        }

        if must.is_empty() && should.is_empty() {
            must.push(Clause::MatchAll);
        }

        StructuredQuery {
            must,
            should,
            filters: Self::hard_filters(query),
            page_size: self.effective_page_size(query),
            offset: query.offset,
            highlight: true,
        }
    }

    fn weighted_text_fields(&self) -> Vec<WeightedField> {
        vec![
            WeightedField {
                field: SearchField::Title,
                weight: self.tuning.title_weight,
            },
            WeightedField {
                field: SearchField::Abstract,
                weight: self.tuning.abstract_weight,
            },
            WeightedField {
                field: SearchField::Keywords,
                weight: self.tuning.keywords_weight,
            },
            WeightedField {
                field: SearchField::Authors,
                weight: self.tuning.authors_weight,
            },
        ]
    }

    /// Known facets with at least one value, in map order. Unknown facet
    /// names are dropped, not fatal.
    fn facet_groups(query: &Query) -> Vec<(SearchField, Vec<String>)> {
        let mut groups = Vec::new();
        for (name, values) in &query.facets {
            let values: Vec<String> = values
                .iter()
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .collect();
            if values.is_empty() {
                continue;
            }
            match facet_field(name) {
                Some(field) => groups.push((field, values)),
                None => {
                    tracing::warn!(facet = %name, "ignoring unknown facet");
                }
            }
        }
        groups
    }

    /// Range and flag filters. Malformed entries (unknown field, inverted
    /// bounds) are ignored so one bad filter never fails the whole query.
    fn hard_filters(query: &Query) -> Vec<Filter> {
        let mut filters = Vec::new();
        for range in &query.ranges {
            if range.field != "year" {
                tracing::warn!(field = %range.field, "ignoring range filter on unknown field");
                continue;
            }
            if let (Some(gte), Some(lte)) = (range.gte, range.lte) {
                if gte > lte {
                    tracing::warn!(gte, lte, "ignoring inverted year range");
                    continue;
                }
            }
            if range.gte.is_none() && range.lte.is_none() {
                continue;
            }
            filters.push(Filter::YearRange {
                gte: range.gte,
                lte: range.lte,
            });
        }
        for flag in &query.flags {
            match flag.field.as_str() {
                "has_doi" => filters.push(Filter::HasDoi(flag.value)),
                "has_osdr" => filters.push(Filter::HasOsdr(flag.value)),
                other => {
                    tracing::warn!(field = %other, "ignoring unknown flag filter");
                }
            }
        }
        filters
    }
}

fn facet_field(name: &str) -> Option<SearchField> {
    match name {
        "organism" => Some(SearchField::Organism),
        "mission" => Some(SearchField::Mission),
        "environment" => Some(SearchField::Environment),
        "source" => Some(SearchField::Source),
        _ => None,
    }
}
