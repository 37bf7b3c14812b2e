//! Compilation of the backend-agnostic [`StructuredQuery`] into tantivy
//! queries.
//!
//! Scoring clauses and hard filters are kept in separate boolean layers:
//! filters are wrapped in a zero-score `ConstScoreQuery` and ANDed around
//! the scoring subquery, so a filter can never turn optional `should`
//! clauses into a match-everything query.

use std::ops::Bound;

use tantivy::query::{
    AllQuery, BooleanQuery, BoostQuery, ConstScoreQuery, EmptyQuery, FuzzyTermQuery, Occur,
    PhraseQuery, Query, RangeQuery, TermQuery,
};
use tantivy::schema::IndexRecordOption;
use tantivy::Term;

use biosearch_core::types::{Clause, Filter, StructuredQuery, WeightedField};

use crate::schema::{analyze, PaperFields};

pub(crate) struct QueryCompiler<'a> {
    fields: &'a PaperFields,
    fuzzy_max_distance: u8,
}

impl<'a> QueryCompiler<'a> {
    pub(crate) fn new(fields: &'a PaperFields, fuzzy_max_distance: u8) -> Self {
        Self {
            fields,
            fuzzy_max_distance,
        }
    }

    pub(crate) fn compile(&self, query: &StructuredQuery) -> Box<dyn Query> {
        let mut scoring: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for clause in &query.must {
            scoring.push((Occur::Must, self.clause(clause)));
        }
        for clause in &query.should {
            scoring.push((Occur::Should, self.clause(clause)));
        }
        let scoring_query: Box<dyn Query> = if scoring.is_empty() {
            Box::new(AllQuery)
        } else {
            Box::new(BooleanQuery::new(scoring))
        };

        if query.filters.is_empty() {
            return scoring_query;
        }
        let mut layers: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, scoring_query)];
        for filter in &query.filters {
            let compiled = self.filter(filter);
            layers.push((
                Occur::Must,
                Box::new(ConstScoreQuery::new(compiled, 0.0)),
            ));
        }
        Box::new(BooleanQuery::new(layers))
    }

    fn clause(&self, clause: &Clause) -> Box<dyn Query> {
        match clause {
            Clause::MultiMatch {
                text,
                fields,
                fuzzy,
            } => self.multi_match(text, fields, *fuzzy),
            Clause::BestFields { text, fields } => self.best_fields(text, fields),
            Clause::Fuzzy { field, text } => self.fuzzy_field(*field, text),
            Clause::Phrase { field, text, boost } => self.phrase(*field, text, *boost),
            Clause::AnyOf { values, fields } => self.any_of(values, fields),
            Clause::MatchAll => Box::new(AllQuery),
        }
    }

    /// Every term must match in at least one field; fields contribute with
    /// their configured weights. Mirrors a `most_fields` multi-match with
    /// `fuzziness: AUTO`.
    fn multi_match(&self, text: &str, fields: &[WeightedField], fuzzy: bool) -> Box<dyn Query> {
        let terms = analyze(text);
        if terms.is_empty() {
            return Box::new(EmptyQuery);
        }
        let mut per_term: Vec<(Occur, Box<dyn Query>)> = Vec::with_capacity(terms.len());
        for token in &terms {
            let mut field_queries: Vec<(Occur, Box<dyn Query>)> = Vec::with_capacity(fields.len());
            for wf in fields {
                let term = Term::from_field_text(self.fields.resolve(wf.field), token);
                let exact = TermQuery::new(term.clone(), IndexRecordOption::Basic);
                let distance = if fuzzy { self.distance_for(token) } else { 0 };
                let word_query: Box<dyn Query> = if distance == 0 {
                    Box::new(exact)
                } else {
                    // exact OR fuzzy; the exact branch scores higher on its own
                    Box::new(BooleanQuery::new(vec![
                        (Occur::Should, Box::new(exact) as Box<dyn Query>),
                        (
                            Occur::Should,
                            Box::new(FuzzyTermQuery::new(term, distance, true)),
                        ),
                    ]))
                };
                field_queries.push((Occur::Should, Box::new(BoostQuery::new(word_query, wf.weight))));
            }
            per_term.push((Occur::Must, Box::new(BooleanQuery::new(field_queries))));
        }
        Box::new(BooleanQuery::new(per_term))
    }

    /// Any term in any field produces a hit. This is the relaxed-stage text
    /// strategy, so partial term overlap still surfaces documents.
    fn best_fields(&self, text: &str, fields: &[WeightedField]) -> Box<dyn Query> {
        let terms = analyze(text);
        if terms.is_empty() {
            return Box::new(EmptyQuery);
        }
        let mut subqueries: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for wf in fields {
            for token in &terms {
                let term = Term::from_field_text(self.fields.resolve(wf.field), token);
                let term_query: Box<dyn Query> =
                    Box::new(TermQuery::new(term, IndexRecordOption::Basic));
                subqueries.push((Occur::Should, Box::new(BoostQuery::new(term_query, wf.weight))));
            }
        }
        Box::new(BooleanQuery::new(subqueries))
    }

    fn fuzzy_field(&self, field: biosearch_core::types::SearchField, text: &str) -> Box<dyn Query> {
        let terms = analyze(text);
        if terms.is_empty() {
            return Box::new(EmptyQuery);
        }
        let tantivy_field = self.fields.resolve(field);
        let subqueries: Vec<(Occur, Box<dyn Query>)> = terms
            .iter()
            .map(|token| {
                let term = Term::from_field_text(tantivy_field, token);
                let distance = self.distance_for(token).max(1);
                (
                    Occur::Should,
                    Box::new(FuzzyTermQuery::new(term, distance, true)) as Box<dyn Query>,
                )
            })
            .collect();
        Box::new(BooleanQuery::new(subqueries))
    }

    fn phrase(
        &self,
        field: biosearch_core::types::SearchField,
        text: &str,
        boost: f32,
    ) -> Box<dyn Query> {
        let tantivy_field = self.fields.resolve(field);
        let mut terms: Vec<Term> = analyze(text)
            .iter()
            .map(|token| Term::from_field_text(tantivy_field, token))
            .collect();
        let inner: Box<dyn Query> = match terms.len() {
            0 => return Box::new(EmptyQuery),
            1 => Box::new(TermQuery::new(terms.remove(0), IndexRecordOption::Basic)),
            _ => Box::new(PhraseQuery::new(terms)),
        };
        Box::new(BoostQuery::new(inner, boost))
    }

    fn any_of(
        &self,
        values: &[String],
        fields: &[biosearch_core::types::SearchField],
    ) -> Box<dyn Query> {
        let mut subqueries: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for value in values {
            for field in fields {
                let tantivy_field = self.fields.resolve(*field);
                if field.is_keyword() {
                    let term = Term::from_field_text(tantivy_field, value);
                    subqueries.push((
                        Occur::Should,
                        Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
                    ));
                } else {
                    // analyzed field: match the value as a phrase (or a
                    // single term) the way the analyzer indexed it
                    let mut terms: Vec<Term> = analyze(value)
                        .iter()
                        .map(|token| Term::from_field_text(tantivy_field, token))
                        .collect();
                    match terms.len() {
                        0 => {}
                        1 => subqueries.push((
                            Occur::Should,
                            Box::new(TermQuery::new(terms.remove(0), IndexRecordOption::Basic)),
                        )),
                        _ => subqueries.push((Occur::Should, Box::new(PhraseQuery::new(terms)))),
                    }
                }
            }
        }
        if subqueries.is_empty() {
            return Box::new(EmptyQuery);
        }
        Box::new(BooleanQuery::new(subqueries))
    }

    fn filter(&self, filter: &Filter) -> Box<dyn Query> {
        match filter {
            Filter::YearRange { gte, lte } => {
                let lower = match gte {
                    Some(v) => Bound::Included(Term::from_field_i64(self.fields.year, *v)),
                    None => Bound::Unbounded,
                };
                let upper = match lte {
                    Some(v) => Bound::Included(Term::from_field_i64(self.fields.year, *v)),
                    None => Bound::Unbounded,
                };
                Box::new(RangeQuery::new(lower, upper))
            }
            Filter::HasDoi(value) => Box::new(TermQuery::new(
                Term::from_field_bool(self.fields.has_doi, *value),
                IndexRecordOption::Basic,
            )),
            Filter::HasOsdr(value) => Box::new(TermQuery::new(
                Term::from_field_bool(self.fields.has_osdr, *value),
                IndexRecordOption::Basic,
            )),
        }
    }

    fn distance_for(&self, token: &str) -> u8 {
        let scaled = match token.chars().count() {
            0..=2 => 0,
            3..=5 => 1,
            _ => 2,
        };
        scaled.min(self.fuzzy_max_distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{build_schema, register_tokenizer, PaperFields};
    use biosearch_core::types::SearchField;
    use tantivy::collector::Count;
    use tantivy::{Index, TantivyDocument};

    fn indexed_title(title: &str) -> (Index, PaperFields) {
        let index = Index::create_in_ram(build_schema());
        register_tokenizer(&index);
        let fields = PaperFields::from_schema(&index.schema()).expect("schema fields");
        let mut writer = index.writer(50_000_000).expect("writer");
        let mut doc = TantivyDocument::default();
        doc.add_text(fields.title, title);
        writer.add_document(doc).expect("add");
        writer.commit().expect("commit");
        (index, fields)
    }

    fn count(index: &Index, query: &StructuredQuery, fields: &PaperFields) -> usize {
        let compiled = QueryCompiler::new(fields, 1).compile(query);
        let reader = index.reader().expect("reader");
        reader
            .searcher()
            .search(&compiled, &Count)
            .expect("search")
    }

    fn phrase_query(text: &str) -> StructuredQuery {
        StructuredQuery {
            must: vec![Clause::Phrase {
                field: SearchField::Title,
                text: text.to_string(),
                boost: 2.0,
            }],
            page_size: 10,
            ..StructuredQuery::default()
        }
    }

    #[test]
    fn phrase_clauses_degrade_gracefully_by_term_count() {
        let (index, fields) = indexed_title("microgravity bone density");

        // multi-word phrase
        assert_eq!(count(&index, &phrase_query("bone density"), &fields), 1);
        // collapses to one term after stop-word removal
        assert_eq!(count(&index, &phrase_query("the microgravity"), &fields), 1);
        // nothing left after analysis matches nothing
        assert_eq!(count(&index, &phrase_query("the of and"), &fields), 0);
    }

    #[test]
    fn single_valued_any_of_matches_text_fields() {
        let (index, fields) = indexed_title("mouse hindlimb unloading");
        let query = StructuredQuery {
            must: vec![Clause::AnyOf {
                values: vec!["Mouse".to_string()],
                fields: vec![SearchField::Organism, SearchField::Title],
            }],
            page_size: 10,
            ..StructuredQuery::default()
        };
        assert_eq!(count(&index, &query, &fields), 1);
    }
}
