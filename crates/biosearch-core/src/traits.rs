use crate::error::Result;
use crate::types::{FacetCounts, SearchPage, StructuredQuery};

/// The document-index capability consumed by the retrieval gateway.
///
/// Implementations own their storage; callers hand over a [`StructuredQuery`]
/// and get back a ranked page. Errors map to
/// [`Error::IndexUnavailable`](crate::error::Error::IndexUnavailable).
pub trait DocumentIndex: Send + Sync {
    fn search(&self, query: &StructuredQuery) -> Result<SearchPage>;

    /// Most recent documents, newest first. The universal fallback tier of
    /// the relaxation cascade calls this when everything else came up empty.
    fn recent(&self, limit: usize) -> Result<SearchPage>;

    /// Aggregations over the whole corpus for the faceted browse UI.
    fn facet_counts(&self) -> Result<FacetCounts>;
}

/// One generation call: system instruction + user prompt in, text out.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub system: &'a str,
    pub prompt: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// The language-generation capability consumed by the answer engine.
///
/// Implementations return the generated text, or a
/// `GenerationRefused`/`GenerationUnavailable` error the orchestrator
/// translates into a user-facing message. No retries: resilience lives in
/// the response-shape fallbacks, not here.
pub trait Generator: Send + Sync {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String>;
}
