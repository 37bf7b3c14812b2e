//! The grounded-answer orchestrator: retrieve, pack context, generate,
//! and translate every failure mode into a legible answer.

use crate::client::ChatClient;
use crate::context::{build_context, truncate_chars, ContextBlock};
use crate::prompt;
use biosearch_core::config::{Config, GenerationConfig, RagConfig};
use biosearch_core::error::{Error, RefusalReason};
use biosearch_core::traits::{DocumentIndex, GenerationRequest, Generator};
use biosearch_core::types::{Citation, Query, RetrievalResult};
use biosearch_retrieval::RetrievalGateway;

/// A grounded answer: text plus the citation manifest of the context block it
/// was generated from. `generated` is false for extractive fallbacks.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
    pub generated: bool,
}

impl Answer {
    fn ungrounded(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            citations: Vec::new(),
            generated: false,
        }
    }
}

pub struct AnswerEngine<I: DocumentIndex> {
    gateway: RetrievalGateway<I>,
    generator: Option<Box<dyn Generator>>,
    rag: RagConfig,
    generation: GenerationConfig,
}

impl<I: DocumentIndex> AnswerEngine<I> {
    pub fn new(
        gateway: RetrievalGateway<I>,
        generator: Option<Box<dyn Generator>>,
        rag: RagConfig,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            gateway,
            generator,
            rag,
            generation,
        }
    }

    /// Wires a gateway to the configured chat endpoint, or to extractive-only
    /// mode when no API key is set.
    pub fn from_config(gateway: RetrievalGateway<I>, config: &Config) -> Self {
        let generator = ChatClient::from_config(&config.generation)
            .map(|c| Box::new(c) as Box<dyn Generator>);
        Self::new(
            gateway,
            generator,
            config.rag.clone(),
            config.generation.clone(),
        )
    }

    pub fn gateway(&self) -> &RetrievalGateway<I> {
        &self.gateway
    }

    /// Answers a free-text question grounded in the corpus. The optional
    /// `style` shapes the answer's form using the summarization presets.
    ///
    /// Infallible by construction: every retrieval or generation failure is
    /// translated into an explanatory `Answer` rather than surfaced as an
    /// error.
    pub fn answer(&self, question: &str, style: Option<&str>) -> Answer {
        let question = question.trim();
        if question.is_empty() {
            return Answer::ungrounded("Please ask a question about the paper corpus.");
        }

        let query = Query {
            free_text: question.to_string(),
            page_size: self.rag.top_k,
            ..Query::default()
        };
        let outcome = self.gateway.retrieve(&query);

        if let Some(reason) = &outcome.degraded {
            tracing::warn!(%reason, "retrieval degraded, answering without sources");
            return Answer::ungrounded(
                "The search backend is currently unavailable, so I can't ground an \
                 answer in the corpus. Please try again shortly.",
            );
        }

        let block = build_context(&outcome.results, self.rag.context_budget, self.rag.snippet_chars);
        if block.is_empty() {
            return Answer::ungrounded(
                "I couldn't find any documents in the corpus related to your question.",
            );
        }

        if outcome.fallback {
            // Nothing matched the question itself, so a generated answer would
            // only be grounded in unrelated recent papers. List them instead.
            return self.extractive(
                "Nothing in the corpus matched your question directly. \
                 Here are the most recent papers instead:",
                &outcome.results,
                &block,
            );
        }

        let Some(generator) = self.generator.as_deref() else {
            return self.extractive(
                "No generation model is configured. \
                 Here's what the retrieved abstracts say:",
                &outcome.results,
                &block,
            );
        };

        let user_prompt = prompt::answer_prompt(question, &block.text, style);
        let request = GenerationRequest {
            system: prompt::ANSWER_SYSTEM,
            prompt: &user_prompt,
            temperature: self.generation.temperature,
            max_tokens: self.generation.max_tokens,
        };

        match generator.generate(&request) {
            Ok(text) => Answer {
                text,
                citations: block.citations,
                generated: true,
            },
            Err(Error::GenerationRefused(RefusalReason::Safety)) => Answer {
                text: "The generation service declined this question due to a \
                       content-safety block. The retrieved sources are listed below; \
                       try rewording the question."
                    .to_string(),
                citations: block.citations,
                generated: false,
            },
            Err(Error::GenerationRefused(RefusalReason::Length)) => Answer {
                text: "The generation service hit its length limit before producing \
                       an answer. Try a narrower question."
                    .to_string(),
                citations: block.citations,
                generated: false,
            },
            Err(Error::GenerationRefused(RefusalReason::Other(reason))) => Answer {
                text: format!(
                    "The generation service declined to answer ({reason}). \
                     The retrieved sources are listed below."
                ),
                citations: block.citations,
                generated: false,
            },
            Err(e) => {
                tracing::warn!(error = %e, "generation failed, falling back to extractive answer");
                self.extractive(
                    "The generation service is unavailable right now. \
                     Here's what the retrieved abstracts say:",
                    &outcome.results,
                    &block,
                )
            }
        }
    }

    /// Summarizes standalone text in one of the preset styles. Falls back to
    /// a sentence-level extractive summary when no generator is reachable.
    pub fn summarize(&self, text: &str, style: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            return "There is no text to summarize.".to_string();
        }

        let Some(generator) = self.generator.as_deref() else {
            return extractive_summary(text);
        };

        let user_prompt = prompt::summarize_prompt(text, style);
        let request = GenerationRequest {
            system: prompt::SUMMARIZE_SYSTEM,
            prompt: &user_prompt,
            temperature: self.generation.temperature,
            max_tokens: self.generation.max_tokens,
        };

        match generator.generate(&request) {
            Ok(summary) => summary,
            Err(Error::GenerationRefused(reason)) => {
                format!("The generation service declined to summarize this text ({reason}).")
            }
            Err(e) => {
                tracing::warn!(error = %e, "summarization failed, falling back to extraction");
                extractive_summary(text)
            }
        }
    }

    /// Enumerates the context documents as title + truncated abstract bullets.
    /// Citations stay aligned: bullet `[i]` is context entry `i`.
    fn extractive(
        &self,
        header: &str,
        results: &[RetrievalResult],
        block: &ContextBlock,
    ) -> Answer {
        let mut text = header.to_string();
        for citation in &block.citations {
            let doc = &results[citation.index - 1].document;
            let snippet = truncate_chars(&doc.abstract_text, self.rag.fallback_snippet_chars);
            let ellipsis = if snippet.len() < doc.abstract_text.len() {
                "..."
            } else {
                ""
            };
            text.push_str(&format!(
                "\n- [{}] {}: {}{}",
                citation.index, citation.title, snippet, ellipsis
            ));
        }
        Answer {
            text,
            citations: block.citations.clone(),
            generated: false,
        }
    }
}

/// Naive sentence-bullet summary, capped at roughly 1200 characters.
fn extractive_summary(text: &str) -> String {
    let mut out = String::new();
    for sentence in text.split_terminator('.') {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        if out.chars().count() + sentence.chars().count() > 1200 {
            break;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("- ");
        out.push_str(sentence);
        out.push('.');
    }
    if out.is_empty() {
        format!("- {}", truncate_chars(text, 1200))
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biosearch_core::config::SearchTuning;
    use biosearch_core::error::Result;
    use biosearch_core::types::{Document, FacetCounts, SearchPage, StructuredQuery};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StaticIndex {
        page: SearchPage,
        recent: SearchPage,
    }

    impl DocumentIndex for StaticIndex {
        fn search(&self, _query: &StructuredQuery) -> Result<SearchPage> {
            Ok(self.page.clone())
        }

        fn recent(&self, _limit: usize) -> Result<SearchPage> {
            Ok(self.recent.clone())
        }

        fn facet_counts(&self) -> Result<FacetCounts> {
            Ok(FacetCounts::default())
        }
    }

    struct ScriptedGenerator {
        responses: Mutex<Vec<Result<String>>>,
    }

    impl ScriptedGenerator {
        fn once(response: Result<String>) -> Box<dyn Generator> {
            Box::new(Self {
                responses: Mutex::new(vec![response]),
            })
        }
    }

    impl Generator for ScriptedGenerator {
        fn generate(&self, _request: &GenerationRequest<'_>) -> Result<String> {
            self.responses
                .lock()
                .expect("lock")
                .pop()
                .unwrap_or_else(|| Ok("unscripted".to_string()))
        }
    }

    fn corpus_hit(id: &str, title: &str, year: i32, abstract_text: &str) -> RetrievalResult {
        RetrievalResult {
            document: Document {
                id: id.to_string(),
                title: title.to_string(),
                abstract_text: abstract_text.to_string(),
                year: Some(year),
                url: format!("https://example.org/{id}"),
                ..Document::default()
            },
            score: 2.0,
            highlights: HashMap::new(),
        }
    }

    fn five_hit_page() -> SearchPage {
        let hits: Vec<_> = (1..=5)
            .map(|i| {
                corpus_hit(
                    &format!("p{i}"),
                    &format!("Paper {i}"),
                    2015 + i,
                    &format!("Findings of paper {i} on microgravity physiology."),
                )
            })
            .collect();
        SearchPage {
            total: hits.len(),
            hits,
        }
    }

    fn engine_with(
        page: SearchPage,
        generator: Option<Box<dyn Generator>>,
    ) -> AnswerEngine<StaticIndex> {
        let index = StaticIndex {
            page,
            recent: SearchPage::default(),
        };
        let gateway = RetrievalGateway::new(index, SearchTuning::default());
        AnswerEngine::new(
            gateway,
            generator,
            RagConfig::default(),
            GenerationConfig::default(),
        )
    }

    #[test]
    fn generated_answer_carries_aligned_citations() {
        let engine = engine_with(
            five_hit_page(),
            Some(ScriptedGenerator::once(Ok(
                "Bone density declines in orbit [1][3].".to_string()
            ))),
        );
        let answer = engine.answer("What happens to bone density in microgravity?", None);

        assert!(answer.generated);
        assert_eq!(answer.text, "Bone density declines in orbit [1][3].");
        assert_eq!(answer.citations.len(), 5);
        for (i, citation) in answer.citations.iter().enumerate() {
            assert_eq!(citation.index, i + 1);
            assert_eq!(citation.title, format!("Paper {}", i + 1));
        }
    }

    #[test]
    fn safety_refusal_produces_a_specific_message() {
        let engine = engine_with(
            five_hit_page(),
            Some(ScriptedGenerator::once(Err(Error::GenerationRefused(
                RefusalReason::Safety,
            )))),
        );
        let answer = engine.answer("a question the backend blocks", None);

        assert!(!answer.generated);
        assert!(answer.text.contains("content-safety block"));
        // sources still surface so the user can read them directly
        assert_eq!(answer.citations.len(), 5);
    }

    #[test]
    fn length_refusal_is_distinguishable_from_safety() {
        let engine = engine_with(
            five_hit_page(),
            Some(ScriptedGenerator::once(Err(Error::GenerationRefused(
                RefusalReason::Length,
            )))),
        );
        let answer = engine.answer("an endless question", None);
        assert!(answer.text.contains("length limit"));
        assert!(!answer.text.contains("content-safety"));
    }

    #[test]
    fn unavailable_generator_degrades_to_extractive_listing() {
        let engine = engine_with(
            five_hit_page(),
            Some(ScriptedGenerator::once(Err(Error::GenerationUnavailable(
                "connection refused".to_string(),
            )))),
        );
        let answer = engine.answer("bone density", None);

        assert!(!answer.generated);
        assert!(answer.text.contains("unavailable"));
        assert!(answer.text.contains("- [1] Paper 1:"));
        assert!(answer.text.contains("Findings of paper 1"));
        assert_eq!(answer.citations.len(), 5);
    }

    #[test]
    fn no_generator_means_extractive_answers() {
        let engine = engine_with(five_hit_page(), None);
        let answer = engine.answer("bone density", None);

        assert!(!answer.generated);
        assert!(answer.text.contains("No generation model is configured"));
        assert!(answer.text.contains("- [5] Paper 5:"));
    }

    #[test]
    fn empty_corpus_yields_a_legible_no_results_answer() {
        let engine = engine_with(SearchPage::default(), None);
        let answer = engine.answer("anything at all", None);

        assert!(answer.citations.is_empty());
        assert!(answer.text.contains("couldn't find any documents"));
    }

    #[test]
    fn blank_question_is_rejected_before_retrieval() {
        let engine = engine_with(five_hit_page(), None);
        let answer = engine.answer("   ", None);
        assert!(answer.text.contains("ask a question"));
        assert!(answer.citations.is_empty());
    }

    #[test]
    fn context_budget_bounds_the_citation_list() {
        let long = "x".repeat(2000);
        let hits: Vec<_> = (1..=5)
            .map(|i| corpus_hit(&format!("p{i}"), &format!("Paper {i}"), 2020, &long))
            .collect();
        let page = SearchPage {
            total: hits.len(),
            hits,
        };
        let index = StaticIndex {
            page,
            recent: SearchPage::default(),
        };
        let gateway = RetrievalGateway::new(index, SearchTuning::default());
        // 800-char snippets make each entry ~860 chars, so a 2000-char budget
        // admits exactly two of the five retrieved documents.
        let engine = AnswerEngine::new(
            gateway,
            Some(ScriptedGenerator::once(Ok("Grounded [1].".to_string()))),
            RagConfig {
                context_budget: 2000,
                ..RagConfig::default()
            },
            GenerationConfig::default(),
        );
        let answer = engine.answer("microgravity", None);

        assert!(answer.generated);
        assert_eq!(answer.citations.len(), 2);
        let last = answer.citations.last().expect("at least one citation");
        assert_eq!(last.index, answer.citations.len());
    }

    #[test]
    fn summarize_uses_presets_and_degrades_to_extraction() {
        let engine = engine_with(
            five_hit_page(),
            Some(ScriptedGenerator::once(Ok("- Key point.".to_string()))),
        );
        assert_eq!(engine.summarize("Some abstract text.", "keypoints"), "- Key point.");

        let offline = engine_with(five_hit_page(), None);
        let summary = offline.summarize(
            "Mice lost bone mass. Plants adapted quickly. Radiation was elevated.",
            "keypoints",
        );
        assert_eq!(
            summary,
            "- Mice lost bone mass.\n- Plants adapted quickly.\n- Radiation was elevated."
        );

        assert_eq!(
            offline.summarize("  ", "keypoints"),
            "There is no text to summarize."
        );
    }
}
