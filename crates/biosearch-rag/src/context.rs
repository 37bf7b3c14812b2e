//! Context assembly: turns a ranked retrieval page into the numbered source
//! block handed to the generator, plus the citation list that mirrors it.

use biosearch_core::types::{Citation, RetrievalResult};

/// The prompt-ready source block and its citation manifest.
///
/// Invariant: `citations[i].index == i + 1`, and each index names exactly the
/// `i`-th entry of `text`. Documents dropped by the character budget get no
/// citation, so inline `[#]` markers can never point outside the block.
#[derive(Debug, Clone, Default)]
pub struct ContextBlock {
    pub text: String,
    pub citations: Vec<Citation>,
}

impl ContextBlock {
    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }
}

/// Packs the top retrieval hits into a character-budgeted context block.
///
/// Entries are admitted in rank order, whole or not at all: the first entry
/// that would push the block past `budget_chars` stops the packing, even if a
/// later, shorter entry would still fit. That keeps citation numbering a
/// strict prefix of the ranking.
pub fn build_context(
    results: &[RetrievalResult],
    budget_chars: usize,
    snippet_chars: usize,
) -> ContextBlock {
    let mut block = ContextBlock::default();
    let mut used = 0usize;

    for hit in results {
        let doc = &hit.document;
        let index = block.citations.len() + 1;
        let entry = format!(
            "[{index}] {title} ({year})\nURL: {url}\nAbstract: {snippet}\n",
            title = display_title(&doc.title),
            year = display_year(doc.year),
            url = doc.url,
            snippet = truncate_chars(&doc.abstract_text, snippet_chars),
        );
        let cost = entry.chars().count();
        if used + cost > budget_chars {
            break;
        }
        used += cost;
        if !block.text.is_empty() {
            block.text.push('\n');
        }
        block.text.push_str(&entry);
        block.citations.push(Citation {
            index,
            title: doc.title.clone(),
            url: doc.url.clone(),
            year: doc.year,
        });
    }

    block
}

/// Cuts at a character boundary, never inside a UTF-8 sequence.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_offset, _)) => &text[..byte_offset],
        None => text,
    }
}

fn display_title(title: &str) -> &str {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        "Untitled"
    } else {
        trimmed
    }
}

fn display_year(year: Option<i32>) -> String {
    year.map_or_else(|| "n.d.".to_string(), |y| y.to_string())
}
