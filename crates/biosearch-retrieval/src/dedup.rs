//! Duplicate suppression across cascade stages.

use std::collections::HashSet;

use biosearch_core::types::RetrievalResult;

/// Walks ordered result lists and keeps only the first occurrence of each
/// `(title, url)` identity key, so later-stage hits never displace earlier,
/// more specific ones.
#[derive(Default)]
pub struct Deduplicator {
    seen: HashSet<(String, String)>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the unseen hits of `batch` to `into`, preserving order.
    /// Returns how many were actually appended.
    pub fn merge(&mut self, into: &mut Vec<RetrievalResult>, batch: Vec<RetrievalResult>) -> usize {
        let before = into.len();
        for hit in batch {
            if self.seen.insert(hit.document.identity_key()) {
                into.push(hit);
            }
        }
        into.len() - before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biosearch_core::types::Document;
    use std::collections::HashMap;

    fn hit(title: &str, url: &str, score: f32) -> RetrievalResult {
        RetrievalResult {
            document: Document {
                title: title.to_string(),
                url: url.to_string(),
                ..Document::default()
            },
            score,
            highlights: HashMap::new(),
        }
    }

    #[test]
    fn first_seen_wins_across_batches() {
        let mut dedup = Deduplicator::new();
        let mut merged = Vec::new();

        let added = dedup.merge(
            &mut merged,
            vec![hit("A", "u1", 3.0), hit("B", "u2", 2.0)],
        );
        assert_eq!(added, 2);

        // second stage re-surfaces A with a different score plus a new doc
        let added = dedup.merge(
            &mut merged,
            vec![hit("A", "u1", 9.0), hit("C", "u3", 1.0)],
        );
        assert_eq!(added, 1);

        let titles: Vec<&str> = merged.iter().map(|h| h.document.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
        // the original stage-1 score survives
        assert!((merged[0].score - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn same_title_different_url_is_not_a_duplicate() {
        let mut dedup = Deduplicator::new();
        let mut merged = Vec::new();
        dedup.merge(
            &mut merged,
            vec![hit("A", "u1", 1.0), hit("A", "u2", 1.0)],
        );
        assert_eq!(merged.len(), 2);
    }
}
