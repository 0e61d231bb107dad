//! Search query derivation.

use crate::models::ArticleDraft;
use itertools::Itertools;

/// Words kept from a paragraph's first sentence.
const MAX_SENTENCE_WORDS: usize = 12;

fn first_sentence(paragraph: &str) -> String {
    let sentence = paragraph
        .split_inclusive(['.', '!', '?'])
        .next()
        .unwrap_or(paragraph)
        .trim_end_matches(['.', '!', '?']);
    sentence
        .split_whitespace()
        .take(MAX_SENTENCE_WORDS)
        .join(" ")
}

/// Build up to `max` distinct queries from the title, the subheadings and the
/// first sentence of the first two paragraphs, in that order.
///
/// Duplicates are detected case-insensitively; the first spelling wins.
/// Placeholder titles are not searched for.
pub fn build_queries(draft: &ArticleDraft, max: usize) -> Vec<String> {
    let title = (!draft.title.is_placeholder()).then(|| draft.title.as_str().to_string());

    title
        .into_iter()
        .chain(draft.outline.subheadings.iter().cloned())
        .chain(draft.outline.paragraphs.iter().take(2).map(|p| first_sentence(p)))
        .map(|q| q.split_whitespace().join(" "))
        .filter(|q| q.chars().count() >= 3)
        .unique_by(|q| q.to_lowercase())
        .take(max)
        .collect()
}
