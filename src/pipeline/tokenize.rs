//! Tokenizer: normalize raw text and split it into logical blocks.
//!
//! OCR and screen-capture text routinely breaks a sentence with a blank
//! line (column breaks, page breaks, hyphenated line ends). Splitting on
//! blank lines alone would turn one paragraph into several, so adjacent
//! blocks are merged back when the first one is visibly unfinished and
//! the second one does not open a new structure.

use crate::element::Block;
use crate::pipeline::extract::{extract_payloads, is_placeholder_only, PayloadArena};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());
static RE_TERMINAL_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[.?!:;"]$"#).unwrap());
static RE_STRUCTURAL_OPENER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:#{1,6}\s+|[-*+]\s+|\d+\.\s+|[IVX]+\.\s+|[A-Z]\.\s+|Abstract|Introduction|Conclusion)")
        .unwrap()
});

/// Unify `\r\n` and `\r` to `\n` and trim outer whitespace.
pub fn normalize(raw: &str) -> String {
    raw.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
}

/// Output of [`tokenize`]: blocks plus the payloads their placeholders name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokenized {
    pub blocks: Vec<Block>,
    pub arena: PayloadArena,
}

impl Tokenized {
    /// Blocks rejoined with blank lines; the text handed to remote classifiers.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Normalize, extract diagrams and tables, then split into merged blocks.
pub fn tokenize(raw: &str) -> Tokenized {
    let normalized = normalize(raw);
    if normalized.is_empty() {
        return Tokenized::default();
    }
    let extraction = extract_payloads(&normalized);
    Tokenized {
        blocks: split_blocks(&extraction.text),
        arena: extraction.arena,
    }
}

/// Split on blank-line runs, drop empties, merge broken paragraphs.
pub fn split_blocks(text: &str) -> Vec<Block> {
    let chunks: Vec<&str> = RE_BLANK_RUN
        .split(text)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();

    let mut merged: Vec<String> = Vec::with_capacity(chunks.len());
    let mut chunks = chunks.into_iter();
    let Some(first) = chunks.next() else {
        return Vec::new();
    };
    let mut current = first.to_string();

    for next in chunks {
        if should_merge(&current, next) {
            match current.strip_suffix('-') {
                Some(stem) => current = format!("{}{}", stem, next),
                None => {
                    current.push(' ');
                    current.push_str(next);
                }
            }
        } else {
            merged.push(std::mem::replace(&mut current, next.to_string()));
        }
    }
    merged.push(current);

    merged
        .into_iter()
        .enumerate()
        .map(|(index, text)| Block { index, text })
        .collect()
}

/// Merge when `current` is unfinished and `next` is not structural.
/// Placeholder blocks never merge.
fn should_merge(current: &str, next: &str) -> bool {
    if is_placeholder_only(current) || is_placeholder_only(next) {
        return false;
    }
    !RE_TERMINAL_PUNCT.is_match(current.trim_end()) && !RE_STRUCTURAL_OPENER.is_match(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(blocks: &[Block]) -> Vec<&str> {
        blocks.iter().map(|b| b.text.as_str()).collect()
    }

    #[test]
    fn normalize_line_endings() {
        assert_eq!(normalize("  a\r\nb\rc \n"), "a\nb\nc");
    }

    #[test]
    fn single_paragraph_is_one_block() {
        let t = tokenize("  The quick brown fox\njumps over the lazy dog.  ");
        assert_eq!(texts(&t.blocks), vec!["The quick brown fox\njumps over the lazy dog."]);
        assert_eq!(t.blocks[0].index, 0);
    }

    #[test]
    fn empty_input_has_no_blocks() {
        assert!(tokenize(" \r\n\t ").blocks.is_empty());
    }

    #[test]
    fn broken_sentence_is_merged() {
        let blocks = split_blocks("The model was trained on\n\nthree datasets.");
        assert_eq!(texts(&blocks), vec!["The model was trained on three datasets."]);
    }

    #[test]
    fn hyphenated_break_is_joined() {
        let blocks = split_blocks("The experi-\n\nment succeeded.");
        assert_eq!(texts(&blocks), vec!["The experiment succeeded."]);
    }

    #[test]
    fn finished_sentence_is_not_merged() {
        let blocks = split_blocks("First paragraph.\n\nSecond paragraph");
        assert_eq!(texts(&blocks), vec!["First paragraph.", "Second paragraph"]);
    }

    #[test]
    fn structural_block_is_not_merged() {
        let blocks = split_blocks("Energy Systems\n\n1. Introduction\n\n- item\n\nIntroduction text");
        assert_eq!(
            texts(&blocks),
            vec!["Energy Systems", "1. Introduction", "- item", "Introduction text"]
        );
    }

    #[test]
    fn placeholder_blocks_never_merge() {
        let blocks = split_blocks("Lead in\n\n%%MERMAID_PLACEHOLDER_0%%\n\ntrailing words");
        assert_eq!(
            texts(&blocks),
            vec!["Lead in", "%%MERMAID_PLACEHOLDER_0%%", "trailing words"]
        );
    }

    #[test]
    fn indices_follow_merged_order() {
        let blocks = split_blocks("a.\n\nb.\n\nc.");
        let idx: Vec<usize> = blocks.iter().map(|b| b.index).collect();
        assert_eq!(idx, vec![0, 1, 2]);
    }

    #[test]
    fn tokenize_extracts_flow() {
        let t = tokenize("Pipeline\n\nA\n│\n▼\nB\n│\n▼\nC\n\nDone.");
        assert_eq!(t.arena.len(), 1);
        assert_eq!(
            texts(&t.blocks),
            vec!["Pipeline", "%%MERMAID_PLACEHOLDER_0%%", "Done."]
        );
    }
}
