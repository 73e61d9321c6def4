//! Local heuristic classifier.
//!
//! A deterministic, order-sensitive pass over blocks. Each block (or each
//! line pulled out of a block, see below) goes through [`detect_type`],
//! whose rules are checked in a fixed order; the first match wins:
//!
//! | # | Pattern | Type |
//! |---|---------|------|
//! | 1 | first element, one line, no final `.`, not `#` | `h1` |
//! | 2 | `2.1 Text`, `### 3.2.1. Text` | `sub-subheading` |
//! | 3 | `4. Text` | `h2` |
//! | 4 | `IV. Text` | `h2` |
//! | 5 | `B. Text` (< 150 chars) | `sub-subheading` |
//! | 6 | `Abstract`, `References`, … alone on the line | `h2` |
//! | 7 | `## Text` | `h{#}` |
//! | 8 | every line `- ` / `* ` / `+ ` | `ul` |
//! | 9 | every line `n. ` | `ol` |
//! | 10 | anything else | `p` |
//!
//! ## Glued headings
//!
//! OCR often drops the blank line between a heading and the paragraph
//! before it, so a heading ends up on line 3 of a paragraph block. Before
//! detection every line after the first is checked against the heading
//! patterns; a hit flushes the lines collected so far as one element and
//! becomes an element of its own.

use crate::element::{Block, Element, ElementKind};
use crate::error::ClassificationError;
use crate::output::ClassifierKind;
use crate::pipeline::classify::Classifier;
use crate::pipeline::extract::{contains_placeholder, is_placeholder_only};
use crate::pipeline::postprocess::split_heading_body;
use crate::pipeline::tokenize::Tokenized;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::debug;

/// Heading candidates are single lines shorter than this.
const MAX_HEADING_CHARS: usize = 250;
/// Letter headings (`A. Text`) are shorter than this.
const MAX_LETTER_HEADING_CHARS: usize = 150;

static RE_NUM_SUBHEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:#{1,6}\s+)?(\d+\.\d+(?:\.\d+)*)\.?\s+(.*)$").unwrap());
static RE_MAIN_NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\.\s+(.*)$").unwrap());
static RE_ROMAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(XI{0,3}|IX|IV|V?I{1,3}|V)\.\s+(.+)$").unwrap());
static RE_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Z])\.\s+(.*)$").unwrap());
static RE_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:Abstract|Introduction|Conclusions?|References?|Acknowledg(?:e)?ments?|Methodology|Keywords|Overview)\s*$")
        .unwrap()
});
static RE_MARKDOWN_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.*)$").unwrap());
static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*+]\s+").unwrap());
static RE_ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\s+").unwrap());
static RE_ORDINAL_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\.\s+").unwrap());

/// The deterministic local classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClassifier;

impl LocalClassifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Classifier for LocalClassifier {
    fn name(&self) -> &str {
        "local"
    }

    fn kind(&self) -> ClassifierKind {
        ClassifierKind::Local
    }

    async fn classify(&self, doc: &Tokenized) -> Result<Vec<Element>, ClassificationError> {
        classify_document(doc)
    }
}

/// Synchronous body of the local strategy: classify, then split glued
/// heading/body pairs. A panic inside the heuristics is reported as an
/// error so the paragraph fallback can take over.
pub fn classify_document(doc: &Tokenized) -> Result<Vec<Element>, ClassificationError> {
    let elements = catch_unwind(AssertUnwindSafe(|| classify_blocks(&doc.blocks)))
        .map_err(|_| ClassificationError::Other("local classifier panicked".into()))?;
    let chars: usize = doc.blocks.iter().map(|b| b.text.len()).sum();
    if elements.is_empty() && chars > 0 {
        return Err(ClassificationError::Empty { chars });
    }
    Ok(split_heading_body(elements))
}

/// Classify blocks in order. Pure: same blocks in, same elements out.
pub fn classify_blocks(blocks: &[Block]) -> Vec<Element> {
    let mut elements = Vec::with_capacity(blocks.len());
    for block in blocks {
        if !block.text.contains('\n') {
            let index = elements.len();
            elements.push(detect_type(&block.text, index));
            continue;
        }

        let lines: Vec<&str> = block.text.split('\n').map(str::trim).collect();
        let mut buffer: Vec<&str> = Vec::new();
        for (j, line) in lines.iter().enumerate() {
            let pulled_out = if j == 0 {
                is_markdown_heading(line)
            } else {
                is_glued_heading(&lines, j)
            };
            if pulled_out {
                if !buffer.is_empty() {
                    let index = elements.len();
                    elements.push(detect_type(&buffer.join("\n"), index));
                    buffer.clear();
                }
                let index = elements.len();
                elements.push(detect_type(line, index));
            } else {
                buffer.push(*line);
            }
        }
        if !buffer.is_empty() {
            let index = elements.len();
            elements.push(detect_type(&buffer.join("\n"), index));
        }
    }
    debug!("Local classifier: {} block(s) → {} element(s)", blocks.len(), elements.len());
    elements
}

fn is_markdown_heading(line: &str) -> bool {
    line.chars().count() < MAX_HEADING_CHARS && RE_MARKDOWN_HEADING.is_match(line)
}

/// Whether line `j` (> 0) of a block is a heading glued to the text above.
fn is_glued_heading(lines: &[&str], j: usize) -> bool {
    let line = lines[j];
    if line.is_empty() || line.chars().count() >= MAX_HEADING_CHARS || contains_placeholder(line) {
        return false;
    }
    if RE_NUM_SUBHEADING.is_match(line)
        || RE_ROMAN.is_match(line)
        || RE_LETTER.is_match(line)
        || RE_KEYWORD.is_match(line)
        || RE_MARKDOWN_HEADING.is_match(line)
    {
        return true;
    }
    match ordinal(line) {
        Some(n) => !continues_sequence(lines, j, n),
        None => false,
    }
}

fn ordinal(line: &str) -> Option<u64> {
    RE_ORDINAL_NUMBER.captures(line)?.get(1)?.as_str().parse().ok()
}

/// A numbered line sits inside an ordered list when its neighbour above is
/// `n - 1` or its neighbour below is `n + 1`.
fn continues_sequence(lines: &[&str], j: usize, n: u64) -> bool {
    let next = lines.get(j + 1).and_then(|l| ordinal(l));
    let prev = j.checked_sub(1).and_then(|p| ordinal(lines[p]));
    n.checked_add(1).is_some_and(|m| next == Some(m))
        || n.checked_sub(1).is_some_and(|m| prev == Some(m))
}

/// Classify one block or pulled-out line. `index` is the element's
/// position in the output so far.
pub fn detect_type(block: &str, index: usize) -> Element {
    let text = block.trim();
    let single_line = !text.contains('\n');
    let len = text.chars().count();

    if is_placeholder_only(text) {
        return Element::paragraph(text);
    }

    // 1. Document title
    if index == 0
        && single_line
        && len < MAX_HEADING_CHARS
        && !text.ends_with('.')
        && !RE_MARKDOWN_HEADING.is_match(text)
        && !contains_placeholder(text)
    {
        return Element::text(ElementKind::H1, text);
    }

    if single_line && len < MAX_HEADING_CHARS {
        // 2. Nested numeric heading
        if let Some(caps) = RE_NUM_SUBHEADING.captures(text) {
            let content = format!("{} {}", &caps[1], &caps[2]);
            return Element::text(ElementKind::SubSubheading, content.trim());
        }
        // 3. Top-level numbered heading
        if let Some(caps) = RE_MAIN_NUMBERED.captures(text) {
            let content = format!("{}. {}", &caps[1], &caps[2]);
            return Element::text(ElementKind::H2, content.trim());
        }
        // 4. Roman numeral heading
        if let Some(caps) = RE_ROMAN.captures(text) {
            let content = format!("{}. {}", caps[1].to_uppercase(), &caps[2]);
            return Element::text(ElementKind::H2, content.trim());
        }
        // 5. Letter heading
        if len < MAX_LETTER_HEADING_CHARS {
            if let Some(caps) = RE_LETTER.captures(text) {
                let content = format!("{}. {}", &caps[1], &caps[2]);
                return Element::text(ElementKind::SubSubheading, content.trim());
            }
        }
        // 6. Standalone section keyword, casing preserved
        if RE_KEYWORD.is_match(text) {
            return Element::text(ElementKind::H2, text);
        }
        // 7. Markdown heading
        if let Some(caps) = RE_MARKDOWN_HEADING.captures(text) {
            return Element::text(ElementKind::heading(caps[1].len()), caps[2].trim());
        }
    }

    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    // 8. Unordered list
    if !lines.is_empty() && lines.iter().all(|l| RE_BULLET.is_match(l)) {
        let items = lines
            .iter()
            .map(|l| RE_BULLET.replace(l, "").trim().to_string())
            .collect();
        return Element::list(ElementKind::UnorderedList, items);
    }
    // 9. Ordered list
    if !lines.is_empty() && lines.iter().all(|l| RE_ORDINAL.is_match(l)) {
        let items = lines
            .iter()
            .map(|l| RE_ORDINAL.replace(l, "").trim().to_string())
            .collect();
        return Element::list(ElementKind::OrderedList, items);
    }

    // 10. Paragraph
    Element::paragraph(text)
}
