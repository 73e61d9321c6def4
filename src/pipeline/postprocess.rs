//! Post-processing: deterministic cleanup of classified text.
//!
//! Two rule chains live here:
//!
//! 1. [`clean_markdown`] runs inside the renderer on already-escaped text.
//!    Classifiers (remote ones especially) leave markdown emphasis, leaked
//!    heading hashes, reference markers and chat-assistant filler in the
//!    content; each rule removes or converts one of those artefacts.
//!
//! 2. [`sanitize_remote`] is the local enforcement of the rules the remote
//!    classifier is instructed to follow: floating page numbers and
//!    conversational filler are dropped, mangled trailing citations are
//!    rebuilt as one bracket per number, and headings glued to their body
//!    text are split. Models follow these instructions most of the time;
//!    this chain makes the result independent of that.
//!
//! Every rule is a pure `&str → String` (or `Vec<Element> → Vec<Element>`)
//! function so rules can be reordered or tested in isolation.

use crate::element::{Element, ElementKind};
use crate::error::ClassificationError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

// ── HTML escaping ────────────────────────────────────────────────────────────

/// Escape the five HTML-significant characters.
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#039;"),
            _ => result.push(c),
        }
    }
    result
}

// ── Markdown cleanup (renderer side) ─────────────────────────────────────────

static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static RE_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.+?)\*").unwrap());
static RE_STAR_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*{2,}").unwrap());
static RE_HEADING_HASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+").unwrap());
static RE_REFERENCE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\[\d+\]").unwrap());
static RE_MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static RE_FILLER_INTRO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:Here is|Here's|Here&#039;s|Below is|Sure, here is)(.+?)(?:diagram|chart|flowchart|table|code|format)[.:]\s*",
    )
    .unwrap()
});
static RE_FILLER_EXCLAMATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:Certainly!|Sure!|Of course!)\s*").unwrap());
static RE_MULTI_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

/// Convert markdown emphasis to `<b>`/`<i>` and strip markdown artefacts.
///
/// Input must already be HTML-escaped: the only tags in the output are the
/// ones this function inserts.
///
/// Rules (applied in order):
/// 1. `**bold**` → `<b>bold</b>` (before single `*`)
/// 2. `*italic*` → `<i>italic</i>`
/// 3. Leftover `**` runs removed
/// 4. Lone `*` not touching a word character removed
/// 5. Leading `#` heading markers removed on every line
/// 6. Numeric reference markers `[n]` removed
/// 7. `[text](url)` collapsed to `text`
/// 8. Leading chat-assistant filler ("Here is the diagram:", "Sure!") removed
/// 9. Whitespace runs collapsed to one space, outer whitespace trimmed
pub fn clean_markdown(input: &str) -> String {
    let s = RE_BOLD.replace_all(input, "<b>$1</b>");
    let s = RE_ITALIC.replace_all(&s, "<i>$1</i>");
    let s = RE_STAR_RUN.replace_all(&s, "");
    let s = strip_lone_asterisks(&s);
    let s = RE_HEADING_HASHES.replace_all(&s, "");
    let s = RE_REFERENCE_MARKER.replace_all(&s, "");
    let s = RE_MARKDOWN_LINK.replace_all(&s, "$1");
    let s = RE_FILLER_INTRO.replace(&s, "");
    let s = RE_FILLER_EXCLAMATION.replace(&s, "");
    let s = RE_MULTI_WHITESPACE.replace_all(&s, " ");
    s.trim().to_string()
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Remove `*` characters with no word character on either side.
fn strip_lone_asterisks(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == '*' {
            let prev_word = i > 0 && is_word_char(chars[i - 1]);
            let next_word = chars.get(i + 1).is_some_and(|&n| is_word_char(n));
            if !prev_word && !next_word {
                continue;
            }
        }
        out.push(c);
    }
    out
}

static RE_BULLET_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*•+]\s+").unwrap());
static RE_NUMBER_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\s+").unwrap());

/// Strip a residual leading bullet or `n.` marker from a list item.
pub fn strip_list_marker(item: &str) -> String {
    let s = RE_BULLET_MARKER.replace(item.trim(), "");
    RE_NUMBER_MARKER.replace(&s, "").to_string()
}

/// Remove `<b>`/`<i>` tags, used for headings which carry their own weight.
pub fn strip_emphasis_tags(input: &str) -> String {
    input
        .replace("<b>", "")
        .replace("</b>", "")
        .replace("<i>", "")
        .replace("</i>", "")
}

// ── Remote output validation ─────────────────────────────────────────────────

/// Check every element against the content/items contract.
///
/// Unknown types, text elements without `content` and lists with neither
/// `items` nor `content` are violations. So are `mermaid` and `html`: the
/// renderer inserts those verbatim, and only the extraction arena may
/// produce them. A list carrying `content` instead of `items` is tolerated;
/// the renderer splits it.
pub fn validate_elements(elements: &[Element]) -> Result<(), ClassificationError> {
    for (index, el) in elements.iter().enumerate() {
        if !el.kind.is_known() {
            return Err(ClassificationError::SchemaViolation {
                index,
                detail: format!("unknown type '{}'", el.kind),
            });
        }
        if el.kind.is_payload() {
            return Err(ClassificationError::SchemaViolation {
                index,
                detail: format!("'{}' elements are not accepted from a classifier", el.kind),
            });
        }
        if el.kind.is_list() {
            if el.items.is_none() && el.content.is_none() {
                return Err(ClassificationError::SchemaViolation {
                    index,
                    detail: format!("'{}' has neither items nor content", el.kind),
                });
            }
        } else if el.content.is_none() {
            return Err(ClassificationError::SchemaViolation {
                index,
                detail: format!("'{}' is missing content", el.kind),
            });
        }
    }
    Ok(())
}

/// Apply the cleanup rules the remote classifier is instructed to follow.
///
/// Rules (applied in order):
/// 1. Drop floating noise elements (lone page numbers)
/// 2. Drop conversational filler elements
/// 3. Rebuild trailing citation clusters on paragraphs
/// 4. Split headings glued to their body text
pub fn sanitize_remote(elements: Vec<Element>) -> Vec<Element> {
    let kept: Vec<Element> = elements
        .into_iter()
        .filter(|el| {
            if el.kind.is_payload() || el.kind == ElementKind::Code || el.kind.is_list() {
                return true;
            }
            let text = el.content_str();
            !is_floating_noise(text) && !is_conversational_filler(text)
        })
        .map(|el| {
            if el.kind == ElementKind::Paragraph {
                let repaired = repair_citations(el.content_str());
                el.with_content(repaired)
            } else {
                el
            }
        })
        .collect();
    split_heading_body(kept)
}

static RE_FLOATING_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:page\s+)?\d{1,4}(?:\s+of\s+\d{1,4})?\s*$").unwrap());

/// A stray page number: `"12"`, `"Page 4"`, `"Page 4 of 10"`.
pub fn is_floating_noise(text: &str) -> bool {
    RE_FLOATING_NOISE.is_match(text)
}

static RE_FILLER_LEADIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:here is|here's|here are|below is|below are|sure,? here is|sure,? here's|as requested)\b")
        .unwrap()
});
static RE_FILLER_SUBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:diagram|chart|flowchart|table|code|format|formatted|requested|version|text|summary)\b")
        .unwrap()
});
static RE_FILLER_AFFIRMATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:sure|certainly|of course|absolutely)!").unwrap());
static RE_FILLER_FEEDBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:let me know if|i hope this helps|hope this helps|feel free to|would you like me to|do you want me to|is there anything else)",
    )
    .unwrap()
});

/// Chat-assistant boilerplate that is not document content.
pub fn is_conversational_filler(text: &str) -> bool {
    let t = text.trim();
    if t.is_empty() || t.contains('\n') || t.chars().count() > 160 {
        return false;
    }
    if RE_FILLER_AFFIRMATION.is_match(t) || RE_FILLER_FEEDBACK.is_match(t) {
        return true;
    }
    RE_FILLER_LEADIN.is_match(t) && (t.ends_with(':') || RE_FILLER_SUBJECT.is_match(t))
}

static RE_CITATION_TAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(?P<body>.*?[^\s\[\]()\d,.;])(?P<tail>[\s\[\]()\d,.;]*\d[\s\[\]()\d,.;]*)$")
        .unwrap()
});
static RE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static RE_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d\.\d").unwrap());

/// Rebuild an OCR-mangled citation cluster at the end of a paragraph.
///
/// * A tail mixing digits and bracket glyphs (`"[1], 12), [31, (4]"`) is a
///   citation cluster: numbers 1–5 become one `[n]` each, all others are
///   dropped.
/// * A bare trailing number closing a sentence (`"energy 4."`) carries no
///   bracket evidence and is dropped as noise, even when it is in 1–5
///   (`"We tested 3."` becomes `"We tested."`).
/// * Decimal tails and numbers of four or more digits (years) are kept.
pub fn repair_citations(text: &str) -> String {
    let Some(caps) = RE_CITATION_TAIL.captures(text) else {
        return text.to_string();
    };
    let body = &caps["body"];
    let tail = &caps["tail"];

    if !tail.starts_with(|c: char| c.is_whitespace() || c == '[' || c == '(') {
        return text.to_string();
    }
    if RE_DECIMAL.is_match(tail) {
        return text.to_string();
    }
    let numbers: Vec<&str> = RE_DIGITS.find_iter(tail).map(|m| m.as_str()).collect();
    if numbers.iter().any(|n| n.len() >= 4) {
        return text.to_string();
    }

    let bracketed = tail.contains(['[', ']', '(', ')']);
    let closes_sentence = tail.contains('.');
    if !bracketed && !closes_sentence {
        return text.to_string();
    }

    let mut citations: Vec<u32> = Vec::new();
    if bracketed {
        for n in numbers.iter().filter_map(|n| n.parse::<u32>().ok()) {
            if (1..=5).contains(&n) && !citations.contains(&n) {
                citations.push(n);
            }
        }
    }
    let cited: String = citations.iter().map(|n| format!(" [{}]", n)).collect();

    let mut out = body.to_string();
    if tail.trim_start().starts_with('.') {
        out.push('.');
        out.push_str(&cited);
    } else {
        out.push_str(&cited);
        if closes_sentence {
            out.push('.');
        }
    }
    out
}

// ── Heading / body split ─────────────────────────────────────────────────────

static RE_GLUED_SECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)^(?P<head>(?P<marker>(?:\d+(?:\.\d+)*\.?|[IVX]+\.|[A-Z]\.)\s+)?(?:Abstract|Introduction|Background|Related Work|Literature Review|Materials and Methods|Methodology|Methods|Results and Discussion|Results|Discussion|Evaluation|Experiments|Conclusions?|Future Work|References|Acknowledg(?:e)?ments?|Overview|Summary|Keywords))[:.]?\s+(?P<body>[A-Z].*)$",
    )
    .unwrap()
});

/// Split `"1. Introduction The rapid evolution…"` into a heading and a
/// paragraph.
///
/// Applies to heading elements, and to paragraphs that open with a section
/// number (those become `h2`). The body must be at least three words so
/// two-word titles like "Results Overview" stay intact.
pub fn split_heading_body(elements: Vec<Element>) -> Vec<Element> {
    let mut out = Vec::with_capacity(elements.len());
    for el in elements {
        match split_one(&el) {
            Some((heading, body)) => {
                out.push(heading);
                out.push(body);
            }
            None => out.push(el),
        }
    }
    out
}

fn split_one(el: &Element) -> Option<(Element, Element)> {
    let is_numbered_paragraph = el.kind == ElementKind::Paragraph;
    if !el.kind.is_heading() && !is_numbered_paragraph {
        return None;
    }
    let content = el.content.as_deref()?.trim();
    let caps: Captures<'_> = RE_GLUED_SECTION.captures(content)?;
    if is_numbered_paragraph && caps.name("marker").is_none() {
        return None;
    }
    let body = caps["body"].trim();
    if body.split_whitespace().count() < 3 {
        return None;
    }
    let kind = if is_numbered_paragraph {
        ElementKind::H2
    } else {
        el.kind.clone()
    };
    Some((
        Element::text(kind, caps["head"].trim()),
        Element::paragraph(body),
    ))
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<script>"), "&lt;script&gt;");
        assert_eq!(escape_html("a & b"), "a &amp; b");
        assert_eq!(escape_html("it's \"x\""), "it&#039;s &quot;x&quot;");
    }

    #[test]
    fn test_bold_and_italic() {
        assert_eq!(clean_markdown("**bold** and *it*"), "<b>bold</b> and <i>it</i>");
    }

    #[test]
    fn test_orphan_asterisks_removed() {
        assert_eq!(clean_markdown("a * b"), "a b");
        assert_eq!(clean_markdown("5*3 stays"), "5*3 stays");
        assert_eq!(clean_markdown("dangling ** marker"), "dangling marker");
    }

    #[test]
    fn test_heading_hashes_removed() {
        assert_eq!(clean_markdown("## Title"), "Title");
    }

    #[test]
    fn test_reference_markers_removed() {
        assert_eq!(clean_markdown("as shown [1] [2]."), "as shown.");
    }

    #[test]
    fn test_link_collapsed() {
        assert_eq!(
            clean_markdown("see [the docs](https://x.y/z) now"),
            "see the docs now"
        );
    }

    #[test]
    fn test_filler_intro_removed() {
        assert_eq!(
            clean_markdown("Here is the requested diagram: Real content"),
            "Real content"
        );
        assert_eq!(
            clean_markdown(&escape_html("Here's your table. Data follows")),
            "Data follows"
        );
        assert_eq!(clean_markdown("Certainly! Body"), "Body");
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(clean_markdown("  a    b\t\tc  "), "a b c");
    }

    #[test]
    fn test_strip_list_marker() {
        assert_eq!(strip_list_marker("- item"), "item");
        assert_eq!(strip_list_marker("• item"), "item");
        assert_eq!(strip_list_marker("3. item"), "item");
        assert_eq!(strip_list_marker("plain"), "plain");
    }

    #[test]
    fn test_bare_trailing_number_dropped() {
        assert_eq!(
            repair_citations("This approach improves energy 4."),
            "This approach improves energy."
        );
    }

    #[test]
    fn test_mangled_cluster_rebuilt() {
        assert_eq!(
            repair_citations("Prior work exists [1], 12), [31, (4]"),
            "Prior work exists [1] [4]"
        );
        assert_eq!(repair_citations("Results hold [1] [21."), "Results hold [1].");
    }

    #[test]
    fn test_comma_group_split() {
        assert_eq!(repair_citations("Shown before [1, 2, 4]."), "Shown before [1] [2] [4].");
    }

    #[test]
    fn test_clean_citations_untouched() {
        let s = "Shown before [1] [2].";
        assert_eq!(repair_citations(s), s);
    }

    #[test]
    fn test_years_and_decimals_kept() {
        assert_eq!(repair_citations("It was released in 2024."), "It was released in 2024.");
        assert_eq!(repair_citations("The ratio is 3.5"), "The ratio is 3.5");
        assert_eq!(repair_citations("COVID-19"), "COVID-19");
    }

    #[test]
    fn test_floating_noise() {
        assert!(is_floating_noise("12"));
        assert!(is_floating_noise("Page 4"));
        assert!(is_floating_noise("page 4 of 10"));
        assert!(!is_floating_noise("12 monkeys"));
    }

    #[test]
    fn test_conversational_filler() {
        assert!(is_conversational_filler("Here is the diagram you requested:"));
        assert!(is_conversational_filler("Sure! Let me format that."));
        assert!(is_conversational_filler("Let me know if you want changes."));
        assert!(!is_conversational_filler(
            "Here is where the experiment diverges from prior results"
        ));
        assert!(!is_conversational_filler("Results are summarised below."));
    }

    #[test]
    fn test_split_numbered_heading() {
        let out = split_heading_body(vec![Element::text(
            ElementKind::H2,
            "1. Introduction The rapid evolution of AI...",
        )]);
        assert_eq!(
            out,
            vec![
                Element::text(ElementKind::H2, "1. Introduction"),
                Element::paragraph("The rapid evolution of AI..."),
            ]
        );
    }

    #[test]
    fn test_split_leaves_short_titles() {
        let el = Element::text(ElementKind::H2, "2. Results Overview");
        assert_eq!(split_heading_body(vec![el.clone()]), vec![el]);
    }

    #[test]
    fn test_unnumbered_paragraph_not_split() {
        let el = Element::paragraph("Introduction The word opens this sentence oddly.");
        assert_eq!(split_heading_body(vec![el.clone()]), vec![el]);
    }

    #[test]
    fn test_validate_rejects_unknown_type() {
        let els = vec![Element::text(ElementKind::Other("table".into()), "x")];
        assert!(matches!(
            validate_elements(&els),
            Err(ClassificationError::SchemaViolation { index: 0, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_missing_content() {
        let els = vec![
            Element::paragraph("ok"),
            Element {
                kind: ElementKind::H2,
                content: None,
                items: None,
            },
        ];
        assert!(matches!(
            validate_elements(&els),
            Err(ClassificationError::SchemaViolation { index: 1, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_payload_types() {
        let raw = r#"[{"type":"html","content":"<img src=x onerror=alert(1)>"}]"#;
        let els: Vec<Element> = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            validate_elements(&els),
            Err(ClassificationError::SchemaViolation { index: 0, .. })
        ));
        let els = vec![
            Element::paragraph("fine"),
            Element::text(ElementKind::Mermaid, "</pre><script>alert(2)</script>"),
        ];
        assert!(matches!(
            validate_elements(&els),
            Err(ClassificationError::SchemaViolation { index: 1, .. })
        ));
    }

    #[test]
    fn test_bare_in_range_number_dropped() {
        assert_eq!(repair_citations("We tested 3."), "We tested.");
    }

    #[test]
    fn test_validate_tolerates_list_with_content() {
        let els = vec![Element::text(ElementKind::UnorderedList, "a\nb")];
        assert!(validate_elements(&els).is_ok());
    }

    #[test]
    fn test_sanitize_remote_pipeline() {
        let els = vec![
            Element::paragraph("Sure! Here is the formatted text:"),
            Element::text(ElementKind::H1, "Energy Systems"),
            Element::paragraph("This approach improves energy 4."),
            Element::paragraph("12"),
            Element::list(ElementKind::UnorderedList, vec!["12".into()]),
        ];
        let out = sanitize_remote(els);
        assert_eq!(
            out,
            vec![
                Element::text(ElementKind::H1, "Energy Systems"),
                Element::paragraph("This approach improves energy."),
                Element::list(ElementKind::UnorderedList, vec!["12".into()]),
            ]
        );
    }
}
