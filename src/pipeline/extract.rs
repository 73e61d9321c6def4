//! Pattern extraction: pull diagrams and tables out of the text stream.
//!
//! Diagram source and table markup must survive classification untouched,
//! but classifiers (remote ones especially) rewrite whatever text they see.
//! So before blocking, every recognised region is moved into a
//! [`PayloadArena`] and replaced by an opaque placeholder line:
//!
//! ```text
//! A            %%MERMAID_PLACEHOLDER_0%%      arena[0] = MermaidCode
//! │      ──▶                                  "graph TD\n    A --> B --> C"
//! ▼
//! B ...
//! ```
//!
//! Passes run in a fixed order: fenced diagrams, flows, trees, bar charts,
//! markdown tables. Every pass refuses lines that already contain a
//! placeholder, so no region is extracted twice. Extractors are
//! best-effort; text they do not recognise is left as is.

use crate::element::ElementKind;
use crate::pipeline::diagram;
use crate::pipeline::postprocess::escape_html;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use tracing::debug;

// ── Placeholder tokens ───────────────────────────────────────────────────────

pub const PLACEHOLDER_PREFIX: &str = "%%MERMAID_PLACEHOLDER_";

/// Matches a placeholder token anywhere in text; group 1 is the index.
pub static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%%MERMAID_PLACEHOLDER_(\d+)%%").unwrap());

static RE_PLACEHOLDER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%%MERMAID_PLACEHOLDER_\d+%%$").unwrap());

/// Token for arena slot `index`.
pub fn placeholder(index: usize) -> String {
    format!("{}{}%%", PLACEHOLDER_PREFIX, index)
}

/// `true` if the trimmed text is exactly one placeholder token.
pub fn is_placeholder_only(text: &str) -> bool {
    RE_PLACEHOLDER_LINE.is_match(text.trim())
}

pub fn contains_placeholder(text: &str) -> bool {
    text.contains(PLACEHOLDER_PREFIX)
}

// ── Arena ────────────────────────────────────────────────────────────────────

/// What an extracted payload is; decides the element type on reinjection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadKind {
    /// Diagram source, rendered as `mermaid`.
    MermaidCode,
    /// A finished `<table>` literal, rendered as `html`.
    HtmlTable,
}

impl PayloadKind {
    pub fn element_kind(self) -> ElementKind {
        match self {
            PayloadKind::MermaidCode => ElementKind::Mermaid,
            PayloadKind::HtmlTable => ElementKind::Html,
        }
    }
}

/// One extracted region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedBlock {
    pub kind: PayloadKind,
    pub content: String,
}

/// Append-only store of extracted payloads addressed by placeholder index.
///
/// Indices are dense: the n-th push gets index n and token
/// `%%MERMAID_PLACEHOLDER_n%%`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadArena {
    blocks: Vec<ExtractedBlock>,
}

impl PayloadArena {
    /// Store a payload and return the placeholder token that stands for it.
    pub fn push(&mut self, kind: PayloadKind, content: impl Into<String>) -> String {
        let index = self.blocks.len();
        self.blocks.push(ExtractedBlock {
            kind,
            content: content.into(),
        });
        placeholder(index)
    }

    pub fn get(&self, index: usize) -> Option<&ExtractedBlock> {
        self.blocks.get(index)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtractedBlock> {
        self.blocks.iter()
    }
}

/// Text with placeholders plus the payloads they stand for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub arena: PayloadArena,
}

// ── Orchestration ────────────────────────────────────────────────────────────

/// Run every extraction pass over normalized text.
pub fn extract_payloads(normalized: &str) -> Extraction {
    let mut arena = PayloadArena::default();

    // Literal tokens in the input would alias arena slots; break them with
    // an invisible word joiner.
    let text = normalized.replace(PLACEHOLDER_PREFIX, "%%MERMAID\u{2060}_PLACEHOLDER_");

    let text = extract_fenced(&text, &mut arena);
    let text = replace_line_runs(&text, &mut arena, PayloadKind::MermaidCode, diagram::match_flow);
    let text = replace_line_runs(&text, &mut arena, PayloadKind::MermaidCode, diagram::match_tree);
    let text = replace_line_runs(&text, &mut arena, PayloadKind::MermaidCode, diagram::match_bar_chart);
    let text = replace_line_runs(&text, &mut arena, PayloadKind::HtmlTable, match_table);

    debug!("Extracted {} payload(s)", arena.len());
    Extraction { text, arena }
}

static RE_FENCED_MERMAID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```mermaid[ \t]*\n(.*?)```").unwrap());

/// Pass 1: ```` ```mermaid ```` fences, extracted verbatim (trimmed).
fn extract_fenced(text: &str, arena: &mut PayloadArena) -> String {
    RE_FENCED_MERMAID
        .replace_all(text, |caps: &Captures<'_>| {
            let token = arena.push(PayloadKind::MermaidCode, caps[1].trim());
            format!("\n\n{}\n\n", token)
        })
        .into_owned()
}

/// A line-based detector hit: lines `[start, end)` become one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    pub end: usize,
    pub payload: String,
}

/// Detector signature: try to match a region starting exactly at `start`.
pub type LineMatcher = fn(&[&str], usize) -> Option<LineMatch>;

/// Scan line by line, replacing each region `matcher` accepts with a
/// placeholder surrounded by blank lines.
fn replace_line_runs(
    text: &str,
    arena: &mut PayloadArena,
    kind: PayloadKind,
    matcher: LineMatcher,
) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        match matcher(&lines, i) {
            Some(m) if m.end > i => {
                let token = arena.push(kind, m.payload);
                out.push(String::new());
                out.push(token);
                out.push(String::new());
                i = m.end;
            }
            _ => {
                out.push(lines[i].to_string());
                i += 1;
            }
        }
    }
    out.join("\n")
}

// ── Markdown tables ──────────────────────────────────────────────────────────

const TABLE_STYLE: &str = "width: 100%; border-collapse: collapse; margin: 12pt 0; page-break-inside: avoid;";
const TH_STYLE: &str = "border: 1px solid #cccccc; padding: 6px 8px; background-color: #f5f5f5; text-align: left; font-weight: bold;";
const TD_STYLE: &str = "border: 1px solid #cccccc; padding: 6px 8px; vertical-align: top;";

fn is_table_row(line: &str) -> bool {
    let t = line.trim();
    t.contains('|') && !contains_placeholder(t) && !is_table_separator(t)
}

fn is_table_separator(line: &str) -> bool {
    let t = line.trim();
    t.contains('|')
        && t.contains('-')
        && t.chars().all(|c| matches!(c, '|' | '-' | ':' | ' ' | '\t'))
}

fn split_cells(line: &str) -> Vec<String> {
    let t = line.trim();
    let t = t.strip_prefix('|').unwrap_or(t);
    let t = t.strip_suffix('|').unwrap_or(t);
    t.split('|').map(|c| c.trim().to_string()).collect()
}

/// Pass 5: header row, separator row, one or more data rows.
pub fn match_table(lines: &[&str], start: usize) -> Option<LineMatch> {
    if start + 2 >= lines.len()
        || !is_table_row(lines[start])
        || !is_table_separator(lines[start + 1])
    {
        return None;
    }
    let mut end = start + 2;
    while end < lines.len() && is_table_row(lines[end]) {
        end += 1;
    }
    if end == start + 2 {
        return None;
    }

    let header = split_cells(lines[start]);
    let rows: Vec<Vec<String>> = lines[start + 2..end].iter().map(|l| split_cells(l)).collect();
    Some(LineMatch {
        end,
        payload: table_html(&header, &rows),
    })
}

/// Build the `<table>` literal. Short rows are padded to the header width.
fn table_html(header: &[String], rows: &[Vec<String>]) -> String {
    let mut html = format!("<table style=\"{}\">\n<thead><tr>", TABLE_STYLE);
    for cell in header {
        html.push_str(&format!("<th style=\"{}\">{}</th>", TH_STYLE, escape_html(cell)));
    }
    html.push_str("</tr></thead>\n<tbody>\n");
    for row in rows {
        html.push_str("<tr>");
        let width = row.len().max(header.len());
        for col in 0..width {
            let cell = row.get(col).map(String::as_str).unwrap_or("");
            html.push_str(&format!("<td style=\"{}\">{}</td>", TD_STYLE, escape_html(cell)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>");
    html
}
