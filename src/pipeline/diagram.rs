//! Text-art diagram recognisers.
//!
//! Each `match_*` function is a [`LineMatcher`](crate::pipeline::extract::LineMatcher):
//! given the document lines and a start index it either claims a run of
//! lines and returns generated diagram source, or returns `None`.
//!
//! | Recogniser | Input | Output |
//! |------------|-------|--------|
//! | [`match_flow`] | label / arrow line / label … | `graph TD` chain |
//! | [`match_tree`] | root line + `├──` / `└──` branches | `graph TD` edges |
//! | [`match_bar_chart`] | `label ████ 42%` lines | `xychart-beta` |
//!
//! User text ends up inside diagram source, so labels are quoted and the
//! characters that would break out of a label or the surrounding `<pre>`
//! are replaced by diagram entity codes.

use crate::pipeline::extract::{contains_placeholder, LineMatch};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

const BAR_GLYPHS: &[char] = &['█', '▓', '▒', '░', '■', '▉', '▊', '▋', '▌', '▍', '▎', '▏'];
const TREE_GLYPHS: &[char] = &['├', '└', '│'];

/// Escape text for use inside a quoted node label.
fn label_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("#quot;"),
            '<' => out.push_str("#lt;"),
            '>' => out.push_str("#gt;"),
            '&' => out.push_str("#amp;"),
            _ => out.push(c),
        }
    }
    out
}

// ── Linear flows ─────────────────────────────────────────────────────────────

static RE_CONNECTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\s│┃|▼↓⇓⬇→⟶➔➜➡v>\-─=]+$").unwrap());
static RE_ARROW_GLYPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[│┃|▼↓⇓⬇→⟶➔➜➡]|^v$|>$").unwrap());
static RE_SIMPLE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap());

const RESERVED_IDS: &[&str] = &[
    "end", "graph", "subgraph", "flowchart", "style", "class", "classdef", "click",
    "linkstyle", "direction", "td", "tb", "bt", "lr", "rl",
];

/// A line made only of arrow and pipe glyphs (`│`, `▼`, `-->`, `v`).
/// A bare `---` rule is not a connector.
pub fn is_connector(line: &str) -> bool {
    let t = line.trim();
    !t.is_empty()
        && t.chars().count() <= 12
        && RE_CONNECTOR.is_match(t)
        && RE_ARROW_GLYPH.is_match(t)
}

fn is_flow_label(line: &str) -> bool {
    let t = line.trim();
    !t.is_empty()
        && t.chars().count() <= 60
        && !is_connector(t)
        && !t.contains('|')
        && !t.contains(TREE_GLYPHS)
        && !t.contains(BAR_GLYPHS)
        && !contains_placeholder(t)
}

/// `label (connector+ label){2,}` starting at `start`.
pub fn match_flow(lines: &[&str], start: usize) -> Option<LineMatch> {
    if !is_flow_label(lines[start]) {
        return None;
    }
    let mut labels = vec![lines[start].trim()];
    let mut end = start + 1;
    loop {
        let mut k = end;
        while k < lines.len() && is_connector(lines[k]) {
            k += 1;
        }
        if k == end || k >= lines.len() || !is_flow_label(lines[k]) {
            break;
        }
        labels.push(lines[k].trim());
        end = k + 1;
    }
    if labels.len() < 3 {
        return None;
    }
    Some(LineMatch {
        end,
        payload: flow_source(&labels),
    })
}

/// `graph TD` with every label linked to the next in one chain.
///
/// Plain identifiers are used as their own node ids; anything else gets a
/// generated id and a quoted label. Repeated labels reuse their node.
pub fn flow_source(labels: &[&str]) -> String {
    let mut ids: HashMap<&str, String> = HashMap::new();
    let mut chain: Vec<String> = Vec::with_capacity(labels.len());
    for (i, label) in labels.iter().enumerate() {
        if let Some(id) = ids.get(label) {
            chain.push(id.clone());
            continue;
        }
        let simple = RE_SIMPLE_ID.is_match(label)
            && !RESERVED_IDS.contains(&label.to_lowercase().as_str());
        let (id, first_use) = if simple {
            (label.to_string(), label.to_string())
        } else {
            let id = format!("node{}", i);
            let decl = format!("{}[\"{}\"]", id, label_text(label));
            (id, decl)
        };
        ids.insert(*label, id);
        chain.push(first_use);
    }
    format!("graph TD\n    {}", chain.join(" --> "))
}

// ── Trees ────────────────────────────────────────────────────────────────────

static RE_TREE_BRANCH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<prefix>[ \t│]*)[├└]─+\s*(?P<name>\S.*)$").unwrap());

fn is_pipe_only(line: &str) -> bool {
    let t = line.trim();
    !t.is_empty() && t.chars().all(|c| c == '│')
}

fn indent_width(prefix: &str) -> usize {
    prefix.chars().map(|c| if c == '\t' { 4 } else { 1 }).sum()
}

fn is_tree_root(line: &str) -> bool {
    let t = line.trim();
    !t.is_empty()
        && t.chars().count() <= 80
        && !RE_TREE_BRANCH.is_match(line)
        && !is_pipe_only(t)
        && !t.contains(BAR_GLYPHS)
        && !contains_placeholder(t)
}

/// Root line followed by branch lines; depth is indent / 4 + 1.
pub fn match_tree(lines: &[&str], start: usize) -> Option<LineMatch> {
    if !is_tree_root(lines[start]) {
        return None;
    }
    let mut nodes: Vec<&str> = vec![lines[start].trim()];
    let mut edges: Vec<(usize, usize)> = Vec::new();
    // stack[d] is the most recent node at depth d
    let mut stack: Vec<usize> = vec![0];
    let mut end = start + 1;

    while end < lines.len() {
        if is_pipe_only(lines[end]) {
            end += 1;
            continue;
        }
        let Some(caps) = RE_TREE_BRANCH.captures(lines[end]) else {
            break;
        };
        let name = caps.name("name").map(|m| m.as_str().trim()).unwrap_or("");
        if name.is_empty() || contains_placeholder(name) {
            break;
        }
        let depth = indent_width(&caps["prefix"]) / 4 + 1;
        stack.truncate(depth);
        let parent = stack.last().copied().unwrap_or(0);
        let child = nodes.len();
        nodes.push(name);
        edges.push((parent, child));
        stack.push(child);
        end += 1;
    }

    if nodes.len() < 3 || edges.len() < 2 {
        return None;
    }
    Some(LineMatch {
        end,
        payload: tree_source(&nodes, &edges),
    })
}

pub fn tree_source(nodes: &[&str], edges: &[(usize, usize)]) -> String {
    let mut out = String::from("graph TD");
    for (i, name) in nodes.iter().enumerate() {
        out.push_str(&format!("\n    N{}[\"{}\"]", i, label_text(name)));
    }
    for (parent, child) in edges {
        out.push_str(&format!("\n    N{} --> N{}", parent, child));
    }
    out
}

// ── Bar charts ───────────────────────────────────────────────────────────────

static RE_BAR_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<label>\S.*?)\s*[:|]?\s*[█▓▒░■▉▊▋▌▍▎▏]+\s*(?P<value>\d+(?:\.\d+)?)\s*%\s*$")
        .unwrap()
});

fn parse_bar(line: &str) -> Option<(&str, f64)> {
    let caps = RE_BAR_LINE.captures(line)?;
    let label = caps.name("label")?.as_str().trim();
    let value = caps.name("value")?.as_str().parse::<f64>().ok()?;
    if contains_placeholder(label) {
        return None;
    }
    Some((label, value))
}

fn is_chart_title(line: &str) -> bool {
    let t = line.trim();
    !t.is_empty()
        && t.chars().count() <= 80
        && !t.ends_with('.')
        && !t.contains(BAR_GLYPHS)
        && !contains_placeholder(t)
}

/// Two or more consecutive bar lines, with an optional title line before.
pub fn match_bar_chart(lines: &[&str], start: usize) -> Option<LineMatch> {
    let (title, first) = if parse_bar(lines[start]).is_none()
        && is_chart_title(lines[start])
        && start + 1 < lines.len()
        && parse_bar(lines[start + 1]).is_some()
    {
        (Some(lines[start].trim()), start + 1)
    } else {
        (None, start)
    };

    let mut bars: Vec<(&str, f64)> = Vec::new();
    let mut end = first;
    while end < lines.len() {
        match parse_bar(lines[end]) {
            Some(bar) => bars.push(bar),
            None => break,
        }
        end += 1;
    }
    if bars.len() < 2 {
        return None;
    }
    Some(LineMatch {
        end,
        payload: bar_chart_source(title, &bars),
    })
}

/// Chart labels sit inside double quotes; there is no entity escape there.
fn chart_text(s: &str) -> String {
    s.replace('"', "'").replace(['<', '>'], "")
}

/// Y-axis maximum: next multiple of ten above the largest value, plus ten.
pub fn y_axis_max(values: impl Iterator<Item = f64>) -> u64 {
    let max = values.fold(0.0_f64, f64::max);
    ((max / 10.0).ceil() * 10.0 + 10.0) as u64
}

pub fn bar_chart_source(title: Option<&str>, bars: &[(&str, f64)]) -> String {
    let mut out = String::from("xychart-beta");
    if let Some(t) = title {
        out.push_str(&format!("\n    title \"{}\"", chart_text(t)));
    }
    let labels: Vec<String> = bars
        .iter()
        .map(|(l, _)| format!("\"{}\"", chart_text(l)))
        .collect();
    let values: Vec<String> = bars.iter().map(|(_, v)| v.to_string()).collect();
    out.push_str(&format!("\n    x-axis [{}]", labels.join(", ")));
    out.push_str(&format!(
        "\n    y-axis \"Percentage (%)\" 0 --> {}",
        y_axis_max(bars.iter().map(|(_, v)| *v))
    ));
    out.push_str(&format!("\n    bar [{}]", values.join(", ")));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(s: &str) -> Vec<&str> {
        s.split('\n').collect()
    }

    #[test]
    fn vertical_flow_becomes_chain() {
        let l = lines("A\n│\n▼\nB\n│\n▼\nC");
        let m = match_flow(&l, 0).unwrap();
        assert_eq!(m.end, 7);
        assert_eq!(m.payload, "graph TD\n    A --> B --> C");
    }

    #[test]
    fn flow_labels_with_spaces_are_quoted() {
        let l = lines("Raw \"input\"\n↓\nclean up\n↓\nend");
        let m = match_flow(&l, 0).unwrap();
        assert_eq!(
            m.payload,
            "graph TD\n    node0[\"Raw #quot;input#quot;\"] --> node1[\"clean up\"] --> node2[\"end\"]"
        );
    }

    #[test]
    fn flow_needs_two_edges() {
        let l = lines("A\n↓\nB");
        assert!(match_flow(&l, 0).is_none());
    }

    #[test]
    fn horizontal_rule_is_not_connector() {
        assert!(!is_connector("---"));
        assert!(is_connector("  │  "));
        assert!(is_connector("-->"));
        assert!(is_connector("v"));
        let l = lines("A\n---\nB\n---\nC");
        assert!(match_flow(&l, 0).is_none());
    }

    #[test]
    fn tree_with_nested_branches() {
        let l = lines("project\n├── src\n│   ├── main.rs\n│   └── lib.rs\n└── Cargo.toml\nAfter tree.");
        let m = match_tree(&l, 0).unwrap();
        assert_eq!(m.end, 5);
        assert!(m.payload.starts_with("graph TD\n    N0[\"project\"]"));
        assert!(m.payload.contains("N0 --> N1"));
        assert!(m.payload.contains("N1 --> N2"));
        assert!(m.payload.contains("N1 --> N3"));
        assert!(m.payload.contains("N0 --> N4"));
    }

    #[test]
    fn tree_needs_three_nodes() {
        let l = lines("root\n└── only");
        assert!(match_tree(&l, 0).is_none());
    }

    #[test]
    fn bar_chart_with_title() {
        let l = lines("Market share\nAlpha ████████ 45%\nBeta █████ 30%\nGamma ██ 12.5%");
        let m = match_bar_chart(&l, 0).unwrap();
        assert_eq!(m.end, 4);
        assert_eq!(
            m.payload,
            "xychart-beta\n    title \"Market share\"\n    x-axis [\"Alpha\", \"Beta\", \"Gamma\"]\n    y-axis \"Percentage (%)\" 0 --> 60\n    bar [45, 30, 12.5]"
        );
    }

    #[test]
    fn bar_chart_needs_two_lines() {
        let l = lines("Alpha ████ 45%\nplain");
        assert!(match_bar_chart(&l, 0).is_none());
    }

    #[test]
    fn y_axis_rounding() {
        assert_eq!(y_axis_max([45.0, 30.0].into_iter()), 60);
        assert_eq!(y_axis_max([50.0].into_iter()), 60);
        assert_eq!(y_axis_max([3.0].into_iter()), 20);
    }
}
