//! Integration tests for edgequake-text2html.
//!
//! Everything runs offline: remote strategies are replaced by stub
//! `Classifier` implementations that return canned JSON or canned errors,
//! so the fallback chain, remote cleanup and rendering are exercised end
//! to end without an API key.

use async_trait::async_trait;
use edgequake_text2html::pipeline::classify::{finish_remote, parse_elements};
use edgequake_text2html::pipeline::render::render_html;
use edgequake_text2html::pipeline::tokenize::{tokenize, Tokenized};
use edgequake_text2html::{
    convert_local, convert_to_file, convert_with_chain, ClassificationError, Classifier,
    ClassifierChain, ClassifierKind, Commit, Element, ElementKind, FailureClass, FormatConfig,
    Formatter, RuleEngine, StyleOverrides,
};
use edgequake_text2html::pipeline::heuristic::LocalClassifier;
use pretty_assertions::assert_eq;
use std::time::Duration;

// ── Stub classifiers ─────────────────────────────────────────────────────────

/// Plays back a canned remote JSON reply through the remote cleanup path.
struct Scripted(&'static str);

#[async_trait]
impl Classifier for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }
    fn kind(&self) -> ClassifierKind {
        ClassifierKind::Llm
    }
    async fn classify(&self, _: &Tokenized) -> Result<Vec<Element>, ClassificationError> {
        finish_remote(parse_elements(self.0)?)
    }
}

/// Always fails with the given error.
struct Failing(ClassificationError);

#[async_trait]
impl Classifier for Failing {
    fn name(&self) -> &str {
        "failing"
    }
    fn kind(&self) -> ClassifierKind {
        ClassifierKind::Endpoint
    }
    async fn classify(&self, _: &Tokenized) -> Result<Vec<Element>, ClassificationError> {
        Err(self.0.clone())
    }
}

/// Echoes the text as one paragraph, slowly when it contains "slow".
struct Delayed;

#[async_trait]
impl Classifier for Delayed {
    fn name(&self) -> &str {
        "delayed"
    }
    fn kind(&self) -> ClassifierKind {
        ClassifierKind::Llm
    }
    async fn classify(&self, doc: &Tokenized) -> Result<Vec<Element>, ClassificationError> {
        let text = doc.text();
        if text.contains("slow") {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok(vec![Element::paragraph(text)])
    }
}

fn local(text: &str) -> Vec<Element> {
    convert_local(text, &FormatConfig::local()).elements
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[test]
fn glued_heading_is_split_from_body() {
    assert_eq!(
        local("1. Introduction The rapid evolution of AI..."),
        vec![
            Element::text(ElementKind::H2, "1. Introduction"),
            Element::paragraph("The rapid evolution of AI..."),
        ]
    );
}

#[tokio::test]
async fn out_of_range_citation_noise_is_dropped() {
    let chain = ClassifierChain::new(vec![Box::new(Scripted(
        r#"[{"type": "p", "content": "This approach improves energy 4."}]"#,
    ))]);
    let out = convert_with_chain("This approach improves energy 4.", &chain, &FormatConfig::local()).await;
    assert_eq!(out.classifier, Some(ClassifierKind::Llm));
    assert_eq!(out.elements, vec![Element::paragraph("This approach improves energy.")]);
    assert!(!out.html.contains('['));
}

#[test]
fn arrow_art_becomes_one_diagram() {
    let els = local("A\n│\n▼\nB\n│\n▼\nC");
    assert_eq!(els.len(), 1);
    assert_eq!(els[0].kind, ElementKind::Mermaid);
    assert!(els[0].content_str().contains("A --> B --> C"));
}

#[test]
fn bullet_block_is_unordered_list() {
    assert_eq!(
        local("- one\n- two\n- three"),
        vec![Element::list(
            ElementKind::UnorderedList,
            vec!["one".into(), "two".into(), "three".into()]
        )]
    );
}

#[test]
fn caption_before_diagram_is_not_rendered() {
    let styled = RuleEngine::new(&StyleOverrides::new()).apply(&[
        Element::paragraph("Figure: Data Flow"),
        Element::text(ElementKind::Mermaid, "graph TD\n    A --> B"),
    ]);
    let html = render_html(&styled, false);
    assert!(!html.contains("Figure: Data Flow"));
    assert!(html.contains("<pre class=\"mermaid\">graph TD\n    A --> B</pre>"));
}

// ── Properties ───────────────────────────────────────────────────────────────

#[test]
fn single_paragraph_is_one_block() {
    let doc = tokenize("  one long paragraph without any blank line at all  ");
    assert_eq!(doc.blocks.len(), 1);
    assert_eq!(doc.blocks[0].text, "one long paragraph without any blank line at all");
}

#[test]
fn broken_sentence_is_merged() {
    let doc = tokenize("The results of the survey\n\nwere surprising to everyone.");
    assert_eq!(doc.blocks.len(), 1);
    assert_eq!(doc.blocks[0].text, "The results of the survey were surprising to everyone.");
}

#[test]
fn script_tags_are_escaped() {
    let out = convert_local("Notes.\n\n<script>alert(1)</script> is not allowed.", &FormatConfig::local());
    assert!(out.html.contains("&lt;script&gt;"));
    assert!(!out.html.contains("<script>"));
}

#[test]
fn payloads_are_reinjected_exactly_once() {
    let input = "Intro text.\n\n```mermaid\ngraph LR\n  X --> Y\n```\n\n| Name | Value |\n|------|-------|\n| a | 1 |\n\nAfter text.";
    let els = local(input);
    let diagrams: Vec<&Element> = els.iter().filter(|e| e.kind == ElementKind::Mermaid).collect();
    let tables: Vec<&Element> = els.iter().filter(|e| e.kind == ElementKind::Html).collect();
    assert_eq!(diagrams.len(), 1);
    assert_eq!(diagrams[0].content_str(), "graph LR\n  X --> Y");
    assert_eq!(tables.len(), 1);
    assert!(tables[0].content_str().starts_with("<table"));
    assert!(!els.iter().any(|e| e.content_str().contains("%%MERMAID")));
}

#[test]
fn literal_placeholder_in_input_is_inert() {
    let out = convert_local("Text mentioning %%MERMAID_PLACEHOLDER_0%% literally.", &FormatConfig::local());
    assert!(!out.elements.iter().any(|e| e.kind == ElementKind::Mermaid));
}

#[test]
fn global_override_wins() {
    let mut styles = StyleOverrides::new();
    styles.set("p", "color", "blue");
    styles.set_global("color", "red");
    let engine = RuleEngine::new(&styles);
    let style = engine.style_string("p");
    assert!(style.contains("color: red;"), "got: {style}");
    assert!(!style.contains("color: blue;"));
}

#[test]
fn styles_flow_into_rendered_html() {
    let mut styles = StyleOverrides::new();
    styles.set_global("text-align", "justify");
    let config = FormatConfig::builder()
        .mode(edgequake_text2html::ClassifierMode::LocalOnly)
        .styles(styles)
        .build()
        .unwrap();
    let out = convert_local("A plain sentence.", &config);
    assert!(out.html.contains("text-align: justify;"));
}

#[test]
fn local_formatting_is_deterministic() {
    let input = "Energy Report\n\nAbstract\n\nWe measured things.\n\n2.1 Data\n\n- a\n- b";
    let first = convert_local(input, &FormatConfig::local());
    let second = convert_local(input, &FormatConfig::local());
    assert_eq!(first.elements, second.elements);
    assert_eq!(first.html, second.html);
}

// ── Fallback chain ───────────────────────────────────────────────────────────

#[tokio::test]
async fn quota_failure_falls_back_with_status() {
    let chain = ClassifierChain::new(vec![
        Box::new(Failing(ClassificationError::RateLimited("RESOURCE_EXHAUSTED".into()))),
        Box::new(LocalClassifier::new()),
    ]);
    let out = convert_with_chain("Title\n\n- one\n- two", &chain, &FormatConfig::local()).await;
    assert_eq!(out.classifier, Some(ClassifierKind::Local));
    assert!(out.used_fallback());
    assert!(out.status.starts_with("Formatted with local engine (AI unavailable)"));
    assert!(out.status.contains("API quota exceeded"));
    assert_eq!(out.fallback_reason.map(|r| r.class()), Some(FailureClass::RateLimited));
}

#[tokio::test]
async fn malformed_remote_reply_falls_back() {
    let chain = ClassifierChain::new(vec![
        Box::new(Scripted("Sure! Here is your document")),
        Box::new(LocalClassifier::new()),
    ]);
    let out = convert_with_chain("- one\n- two", &chain, &FormatConfig::local()).await;
    assert_eq!(out.classifier, Some(ClassifierKind::Local));
    assert!(matches!(out.fallback_reason, Some(ClassificationError::MalformedResponse(_))));
}

#[tokio::test]
async fn remote_raw_html_is_rejected_and_falls_back() {
    let chain = ClassifierChain::new(vec![
        Box::new(Scripted(r#"[{"type": "html", "content": "<img src=x onerror=alert(1)>"}]"#)),
        Box::new(LocalClassifier::new()),
    ]);
    let out = convert_with_chain("- one\n- two", &chain, &FormatConfig::local()).await;
    assert_eq!(out.classifier, Some(ClassifierKind::Local));
    assert!(matches!(
        out.fallback_reason,
        Some(ClassificationError::SchemaViolation { index: 0, .. })
    ));
    assert!(!out.html.contains("onerror"));
    assert!(out.html.contains("<ul"));
}

#[tokio::test]
async fn remote_filler_and_page_numbers_are_removed() {
    let chain = ClassifierChain::new(vec![Box::new(Scripted(
        r#"```json
[
  {"type": "p", "content": "Here is the diagram you requested:"},
  {"type": "h1", "content": "Report"},
  {"type": "p", "content": "12"},
  {"type": "p", "content": "Body text."}
]
```"#,
    ))]);
    let out = convert_with_chain("Report\n\nBody text.", &chain, &FormatConfig::local()).await;
    assert_eq!(out.status, "Formatted Successfully");
    assert_eq!(
        out.elements,
        vec![
            Element::text(ElementKind::H1, "Report"),
            Element::paragraph("Body text."),
        ]
    );
}

// ── Session ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn newer_call_wins_the_output_slot() {
    let formatter = Formatter::with_chain(ClassifierChain::new(vec![Box::new(Delayed)]), &FormatConfig::local());
    let ((slow, slow_commit), (fast, fast_commit)) =
        tokio::join!(formatter.render("slow old text."), formatter.render("fresh text."));
    assert_eq!(fast_commit, Commit::Applied);
    assert_eq!(slow_commit, Commit::Superseded);
    assert!(slow.html.contains("slow old text."));
    let current = formatter.current().unwrap();
    assert_eq!(current.html, fast.html);
}

#[tokio::test]
async fn repeated_input_reuses_classification() {
    let formatter = Formatter::with_chain(ClassifierChain::new(vec![Box::new(Delayed)]), &FormatConfig::local());
    let first = formatter.format("Same text.").await;
    let second = formatter.format("Same text.").await;
    assert!(!first.stats.cache_hit);
    assert!(second.stats.cache_hit);
    assert_eq!(first.elements, second.elements);
}

// ── File output ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn convert_to_file_writes_html() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.html");
    let out = convert_to_file("Title\n\n- one\n- two", &path, &FormatConfig::local())
        .await
        .unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, out.html);
    assert!(written.contains("<ul"));
}
