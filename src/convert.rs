//! One-shot formatting entry points.
//!
//! ## Why a separate session type?
//!
//! The functions here are stateless: every call tokenizes, classifies and
//! renders from scratch. An editor that re-renders on every keystroke, or
//! whenever the user tweaks a style override, should hold a
//! [`crate::session::Formatter`] instead; it memoises the last
//! classification and arbitrates between overlapping calls.

use crate::config::FormatConfig;
use crate::element::Element;
use crate::error::{ClassificationError, FormatError};
use crate::output::{status_line, ClassifierKind, FormatOutput, FormatStats};
use crate::pipeline::classify::{paragraph_split, ClassifierChain};
use crate::pipeline::heuristic;
use crate::pipeline::reinject::reinject;
use crate::pipeline::render::render_html;
use crate::pipeline::style::{RuleEngine, StyleOverrides};
use crate::pipeline::tokenize::{tokenize, Tokenized};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Format text into styled HTML.
///
/// Builds the classifier chain from `config` (endpoint, LLM provider, local
/// heuristics, paragraph split) and runs the whole pipeline once.
///
/// # Errors
/// Returns `Err(FormatError)` only when the chain cannot be built, e.g. an
/// explicitly named provider is unknown. Classifier failures never surface
/// here: they are recovered by the next strategy and reported through
/// [`FormatOutput::fallback_reason`] and [`FormatOutput::status`].
pub async fn convert(input: impl AsRef<str>, config: &FormatConfig) -> Result<FormatOutput, FormatError> {
    let chain = ClassifierChain::from_config(config)?;
    Ok(convert_with_chain(input.as_ref(), &chain, config).await)
}

/// Format text with a caller-supplied classifier chain.
pub async fn convert_with_chain(input: &str, chain: &ClassifierChain, config: &FormatConfig) -> FormatOutput {
    let start = Instant::now();
    match classify_input(input, chain).await {
        Some(classified) => assemble(&classified, &config.styles, config.include_toc, input, false, start),
        None => FormatOutput::idle(),
    }
}

/// Format text with the local heuristic classifier only. Never leaves the
/// process and needs no runtime.
pub fn convert_local(input: &str, config: &FormatConfig) -> FormatOutput {
    let start = Instant::now();
    let doc = tokenize(input);
    if doc.blocks.is_empty() {
        return FormatOutput::idle();
    }

    let classify_start = Instant::now();
    let (elements, classifier, fallback_reason) = match heuristic::classify_document(&doc) {
        Ok(elements) => (elements, ClassifierKind::Local, None),
        Err(e) => {
            warn!("local classifier failed: {}", e);
            (paragraph_split(&doc.text()), ClassifierKind::ParagraphFallback, Some(e))
        }
    };
    let classified = Classified::new(&doc, elements, classifier, fallback_reason, classify_start);
    assemble(&classified, &config.styles, config.include_toc, input, false, start)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(input: impl AsRef<str>, config: &FormatConfig) -> Result<FormatOutput, FormatError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| FormatError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, config))
}

/// Read a UTF-8 text file and format it.
pub async fn convert_file(path: impl AsRef<Path>, config: &FormatConfig) -> Result<FormatOutput, FormatError> {
    let text = read_input(path.as_ref()).await?;
    convert(text, config).await
}

/// Format text and write the HTML to `output_path`.
///
/// Uses atomic write (temp file + rename) so a failed run never leaves a
/// partial file behind.
pub async fn convert_to_file(
    input: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &FormatConfig,
) -> Result<FormatOutput, FormatError> {
    let output = convert(input, config).await?;
    write_html(output_path.as_ref(), &output.html).await?;
    Ok(output)
}

/// Read an input file, telling a missing file apart from an unreadable one.
pub async fn read_input(path: &Path) -> Result<String, FormatError> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            FormatError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            FormatError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })
}

/// Write HTML atomically: temp file in the same directory, then rename.
pub async fn write_html(path: &Path, html: &str) -> Result<(), FormatError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FormatError::OutputWriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
        }
    }

    let tmp_path = path.with_extension("html.tmp");
    tokio::fs::write(&tmp_path, html)
        .await
        .map_err(|e| FormatError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| FormatError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(())
}

// ── Shared stages ────────────────────────────────────────────────────────

/// Everything the expensive half of the pipeline produces: reinjected
/// elements plus what is needed to report on them. This is what
/// [`crate::session::Formatter`] memoises.
#[derive(Debug, Clone)]
pub(crate) struct Classified {
    pub elements: Vec<Element>,
    pub classifier: ClassifierKind,
    pub fallback_reason: Option<ClassificationError>,
    pub blocks: usize,
    pub extracted_payloads: usize,
    pub classify_duration_ms: u64,
}

impl Classified {
    fn new(
        doc: &Tokenized,
        elements: Vec<Element>,
        classifier: ClassifierKind,
        fallback_reason: Option<ClassificationError>,
        classify_start: Instant,
    ) -> Self {
        Self {
            elements: reinject(elements, &doc.arena),
            classifier,
            fallback_reason,
            blocks: doc.blocks.len(),
            extracted_payloads: doc.arena.len(),
            classify_duration_ms: classify_start.elapsed().as_millis() as u64,
        }
    }
}

/// Tokenize, classify and reinject. `None` for blank input.
pub(crate) async fn classify_input(input: &str, chain: &ClassifierChain) -> Option<Classified> {
    let doc = tokenize(input);
    if doc.blocks.is_empty() {
        return None;
    }
    debug!(
        "Tokenized {} chars into {} block(s), {} extracted payload(s)",
        input.len(),
        doc.blocks.len(),
        doc.arena.len()
    );

    let classify_start = Instant::now();
    let classification = chain.classify(&doc).await;
    Some(Classified::new(
        &doc,
        classification.elements,
        classification.classifier,
        classification.fallback_reason,
        classify_start,
    ))
}

/// Style and render classified elements into the final output.
pub(crate) fn assemble(
    classified: &Classified,
    styles: &StyleOverrides,
    include_toc: bool,
    input: &str,
    cache_hit: bool,
    start: Instant,
) -> FormatOutput {
    let styled = RuleEngine::new(styles).apply(&classified.elements);
    let html = render_html(&styled, include_toc);

    let stats = FormatStats {
        input_chars: input.chars().count(),
        blocks: classified.blocks,
        extracted_payloads: classified.extracted_payloads,
        elements: classified.elements.len(),
        cache_hit,
        classify_duration_ms: if cache_hit { 0 } else { classified.classify_duration_ms },
        total_duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Formatted {} element(s) with {:?} classifier in {}ms",
        stats.elements, classified.classifier, stats.total_duration_ms
    );

    FormatOutput {
        html,
        elements: classified.elements.clone(),
        status: status_line(classified.classifier, classified.fallback_reason.as_ref()),
        classifier: Some(classified.classifier),
        fallback_reason: classified.fallback_reason.clone(),
        stats,
    }
}
