//! Classifier strategies and the fallback chain that runs them.
//!
//! ## Why a chain of trait objects?
//!
//! Remote classification (HTTP endpoint, LLM provider) gives the best
//! structure but can fail in a dozen ways; the local heuristic classifier
//! always answers but is cruder; the paragraph split can never fail. All
//! three take the same input and return the same output, so they are one
//! trait, and the pipeline just walks an ordered `Vec<Box<dyn Classifier>>`
//! until one succeeds:
//!
//! ```text
//! EndpointClassifier ──fail──▶ LlmClassifier ──fail──▶ LocalClassifier ──fail──▶ ParagraphFallback
//!   (optional)                   (optional)              (always)                 (always)
//! ```
//!
//! A failure is logged with `warn!` and never retried; the next strategy
//! runs immediately within the same call.

use crate::config::{ClassifierMode, FormatConfig};
use crate::element::Element;
use crate::error::{ClassificationError, FailureClass, FormatError};
use crate::output::ClassifierKind;
use crate::pipeline::endpoint::EndpointClassifier;
use crate::pipeline::heuristic::LocalClassifier;
use crate::pipeline::llm::{self, LlmClassifier};
use crate::pipeline::postprocess::{sanitize_remote, validate_elements};
use crate::pipeline::tokenize::Tokenized;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One way of turning blocks into elements.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn kind(&self) -> ClassifierKind;

    async fn classify(&self, doc: &Tokenized) -> Result<Vec<Element>, ClassificationError>;
}

/// Result of running the chain.
#[derive(Debug, Clone)]
pub struct Classification {
    pub elements: Vec<Element>,
    /// Strategy that produced `elements`.
    pub classifier: ClassifierKind,
    /// Most informative failure among the strategies tried before the
    /// winner, if a remote strategy was configured and did not win.
    pub fallback_reason: Option<ClassificationError>,
    pub duration_ms: u64,
}

/// Ordered strategies, tried first to last.
pub struct ClassifierChain {
    strategies: Vec<Box<dyn Classifier>>,
    /// Failure recorded while building the chain (e.g. no API key found).
    setup_failure: Option<ClassificationError>,
}

impl std::fmt::Debug for ClassifierChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("ClassifierChain")
            .field("strategies", &names)
            .field("setup_failure", &self.setup_failure)
            .finish()
    }
}

impl ClassifierChain {
    /// Chain of the given strategies. [`ParagraphFallback`] is appended if
    /// absent so the chain always produces output.
    pub fn new(mut strategies: Vec<Box<dyn Classifier>>) -> Self {
        let has_fallback = strategies
            .last()
            .is_some_and(|s| s.kind() == ClassifierKind::ParagraphFallback);
        if !has_fallback {
            strategies.push(Box::new(ParagraphFallback));
        }
        Self {
            strategies,
            setup_failure: None,
        }
    }

    /// Local heuristic classifier plus the paragraph fallback.
    pub fn local() -> Self {
        Self::new(vec![Box::new(LocalClassifier::new())])
    }

    /// Build the chain a [`FormatConfig`] asks for.
    ///
    /// In [`ClassifierMode::Auto`] an LLM provider that cannot be found in
    /// the environment is not fatal: the strategy is skipped and the reason
    /// is reported on fallback. A provider the caller named explicitly and
    /// that cannot be built is a configuration error.
    pub fn from_config(config: &FormatConfig) -> Result<Self, FormatError> {
        if config.mode == ClassifierMode::LocalOnly {
            return Ok(Self::local());
        }

        let mut strategies: Vec<Box<dyn Classifier>> = Vec::new();
        let mut setup_failure = None;

        if let Some(ref url) = config.endpoint {
            strategies.push(Box::new(EndpointClassifier::from_config(url, config)?));
        }

        match llm::resolve_provider(config) {
            Ok(provider) => strategies.push(Box::new(LlmClassifier::new(provider, config))),
            Err(e) if config.provider_name.is_some() => return Err(e),
            Err(e) => {
                warn!("LLM classifier skipped: {}", e);
                setup_failure = Some(ClassificationError::MissingCredentials(e.to_string()));
            }
        }

        strategies.push(Box::new(LocalClassifier::new()));
        let mut chain = Self::new(strategies);
        chain.setup_failure = setup_failure;
        Ok(chain)
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run strategies in order until one yields elements.
    pub async fn classify(&self, doc: &Tokenized) -> Classification {
        let start = Instant::now();
        let mut reason = self.setup_failure.clone();
        let chars: usize = doc.blocks.iter().map(|b| b.text.len()).sum();

        for strategy in &self.strategies {
            debug!("Trying {} classifier", strategy.name());
            let result = match strategy.classify(doc).await {
                Ok(elements) if elements.is_empty() && chars > 0 => {
                    Err(ClassificationError::Empty { chars })
                }
                other => other,
            };
            match result {
                Ok(elements) => {
                    info!(
                        "{} classifier produced {} element(s)",
                        strategy.name(),
                        elements.len()
                    );
                    let kind = strategy.kind();
                    return Classification {
                        elements,
                        classifier: kind,
                        fallback_reason: if kind.is_remote() { None } else { reason },
                        duration_ms: start.elapsed().as_millis() as u64,
                    };
                }
                Err(e) => {
                    warn!("{} classifier failed: {}", strategy.name(), e);
                    if prefer_reason(reason.as_ref(), &e) {
                        reason = Some(e);
                    }
                }
            }
        }

        // Unreachable with ParagraphFallback last, kept so no input is lost.
        Classification {
            elements: paragraph_split(&doc.text()),
            classifier: ClassifierKind::ParagraphFallback,
            fallback_reason: reason,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Keep the first failure unless a later one names a user-actionable class.
fn prefer_reason(current: Option<&ClassificationError>, candidate: &ClassificationError) -> bool {
    match current {
        None => true,
        Some(cur) => cur.class() == FailureClass::Generic && candidate.class() != FailureClass::Generic,
    }
}

// ── Remote response handling ─────────────────────────────────────────────────

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*(.*?)\s*```$").unwrap());

/// Parse a remote reply into elements, tolerating a ```` ```json ```` fence.
pub fn parse_elements(raw: &str) -> Result<Vec<Element>, ClassificationError> {
    let trimmed = raw.trim();
    let body = RE_JSON_FENCE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str());
    serde_json::from_str(body).map_err(|e| ClassificationError::MalformedResponse(e.to_string()))
}

/// Validate remote elements, then apply the local cleanup rules.
pub fn finish_remote(elements: Vec<Element>) -> Result<Vec<Element>, ClassificationError> {
    validate_elements(&elements)?;
    Ok(sanitize_remote(elements))
}

// ── Ultimate fallback ────────────────────────────────────────────────────────

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Every non-empty blank-line-separated chunk as a `p`.
pub fn paragraph_split(text: &str) -> Vec<Element> {
    RE_BLANK_RUN
        .split(text)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(Element::paragraph)
        .collect()
}

/// The strategy of last resort: cannot fail, loses no text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParagraphFallback;

#[async_trait]
impl Classifier for ParagraphFallback {
    fn name(&self) -> &str {
        "paragraph-fallback"
    }

    fn kind(&self) -> ClassifierKind {
        ClassifierKind::ParagraphFallback
    }

    async fn classify(&self, doc: &Tokenized) -> Result<Vec<Element>, ClassificationError> {
        Ok(paragraph_split(&doc.text()))
    }
}
