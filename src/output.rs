//! Output types returned by the formatting entry points.

use crate::element::Element;
use crate::error::ClassificationError;
use serde::{Deserialize, Serialize};

/// Status line shown after a remote strategy produced the structure.
pub const STATUS_SUCCESS: &str = "Formatted Successfully";
/// Status line shown when a local strategy had to take over.
pub const STATUS_FALLBACK: &str = "Formatted with local engine (AI unavailable)";
/// Status line for blank input.
pub const STATUS_IDLE: &str = "Waiting for input";

/// Result of one formatting run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatOutput {
    /// Final HTML fragment.
    pub html: String,
    /// Elements after reinjection, in render order.
    pub elements: Vec<Element>,
    /// One-line, user-facing summary of how the run went.
    pub status: String,
    /// Strategy that produced `elements`; `None` for blank input.
    pub classifier: Option<ClassifierKind>,
    /// Why the remote strategies were not used, when they were configured
    /// and a local strategy won.
    pub fallback_reason: Option<ClassificationError>,
    pub stats: FormatStats,
}

impl FormatOutput {
    /// Output for blank input: no HTML, no classification.
    pub fn idle() -> Self {
        Self {
            html: String::new(),
            elements: Vec::new(),
            status: STATUS_IDLE.to_string(),
            classifier: None,
            fallback_reason: None,
            stats: FormatStats::default(),
        }
    }

    /// True when a local strategy produced the structure.
    pub fn used_fallback(&self) -> bool {
        self.classifier.is_some_and(|k| !k.is_remote())
    }
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatStats {
    pub input_chars: usize,
    pub blocks: usize,
    /// Diagrams and tables pulled out before classification.
    pub extracted_payloads: usize,
    pub elements: usize,
    /// True when the elements came from the memoisation cache.
    pub cache_hit: bool,
    pub classify_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Which strategy of the classifier chain produced the elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassifierKind {
    /// HTTP endpoint honouring the `{text, instruction}` contract.
    Endpoint,
    /// `edgequake-llm` chat provider.
    Llm,
    /// Deterministic heuristic classifier.
    Local,
    /// Blank-line paragraph split.
    ParagraphFallback,
}

impl ClassifierKind {
    pub fn is_remote(self) -> bool {
        matches!(self, ClassifierKind::Endpoint | ClassifierKind::Llm)
    }
}

/// Status line for a finished run.
///
/// A local winner after a recorded remote failure gets the failure class
/// message appended; a local winner with no recorded reason (local-only
/// mode) is still reported as the local engine.
pub fn status_line(classifier: ClassifierKind, reason: Option<&ClassificationError>) -> String {
    if classifier.is_remote() {
        return STATUS_SUCCESS.to_string();
    }
    match reason {
        Some(r) => format!("{} {}", STATUS_FALLBACK, r.class().status_message()),
        None => STATUS_FALLBACK.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_win_is_success() {
        assert_eq!(status_line(ClassifierKind::Llm, None), STATUS_SUCCESS);
        assert_eq!(status_line(ClassifierKind::Endpoint, None), STATUS_SUCCESS);
    }

    #[test]
    fn fallback_carries_failure_class() {
        let reason = ClassificationError::RateLimited("429".into());
        let line = status_line(ClassifierKind::Local, Some(&reason));
        assert!(line.starts_with(STATUS_FALLBACK));
        assert!(line.contains("API quota exceeded"));

        let reason = ClassificationError::MissingCredentials("no key".into());
        let line = status_line(ClassifierKind::ParagraphFallback, Some(&reason));
        assert!(line.contains("No API key configured"));
    }

    #[test]
    fn idle_output_is_empty() {
        let out = FormatOutput::idle();
        assert!(out.html.is_empty());
        assert_eq!(out.status, STATUS_IDLE);
        assert!(!out.used_fallback());
    }

    #[test]
    fn kind_serialises_kebab_case() {
        assert_eq!(
            serde_json::to_string(&ClassifierKind::ParagraphFallback).unwrap(),
            "\"paragraph-fallback\""
        );
    }
}
