//! Error types for the edgequake-text2html library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`FormatError`]: **Fatal**: the formatting run cannot proceed at all
//!   (bad configuration, unreadable input file, output not writable).
//!   Returned as `Err(FormatError)` from the top-level `convert*` functions.
//!
//! * [`ClassificationError`]: **Recoverable**: one classifier strategy
//!   failed (network blip, quota, malformed JSON). The strategy chain logs it
//!   and falls through to the next strategy; the last one recorded is kept in
//!   [`crate::output::FormatOutput::fallback_reason`] so callers can tell the
//!   user why the local engine was used.
//!
//! [`FailureClass`] collapses a `ClassificationError` into the three classes
//! a user-facing status line distinguishes.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-text2html library.
#[derive(Debug, Error)]
pub enum FormatError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Input file exists but could not be read (permissions, not UTF-8).
    #[error("Failed to read input file '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Provider errors ───────────────────────────────────────────────────
    /// The explicitly requested provider could not be constructed.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The endpoint URL or HTTP client could not be set up.
    #[error("Classifier endpoint '{url}' is unusable: {reason}")]
    EndpointSetup { url: String, reason: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output HTML file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A recoverable failure of a single classifier strategy.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ClassificationError {
    /// The strategy is not configured for this run (no provider, no URL).
    #[error("{strategy} classifier unavailable: {reason}")]
    Unavailable { strategy: String, reason: String },

    /// The remote call exceeded the configured timeout.
    #[error("Classifier call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Connection-level failure before any status was received.
    #[error("Classifier transport error: {0}")]
    Transport(String),

    /// The remote side returned a non-2xx status.
    #[error("Classifier returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// HTTP 429 / quota exhausted.
    #[error("Classifier rate limit or quota exceeded: {0}")]
    RateLimited(String),

    /// API key absent or rejected.
    #[error("Missing or rejected API key: {0}")]
    MissingCredentials(String),

    /// The response body was not a JSON array of elements.
    #[error("Classifier returned malformed JSON: {0}")]
    MalformedResponse(String),

    /// The JSON parsed but an element broke the content/items contract.
    #[error("Element {index} violates the element contract: {detail}")]
    SchemaViolation { index: usize, detail: String },

    /// A classifier produced no elements for non-empty input.
    #[error("Classifier produced no elements for {chars} characters of input")]
    Empty { chars: usize },

    /// Provider error that fits none of the classes above.
    #[error("Classifier failed: {0}")]
    Other(String),
}

impl ClassificationError {
    /// Map a free-form provider error message to the most specific variant.
    ///
    /// Providers report quota and credential problems only as text, so this
    /// matches the markers Gemini, OpenAI and Anthropic put in their messages.
    pub fn from_provider_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("429") || lower.contains("resource_exhausted") || lower.contains("quota") || lower.contains("rate limit") {
            ClassificationError::RateLimited(message)
        } else if lower.contains("api key") || lower.contains("api_key") || lower.contains("401") || lower.contains("unauthorized") {
            ClassificationError::MissingCredentials(message)
        } else {
            ClassificationError::Other(message)
        }
    }

    /// Map an HTTP status to a variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => ClassificationError::RateLimited(body),
            401 | 403 => ClassificationError::MissingCredentials(body),
            _ => {
                let lower = body.to_lowercase();
                if lower.contains("resource_exhausted") || lower.contains("quota") {
                    ClassificationError::RateLimited(body)
                } else {
                    ClassificationError::Status { status, body }
                }
            }
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            ClassificationError::RateLimited(_) => FailureClass::RateLimited,
            ClassificationError::MissingCredentials(_) => FailureClass::MissingCredentials,
            _ => FailureClass::Generic,
        }
    }
}

/// User-visible failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FailureClass {
    RateLimited,
    MissingCredentials,
    Generic,
}

impl FailureClass {
    pub fn status_message(self) -> &'static str {
        match self {
            FailureClass::RateLimited => {
                "API quota exceeded. Please wait a few minutes and try again."
            }
            FailureClass::MissingCredentials => "No API key configured. Set your API key.",
            FailureClass::Generic => "Error formatting, check the logs for details.",
        }
    }
}
