//! # edgequake-text2html
//!
//! Turn noisy plain text (OCR scans, screen captures, AI-chat transcripts)
//! into a semantically tagged document and render it as styled HTML.
//!
//! ## Why this crate?
//!
//! Text copied out of a scanner or a chat window has lost its structure:
//! headings are glued to the paragraph below them, sentences are broken by
//! spurious blank lines, diagrams are box-drawing art and citations come
//! out as `[1] [21.`. This crate rebuilds the structure (with an LLM when
//! one is available, with deterministic heuristics when not) and renders
//! HTML that a PDF or Word exporter can consume directly.
//!
//! ## Pipeline Overview
//!
//! ```text
//! text
//!  │
//!  ├─ 1. Tokenize  normalize line endings, merge broken paragraphs
//!  ├─ 2. Extract   diagrams / charts / tables → placeholder tokens
//!  ├─ 3. Classify  endpoint → LLM → local heuristics → paragraph split
//!  ├─ 4. Reinject  placeholders → mermaid / html elements
//!  ├─ 5. Style     default + per-type + global CSS declarations
//!  └─ 6. Render    escaped, cleaned HTML fragment (+ optional TOC)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_text2html::{convert, FormatConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …;
//!     // without one, the local classifier takes over.
//!     let config = FormatConfig::default();
//!     let output = convert("1. Introduction The rapid evolution of AI...", &config).await?;
//!     println!("{}", output.html);
//!     eprintln!("{}", output.status);
//!     Ok(())
//! }
//! ```
//!
//! Offline, with no runtime at all:
//!
//! ```rust
//! use edgequake_text2html::{convert_local, FormatConfig};
//!
//! let output = convert_local("- one\n- two\n- three", &FormatConfig::local());
//! assert!(output.html.contains("<ul"));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `text2html` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod element;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ClassifierMode, FormatConfig, FormatConfigBuilder};
pub use convert::{convert, convert_file, convert_local, convert_sync, convert_to_file, convert_with_chain};
pub use element::{Block, Element, ElementKind, StyledElement};
pub use error::{ClassificationError, FailureClass, FormatError};
pub use output::{ClassifierKind, FormatOutput, FormatStats};
pub use pipeline::classify::{Classifier, ClassifierChain};
pub use pipeline::style::{RuleEngine, StyleDeclarations, StyleOverrides};
pub use session::{Commit, Formatter};
