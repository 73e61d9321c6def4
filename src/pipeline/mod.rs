//! Pipeline stages for text-to-HTML formatting.
//!
//! Each submodule implements one transformation step, so every stage can be
//! tested on its own and classifier strategies can be swapped without
//! touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! tokenize ──▶ extract ──▶ classify ──▶ reinject ──▶ style ──▶ render
//! (blocks)     (arena)     (chain)      (splice)     (CSS)     (HTML)
//! ```
//!
//! 1. [`tokenize`]: normalize line endings, run the extractors, split into
//!    merged paragraph blocks
//! 2. [`extract`] / [`diagram`]: pull fenced diagrams, flow and tree
//!    diagrams, bar charts and markdown tables out of the text, leaving
//!    `%%MERMAID_PLACEHOLDER_n%%` tokens behind
//! 3. [`classify`]: walk the strategy chain: [`endpoint`], [`llm`],
//!    [`heuristic`], then a plain paragraph split; remote output is cleaned
//!    by [`postprocess`]
//! 4. [`reinject`]: swap each placeholder for its `mermaid` / `html` element
//! 5. [`style`]: merge default, per-type and global declarations
//! 6. [`render`]: escape, clean markdown, suppress widow labels, keep
//!    headings with their diagrams, optional table of contents

pub mod classify;
pub mod diagram;
pub mod endpoint;
pub mod extract;
pub mod heuristic;
pub mod llm;
pub mod postprocess;
pub mod reinject;
pub mod render;
pub mod style;
pub mod tokenize;
