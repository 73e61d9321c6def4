//! Instruction payload for remote document-structure classifiers.
//!
//! Centralising the instruction here serves two purposes:
//!
//! 1. **Single source of truth**: the HTTP endpoint and the LLM provider
//!    receive the same rules, so switching strategy never changes what the
//!    classifier is asked to do.
//!
//! 2. **Testability**: unit tests can inspect the instruction directly and
//!    catch a rule that was dropped by accident.
//!
//! Callers can override the default via [`crate::config::FormatConfig::instruction`].
//! Whatever the instruction says, remote output is still validated and
//! cleaned locally by [`crate::pipeline::postprocess::sanitize_remote`].

/// Default instruction sent with every remote classification request.
pub const DEFAULT_INSTRUCTION: &str = r#"You classify the structure of unstructured text (OCR output, screen captures, chat transcripts). Split the text into logical blocks and return one JSON object per block.

Follow these rules precisely:

1. OUTPUT SHAPE
   - Return ONLY a JSON array of objects. No markdown fences, no commentary.
   - Every object has a "type" key, one of: "h1", "h2", "h3", "sub-subheading", "p", "ul", "ol", "code".
   - Text types carry a "content" string. "ul" and "ol" carry an "items" array of strings and NO "content".
   - Keep the exact wording of the source apart from the cleanup rules below.

2. HEADING LEVELS
   - "h1": the single title of the document.
   - "h2": top-level sections, numbered or named ("1. Introduction", "Abstract", "IV. Results").
   - "sub-subheading": short nested labels with multi-level numbers or letters ("2.1 Data", "A. Dataset"), usually under 10 words.
   - "p": flowing body text, usually several sentences. Join sentences that were broken across lines.

3. HEADINGS AND BODY ARE SEPARATE
   - A heading object never contains body text and a paragraph never contains a heading.
   - "1. Introduction The rapid evolution..." becomes
     [{"type": "h2", "content": "1. Introduction"}, {"type": "p", "content": "The rapid evolution..."}]

4. DIAGRAMS AND PLACEHOLDERS
   - Text-art diagrams (├──, └──, ▼, →, |) are "p" blocks, unchanged.
   - Tokens like %%MERMAID_PLACEHOLDER_0%% are "p" blocks, passed through unchanged.

5. CITATIONS
   - Mangled citation clusters at the end of a sentence ("[1] [21.", "[1], 12), [31, (4]") are rewritten as separate brackets: "[1] [4]".
   - One number per bracket; never "[1, 2, 4]".
   - Only 1 to 5 are citations. Larger trailing numbers are OCR noise: delete them.
   - Repaired citations stay at the end of their paragraph, never in a block of their own.

6. NOISE AND FILLER
   - Delete stray page numbers ("12", "Page 4") entirely.
   - Delete conversational filler ("Here is the diagram you requested:", "Sure!", "Let me know if...") entirely.
   - Do not fix spelling or grammar."#;

/// Instruction in effect for a run.
pub fn instruction(custom: Option<&str>) -> &str {
    custom.unwrap_or(DEFAULT_INSTRUCTION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_instruction_covers_every_rule() {
        for needle in [
            "JSON array",
            "\"items\"",
            "sub-subheading",
            "HEADINGS AND BODY ARE SEPARATE",
            "%%MERMAID_PLACEHOLDER_0%%",
            "Only 1 to 5",
            "page numbers",
            "conversational filler",
        ] {
            assert!(DEFAULT_INSTRUCTION.contains(needle), "missing: {needle}");
        }
    }

    #[test]
    fn custom_instruction_wins() {
        assert_eq!(instruction(Some("be brief")), "be brief");
        assert_eq!(instruction(None), DEFAULT_INSTRUCTION);
    }
}
