//! Document model shared by every pipeline stage.
//!
//! A document flows through three shapes:
//!
//! ```text
//! Block ──classify──▶ Element ──style──▶ StyledElement ──render──▶ HTML
//! ```
//!
//! [`Element`] is the only shape that crosses a trust boundary: remote
//! classifiers return it as JSON, so its fields are optional and its
//! [`ElementKind`] keeps unknown type strings instead of rejecting them.
//! Validation happens in the classifier, graceful degradation in the
//! renderer.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A contiguous run of raw text between blank-line boundaries, after
/// intelligent merging. Produced by [`crate::pipeline::tokenize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Position of the block in the tokenized document (0-indexed).
    pub index: usize,
    /// Trimmed block text; may contain internal newlines.
    pub text: String,
}

/// Semantic type of an [`Element`].
///
/// Serialises to the wire names used by classifiers (`"h1"`,
/// `"sub-subheading"`, `"p"`, …). Unknown names round-trip through
/// [`ElementKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementKind {
    H1,
    H2,
    H3,
    SubSubheading,
    Paragraph,
    UnorderedList,
    OrderedList,
    Code,
    Mermaid,
    Html,
    Other(String),
}

impl ElementKind {
    /// Wire name of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            ElementKind::H1 => "h1",
            ElementKind::H2 => "h2",
            ElementKind::H3 => "h3",
            ElementKind::SubSubheading => "sub-subheading",
            ElementKind::Paragraph => "p",
            ElementKind::UnorderedList => "ul",
            ElementKind::OrderedList => "ol",
            ElementKind::Code => "code",
            ElementKind::Mermaid => "mermaid",
            ElementKind::Html => "html",
            ElementKind::Other(name) => name,
        }
    }

    /// Parse a wire name. Never fails; unknown names become `Other`.
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "h1" => ElementKind::H1,
            "h2" => ElementKind::H2,
            "h3" => ElementKind::H3,
            "sub-subheading" => ElementKind::SubSubheading,
            "p" => ElementKind::Paragraph,
            "ul" => ElementKind::UnorderedList,
            "ol" => ElementKind::OrderedList,
            "code" => ElementKind::Code,
            "mermaid" => ElementKind::Mermaid,
            "html" => ElementKind::Html,
            other => ElementKind::Other(other.to_string()),
        }
    }

    /// Markdown heading level (`#` count) to kind. Levels deeper than 3
    /// collapse into `h3`.
    pub fn heading(level: usize) -> Self {
        match level {
            0 | 1 => ElementKind::H1,
            2 => ElementKind::H2,
            _ => ElementKind::H3,
        }
    }

    pub fn is_heading(&self) -> bool {
        matches!(
            self,
            ElementKind::H1 | ElementKind::H2 | ElementKind::H3 | ElementKind::SubSubheading
        )
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ElementKind::UnorderedList | ElementKind::OrderedList)
    }

    /// `true` for kinds whose content is trusted literal payload that must
    /// never be escaped or cleaned.
    pub fn is_payload(&self) -> bool {
        matches!(self, ElementKind::Mermaid | ElementKind::Html)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ElementKind::Other(_))
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ElementKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ElementKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(ElementKind::parse(&name))
    }
}

/// The canonical structured unit produced by a classifier.
///
/// Well-formed elements carry exactly one of `content` (text kinds) or
/// `items` (`ul`/`ol`). Both are optional on the type because remote
/// classifiers are not trusted to honour that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<String>>,
}

impl Element {
    /// A text element (`content` populated).
    pub fn text(kind: ElementKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: Some(content.into()),
            items: None,
        }
    }

    /// A list element (`items` populated).
    pub fn list(kind: ElementKind, items: Vec<String>) -> Self {
        Self {
            kind,
            content: None,
            items: Some(items),
        }
    }

    pub fn paragraph(content: impl Into<String>) -> Self {
        Self::text(ElementKind::Paragraph, content)
    }

    /// Content as `&str`, empty when absent.
    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// Copy of this element with new content and the same kind.
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            kind: self.kind.clone(),
            content: Some(content.into()),
            items: self.items.clone(),
        }
    }

    /// Whether the element satisfies the content/items invariant.
    pub fn is_well_formed(&self) -> bool {
        if self.kind.is_list() {
            self.items.is_some() && self.content.is_none()
        } else {
            self.content.is_some() && self.items.is_none()
        }
    }
}

/// An [`Element`] annotated with its serialised inline styles.
///
/// Exists only inside one render call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledElement {
    pub element: Element,
    /// `property: value;` pairs for the element's own tag.
    pub style: String,
    /// Style for `<li>` children; empty for non-list kinds.
    pub item_style: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_wire_names() {
        for name in ["h1", "h2", "h3", "sub-subheading", "p", "ul", "ol", "code", "mermaid", "html"] {
            let kind = ElementKind::parse(name);
            assert!(kind.is_known(), "{name} should be known");
            assert_eq!(kind.as_str(), name);
        }
    }

    #[test]
    fn unknown_kind_is_preserved() {
        let kind = ElementKind::parse("blockquote");
        assert_eq!(kind, ElementKind::Other("blockquote".into()));
        assert_eq!(kind.to_string(), "blockquote");
    }

    #[test]
    fn deep_markdown_headings_collapse_to_h3() {
        assert_eq!(ElementKind::heading(1), ElementKind::H1);
        assert_eq!(ElementKind::heading(2), ElementKind::H2);
        assert_eq!(ElementKind::heading(5), ElementKind::H3);
    }

    #[test]
    fn element_deserialises_from_classifier_json() {
        let json = r#"[
            {"type": "h2", "content": "1. Introduction"},
            {"type": "ul", "items": ["one", "two"]}
        ]"#;
        let elements: Vec<Element> = serde_json::from_str(json).unwrap();
        assert_eq!(elements[0], Element::text(ElementKind::H2, "1. Introduction"));
        assert_eq!(
            elements[1],
            Element::list(ElementKind::UnorderedList, vec!["one".into(), "two".into()])
        );
    }

    #[test]
    fn element_serialises_without_absent_fields() {
        let json = serde_json::to_string(&Element::paragraph("hi")).unwrap();
        assert_eq!(json, r#"{"type":"p","content":"hi"}"#);
    }

    #[test]
    fn well_formed_checks_invariant() {
        assert!(Element::paragraph("x").is_well_formed());
        assert!(Element::list(ElementKind::OrderedList, vec![]).is_well_formed());
        let bad = Element {
            kind: ElementKind::UnorderedList,
            content: Some("- a\n- b".into()),
            items: None,
        };
        assert!(!bad.is_well_formed());
    }
}
