//! Rule engine: map each element type to inline CSS declarations.
//!
//! Merge order per element is *default for the type* → *type override* →
//! *global override*. Declarations keep insertion order: overriding an
//! existing property replaces its value in place, a new property is
//! appended. That keeps the serialised `style` attribute byte-stable across
//! runs, which matters for diffing exported documents.

use crate::element::{Element, StyledElement};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tracing::debug;

const SERIF: &str = "'Times New Roman', serif";

/// Ordered set of CSS declarations (`property → value`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleDeclarations {
    entries: Vec<(String, String)>,
}

impl StyleDeclarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `property`, replacing an existing value in place.
    pub fn set(&mut self, property: impl Into<String>, value: impl Into<String>) {
        let property = property.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(p, _)| *p == property) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((property, value)),
        }
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| p == property)
            .map(|(_, v)| v.as_str())
    }

    /// Apply every declaration of `other` on top of `self`.
    pub fn merge(&mut self, other: &StyleDeclarations) {
        for (p, v) in &other.entries {
            self.set(p.clone(), v.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, v)| (p.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialise as `property: value;` pairs joined by single spaces.
    pub fn to_style_string(&self) -> String {
        self.entries
            .iter()
            .map(|(p, v)| format!("{}: {};", p, v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StyleDeclarations {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut decls = Self::new();
        for (p, v) in iter {
            decls.set(p, v);
        }
        decls
    }
}

impl Serialize for StyleDeclarations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (p, v) in &self.entries {
            map.serialize_entry(p, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for StyleDeclarations {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DeclVisitor;

        impl<'de> Visitor<'de> for DeclVisitor {
            type Value = StyleDeclarations;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of CSS property names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut decls = StyleDeclarations::new();
                while let Some((p, v)) = access.next_entry::<String, String>()? {
                    decls.set(p, v);
                }
                Ok(decls)
            }
        }

        deserializer.deserialize_map(DeclVisitor)
    }
}

/// User overrides: per-type declarations plus one `global` set applied last
/// to every element.
///
/// JSON form: `{"h1": {"font-size": "20pt"}, "global": {"text-align": "justify"}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleOverrides {
    per_type: Vec<(String, StyleDeclarations)>,
    global: StyleDeclarations,
}

impl StyleOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Override one property for one style key (`h1`, `p`, `li`, …).
    pub fn set(&mut self, key: &str, property: impl Into<String>, value: impl Into<String>) {
        if key == "global" {
            self.global.set(property, value);
            return;
        }
        match self.per_type.iter_mut().find(|(k, _)| k == key) {
            Some((_, decls)) => decls.set(property, value),
            None => {
                let mut decls = StyleDeclarations::new();
                decls.set(property, value);
                self.per_type.push((key.to_string(), decls));
            }
        }
    }

    pub fn set_global(&mut self, property: impl Into<String>, value: impl Into<String>) {
        self.global.set(property, value);
    }

    pub fn for_key(&self, key: &str) -> Option<&StyleDeclarations> {
        self.per_type.iter().find(|(k, _)| k == key).map(|(_, d)| d)
    }

    pub fn global(&self) -> &StyleDeclarations {
        &self.global
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.per_type.iter().all(|(_, d)| d.is_empty())
    }

    fn keys(&self) -> impl Iterator<Item = &str> {
        self.per_type.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for StyleOverrides {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.per_type.len() + usize::from(!self.global.is_empty());
        let mut map = serializer.serialize_map(Some(len))?;
        for (k, d) in &self.per_type {
            map.serialize_entry(k, d)?;
        }
        if !self.global.is_empty() {
            map.serialize_entry("global", &self.global)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for StyleOverrides {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OverridesVisitor;

        impl<'de> Visitor<'de> for OverridesVisitor {
            type Value = StyleOverrides;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of element types to CSS declaration maps")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut overrides = StyleOverrides::new();
                while let Some((key, decls)) =
                    access.next_entry::<String, StyleDeclarations>()?
                {
                    for (p, v) in decls.iter() {
                        overrides.set(&key, p, v);
                    }
                }
                Ok(overrides)
            }
        }

        deserializer.deserialize_map(OverridesVisitor)
    }
}

/// Computes the final style string for every element.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Vec<(String, StyleDeclarations)>,
    global: StyleDeclarations,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(&StyleOverrides::default())
    }
}

impl RuleEngine {
    /// Merge `overrides` over the default rule table.
    ///
    /// Overrides for keys without a default rule are ignored, matching the
    /// set of types the renderer actually styles.
    pub fn new(overrides: &StyleOverrides) -> Self {
        let mut rules = default_rules();
        for key in overrides.keys() {
            let Some(decls) = overrides.for_key(key) else {
                continue;
            };
            match rules.iter_mut().find(|(k, _)| k == key) {
                Some((_, base)) => base.merge(decls),
                None => debug!("Ignoring style override for unstyled type '{}'", key),
            }
        }
        Self {
            rules,
            global: overrides.global().clone(),
        }
    }

    /// Merged declarations for a style key, before the global override.
    pub fn rules_for(&self, key: &str) -> Option<&StyleDeclarations> {
        self.rules.iter().find(|(k, _)| k == key).map(|(_, d)| d)
    }

    /// Final declarations for a style key (unknown keys start empty).
    pub fn declarations(&self, key: &str) -> StyleDeclarations {
        let mut decls = self.rules_for(key).cloned().unwrap_or_default();
        decls.merge(&self.global);
        decls
    }

    pub fn style_string(&self, key: &str) -> String {
        self.declarations(key).to_style_string()
    }

    /// Annotate every element with its style string.
    pub fn apply(&self, elements: &[Element]) -> Vec<StyledElement> {
        elements
            .iter()
            .map(|element| {
                let item_style = if element.kind.is_list() {
                    self.style_string("li")
                } else {
                    String::new()
                };
                StyledElement {
                    style: self.style_string(element.kind.as_str()),
                    item_style,
                    element: element.clone(),
                }
            })
            .collect()
    }
}

fn default_rules() -> Vec<(String, StyleDeclarations)> {
    let table: [(&str, &[(&str, &str)]); 8] = [
        (
            "h1",
            &[
                ("font-family", SERIF),
                ("font-size", "16pt"),
                ("font-weight", "700"),
                ("margin-bottom", "1rem"),
                ("border-bottom", "2px solid #DEE2E6"),
                ("padding-bottom", "0.5rem"),
            ],
        ),
        (
            "h2",
            &[
                ("font-family", SERIF),
                ("font-size", "14pt"),
                ("font-weight", "600"),
                ("margin-bottom", "0.75rem"),
                ("margin-top", "1.5rem"),
            ],
        ),
        (
            "h3",
            &[
                ("font-family", SERIF),
                ("font-size", "12pt"),
                ("font-weight", "600"),
                ("margin-bottom", "0.5rem"),
                ("margin-top", "1rem"),
            ],
        ),
        (
            "p",
            &[
                ("font-family", SERIF),
                ("font-size", "12pt"),
                ("line-height", "1.6"),
                ("margin-bottom", "1rem"),
            ],
        ),
        (
            "ul",
            &[
                ("font-family", SERIF),
                ("margin-bottom", "1rem"),
                ("padding-left", "2rem"),
            ],
        ),
        (
            "ol",
            &[
                ("font-family", SERIF),
                ("margin-bottom", "1rem"),
                ("padding-left", "2rem"),
            ],
        ),
        (
            "li",
            &[
                ("font-family", SERIF),
                ("font-size", "12pt"),
                ("line-height", "1.6"),
                ("margin-bottom", "0.5rem"),
            ],
        ),
        (
            "sub-subheading",
            &[
                ("font-family", SERIF),
                ("font-size", "12pt"),
                ("font-weight", "700"),
                ("margin-bottom", "0.75rem"),
                ("margin-top", "1.25rem"),
            ],
        ),
    ];

    table
        .iter()
        .map(|(key, decls)| (key.to_string(), decls.iter().copied().collect()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementKind;

    #[test]
    fn set_replaces_in_place() {
        let mut d: StyleDeclarations = [("a", "1"), ("b", "2")].into_iter().collect();
        d.set("a", "3");
        assert_eq!(d.to_style_string(), "a: 3; b: 2;");
    }

    #[test]
    fn default_h1_string_is_stable() {
        let engine = RuleEngine::default();
        assert_eq!(
            engine.style_string("h1"),
            "font-family: 'Times New Roman', serif; font-size: 16pt; font-weight: 700; \
             margin-bottom: 1rem; border-bottom: 2px solid #DEE2E6; padding-bottom: 0.5rem;"
        );
    }

    #[test]
    fn global_override_wins_over_type_override() {
        let mut overrides = StyleOverrides::new();
        overrides.set("p", "font-size", "14pt");
        overrides.set_global("font-size", "10pt");
        let engine = RuleEngine::new(&overrides);
        let decls = engine.declarations("p");
        assert_eq!(decls.get("font-size"), Some("10pt"));
    }

    #[test]
    fn type_override_wins_over_default() {
        let mut overrides = StyleOverrides::new();
        overrides.set("h2", "font-size", "18pt");
        let engine = RuleEngine::new(&overrides);
        assert_eq!(engine.declarations("h2").get("font-size"), Some("18pt"));
        // Position of the overridden property is preserved.
        let first_two: Vec<_> = engine.declarations("h2").iter().take(2).map(|(p, _)| p.to_string()).collect();
        assert_eq!(first_two, vec!["font-family", "font-size"]);
    }

    #[test]
    fn unknown_type_gets_only_global() {
        let mut overrides = StyleOverrides::new();
        overrides.set_global("text-align", "justify");
        let engine = RuleEngine::new(&overrides);
        assert_eq!(engine.style_string("blockquote"), "text-align: justify;");
        assert_eq!(engine.style_string("mermaid"), "text-align: justify;");
    }

    #[test]
    fn override_for_unstyled_type_is_ignored() {
        let mut overrides = StyleOverrides::new();
        overrides.set("mermaid", "color", "red");
        let engine = RuleEngine::new(&overrides);
        assert_eq!(engine.style_string("mermaid"), "");
    }

    #[test]
    fn apply_sets_item_style_for_lists() {
        let engine = RuleEngine::default();
        let styled = engine.apply(&[
            Element::list(ElementKind::UnorderedList, vec!["a".into()]),
            Element::paragraph("x"),
        ]);
        assert!(styled[0].item_style.contains("line-height: 1.6;"));
        assert!(styled[0].style.contains("padding-left: 2rem;"));
        assert!(styled[1].item_style.is_empty());
    }

    #[test]
    fn overrides_deserialise_in_document_order() {
        let json = r#"{
            "h1": {"font-size": "20pt", "color": "navy"},
            "global": {"text-align": "center"}
        }"#;
        let overrides = StyleOverrides::from_json(json).unwrap();
        let h1 = overrides.for_key("h1").unwrap();
        assert_eq!(h1.to_style_string(), "font-size: 20pt; color: navy;");
        assert_eq!(overrides.global().get("text-align"), Some("center"));

        let engine = RuleEngine::new(&overrides);
        let s = engine.style_string("h1");
        assert!(s.ends_with("color: navy; text-align: center;"), "got: {s}");
    }
}
