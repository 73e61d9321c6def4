//! Placeholder reinjection: splice extracted payloads back into elements.
//!
//! An element whose text contains `%%MERMAID_PLACEHOLDER_k%%` is split
//! around the token: the text before keeps the element's type, arena
//! entry `k` becomes a `mermaid` or `html` element with its content copied
//! byte for byte, and the text after keeps the type again.
//!
//! Every arena entry appears exactly once in the output. Remote
//! classifiers occasionally drop, repeat or invent placeholders, so:
//! repeats are removed, unknown indices are removed, and entries never
//! referenced are appended at the end.

use crate::element::Element;
use crate::pipeline::extract::{PayloadArena, RE_PLACEHOLDER};
use tracing::warn;

/// Replace placeholder tokens in `elements` with their payloads.
pub fn reinject(elements: Vec<Element>, arena: &PayloadArena) -> Vec<Element> {
    let mut used = vec![false; arena.len()];
    let mut out = Vec::with_capacity(elements.len() + arena.len());

    for el in elements {
        if el.kind.is_list() {
            splice_list(el, arena, &mut used, &mut out);
            continue;
        }
        let has_token = el
            .content
            .as_deref()
            .is_some_and(|c| RE_PLACEHOLDER.is_match(c));
        if !has_token {
            out.push(el);
            continue;
        }
        let content = el.content_str().to_string();

        let mut last = 0;
        for caps in RE_PLACEHOLDER.captures_iter(&content) {
            let Some(token) = caps.get(0) else { continue };
            push_text(&el, &content[last..token.start()], &mut out);
            last = token.end();
            if let Some(payload) = take_payload(&caps[1], arena, &mut used) {
                out.push(payload);
            }
        }
        push_text(&el, &content[last..], &mut out);
    }

    for (index, seen) in used.iter().enumerate() {
        if !seen {
            if let Some(block) = arena.get(index) {
                warn!("Placeholder {} missing from classifier output; appending", index);
                out.push(Element::text(block.kind.element_kind(), block.content.clone()));
            }
        }
    }
    out
}

fn push_text(template: &Element, text: &str, out: &mut Vec<Element>) {
    let text = text.trim();
    if !text.is_empty() {
        out.push(Element::text(template.kind.clone(), text));
    }
}

/// Payload element for a token index, once per index.
fn take_payload(index: &str, arena: &PayloadArena, used: &mut [bool]) -> Option<Element> {
    let Ok(index) = index.parse::<usize>() else {
        warn!("Unparseable placeholder index '{}' removed", index);
        return None;
    };
    let Some(block) = arena.get(index) else {
        warn!("Placeholder {} has no payload; removed", index);
        return None;
    };
    if used[index] {
        warn!("Placeholder {} repeated; keeping the first occurrence", index);
        return None;
    }
    used[index] = true;
    Some(Element::text(block.kind.element_kind(), block.content.clone()))
}

/// Lists keep their shape: tokens are removed from items and the payloads
/// follow the list.
fn splice_list(el: Element, arena: &PayloadArena, used: &mut [bool], out: &mut Vec<Element>) {
    let mut payloads = Vec::new();
    let items: Option<Vec<String>> = el.items.as_ref().map(|items| {
        items
            .iter()
            .filter_map(|item| {
                for caps in RE_PLACEHOLDER.captures_iter(item) {
                    if let Some(p) = take_payload(&caps[1], arena, used) {
                        payloads.push(p);
                    }
                }
                let rest = RE_PLACEHOLDER.replace_all(item, "").trim().to_string();
                (!rest.is_empty()).then_some(rest)
            })
            .collect()
    });
    let keep = items.as_ref().is_none_or(|i| !i.is_empty()) || el.content.is_some();
    if keep {
        out.push(Element { items, ..el });
    }
    out.extend(payloads);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementKind;
    use crate::pipeline::extract::PayloadKind;

    fn arena() -> PayloadArena {
        let mut a = PayloadArena::default();
        a.push(PayloadKind::MermaidCode, "graph TD\n    A --> B --> C");
        a.push(PayloadKind::HtmlTable, "<table></table>");
        a
    }

    #[test]
    fn splits_around_placeholder() {
        let els = vec![Element::paragraph(
            "Before text %%MERMAID_PLACEHOLDER_0%% after text %%MERMAID_PLACEHOLDER_1%%",
        )];
        let out = reinject(els, &arena());
        assert_eq!(
            out,
            vec![
                Element::paragraph("Before text"),
                Element::text(ElementKind::Mermaid, "graph TD\n    A --> B --> C"),
                Element::paragraph("after text"),
                Element::text(ElementKind::Html, "<table></table>"),
            ]
        );
    }

    #[test]
    fn leading_text_keeps_its_type() {
        let els = vec![Element::text(ElementKind::H2, "Flow %%MERMAID_PLACEHOLDER_0%%")];
        let out = reinject(els, &arena());
        assert_eq!(out[0], Element::text(ElementKind::H2, "Flow"));
        assert_eq!(out[1].kind, ElementKind::Mermaid);
    }

    #[test]
    fn each_payload_appears_exactly_once() {
        let els = vec![
            Element::paragraph("%%MERMAID_PLACEHOLDER_0%%"),
            Element::paragraph("%%MERMAID_PLACEHOLDER_0%%"),
            Element::paragraph("%%MERMAID_PLACEHOLDER_7%%"),
        ];
        let out = reinject(els, &arena());
        let mermaid = out.iter().filter(|e| e.kind == ElementKind::Mermaid).count();
        let html = out.iter().filter(|e| e.kind == ElementKind::Html).count();
        assert_eq!((mermaid, html), (1, 1));
        // the unreferenced table is appended last
        assert_eq!(out.last().unwrap().kind, ElementKind::Html);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn elements_without_tokens_pass_through() {
        let els = vec![Element::paragraph("plain"), Element::text(ElementKind::H1, "T")];
        assert_eq!(reinject(els.clone(), &PayloadArena::default()), els);
    }

    #[test]
    fn list_items_release_their_tokens() {
        let els = vec![Element::list(
            ElementKind::UnorderedList,
            vec!["one".into(), "%%MERMAID_PLACEHOLDER_0%%".into()],
        )];
        let mut a = PayloadArena::default();
        a.push(PayloadKind::MermaidCode, "graph TD");
        let out = reinject(els, &a);
        assert_eq!(
            out,
            vec![
                Element::list(ElementKind::UnorderedList, vec!["one".into()]),
                Element::text(ElementKind::Mermaid, "graph TD"),
            ]
        );
    }
}
