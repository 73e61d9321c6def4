//! HTML rendering of styled elements.
//!
//! One pass over the full element list with explicit lookahead. Two rules
//! need to see the neighbours of an element:
//!
//! * **Widow labels.** A short `p` right before a diagram ("Figure: Data
//!   Flow") duplicates the diagram's own title and tends to be stranded on
//!   the previous page in fixed-layout exports, so it is not rendered.
//!
//! * **Keep-together.** A heading directly followed by a diagram (possibly
//!   with a suppressed widow label in between) is wrapped with the diagram
//!   in a borderless two-row table. Word processors ignore
//!   `page-break-after: avoid` on headings but will not split a table row.
//!
//! All text is HTML-escaped before markdown cleanup. `mermaid` and `html`
//! payloads are inserted verbatim.

use crate::element::{Element, ElementKind, StyledElement};
use crate::pipeline::postprocess::{clean_markdown, escape_html, strip_emphasis_tags, strip_list_marker};
use once_cell::sync::Lazy;
use regex::Regex;

const DIAGRAM_CONTAINER_STYLE: &str = "page-break-inside: avoid; background-color: #fcfcfc; border: 1px solid #e0e0e0; border-radius: 8px; padding: 25px; margin: 18pt 0 12pt 0; box-shadow: 0 2px 5px rgba(0,0,0,0.03); text-align: center;";

const KEEP_TOGETHER_OPEN_HEAD: &str = "<table style=\"width: 100%; border-collapse: collapse; border: none; page-break-inside: avoid; margin: 0; padding: 0;\"><tbody>\n<tr style=\"page-break-inside: avoid; page-break-after: avoid;\"><td style=\"padding: 0; border: none;\">\n";
const KEEP_TOGETHER_OPEN_TAIL: &str = "\n</td></tr>\n<tr style=\"page-break-inside: avoid; page-break-before: avoid;\"><td style=\"padding: 0; border: none;\">\n";
const KEEP_TOGETHER_CLOSE: &str = "\n</td></tr>\n</tbody></table>";

/// Widow labels are shorter than this many characters.
const WIDOW_MAX_CHARS: usize = 50;
/// …and either open with a caption keyword or have at most this many words.
const WIDOW_MAX_WORDS: usize = 8;

static RE_CAPTION_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:diagram|chart|flowchart|table|figure)").unwrap());

/// Render styled elements to an HTML fragment.
///
/// Fragments are joined with a blank line. With `include_toc` and at least
/// one `h2`/`h3`, a table of contents is prepended and headings get
/// `id="heading-{n}"` anchors.
pub fn render_html(styled: &[StyledElement], include_toc: bool) -> String {
    let elements: Vec<&Element> = styled.iter().map(|s| &s.element).collect();
    let suppressed: Vec<bool> = (0..elements.len())
        .map(|i| is_widow_label(&elements, i))
        .collect();

    let mut fragments: Vec<String> = Vec::with_capacity(styled.len());
    let mut toc: Vec<TocEntry> = Vec::new();
    let mut keep_together_open = false;

    for (i, item) in styled.iter().enumerate() {
        if suppressed[i] {
            continue;
        }
        let el = &item.element;
        let style_attr = style_attribute(&item.style);

        let html = match &el.kind {
            ElementKind::UnorderedList | ElementKind::OrderedList => {
                render_list(el, &style_attr, &style_attribute(&item.item_style))
            }
            ElementKind::Mermaid => {
                let mut html = format!(
                    "<div class=\"mermaid-container\" style=\"{}\"><pre class=\"mermaid\">{}</pre></div>",
                    DIAGRAM_CONTAINER_STYLE,
                    el.content_str()
                );
                if keep_together_open {
                    html.push_str(KEEP_TOGETHER_CLOSE);
                    keep_together_open = false;
                }
                html
            }
            ElementKind::Html => el.content_str().to_string(),
            ElementKind::Code => format!("<pre{}>{}</pre>", style_attr, escape_html(el.content_str())),
            ElementKind::Paragraph => {
                let content = paragraph_text(el.content_str());
                if content.is_empty() {
                    continue;
                }
                format!("<p{}>{}</p>", style_attr, content)
            }
            kind if kind.is_heading() => {
                let content = strip_emphasis_tags(&clean_markdown(&escape_html(el.content_str())));
                if content.is_empty() {
                    continue;
                }
                let id_attr = match kind {
                    ElementKind::H2 | ElementKind::H3 if include_toc => {
                        let id = format!("heading-{}", toc.len());
                        toc.push(TocEntry {
                            id: id.clone(),
                            text: content.clone(),
                            top_level: *kind == ElementKind::H2,
                        });
                        format!(" id=\"{}\"", id)
                    }
                    _ => String::new(),
                };
                let mut html = match kind {
                    ElementKind::SubSubheading => format!("<div{}>{}</div>", style_attr, content),
                    _ => format!("<{tag}{id_attr}{style_attr}>{content}</{tag}>", tag = kind.as_str()),
                };
                if opens_keep_together(&elements, &suppressed, i) {
                    html = format!("{}{}{}", KEEP_TOGETHER_OPEN_HEAD, html, KEEP_TOGETHER_OPEN_TAIL);
                    keep_together_open = true;
                }
                html
            }
            _ => {
                let content = clean_markdown(&escape_html(el.content_str()));
                if content.is_empty() {
                    continue;
                }
                format!("<p{}>{}</p>", style_attr, content)
            }
        };
        if !html.is_empty() {
            fragments.push(html);
        }
    }

    let body = fragments.join("\n\n");
    if include_toc && !toc.is_empty() {
        format!("{}<div class=\"content-after-toc\">{}</div>", toc_html(&toc), body)
    } else {
        body
    }
}

fn style_attribute(style: &str) -> String {
    if style.is_empty() {
        String::new()
    } else {
        format!(" style=\"{}\"", style.replace('"', "&quot;"))
    }
}

/// Escaped, cleaned paragraph text with OCR line breaks joined.
fn paragraph_text(raw: &str) -> String {
    clean_markdown(&escape_html(raw))
        .replace("-\n", "")
        .replace('\n', " ")
}

fn render_list(el: &Element, list_style: &str, item_style: &str) -> String {
    // A list that arrived with `content` instead of `items` is split on lines.
    let items: Vec<&str> = match (&el.items, &el.content) {
        (Some(items), _) => items.iter().map(String::as_str).collect(),
        (None, Some(content)) => content.split('\n').filter(|l| !l.trim().is_empty()).collect(),
        (None, None) => Vec::new(),
    };
    let tag = el.kind.as_str();
    let lis: Vec<String> = items
        .iter()
        .map(|item| {
            let text = strip_list_marker(&clean_markdown(&escape_html(item)));
            format!("<li{}>{}</li>", item_style, text)
        })
        .collect();
    format!("<{tag}{list_style}>\n{}\n</{tag}>", lis.join("\n"))
}

/// A short caption-like `p` whose next element is a diagram.
fn is_widow_label(elements: &[&Element], i: usize) -> bool {
    let el = elements[i];
    if el.kind != ElementKind::Paragraph {
        return false;
    }
    let next_is_diagram = elements
        .get(i + 1)
        .is_some_and(|n| n.kind == ElementKind::Mermaid);
    if !next_is_diagram {
        return false;
    }
    let text = paragraph_text(el.content_str());
    text.chars().count() < WIDOW_MAX_CHARS
        && (RE_CAPTION_KEYWORD.is_match(&text) || text.split(' ').count() <= WIDOW_MAX_WORDS)
}

fn opens_keep_together(elements: &[&Element], suppressed: &[bool], i: usize) -> bool {
    let is_diagram = |j: usize| elements.get(j).is_some_and(|e| e.kind == ElementKind::Mermaid);
    is_diagram(i + 1) || (suppressed.get(i + 1).copied().unwrap_or(false) && is_diagram(i + 2))
}

// ── Table of contents ────────────────────────────────────────────────────────

struct TocEntry {
    id: String,
    /// Escaped heading text.
    text: String,
    top_level: bool,
}

/// The page estimate starts at 1 and advances after every second heading.
fn toc_html(entries: &[TocEntry]) -> String {
    let mut html = String::from(
        "<div class=\"toc-container\" style=\"page-break-after: always;\">\n\
         <h3 class=\"toc-title\">CONTENT</h3>\n\
         <table class=\"toc-table\">\n\
         <thead>\n\
         <tr><th style=\"text-align: left;\">Topic</th><th style=\"text-align: right; width: 80px;\">Page No.</th></tr>\n\
         </thead>\n\
         <tbody>\n",
    );
    let mut page = 1;
    for (i, entry) in entries.iter().enumerate() {
        let font = if entry.top_level {
            "font-weight: 700;"
        } else {
            "font-weight: 400; padding-left: 20px;"
        };
        html.push_str(&format!(
            "<tr><td style=\"{}\"><a href=\"#{}\" class=\"toc-link\">{}</a></td><td style=\"text-align: right; font-weight: 700;\">{}</td></tr>\n",
            font, entry.id, entry.text, page
        ));
        if (i + 1) % 2 == 0 {
            page += 1;
        }
    }
    html.push_str("</tbody></table></div>");
    html
}
