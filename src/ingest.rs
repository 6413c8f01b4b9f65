//! HTML ingestion: parse the source, find custom elements, count occurrences.

use crate::barrier::Countdown;
use crate::error::{RenderError, Result};
use crate::selector::TrackedSelectors;
use crate::tree::{self, Node};

/// Length of the source excerpt attached to parse errors.
const CONTEXT_CHARS: usize = 80;

/// The HTML a render starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlSource {
    /// An HTML string, parsed strictly.
    Html(String),
    /// A pre-parsed tree.
    Tree(Vec<Node>),
}

impl From<&str> for HtmlSource {
    fn from(html: &str) -> Self {
        HtmlSource::Html(html.to_string())
    }
}

impl From<String> for HtmlSource {
    fn from(html: String) -> Self {
        HtmlSource::Html(html)
    }
}

impl From<Vec<Node>> for HtmlSource {
    fn from(nodes: Vec<Node>) -> Self {
        HtmlSource::Tree(nodes)
    }
}

/// What the ingestor learned about a source.
#[derive(Debug, Clone)]
pub struct HtmlSourceMeta {
    /// Canonical tree.
    pub tree: Vec<Node>,
    /// Flat HTML string injected into the container.
    pub html: String,
    /// Distinct potential custom element names, in first-seen order.
    pub custom_element_names: Vec<String>,
    /// Selectors the connection observer tracks.
    pub selectors: TrackedSelectors,
    /// Number of elements matching `selectors`.
    pub occurrences: usize,
    /// Completes once every name in `custom_element_names` is defined.
    pub definitions: Countdown,
}

/// Parses or serializes `source` and scans it for custom elements.
///
/// Elements named in `render_elements` and elements carrying an SSR marker
/// attribute are tracked alongside custom elements.
pub fn ingest_html(source: HtmlSource, render_elements: &[String]) -> Result<HtmlSourceMeta> {
    let (tree, html) = match source {
        HtmlSource::Html(html) => {
            let tree = tree::parse_fragment(&html).map_err(|e| {
                RenderError::InvalidHtmlSource {
                    reason: e.reason,
                    context: html.chars().take(CONTEXT_CHARS).collect(),
                }
            })?;
            (tree, html)
        }
        HtmlSource::Tree(tree) => {
            let html = tree::to_html(&tree).map_err(RenderError::InvalidHtmlTree)?;
            (tree, html)
        }
    };

    let mut custom_element_names: Vec<String> = Vec::new();
    tree::for_each_element(&tree, &mut |element| {
        if is_potential_custom_element_name(&element.tag_name)
            && !custom_element_names.contains(&element.tag_name)
        {
            custom_element_names.push(element.tag_name.clone());
        }
    });

    let selectors = TrackedSelectors::new(
        custom_element_names
            .iter()
            .chain(render_elements.iter())
            .cloned(),
    );

    let mut occurrences = 0;
    tree::for_each_element(&tree, &mut |element| {
        if selectors.matches(&element.tag_name, &element.attributes) {
            occurrences += 1;
        }
    });

    log::debug!(
        "Ingested {} byte(s): {} custom element type(s), {} tracked occurrence(s)",
        html.len(),
        custom_element_names.len(),
        occurrences
    );

    let definitions = Countdown::new("definitions", custom_element_names.len());
    Ok(HtmlSourceMeta {
        tree,
        html,
        custom_element_names,
        selectors,
        occurrences,
        definitions,
    })
}

/// Returns `true` if `name` matches the `PotentialCustomElementName`
/// production: a lowercase ASCII letter, then name characters including at
/// least one hyphen.
pub fn is_potential_custom_element_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    let mut has_hyphen = false;
    for ch in chars {
        if ch == '-' {
            has_hyphen = true;
        } else if !is_pcen_char(ch) {
            return false;
        }
    }
    has_hyphen
}

fn is_pcen_char(ch: char) -> bool {
    matches!(ch,
        '-' | '.' | '0'..='9' | '_' | 'a'..='z'
        | '\u{B7}'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{203F}'..='\u{2040}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Element;

    #[test]
    fn test_potential_custom_element_names() {
        assert!(is_potential_custom_element_name("web-component"));
        assert!(is_potential_custom_element_name("x-"));
        assert!(is_potential_custom_element_name("math-α"));
        assert!(!is_potential_custom_element_name("div"));
        assert!(!is_potential_custom_element_name("-x"));
        assert!(!is_potential_custom_element_name("X-card"));
        assert!(!is_potential_custom_element_name("x-Card"));
        assert!(!is_potential_custom_element_name(""));
    }

    #[test]
    fn test_counts_names_and_occurrences() {
        let meta = ingest_html(
            "<div>String 1</div><web-component foo=\"bar\"><p>hey</p></web-component>\
             <web-component foo=\"baz\"></web-component><other-one></other-one>"
                .into(),
            &[],
        )
        .unwrap();

        assert_eq!(meta.custom_element_names, vec!["web-component", "other-one"]);
        assert_eq!(meta.occurrences, 3);
        assert_eq!(meta.definitions.remaining(), 2);
    }

    #[test]
    fn test_marker_attributes_and_render_elements_are_tracked() {
        let meta = ingest_html(
            "<section ssr></section><article></article><x-a></x-a>".into(),
            &["article".to_string()],
        )
        .unwrap();

        assert_eq!(meta.custom_element_names, vec!["x-a"]);
        assert_eq!(meta.occurrences, 3);
        assert_eq!(meta.definitions.remaining(), 1, "only types are defined");
    }

    #[test]
    fn test_empty_fragment() {
        let meta = ingest_html("".into(), &[]).unwrap();
        assert!(meta.custom_element_names.is_empty());
        assert_eq!(meta.occurrences, 0);
        assert!(meta.definitions.is_complete());
    }

    #[test]
    fn test_invalid_html_is_rejected() {
        let error = ingest_html("<div></span></div>".into(), &[]).unwrap_err();
        match error {
            RenderError::InvalidHtmlSource { context, .. } => {
                assert_eq!(context, "<div></span></div>");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_tree_source() {
        let tree = vec![Node::Element(
            Element::new("x-card").with_attribute("foo", "bar"),
        )];
        let meta = ingest_html(tree.into(), &[]).unwrap();
        assert_eq!(meta.html, r#"<x-card foo="bar"></x-card>"#);
        assert_eq!(meta.occurrences, 1);
    }

    #[test]
    fn test_invalid_tree_is_rejected() {
        let tree = vec![Node::Element(Element::new("bad name"))];
        assert!(matches!(
            ingest_html(tree.into(), &[]),
            Err(RenderError::InvalidHtmlTree(_))
        ));
    }
}
