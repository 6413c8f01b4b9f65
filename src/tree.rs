//! Owned HTML tree used for pre-parsed sources and returned ASTs.
//!
//! [`Node`] is a plain serde-friendly value: callers can build it by hand,
//! receive it in a [`RenderResult`](crate::RenderResult) when `return_ast`
//! is set, or pass it back as an [`HtmlSource::Tree`](crate::HtmlSource).
//!
//! Parsing goes through `scraper` (html5ever) in fragment mode. Template
//! contents are kept as ordinary children of the `<template>` element.
//!
//! # Example
//!
//! ```rust
//! use static_shadow_dom::tree::{self, Node};
//!
//! let nodes = tree::parse_fragment("<p class=\"lead\">Hello</p>").unwrap();
//! assert_eq!(nodes.len(), 1);
//! assert_eq!(tree::to_html(&nodes).unwrap(), "<p class=\"lead\">Hello</p>");
//! ```

use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};

use crate::dom::serialize::{
    is_void_element, write_comment, write_end_tag, write_start_tag, write_text,
};

/// A node of an owned HTML tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    /// An element with attributes and children.
    Element(Element),
    /// A text node.
    Text {
        /// Unescaped text.
        value: String,
    },
    /// A comment node.
    Comment {
        /// Comment body without the `<!--`/`-->` delimiters.
        value: String,
    },
}

/// An element of an owned HTML tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    /// Lowercase local name.
    pub tag_name: String,
    /// Attributes in source order.
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
    /// Child nodes.
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Element {
    /// Creates an element with no attributes or children.
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            ..Self::default()
        }
    }

    /// Adds an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Appends a child node.
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Returns the value of attribute `name`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

impl Node {
    /// Creates a text node.
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text {
            value: value.into(),
        }
    }

    /// Creates a comment node.
    pub fn comment(value: impl Into<String>) -> Self {
        Node::Comment {
            value: value.into(),
        }
    }

    /// Returns the element if this node is one.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

/// First parse error reported by the parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason} ({count} parse error(s))")]
pub struct ParseError {
    /// Message of the first error.
    pub reason: String,
    /// Total number of errors reported.
    pub count: usize,
}

/// Parses an HTML fragment, rejecting input the parser reports errors for.
pub fn parse_fragment(html: &str) -> Result<Vec<Node>, ParseError> {
    let document = Html::parse_fragment(html);
    if let Some(first) = document.errors.first() {
        return Err(ParseError {
            reason: first.to_string(),
            count: document.errors.len(),
        });
    }
    Ok(convert_children(document.root_element()))
}

/// Parses an HTML fragment, recovering from errors the way browsers do.
pub fn parse_fragment_lossy(html: &str) -> Vec<Node> {
    let document = Html::parse_fragment(html);
    if !document.errors.is_empty() {
        log::trace!(
            "Recovered from {} parse error(s) in fragment",
            document.errors.len()
        );
    }
    convert_children(document.root_element())
}

fn convert_children(parent: ElementRef<'_>) -> Vec<Node> {
    parent
        .children()
        .filter_map(|child| match child.value() {
            scraper::Node::Element(_) => {
                ElementRef::wrap(child).map(|element| Node::Element(convert_element(element)))
            }
            scraper::Node::Text(text) => Some(Node::text(text.text.to_string())),
            scraper::Node::Comment(comment) => Some(Node::comment(comment.comment.to_string())),
            _ => None,
        })
        .collect()
}

fn convert_element(element: ElementRef<'_>) -> Element {
    let value = element.value();
    Element {
        tag_name: value.name().to_string(),
        attributes: value
            .attrs()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
        children: convert_children(element),
    }
}

/// Serializes a node list back to HTML.
///
/// Fails when an element has an empty tag name or an attribute name that
/// cannot be written, or when a void element carries children.
pub fn to_html(nodes: &[Node]) -> Result<String, String> {
    let mut out = String::new();
    write_nodes(&mut out, nodes, None)?;
    Ok(out)
}

fn write_nodes(out: &mut String, nodes: &[Node], parent: Option<&str>) -> Result<(), String> {
    for node in nodes {
        match node {
            Node::Element(element) => write_element(out, element)?,
            Node::Text { value } => write_text(out, value, parent),
            Node::Comment { value } => write_comment(out, value),
        }
    }
    Ok(())
}

fn write_element(out: &mut String, element: &Element) -> Result<(), String> {
    if !is_valid_name(&element.tag_name) {
        return Err(format!("invalid tag name {:?}", element.tag_name));
    }
    if let Some((name, _)) = element
        .attributes
        .iter()
        .find(|(name, _)| !is_valid_name(name))
    {
        return Err(format!(
            "invalid attribute name {:?} on <{}>",
            name, element.tag_name
        ));
    }

    write_start_tag(
        out,
        &element.tag_name,
        element
            .attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str())),
    );
    if is_void_element(&element.tag_name) {
        if !element.children.is_empty() {
            return Err(format!("void element <{}> has children", element.tag_name));
        }
        return Ok(());
    }
    write_nodes(out, &element.children, Some(&element.tag_name))?;
    write_end_tag(out, &element.tag_name);
    Ok(())
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '\'' | '/' | '=' | '\0'))
}

/// Visits every element in document order, skipping template contents.
pub fn for_each_element<'a>(nodes: &'a [Node], visit: &mut impl FnMut(&'a Element)) {
    for node in nodes {
        if let Node::Element(element) = node {
            visit(element);
            if element.tag_name != "template" {
                for_each_element(&element.children, visit);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fragment() {
        let nodes = parse_fragment(r#"<div>String 1</div><x-card foo="bar"><p>hey</p></x-card>"#)
            .unwrap();
        assert_eq!(nodes.len(), 2);

        let card = nodes[1].as_element().unwrap();
        assert_eq!(card.tag_name, "x-card");
        assert_eq!(card.attribute("foo"), Some("bar"));
        assert_eq!(card.children.len(), 1);
    }

    #[test]
    fn test_parse_keeps_template_children() {
        let nodes = parse_fragment("<template><p>inside</p></template>").unwrap();
        let template = nodes[0].as_element().unwrap();
        assert_eq!(template.children.len(), 1);
    }

    #[test]
    fn test_strict_parse_rejects_errors() {
        let error = parse_fragment("<div></span></div>").unwrap_err();
        assert!(error.count >= 1);
        assert!(!error.reason.is_empty());
    }

    #[test]
    fn test_lossy_parse_recovers() {
        let nodes = parse_fragment_lossy("<div></span>text</div>");
        assert_eq!(to_html(&nodes).unwrap(), "<div>text</div>");
    }

    #[test]
    fn test_to_html_escapes() {
        let nodes = vec![Node::Element(
            Element::new("p")
                .with_attribute("title", "a \"b\"")
                .with_child(Node::text("1 < 2"))
                .with_child(Node::comment(" note ")),
        )];
        assert_eq!(
            to_html(&nodes).unwrap(),
            r#"<p title="a &quot;b&quot;">1 &lt; 2<!-- note --></p>"#
        );
    }

    #[test]
    fn test_to_html_rejects_invalid_names() {
        let nodes = vec![Node::Element(Element::new(""))];
        assert!(to_html(&nodes).is_err());

        let nodes = vec![Node::Element(Element::new("br").with_child(Node::text("x")))];
        assert!(to_html(&nodes).is_err());
    }

    #[test]
    fn test_serde_shape() {
        let node = Node::Element(Element::new("x-a").with_child(Node::text("hi")));
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "element");
        assert_eq!(json["tagName"], "x-a");
        assert_eq!(json["children"][0]["type"], "text");

        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_for_each_element_skips_template_contents() {
        let nodes = parse_fragment("<a-b><c-d></c-d></a-b><template><e-f></e-f></template>")
            .unwrap();
        let mut names = Vec::new();
        for_each_element(&nodes, &mut |element| names.push(element.tag_name.clone()));
        assert_eq!(names, vec!["a-b", "c-d", "template"]);
    }
}
