//! A small HTML pretty printer.
//!
//! Elements whose content fits within the print width stay on one line;
//! others put each child on its own line, indented by two spaces. Text is
//! never reflowed (text on its own line only loses surrounding whitespace),
//! and `pre`, `textarea`, `script` and `style` contents are
//! written verbatim.

use crate::dom::serialize::{escape_text, is_void_element, write_comment, write_end_tag, write_start_tag};
use crate::tree::{self, Element, Node};

/// Print width used for rendered results.
pub const PRINT_WIDTH: usize = 300;

const VERBATIM_ELEMENTS: [&str; 4] = ["pre", "textarea", "script", "style"];

/// Pretty-prints an HTML fragment.
pub fn prettify_html(html: &str, print_width: usize) -> String {
    let nodes = tree::parse_fragment_lossy(html);
    let mut out = String::new();
    for node in &nodes {
        write_block(&mut out, node, 0, print_width);
    }
    out
}

fn write_block(out: &mut String, node: &Node, depth: usize, width: usize) {
    match node {
        Node::Text { value } => {
            let text = value.trim();
            if !text.is_empty() {
                push_line(out, depth, &escape_text(text));
            }
        }
        Node::Comment { value } => {
            let mut comment = String::new();
            write_comment(&mut comment, value);
            push_line(out, depth, &comment);
        }
        Node::Element(element) => write_element(out, element, depth, width),
    }
}

fn write_element(out: &mut String, element: &Element, depth: usize, width: usize) {
    let mut open = String::new();
    write_start_tag(
        &mut open,
        &element.tag_name,
        element
            .attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str())),
    );
    if is_void_element(&element.tag_name) {
        push_line(out, depth, &open);
        return;
    }

    let mut close = String::new();
    write_end_tag(&mut close, &element.tag_name);

    if VERBATIM_ELEMENTS.contains(&element.tag_name.as_str()) {
        let inner = tree::to_html(&element.children).unwrap_or_default();
        push_line(out, depth, &format!("{open}{inner}{close}"));
        return;
    }

    if let Some(inline) = inline_form(element) {
        if depth * 2 + inline.len() <= width {
            push_line(out, depth, &inline);
            return;
        }
    }

    push_line(out, depth, &open);
    for child in &element.children {
        write_block(out, child, depth + 1, width);
    }
    push_line(out, depth, &close);
}

/// One-line form of `element`, unless its layout says it spans lines.
fn inline_form(element: &Element) -> Option<String> {
    let mut out = String::new();
    write_inline(&mut out, element)?;
    (!out.contains('\n')).then_some(out)
}

fn write_inline(out: &mut String, element: &Element) -> Option<()> {
    write_start_tag(
        out,
        &element.tag_name,
        element
            .attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str())),
    );
    if is_void_element(&element.tag_name) {
        return Some(());
    }
    if VERBATIM_ELEMENTS.contains(&element.tag_name.as_str()) {
        out.push_str(&tree::to_html(&element.children).ok()?);
    } else {
        for child in &element.children {
            match child {
                Node::Text { value } => {
                    if value.trim().is_empty() && value.contains('\n') {
                        return None;
                    }
                    out.push_str(&escape_text(value));
                }
                Node::Comment { value } => write_comment(out, value),
                Node::Element(child) => write_inline(out, child)?,
            }
        }
    }
    write_end_tag(out, &element.tag_name);
    Some(())
}

fn push_line(out: &mut String, depth: usize, line: &str) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    out.push_str(line);
    out.push('\n');
}
