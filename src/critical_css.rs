//! Critical CSS extraction.
//!
//! Components render their styles as trailing `<style>` elements in the
//! shadow root. Once the declarative template has been copied out of a
//! shadow root, those elements are stripped from the live tree (the
//! template keeps them), and the definition's critical styles are formatted
//! and stored once per tag name for the page head.

use crate::component::ElementDefinition;
use crate::context::Bridge;
use crate::dom::{Document, DomError, NodeId};

/// Strips fallback styles from `host`'s shadow root and, the first time the
/// tag is seen in this request, records its critical CSS.
pub(crate) fn extract_critical_css(bridge: &Bridge, host: NodeId) -> Result<(), DomError> {
    let Some(shadow) = bridge.realm.document().shadow_root(host) else {
        return Ok(());
    };
    let removed = bridge
        .realm
        .mutate(|document| strip_trailing_styles(document, shadow))?;

    let Some(instance) = bridge.realm.instance(host) else {
        return Ok(());
    };
    let tag = instance.definition().name().to_string();
    if removed > 0 {
        log::trace!("Stripped {} fallback style(s) from <{}>", removed, tag);
    }
    if bridge.context.has_critical_styles(&tag) {
        return Ok(());
    }

    if let Some(css) = critical_css_for(instance.definition()) {
        log::debug!("Extracted critical CSS for <{}> ({} bytes)", tag, css.len());
        bridge.context.insert_critical_styles(&tag, css);
    }
    Ok(())
}

/// Removes the run of `<style>` elements at the end of `parent`'s element
/// children. Returns how many were removed.
pub fn strip_trailing_styles(document: &mut Document, parent: NodeId) -> Result<usize, DomError> {
    let mut removed = 0;
    while let Some(last) = document.element_children(parent).last().copied() {
        if document.local_name(last) != Some("style") {
            break;
        }
        document.remove(last)?;
        removed += 1;
    }
    Ok(removed)
}

/// Joins and formats the non-empty critical style fragments.
pub fn critical_css_for(definition: &ElementDefinition) -> Option<String> {
    let joined = definition
        .critical_styles()
        .iter()
        .map(|css| css.trim())
        .filter(|css| !css.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if joined.is_empty() {
        None
    } else {
        Some(format_css(&joined))
    }
}

/// Formats CSS: one declaration per line, two-space indent, a blank line
/// between top-level rules.
pub fn format_css(css: &str) -> String {
    let mut out = String::new();
    let mut buffer = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = css.chars().peekable();

    while let Some(ch) = chars.next() {
        if let Some(open) = quote {
            buffer.push(ch);
            if ch == '\\' {
                if let Some(escaped) = chars.next() {
                    buffer.push(escaped);
                }
            } else if ch == open {
                quote = None;
            }
            continue;
        }

        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                buffer.push(ch);
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for inner in chars.by_ref() {
                    if previous == '*' && inner == '/' {
                        break;
                    }
                    previous = inner;
                }
            }
            '{' => {
                push_line(&mut out, depth, &format!("{} {{", collapse(&buffer)));
                buffer.clear();
                depth += 1;
            }
            ';' => {
                push_declaration(&mut out, depth, &buffer);
                buffer.clear();
            }
            '}' => {
                push_declaration(&mut out, depth, &buffer);
                buffer.clear();
                depth = depth.saturating_sub(1);
                push_line(&mut out, depth, "}");
                if depth == 0 {
                    out.push('\n');
                }
            }
            _ => buffer.push(ch),
        }
    }
    push_declaration(&mut out, depth, &buffer);

    let trimmed = out.trim_end();
    let mut formatted = String::with_capacity(trimmed.len() + 1);
    formatted.push_str(trimmed);
    formatted.push('\n');
    formatted
}

fn push_line(out: &mut String, depth: usize, line: &str) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    out.push_str(line);
    out.push('\n');
}

fn push_declaration(out: &mut String, depth: usize, raw: &str) {
    let declaration = collapse(raw);
    if declaration.is_empty() {
        return;
    }
    let line = match declaration.split_once(':') {
        Some((property, value)) if depth > 0 => {
            format!("{}: {};", property.trim(), value.trim())
        }
        _ => format!("{};", declaration),
    };
    push_line(out, depth, &line);
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, Template};
    use crate::dom::ElementSnapshot;

    struct Empty;
    impl Component for Empty {
        fn render(&self, _host: &ElementSnapshot) -> Template {
            Template::new()
        }
    }

    #[test]
    fn test_format_css() {
        let css = ":host{display:block;color:red}p{margin:0}";
        assert_eq!(
            format_css(css),
            ":host {\n  display: block;\n  color: red;\n}\n\np {\n  margin: 0;\n}\n"
        );
    }

    #[test]
    fn test_format_nested_rules() {
        let css = "@media (min-width: 600px) { :host { padding: 1rem } }";
        assert_eq!(
            format_css(css),
            "@media (min-width: 600px) {\n  :host {\n    padding: 1rem;\n  }\n}\n"
        );
    }

    #[test]
    fn test_format_keeps_strings_and_drops_comments() {
        let css = "/* note */ a::before { content: \"{;}\" }";
        assert_eq!(format_css(css), "a::before {\n  content: \"{;}\";\n}\n");
    }

    #[test]
    fn test_format_url_values() {
        let css = "a{background:url(http://x/y.png)}";
        assert_eq!(
            format_css(css),
            "a {\n  background: url(http://x/y.png);\n}\n"
        );
    }

    #[test]
    fn test_critical_css_for_joins_fragments() {
        let definition = ElementDefinition::new("x-a", || Empty)
            .critical_style(":host { display: block }")
            .critical_style("  ")
            .critical_style("p { color: red }");
        assert_eq!(
            critical_css_for(&definition).unwrap(),
            ":host {\n  display: block;\n}\n\np {\n  color: red;\n}\n"
        );

        let definition = ElementDefinition::new("x-b", || Empty).critical_style("");
        assert_eq!(critical_css_for(&definition), None);
    }

    #[test]
    fn test_strip_trailing_styles() {
        let mut document = Document::new();
        let body = document.body();
        document
            .set_inner_html(
                body,
                "<style>a{}</style><p>x</p><style>b{}</style>text<style>c{}</style>",
            )
            .unwrap();

        assert_eq!(strip_trailing_styles(&mut document, body).unwrap(), 2);
        assert_eq!(
            document.inner_html(body),
            "<style>a{}</style><p>x</p>text"
        );
        assert_eq!(strip_trailing_styles(&mut document, body).unwrap(), 0);
    }
}
