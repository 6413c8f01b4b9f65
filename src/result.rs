//! Result processing.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::context::RenderContext;
use crate::error::{RenderError, Result};
use crate::format::{PRINT_WIDTH, prettify_html};
use crate::serializer::SerializationFailure;
use crate::tree::{self, Node};

static MARKER_COMMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\n?<!--\s*-->(\s*\n?)").unwrap_or_else(|e| panic!("invalid marker pattern: {e}"))
});

/// Output of one render.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResult {
    /// Rendered HTML, with declarative shadow roots.
    pub html: String,
    /// `html` parsed back into a tree, when `return_ast` was set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ast: Option<Vec<Node>>,
    /// Formatted critical CSS by tag name.
    pub critical_styles: BTreeMap<String, String>,
    /// Elements that could not be serialized.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<SerializationFailure>,
}

impl RenderResult {
    /// Returns `true` if every eligible element was serialized.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Critical CSS of all tags, concatenated in tag order.
    pub fn critical_css(&self) -> String {
        self.critical_styles
            .values()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Browser snippet for pages served to clients without declarative
    /// shadow DOM: attaches every `template[shadowrootmode]` as a shadow
    /// root and inserts the critical styles into `<head>`.
    pub fn hydration_script(&self) -> String {
        let styles = serde_json::to_string(&self.critical_styles)
            .unwrap_or_else(|_| "{}".to_string())
            .replace("</", "<\\/");
        format!(
            r#"(function () {{
  var styles = {styles};
  Object.keys(styles).forEach(function (tag) {{
    var style = document.createElement("style");
    style.setAttribute("data-critical", tag);
    style.textContent = styles[tag];
    document.head.appendChild(style);
  }});
  if (HTMLTemplateElement.prototype.hasOwnProperty("shadowRootMode")) return;
  (function attach(root) {{
    root.querySelectorAll("template[shadowrootmode]").forEach(function (template) {{
      var host = template.parentNode;
      var shadow = host.attachShadow({{ mode: template.getAttribute("shadowrootmode") }});
      shadow.appendChild(template.content);
      template.remove();
      attach(shadow);
    }});
  }})(document);
}})();"#
        )
    }
}

/// Removes the empty marker comments components leave around dynamic parts.
pub fn strip_marker_comments(html: &str) -> String {
    MARKER_COMMENTS.replace_all(html, "$1").into_owned()
}

/// Turns the container's serialized contents into the request's result.
pub(crate) fn process_result(context: &RenderContext, html: String) -> Result<RenderResult> {
    let mut html = strip_marker_comments(&html);
    if context.options.prettify {
        html = prettify_html(&html, PRINT_WIDTH);
    }

    let ast = if context.options.return_ast {
        let nodes = tree::parse_fragment(&html).map_err(|e| RenderError::InvalidHtmlTree(e.to_string()))?;
        Some(nodes)
    } else {
        None
    };

    Ok(RenderResult {
        html,
        ast,
        critical_styles: context.critical_styles(),
        failures: context.failures(),
    })
}
