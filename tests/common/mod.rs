//! Shared fixtures: a handful of components and the registry serving them.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use futures::future::LocalBoxFuture;
use serde_json::Value;
use static_shadow_dom::RenderOptionsBuilder;
use static_shadow_dom::prelude::*;

pub const CWD: &str = "/site";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `<slot></slot><div><p>{foo}!</p></div>`
pub struct WebComponent;

impl Component for WebComponent {
    fn render(&self, host: &ElementSnapshot) -> Template {
        Template::new()
            .html("<slot></slot><div><p>")
            .text(host.attribute("foo").unwrap_or_default())
            .html("!</p></div>")
    }
}

/// Renders an `<x-inner>` inside its shadow root.
pub struct Outer;

impl Component for Outer {
    fn render(&self, _host: &ElementSnapshot) -> Template {
        Template::new().html("<section><x-inner></x-inner></section>")
    }
}

pub struct Inner;

impl Component for Inner {
    fn render(&self, _host: &ElementSnapshot) -> Template {
        Template::new().html("<b>inner</b>")
    }
}

pub struct Chip;

impl Component for Chip {
    fn render(&self, host: &ElementSnapshot) -> Template {
        Template::new().text(host.attribute("label").unwrap_or("chip"))
    }
}

/// A page listing the sections it receives as a property.
#[derive(Default)]
pub struct Page {
    sections: Vec<String>,
}

impl Component for Page {
    fn render(&self, _host: &ElementSnapshot) -> Template {
        Template::new().html("<div>").children(self.sections.iter().map(|heading| {
            Template::new()
                .html(r#"<x-section heading=""#)
                .attr(heading)
                .html(r#""></x-section>"#)
        }))
        .html("</div>")
    }

    fn set_property(&mut self, name: &str, value: &Value) -> bool {
        if name != "sections" {
            return false;
        }
        let sections: Vec<String> = value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        if sections == self.sections {
            return false;
        }
        self.sections = sections;
        true
    }
}

pub struct Section;

impl Component for Section {
    fn render(&self, host: &ElementSnapshot) -> Template {
        Template::new()
            .html("<h2>")
            .text(host.attribute("heading").unwrap_or_default())
            .html("</h2>")
    }
}

/// Light-DOM component: renders without a shadow root.
pub struct Plain;

impl Component for Plain {
    fn render(&self, _host: &ElementSnapshot) -> Template {
        Template::new().html("<span>light</span>")
    }
}

/// Loads its message in `before_render`, so the first render waits for it.
pub struct Loader {
    message: Rc<RefCell<String>>,
}

impl Default for Loader {
    fn default() -> Self {
        Self {
            message: Rc::new(RefCell::new("loading".to_string())),
        }
    }
}

impl Component for Loader {
    fn render(&self, _host: &ElementSnapshot) -> Template {
        Template::new()
            .html("<p>")
            .text(self.message.borrow().as_str())
            .html("</p>")
    }

    fn before_render(&mut self) -> Option<LocalBoxFuture<'static, ()>> {
        let message = Rc::clone(&self.message);
        Some(Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            *message.borrow_mut() = "loaded".to_string();
        }))
    }
}

pub fn modules() -> Arc<ModuleRegistry> {
    Arc::new(
        ModuleRegistry::new()
            .with_module(
                "/site/web-component.js",
                component_module(|scope| {
                    scope.define(ElementDefinition::new("web-component", || WebComponent))
                }),
            )
            .with_module(
                "/site/nested.js",
                component_module(|scope| {
                    scope.define(ElementDefinition::new("x-inner", || Inner))?;
                    scope.define(ElementDefinition::new("x-outer", || Outer))
                }),
            )
            .with_module(
                "/site/chip.js",
                component_module(|scope| {
                    scope.define(
                        ElementDefinition::new("x-chip", || Chip)
                            .style(":host { display: inline; }")
                            .critical_style(":host{display:inline-block;padding:0 4px}"),
                    )
                }),
            )
            .with_module(
                "/site/page.js",
                component_module(|scope| {
                    scope.define(ElementDefinition::new("x-section", || Section))?;
                    scope.define(ElementDefinition::new("x-page", Page::default))
                }),
            )
            .with_module(
                "/site/loader.js",
                component_module(|scope| {
                    scope.define(ElementDefinition::new("x-loader", Loader::default))
                }),
            )
            .with_module(
                "/site/plain.js",
                component_module(|scope| {
                    scope.define(ElementDefinition::new("x-plain", || Plain).without_shadow_root())
                }),
            ),
    )
}

pub fn options() -> RenderOptionsBuilder {
    RenderOptions::builder().cwd(CWD)
}

pub fn request(html: &str, scripts: &[&str], options: RenderOptions) -> RenderRequest {
    RenderRequest::new(html, scripts.iter().copied(), options)
}
