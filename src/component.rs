//! Component model: element definitions, templates and instance lifecycle.
//!
//! A custom element is described by an [`ElementDefinition`]: its name, a
//! constructor for the [`Component`] behind each instance, fallback styles
//! and critical styles. Instances follow a small lifecycle:
//!
//! 1. On connection the instance is created and a shadow root is attached.
//! 2. An update is scheduled for a later turn of the event loop. The first
//!    update awaits [`Component::before_render`] when it returns a future.
//! 3. The update renders the [`Template`] into the shadow root, followed by
//!    one `<style>` element per fallback style.
//! 4. [`ElementInstance::update_complete`] resolves once the most recently
//!    requested update has rendered.
//!
//! Setting properties through [`Component::set_property`] requests a new
//! update when the component reports a change.
//!
//! # Example
//!
//! ```rust
//! use static_shadow_dom::component::{Component, ElementDefinition, Template};
//! use static_shadow_dom::dom::ElementSnapshot;
//!
//! struct Greeting;
//!
//! impl Component for Greeting {
//!     fn render(&self, host: &ElementSnapshot) -> Template {
//!         Template::new()
//!             .html("<p>Hello, ")
//!             .text(host.attribute("name").unwrap_or("world"))
//!             .html("!</p>")
//!     }
//! }
//!
//! let definition = ElementDefinition::new("x-greeting", || Greeting)
//!     .style("p { color: teal; }")
//!     .critical_style(":host { display: block; }");
//! assert_eq!(definition.name(), "x-greeting");
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use serde_json::Value;
use tokio::sync::watch;

use crate::dom::serialize::{escape_attribute, escape_text};
use crate::dom::{DomError, ElementSnapshot, NodeId, ShadowRootMode};
use crate::options::Properties;

/// Comment inserted around dynamic template parts; stripped from results.
pub const PART_MARKER: &str = "<!---->";

/// Errors raised by component modules and definitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComponentError {
    /// Free-form failure raised by a module or component.
    #[error("{0}")]
    Failed(String),
    /// `define` with a name that is already registered.
    #[error("element `{0}` is already defined")]
    AlreadyDefined(String),
    /// `define` with a name that is not a valid custom element name.
    #[error("`{0}` is not a valid custom element name")]
    InvalidName(String),
    /// A module import could not be resolved or found.
    #[error("cannot find module `{0}`")]
    ModuleNotFound(String),
    /// A document operation failed.
    #[error(transparent)]
    Dom(#[from] DomError),
}

impl From<String> for ComponentError {
    fn from(message: String) -> Self {
        ComponentError::Failed(message)
    }
}

impl From<&str> for ComponentError {
    fn from(message: &str) -> Self {
        ComponentError::Failed(message.to_string())
    }
}

/// Behaviour of a custom element instance.
pub trait Component: 'static {
    /// Produces the shadow root contents.
    fn render(&self, host: &ElementSnapshot) -> Template;

    /// Applies one property. Returns `true` when the value changed and the
    /// element must re-render.
    fn set_property(&mut self, name: &str, value: &Value) -> bool {
        let _ = (name, value);
        false
    }

    /// Work to finish before the first render, e.g. loading data.
    fn before_render(&mut self) -> Option<LocalBoxFuture<'static, ()>> {
        None
    }
}

/// Rendered markup of a component.
///
/// Static parts are trusted markup; dynamic parts are escaped and wrapped in
/// empty marker comments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    markup: String,
}

impl Template {
    /// Creates an empty template.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends static markup verbatim.
    pub fn html(mut self, markup: &str) -> Self {
        self.markup.push_str(markup);
        self
    }

    /// Appends an escaped text part.
    pub fn text(mut self, value: impl fmt::Display) -> Self {
        self.markup.push_str(PART_MARKER);
        self.markup.push_str(&escape_text(&value.to_string()));
        self.markup.push_str(PART_MARKER);
        self
    }

    /// Appends an escaped attribute value (place it between quotes).
    pub fn attr(mut self, value: impl fmt::Display) -> Self {
        self.markup.push_str(&escape_attribute(&value.to_string()));
        self
    }

    /// Appends a nested template as a child part.
    pub fn child(mut self, template: Template) -> Self {
        self.markup.push_str(PART_MARKER);
        self.markup.push_str(&template.markup);
        self.markup.push_str(PART_MARKER);
        self
    }

    /// Appends one child part per item.
    pub fn children<I>(mut self, templates: I) -> Self
    where
        I: IntoIterator<Item = Template>,
    {
        self.markup.push_str(PART_MARKER);
        for template in templates {
            self.markup.push_str(PART_MARKER);
            self.markup.push_str(&template.markup);
            self.markup.push_str(PART_MARKER);
        }
        self.markup.push_str(PART_MARKER);
        self
    }

    /// The accumulated markup.
    pub fn markup(&self) -> &str {
        &self.markup
    }
}

type Constructor = Rc<dyn Fn() -> Box<dyn Component>>;

/// Definition of a custom element type.
#[derive(Clone)]
pub struct ElementDefinition {
    name: String,
    constructor: Constructor,
    styles: Vec<String>,
    critical_styles: Vec<String>,
    ssr_render: bool,
    shadow_mode: Option<ShadowRootMode>,
}

impl fmt::Debug for ElementDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementDefinition")
            .field("name", &self.name)
            .field("styles", &self.styles.len())
            .field("critical_styles", &self.critical_styles.len())
            .field("ssr_render", &self.ssr_render)
            .field("shadow_mode", &self.shadow_mode)
            .finish()
    }
}

impl ElementDefinition {
    /// Defines `name`, constructing instances with `constructor`.
    pub fn new<C, F>(name: impl Into<String>, constructor: F) -> Self
    where
        C: Component,
        F: Fn() -> C + 'static,
    {
        Self {
            name: name.into(),
            constructor: Rc::new(move || Box::new(constructor()) as Box<dyn Component>),
            styles: Vec::new(),
            critical_styles: Vec::new(),
            ssr_render: false,
            shadow_mode: Some(ShadowRootMode::Open),
        }
    }

    /// Adds a fallback style, rendered as a `<style>` after the template.
    pub fn style(mut self, css: impl Into<String>) -> Self {
        self.styles.push(css.into());
        self
    }

    /// Adds a critical style fragment.
    pub fn critical_style(mut self, css: impl Into<String>) -> Self {
        self.critical_styles.push(css.into());
        self
    }

    /// Marks the type as providing a server render, which makes every
    /// instance eligible for serialization.
    pub fn ssr_render(mut self, enabled: bool) -> Self {
        self.ssr_render = enabled;
        self
    }

    /// Uses a closed shadow root.
    pub fn closed(mut self) -> Self {
        self.shadow_mode = Some(ShadowRootMode::Closed);
        self
    }

    /// Renders into the light DOM instead of a shadow root.
    pub fn without_shadow_root(mut self) -> Self {
        self.shadow_mode = None;
        self
    }

    /// Element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fallback styles.
    pub fn styles(&self) -> &[String] {
        &self.styles
    }

    /// Critical style fragments.
    pub fn critical_styles(&self) -> &[String] {
        &self.critical_styles
    }

    /// `true` when the type declares a server render.
    pub fn has_ssr_render(&self) -> bool {
        self.ssr_render
    }

    /// Shadow root mode, `None` for light-DOM components.
    pub fn shadow_mode(&self) -> Option<ShadowRootMode> {
        self.shadow_mode
    }

    pub(crate) fn construct(&self) -> Box<dyn Component> {
        (self.constructor)()
    }
}

/// A live custom element: its node, definition and component state.
pub struct ElementInstance {
    node: NodeId,
    definition: Rc<ElementDefinition>,
    component: RefCell<Box<dyn Component>>,
    requested: Cell<u64>,
    completed: watch::Sender<u64>,
    update_scheduled: Cell<bool>,
    first_update_done: Cell<bool>,
    last_error: RefCell<Option<String>>,
}

impl fmt::Debug for ElementInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementInstance")
            .field("node", &self.node)
            .field("name", &self.definition.name)
            .field("requested", &self.requested.get())
            .field("completed", &*self.completed.borrow())
            .finish()
    }
}

impl ElementInstance {
    pub(crate) fn new(node: NodeId, definition: Rc<ElementDefinition>) -> Self {
        let component = definition.construct();
        let (completed, _) = watch::channel(0);
        Self {
            node,
            definition,
            component: RefCell::new(component),
            requested: Cell::new(0),
            completed,
            update_scheduled: Cell::new(false),
            first_update_done: Cell::new(false),
            last_error: RefCell::new(None),
        }
    }

    /// The element's node.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The element's definition.
    pub fn definition(&self) -> &Rc<ElementDefinition> {
        &self.definition
    }

    /// Error of the most recent update, if it failed.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    /// Records an update request. Returns `true` when the caller must
    /// schedule the update (none is pending yet).
    pub(crate) fn request_update(&self) -> bool {
        self.requested.set(self.requested.get() + 1);
        !self.update_scheduled.replace(true)
    }

    /// Applies `properties`; returns `true` if any of them changed.
    pub(crate) fn set_properties(&self, properties: &Properties) -> bool {
        let mut component = self.component.borrow_mut();
        let mut changed = false;
        for (name, value) in properties {
            changed |= component.set_property(name, value);
        }
        changed
    }

    /// Takes the pre-render future on the first update only.
    pub(crate) fn take_before_render(&self) -> Option<LocalBoxFuture<'static, ()>> {
        if self.first_update_done.replace(true) {
            return None;
        }
        self.component.borrow_mut().before_render()
    }

    /// Starts rendering: clears the scheduled flag and returns the update
    /// number this render satisfies.
    pub(crate) fn begin_render(&self) -> u64 {
        self.update_scheduled.set(false);
        self.requested.get()
    }

    pub(crate) fn render(&self, host: &ElementSnapshot) -> Template {
        self.component.borrow().render(host)
    }

    pub(crate) fn finish_render(&self, update: u64, error: Option<String>) {
        *self.last_error.borrow_mut() = error;
        self.completed.send_replace(update);
    }

    /// Resolves once every update requested so far has rendered.
    pub fn update_complete(&self) -> LocalBoxFuture<'static, ()> {
        let target = self.requested.get();
        let mut receiver = self.completed.subscribe();
        Box::pin(async move {
            let _ = receiver.wait_for(|done| *done >= target).await;
        })
    }

    /// `true` while an update is requested but not rendered.
    pub fn has_pending_update(&self) -> bool {
        *self.completed.borrow() < self.requested.get()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
