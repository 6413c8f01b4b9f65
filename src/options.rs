//! Render options with builder and validation.
//!
//! # Example
//!
//! ```rust
//! use static_shadow_dom::{FailurePolicy, RenderOptions};
//!
//! let options = RenderOptions::builder()
//!     .cwd("/srv/app")
//!     .prettify(true)
//!     .render_elements(["article"])
//!     .failure_policy(FailurePolicy::FailFast)
//!     .build()
//!     .expect("valid options");
//!
//! assert_eq!(options.container_el_id, "static-shadow-dom");
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::dom::ElementSnapshot;
use crate::error::OptionsError;
use crate::ingest::is_potential_custom_element_name;

/// Id of the container element the fragment is rendered into.
pub const DEFAULT_CONTAINER_EL_ID: &str = "static-shadow-dom";

/// File name looked up in `cwd` by [`ImportMapOption::Default`].
pub const DEFAULT_IMPORT_MAP_FILE: &str = "static-shadow-dom.importmap";

/// A property bag applied to a component instance.
pub type Properties = serde_json::Map<String, Value>;

/// Computes properties for an element before it is serialized.
pub type ElementPropertiesHook =
    Arc<dyn Fn(&ElementSnapshot, &PropertyContext<'_>) -> Option<Properties> + Send + Sync>;

/// Overrides the readiness signal of an element.
///
/// Returning `None` falls back to the component's own update completion.
pub type RenderReadyHook =
    Arc<dyn Fn(&ElementSnapshot) -> Option<BoxFuture<'static, ()>> + Send + Sync>;

/// Where an element sits, handed to [`ElementPropertiesHook`].
#[derive(Debug, Clone, Copy)]
pub struct PropertyContext<'a> {
    /// The request's `data` option.
    pub data: &'a Value,
    /// Element ancestors, nearest first, up to the container or shadow root.
    pub ancestor_elements: &'a [ElementSnapshot],
    /// Host of the shadow tree the element lives in.
    pub host_element: Option<&'a ElementSnapshot>,
    /// Element siblings before this one, in document order.
    pub previous_sibling_elements: &'a [ElementSnapshot],
    /// Element siblings after this one, in document order.
    pub next_sibling_elements: &'a [ElementSnapshot],
}

/// Import map lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImportMapOption {
    /// No import map.
    #[default]
    Disabled,
    /// `<cwd>/static-shadow-dom.importmap`.
    Default,
    /// A path, relative to `cwd` unless absolute.
    Path(PathBuf),
}

impl ImportMapOption {
    /// File to read, if any.
    pub fn resolve(&self, cwd: &Path) -> Option<PathBuf> {
        match self {
            ImportMapOption::Disabled => None,
            ImportMapOption::Default => Some(cwd.join(DEFAULT_IMPORT_MAP_FILE)),
            ImportMapOption::Path(path) => Some(cwd.join(path)),
        }
    }
}

impl From<bool> for ImportMapOption {
    fn from(enabled: bool) -> Self {
        if enabled {
            ImportMapOption::Default
        } else {
            ImportMapOption::Disabled
        }
    }
}

impl From<&str> for ImportMapOption {
    fn from(path: &str) -> Self {
        ImportMapOption::Path(PathBuf::from(path))
    }
}

impl From<PathBuf> for ImportMapOption {
    fn from(path: PathBuf) -> Self {
        ImportMapOption::Path(path)
    }
}

/// Which connected elements are serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderSelection {
    /// Every defined custom element with a shadow root, plus marked ones.
    #[default]
    AllDefined,
    /// Only elements with an SSR marker attribute, an SSR render flag, or a
    /// name listed in `render_elements`.
    MarkedOnly,
}

/// What a failed element does to the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log, record in [`RenderResult::failures`](crate::RenderResult), keep going.
    #[default]
    BestEffort,
    /// Reject the whole render with [`RenderError::Serialization`](crate::RenderError).
    FailFast,
}

/// Options of a single render.
#[derive(Clone)]
pub struct RenderOptions {
    /// Base directory for module specifiers.
    pub cwd: PathBuf,
    /// Tear the environment down after the render.
    pub cleanup: bool,
    /// Id of the container element.
    pub container_el_id: String,
    /// Import map lookup.
    pub import_map: ImportMapOption,
    /// Arbitrary data handed to the properties hook.
    pub data: Value,
    /// Pretty-print the resulting HTML.
    pub prettify: bool,
    /// Also return the result as a tree.
    pub return_ast: bool,
    /// Extra tag names to track and serialize.
    pub render_elements: Vec<String>,
    /// Per-element properties hook.
    pub get_element_properties: Option<ElementPropertiesHook>,
    /// Per-element readiness hook.
    pub get_render_ready: Option<RenderReadyHook>,
    /// Element selection.
    pub selection: RenderSelection,
    /// Failure handling.
    pub failure_policy: FailurePolicy,
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("cwd", &self.cwd)
            .field("cleanup", &self.cleanup)
            .field("container_el_id", &self.container_el_id)
            .field("import_map", &self.import_map)
            .field("data", &self.data)
            .field("prettify", &self.prettify)
            .field("return_ast", &self.return_ast)
            .field("render_elements", &self.render_elements)
            .field(
                "get_element_properties",
                &self.get_element_properties.as_ref().map(|_| "Fn"),
            )
            .field("get_render_ready", &self.get_render_ready.as_ref().map(|_| "Fn"))
            .field("selection", &self.selection)
            .field("failure_policy", &self.failure_policy)
            .finish()
    }
}

impl Default for RenderOptions {
    /// `cwd` defaults to the process working directory.
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
            cleanup: true,
            container_el_id: DEFAULT_CONTAINER_EL_ID.to_string(),
            import_map: ImportMapOption::Disabled,
            data: Value::Object(Properties::new()),
            prettify: false,
            return_ast: false,
            render_elements: Vec::new(),
            get_element_properties: None,
            get_render_ready: None,
            selection: RenderSelection::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl RenderOptions {
    /// Starts a builder from the defaults.
    pub fn builder() -> RenderOptionsBuilder {
        RenderOptionsBuilder::new()
    }

    /// Checks every option, returning the first violation.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.cwd.as_os_str().is_empty() || !self.cwd.is_absolute() {
            return Err(OptionsError::Cwd(self.cwd.clone()));
        }

        if self.container_el_id.is_empty()
            || self.container_el_id.chars().any(char::is_whitespace)
        {
            return Err(OptionsError::ContainerElId(self.container_el_id.clone()));
        }

        if let Some(path) = self.import_map.resolve(&self.cwd) {
            if !path.is_file() {
                return Err(OptionsError::ImportMapPath(path));
            }
        }

        if let Some(name) = self
            .render_elements
            .iter()
            .find(|name| !is_valid_element_name(name))
        {
            return Err(OptionsError::RenderElements(name.clone()));
        }

        Ok(())
    }

    /// Path of the import map file, if enabled.
    pub fn import_map_path(&self) -> Option<PathBuf> {
        self.import_map.resolve(&self.cwd)
    }
}

fn is_valid_element_name(name: &str) -> bool {
    if is_potential_custom_element_name(name) {
        return true;
    }
    let mut chars = name.chars();
    matches!(chars.next(), Some(first) if first.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

/// Builder for [`RenderOptions`].
#[derive(Debug, Default)]
pub struct RenderOptionsBuilder {
    options: RenderOptions,
}

impl RenderOptionsBuilder {
    /// Creates a builder holding the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Base directory for module specifiers. Must be absolute.
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.options.cwd = cwd.into();
        self
    }

    /// Tear the environment down after the render (default `true`).
    pub fn cleanup(mut self, cleanup: bool) -> Self {
        self.options.cleanup = cleanup;
        self
    }

    /// Id of the container element.
    pub fn container_el_id(mut self, id: impl Into<String>) -> Self {
        self.options.container_el_id = id.into();
        self
    }

    /// Import map lookup: `true`, a path, or an [`ImportMapOption`].
    pub fn import_map(mut self, import_map: impl Into<ImportMapOption>) -> Self {
        self.options.import_map = import_map.into();
        self
    }

    /// Data handed to the properties hook.
    pub fn data(mut self, data: Value) -> Self {
        self.options.data = data;
        self
    }

    /// Pretty-print the result.
    pub fn prettify(mut self, prettify: bool) -> Self {
        self.options.prettify = prettify;
        self
    }

    /// Also return the result as a tree.
    pub fn return_ast(mut self, return_ast: bool) -> Self {
        self.options.return_ast = return_ast;
        self
    }

    /// Extra tag names to track and serialize.
    pub fn render_elements<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.render_elements = names.into_iter().map(Into::into).collect();
        self
    }

    /// Per-element properties hook.
    pub fn get_element_properties<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ElementSnapshot, &PropertyContext<'_>) -> Option<Properties> + Send + Sync + 'static,
    {
        self.options.get_element_properties = Some(Arc::new(hook));
        self
    }

    /// Per-element readiness hook.
    pub fn get_render_ready<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ElementSnapshot) -> Option<BoxFuture<'static, ()>> + Send + Sync + 'static,
    {
        self.options.get_render_ready = Some(Arc::new(hook));
        self
    }

    /// Element selection.
    pub fn selection(mut self, selection: RenderSelection) -> Self {
        self.options.selection = selection;
        self
    }

    /// Failure handling.
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.options.failure_policy = policy;
        self
    }

    /// Validates and returns the options.
    pub fn build(self) -> Result<RenderOptions, OptionsError> {
        self.options.validate()?;
        Ok(self.options)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
