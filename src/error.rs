//! Error types for rendering and for the renderer pool.
//!
//! This module provides [`RenderError`], the unified error type returned by
//! every rendering and pool operation, [`OptionsError`] for rejected
//! [`RenderOptions`](crate::RenderOptions), and a convenient [`Result`] alias.
//!
//! # Example
//!
//! ```rust
//! use static_shadow_dom::{RenderError, Result};
//!
//! fn render_page() -> Result<String> {
//!     Err(RenderError::Configuration("example error".to_string()))
//! }
//!
//! match render_page() {
//!     Ok(html) => println!("Rendered {} bytes", html.len()),
//!     Err(RenderError::Disconnected) => println!("Renderer went away"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::path::PathBuf;

/// Errors raised while validating [`RenderOptions`](crate::RenderOptions).
///
/// Validation happens before any rendering work starts, so an options error
/// never leaves a half-built request behind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionsError {
    /// `cwd` is empty or not an absolute path.
    #[error("Expected option \"cwd\" to be an absolute path, got {0:?}")]
    Cwd(PathBuf),

    /// `container_el_id` is empty or contains whitespace.
    #[error("Expected option \"containerElId\" to be a non-empty id without whitespace, got {0:?}")]
    ContainerElId(String),

    /// The import map file does not exist.
    #[error("A file does not exist at the path provided for option \"importMap\": {0:?}")]
    ImportMapPath(PathBuf),

    /// An entry of `render_elements` is not a valid element name.
    #[error("Expected option \"renderElements\" to be a list of element names, got {0:?}")]
    RenderElements(String),
}

/// Errors that can occur while rendering or while managing renderers.
///
/// # Example
///
/// ```rust
/// use static_shadow_dom::RenderError;
///
/// fn handle_error(error: RenderError) {
///     match error {
///         RenderError::InvalidHtmlSource { reason, .. } => {
///             eprintln!("Bad HTML: {}", reason);
///         }
///         RenderError::ScriptExecution { specifier, message } => {
///             eprintln!("{} failed: {}", specifier, message);
///         }
///         other => eprintln!("{}", other),
///     }
/// }
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    /// Options failed validation.
    #[error(transparent)]
    Options(#[from] OptionsError),

    /// The HTML source string could not be parsed.
    ///
    /// `context` holds the beginning of the offending source.
    #[error("Invalid HTML source string\n↳ {reason}\n  context: {context}")]
    InvalidHtmlSource {
        /// Parser message for the first error.
        reason: String,
        /// Leading excerpt of the source.
        context: String,
    },

    /// A pre-parsed tree could not be serialized back to HTML.
    #[error("Invalid HTML tree source\n↳ {0}")]
    InvalidHtmlTree(String),

    /// A component module failed to resolve, load or evaluate.
    #[error("Scripts execution error\n↳ {specifier}: {message}")]
    ScriptExecution {
        /// The specifier (or resolved URL) of the failing module.
        specifier: String,
        /// What went wrong.
        message: String,
    },

    /// Serializing the shadow tree of an element failed under
    /// [`FailurePolicy::FailFast`](crate::FailurePolicy::FailFast).
    #[error("Failed to serialize <{tag}>: {message}")]
    Serialization {
        /// Tag name of the failing element.
        tag: String,
        /// What went wrong.
        message: String,
    },

    /// The renderer worker disconnected before answering.
    #[error("The renderer has been disconnected")]
    Disconnected,

    /// Operation attempted during pool shutdown.
    #[error("Pool is shutting down")]
    ShuttingDown,

    /// Failed to create a new renderer worker.
    #[error("Failed to create renderer: {0}")]
    RendererCreation(String),

    /// A renderer failed a health check.
    #[error("Renderer health check failed: {0}")]
    HealthCheckFailed(String),

    /// A render did not finish within the configured time limit.
    #[error("Render timed out after {0}s")]
    Timeout(u64),

    /// Invalid configuration provided.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<String> for RenderError {
    fn from(msg: String) -> Self {
        RenderError::Configuration(msg)
    }
}

impl From<&str> for RenderError {
    fn from(msg: &str) -> Self {
        RenderError::Configuration(msg.to_string())
    }
}

/// Result type alias using [`RenderError`].
pub type Result<T> = std::result::Result<T, RenderError>;

// ============================================================================
// Unit Tests
// ============================================================================
