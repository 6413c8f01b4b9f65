//! Shared types for the render service.
//!
//! Framework-agnostic request and response types, used by the axum
//! integration and usable from custom handlers.
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`RenderHtmlRequest`] | JSON body of `POST /render` |
//! | [`RenderHtmlResponse`] | Rendered HTML, critical CSS and failures |
//! | [`RenderServiceError`] | Error types with HTTP status mapping |
//! | [`ErrorResponse`] | JSON error response for API clients |
//! | [`PoolStatsResponse`] | Renderer pool statistics |
//! | [`HealthResponse`] | Health check response |

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::RenderRequest;
use crate::error::RenderError;
use crate::options::{FailurePolicy, ImportMapOption, Properties, RenderOptions, RenderSelection};
use crate::result::RenderResult;
use crate::serializer::SerializationFailure;
use crate::tree::Node;

// ============================================================================
// Request Types
// ============================================================================

/// Import map setting in a JSON request: `true`, `false` or a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImportMapSetting {
    /// `true` reads the default file, `false` disables the import map.
    Enabled(bool),
    /// Path relative to `cwd`.
    Path(String),
}

/// Request body for rendering an HTML fragment.
///
/// ```json
/// {
///     "html": "<my-card ssr title=\"Hi\"></my-card>",
///     "scripts": ["./components/card.js"],
///     "cwd": "/srv/app",
///     "properties": { "my-card": { "count": 3 } },
///     "prettify": true
/// }
/// ```
///
/// Every field but `html` is optional. Hooks cannot travel over JSON;
/// `properties` covers the common case of setting properties by tag name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderHtmlRequest {
    /// HTML fragment to render.
    pub html: String,

    /// Module specifiers to import before the fragment is inserted.
    #[serde(default)]
    pub scripts: Vec<String>,

    /// Directory specifiers resolve against. Defaults to the server's
    /// working directory.
    pub cwd: Option<String>,

    /// Id of the container element.
    pub container_el_id: Option<String>,

    /// Import map setting.
    pub import_map: Option<ImportMapSetting>,

    /// Data passed to property hooks.
    pub data: Option<Value>,

    /// Properties applied to every element of a tag, keyed by tag name.
    pub properties: Option<BTreeMap<String, Properties>>,

    /// Pretty-print the output.
    pub prettify: Option<bool>,

    /// Return the output as a tree as well.
    pub return_ast: Option<bool>,

    /// Extra element names to serialize.
    pub render_elements: Option<Vec<String>>,

    /// Serialize only explicitly marked elements.
    pub marked_only: Option<bool>,

    /// Reject the request when any element fails to serialize.
    pub fail_fast: Option<bool>,

    /// Include [`RenderResult::hydration_script`] in the response.
    pub hydration_script: Option<bool>,
}

impl RenderHtmlRequest {
    /// Creates a request with default options.
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Default::default()
        }
    }

    /// Whether the response should carry the hydration script.
    pub fn wants_hydration_script(&self) -> bool {
        self.hydration_script.unwrap_or(false)
    }

    /// Builds the core request.
    ///
    /// # Errors
    ///
    /// - [`RenderServiceError::EmptyHtml`] for blank HTML
    /// - [`RenderServiceError::InvalidOptions`] when option validation fails
    pub fn to_render_request(&self) -> Result<RenderRequest, RenderServiceError> {
        if self.html.trim().is_empty() {
            return Err(RenderServiceError::EmptyHtml);
        }

        let mut builder = RenderOptions::builder()
            .prettify(self.prettify.unwrap_or(false))
            .return_ast(self.return_ast.unwrap_or(false));

        if let Some(cwd) = &self.cwd {
            builder = builder.cwd(PathBuf::from(cwd));
        }
        if let Some(id) = &self.container_el_id {
            builder = builder.container_el_id(id.clone());
        }
        if let Some(import_map) = &self.import_map {
            builder = builder.import_map(match import_map {
                ImportMapSetting::Enabled(enabled) => ImportMapOption::from(*enabled),
                ImportMapSetting::Path(path) => ImportMapOption::Path(PathBuf::from(path)),
            });
        }
        if let Some(data) = &self.data {
            builder = builder.data(data.clone());
        }
        if let Some(names) = &self.render_elements {
            builder = builder.render_elements(names.iter().cloned());
        }
        if let Some(properties) = &self.properties {
            let properties = Arc::new(properties.clone());
            builder = builder.get_element_properties(move |element, _context| {
                properties.get(&element.tag_name).cloned()
            });
        }
        if self.marked_only.unwrap_or(false) {
            builder = builder.selection(RenderSelection::MarkedOnly);
        }
        if self.fail_fast.unwrap_or(false) {
            builder = builder.failure_policy(FailurePolicy::FailFast);
        }

        let options = builder
            .build()
            .map_err(|e| RenderServiceError::InvalidOptions(e.to_string()))?;
        Ok(RenderRequest::new(self.html.clone(), self.scripts.clone(), options))
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// Successful render.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderHtmlResponse {
    /// Rendered HTML.
    pub html: String,

    /// Formatted critical CSS by tag name.
    pub critical_styles: BTreeMap<String, String>,

    /// Elements that could not be serialized.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureResponse>,

    /// Output tree, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ast: Option<Vec<Node>>,

    /// Browser snippet, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hydration_script: Option<String>,
}

/// One element that failed to serialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureResponse {
    /// Tag name.
    pub tag: String,
    /// What went wrong.
    pub message: String,
}

impl From<SerializationFailure> for FailureResponse {
    fn from(failure: SerializationFailure) -> Self {
        Self {
            tag: failure.tag,
            message: failure.message,
        }
    }
}

impl RenderHtmlResponse {
    /// Builds the response, adding the hydration script if asked to.
    pub fn from_result(result: RenderResult, hydration_script: bool) -> Self {
        let script = hydration_script.then(|| result.hydration_script());
        Self {
            html: result.html,
            critical_styles: result.critical_styles,
            failures: result.failures.into_iter().map(Into::into).collect(),
            ast: result.ast,
            hydration_script: script,
        }
    }
}

/// Renderer pool statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatsResponse {
    /// Idle renderers.
    pub available: usize,
    /// Tracked renderers, idle or checked out.
    pub active: usize,
    /// Total tracked renderers.
    pub total: usize,
    /// Renderers created since start.
    pub created: u64,
}

/// Health check response.
///
/// ```text
/// GET /health
///
/// {
///     "status": "healthy",
///     "service": "static-shadow-dom"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"healthy"` when the endpoint responds.
    pub status: String,
    /// Service name.
    pub service: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
            service: "static-shadow-dom".to_string(),
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors of the render service.
///
/// | Error | HTTP Status | Code |
/// |-------|-------------|------|
/// | [`EmptyHtml`](Self::EmptyHtml) | 400 | `EMPTY_HTML` |
/// | [`InvalidOptions`](Self::InvalidOptions) | 400 | `INVALID_OPTIONS` |
/// | [`InvalidHtml`](Self::InvalidHtml) | 400 | `INVALID_HTML` |
/// | [`ScriptExecution`](Self::ScriptExecution) | 422 | `SCRIPT_EXECUTION_FAILED` |
/// | [`Serialization`](Self::Serialization) | 422 | `SERIALIZATION_FAILED` |
/// | [`PoolLockFailed`](Self::PoolLockFailed) | 500 | `POOL_LOCK_FAILED` |
/// | [`RendererUnavailable`](Self::RendererUnavailable) | 503 | `RENDERER_UNAVAILABLE` |
/// | [`Timeout`](Self::Timeout) | 504 | `TIMEOUT` |
/// | [`PoolShuttingDown`](Self::PoolShuttingDown) | 503 | `POOL_SHUTTING_DOWN` |
/// | [`Internal`](Self::Internal) | 500 | `INTERNAL_ERROR` |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderServiceError {
    /// `html` is empty or whitespace.
    #[error("HTML content is required")]
    EmptyHtml,

    /// Options failed validation.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// The HTML could not be parsed or serialized.
    #[error("Invalid HTML: {0}")]
    InvalidHtml(String),

    /// A module failed to resolve or evaluate.
    #[error("Script execution failed: {0}")]
    ScriptExecution(String),

    /// An element failed to serialize under fail-fast.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// The pool mutex is poisoned.
    #[error("Failed to lock pool: {0}")]
    PoolLockFailed(String),

    /// No renderer could be checked out or the renderer died.
    #[error("Renderer unavailable: {0}")]
    RendererUnavailable(String),

    /// The render exceeded the pool's render timeout.
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// The pool is shutting down.
    #[error("Pool is shutting down")]
    PoolShuttingDown,

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RenderServiceError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::EmptyHtml | Self::InvalidOptions(_) | Self::InvalidHtml(_) => 400,
            Self::ScriptExecution(_) | Self::Serialization(_) => 422,
            Self::PoolLockFailed(_) | Self::Internal(_) => 500,
            Self::RendererUnavailable(_) | Self::PoolShuttingDown => 503,
            Self::Timeout(_) => 504,
        }
    }

    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyHtml => "EMPTY_HTML",
            Self::InvalidOptions(_) => "INVALID_OPTIONS",
            Self::InvalidHtml(_) => "INVALID_HTML",
            Self::ScriptExecution(_) => "SCRIPT_EXECUTION_FAILED",
            Self::Serialization(_) => "SERIALIZATION_FAILED",
            Self::PoolLockFailed(_) => "POOL_LOCK_FAILED",
            Self::RendererUnavailable(_) => "RENDERER_UNAVAILABLE",
            Self::Timeout(_) => "TIMEOUT",
            Self::PoolShuttingDown => "POOL_SHUTTING_DOWN",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the same request may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RendererUnavailable(_) | Self::Timeout(_) | Self::PoolLockFailed(_)
        )
    }
}

impl From<RenderError> for RenderServiceError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Options(e) => Self::InvalidOptions(e.to_string()),
            e @ (RenderError::InvalidHtmlSource { .. } | RenderError::InvalidHtmlTree(_)) => {
                Self::InvalidHtml(e.to_string())
            }
            e @ RenderError::ScriptExecution { .. } => Self::ScriptExecution(e.to_string()),
            e @ RenderError::Serialization { .. } => Self::Serialization(e.to_string()),
            e @ (RenderError::Disconnected
            | RenderError::RendererCreation(_)
            | RenderError::HealthCheckFailed(_)) => Self::RendererUnavailable(e.to_string()),
            RenderError::ShuttingDown => Self::PoolShuttingDown,
            e @ RenderError::Timeout(_) => Self::Timeout(e.to_string()),
            RenderError::Configuration(msg) => Self::Internal(msg),
        }
    }
}

/// JSON error body.
///
/// ```json
/// { "error": "HTML content is required", "code": "EMPTY_HTML" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
    /// Machine-readable code, see [`RenderServiceError::error_code`].
    pub code: String,
}

impl From<&RenderServiceError> for ErrorResponse {
    fn from(err: &RenderServiceError) -> Self {
        Self {
            error: err.to_string(),
            code: err.error_code().to_string(),
        }
    }
}

impl From<RenderServiceError> for ErrorResponse {
    fn from(err: RenderServiceError) -> Self {
        Self::from(&err)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ElementSnapshot;
    use crate::options::PropertyContext;

    #[test]
    fn test_request_deserializes_camel_case() {
        let request: RenderHtmlRequest = serde_json::from_str(
            r#"{
                "html": "<x-a></x-a>",
                "scripts": ["./a.js"],
                "cwd": "/srv",
                "containerElId": "root",
                "importMap": "maps/app.importmap",
                "renderElements": ["x-b"],
                "failFast": true
            }"#,
        )
        .unwrap();

        assert_eq!(request.scripts, vec!["./a.js"]);
        assert_eq!(request.container_el_id.as_deref(), Some("root"));
        assert_eq!(
            request.import_map,
            Some(ImportMapSetting::Path("maps/app.importmap".to_string()))
        );
        assert_eq!(request.fail_fast, Some(true));
        assert!(!request.wants_hydration_script());
    }

    #[test]
    fn test_import_map_flag_deserializes() {
        let request: RenderHtmlRequest =
            serde_json::from_str(r#"{ "html": "<p></p>", "importMap": false }"#).unwrap();
        assert_eq!(request.import_map, Some(ImportMapSetting::Enabled(false)));
    }

    #[test]
    fn test_to_render_request() {
        let mut request = RenderHtmlRequest::new("<x-a></x-a>");
        request.cwd = Some("/srv".to_string());
        request.fail_fast = Some(true);
        request.marked_only = Some(true);

        let core = request.to_render_request().unwrap();
        assert_eq!(core.options.cwd, PathBuf::from("/srv"));
        assert_eq!(core.options.failure_policy, FailurePolicy::FailFast);
        assert_eq!(core.options.selection, RenderSelection::MarkedOnly);
    }

    #[test]
    fn test_properties_become_a_hook() {
        let mut request = RenderHtmlRequest::new("<x-a></x-a>");
        request.cwd = Some("/srv".to_string());
        let mut props = Properties::new();
        props.insert("count".to_string(), Value::from(3));
        request.properties = Some(BTreeMap::from([("x-a".to_string(), props.clone())]));

        let core = request.to_render_request().unwrap();
        let hook = core.options.get_element_properties.unwrap();
        let data = Value::Null;
        let context = PropertyContext {
            data: &data,
            ancestor_elements: &[],
            host_element: None,
            previous_sibling_elements: &[],
            next_sibling_elements: &[],
        };
        let element = ElementSnapshot {
            tag_name: "x-a".to_string(),
            attributes: Vec::new(),
        };
        assert_eq!(hook(&element, &context), Some(props));
    }

    #[test]
    fn test_validation_errors() {
        assert_eq!(
            RenderHtmlRequest::new("  ").to_render_request().unwrap_err(),
            RenderServiceError::EmptyHtml
        );

        let mut request = RenderHtmlRequest::new("<p></p>");
        request.cwd = Some("relative/dir".to_string());
        let err = request.to_render_request().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_OPTIONS");
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_render_error_mapping() {
        let err: RenderServiceError = RenderError::ScriptExecution {
            specifier: "./a.js".to_string(),
            message: "boom".to_string(),
        }
        .into();
        assert_eq!(err.error_code(), "SCRIPT_EXECUTION_FAILED");
        assert!(!err.is_retryable());

        let err: RenderServiceError = RenderError::Disconnected.into();
        assert_eq!(err.status_code(), 503);
        assert!(err.is_retryable());

        let response: ErrorResponse = RenderServiceError::Timeout("30s".to_string()).into();
        assert_eq!(response.code, "TIMEOUT");
    }

    #[test]
    fn test_response_from_result() {
        let mut result = RenderResult {
            html: "<p></p>".to_string(),
            ..Default::default()
        };
        result.failures.push(SerializationFailure {
            tag: "x-a".to_string(),
            message: "element has no shadow root".to_string(),
        });

        let response = RenderHtmlResponse::from_result(result, true);
        assert_eq!(response.failures.len(), 1);
        assert!(response.hydration_script.is_some());

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("criticalStyles").is_some());
        assert!(json.get("ast").is_none());
    }
}
