//! Render service module.
//!
//! The **framework-agnostic core** of the HTTP service: request and
//! response types, error mapping, and the functions every integration
//! calls.
//!
//! # Module Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                    service module (this module)                   │
//! │                                                                   │
//! │  ┌──────────────────────────┐  ┌───────────────────────────────┐  │
//! │  │        types.rs          │  │          render.rs            │  │
//! │  │  RenderHtmlRequest       │  │  render_html()                │  │
//! │  │  RenderHtmlResponse      │  │  get_pool_stats()             │  │
//! │  │  RenderServiceError      │  │  is_pool_ready()              │  │
//! │  │  ErrorResponse           │  │                               │  │
//! │  │  PoolStatsResponse       │  │                               │  │
//! │  │  HealthResponse          │  │                               │  │
//! │  └──────────────────────────┘  └───────────────────────────────┘  │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   │ used by
//!                                   ▼
//!                     integrations::axum (handlers)
//! ```
//!
//! # Design
//!
//! "Thin handler, thick service":
//!
//! | Layer | Responsibility | This Module? |
//! |-------|----------------|--------------|
//! | **Service** | Validation, renderer checkout, rendering | ✅ Yes |
//! | **Handler** | HTTP request/response mapping | ❌ No (integrations) |
//!
//! # Usage Without HTTP
//!
//! ```rust,ignore
//! use static_shadow_dom::service::{render_html, RenderHtmlRequest, RenderServiceError};
//!
//! async fn prerender(pool: &Mutex<RendererPool>, pages: Vec<String>) -> Vec<Result<String, RenderServiceError>> {
//!     let mut out = Vec::new();
//!     for html in pages {
//!         let mut request = RenderHtmlRequest::new(html);
//!         request.scripts = vec!["./components/index.js".to_string()];
//!         request.cwd = Some("/srv/site".to_string());
//!         out.push(render_html(pool, &request).await.map(|r| r.html));
//!     }
//!     out
//! }
//! ```
//!
//! # Error Handling
//!
//! ```rust,ignore
//! fn handle_error(error: RenderServiceError) -> (u16, ErrorResponse) {
//!     (error.status_code(), ErrorResponse::from(&error))
//! }
//! ```

mod render;
mod types;

// ============================================================================
// Re-exports: Types
// ============================================================================

pub use types::ErrorResponse;
pub use types::FailureResponse;
pub use types::HealthResponse;
pub use types::ImportMapSetting;
pub use types::PoolStatsResponse;
pub use types::RenderHtmlRequest;
pub use types::RenderHtmlResponse;
pub use types::RenderServiceError;

// ============================================================================
// Re-exports: Functions
// ============================================================================

pub use render::get_pool_stats;
pub use render::is_pool_ready;
pub use render::render_html;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_to_response_conversion() {
        let error = RenderServiceError::InvalidHtml("stray </div>".to_string());
        let response: ErrorResponse = error.into();

        assert_eq!(response.code, "INVALID_HTML");
        assert!(response.error.contains("Invalid HTML"));
    }

    #[test]
    fn test_health_response_default() {
        let health = HealthResponse::default();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.service, "static-shadow-dom");
    }
}
