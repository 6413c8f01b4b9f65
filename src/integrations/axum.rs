//! Axum framework integration.
//!
//! Pre-built handlers over [`crate::service`], plus [`render_router`] to
//! mount them all.
//!
//! # Routes
//!
//! | Method | Path | Handler | Description |
//! |--------|------|---------|-------------|
//! | POST | `/render` | [`render`] | Render an HTML fragment |
//! | GET | `/pool/stats` | [`pool_stats`] | Pool statistics |
//! | GET | `/health` | [`health_check`] | Liveness |
//! | GET | `/ready` | [`readiness_check`] | Readiness |
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use static_shadow_dom::integrations::axum::render_router;
//! use static_shadow_dom::prelude::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     let modules = Arc::new(my_components::registry());
//!     let pool = init_renderer_pool(modules).await.expect("Failed to initialize pool");
//!
//!     let app = render_router(pool);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```
//!
//! # Graceful Shutdown
//!
//! ```rust,ignore
//! let shutdown_pool = Arc::clone(&pool);
//! axum::serve(listener, render_router(pool))
//!     .with_graceful_shutdown(async move {
//!         tokio::signal::ctrl_c().await.ok();
//!         if let Ok(mut pool) = shutdown_pool.lock() {
//!             pool.shutdown();
//!         }
//!     })
//!     .await?;
//! ```

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::SharedRendererPool;
use crate::pool::RendererPool;
use crate::service::{self, ErrorResponse, HealthResponse, RenderHtmlRequest, RenderServiceError};

/// `State` extractor carrying the shared pool.
pub type RendererPoolState = State<SharedRendererPool>;

/// Axum helpers on [`RendererPool`].
pub trait RendererPoolAxumExt {
    /// Converts the pool into router state.
    fn into_axum_state(self) -> SharedRendererPool;
}

impl RendererPoolAxumExt for RendererPool {
    fn into_axum_state(self) -> SharedRendererPool {
        self.into_shared()
    }
}

/// Router with every pre-built route, bound to `pool`.
pub fn render_router(pool: SharedRendererPool) -> Router {
    Router::new()
        .route("/render", post(render))
        .route("/pool/stats", get(pool_stats))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .with_state(pool)
}

/// `POST /render`: renders the JSON request body.
pub async fn render(
    State(pool): RendererPoolState,
    Json(request): Json<RenderHtmlRequest>,
) -> Response {
    log::debug!("Render request: {} bytes", request.html.len());

    match service::render_html(&pool, &request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => build_error_response(e),
    }
}

/// `GET /pool/stats`.
pub async fn pool_stats(State(pool): RendererPoolState) -> Response {
    match service::get_pool_stats(&pool) {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => build_error_response(e),
    }
}

/// `GET /health`: always `200` while the process serves requests.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// `GET /ready`: `200` when the pool can take a request, `503` otherwise.
pub async fn readiness_check(State(pool): RendererPoolState) -> Response {
    match service::is_pool_ready(&pool) {
        Ok(true) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ready" })),
        )
            .into_response(),
        Ok(false) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "reason": "no_available_capacity"
            })),
        )
            .into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorResponse::from(e))).into_response(),
    }
}

fn build_error_response(error: RenderServiceError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    log::warn!("Render error: {} (HTTP {})", error, status.as_u16());
    (status, Json(ErrorResponse::from(&error))).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::RendererPoolConfigBuilder;
    use crate::factory::mock::MockRendererFactory;

    fn shared_pool() -> SharedRendererPool {
        let config = RendererPoolConfigBuilder::new()
            .max_pool_size(1)
            .warmup_count(0)
            .render_timeout(Duration::from_secs(10))
            .build()
            .unwrap();
        RendererPool::builder()
            .config(config)
            .factory(Box::new(MockRendererFactory::new()))
            .enable_keep_alive(false)
            .build()
            .unwrap()
            .into_axum_state()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_render_handler() {
        let pool = shared_pool();
        let mut request = RenderHtmlRequest::new("<div>plain</div>");
        request.cwd = Some("/srv".to_string());

        let response = render(State(Arc::clone(&pool)), Json(request)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_render_handler_maps_errors() {
        let pool = shared_pool();
        let response = render(State(pool), Json(RenderHtmlRequest::new(" "))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_readiness_and_stats() {
        let pool = shared_pool();
        assert_eq!(
            readiness_check(State(Arc::clone(&pool))).await.status(),
            StatusCode::OK
        );
        assert_eq!(pool_stats(State(Arc::clone(&pool))).await.status(), StatusCode::OK);

        pool.lock().unwrap().shutdown();
        assert_eq!(
            readiness_check(State(pool)).await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_health() {
        assert_eq!(health_check().await.0.status, "healthy");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_router_builds() {
        let _router: Router = render_router(shared_pool());
    }
}
