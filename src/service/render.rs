//! Core render service.
//!
//! Framework-agnostic functions the HTTP integrations call:
//!
//! | Function | Purpose |
//! |----------|---------|
//! | [`render_html`] | Render a fragment on a pooled renderer |
//! | [`get_pool_stats`] | Pool statistics |
//! | [`is_pool_ready`] | Readiness probe |
//!
//! The pool lock is held only to check a renderer out. The render itself
//! runs on the renderer's worker thread while the caller awaits, bounded
//! by the pool's `render_timeout`.

use std::sync::Mutex;
use std::time::Instant;

use crate::handle::RendererHandle;
use crate::pool::RendererPool;
use crate::service::types::{
    PoolStatsResponse, RenderHtmlRequest, RenderHtmlResponse, RenderServiceError,
};

/// Renders `request` on a renderer from `pool`.
///
/// The renderer goes back to the pool when the call returns. If the
/// render exceeds the pool's `render_timeout` it is cancelled and
/// [`RenderServiceError::Timeout`] is returned.
///
/// Checking out a renderer may start a worker thread, which blocks the
/// caller for as long as the worker takes to report ready.
///
/// # Errors
///
/// - [`RenderServiceError::EmptyHtml`] / [`RenderServiceError::InvalidOptions`]
///   before any renderer is used
/// - [`RenderServiceError::PoolLockFailed`] if the pool mutex is poisoned
/// - [`RenderServiceError::RendererUnavailable`] if no renderer can be checked out
/// - any render failure, mapped through `From<RenderError>`
///
/// # Example
///
/// ```rust,ignore
/// use static_shadow_dom::service::{render_html, RenderHtmlRequest};
///
/// let mut request = RenderHtmlRequest::new(r#"<my-card ssr></my-card>"#);
/// request.scripts = vec!["./card.js".to_string()];
/// request.cwd = Some("/srv/app".to_string());
///
/// let response = render_html(&pool, &request).await?;
/// println!("{}", response.html);
/// ```
pub async fn render_html(
    pool: &Mutex<RendererPool>,
    request: &RenderHtmlRequest,
) -> Result<RenderHtmlResponse, RenderServiceError> {
    let render_request = request.to_render_request().inspect_err(|e| {
        log::warn!("Rejected render request: {}", e);
    })?;

    log::debug!(
        "Rendering HTML ({} bytes, {} script(s))",
        request.html.len(),
        request.scripts.len()
    );

    let (renderer, render_timeout) = acquire_renderer(pool)?;
    let start_time = Instant::now();

    let result = match tokio::time::timeout(render_timeout, renderer.render(render_request)).await
    {
        Ok(result) => result?,
        Err(_) => {
            log::error!(
                "❌ Render on renderer {} timed out after {:?}",
                renderer.id(),
                render_timeout
            );
            return Err(RenderServiceError::Timeout(format!(
                "render did not finish within {}s",
                render_timeout.as_secs()
            )));
        }
    };

    if !result.is_complete() {
        log::warn!(
            "⚠️ {} element(s) could not be serialized",
            result.failures.len()
        );
    }
    log::info!(
        "✅ Rendered HTML on renderer {} in {:?} ({} bytes input → {} bytes output)",
        renderer.id(),
        start_time.elapsed(),
        request.html.len(),
        result.html.len()
    );

    Ok(RenderHtmlResponse::from_result(
        result,
        request.wants_hydration_script(),
    ))
}

/// Current pool statistics.
///
/// # Errors
///
/// [`RenderServiceError::PoolLockFailed`] if the pool mutex is poisoned.
pub fn get_pool_stats(pool: &Mutex<RendererPool>) -> Result<PoolStatsResponse, RenderServiceError> {
    let pool_guard = pool.lock().map_err(|e| {
        log::error!("Failed to lock renderer pool for stats: {}", e);
        RenderServiceError::PoolLockFailed(e.to_string())
    })?;

    let stats = pool_guard.stats();

    Ok(PoolStatsResponse {
        available: stats.available,
        active: stats.active,
        total: stats.total,
        created: stats.created,
    })
}

/// Whether the pool can take a request right now.
///
/// Ready when a renderer is idle or there is room to create one, and the
/// pool is not shutting down.
pub fn is_pool_ready(pool: &Mutex<RendererPool>) -> Result<bool, RenderServiceError> {
    let pool_guard = pool.lock().map_err(|e| {
        log::error!("Failed to lock renderer pool for readiness check: {}", e);
        RenderServiceError::PoolLockFailed(e.to_string())
    })?;

    if pool_guard.is_shutting_down() {
        return Ok(false);
    }

    let stats = pool_guard.stats();
    let max_pool_size = pool_guard.config().max_pool_size;
    let is_ready = stats.available > 0 || stats.active < max_pool_size;

    log::trace!(
        "Pool readiness check: available={}, active={}, max={}, ready={}",
        stats.available,
        stats.active,
        max_pool_size,
        is_ready
    );

    Ok(is_ready)
}

/// Checks a renderer out, releasing the pool lock before returning.
fn acquire_renderer(
    pool: &Mutex<RendererPool>,
) -> Result<(RendererHandle, std::time::Duration), RenderServiceError> {
    let pool_guard = pool.lock().map_err(|e| {
        log::error!("❌ Failed to lock renderer pool: {}", e);
        RenderServiceError::PoolLockFailed(e.to_string())
    })?;

    let render_timeout = pool_guard.config().render_timeout;
    let renderer = pool_guard.get().map_err(|e| {
        log::error!("❌ Failed to get renderer from pool: {}", e);
        RenderServiceError::from(e)
    })?;

    log::debug!("Acquired renderer {} from pool", renderer.id());
    Ok((renderer, render_timeout))
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::component::{Component, ElementDefinition, Template};
    use crate::config::RendererPoolConfigBuilder;
    use crate::dom::ElementSnapshot;
    use crate::factory::mock::MockRendererFactory;
    use crate::modules::{ModuleRegistry, component_module};

    struct Counter;

    impl Component for Counter {
        fn render(&self, host: &ElementSnapshot) -> Template {
            Template::new()
                .html("<span>")
                .text(host.attribute("count").unwrap_or("0"))
                .html("</span>")
        }
    }

    fn pool(factory: MockRendererFactory) -> Mutex<RendererPool> {
        let config = RendererPoolConfigBuilder::new()
            .max_pool_size(2)
            .warmup_count(0)
            .render_timeout(Duration::from_secs(10))
            .build()
            .unwrap();
        let pool = RendererPool::builder()
            .config(config)
            .factory(Box::new(factory))
            .enable_keep_alive(false)
            .build()
            .unwrap();
        Mutex::new(pool)
    }

    fn counter_factory() -> MockRendererFactory {
        MockRendererFactory::with_modules(Arc::new(ModuleRegistry::new().with_module(
            "/srv/counter.js",
            component_module(|scope| {
                scope.define(
                    ElementDefinition::new("x-counter", || Counter)
                        .critical_style(":host { display: inline-block; }"),
                )
            }),
        )))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_render_html_through_pool() {
        let pool = pool(counter_factory());

        let mut request = RenderHtmlRequest::new(r#"<x-counter count="7"></x-counter>"#);
        request.scripts = vec!["./counter.js".to_string()];
        request.cwd = Some("/srv".to_string());
        request.hydration_script = Some(true);

        let response = render_html(&pool, &request).await.unwrap();
        assert_eq!(
            response.html,
            r#"<x-counter count="7"><template shadowrootmode="open"><span>7</span></template></x-counter>"#
        );
        assert!(response.critical_styles.contains_key("x-counter"));
        assert!(response.failures.is_empty());
        assert!(response.hydration_script.is_some());

        let stats = get_pool_stats(&pool).unwrap();
        assert_eq!(stats.active, 1);
        assert_eq!(stats.available, 1);
        assert_eq!(stats.created, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_request_does_not_touch_pool() {
        let factory = MockRendererFactory::new();
        let counter = factory.counter();
        let pool = pool(factory);

        let err = render_html(&pool, &RenderHtmlRequest::new("")).await.unwrap_err();
        assert_eq!(err, RenderServiceError::EmptyHtml);
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_script_failure_is_reported() {
        let pool = pool(MockRendererFactory::new());

        let mut request = RenderHtmlRequest::new("<x-missing></x-missing>");
        request.scripts = vec!["./missing.js".to_string()];
        request.cwd = Some("/srv".to_string());

        let err = render_html(&pool, &request).await.unwrap_err();
        assert_eq!(err.error_code(), "SCRIPT_EXECUTION_FAILED");
        assert_eq!(err.status_code(), 422);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_factory_failure_is_unavailable() {
        let pool = pool(MockRendererFactory::always_fails("no workers"));

        let mut request = RenderHtmlRequest::new("<p>hi</p>");
        request.cwd = Some("/srv".to_string());

        let err = render_html(&pool, &request).await.unwrap_err();
        assert!(matches!(err, RenderServiceError::RendererUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pool_readiness() {
        let pool = pool(MockRendererFactory::new());
        assert!(is_pool_ready(&pool).unwrap());

        pool.lock().unwrap().shutdown();
        assert!(!is_pool_ready(&pool).unwrap());
    }
}
