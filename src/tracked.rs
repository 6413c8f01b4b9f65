//! Renderer with pool metadata.
//!
//! [`TrackedRenderer`] wraps a [`Renderer`] with a unique id, its creation
//! time (for TTL enforcement) and the time of its last successful ping.
//! It is cheap to clone: the renderer sits behind an `Arc`, so the pool's
//! `available` list and `active` map can share one worker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::{RenderError, Result};
use crate::renderer::Renderer;
use crate::traits::Healthcheck;

/// Time a fresh renderer has to answer its validation ping.
const VALIDATION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub(crate) struct TrackedRenderer {
    id: u64,
    renderer: Arc<Renderer>,
    ping_timeout: Duration,
    last_ping: Arc<Mutex<Instant>>,
    created_at: Instant,
}

impl TrackedRenderer {
    /// Wraps `renderer` after checking that its worker answers.
    pub(crate) fn new(renderer: Renderer, ping_timeout: Duration) -> Result<Self> {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);

        log::debug!("Validating renderer {}...", renderer.name());
        renderer.ping(VALIDATION_TIMEOUT).map_err(|e| {
            log::error!("❌ Renderer validation failed: {}", e);
            RenderError::RendererCreation(e.to_string())
        })?;
        log::debug!("✅ Renderer validation passed");

        Ok(TrackedRenderer {
            id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
            renderer: Arc::new(renderer),
            ping_timeout,
            last_ping: Arc::new(Mutex::new(Instant::now())),
            created_at: Instant::now(),
        })
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub(crate) fn renderer(&self) -> &Arc<Renderer> {
        &self.renderer
    }

    /// Strictly older than `ttl`.
    #[inline]
    pub(crate) fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }

    #[inline]
    pub(crate) fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    #[inline]
    pub(crate) fn age_minutes(&self) -> u64 {
        self.created_at.elapsed().as_secs() / 60
    }

    pub(crate) fn last_ping_time(&self) -> Option<Instant> {
        self.last_ping.lock().ok().map(|guard| *guard)
    }
}

impl Healthcheck for TrackedRenderer {
    fn ping(&self) -> Result<()> {
        log::trace!("Pinging renderer {}...", self.id);

        self.renderer.ping(self.ping_timeout).map_err(|e| {
            log::error!("❌ Renderer {} ping failed: {}", self.id, e);
            RenderError::HealthCheckFailed(e.to_string())
        })?;

        match self.last_ping.lock() {
            Ok(mut ping) => {
                *ping = Instant::now();
                log::trace!("✅ Renderer {} ping successful", self.id);
            }
            Err(e) => log::warn!(
                "⚠️ Renderer {} ping succeeded but failed to update timestamp: {}",
                self.id,
                e
            ),
        }
        Ok(())
    }
}

impl std::fmt::Debug for TrackedRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedRenderer")
            .field("id", &self.id)
            .field("worker", &self.renderer.name())
            .field("age_minutes", &self.age_minutes())
            .field("since_last_ping", &self.last_ping_time().map(|at| at.elapsed()))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::ModuleRegistry;

    fn tracked() -> TrackedRenderer {
        let renderer = Renderer::spawn(Arc::new(ModuleRegistry::new())).unwrap();
        TrackedRenderer::new(renderer, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_ids_are_unique() {
        let a = tracked();
        let b = tracked();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn test_expiry() {
        let renderer = tracked();
        assert!(!renderer.is_expired(Duration::from_secs(3600)));
        assert!(renderer.age() < Duration::from_secs(60));
        assert_eq!(renderer.age_minutes(), 0);

        std::thread::sleep(Duration::from_millis(5));
        assert!(renderer.is_expired(Duration::from_millis(1)));
    }

    #[test]
    fn test_ping_updates_timestamp() {
        let renderer = tracked();
        let before = renderer.last_ping_time().unwrap();
        std::thread::sleep(Duration::from_millis(5));
        renderer.ping().unwrap();
        assert!(renderer.last_ping_time().unwrap() > before);
    }

    #[test]
    fn test_ping_fails_after_disconnect() {
        let renderer = tracked();
        renderer.renderer().disconnect();
        assert!(matches!(
            renderer.ping(),
            Err(RenderError::HealthCheckFailed(_))
        ));
    }
}
