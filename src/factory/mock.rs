//! Mock factory for testing.
//!
//! Available with the `test-utils` feature. [`MockRendererFactory`] counts
//! creations and can be configured to fail, which exercises the pool's
//! error paths. Successful creations start real (empty) renderer workers:
//! they are cheap and need no external process.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::RendererFactory;
use crate::error::{RenderError, Result};
use crate::modules::ModuleRegistry;
use crate::renderer::Renderer;

/// Factory with configurable failures.
///
/// # Example
///
/// ```rust,ignore
/// use static_shadow_dom::factory::mock::MockRendererFactory;
///
/// let factory = MockRendererFactory::fail_after_n(2, "worker limit");
/// assert!(factory.create().is_ok());
/// assert!(factory.create().is_ok());
/// assert!(factory.create().is_err());
/// ```
pub struct MockRendererFactory {
    modules: Arc<ModuleRegistry>,
    should_fail: bool,
    error_message: String,
    creation_count: Arc<AtomicUsize>,
    fail_after: Option<usize>,
}

impl MockRendererFactory {
    /// A factory that always succeeds, with an empty module registry.
    pub fn new() -> Self {
        Self::with_modules(Arc::new(ModuleRegistry::new()))
    }

    /// A factory that always succeeds, loading from `modules`.
    pub fn with_modules(modules: Arc<ModuleRegistry>) -> Self {
        Self {
            modules,
            should_fail: false,
            error_message: String::new(),
            creation_count: Arc::new(AtomicUsize::new(0)),
            fail_after: None,
        }
    }

    /// A factory whose every creation fails with `message`.
    pub fn always_fails<S: Into<String>>(message: S) -> Self {
        Self {
            should_fail: true,
            error_message: message.into(),
            ..Self::new()
        }
    }

    /// A factory that succeeds `n` times, then fails with `message`.
    pub fn fail_after_n<S: Into<String>>(n: usize, message: S) -> Self {
        Self {
            error_message: message.into(),
            fail_after: Some(n),
            ..Self::new()
        }
    }

    /// Number of `create()` calls, successful or not.
    pub fn creation_count(&self) -> usize {
        self.creation_count.load(Ordering::SeqCst)
    }

    /// Shared creation counter, readable after the factory moved into a pool.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.creation_count)
    }
}

impl Default for MockRendererFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RendererFactory for MockRendererFactory {
    fn create(&self) -> Result<Renderer> {
        let count = self.creation_count.fetch_add(1, Ordering::SeqCst);

        if self.should_fail {
            log::debug!("MockRendererFactory: Returning configured failure");
            return Err(RenderError::RendererCreation(self.error_message.clone()));
        }

        if let Some(fail_after) = self.fail_after {
            if count >= fail_after {
                log::debug!("MockRendererFactory: Failing after {} creations", fail_after);
                return Err(RenderError::RendererCreation(self.error_message.clone()));
            }
        }

        log::debug!("MockRendererFactory: Starting renderer #{}", count + 1);
        Renderer::spawn(Arc::clone(&self.modules))
    }
}

impl std::fmt::Debug for MockRendererFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRendererFactory")
            .field("should_fail", &self.should_fail)
            .field("error_message", &self.error_message)
            .field("creation_count", &self.creation_count())
            .field("fail_after", &self.fail_after)
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
