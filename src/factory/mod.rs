//! Renderer factories.
//!
//! - [`WorkerRendererFactory`] starts renderer worker threads over a shared
//!   module registry.
//! - [`mock::MockRendererFactory`] (feature `test-utils`) injects creation
//!   failures for tests.

mod worker;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use worker::WorkerRendererFactory;

use crate::error::Result;
use crate::renderer::Renderer;

/// Creates renderers for the pool.
///
/// Implementations must be `Send + Sync`: the pool calls them from warmup,
/// request handlers and replacement tasks.
pub trait RendererFactory: Send + Sync {
    /// Creates a ready renderer.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::RendererCreation`](crate::RenderError::RendererCreation)
    /// if the worker cannot be started.
    fn create(&self) -> Result<Renderer>;
}
