//! RAII handle for pooled renderers.
//!
//! A [`RendererHandle`] derefs to [`Renderer`] and returns it to the pool
//! when dropped, including during unwinding:
//!
//! ```rust,ignore
//! {
//!     let renderer = pool.get()?;
//!     let result = renderer.render(request).await?;
//! } // returned to the pool here
//! ```

use std::sync::Arc;

use crate::pool::RendererPoolInner;
use crate::renderer::Renderer;
use crate::tracked::TrackedRenderer;

/// A renderer checked out of the pool.
///
/// `Send + Sync`; may be held across `.await` points.
pub struct RendererHandle {
    tracked: Option<TrackedRenderer>,
    renderer: Arc<Renderer>,
    pool: Arc<RendererPoolInner>,
}

impl RendererHandle {
    pub(crate) fn new(tracked: TrackedRenderer, pool: Arc<RendererPoolInner>) -> Self {
        Self {
            renderer: Arc::clone(tracked.renderer()),
            tracked: Some(tracked),
            pool,
        }
    }

    /// Pool id of the renderer.
    pub fn id(&self) -> u64 {
        self.tracked.as_ref().map(|t| t.id()).unwrap_or(0)
    }

    /// Time since the renderer was created.
    pub fn age(&self) -> std::time::Duration {
        self.tracked.as_ref().map(|t| t.age()).unwrap_or_default()
    }
}

impl std::ops::Deref for RendererHandle {
    type Target = Renderer;

    fn deref(&self) -> &Self::Target {
        &self.renderer
    }
}

impl Drop for RendererHandle {
    fn drop(&mut self) {
        if let Some(tracked) = self.tracked.take() {
            log::debug!("RendererHandle {} dropped, returning to pool...", tracked.id());
            RendererPoolInner::return_renderer(&self.pool, tracked);
        }
    }
}

impl std::fmt::Debug for RendererHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.tracked {
            Some(tracked) => f
                .debug_struct("RendererHandle")
                .field("id", &tracked.id())
                .field("worker", &self.renderer.name())
                .finish(),
            None => f
                .debug_struct("RendererHandle")
                .field("state", &"returned")
                .finish(),
        }
    }
}
