//! Health check trait for renderers.
//!
//! The pool's keep-alive thread pings every active renderer at a regular
//! interval. A renderer that fails too many consecutive checks is removed
//! from the pool and replaced.
//!
//! The pooled renderer implements this by sending a `Ping` command to its
//! worker thread and waiting for the answer, which proves the thread is
//! alive and its event loop is not stuck.

use crate::error::Result;

/// Objects that can report whether they still work.
///
/// `Send + Sync`: checks run on the keep-alive thread while the object may
/// be in use elsewhere.
///
/// ```text
/// Keep-Alive Thread
///       │
///       ├── ping() ──→ Renderer 1 ──→ ✓ OK
///       │
///       ├── ping() ──→ Renderer 2 ──→ ✗ Failed (count: 1)
///       │
///       └── ping() ──→ Renderer 3 ──→ ✓ OK
/// ```
///
/// After [`max_ping_failures`](crate::RendererPoolConfig::max_ping_failures)
/// consecutive failures the renderer is removed and replaced.
pub trait Healthcheck: Send + Sync {
    /// Performs a health check.
    ///
    /// Keep it fast and do not hold pool locks while waiting.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::HealthCheckFailed`](crate::RenderError::HealthCheckFailed)
    /// if the object is unresponsive.
    fn ping(&self) -> Result<()>;
}
