//! Factory for renderer worker threads.

use std::sync::Arc;

use super::RendererFactory;
use crate::error::Result;
use crate::modules::ModuleRegistry;
use crate::renderer::Renderer;

/// Starts one [`Renderer`] thread per call, all sharing the same modules.
///
/// # Example
///
/// ```rust,ignore
/// use static_shadow_dom::{ModuleRegistry, WorkerRendererFactory};
///
/// let factory = WorkerRendererFactory::new(Arc::new(ModuleRegistry::new()));
/// ```
#[derive(Clone)]
pub struct WorkerRendererFactory {
    modules: Arc<ModuleRegistry>,
}

impl WorkerRendererFactory {
    /// Creates a factory over `modules`.
    pub fn new(modules: Arc<ModuleRegistry>) -> Self {
        log::debug!(
            "Creating WorkerRendererFactory with {} module(s)",
            modules.len()
        );
        Self { modules }
    }

    /// The module registry renderers load from.
    pub fn modules(&self) -> &Arc<ModuleRegistry> {
        &self.modules
    }
}

impl RendererFactory for WorkerRendererFactory {
    fn create(&self) -> Result<Renderer> {
        log::debug!("Starting renderer worker...");
        Renderer::spawn(Arc::clone(&self.modules))
    }
}

impl std::fmt::Debug for WorkerRendererFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRendererFactory")
            .field("modules", &self.modules.len())
            .finish()
    }
}
