//! Convenient imports for common usage patterns.
//!
//! ```rust,ignore
//! use static_shadow_dom::prelude::*;
//! ```
//!
//! Brings in the component authoring types ([`Component`], [`Template`],
//! [`ElementDefinition`], [`ModuleRegistry`], [`component_module`]), the
//! request types ([`RenderRequest`], [`RenderOptions`], [`RenderResult`]),
//! the renderer and pool types, and `Arc`/`Mutex`.
//!
//! # Example
//!
//! ```rust,ignore
//! use static_shadow_dom::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RendererPoolConfigBuilder::new()
//!         .max_pool_size(4)
//!         .warmup_count(2)
//!         .build()?;
//!
//!     let pool = RendererPool::builder()
//!         .config(config)
//!         .factory(Box::new(WorkerRendererFactory::new(Arc::new(my_modules()))))
//!         .build()?;
//!
//!     pool.warmup().await?;
//!
//!     let renderer = pool.get()?;
//!     let result = renderer.render(request).await?;
//!     Ok(())
//! }
//! ```

// Component authoring
pub use crate::component::{Component, ComponentError, ElementDefinition, Template};
pub use crate::dom::ElementSnapshot;
pub use crate::modules::{ModuleRegistry, component_module};

// Rendering
pub use crate::context::RenderRequest;
pub use crate::environment::Environment;
pub use crate::error::{RenderError, Result};
pub use crate::options::{FailurePolicy, RenderOptions, RenderSelection};
pub use crate::renderer::Renderer;
pub use crate::result::RenderResult;

// Pool
pub use crate::SharedRendererPool;
pub use crate::config::{RendererPoolConfig, RendererPoolConfigBuilder};
pub use crate::factory::{RendererFactory, WorkerRendererFactory};
pub use crate::handle::RendererHandle;
pub use crate::pool::{RendererPool, RendererPoolBuilder};
pub use crate::stats::PoolStats;
pub use crate::traits::Healthcheck;

#[cfg(feature = "env-config")]
pub use crate::config::env::from_env;

#[cfg(feature = "env-config")]
pub use crate::pool::init_renderer_pool;

// Re-export Arc and Mutex for convenience (commonly needed with SharedRendererPool)
pub use std::sync::{Arc, Mutex};
