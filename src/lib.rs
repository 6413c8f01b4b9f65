//! # static-shadow-dom
//!
//! Server-side rendering of web components into declarative shadow DOM.
//!
//! Given an HTML fragment and the component modules that define the custom
//! elements it uses, the crate runs those components inside an isolated
//! document environment, waits for each to finish rendering, and writes
//! their shadow trees back into the HTML as
//! `<template shadowrootmode="open">` markup. Critical CSS for every rendered
//! element type is collected along the way.
//!
//! ## Features
//!
//! - **Isolated environments**: an arena document, a custom element registry
//!   and a cooperative event loop per environment
//! - **Post-order serialization**: nested shadow trees are wrapped before
//!   their hosts
//! - **Critical CSS**: fallback styles are stripped and each type's critical
//!   styles are formatted once per request
//! - **Renderer pool**: worker threads with warmup, health checks, TTL
//!   retirement and graceful shutdown
//! - **Web Framework Integration**: optional axum routes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │         Your Web Application (axum)         │
//! └─────────────────┬───────────────────────────┘
//!                   │ service::render_html
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │              RendererPool                   │
//! │   [Renderer1] [Renderer2] [Renderer3]       │
//! │   keep-alive thread (ping + TTL)            │
//! └─────────────────┬───────────────────────────┘
//!                   │ one thread per renderer
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │               Environment                   │
//! │ ingest → bootstrap → definitions barrier    │
//! │ → inject HTML → connection observer         │
//! │ → serializer + critical CSS → result        │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use static_shadow_dom::prelude::*;
//!
//! struct Greeting;
//!
//! impl Component for Greeting {
//!     fn render(&self, host: &ElementSnapshot) -> Template {
//!         Template::new()
//!             .html("<p>Hello, ")
//!             .text(host.attribute("name").unwrap_or("world"))
//!             .html("</p>")
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let modules = ModuleRegistry::new().with_module(
//!         "/srv/app/greeting.js",
//!         component_module(|scope| scope.define(ElementDefinition::new("x-greeting", || Greeting))),
//!     );
//!
//!     let renderer = Renderer::spawn(Arc::new(modules))?;
//!     let options = RenderOptions::builder().cwd("/srv/app").build()?;
//!     let result = renderer
//!         .render(RenderRequest::new(
//!             r#"<x-greeting name="Ada"></x-greeting>"#,
//!             ["./greeting.js"],
//!             options,
//!         ))
//!         .await?;
//!
//!     println!("{}", result.html);
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Configuration
//!
//! With the `env-config` feature, [`init_renderer_pool`] builds and warms a
//! pool from `app.env` or the process environment:
//!
//! | Variable | Type | Default | Description |
//! |----------|------|---------|-------------|
//! | `RENDERER_POOL_SIZE` | usize | 4 | Maximum renderers |
//! | `RENDERER_WARMUP_COUNT` | usize | 2 | Renderers created at startup |
//! | `RENDERER_TTL_SECONDS` | u64 | 3600 | Renderer lifetime |
//! | `RENDERER_WARMUP_TIMEOUT_SECONDS` | u64 | 60 | Warmup timeout |
//! | `RENDERER_WARMUP_STAGGER_SECONDS` | u64 | 30 | Delay between warmup creations |
//! | `RENDERER_PING_INTERVAL_SECONDS` | u64 | 15 | Health check interval |
//! | `RENDERER_PING_TIMEOUT_SECONDS` | u64 | 5 | Health check timeout |
//! | `RENDERER_MAX_PING_FAILURES` | u32 | 3 | Failures before removal |
//! | `RENDERER_RENDER_TIMEOUT_SECONDS` | u64 | 30 | Per-request render timeout |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `env-config` | Environment-based pool configuration |
//! | `axum-integration` | Axum routes |
//! | `test-utils` | Mock renderer factory |
//!
//! ## Error Handling
//!
//! ```rust,ignore
//! match renderer.render(request).await {
//!     Ok(result) if result.is_complete() => { /* every element rendered */ }
//!     Ok(result) => log::warn!("{} element(s) failed", result.failures.len()),
//!     Err(RenderError::ScriptExecution { specifier, message }) => {
//!         eprintln!("{} failed: {}", specifier, message)
//!     }
//!     Err(e) => eprintln!("render failed: {}", e),
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// Modules
// ============================================================================

pub mod barrier;
pub mod component;
pub mod config;
pub mod context;
pub mod critical_css;
pub mod dom;
pub mod environment;
pub mod error;
pub mod factory;
pub mod format;
pub mod handle;
pub mod ingest;
pub mod modules;
pub mod options;
pub mod pool;
pub mod prelude;
pub mod registry;
pub mod renderer;
pub mod result;
pub mod selector;
pub mod serializer;
pub mod service;
pub mod stats;
pub mod traits;
pub mod tree;

// Internal modules
pub(crate) mod bootstrap;
pub(crate) mod observer;
pub(crate) mod realm;
pub(crate) mod tracked;

// ============================================================================
// Feature-gated modules
// ============================================================================

/// Web framework integrations.
#[cfg(feature = "axum-integration")]
pub mod integrations;

// ============================================================================
// Re-exports (Public API)
// ============================================================================

pub use component::{Component, ComponentError, ElementDefinition, Template};
pub use config::{RendererPoolConfig, RendererPoolConfigBuilder};
pub use context::RenderRequest;
pub use dom::{ElementSnapshot, ShadowRootMode};
pub use environment::Environment;
pub use error::{OptionsError, RenderError, Result};
pub use factory::{RendererFactory, WorkerRendererFactory};
pub use handle::RendererHandle;
pub use ingest::HtmlSource;
pub use modules::{ComponentModule, ImportMap, ModuleRegistry, component_module};
pub use options::{
    ElementPropertiesHook, FailurePolicy, ImportMapOption, Properties, PropertyContext,
    RenderOptions, RenderOptionsBuilder, RenderReadyHook, RenderSelection,
};
pub use pool::{RendererPool, RendererPoolBuilder};
pub use renderer::Renderer;
pub use result::RenderResult;
pub use serializer::SerializationFailure;
pub use stats::PoolStats;
pub use traits::Healthcheck;

#[cfg(feature = "env-config")]
pub use config::env::from_env;

#[cfg(feature = "env-config")]
pub use pool::init_renderer_pool;

// ============================================================================
// Convenience type aliases
// ============================================================================

/// Shared renderer pool for web handlers.
///
/// ```rust,ignore
/// let pool: SharedRendererPool = renderer_pool.into_shared();
/// ```
pub type SharedRendererPool = std::sync::Arc<std::sync::Mutex<RendererPool>>;
