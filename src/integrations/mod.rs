//! Web framework integrations.
//!
//! | Framework | Feature Flag | Module |
//! |-----------|--------------|--------|
//! | Axum | `axum-integration` | `axum` |
//!
//! # Enabling
//!
//! ```toml
//! [dependencies]
//! static-shadow-dom = { version = "0.1", features = ["axum-integration"] }
//! ```
//!
//! # Common Pattern
//!
//! 1. Register the component modules in a `ModuleRegistry`
//! 2. Build and warm up a `RendererPool` (or call `init_renderer_pool`)
//! 3. Convert it to shared state with `into_shared()`
//! 4. Mount the routes, which call into [`crate::service`]

#[cfg(feature = "axum-integration")]
pub mod axum;
