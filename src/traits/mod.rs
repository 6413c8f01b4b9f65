//! Traits at the pool's seams.
//!
//! - [`Healthcheck`] for keep-alive monitoring

mod healthcheck;

pub use healthcheck::Healthcheck;
