//! Configuration for the renderer pool.
//!
//! Use [`RendererPoolConfigBuilder`] to create a validated configuration, or
//! load one from the environment with the `env-config` feature.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use static_shadow_dom::RendererPoolConfigBuilder;
//!
//! let config = RendererPoolConfigBuilder::new()
//!     .max_pool_size(4)
//!     .warmup_count(2)
//!     .renderer_ttl(Duration::from_secs(1800))
//!     .render_timeout(Duration::from_secs(10))
//!     .build()
//!     .expect("valid configuration");
//!
//! assert_eq!(config.max_pool_size, 4);
//! ```

use std::time::Duration;

/// Renderer pool configuration.
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `max_pool_size` | 4 | Maximum idle renderers kept in the pool |
/// | `warmup_count` | 2 | Renderers created by [`warmup`](crate::RendererPool::warmup) |
/// | `ping_interval` | 15s | Keep-alive check interval |
/// | `ping_timeout` | 5s | How long a renderer may take to answer a ping |
/// | `renderer_ttl` | 1h | Lifetime before a renderer is retired |
/// | `max_ping_failures` | 3 | Consecutive failed pings before removal |
/// | `warmup_timeout` | 60s | Upper bound for the whole warmup |
/// | `warmup_stagger` | 30s | Delay between warmup creations, so TTLs do not expire together |
/// | `render_timeout` | 30s | Upper bound for one render through the service |
#[derive(Debug, Clone)]
pub struct RendererPoolConfig {
    /// Maximum number of idle renderers in the pool.
    ///
    /// Renderers returned to a full pool are stopped.
    pub max_pool_size: usize,

    /// Number of renderers created during warmup. Must not exceed
    /// `max_pool_size`.
    pub warmup_count: usize,

    /// Interval between keep-alive checks.
    pub ping_interval: Duration,

    /// Time a renderer has to answer one ping.
    pub ping_timeout: Duration,

    /// Time-to-live of a renderer. Expired renderers are retired and
    /// replaced.
    pub renderer_ttl: Duration,

    /// Consecutive ping failures before a renderer is removed.
    pub max_ping_failures: u32,

    /// Timeout for the whole warmup.
    pub warmup_timeout: Duration,

    /// Delay between two renderers created during warmup.
    pub warmup_stagger: Duration,

    /// Timeout for one render through the service layer.
    pub render_timeout: Duration,
}

impl Default for RendererPoolConfig {
    fn default() -> Self {
        Self {
            max_pool_size: 4,
            warmup_count: 2,
            ping_interval: Duration::from_secs(15),
            ping_timeout: Duration::from_secs(5),
            renderer_ttl: Duration::from_secs(3600),
            max_ping_failures: 3,
            warmup_timeout: Duration::from_secs(60),
            warmup_stagger: Duration::from_secs(30),
            render_timeout: Duration::from_secs(30),
        }
    }
}

/// Builder for [`RendererPoolConfig`] with validation.
pub struct RendererPoolConfigBuilder {
    config: RendererPoolConfig,
}

impl RendererPoolConfigBuilder {
    /// Starts from [`RendererPoolConfig::default`].
    pub fn new() -> Self {
        Self {
            config: RendererPoolConfig::default(),
        }
    }

    /// Sets the maximum pool size (must be > 0).
    pub fn max_pool_size(mut self, size: usize) -> Self {
        self.config.max_pool_size = size;
        self
    }

    /// Sets the warmup count (must be ≤ max_pool_size).
    pub fn warmup_count(mut self, count: usize) -> Self {
        self.config.warmup_count = count;
        self
    }

    /// Sets the keep-alive interval.
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.config.ping_interval = interval;
        self
    }

    /// Sets the ping timeout.
    pub fn ping_timeout(mut self, timeout: Duration) -> Self {
        self.config.ping_timeout = timeout;
        self
    }

    /// Sets the renderer time-to-live.
    pub fn renderer_ttl(mut self, ttl: Duration) -> Self {
        self.config.renderer_ttl = ttl;
        self
    }

    /// Sets the maximum consecutive ping failures.
    pub fn max_ping_failures(mut self, failures: u32) -> Self {
        self.config.max_ping_failures = failures;
        self
    }

    /// Sets the warmup timeout.
    pub fn warmup_timeout(mut self, timeout: Duration) -> Self {
        self.config.warmup_timeout = timeout;
        self
    }

    /// Sets the delay between warmup creations.
    pub fn warmup_stagger(mut self, stagger: Duration) -> Self {
        self.config.warmup_stagger = stagger;
        self
    }

    /// Sets the render timeout.
    pub fn render_timeout(mut self, timeout: Duration) -> Self {
        self.config.render_timeout = timeout;
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// - `max_pool_size` is 0
    /// - `warmup_count` exceeds `max_pool_size`
    /// - `ping_timeout` or `render_timeout` is zero
    pub fn build(self) -> std::result::Result<RendererPoolConfig, String> {
        if self.config.max_pool_size == 0 {
            return Err("max_pool_size must be greater than 0".to_string());
        }

        if self.config.warmup_count > self.config.max_pool_size {
            return Err("warmup_count cannot exceed max_pool_size".to_string());
        }

        if self.config.ping_timeout.is_zero() {
            return Err("ping_timeout must be greater than 0".to_string());
        }

        if self.config.render_timeout.is_zero() {
            return Err("render_timeout must be greater than 0".to_string());
        }

        Ok(self.config)
    }
}

impl Default for RendererPoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Environment Configuration (feature-gated)
// ============================================================================

/// Environment-based configuration.
///
/// Reads an optional `app.env` file first, then these variables:
///
/// | Variable | Type | Default |
/// |----------|------|---------|
/// | `RENDERER_POOL_SIZE` | usize | 4 |
/// | `RENDERER_WARMUP_COUNT` | usize | 2 |
/// | `RENDERER_TTL_SECONDS` | u64 | 3600 |
/// | `RENDERER_WARMUP_TIMEOUT_SECONDS` | u64 | 60 |
/// | `RENDERER_WARMUP_STAGGER_SECONDS` | u64 | 30 |
/// | `RENDERER_PING_INTERVAL_SECONDS` | u64 | 15 |
/// | `RENDERER_PING_TIMEOUT_SECONDS` | u64 | 5 |
/// | `RENDERER_MAX_PING_FAILURES` | u32 | 3 |
/// | `RENDERER_RENDER_TIMEOUT_SECONDS` | u64 | 30 |
///
/// Unparseable values fall back to the default.
#[cfg(feature = "env-config")]
pub mod env {
    use super::*;
    use crate::error::RenderError;

    /// Name of the environment file.
    pub const ENV_FILE_NAME: &str = "app.env";

    /// Loads `app.env` from the working directory.
    pub fn load_env_file() -> Result<std::path::PathBuf, dotenvy::Error> {
        dotenvy::from_filename(ENV_FILE_NAME)
    }

    fn var_or<T: std::str::FromStr>(name: &str, default: T) -> T {
        std::env::var(name)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }

    /// Builds a [`RendererPoolConfig`] from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Configuration`] when the resulting values fail
    /// validation.
    pub fn from_env() -> Result<RendererPoolConfig, RenderError> {
        match load_env_file() {
            Ok(path) => log::info!("Loaded configuration from: {:?}", path),
            Err(e) => log::debug!(
                "No {} file loaded: {} (using environment variables and defaults)",
                ENV_FILE_NAME,
                e
            ),
        }

        let defaults = RendererPoolConfig::default();
        let max_pool_size = var_or("RENDERER_POOL_SIZE", defaults.max_pool_size);
        let warmup_count = var_or("RENDERER_WARMUP_COUNT", defaults.warmup_count);
        let ttl_seconds = var_or("RENDERER_TTL_SECONDS", defaults.renderer_ttl.as_secs());
        let warmup_timeout_seconds =
            var_or("RENDERER_WARMUP_TIMEOUT_SECONDS", defaults.warmup_timeout.as_secs());
        let warmup_stagger_seconds =
            var_or("RENDERER_WARMUP_STAGGER_SECONDS", defaults.warmup_stagger.as_secs());
        let ping_interval_seconds =
            var_or("RENDERER_PING_INTERVAL_SECONDS", defaults.ping_interval.as_secs());
        let ping_timeout_seconds =
            var_or("RENDERER_PING_TIMEOUT_SECONDS", defaults.ping_timeout.as_secs());
        let max_ping_failures = var_or("RENDERER_MAX_PING_FAILURES", defaults.max_ping_failures);
        let render_timeout_seconds =
            var_or("RENDERER_RENDER_TIMEOUT_SECONDS", defaults.render_timeout.as_secs());

        log::info!("Loading pool configuration from environment:");
        log::info!("   - Max pool size: {}", max_pool_size);
        log::info!("   - Warmup count: {}", warmup_count);
        log::info!("   - Renderer TTL: {}s ({}min)", ttl_seconds, ttl_seconds / 60);
        log::info!("   - Ping interval: {}s", ping_interval_seconds);
        log::info!("   - Render timeout: {}s", render_timeout_seconds);

        RendererPoolConfigBuilder::new()
            .max_pool_size(max_pool_size)
            .warmup_count(warmup_count)
            .renderer_ttl(Duration::from_secs(ttl_seconds))
            .warmup_timeout(Duration::from_secs(warmup_timeout_seconds))
            .warmup_stagger(Duration::from_secs(warmup_stagger_seconds))
            .ping_interval(Duration::from_secs(ping_interval_seconds))
            .ping_timeout(Duration::from_secs(ping_timeout_seconds))
            .max_ping_failures(max_ping_failures)
            .render_timeout(Duration::from_secs(render_timeout_seconds))
            .build()
            .map_err(RenderError::Configuration)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = RendererPoolConfigBuilder::new()
            .max_pool_size(10)
            .warmup_count(5)
            .renderer_ttl(Duration::from_secs(7200))
            .render_timeout(Duration::from_secs(12))
            .build()
            .unwrap();

        assert_eq!(config.max_pool_size, 10);
        assert_eq!(config.warmup_count, 5);
        assert_eq!(config.renderer_ttl.as_secs(), 7200);
        assert_eq!(config.render_timeout.as_secs(), 12);
    }

    #[test]
    fn test_config_validation() {
        let err = RendererPoolConfigBuilder::new()
            .max_pool_size(0)
            .build()
            .unwrap_err();
        assert!(
            err.contains("max_pool_size must be greater than 0"),
            "Expected validation error message, got: {}",
            err
        );
    }

    #[test]
    fn test_config_warmup_exceeds_pool() {
        let err = RendererPoolConfigBuilder::new()
            .max_pool_size(2)
            .warmup_count(3)
            .build()
            .unwrap_err();
        assert!(err.contains("warmup_count cannot exceed max_pool_size"));
    }

    #[test]
    fn test_config_zero_timeouts_rejected() {
        assert!(RendererPoolConfigBuilder::new()
            .render_timeout(Duration::ZERO)
            .build()
            .is_err());
        assert!(RendererPoolConfigBuilder::new()
            .ping_timeout(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = RendererPoolConfig::default();

        assert_eq!(config.max_pool_size, 4);
        assert_eq!(config.warmup_count, 2);
        assert_eq!(config.ping_interval, Duration::from_secs(15));
        assert_eq!(config.renderer_ttl, Duration::from_secs(3600));
        assert_eq!(config.max_ping_failures, 3);
        assert_eq!(config.render_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_default() {
        let builder: RendererPoolConfigBuilder = Default::default();
        let config = builder.build().unwrap();
        assert_eq!(config.max_pool_size, 4);
    }
}
