//! Renderer pool with lifecycle management.
//!
//! [`RendererPool`] keeps renderer workers warm, hands them out as RAII
//! [`RendererHandle`]s, health-checks them from a keep-alive thread and
//! retires them after their TTL.
//!
//! # Architecture
//!
//! ```text
//! RendererPool
//!   ├─ RendererPoolInner (shared state)
//!   │   ├─ available: Mutex<Vec<TrackedRenderer>>        idle renderers
//!   │   ├─ active: Mutex<HashMap<u64, TrackedRenderer>>  all tracked renderers
//!   │   └─ replacement_tasks: Mutex<Vec<JoinHandle>>
//!   └─ keep_alive_handle: JoinHandle<()>                 health + TTL thread
//! ```
//!
//! # Lock ordering
//!
//! Always `active` before `available`. Never hold a lock while creating a
//! renderer or waiting for a ping.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::task::JoinHandle as TokioJoinHandle;

use crate::config::RendererPoolConfig;
use crate::error::{RenderError, Result};
use crate::factory::RendererFactory;
use crate::handle::RendererHandle;
use crate::stats::PoolStats;
use crate::tracked::TrackedRenderer;
use crate::traits::Healthcheck;

/// Pooled renderers younger than their TTL by less than this are not
/// handed out.
const EXPIRY_SAFETY_MARGIN: Duration = Duration::from_secs(30);

/// Upper bound for creating one renderer during warmup.
const CREATE_TIMEOUT: Duration = Duration::from_secs(15);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// RendererPoolInner
// ============================================================================

/// State shared between the pool, its handles, the keep-alive thread and
/// replacement tasks.
pub(crate) struct RendererPoolInner {
    config: RendererPoolConfig,
    available: Mutex<Vec<TrackedRenderer>>,
    active: Mutex<HashMap<u64, TrackedRenderer>>,
    factory: Box<dyn RendererFactory>,
    shutting_down: AtomicBool,
    created: AtomicU64,
    replacement_tasks: Mutex<Vec<TokioJoinHandle<()>>>,
    runtime_handle: tokio::runtime::Handle,
    shutdown_signal: Arc<(Mutex<bool>, Condvar)>,
}

impl RendererPoolInner {
    /// Must be called from within a tokio runtime.
    pub(crate) fn new(config: RendererPoolConfig, factory: Box<dyn RendererFactory>) -> Arc<Self> {
        log::info!(
            "Initializing renderer pool with capacity {}",
            config.max_pool_size
        );
        log::debug!(
            "Pool config: warmup={}, TTL={}s, ping_interval={}s, render_timeout={}s",
            config.warmup_count,
            config.renderer_ttl.as_secs(),
            config.ping_interval.as_secs(),
            config.render_timeout.as_secs()
        );

        Arc::new(Self {
            config,
            available: Mutex::new(Vec::new()),
            active: Mutex::new(HashMap::new()),
            factory,
            shutting_down: AtomicBool::new(false),
            created: AtomicU64::new(0),
            replacement_tasks: Mutex::new(Vec::new()),
            runtime_handle: tokio::runtime::Handle::current(),
            shutdown_signal: Arc::new((Mutex::new(false), Condvar::new())),
        })
    }

    /// Creates a renderer and adds it to active tracking, bypassing the
    /// idle list. Blocks while the worker starts.
    pub(crate) fn create_renderer_direct(&self) -> Result<TrackedRenderer> {
        if self.is_shutting_down() {
            log::debug!("Skipping renderer creation - pool is shutting down");
            return Err(RenderError::ShuttingDown);
        }

        let renderer = self.factory.create()?;
        let tracked = TrackedRenderer::new(renderer, self.config.ping_timeout)?;
        let id = tracked.id();
        self.created.fetch_add(1, Ordering::Relaxed);

        {
            let mut active = lock(&self.active);
            active.insert(id, tracked.clone());
            log::debug!(
                "Renderer {} added to active tracking (total active: {})",
                id,
                active.len()
            );
        }

        log::info!("✅ Created new renderer with ID {}", id);
        Ok(tracked)
    }

    /// Pops a healthy idle renderer or creates one.
    pub(crate) fn get_or_create_renderer(self: &Arc<Self>) -> Result<RendererHandle> {
        if self.is_shutting_down() {
            return Err(RenderError::ShuttingDown);
        }

        loop {
            let popped = lock(&self.available).pop();
            let Some(tracked) = popped else {
                log::debug!("Pool is empty, will create new renderer");
                break;
            };

            if tracked.age() + EXPIRY_SAFETY_MARGIN > self.config.renderer_ttl {
                log::debug!(
                    "⏳ Renderer {} is near expiry (age: {}s), retiring",
                    tracked.id(),
                    tracked.age().as_secs()
                );
                self.remove_from_active(tracked.id());
                Self::spawn_replacement_creation(Arc::clone(self), 1);
                continue;
            }

            match tracked.ping() {
                Ok(()) => {
                    log::debug!("♻️ Reusing healthy renderer {} from pool", tracked.id());
                    return Ok(RendererHandle::new(tracked, Arc::clone(self)));
                }
                Err(e) => {
                    log::warn!(
                        "❌ Renderer {} failed its checkout health check: {}",
                        tracked.id(),
                        e
                    );
                    self.remove_from_active(tracked.id());
                }
            }
        }

        let tracked = self.create_renderer_direct()?;
        log::debug!("Returning newly created renderer {}", tracked.id());
        Ok(RendererHandle::new(tracked, Arc::clone(self)))
    }

    /// Returns a renderer to the idle list, or retires it.
    ///
    /// Called from [`RendererHandle`]'s `Drop`.
    pub(crate) fn return_renderer(self_arc: &Arc<Self>, tracked: TrackedRenderer) {
        log::debug!("Returning renderer {} to pool...", tracked.id());

        if self_arc.is_shutting_down() {
            log::debug!("Pool shutting down, not returning renderer {}", tracked.id());
            return;
        }

        let mut active = lock(&self_arc.active);
        let mut pool = lock(&self_arc.available);

        if !active.contains_key(&tracked.id()) {
            log::warn!(
                "❌ Renderer {} not in active tracking (probably already removed), skipping return",
                tracked.id()
            );
            return;
        }

        if !tracked.renderer().is_connected() {
            log::warn!("⚠️ Renderer {} disconnected while checked out, removing", tracked.id());
            active.remove(&tracked.id());
            drop(pool);
            drop(active);
            Self::spawn_replacement_creation(Arc::clone(self_arc), 1);
            return;
        }

        if tracked.is_expired(self_arc.config.renderer_ttl) {
            log::info!(
                "⏰ Renderer {} expired (age: {}min), retiring instead of returning",
                tracked.id(),
                tracked.age_minutes()
            );
            active.remove(&tracked.id());
            drop(pool);
            drop(active);
            Self::spawn_replacement_creation(Arc::clone(self_arc), 1);
            return;
        }

        if pool.iter().any(|r| r.id() == tracked.id()) {
            log::warn!(
                "⚠️ Renderer {} already in pool (duplicate return attempt), skipping",
                tracked.id()
            );
            return;
        }

        if pool.len() < self_arc.config.max_pool_size {
            pool.push(tracked);
            log::debug!(
                "♻️ Renderer returned to pool (pool size: {}/{})",
                pool.len(),
                self_arc.config.max_pool_size
            );
        } else {
            log::debug!(
                "Pool full ({}/{}), stopping renderer {}",
                pool.len(),
                self_arc.config.max_pool_size,
                tracked.id()
            );
            active.remove(&tracked.id());
        }
    }

    async fn spawn_replacement_creation_async(inner: Arc<Self>, count: usize) {
        log::info!("Starting replacement creation for {} renderer(s)", count);

        let mut created_count = 0;
        let mut failed_count = 0;

        for i in 0..count {
            if inner.is_shutting_down() {
                log::info!("Shutdown detected during replacement creation, stopping at {}/{}", i, count);
                break;
            }

            if inner.available_count() >= inner.config.max_pool_size {
                log::warn!("⚠️ Pool is full, stopping replacement creation at {}/{}", i, count);
                break;
            }

            let creator = Arc::clone(&inner);
            match tokio::task::spawn_blocking(move || creator.create_renderer_direct()).await {
                Ok(Ok(tracked)) => {
                    let id = tracked.id();
                    let mut pool = lock(&inner.available);
                    if pool.len() < inner.config.max_pool_size {
                        pool.push(tracked);
                        log::info!("✅ Replacement renderer {} added to pool ({}/{})", id, i + 1, count);
                    } else {
                        drop(pool);
                        inner.remove_from_active(id);
                        log::warn!("⚠️ Pool became full during creation, dropping replacement {}", id);
                    }
                    created_count += 1;
                }
                Ok(Err(e)) => {
                    failed_count += 1;
                    log::error!("❌ Failed to create replacement renderer {}/{}: {}", i + 1, count, e);
                }
                Err(e) => {
                    failed_count += 1;
                    log::error!("❌ Replacement renderer {}/{} task panicked: {:?}", i + 1, count, e);
                }
            }
        }

        log::info!(
            "Replacement creation completed: {}/{} created, {} failed. Pool: {}, Active: {}",
            created_count,
            count,
            failed_count,
            inner.available_count(),
            inner.active_count()
        );
    }

    /// Spawns a background task creating `count` replacement renderers.
    pub(crate) fn spawn_replacement_creation(inner: Arc<Self>, count: usize) {
        if inner.is_shutting_down() {
            return;
        }
        log::debug!("Spawning task to create {} replacement renderer(s)", count);

        let task_inner = Arc::clone(&inner);
        let handle = inner.runtime_handle.spawn(async move {
            Self::spawn_replacement_creation_async(task_inner, count).await;
        });

        let mut tasks = lock(&inner.replacement_tasks);
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
        log::trace!("Now tracking {} replacement task(s)", tasks.len());
    }

    #[inline]
    pub(crate) fn config(&self) -> &RendererPoolConfig {
        &self.config
    }

    #[inline]
    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_shutting_down(&self, value: bool) {
        self.shutting_down.store(value, Ordering::Release);
    }

    #[inline]
    pub(crate) fn shutdown_signal(&self) -> &Arc<(Mutex<bool>, Condvar)> {
        &self.shutdown_signal
    }

    pub(crate) fn available_count(&self) -> usize {
        lock(&self.available).len()
    }

    pub(crate) fn active_count(&self) -> usize {
        lock(&self.active).len()
    }

    pub(crate) fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub(crate) fn active_snapshot(&self) -> Vec<(u64, TrackedRenderer)> {
        lock(&self.active)
            .iter()
            .map(|(id, tracked)| (*id, tracked.clone()))
            .collect()
    }

    pub(crate) fn remove_from_active(&self, id: u64) -> Option<TrackedRenderer> {
        lock(&self.active).remove(&id)
    }

    pub(crate) fn remove_from_available(&self, ids: &[u64]) {
        let mut pool = lock(&self.available);
        let before = pool.len();
        pool.retain(|r| !ids.contains(&r.id()));
        let removed = before - pool.len();
        if removed > 0 {
            log::debug!("Removed {} renderer(s) from available pool", removed);
        }
    }

    /// Empties both collections, returning the renderers so the caller
    /// decides where their workers are joined.
    pub(crate) fn drain(&self) -> Vec<TrackedRenderer> {
        let mut active = lock(&self.active);
        let mut pool = lock(&self.available);
        pool.clear();
        active.drain().map(|(_, tracked)| tracked).collect()
    }

    pub(crate) fn abort_replacement_tasks(&self) -> usize {
        let mut tasks = lock(&self.replacement_tasks);
        let count = tasks.len();
        for handle in tasks.drain(..) {
            handle.abort();
        }
        count
    }
}

// ============================================================================
// RendererPool
// ============================================================================

/// Pool of renderer workers.
///
/// # Example
///
/// ```rust,ignore
/// use static_shadow_dom::prelude::*;
///
/// let pool = RendererPool::builder()
///     .factory(Box::new(WorkerRendererFactory::new(modules)))
///     .build()?;
/// pool.warmup().await?;
///
/// {
///     let renderer = pool.get()?;
///     let result = renderer.render(request).await?;
/// }
///
/// pool.shutdown_async().await;
/// ```
pub struct RendererPool {
    inner: Arc<RendererPoolInner>,
    keep_alive_handle: Option<JoinHandle<()>>,
}

impl RendererPool {
    /// Wraps the pool for sharing between request handlers.
    pub fn into_shared(self) -> Arc<Mutex<RendererPool>> {
        log::debug!("Converting RendererPool into shared Arc<Mutex<>>");
        Arc::new(Mutex::new(self))
    }

    /// Starts a builder.
    pub fn builder() -> RendererPoolBuilder {
        RendererPoolBuilder::new()
    }

    /// Checks out a renderer, creating one if none is idle.
    ///
    /// Blocks while a new worker starts; use `spawn_blocking` from async
    /// code if that matters.
    ///
    /// # Errors
    ///
    /// - [`RenderError::ShuttingDown`] after shutdown
    /// - [`RenderError::RendererCreation`] if a worker cannot be started
    pub fn get(&self) -> Result<RendererHandle> {
        log::trace!("RendererPool::get() called");
        self.inner.get_or_create_renderer()
    }

    /// Pool configuration.
    pub fn config(&self) -> &RendererPoolConfig {
        self.inner.config()
    }

    /// Current statistics.
    pub fn stats(&self) -> PoolStats {
        let available = self.inner.available_count();
        let active = self.inner.active_count();
        PoolStats {
            available,
            active,
            total: active,
            created: self.inner.created_count(),
        }
    }

    /// Pre-creates `warmup_count` renderers, `warmup_stagger` apart, within
    /// `warmup_timeout`.
    ///
    /// Individual creation failures are logged; the warmup itself only
    /// fails on timeout.
    pub async fn warmup(&self) -> Result<()> {
        let count = self.inner.config().warmup_count;
        let warmup_timeout = self.inner.config().warmup_timeout;

        log::info!(
            "Starting renderer pool warmup with {} instance(s) (timeout: {}s)",
            count,
            warmup_timeout.as_secs()
        );

        match tokio::time::timeout(warmup_timeout, self.warmup_internal(count)).await {
            Ok(()) => {
                let stats = self.stats();
                log::info!(
                    "✅ Warmup completed - Available: {}, Active: {}",
                    stats.available,
                    stats.active
                );
                Ok(())
            }
            Err(_) => {
                log::error!("❌ Warmup timed out after {}s", warmup_timeout.as_secs());
                Err(RenderError::Configuration(format!(
                    "Warmup timed out after {}s",
                    warmup_timeout.as_secs()
                )))
            }
        }
    }

    async fn warmup_internal(&self, count: usize) {
        let stagger = self.inner.config().warmup_stagger;
        let mut handles = Vec::with_capacity(count);
        let mut failed_count = 0;

        for i in 0..count {
            log::debug!("Creating warmup renderer {}/{}", i + 1, count);

            let inner = Arc::clone(&self.inner);
            let created = tokio::time::timeout(
                CREATE_TIMEOUT,
                tokio::task::spawn_blocking(move || inner.create_renderer_direct()),
            )
            .await;

            match created {
                Ok(Ok(Ok(tracked))) => {
                    handles.push(RendererHandle::new(tracked, Arc::clone(&self.inner)));
                    log::info!("✅ Warmup renderer {}/{} ready", i + 1, count);
                }
                Ok(Ok(Err(e))) => {
                    failed_count += 1;
                    log::error!("❌ Failed to create renderer {}/{}: {}", i + 1, count, e);
                }
                Ok(Err(e)) => {
                    failed_count += 1;
                    log::error!("❌ Renderer {}/{} creation task panicked: {:?}", i + 1, count, e);
                }
                Err(_) => {
                    failed_count += 1;
                    log::error!(
                        "❌ Renderer {}/{} creation timed out ({}s limit)",
                        i + 1,
                        count,
                        CREATE_TIMEOUT.as_secs()
                    );
                }
            }

            if i + 1 < count && !stagger.is_zero() {
                log::debug!("⏳ Waiting {}s before the next warmup renderer", stagger.as_secs());
                tokio::time::sleep(stagger).await;
            }
        }

        log::info!(
            "Warmup creation phase: {} created, {} failed",
            handles.len(),
            failed_count
        );
        // Handles return the renderers to the idle list.
        drop(handles);
    }

    fn start_keep_alive(inner: Arc<RendererPoolInner>) -> JoinHandle<()> {
        let ping_interval = inner.config().ping_interval;
        let max_failures = inner.config().max_ping_failures;
        let renderer_ttl = inner.config().renderer_ttl;
        let shutdown_signal = Arc::clone(inner.shutdown_signal());

        log::info!(
            "Starting keep-alive thread (interval: {}s, max failures: {}, TTL: {}min)",
            ping_interval.as_secs(),
            max_failures,
            renderer_ttl.as_secs() / 60
        );

        thread::spawn(move || {
            let mut failure_counts: HashMap<u64, u32> = HashMap::new();

            loop {
                let (shutdown_lock, cvar) = &*shutdown_signal;
                let (shutdown, wait) = {
                    let guard = lock(shutdown_lock);
                    let (guard, wait) = cvar
                        .wait_timeout(guard, ping_interval)
                        .unwrap_or_else(PoisonError::into_inner);
                    (*guard, wait)
                };

                if shutdown || inner.is_shutting_down() {
                    log::info!("Keep-alive received shutdown signal");
                    break;
                }
                if !wait.timed_out() {
                    continue;
                }

                let mut to_remove = Vec::new();
                let mut expired = Vec::new();

                for (id, tracked) in inner.active_snapshot() {
                    if inner.is_shutting_down() {
                        return;
                    }

                    if tracked.is_expired(renderer_ttl) {
                        log::info!("Renderer {} expired (age: {}min), marking for retirement", id, tracked.age_minutes());
                        expired.push(id);
                        continue;
                    }

                    match tracked.ping() {
                        Ok(()) => {
                            if failure_counts.remove(&id).is_some() {
                                log::debug!("Renderer {} ping successful, failure count reset", id);
                            }
                        }
                        Err(e) => {
                            let failures = failure_counts.entry(id).or_insert(0);
                            *failures += 1;
                            log::warn!(
                                "Renderer {} ping failed (attempt {}/{}): {}",
                                id,
                                failures,
                                max_failures,
                                e
                            );
                            if *failures >= max_failures {
                                log::error!("Renderer {} exceeded max ping failures, removing", id);
                                to_remove.push(id);
                            }
                        }
                    }
                }

                if inner.is_shutting_down() {
                    break;
                }

                if !expired.is_empty() {
                    Self::retire(&inner, &expired, &mut failure_counts);
                }
                if !to_remove.is_empty() {
                    log::warn!("Removing {} failed renderer(s) from pool", to_remove.len());
                    Self::retire(&inner, &to_remove, &mut failure_counts);
                }

                log::debug!(
                    "Keep-alive cycle complete - Active: {}, Pooled: {}",
                    inner.active_count(),
                    inner.available_count()
                );
            }

            log::info!("Keep-alive thread exiting cleanly");
        })
    }

    fn retire(inner: &Arc<RendererPoolInner>, ids: &[u64], failure_counts: &mut HashMap<u64, u32>) {
        let mut retired = 0;
        for id in ids {
            if inner.remove_from_active(*id).is_some() {
                retired += 1;
            }
            failure_counts.remove(id);
        }
        inner.remove_from_available(ids);

        if retired > 0 {
            log::info!("Spawning {} replacement renderer(s)", retired);
            RendererPoolInner::spawn_replacement_creation(Arc::clone(inner), retired);
        }
    }

    fn signal_shutdown(&self) {
        self.inner.set_shutting_down(true);
        let (shutdown_lock, cvar) = &**self.inner.shutdown_signal();
        *lock(shutdown_lock) = true;
        cvar.notify_all();
    }

    /// Shuts the pool down without blocking the async runtime.
    ///
    /// Stops the keep-alive thread (waiting at most 5s), aborts replacement
    /// tasks and stops idle workers. Checked-out renderers stop when their
    /// handles drop.
    pub async fn shutdown_async(&mut self) {
        log::info!("Shutting down renderer pool (async mode)...");
        self.signal_shutdown();

        if let Some(handle) = self.keep_alive_handle.take() {
            let join = tokio::task::spawn_blocking(move || handle.join());
            match tokio::time::timeout(Duration::from_secs(5), join).await {
                Ok(Ok(Ok(()))) => log::info!("Keep-alive thread stopped cleanly"),
                Ok(Ok(Err(_))) => log::error!("Keep-alive thread panicked during shutdown"),
                Ok(Err(_)) => log::error!("Keep-alive join task panicked"),
                Err(_) => log::error!("Keep-alive thread didn't exit within 5s timeout"),
            }
        }

        let aborted = self.inner.abort_replacement_tasks();
        if aborted > 0 {
            log::info!("Aborted {} replacement task(s)", aborted);
        }

        let renderers = self.inner.drain();
        let stopped = renderers.len();
        if let Err(e) = tokio::task::spawn_blocking(move || drop(renderers)).await {
            log::error!("Failed to stop renderers: {:?}", e);
        }
        log::info!("Async shutdown complete - stopped {} renderer(s)", stopped);
    }

    /// Shuts the pool down, blocking the current thread.
    pub fn shutdown(&mut self) {
        log::info!("Shutting down renderer pool (sync mode)...");
        self.signal_shutdown();

        if let Some(handle) = self.keep_alive_handle.take() {
            match handle.join() {
                Ok(()) => log::info!("Keep-alive thread stopped"),
                Err(_) => log::error!("Keep-alive thread panicked"),
            }
        }

        let aborted = self.inner.abort_replacement_tasks();
        if aborted > 0 {
            log::debug!("Aborted {} replacement task(s) (sync mode)", aborted);
        }

        let stopped = self.inner.drain().len();
        log::info!("Sync shutdown complete - stopped {} renderer(s)", stopped);
    }

    /// Returns `true` once shutdown started.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.is_shutting_down()
    }
}

impl Drop for RendererPool {
    fn drop(&mut self) {
        if !self.inner.is_shutting_down() {
            log::warn!("RendererPool dropped without explicit shutdown - cleaning up");
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for RendererPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererPool")
            .field("stats", &self.stats())
            .field("keep_alive", &self.keep_alive_handle.is_some())
            .finish()
    }
}

// ============================================================================
// RendererPoolBuilder
// ============================================================================

/// Builder for [`RendererPool`].
pub struct RendererPoolBuilder {
    config: Option<RendererPoolConfig>,
    factory: Option<Box<dyn RendererFactory>>,
    enable_keep_alive: bool,
}

impl RendererPoolBuilder {
    /// Starts a builder with keep-alive enabled.
    pub fn new() -> Self {
        Self {
            config: None,
            factory: None,
            enable_keep_alive: true,
        }
    }

    /// Sets the configuration. Defaults to [`RendererPoolConfig::default`].
    pub fn config(mut self, config: RendererPoolConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the renderer factory. Required.
    pub fn factory(mut self, factory: Box<dyn RendererFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Enables or disables the keep-alive thread. Disable only in tests.
    pub fn enable_keep_alive(mut self, enable: bool) -> Self {
        self.enable_keep_alive = enable;
        self
    }

    /// Builds the pool. Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Configuration`] if no factory was provided.
    pub fn build(self) -> Result<RendererPool> {
        let config = self.config.unwrap_or_default();
        let factory = self.factory.ok_or_else(|| {
            RenderError::Configuration("No renderer factory provided".to_string())
        })?;

        let inner = RendererPoolInner::new(config, factory);
        let keep_alive_handle = if self.enable_keep_alive {
            Some(RendererPool::start_keep_alive(Arc::clone(&inner)))
        } else {
            log::warn!("⚠️ Keep-alive thread disabled (should only be used for testing)");
            None
        };

        log::info!("✅ Renderer pool built successfully");
        Ok(RendererPool {
            inner,
            keep_alive_handle,
        })
    }
}

impl Default for RendererPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Environment Initialization (feature-gated)
// ============================================================================

/// Builds, warms up and shares a pool configured from the environment.
///
/// See [`config::env`](crate::config::env) for the variables read.
///
/// ```rust,ignore
/// let pool = init_renderer_pool(Arc::new(modules)).await?;
/// // Arc<Mutex<RendererPool>>, ready for request handlers
/// ```
#[cfg(feature = "env-config")]
pub async fn init_renderer_pool(
    modules: Arc<crate::modules::ModuleRegistry>,
) -> Result<Arc<Mutex<RendererPool>>> {
    use crate::config::env::from_env;
    use crate::factory::WorkerRendererFactory;

    log::info!("Initializing renderer pool from environment...");
    let config = from_env()?;
    let warmup_count = config.warmup_count;

    let pool = RendererPool::builder()
        .config(config)
        .factory(Box::new(WorkerRendererFactory::new(modules)))
        .enable_keep_alive(true)
        .build()
        .inspect_err(|e| log::error!("❌ Failed to create renderer pool: {}", e))?;

    log::info!("Warming up renderer pool with {} instance(s)...", warmup_count);
    pool.warmup()
        .await
        .inspect_err(|e| log::error!("❌ Failed to warm up pool: {}", e))?;

    let stats = pool.stats();
    log::info!(
        "✅ Renderer pool ready - Available: {}, Active: {}",
        stats.available,
        stats.active
    );
    Ok(pool.into_shared())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RendererPoolConfigBuilder;
    use crate::factory::mock::MockRendererFactory;

    fn config() -> RendererPoolConfig {
        RendererPoolConfigBuilder::new()
            .max_pool_size(2)
            .warmup_count(2)
            .warmup_stagger(Duration::ZERO)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_pool_builder_missing_factory() {
        match RendererPool::builder().config(config()).build() {
            Err(RenderError::Configuration(msg)) => {
                assert!(msg.contains("No renderer factory provided"), "got: {}", msg)
            }
            other => panic!("Expected Configuration error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_builder_default() {
        let builder: RendererPoolBuilder = Default::default();
        assert!(builder.config.is_none());
        assert!(builder.factory.is_none());
        assert!(builder.enable_keep_alive);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_handles_return_to_pool() {
        let mut pool = RendererPool::builder()
            .config(config())
            .factory(Box::new(MockRendererFactory::new()))
            .enable_keep_alive(false)
            .build()
            .unwrap();

        let first_id = {
            let handle = pool.get().unwrap();
            assert!(handle.is_connected());
            assert_eq!(pool.stats().checked_out(), 1);
            handle.id()
        };
        assert_eq!(pool.stats().available, 1);

        let again = pool.get().unwrap();
        assert_eq!(again.id(), first_id);
        drop(again);

        pool.shutdown_async().await;
        assert!(pool.get().is_err());
        assert!(pool.stats().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_warmup_fills_pool() {
        let factory = MockRendererFactory::new();
        let counter = factory.counter();
        let mut pool = RendererPool::builder()
            .config(config())
            .factory(Box::new(factory))
            .enable_keep_alive(false)
            .build()
            .unwrap();

        pool.warmup().await.unwrap();
        let stats = pool.stats();
        assert_eq!(stats.available, 2);
        assert_eq!(stats.created, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        pool.shutdown_async().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_disconnected_renderer_is_not_returned() {
        let mut pool = RendererPool::builder()
            .config(config())
            .factory(Box::new(MockRendererFactory::fail_after_n(1, "no more workers")))
            .enable_keep_alive(false)
            .build()
            .unwrap();

        {
            let handle = pool.get().unwrap();
            handle.disconnect();
        }
        assert_eq!(pool.stats().available, 0);
        assert_eq!(pool.stats().active, 0);

        pool.shutdown_async().await;
    }
}
