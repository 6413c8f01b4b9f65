//! Pool statistics.

/// Point-in-time snapshot of the renderer pool.
///
/// Values may change right after the snapshot is taken.
///
/// ```text
/// active   = renderers the pool tracks (idle + checked out)
/// available = idle renderers ready for checkout
/// checked_out = active - available
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Idle renderers in the pool.
    pub available: usize,

    /// All tracked renderers, idle or checked out.
    pub active: usize,

    /// Same as `active`; kept as the headline number for dashboards.
    pub total: usize,

    /// Renderers created since the pool started, replacements included.
    pub created: u64,
}

impl PoolStats {
    /// Renderers currently checked out.
    #[inline]
    pub fn checked_out(&self) -> usize {
        self.active.saturating_sub(self.available)
    }

    /// Returns `true` if a checkout would not need to start a worker.
    #[inline]
    pub fn has_available(&self) -> bool {
        self.available > 0
    }

    /// Returns `true` if the pool tracks no renderers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.active == 0
    }
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PoolStats {{ available: {}, active: {}, total: {}, created: {} }}",
            self.available, self.active, self.total, self.created
        )
    }
}
