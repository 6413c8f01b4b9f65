//! Countdown barrier.
//!
//! A [`Countdown`] starts at N and completes exactly once, when the N-th
//! [`signal`](Countdown::signal) arrives. A render uses two of them: one
//! counting element *types* still to be defined, one counting element
//! *instances* still to connect.
//!
//! # Example
//!
//! ```rust
//! use static_shadow_dom::barrier::{BarrierState, Countdown};
//!
//! # tokio_test::block_on(async {
//! let barrier = Countdown::new("definitions", 2);
//! assert_eq!(barrier.signal(), Ok(BarrierState::Pending { remaining: 1 }));
//! assert_eq!(barrier.signal(), Ok(BarrierState::Complete));
//! barrier.wait().await.unwrap();
//! # });
//! ```

use std::sync::Arc;

use tokio::sync::watch;

/// State of a [`Countdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierState {
    /// Still waiting for `remaining` signals.
    Pending {
        /// Signals left before completion.
        remaining: usize,
    },
    /// Every signal arrived.
    Complete,
    /// The barrier was cancelled before completing.
    Cancelled,
}

/// Errors returned by [`Countdown`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BarrierError {
    /// `signal()` after the barrier completed.
    #[error("countdown already complete")]
    AlreadyComplete,
    /// The barrier was cancelled.
    #[error("countdown cancelled")]
    Cancelled,
}

/// A countdown that completes exactly once.
///
/// Clones share the same state.
#[derive(Debug, Clone)]
pub struct Countdown {
    label: &'static str,
    state: Arc<watch::Sender<BarrierState>>,
}

impl Countdown {
    /// Creates a countdown expecting `total` signals.
    ///
    /// A zero total is complete from the start.
    pub fn new(label: &'static str, total: usize) -> Self {
        let initial = if total == 0 {
            BarrierState::Complete
        } else {
            BarrierState::Pending { remaining: total }
        };
        let (sender, _) = watch::channel(initial);
        log::trace!("Countdown '{}' created with {} signal(s)", label, total);
        Self {
            label,
            state: Arc::new(sender),
        }
    }

    /// Name used in log messages.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Current state.
    pub fn state(&self) -> BarrierState {
        *self.state.borrow()
    }

    /// Signals still expected (zero once complete or cancelled).
    pub fn remaining(&self) -> usize {
        match self.state() {
            BarrierState::Pending { remaining } => remaining,
            BarrierState::Complete | BarrierState::Cancelled => 0,
        }
    }

    /// Returns `true` once every signal arrived.
    pub fn is_complete(&self) -> bool {
        self.state() == BarrierState::Complete
    }

    /// Decrements the count, returning the new state.
    pub fn signal(&self) -> Result<BarrierState, BarrierError> {
        let mut outcome = Err(BarrierError::AlreadyComplete);
        self.state.send_if_modified(|state| match *state {
            BarrierState::Pending { remaining } => {
                *state = if remaining <= 1 {
                    BarrierState::Complete
                } else {
                    BarrierState::Pending {
                        remaining: remaining - 1,
                    }
                };
                outcome = Ok(*state);
                true
            }
            BarrierState::Complete => false,
            BarrierState::Cancelled => {
                outcome = Err(BarrierError::Cancelled);
                false
            }
        });

        match outcome {
            Ok(BarrierState::Complete) => log::debug!("Countdown '{}' complete", self.label),
            Err(BarrierError::AlreadyComplete) => {
                log::warn!("⚠️ Countdown '{}' signalled after completion", self.label)
            }
            _ => {}
        }
        outcome
    }

    /// Cancels a pending countdown; every waiter fails with
    /// [`BarrierError::Cancelled`]. No effect once complete.
    pub fn cancel(&self) {
        let cancelled = self.state.send_if_modified(|state| {
            if matches!(state, BarrierState::Pending { .. }) {
                *state = BarrierState::Cancelled;
                true
            } else {
                false
            }
        });
        if cancelled {
            log::debug!("Countdown '{}' cancelled", self.label);
        }
    }

    /// Waits for completion. Dropping the future stops waiting.
    pub async fn wait(&self) -> Result<(), BarrierError> {
        let mut receiver = self.state.subscribe();
        let complete = {
            let state = receiver
                .wait_for(|state| !matches!(state, BarrierState::Pending { .. }))
                .await
                .map_err(|_| BarrierError::Cancelled)?;
            *state == BarrierState::Complete
        };
        if complete {
            Ok(())
        } else {
            Err(BarrierError::Cancelled)
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
