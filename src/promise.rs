//! Handles to merge results that may still be in flight.
//!
//! A [`MergePromise`] is either created resolved (leaf initialization, or a
//! synchronous invoker) or pending on a [`PromiseSlot`] that a backend fills
//! exactly once. A promise never goes back from finished to pending.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use crate::dictionary::Dictionary;
use crate::error::Result;

/// Outcome of one merge as observed through a promise.
pub type MergeOutcome = Result<Arc<Dictionary>>;

/// Write-once cell a backend uses to publish a merge outcome.
#[derive(Debug, Default)]
pub struct PromiseSlot {
    value: Mutex<Option<MergeOutcome>>,
    ready: Condvar,
}

impl PromiseSlot {
    /// Publish the outcome and wake every waiter.
    ///
    /// Returns `false` (and leaves the stored outcome untouched) if the slot
    /// was already filled.
    pub fn fulfill(&self, outcome: MergeOutcome) -> bool {
        let mut guard = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return false;
        }
        *guard = Some(outcome);
        self.ready.notify_all();
        true
    }

    fn is_filled(&self) -> bool {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn get(&self) -> Option<MergeOutcome> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn wait_timeout(&self, timeout: Duration) -> Option<MergeOutcome> {
        let guard = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .ready
            .wait_timeout_while(guard, timeout, |v| v.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }
}

#[derive(Debug, Clone)]
enum PromiseState {
    Resolved(MergeOutcome),
    Pending(Arc<PromiseSlot>),
}

/// The outcome of one merge, at any point in time.
#[derive(Debug, Clone)]
pub struct MergePromise {
    state: PromiseState,
}

impl MergePromise {
    /// An already-finished promise holding `dict`.
    pub fn resolved(dict: Dictionary) -> Self {
        Self::from_outcome(Ok(dict))
    }

    /// An already-finished promise holding the result of a merge run inline.
    pub fn from_outcome(outcome: Result<Dictionary>) -> Self {
        Self {
            state: PromiseState::Resolved(outcome.map(Arc::new)),
        }
    }

    /// A pending promise plus the slot that will resolve it.
    pub fn pending() -> (Self, Arc<PromiseSlot>) {
        let slot = Arc::new(PromiseSlot::default());
        (
            Self {
                state: PromiseState::Pending(slot.clone()),
            },
            slot,
        )
    }

    /// Non-blocking completion check.
    pub fn is_finished(&self) -> bool {
        match &self.state {
            PromiseState::Resolved(_) => true,
            PromiseState::Pending(slot) => slot.is_filled(),
        }
    }

    /// The outcome if the promise has finished, `None` otherwise. Never blocks.
    pub fn result(&self) -> Option<MergeOutcome> {
        match &self.state {
            PromiseState::Resolved(outcome) => Some(outcome.clone()),
            PromiseState::Pending(slot) => slot.get(),
        }
    }

    /// Block for at most `timeout` waiting for the outcome.
    ///
    /// Returns `None` if the result is not yet available when the timeout
    /// elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<MergeOutcome> {
        match &self.state {
            PromiseState::Resolved(outcome) => Some(outcome.clone()),
            PromiseState::Pending(slot) => slot.wait_timeout(timeout),
        }
    }
}
