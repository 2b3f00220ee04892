//! Holder of the session's `StepState` and its change broadcast.
//!
//! Backed by a `tokio::sync::watch` channel: a subscriber sees the latest
//! value as soon as it subscribes, then every later value. Only the crate
//! (in practice [`crate::sync::StepSync`]) can replace the value; everything
//! else gets a [`StepStateReader`].

use tokio::sync::watch;

use crate::state::StepState;
use crate::steps::{DashboardSubstep, FundingStep};

#[derive(Debug)]
pub struct StepStateStore {
    tx: watch::Sender<StepState>,
}

impl StepStateStore {
    pub fn new(initial: StepState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> StepState {
        self.tx.borrow().clone()
    }

    pub fn current_step(&self) -> FundingStep {
        self.tx.borrow().current_step
    }

    pub fn current_substep(&self) -> Option<DashboardSubstep> {
        self.tx.borrow().current_substep
    }

    /// Read-only handle for consumers.
    pub fn reader(&self) -> StepStateReader {
        StepStateReader {
            rx: self.tx.subscribe(),
        }
    }

    /// Swap in a whole new state and notify subscribers. Succeeds with or
    /// without live subscribers.
    pub(crate) fn replace(&self, state: StepState) {
        self.tx.send_replace(state);
    }
}

/// Subscribe-only view of a [`StepStateStore`].
#[derive(Debug, Clone)]
pub struct StepStateReader {
    rx: watch::Receiver<StepState>,
}

impl StepStateReader {
    pub fn current(&self) -> StepState {
        self.rx.borrow().clone()
    }

    pub fn current_step(&self) -> FundingStep {
        self.rx.borrow().current_step
    }

    pub fn current_substep(&self) -> Option<DashboardSubstep> {
        self.rx.borrow().current_substep
    }

    /// Latest value, marking it as seen.
    pub fn latest(&mut self) -> StepState {
        self.rx.borrow_and_update().clone()
    }

    /// Wait for the next state not yet seen through this handle.
    ///
    /// Returns `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<StepState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
