//! `StepSync`, the only writer of the session's step state.
//!
//! Every mutation follows the same order: take the in-flight slot, validate
//! locally, call the backend, then rewrite the cache and swap the new state
//! into the store. A failure at any point leaves the store untouched.
//!
//! Only one mutating call may be outstanding; a second one fails with
//! [`StepError::OperationInFlight`] instead of racing the first.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::api_client::StepBackend;
use crate::cache::LocalCache;
use crate::errors::{Result, StepError};
use crate::state::StepState;
use crate::steps::{DashboardSubstep, FundingStep};
use crate::store::{StepStateReader, StepStateStore};
use crate::transitions;

pub struct StepSync {
    backend: Arc<dyn StepBackend>,
    cache: LocalCache,
    store: StepStateStore,
    in_flight: Mutex<()>,
}

impl StepSync {
    /// Start from the initial state, ignoring any cached entry.
    pub fn new(backend: Arc<dyn StepBackend>, cache: LocalCache) -> Self {
        Self::with_state(backend, cache, StepState::initial())
    }

    /// Start from the cached state when one is readable, else the initial state.
    pub async fn restore(backend: Arc<dyn StepBackend>, cache: LocalCache) -> Self {
        let state = match cache.load().await {
            Some(state) => {
                info!("Restored cached step state: {}", state.current_step);
                state
            }
            None => StepState::initial(),
        };
        Self::with_state(backend, cache, state)
    }

    fn with_state(backend: Arc<dyn StepBackend>, cache: LocalCache, state: StepState) -> Self {
        Self {
            backend,
            cache,
            store: StepStateStore::new(state),
            in_flight: Mutex::new(()),
        }
    }

    pub fn reader(&self) -> StepStateReader {
        self.store.reader()
    }

    pub fn current_state(&self) -> StepState {
        self.store.current()
    }

    pub fn current_step(&self) -> FundingStep {
        self.store.current_step()
    }

    pub fn current_substep(&self) -> Option<DashboardSubstep> {
        self.store.current_substep()
    }

    /// Replace local state with the backend's view of the session.
    ///
    /// On failure the store is unchanged and the caller may keep rendering
    /// the cached value.
    pub async fn load_from_backend(&self) -> Result<StepState> {
        let _slot = self.claim()?;

        let previous = self.store.current();
        let remote = self.backend.fetch_current().await.map_err(|e| {
            warn!("Loading step from backend failed: {e}");
            e
        })?;

        let state = StepState::from_backend(remote.step, remote.substep, &previous);
        self.commit(&state).await;
        info!(
            "Reconciled with backend: {} (was {})",
            state.current_step, previous.current_step
        );
        Ok(state)
    }

    /// Move the pipeline to `target`.
    ///
    /// Illegal moves fail with [`StepError::InvalidTransition`] before any
    /// network call. `substep` only applies when `target` is the dashboard.
    pub async fn transition_to(
        &self,
        target: FundingStep,
        substep: Option<DashboardSubstep>,
    ) -> Result<StepState> {
        let _slot = self.claim()?;

        let current = self.store.current();
        if !transitions::is_valid_transition(current.current_step, target) {
            warn!(
                "Rejected transition {} -> {target}",
                current.current_step
            );
            return Err(StepError::InvalidTransition {
                from: current.current_step,
                to: target,
            });
        }

        let reported = self.backend.request_transition(target).await.map_err(|e| {
            warn!("Backend transition to {target} failed: {e}");
            e
        })?;
        if reported != target {
            warn!("Backend confirmed transition to {target} but reports {reported}");
        }

        let state = current.after_transition(target, substep);
        self.commit(&state).await;
        info!("Step transition {} -> {target}", current.current_step);
        Ok(state)
    }

    /// Set the dashboard substep. Any substep may follow any other.
    ///
    /// Fails with [`StepError::PreconditionFailed`], without a network call,
    /// unless the pipeline is at the dashboard.
    pub async fn update_substep(&self, substep: DashboardSubstep) -> Result<StepState> {
        let _slot = self.claim()?;

        let current = self.store.current();
        if !current.current_step.is_terminal() {
            return Err(StepError::PreconditionFailed {
                step: current.current_step,
            });
        }

        self.backend.request_substep(substep).await.map_err(|e| {
            warn!("Backend substep update to {substep} failed: {e}");
            e
        })?;

        let state = current.with_substep(substep);
        self.commit(&state).await;
        info!("Dashboard substep set to {substep}");
        Ok(state)
    }

    /// Back to the initial state with the cache entry removed (logout).
    ///
    /// Waits for an outstanding operation instead of failing.
    pub async fn reset(&self) {
        let _slot = self.in_flight.lock().await;
        self.cache.clear().await;
        self.store.replace(StepState::initial());
        info!("Step state reset");
    }

    fn claim(&self) -> Result<tokio::sync::MutexGuard<'_, ()>> {
        self.in_flight
            .try_lock()
            .map_err(|_| StepError::OperationInFlight)
    }

    /// Cache first: a caller dropped mid-commit never leaves the store ahead
    /// of the cache.
    async fn commit(&self, state: &StepState) {
        self.cache.save(state).await;
        self.store.replace(state.clone());
    }
}

impl std::fmt::Debug for StepSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepSync")
            .field("state", &self.store.current())
            .finish_non_exhaustive()
    }
}
