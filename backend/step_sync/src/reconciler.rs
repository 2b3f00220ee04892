//! Background task that periodically reconciles local step state with the
//! backend.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::errors::StepError;
use crate::sync::StepSync;

/// Run [`StepSync::load_from_backend`] every `interval`, forever.
///
/// Failures keep the current (cached) state. A tick that collides with a
/// user-initiated operation is skipped.
pub async fn run(sync: Arc<StepSync>, interval: Duration) {
    info!("Reconciler starting (every {}s)", interval.as_secs());

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        reconcile_once(&sync).await;
    }
}

/// A single reconciliation attempt. Returns whether the store was refreshed.
pub async fn reconcile_once(sync: &StepSync) -> bool {
    match sync.load_from_backend().await {
        Ok(state) => {
            debug!("Reconciled: {}", state.current_step);
            true
        }
        Err(StepError::OperationInFlight) => {
            debug!("Reconcile skipped: operation in flight");
            false
        }
        Err(e) => {
            warn!("Reconcile failed, keeping cached state: {e}");
            false
        }
    }
}
