//! The `StepState` aggregate and the pure constructors used by every mutation.
//!
//! A mutation never edits a state in place: it builds the next value from the
//! current one and the store swaps it in whole.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::steps::{DashboardSubstep, FundingStep};

/// Where a user session sits in the funding pipeline.
///
/// Serialised with camelCase keys and an RFC 3339 timestamp; this is also the
/// layout of the durable cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepState {
    pub current_step: FundingStep,
    /// Present iff `current_step` is `dashboard`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_substep: Option<DashboardSubstep>,
    /// Step held right before the last successful change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_step: Option<FundingStep>,
    /// Every step the session passed through, oldest first.
    pub history: Vec<FundingStep>,
    pub timestamp: DateTime<Utc>,
}

impl Default for StepState {
    fn default() -> Self {
        Self::initial()
    }
}

impl StepState {
    /// Fresh session: `funding_info`, history `[funding_info]`.
    pub fn initial() -> Self {
        Self {
            current_step: FundingStep::FundingInfo,
            current_substep: None,
            previous_step: None,
            history: vec![FundingStep::FundingInfo],
            timestamp: Utc::now(),
        }
    }

    /// State after a confirmed move to `target`.
    ///
    /// `target` is appended to the history. Entering the dashboard without an
    /// explicit substep keeps the current one on a dashboard self-loop and
    /// falls back to `withdrawal_available` otherwise.
    pub fn after_transition(&self, target: FundingStep, substep: Option<DashboardSubstep>) -> Self {
        let current_substep = if target.is_terminal() {
            Some(
                substep
                    .or(self.current_substep)
                    .unwrap_or_default(),
            )
        } else {
            None
        };

        let mut history = self.history.clone();
        history.push(target);

        Self {
            current_step: target,
            current_substep,
            previous_step: Some(self.current_step),
            history,
            timestamp: Utc::now(),
        }
    }

    /// State after a confirmed substep change. Only the substep and the
    /// timestamp move.
    pub fn with_substep(&self, substep: DashboardSubstep) -> Self {
        Self {
            current_substep: Some(substep),
            timestamp: Utc::now(),
            ..self.clone()
        }
    }

    /// State rebuilt from the backend's view of the session.
    ///
    /// The backend reports only the current step, so the history is every
    /// pipeline step up to and including it rather than the path actually
    /// taken. Progress displays rely on that monotonic sequence.
    pub fn from_backend(
        step: FundingStep,
        substep: Option<DashboardSubstep>,
        previous: &StepState,
    ) -> Self {
        let current_substep = step.is_terminal().then(|| substep.unwrap_or_default());

        Self {
            current_step: step,
            current_substep,
            previous_step: Some(previous.current_step),
            history: FundingStep::ALL[..=step.index()].to_vec(),
            timestamp: Utc::now(),
        }
    }

    /// Position in the pipeline as a 0–100 percentage.
    pub fn progress_percent(&self) -> u8 {
        let last = FundingStep::ALL.len() - 1;
        ((self.current_step.index() * 100) / last) as u8
    }

    /// Whether the pipeline has reached (or passed) `step`.
    pub fn has_reached(&self, step: FundingStep) -> bool {
        self.current_step >= step
    }

    pub fn has_visited(&self, step: FundingStep) -> bool {
        self.history.contains(&step)
    }

    pub fn is_complete(&self) -> bool {
        self.current_step.is_terminal()
    }

    /// First broken structural rule, if any: substep present iff at the
    /// dashboard, history non-empty, starting at `funding_info` and ending
    /// at the current step.
    pub fn inconsistency(&self) -> Option<&'static str> {
        if self.current_step.is_terminal() && self.current_substep.is_none() {
            return Some("dashboard state without a substep");
        }
        if !self.current_step.is_terminal() && self.current_substep.is_some() {
            return Some("substep outside the dashboard");
        }
        match (self.history.first(), self.history.last()) {
            (None, _) => Some("empty history"),
            (Some(first), _) if *first != FundingStep::FundingInfo => {
                Some("history does not start at funding_info")
            }
            (_, Some(last)) if *last != self.current_step => {
                Some("history does not end at the current step")
            }
            _ => None,
        }
    }
}
