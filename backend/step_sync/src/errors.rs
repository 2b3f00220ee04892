//! Application-wide error types.

use thiserror::Error;

use crate::steps::FundingStep;

#[derive(Debug, Error)]
pub enum StepError {
    /// The requested step pair is not in the transition table. Raised before
    /// any network call; nothing changed.
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: FundingStep, to: FundingStep },

    /// Substep updates are only legal while the pipeline sits at `dashboard`.
    #[error("Precondition failed: substep updates require the dashboard step (current: {step})")]
    PreconditionFailed { step: FundingStep },

    /// Transport failure or non-2xx response from the steps backend.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend answered 2xx but reported `success: false`.
    #[error("Backend rejected the request: {0}")]
    BackendRejected(String),

    /// The backend's reply could not be understood (e.g. a step name this
    /// client does not know).
    #[error("Unexpected backend response: {0}")]
    BackendProtocol(String),

    #[error("Unknown funding step: {0}")]
    UnknownStep(String),

    #[error("Unknown dashboard substep: {0}")]
    UnknownSubstep(String),

    /// Another mutating operation is still awaiting the backend.
    #[error("Another step operation is already in flight")]
    OperationInFlight,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed JSON body from the backend.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StepError {
    /// True for failures that happened after a network call was attempted.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable(_)
                | Self::BackendRejected(_)
                | Self::BackendProtocol(_)
                | Self::Http(_)
                | Self::Json(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StepError>;
