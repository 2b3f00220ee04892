//! Axum REST API exposing the step store to local UI consumers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::errors::StepError;
use crate::routes;
use crate::state::StepState;
use crate::steps::{DashboardSubstep, FundingStep};
use crate::sync::StepSync;
use crate::transitions;

#[derive(Clone)]
pub struct ApiState {
    pub sync: Arc<StepSync>,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/state", get(get_state))
        .route("/transition", post(transition))
        .route("/substep", post(update_substep))
        .route("/reset", post(reset))
        .route("/sync", post(sync_now))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionBody {
    pub target_step: String,
    pub substep: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubstepBody {
    pub substep: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    pub state: StepState,
    pub route: String,
    pub progress: u8,
    pub next_steps: Vec<FundingStep>,
}

impl From<StepState> for StateResponse {
    fn from(state: StepState) -> Self {
        Self {
            route: routes::route_for(state.current_step, state.current_substep).to_string(),
            progress: state.progress_percent(),
            next_steps: transitions::next_steps(state.current_step).to_vec(),
            state,
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /state`
///
/// Latest local state; never touches the backend.
pub async fn get_state(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(StateResponse::from(state.sync.current_state()))
}

/// `POST /transition`
pub async fn transition(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<TransitionBody>,
) -> Response {
    let parsed = body.target_step.parse::<FundingStep>().and_then(|target| {
        let substep = body
            .substep
            .as_deref()
            .map(str::parse::<DashboardSubstep>)
            .transpose()?;
        Ok((target, substep))
    });
    let (target, substep) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => return error_response(e),
    };

    match state.sync.transition_to(target, substep).await {
        Ok(next) => ok_response(next),
        Err(e) => error_response(e),
    }
}

/// `POST /substep`
pub async fn update_substep(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<SubstepBody>,
) -> Response {
    let substep = match body.substep.parse::<DashboardSubstep>() {
        Ok(substep) => substep,
        Err(e) => return error_response(e),
    };

    match state.sync.update_substep(substep).await {
        Ok(next) => ok_response(next),
        Err(e) => error_response(e),
    }
}

/// `POST /reset`
pub async fn reset(State(state): State<Arc<ApiState>>) -> Response {
    state.sync.reset().await;
    ok_response(state.sync.current_state())
}

/// `POST /sync`
///
/// Reconcile with the backend now.
pub async fn sync_now(State(state): State<Arc<ApiState>>) -> Response {
    match state.sync.load_from_backend().await {
        Ok(next) => ok_response(next),
        Err(e) => error_response(e),
    }
}

fn ok_response(state: StepState) -> Response {
    (StatusCode::OK, Json(StateResponse::from(state))).into_response()
}

fn status_for(e: &StepError) -> StatusCode {
    match e {
        StepError::InvalidTransition { .. } => StatusCode::CONFLICT,
        StepError::PreconditionFailed { .. } => StatusCode::PRECONDITION_FAILED,
        StepError::OperationInFlight => StatusCode::TOO_MANY_REQUESTS,
        StepError::UnknownStep(_) | StepError::UnknownSubstep(_) => StatusCode::BAD_REQUEST,
        e if e.is_backend_failure() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(e: StepError) -> Response {
    (
        status_for(&e),
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
