//! Steps backend client: the three calls that read or move the authoritative
//! funding step.
//!
//! | Call                              | Body                 | Response                                  |
//! |-----------------------------------|----------------------|-------------------------------------------|
//! | `GET  {base}/api/steps/current`    | —                    | `{ currentStep, currentSubstep? }`        |
//! | `POST {base}/api/steps/transition` | `{ targetStep }`     | `{ success, currentStep }`                |
//! | `POST {base}/api/steps/substep`    | `{ substep }`        | `{ success, currentSubstep }`             |
//!
//! No retries happen here: a transport error or non-2xx status is reported to
//! the caller as-is, and the HTTP client's own timeout bounds each call.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{Result, StepError};
use crate::steps::{DashboardSubstep, FundingStep};

// ─────────────────────────────────────────────────────────
// Wire shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentStepResponse {
    pub current_step: String,
    pub current_substep: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub target_step: FundingStep,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    pub success: bool,
    pub current_step: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubstepRequest {
    pub substep: DashboardSubstep,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstepResponse {
    pub success: bool,
    pub current_substep: Option<String>,
}

/// The backend's view of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteStep {
    pub step: FundingStep,
    pub substep: Option<DashboardSubstep>,
}

impl TryFrom<CurrentStepResponse> for RemoteStep {
    type Error = StepError;

    fn try_from(resp: CurrentStepResponse) -> Result<Self> {
        let step: FundingStep = resp.current_step.parse()?;
        let substep = resp
            .current_substep
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse::<DashboardSubstep>)
            .transpose()?;
        Ok(RemoteStep { step, substep })
    }
}

// ─────────────────────────────────────────────────────────
// Backend seam
// ─────────────────────────────────────────────────────────

/// Network operations that read or change the authoritative step.
#[async_trait]
pub trait StepBackend: Send + Sync {
    async fn fetch_current(&self) -> Result<RemoteStep>;

    /// Ask the backend to move to `target`. Returns the step it reports.
    async fn request_transition(&self, target: FundingStep) -> Result<FundingStep>;

    /// Ask the backend to set the dashboard substep. Returns the substep it reports.
    async fn request_substep(&self, substep: DashboardSubstep) -> Result<DashboardSubstep>;
}

/// [`StepBackend`] over HTTP. A bearer token, when configured, is attached
/// to every request.
#[derive(Debug, Clone)]
pub struct HttpStepBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpStepBackend {
    pub fn new(client: Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/steps/{path}", self.base_url)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl StepBackend for HttpStepBackend {
    async fn fetch_current(&self) -> Result<RemoteStep> {
        let url = self.url("current");
        debug!("GET {url}");
        let resp = self.authorize(self.client.get(&url)).send().await?;
        let body: CurrentStepResponse = read_json(ensure_success(resp, &url).await?).await?;
        RemoteStep::try_from(body)
            .map_err(|e| StepError::BackendProtocol(format!("{url} reported {e}")))
    }

    async fn request_transition(&self, target: FundingStep) -> Result<FundingStep> {
        let url = self.url("transition");
        debug!("POST {url} targetStep={target}");
        let resp = self
            .authorize(self.client.post(&url))
            .json(&TransitionRequest {
                target_step: target,
            })
            .send()
            .await?;
        let body: TransitionResponse = read_json(ensure_success(resp, &url).await?).await?;

        if !body.success {
            return Err(StepError::BackendRejected(format!(
                "transition to {target} refused"
            )));
        }
        // The move is applied; an unreadable echo is reported as the target.
        match body.current_step.as_deref().map(str::parse::<FundingStep>) {
            Some(Ok(step)) => Ok(step),
            Some(Err(e)) => {
                warn!("Transition to {target} confirmed with unreadable step: {e}");
                Ok(target)
            }
            None => Ok(target),
        }
    }

    async fn request_substep(&self, substep: DashboardSubstep) -> Result<DashboardSubstep> {
        let url = self.url("substep");
        debug!("POST {url} substep={substep}");
        let resp = self
            .authorize(self.client.post(&url))
            .json(&SubstepRequest { substep })
            .send()
            .await?;
        let body: SubstepResponse = read_json(ensure_success(resp, &url).await?).await?;

        if !body.success {
            return Err(StepError::BackendRejected(format!(
                "substep {substep} refused"
            )));
        }
        match body.current_substep.as_deref().map(str::parse::<DashboardSubstep>) {
            Some(Ok(reported)) => Ok(reported),
            Some(Err(e)) => {
                warn!("Substep {substep} confirmed with unreadable substep: {e}");
                Ok(substep)
            }
            None => Ok(substep),
        }
    }
}

/// Turn any non-2xx status into `BackendUnavailable`; no per-code handling.
async fn ensure_success(resp: Response, url: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StepError::BackendUnavailable(format!(
        "{url} returned {status}: {}",
        body.trim()
    )))
}

/// Decode a JSON body; malformed bodies surface as `StepError::Json`.
async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
