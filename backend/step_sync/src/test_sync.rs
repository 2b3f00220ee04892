use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::api_client::{HttpStepBackend, RemoteStep, StepBackend};
use crate::cache::{init_pool, LocalCache};
use crate::errors::{Result, StepError};
use crate::reconciler;
use crate::state::StepState;
use crate::steps::{DashboardSubstep, FundingStep};
use crate::sync::StepSync;

/// In-process backend that records every call it receives.
struct RecordingBackend {
    remote: Mutex<RemoteStep>,
    calls: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingBackend {
    fn at(step: FundingStep, substep: Option<DashboardSubstep>) -> Self {
        Self {
            remote: Mutex::new(RemoteStep { step, substep }),
            calls: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::at(FundingStep::FundingInfo, None)
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail {
            return Err(StepError::BackendUnavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl StepBackend for RecordingBackend {
    async fn fetch_current(&self) -> Result<RemoteStep> {
        self.record("current".into())?;
        Ok(*self.remote.lock().unwrap())
    }

    async fn request_transition(&self, target: FundingStep) -> Result<FundingStep> {
        self.record(format!("transition:{target}"))?;
        self.remote.lock().unwrap().step = target;
        Ok(target)
    }

    async fn request_substep(&self, substep: DashboardSubstep) -> Result<DashboardSubstep> {
        self.record(format!("substep:{substep}"))?;
        self.remote.lock().unwrap().substep = Some(substep);
        Ok(substep)
    }
}

async fn memory_cache() -> LocalCache {
    LocalCache::new(init_pool("sqlite::memory:").await.unwrap())
}

async fn recording_sync(backend: Arc<RecordingBackend>) -> (StepSync, LocalCache) {
    let cache = memory_cache().await;
    (StepSync::new(backend, cache.clone()), cache)
}

async fn http_sync(server: &MockServer) -> (StepSync, LocalCache) {
    let cache = memory_cache().await;
    let backend = HttpStepBackend::new(Client::new(), server.uri(), Some("token".into()));
    (StepSync::new(Arc::new(backend), cache.clone()), cache)
}

async fn mount_current(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/steps/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// ─────────────────────────────────────────────────────────
// End-to-end scenarios
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn first_transition_from_initial_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/steps/transition"))
        .and(body_json(json!({ "targetStep": "ai_calculating" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "currentStep": "ai_calculating" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    let (sync, cache) = http_sync(&server).await;

    let initial = sync.current_state();
    assert_eq!(initial.current_step, FundingStep::FundingInfo);
    assert_eq!(initial.history, vec![FundingStep::FundingInfo]);

    let state = sync
        .transition_to(FundingStep::AiCalculating, None)
        .await
        .unwrap();
    assert_eq!(state.current_step, FundingStep::AiCalculating);
    assert_eq!(state.previous_step, Some(FundingStep::FundingInfo));
    assert_eq!(
        state.history,
        vec![FundingStep::FundingInfo, FundingStep::AiCalculating]
    );
    assert_eq!(sync.current_state(), state);
    assert_eq!(cache.load().await, Some(state));
}

#[tokio::test]
async fn skipping_steps_is_rejected_without_network() {
    let server = MockServer::start().await;
    mount_current(&server, json!({ "currentStep": "documents_supp" })).await;
    Mock::given(method("POST"))
        .and(path("/api/steps/transition"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(0)
        .mount(&server)
        .await;
    let (sync, _) = http_sync(&server).await;
    sync.load_from_backend().await.unwrap();
    let before = sync.current_state();

    let err = sync
        .transition_to(FundingStep::Dashboard, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StepError::InvalidTransition {
            from: FundingStep::DocumentsSupp,
            to: FundingStep::Dashboard,
        }
    ));
    assert_eq!(sync.current_state(), before);
}

#[tokio::test]
async fn substep_update_on_dashboard() {
    let server = MockServer::start().await;
    mount_current(
        &server,
        json!({ "currentStep": "dashboard", "currentSubstep": "withdrawal_available" }),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/steps/substep"))
        .and(body_json(json!({ "substep": "payment_pending" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "currentSubstep": "payment_pending" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    let (sync, _) = http_sync(&server).await;
    let before = sync.load_from_backend().await.unwrap();
    assert_eq!(
        before.current_substep,
        Some(DashboardSubstep::WithdrawalAvailable)
    );

    let state = sync
        .update_substep(DashboardSubstep::PaymentPending)
        .await
        .unwrap();
    assert_eq!(state.current_substep, Some(DashboardSubstep::PaymentPending));
    assert_eq!(state.current_step, FundingStep::Dashboard);
    assert_eq!(state.history, before.history);
    assert_eq!(sync.current_substep(), Some(DashboardSubstep::PaymentPending));
}

#[tokio::test]
async fn backend_reload_reconstructs_history_prefix() {
    let server = MockServer::start().await;
    mount_current(&server, json!({ "currentStep": "select_option" })).await;
    let (sync, cache) = http_sync(&server).await;

    let state = sync.load_from_backend().await.unwrap();
    assert_eq!(
        state.history,
        vec![
            FundingStep::FundingInfo,
            FundingStep::AiCalculating,
            FundingStep::HumanValidationPending,
            FundingStep::SelectOption,
        ]
    );
    assert_eq!(state.previous_step, Some(FundingStep::FundingInfo));
    assert_eq!(cache.load().await, Some(state));
}

// ─────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_targets_never_reach_the_backend() {
    let backend = Arc::new(RecordingBackend::at(FundingStep::FundingInfo, None));
    let (sync, _) = recording_sync(backend.clone()).await;
    let before = sync.current_state();

    for target in FundingStep::ALL
        .into_iter()
        .filter(|t| *t != FundingStep::AiCalculating)
    {
        let err = sync.transition_to(target, None).await.unwrap_err();
        assert!(matches!(err, StepError::InvalidTransition { .. }));
    }
    assert!(backend.calls().is_empty());
    assert_eq!(sync.current_state(), before);
}

#[tokio::test]
async fn substep_outside_dashboard_is_precondition_failed() {
    let backend = Arc::new(RecordingBackend::at(FundingStep::FundingInfo, None));
    let (sync, _) = recording_sync(backend.clone()).await;

    let err = sync
        .update_substep(DashboardSubstep::Suspended)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StepError::PreconditionFailed {
            step: FundingStep::FundingInfo
        }
    ));
    assert!(backend.calls().is_empty());
    assert!(sync.current_substep().is_none());
}

#[tokio::test]
async fn walk_the_whole_pipeline() {
    let backend = Arc::new(RecordingBackend::at(FundingStep::FundingInfo, None));
    let (sync, _) = recording_sync(backend.clone()).await;

    for target in FundingStep::ALL.into_iter().skip(1) {
        let before = sync.current_step();
        let state = sync.transition_to(target, None).await.unwrap();
        assert_eq!(sync.current_step(), target);
        assert_eq!(state.history.last(), Some(&target));
        assert_eq!(state.previous_step, Some(before));
    }

    let state = sync.current_state();
    assert_eq!(state.history, FundingStep::ALL.to_vec());
    assert_eq!(
        state.current_substep,
        Some(DashboardSubstep::WithdrawalAvailable)
    );
    assert_eq!(backend.calls().len(), FundingStep::ALL.len() - 1);

    // Any substep may follow any other.
    for substep in [
        DashboardSubstep::Suspended,
        DashboardSubstep::WithdrawalAvailable,
        DashboardSubstep::WithdrawalPending,
        DashboardSubstep::PaymentPending,
    ] {
        sync.update_substep(substep).await.unwrap();
        assert_eq!(sync.current_substep(), Some(substep));
    }

    // The terminal self-loop is legal and appends to history.
    let again = sync.transition_to(FundingStep::Dashboard, None).await.unwrap();
    assert_eq!(again.history.len(), FundingStep::ALL.len() + 1);
    assert_eq!(again.current_substep, Some(DashboardSubstep::PaymentPending));
}

#[tokio::test]
async fn backend_failure_leaves_store_and_cache_unchanged() {
    let backend = Arc::new(RecordingBackend::failing());
    let (sync, cache) = recording_sync(backend.clone()).await;
    let before = sync.current_state();

    let err = sync
        .transition_to(FundingStep::AiCalculating, None)
        .await
        .unwrap_err();
    assert!(err.is_backend_failure());
    assert!(sync.load_from_backend().await.is_err());

    assert_eq!(backend.calls().len(), 2);
    assert_eq!(sync.current_state(), before);
    assert_eq!(cache.load().await, None);
}

#[tokio::test]
async fn backend_refusal_leaves_store_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/steps/transition"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": false, "currentStep": "funding_info" })),
        )
        .mount(&server)
        .await;
    let (sync, _) = http_sync(&server).await;
    let before = sync.current_state();

    let err = sync
        .transition_to(FundingStep::AiCalculating, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StepError::BackendRejected(_)));
    assert_eq!(sync.current_state(), before);
}

#[tokio::test]
async fn reset_clears_cache_and_restores_initial_step() {
    let backend = Arc::new(RecordingBackend::at(FundingStep::SignatureRequired, None));
    let (sync, cache) = recording_sync(backend).await;
    sync.load_from_backend().await.unwrap();
    assert!(cache.load().await.is_some());

    sync.reset().await;
    assert_eq!(cache.load().await, None);
    assert_eq!(sync.current_step(), FundingStep::FundingInfo);
    assert_eq!(sync.current_state().history, vec![FundingStep::FundingInfo]);
}

#[tokio::test]
async fn restore_prefers_cached_state() {
    let cache = memory_cache().await;
    let cached = StepState::from_backend(
        FundingStep::DocumentsSupp,
        None,
        &StepState::initial(),
    );
    cache.save(&cached).await;

    let backend = Arc::new(RecordingBackend::at(FundingStep::FundingInfo, None));
    let sync = StepSync::restore(backend.clone(), cache.clone()).await;
    assert_eq!(sync.current_state(), cached);
    assert!(backend.calls().is_empty());

    cache.clear().await;
    let sync = StepSync::restore(backend, cache).await;
    assert_eq!(sync.current_step(), FundingStep::FundingInfo);
}

#[tokio::test]
async fn confirmed_transition_with_unreadable_echo_is_committed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/steps/transition"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "currentStep": "AI-CALCULATING" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    let (sync, cache) = http_sync(&server).await;

    let state = sync
        .transition_to(FundingStep::AiCalculating, None)
        .await
        .unwrap();
    assert_eq!(state.current_step, FundingStep::AiCalculating);
    assert_eq!(sync.current_step(), FundingStep::AiCalculating);
    assert_eq!(cache.load().await, Some(state));
}

#[tokio::test]
async fn unknown_step_from_backend_leaves_store_unchanged() {
    let server = MockServer::start().await;
    mount_current(&server, json!({ "currentStep": "limbo" })).await;
    let (sync, cache) = http_sync(&server).await;
    let before = sync.current_state();

    let err = sync.load_from_backend().await.unwrap_err();
    assert!(err.is_backend_failure());
    assert_eq!(sync.current_state(), before);
    assert_eq!(cache.load().await, None);
}

#[tokio::test]
async fn dropped_transition_keeps_store_and_cache_in_step() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/steps/transition"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "currentStep": "ai_calculating" }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;
    let (sync, cache) = http_sync(&server).await;
    let before = sync.current_state();

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        sync.transition_to(FundingStep::AiCalculating, None),
    )
    .await;
    assert!(outcome.is_err());
    assert_eq!(sync.current_state(), before);
    assert_eq!(cache.load().await, None);

    // The slot is released with the dropped future.
    sync.transition_to(FundingStep::AiCalculating, None)
        .await
        .unwrap();
    assert_eq!(cache.load().await, Some(sync.current_state()));
}

#[tokio::test]
async fn restore_ignores_inconsistent_cached_state() {
    let cache = memory_cache().await;
    cache
        .write_raw(
            r#"{"currentStep":"select_option","currentSubstep":"suspended","history":[],
                "timestamp":"2024-01-01T00:00:00Z"}"#,
        )
        .await;

    let backend = Arc::new(RecordingBackend::at(FundingStep::FundingInfo, None));
    let sync = StepSync::restore(backend, cache).await;
    let state = sync.current_state();
    assert_eq!(state.current_step, FundingStep::FundingInfo);
    assert_eq!(state.current_substep, None);
    assert_eq!(state.history, vec![FundingStep::FundingInfo]);
}

#[tokio::test]
async fn second_mutation_while_one_is_in_flight_is_refused() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/steps/transition"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "currentStep": "ai_calculating" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let (sync, _) = http_sync(&server).await;

    let (first, second) = tokio::join!(
        sync.transition_to(FundingStep::AiCalculating, None),
        sync.transition_to(FundingStep::AiCalculating, None),
    );
    assert_eq!(first.unwrap().current_step, FundingStep::AiCalculating);
    assert!(matches!(second, Err(StepError::OperationInFlight)));
    assert_eq!(
        sync.current_state().history,
        vec![FundingStep::FundingInfo, FundingStep::AiCalculating]
    );
}

#[tokio::test]
async fn readers_observe_committed_changes() {
    let backend = Arc::new(RecordingBackend::at(FundingStep::FundingInfo, None));
    let (sync, _) = recording_sync(backend).await;
    let mut reader = sync.reader();
    assert_eq!(reader.latest().current_step, FundingStep::FundingInfo);

    sync.transition_to(FundingStep::AiCalculating, None)
        .await
        .unwrap();
    let seen = reader.changed().await.unwrap();
    assert_eq!(seen.current_step, FundingStep::AiCalculating);
}

#[tokio::test]
async fn reconcile_once_reports_outcome() {
    let ok = Arc::new(RecordingBackend::at(FundingStep::HumanValidationPending, None));
    let (sync, _) = recording_sync(ok).await;
    assert!(reconciler::reconcile_once(&sync).await);
    assert_eq!(sync.current_step(), FundingStep::HumanValidationPending);

    let (sync, _) = recording_sync(Arc::new(RecordingBackend::failing())).await;
    assert!(!reconciler::reconcile_once(&sync).await);
    assert_eq!(sync.current_step(), FundingStep::FundingInfo);
}
