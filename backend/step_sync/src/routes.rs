//! Page routes for each step, and the redirect decision a page guard makes
//! before rendering.

use crate::state::StepState;
use crate::steps::{DashboardSubstep, FundingStep};

/// Route of the page that renders `step` (and, at the dashboard, `substep`).
pub fn route_for(step: FundingStep, substep: Option<DashboardSubstep>) -> &'static str {
    match step {
        FundingStep::FundingInfo => "/funding/info",
        FundingStep::AiCalculating => "/funding/ai-calculating",
        FundingStep::HumanValidationPending => "/funding/validation-pending",
        FundingStep::SelectOption => "/funding/select-option",
        FundingStep::DocumentsSupp => "/funding/documents",
        FundingStep::SignatureRequired => "/funding/signature",
        FundingStep::FundingUnlocked => "/funding/unlocked",
        FundingStep::Dashboard => match substep.unwrap_or_default() {
            DashboardSubstep::WithdrawalAvailable => "/dashboard",
            DashboardSubstep::PaymentPending => "/dashboard/payment-pending",
            DashboardSubstep::WithdrawalPending => "/dashboard/withdrawal-pending",
            DashboardSubstep::Suspended => "/dashboard/suspended",
        },
    }
}

/// Step whose page lives at `route`, ignoring query string and trailing slash.
pub fn step_for_route(route: &str) -> Option<FundingStep> {
    let path = normalize(route);
    if path == "/dashboard" || path.starts_with("/dashboard/") {
        return Some(FundingStep::Dashboard);
    }
    FundingStep::ALL
        .into_iter()
        .find(|step| route_for(*step, None) == path)
}

/// Where a guard should send the user asking for `requested`, or `None` when
/// that page is the one `state` calls for.
pub fn redirect_for(state: &StepState, requested: &str) -> Option<&'static str> {
    let expected = route_for(state.current_step, state.current_substep);
    if normalize(requested) == expected {
        None
    } else {
        Some(expected)
    }
}

fn normalize(route: &str) -> &str {
    let path = route.split(['?', '#']).next().unwrap_or(route);
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}
