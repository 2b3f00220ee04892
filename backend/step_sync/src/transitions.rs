//! Static adjacency table for the funding pipeline.
//!
//! Each step lists the steps reachable from it in one hop. Anything not
//! listed is rejected, including backward moves, skips and self-loops other
//! than `dashboard -> dashboard`.
//!
//! Dashboard substeps have no table: any substep may follow any other.

use crate::steps::FundingStep;

use FundingStep::*;

const TRANSITIONS: [(FundingStep, &[FundingStep]); 8] = [
    (FundingInfo, &[AiCalculating]),
    (AiCalculating, &[HumanValidationPending]),
    (HumanValidationPending, &[SelectOption]),
    (SelectOption, &[DocumentsSupp]),
    (DocumentsSupp, &[SignatureRequired]),
    (SignatureRequired, &[FundingUnlocked]),
    (FundingUnlocked, &[Dashboard]),
    (Dashboard, &[Dashboard]),
];

/// Steps reachable from `from` in one hop.
pub fn next_steps(from: FundingStep) -> &'static [FundingStep] {
    TRANSITIONS
        .iter()
        .find(|(step, _)| *step == from)
        .map(|(_, next)| *next)
        .unwrap_or(&[])
}

/// Whether `from -> to` is listed in the table.
pub fn is_valid_transition(from: FundingStep, to: FundingStep) -> bool {
    next_steps(from).contains(&to)
}
