//! Funding pipeline steps and dashboard substeps.
//!
//! The pipeline is a linear chain ending in a terminal `dashboard` step:
//!
//! ```text
//! funding_info ─► ai_calculating ─► human_validation_pending ─► select_option
//!      ─► documents_supp ─► signature_required ─► funding_unlocked ─► dashboard ─┐
//!                                                                        ▲──────┘
//! ```
//!
//! Both enums travel as lowercase snake_case strings, on the wire and in the
//! local cache.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::StepError;

/// One stage of the funding pipeline, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingStep {
    /// Revenue and company information submission.
    FundingInfo,
    /// Automated analysis of the submitted revenue.
    AiCalculating,
    /// Waiting on an analyst to confirm the automated result.
    HumanValidationPending,
    /// Offer selection.
    SelectOption,
    /// Supplementary document upload.
    DocumentsSupp,
    /// Contract signature.
    SignatureRequired,
    /// Funds released to the user.
    FundingUnlocked,
    /// Terminal step; only substep changes apply from here.
    Dashboard,
}

impl FundingStep {
    /// Every step, in pipeline order.
    pub const ALL: [FundingStep; 8] = [
        Self::FundingInfo,
        Self::AiCalculating,
        Self::HumanValidationPending,
        Self::SelectOption,
        Self::DocumentsSupp,
        Self::SignatureRequired,
        Self::FundingUnlocked,
        Self::Dashboard,
    ];

    /// Zero-based position in the pipeline.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The step following this one in the pipeline. `dashboard` is its own successor.
    pub fn successor(self) -> FundingStep {
        Self::ALL
            .get(self.index() + 1)
            .copied()
            .unwrap_or(Self::Dashboard)
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Dashboard
    }

    /// Wire identifier, e.g. `"select_option"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FundingInfo => "funding_info",
            Self::AiCalculating => "ai_calculating",
            Self::HumanValidationPending => "human_validation_pending",
            Self::SelectOption => "select_option",
            Self::DocumentsSupp => "documents_supp",
            Self::SignatureRequired => "signature_required",
            Self::FundingUnlocked => "funding_unlocked",
            Self::Dashboard => "dashboard",
        }
    }

    /// Human-readable label for progress displays.
    pub fn label(self) -> &'static str {
        match self {
            Self::FundingInfo => "Funding information",
            Self::AiCalculating => "Analysis in progress",
            Self::HumanValidationPending => "Awaiting validation",
            Self::SelectOption => "Choose your offer",
            Self::DocumentsSupp => "Supporting documents",
            Self::SignatureRequired => "Signature",
            Self::FundingUnlocked => "Funds unlocked",
            Self::Dashboard => "Dashboard",
        }
    }
}

impl fmt::Display for FundingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FundingStep {
    type Err = StepError;

    /// Case-insensitive: `select_option` and `SELECT_OPTION` both parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|step| step.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| StepError::UnknownStep(s.to_string()))
    }
}

/// Withdrawal/payment status, meaningful only while the pipeline is at `dashboard`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardSubstep {
    /// Set on first entry to the dashboard.
    #[default]
    WithdrawalAvailable,
    PaymentPending,
    WithdrawalPending,
    Suspended,
}

impl DashboardSubstep {
    pub const ALL: [DashboardSubstep; 4] = [
        Self::WithdrawalAvailable,
        Self::PaymentPending,
        Self::WithdrawalPending,
        Self::Suspended,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WithdrawalAvailable => "withdrawal_available",
            Self::PaymentPending => "payment_pending",
            Self::WithdrawalPending => "withdrawal_pending",
            Self::Suspended => "suspended",
        }
    }
}

impl fmt::Display for DashboardSubstep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DashboardSubstep {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|substep| substep.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| StepError::UnknownSubstep(s.to_string()))
    }
}
