//! # Request Module
//!
//! The financial-aid request and its closed set of lifecycle states.

use crate::amount::Amount;
use crate::category::ReviewTrack;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Lifecycle state of an aid request.
///
/// This is the single canonical representation. Storage and the CLI use the
/// snake_case form (`submitted`, `board_reviewed`, `approved`, `rejected`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestState {
    Submitted,
    BoardReviewed,
    Approved,
    Rejected,
}

impl RequestState {
    pub const ALL: [RequestState; 4] = [
        RequestState::Submitted,
        RequestState::BoardReviewed,
        RequestState::Approved,
        RequestState::Rejected,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Approved | RequestState::Rejected)
    }
}

/// Reviewer decision on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

/// Data accompanying a decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionPayload {
    /// Amount to approve (fast track) or to fix at board review.
    #[serde(default)]
    pub amount: Option<rust_decimal::Decimal>,
    /// ID of an attached receipt proving disbursement.
    #[serde(default)]
    pub evidence: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
}

impl DecisionPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_amount(mut self, amount: rust_decimal::Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_evidence(mut self, artifact_id: &str) -> Self {
        self.evidence = Some(artifact_id.to_string());
        self
    }

    pub fn with_remark(mut self, remark: &str) -> Self {
        self.remark = Some(remark.to_string());
        self
    }

    /// Remark with surrounding whitespace removed, `None` when blank.
    pub fn trimmed_remark(&self) -> Option<&str> {
        self.remark
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}

/// One financial-aid application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AidRequest {
    /// Opaque stable ID (REQ-<uuid>)
    pub id: String,
    pub requester_id: String,
    pub category_id: String,
    /// Track assigned at submission; kept for the request's whole life
    pub track: ReviewTrack,
    pub requested_amount: Amount,
    /// Amount fixed by the board on the board track, before disbursement
    pub board_amount: Option<Amount>,
    /// Set only once the request reaches `Approved`
    pub approved_amount: Option<Amount>,
    pub state: RequestState,
    pub justification: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AidRequest {
    /// Create a freshly submitted request.
    pub fn new(
        requester_id: &str,
        category_id: &str,
        track: ReviewTrack,
        requested_amount: Amount,
        justification: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Self::generate_id(),
            requester_id: requester_id.to_string(),
            category_id: category_id.to_string(),
            track,
            requested_amount,
            board_amount: None,
            approved_amount: None,
            state: RequestState::Submitted,
            justification: justification.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn generate_id() -> String {
        format!("REQ-{}", Uuid::new_v4())
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_state_canonical_strings() {
        assert_eq!(RequestState::BoardReviewed.as_ref(), "board_reviewed");
        assert_eq!(
            "approved".parse::<RequestState>().unwrap(),
            RequestState::Approved
        );
        // Legacy spellings are not accepted
        assert!("APPROVED".parse::<RequestState>().is_err());
        assert!("admin_approved".parse::<RequestState>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(RequestState::Approved.is_terminal());
        assert!(RequestState::Rejected.is_terminal());
        assert!(!RequestState::Submitted.is_terminal());
        assert!(!RequestState::BoardReviewed.is_terminal());
    }

    #[test]
    fn test_new_request_starts_submitted() {
        let req = AidRequest::new(
            "STU-001",
            "emergency",
            ReviewTrack::FastTrack,
            Amount::new(dec!(450)).unwrap(),
            "Rent arrears after family emergency",
        );
        assert!(req.id.starts_with("REQ-"));
        assert_eq!(req.state, RequestState::Submitted);
        assert_eq!(req.approved_amount, None);
        assert!(req.is_active);
    }

    #[test]
    fn test_payload_blank_remark() {
        let payload = DecisionPayload::new().with_remark("   ");
        assert_eq!(payload.trimmed_remark(), None);
        let payload = DecisionPayload::new().with_remark("  duplicate  ");
        assert_eq!(payload.trimmed_remark(), Some("duplicate"));
    }
}
