//! Category policy table
//!
//! Every request category resolves to one closed `CategoryPolicy`:
//! which review track it follows, its approval ceiling, and whether
//! disbursement proof is required before approval.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Review track a request follows.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReviewTrack {
    /// General reviewer decides directly: submitted -> approved | rejected
    FastTrack,
    /// Board decides, reviewer disburses: submitted -> board_reviewed -> approved | rejected
    Board,
}

/// Resolved policy for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPolicy {
    #[serde(alias = "id")]
    pub category_id: String,
    pub track: ReviewTrack,
    /// Ceiling for fast-track approvals. `None` means unlimited.
    #[serde(default)]
    pub max_amount: Option<Decimal>,
    #[serde(default = "default_evidence_required")]
    pub evidence_required: bool,
}

fn default_evidence_required() -> bool {
    true
}

impl CategoryPolicy {
    pub fn fast_track(category_id: &str, max_amount: Decimal) -> Self {
        Self {
            category_id: category_id.to_string(),
            track: ReviewTrack::FastTrack,
            max_amount: Some(max_amount),
            evidence_required: true,
        }
    }

    pub fn board(category_id: &str) -> Self {
        Self {
            category_id: category_id.to_string(),
            track: ReviewTrack::Board,
            max_amount: None,
            evidence_required: true,
        }
    }

    pub fn is_board_required(&self) -> bool {
        self.track == ReviewTrack::Board
    }

    /// Whether `amount` is within the approval ceiling.
    ///
    /// The ceiling only binds fast-track categories; board decisions set their own amount.
    pub fn permits(&self, amount: Decimal) -> bool {
        match (self.track, self.max_amount) {
            (ReviewTrack::FastTrack, Some(max)) => amount <= max,
            _ => true,
        }
    }
}
