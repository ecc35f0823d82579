//! Status log - immutable audit record of one accepted transition

use crate::request::RequestState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One audit record per accepted transition.
///
/// Entries are keyed by `(request_id, sequence)`; the sequence is assigned
/// inside the transition's transaction, so ordering follows commit order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLogEntry {
    pub request_id: String,
    pub sequence: i64,
    pub previous_state: RequestState,
    pub new_state: RequestState,
    pub actor_id: String,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StatusLogEntry {
    pub fn is_terminal(&self) -> bool {
        self.new_state.is_terminal()
    }
}
