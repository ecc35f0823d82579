//! # Ledger Module
//!
//! Signed monetary movements of the welfare fund and the balance derived from them.

use crate::amount::Amount;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Ledger category used for request disbursements.
pub const DISBURSEMENT_CATEGORY: &str = "aid-disbursement";

/// Direction of a fund movement.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Inflow,
    Outflow,
}

impl Direction {
    /// Apply this direction's sign to an amount.
    pub fn signed(&self, amount: Amount) -> Decimal {
        match self {
            Direction::Inflow => amount.value(),
            Direction::Outflow => -amount.value(),
        }
    }
}

/// Entry to be appended. The store assigns sequence and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub id: String,
    pub direction: Direction,
    pub amount: Amount,
    pub category: String,
    pub request_id: Option<String>,
    pub actor_id: String,
    pub description: String,
}

impl NewLedgerEntry {
    pub fn new(direction: Direction, amount: Amount, category: &str, actor_id: &str) -> Self {
        Self {
            id: format!("LED-{}", Uuid::new_v4()),
            direction,
            amount,
            category: category.to_string(),
            request_id: None,
            actor_id: actor_id.to_string(),
            description: String::new(),
        }
    }

    /// Outflow paying out an approved request.
    pub fn disbursement(request_id: &str, amount: Amount, actor_id: &str) -> Self {
        Self::new(Direction::Outflow, amount, DISBURSEMENT_CATEGORY, actor_id)
            .with_request(request_id)
            .with_description(&format!("Aid disbursement for {}", request_id))
    }

    pub fn with_request(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// One immutable signed monetary movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Creation order within the store
    pub seq: i64,
    pub id: String,
    pub direction: Direction,
    pub amount: Amount,
    pub category: String,
    pub request_id: Option<String>,
    pub actor_id: String,
    pub description: String,
    /// Advisory snapshot filled in by the balance materializer
    pub balance_after: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn signed_amount(&self) -> Decimal {
        self.direction.signed(self.amount)
    }
}

/// Materialized fund balance. A cache over the ledger, never an independent fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundBalance {
    /// Sum(inflow) - Sum(outflow); may go negative if the fund is overdrawn
    pub current_balance: Decimal,
    /// Highest ledger sequence folded into `current_balance`
    pub last_entry_seq: i64,
    /// Number of recomputations performed
    pub revision: i64,
    pub recomputed_at: DateTime<Utc>,
    pub recomputed_by: String,
}

/// Fold entries into a starting balance.
pub fn aggregate<'a, I>(start: Decimal, entries: I) -> Decimal
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    entries
        .into_iter()
        .fold(start, |acc, entry| acc + entry.signed_amount())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(seq: i64, direction: Direction, amount: Decimal) -> LedgerEntry {
        LedgerEntry {
            seq,
            id: format!("LED-{}", seq),
            direction,
            amount: Amount::positive(amount).unwrap(),
            category: "donation".to_string(),
            request_id: None,
            actor_id: "TRE-1".to_string(),
            description: String::new(),
            balance_after: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_direction_sign() {
        let amount = Amount::new(dec!(100)).unwrap();
        assert_eq!(Direction::Inflow.signed(amount), dec!(100));
        assert_eq!(Direction::Outflow.signed(amount), dec!(-100));
        assert_eq!(Direction::Outflow.to_string(), "outflow");
    }

    #[test]
    fn test_aggregate() {
        let entries = vec![
            entry(1, Direction::Inflow, dec!(1000)),
            entry(2, Direction::Outflow, dec!(400)),
            entry(3, Direction::Inflow, dec!(50.25)),
        ];
        assert_eq!(aggregate(Decimal::ZERO, &entries), dec!(650.25));
        assert_eq!(aggregate(dec!(10), &entries[1..]), dec!(-339.75));
    }

    #[test]
    fn test_disbursement_entry() {
        let new = NewLedgerEntry::disbursement("REQ-1", Amount::new(dec!(400)).unwrap(), "REV-1");
        assert_eq!(new.direction, Direction::Outflow);
        assert_eq!(new.category, DISBURSEMENT_CATEGORY);
        assert_eq!(new.request_id.as_deref(), Some("REQ-1"));
        assert!(new.id.starts_with("LED-"));
    }
}
