//! Receipt - evidentiary artifact proving funds were disbursed

use crate::amount::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Receipt status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Active,
    Void,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Active => "active",
            ReceiptStatus::Void => "void",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ReceiptStatus::Active),
            "void" => Some(ReceiptStatus::Void),
            _ => None,
        }
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Proof-of-disbursement document reference.
///
/// The core only keeps the storage locator; file bytes live in the evidence store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// RCP-<uuid>
    pub id: String,
    pub request_id: String,
    pub uploader_id: String,
    pub locator: String,
    pub declared_amount: Option<Amount>,
    pub status: ReceiptStatus,
    pub uploaded_at: DateTime<Utc>,
}

impl Receipt {
    pub fn new(request_id: &str, uploader_id: &str, locator: &str) -> Self {
        Self {
            id: format!("RCP-{}", Uuid::new_v4()),
            request_id: request_id.to_string(),
            uploader_id: uploader_id.to_string(),
            locator: locator.to_string(),
            declared_amount: None,
            status: ReceiptStatus::Active,
            uploaded_at: Utc::now(),
        }
    }

    pub fn with_declared_amount(mut self, amount: Amount) -> Self {
        self.declared_amount = Some(amount);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == ReceiptStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_status_str() {
        assert_eq!(ReceiptStatus::Void.as_str(), "void");
        assert_eq!(ReceiptStatus::from_str("active"), Some(ReceiptStatus::Active));
        assert_eq!(ReceiptStatus::from_str("ACTIVE"), None);
    }

    #[test]
    fn test_new_receipt_is_active() {
        let receipt = Receipt::new("REQ-1", "REV-1", "s3://receipts/abc.pdf");
        assert!(receipt.id.starts_with("RCP-"));
        assert!(receipt.is_active());
        assert_eq!(receipt.declared_amount, None);
    }
}
