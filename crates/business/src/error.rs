//! Workflow errors
//!
//! One discriminated taxonomy for every failure a caller can observe. The
//! `Display` text is for logs; `remark()` is what a caller gets to see.

use aidfund_core::{Capability, CoreError, RequestState};
use aidfund_persistence::PersistenceError;
use rust_decimal::Decimal;
use serde::Serialize;
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

/// Stable, machine-readable error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    InvalidStateTransition,
    AmountExceedsLimit,
    MissingEvidence,
    MissingRemark,
    AlreadyDecided,
    FinalizationFailed,
    InvalidAmount,
    InvalidSession,
    Storage,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    // === Authorization ===
    #[error("Actor {actor} lacks capability {capability}")]
    Unauthorized { actor: String, capability: Capability },

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    // === Lookup ===
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    // === State machine ===
    #[error("Invalid transition from {from}: {reason}")]
    InvalidStateTransition { from: RequestState, reason: String },

    #[error("Request {0} was already decided by a concurrent reviewer")]
    AlreadyDecided(String),

    // === Payload validation ===
    #[error("Amount {amount} exceeds category limit {limit}")]
    AmountExceedsLimit { amount: Decimal, limit: Decimal },

    #[error("Missing evidence: {0}")]
    MissingEvidence(String),

    #[error("Missing remark: {0}")]
    MissingRemark(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    // === Infrastructure ===
    #[error("Finalization failed for {request_id}: {reason}")]
    FinalizationFailed { request_id: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type alias for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::InvalidSession(_) => ErrorKind::InvalidSession,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidStateTransition { .. } => ErrorKind::InvalidStateTransition,
            Self::AlreadyDecided(_) => ErrorKind::AlreadyDecided,
            Self::AmountExceedsLimit { .. } => ErrorKind::AmountExceedsLimit,
            Self::MissingEvidence(_) => ErrorKind::MissingEvidence,
            Self::MissingRemark(_) => ErrorKind::MissingRemark,
            Self::InvalidAmount(_) => ErrorKind::InvalidAmount,
            Self::FinalizationFailed { .. } => ErrorKind::FinalizationFailed,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Human-readable message safe to show to the caller.
    ///
    /// Infrastructure failures are reduced to a generic sentence; the detail
    /// stays in the logs.
    pub fn remark(&self) -> String {
        match self {
            Self::Unauthorized { capability, .. } => {
                format!("This step requires the {} capability", capability)
            }
            Self::InvalidSession(_) => "The session token is missing, invalid or expired".to_string(),
            Self::NotFound { entity, id } => format!("{} {} does not exist", entity, id),
            Self::InvalidStateTransition { from, reason } => {
                format!("Not allowed while the request is {}: {}", from, reason)
            }
            Self::AlreadyDecided(_) => {
                "Another reviewer decided this request first; reload and try again".to_string()
            }
            Self::AmountExceedsLimit { amount, limit } => {
                format!("Amount {} exceeds the category limit of {}", amount, limit)
            }
            Self::MissingEvidence(msg) | Self::MissingRemark(msg) | Self::InvalidAmount(msg) => {
                msg.clone()
            }
            Self::FinalizationFailed { .. } => {
                "The disbursement could not be recorded, so the decision was not applied".to_string()
            }
            Self::Storage(_) => "The fund store is temporarily unavailable".to_string(),
        }
    }

    pub fn unauthorized(actor: &str, capability: Capability) -> Self {
        Self::Unauthorized {
            actor: actor.to_string(),
            capability,
        }
    }

    pub fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(from: RequestState, reason: impl Into<String>) -> Self {
        Self::InvalidStateTransition {
            from,
            reason: reason.into(),
        }
    }

    pub fn finalization(request_id: &str, reason: impl Into<String>) -> Self {
        Self::FinalizationFailed {
            request_id: request_id.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<PersistenceError> for WorkflowError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound { entity, id } => Self::NotFound {
                entity: match entity.as_str() {
                    "AidRequest" => "Request",
                    "LedgerEntry" => "Ledger entry",
                    "Receipt" => "Receipt",
                    _ => "Record",
                },
                id,
            },
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for WorkflowError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<CoreError> for WorkflowError {
    fn from(err: CoreError) -> Self {
        if err.is_session_error() {
            return Self::InvalidSession(err.to_string());
        }
        match err {
            CoreError::NegativeAmount(_)
            | CoreError::NonPositiveAmount(_)
            | CoreError::InvalidDecimal(_) => {
                Self::InvalidAmount(err.to_string())
            }
            other => Self::Storage(other.to_string()),
        }
    }
}
