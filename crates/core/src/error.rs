//! # Error Module
//!
//! Domain errors for values that can be validated without storage.

use rust_decimal::Decimal;
use thiserror::Error;

/// Core domain errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    // === Money errors ===
    #[error("Amount cannot be negative: {0}")]
    NegativeAmount(Decimal),

    #[error("Amount must be greater than zero: {0}")]
    NonPositiveAmount(Decimal),

    #[error("Invalid decimal value: {0}")]
    InvalidDecimal(String),

    // === Enum parsing ===
    #[error("Invalid {field} value: {value}")]
    InvalidEnumValue { field: &'static str, value: String },

    // === Session errors ===
    #[error("Malformed session token: {0}")]
    MalformedSession(String),

    #[error("Session signature rejected")]
    BadSessionSignature,

    #[error("Session expired at {0}")]
    SessionExpired(chrono::DateTime<chrono::Utc>),

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),
}

/// Result type alias with CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn invalid_enum(field: &'static str, value: &str) -> Self {
        Self::InvalidEnumValue {
            field,
            value: value.to_string(),
        }
    }

    pub fn is_session_error(&self) -> bool {
        matches!(
            self,
            CoreError::MalformedSession(_)
                | CoreError::BadSessionSignature
                | CoreError::SessionExpired(_)
        )
    }
}
