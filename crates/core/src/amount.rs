//! Amount - Non-negative decimal wrapper for fund amounts
//!
//! Requested, approved, and ledger amounts are never negative.
//! Ledger entries additionally require a strictly positive amount (`Amount::positive`).

use crate::error::CoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A non-negative decimal amount.
///
/// # Invariant
/// The inner value is always >= 0. This is enforced by the constructors.
///
/// # Example
/// ```
/// use aidfund_core::Amount;
/// use rust_decimal::Decimal;
///
/// let amount = Amount::new(Decimal::new(400, 0)).unwrap();
/// assert_eq!(amount.value(), Decimal::new(400, 0));
/// assert!(Amount::new(Decimal::new(-1, 0)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new Amount, rejecting negative values.
    pub fn new(value: Decimal) -> Result<Self, CoreError> {
        if value < Decimal::ZERO {
            Err(CoreError::NegativeAmount(value))
        } else {
            Ok(Self(value))
        }
    }

    /// Create an Amount that must be strictly greater than zero.
    pub fn positive(value: Decimal) -> Result<Self, CoreError> {
        if value <= Decimal::ZERO {
            Err(CoreError::NonPositiveAmount(value))
        } else {
            Ok(Self(value))
        }
    }

    #[inline]
    pub const fn value(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(&self, other: &Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = CoreError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl FromStr for Amount {
    type Err = CoreError;

    /// Parse from the TEXT representation used in storage
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s).map_err(|e| CoreError::InvalidDecimal(e.to_string()))?;
        Self::new(value)
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_rejects_negative() {
        assert!(matches!(
            Amount::new(dec!(-0.01)),
            Err(CoreError::NegativeAmount(_))
        ));
        assert!(Amount::new(Decimal::ZERO).unwrap().is_zero());
    }

    #[test]
    fn test_positive_rejects_zero() {
        assert!(matches!(
            Amount::positive(Decimal::ZERO),
            Err(CoreError::NonPositiveAmount(_))
        ));
        assert_eq!(Amount::positive(dec!(12.50)).unwrap().value(), dec!(12.50));
    }

    #[test]
    fn test_parse_from_storage_text() {
        let amount: Amount = "400.00".parse().unwrap();
        assert_eq!(amount.value(), dec!(400));
        assert!("abc".parse::<Amount>().is_err());
        assert!("-5".parse::<Amount>().is_err());
    }

    #[test]
    fn test_serde_uses_string() {
        let amount = Amount::new(dec!(123.45)).unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"123.45\"");
        let parsed: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, amount);
    }
}
