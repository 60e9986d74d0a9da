//! Fixed-point decimal arithmetic for prices, quantities and balances
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! Every value carries exactly eight fractional digits: addition, subtraction
//! and comparison are exact, multiplication truncates toward zero back to
//! eight digits, and overflow is detected rather than wrapped.

use rust_decimal::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of fractional digits carried by every [`Amount`].
pub const SCALE: u32 = 8;

/// Arithmetic and parsing failures for [`Amount`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumericError {
    #[error("invalid decimal literal: {0}")]
    Invalid(String),

    #[error("negative values are not permitted")]
    Negative,

    #[error("more than eight fractional digits")]
    ExcessPrecision,

    #[error("decimal overflow")]
    Overflow,
}

/// Non-negative fixed-point decimal with exactly eight fractional digits.
///
/// Used for prices, order amounts, balances, trade volumes and commissions.
/// Serialized as a string to prevent JSON number precision loss; the string
/// form always shows all eight fractional digits (`"50000.00000000"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(Decimal);

impl Amount {
    // Zero already at the canonical scale, so it formats as "0.00000000"
    // like every other value.
    pub const ZERO: Amount = Amount(Decimal::from_parts(0, 0, 0, false, SCALE));

    /// Parse a decimal string, rejecting negatives and excess precision.
    pub fn parse(s: &str) -> Result<Self, NumericError> {
        let value = Decimal::from_str_exact(s.trim())
            .map_err(|_| NumericError::Invalid(s.to_string()))?;
        Self::try_from_decimal(value)
    }

    /// Wrap a raw decimal, enforcing the sign and precision bounds.
    pub fn try_from_decimal(value: Decimal) -> Result<Self, NumericError> {
        if value.is_zero() {
            return Self::rescaled(Decimal::ZERO);
        }
        if value.is_sign_negative() {
            return Err(NumericError::Negative);
        }
        if value.scale() > SCALE {
            return Err(NumericError::ExcessPrecision);
        }
        Self::rescaled(value)
    }

    /// Whole units (for seed constants and tests).
    pub fn from_units(units: u64) -> Self {
        let mut value = Decimal::from(units);
        value.rescale(SCALE);
        debug_assert_eq!(value.scale(), SCALE);
        Self(value)
    }

    /// Value expressed in 1e-8 units, e.g. `from_scaled(1_500_000)` is 0.015.
    pub fn from_scaled(units: i64) -> Result<Self, NumericError> {
        Self::try_from_decimal(Decimal::new(units, SCALE))
    }

    /// Exact addition; overflow is an error.
    pub fn checked_add(self, rhs: Self) -> Result<Self, NumericError> {
        let sum = self.0.checked_add(rhs.0).ok_or(NumericError::Overflow)?;
        Self::rescaled(sum)
    }

    /// Exact subtraction; a negative result is an error.
    pub fn checked_sub(self, rhs: Self) -> Result<Self, NumericError> {
        let diff = self.0.checked_sub(rhs.0).ok_or(NumericError::Overflow)?;
        if diff.is_sign_negative() && !diff.is_zero() {
            return Err(NumericError::Negative);
        }
        Self::rescaled(diff)
    }

    /// Multiplication, truncated toward zero back to eight fractional digits.
    pub fn checked_mul(self, rhs: Self) -> Result<Self, NumericError> {
        let product = self.0.checked_mul(rhs.0).ok_or(NumericError::Overflow)?;
        Self::rescaled(product.round_dp_with_strategy(SCALE, RoundingStrategy::ToZero))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        !self.0.is_zero() && !self.0.is_sign_negative()
    }

    /// Get the inner decimal value.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    fn rescaled(mut value: Decimal) -> Result<Self, NumericError> {
        value.rescale(SCALE);
        // rescale leaves the scale unchanged when the mantissa cannot hold it
        if value.scale() != SCALE {
            return Err(NumericError::Overflow);
        }
        Ok(Self(value))
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::ZERO
    }
}

// All eight fractional digits, even for values that never went through the
// checked constructors.
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = self.0;
        value.rescale(SCALE);
        write!(f, "{}", value)
    }
}

// Custom serialization to preserve precision on the wire
impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Amount::parse(&s).map_err(serde::de::Error::custom)
    }
}
