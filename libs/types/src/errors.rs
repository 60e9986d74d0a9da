//! Error taxonomy for the trading engine
//!
//! Business and state errors are values, never panics; only genuinely
//! unexpected invariant violations surface as `Internal`.

use crate::audit::EntityKind;
use crate::ids::{OrderId, Symbol};
use crate::numeric::{Amount, NumericError};
use crate::order::OrderStatus;
use thiserror::Error;

/// Input-shape and range violations, reported verbatim to clients.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("unsupported symbol: {0}")]
    UnsupportedSymbol(String),

    #[error("unsupported side: {0}")]
    UnsupportedSide(String),

    #[error("price must be positive")]
    NonPositivePrice,

    #[error("amount must be positive")]
    NonPositiveAmount,

    #[error("invalid {field}: {source}")]
    Numeric {
        field: &'static str,
        source: NumericError,
    },

    #[error("email already registered: {0}")]
    EmailTaken(String),

    #[error("{0}")]
    Other(String),
}

/// Top-level engine error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Amount, available: Amount },

    #[error("insufficient {symbol} available: required {required}, available {available}")]
    InsufficientAssets {
        symbol: Symbol,
        required: Amount,
        available: Amount,
    },

    #[error("insufficient {symbol} locked: required {required}, locked {locked}")]
    InsufficientLocked {
        symbol: Symbol,
        required: Amount,
        locked: Amount,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("order {order_id} belongs to another user")]
    OwnershipViolation { order_id: OrderId },

    #[error("order {order_id} is {status}, expected open")]
    IllegalState {
        order_id: OrderId,
        status: OrderStatus,
    },

    #[error("partial matches are not supported: buy amount {buy_amount} != sell amount {sell_amount}")]
    UnsupportedPartialMatch {
        buy_amount: Amount,
        sell_amount: Amount,
    },

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Whether a client may retry the operation unchanged.
    pub fn is_retriable(&self) -> bool {
        matches!(self, EngineError::Transient(_))
    }
}

// Arithmetic failures past input validation are engine bugs, not user errors.
impl From<NumericError> for EngineError {
    fn from(err: NumericError) -> Self {
        EngineError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_balance_display() {
        let err = EngineError::InsufficientBalance {
            required: Amount::from_units(101),
            available: Amount::from_units(100),
        };
        assert_eq!(
            err.to_string(),
            "insufficient balance: required 101.00000000, available 100.00000000"
        );
    }

    #[test]
    fn test_validation_error_wraps() {
        let err: EngineError = ValidationError::UnsupportedSymbol("DOGE".into()).into();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(err.to_string().contains("DOGE"));
    }

    #[test]
    fn test_numeric_error_is_internal() {
        let err: EngineError = NumericError::Overflow.into();
        assert!(matches!(err, EngineError::Internal(_)));
    }

    #[test]
    fn test_only_transient_is_retriable() {
        assert!(EngineError::Transient("lock wait timed out".into()).is_retriable());
        assert!(!EngineError::Internal("bug".into()).is_retriable());
    }
}
