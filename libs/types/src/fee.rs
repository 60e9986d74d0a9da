//! Commission calculation
//!
//! A flat commission of 1.5% of traded volume is charged to the buyer on
//! every match.

use crate::numeric::{Amount, NumericError};

/// Commission rate applied to trade volume (1.5%).
pub fn commission_rate() -> Amount {
    Amount::from_scaled(1_500_000).unwrap()
}

/// Commission owed on a trade of the given volume, truncated to eight digits.
pub fn commission_on(volume: Amount) -> Result<Amount, NumericError> {
    volume.checked_mul(commission_rate())
}
