//! Coin amounts used by transfers and fees.

use crate::error::StateError;
use serde::{Deserialize, Serialize};

/// A single denominated amount.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    /// The denomination, e.g. `"stake"`. Must be non-empty.
    pub denom: String,
    /// The amount in base units.
    pub amount: u64,
}

impl Coin {
    /// Creates a coin.
    pub fn new<S: Into<String>>(denom: S, amount: u64) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    /// Validates the coin: non-empty denomination.
    pub fn validate_basic(&self) -> Result<(), StateError> {
        if self.denom.is_empty() {
            return Err(StateError::InvalidValue("coin denom must be non-empty".into()));
        }
        Ok(())
    }
}

/// True when every coin has a non-empty denomination and a positive amount.
pub fn coins_all_positive(coins: &[Coin]) -> bool {
    !coins.is_empty()
        && coins
            .iter()
            .all(|c| !c.denom.is_empty() && c.amount > 0)
}
