//! Balance records.

use crate::account::AccountName;
use crate::error::StateError;
use serde::{Deserialize, Serialize};

/// The balance of one `(account, denom)` pair.
///
/// Stored under the composite key `"<account>/<denom>"`. A missing record
/// is a zero balance, not an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// The owning account.
    pub account: AccountName,
    /// The denomination. Must be non-empty.
    pub denom: String,
    /// The amount in base units.
    pub amount: u64,
}

impl Balance {
    /// Creates a balance record.
    pub fn new<S: Into<String>>(account: AccountName, denom: S, amount: u64) -> Self {
        Self {
            account,
            denom: denom.into(),
            amount,
        }
    }

    /// The zero balance for an `(account, denom)` pair.
    pub fn zero<S: Into<String>>(account: AccountName, denom: S) -> Self {
        Self::new(account, denom, 0)
    }

    /// Validates the record: non-empty denomination.
    pub fn validate_basic(&self) -> Result<(), StateError> {
        if self.denom.is_empty() {
            return Err(StateError::InvalidValue(
                "balance denom must be non-empty".into(),
            ));
        }
        Ok(())
    }
}
