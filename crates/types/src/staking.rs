//! Validator and delegation records.

use crate::account::AccountName;
use crate::error::StateError;
use serde::{Deserialize, Serialize};

/// Commission is expressed in basis points; 10000 = 100%.
pub const MAX_COMMISSION_BASIS_POINTS: u64 = 10_000;

/// A validator record, keyed by its consensus public key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// The validator's consensus public key. Must be non-empty.
    #[serde(with = "hex::serde")]
    pub pub_key: Vec<u8>,
    /// The validator's voting power.
    pub power: i64,
    /// The account operating this validator.
    pub delegator: AccountName,
    /// Commission in basis points (0..=10000).
    pub commission: u64,
    /// Whether the validator participates in the active set.
    pub active: bool,
}

impl Validator {
    /// Validates the record.
    pub fn validate_basic(&self) -> Result<(), StateError> {
        if self.pub_key.is_empty() {
            return Err(StateError::InvalidValue(
                "validator pub_key must be non-empty".into(),
            ));
        }
        if self.commission > MAX_COMMISSION_BASIS_POINTS {
            return Err(StateError::InvalidValue(format!(
                "validator commission {} exceeds {} basis points",
                self.commission, MAX_COMMISSION_BASIS_POINTS
            )));
        }
        Ok(())
    }
}

/// A `(pub_key, power)` tuple reported to the consensus driver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    /// The validator's consensus public key.
    #[serde(with = "hex::serde")]
    pub pub_key: Vec<u8>,
    /// The validator's voting power.
    pub power: i64,
}

impl From<&Validator> for ValidatorUpdate {
    fn from(v: &Validator) -> Self {
        Self {
            pub_key: v.pub_key.clone(),
            power: v.power,
        }
    }
}

/// A delegation of shares from an account to a validator.
///
/// Keyed by `"<delegator>/<hex(validator)>"`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// The delegating account.
    pub delegator: AccountName,
    /// The target validator's consensus public key.
    #[serde(with = "hex::serde")]
    pub validator: Vec<u8>,
    /// The delegated shares.
    pub shares: u64,
}

impl Delegation {
    /// Validates the record.
    pub fn validate_basic(&self) -> Result<(), StateError> {
        if self.validator.is_empty() {
            return Err(StateError::InvalidValue(
                "delegation validator must be non-empty".into(),
            ));
        }
        Ok(())
    }
}
