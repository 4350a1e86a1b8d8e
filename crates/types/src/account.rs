//! Accounts, account names, and the account authority model.

use crate::authorization::PubKeyBytes;
use crate::error::StateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The maximum length of an account name in bytes.
pub const MAX_ACCOUNT_NAME_LEN: usize = 63;

/// A validated account name.
///
/// Names are 1–63 characters of lowercase ASCII letters, digits, `.` and
/// `-`. Invalid names are rejected at every boundary, so holding an
/// `AccountName` is proof of validity.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountName(String);

impl AccountName {
    /// Validates and wraps an account name.
    pub fn new<S: Into<String>>(name: S) -> Result<Self, StateError> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_ACCOUNT_NAME_LEN {
            return Err(StateError::InvalidAccount(format!(
                "account name must be 1-{} characters, got {}",
                MAX_ACCOUNT_NAME_LEN,
                name.len()
            )));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '.' || *c == '-'))
        {
            return Err(StateError::InvalidAccount(format!(
                "account name '{}' contains invalid character '{}'",
                name, c
            )));
        }
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the name as raw bytes, the form used for store keys.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountName({})", self.0)
    }
}

impl TryFrom<String> for AccountName {
    type Error = StateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for AccountName {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<AccountName> for String {
    fn from(name: AccountName) -> Self {
        name.0
    }
}

/// The signing policy of an account: a weighted threshold over keys and
/// delegated accounts.
///
/// Invariant: `threshold >= 1`, every weight `>= 1`, and the threshold never
/// exceeds the sum of all weights (an unsatisfiable authority is rejected).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    /// The minimum total weight required to authorize a message.
    pub threshold: u64,
    /// Weight contributed by a valid signature from each listed public key.
    pub key_weights: BTreeMap<PubKeyBytes, u64>,
    /// Weight contributed by a satisfied authorization of each listed account.
    pub account_weights: BTreeMap<AccountName, u64>,
}

impl Authority {
    /// Builds a single-key authority: threshold 1, one key with weight 1.
    pub fn single_key<K: Into<PubKeyBytes>>(pub_key: K) -> Self {
        let mut key_weights = BTreeMap::new();
        key_weights.insert(pub_key.into(), 1);
        Self {
            threshold: 1,
            key_weights,
            account_weights: BTreeMap::new(),
        }
    }

    /// The sum of all key and account weights.
    pub fn total_weight(&self) -> u128 {
        let keys: u128 = self.key_weights.values().map(|w| u128::from(*w)).sum();
        let accounts: u128 = self.account_weights.values().map(|w| u128::from(*w)).sum();
        keys + accounts
    }

    /// Validates the authority invariants.
    pub fn validate_basic(&self) -> Result<(), StateError> {
        if self.threshold == 0 {
            return Err(StateError::InvalidValue(
                "authority threshold must be at least 1".into(),
            ));
        }
        if self.key_weights.is_empty() && self.account_weights.is_empty() {
            return Err(StateError::InvalidValue(
                "authority must list at least one key or account".into(),
            ));
        }
        if self.key_weights.values().any(|w| *w == 0)
            || self.account_weights.values().any(|w| *w == 0)
        {
            return Err(StateError::InvalidValue(
                "authority weights must be at least 1".into(),
            ));
        }
        if self.key_weights.keys().any(|k| k.is_empty()) {
            return Err(StateError::InvalidValue(
                "authority keys must be non-empty".into(),
            ));
        }
        if u128::from(self.threshold) > self.total_weight() {
            return Err(StateError::InvalidValue(format!(
                "authority threshold {} exceeds total weight {}",
                self.threshold,
                self.total_weight()
            )));
        }
        Ok(())
    }
}

/// An on-chain account: a name, its signing authority, and its replay nonce.
///
/// The nonce is owned by the authentication subsystem and is incremented
/// only after a transaction naming this account as signer is accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// The unique account name.
    pub name: AccountName,
    /// The account's signing policy.
    pub authority: Authority,
    /// The monotonically increasing replay counter.
    pub nonce: u64,
}

impl Account {
    /// Creates a fresh account with a single-key authority and nonce 0.
    pub fn new_single_key<K: Into<PubKeyBytes>>(name: AccountName, pub_key: K) -> Self {
        Self {
            name,
            authority: Authority::single_key(pub_key),
            nonce: 0,
        }
    }

    /// Validates the account record.
    pub fn validate_basic(&self) -> Result<(), StateError> {
        self.authority
            .validate_basic()
            .map_err(|e| StateError::InvalidAccount(format!("{}: {}", self.name, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        for name in ["a", "alice", "a-b.c", "node-0", "x".repeat(63).as_str()] {
            assert!(AccountName::new(name).is_ok(), "expected '{}' valid", name);
        }
    }

    #[test]
    fn invalid_names() {
        for name in ["", "Alice", "under_score", "sp ace", "x".repeat(64).as_str(), "emoji🦀"] {
            assert!(AccountName::new(name).is_err(), "expected '{}' invalid", name);
        }
    }

    #[test]
    fn name_roundtrips_through_serde_as_string() {
        let name = AccountName::new("alice").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"alice\"");
        let back: AccountName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
        assert!(serde_json::from_str::<AccountName>("\"BAD\"").is_err());
    }

    #[test]
    fn authority_invariants() {
        let key = PubKeyBytes::from(vec![1u8; 32]);
        let auth = Authority::single_key(key.clone());
        assert!(auth.validate_basic().is_ok());

        let empty = Authority {
            threshold: 1,
            key_weights: BTreeMap::new(),
            account_weights: BTreeMap::new(),
        };
        assert!(empty.validate_basic().is_err());

        let zero_threshold = Authority {
            threshold: 0,
            ..Authority::single_key(key.clone())
        };
        assert!(zero_threshold.validate_basic().is_err());

        let unsatisfiable = Authority {
            threshold: 5,
            ..Authority::single_key(key)
        };
        assert!(unsatisfiable.validate_basic().is_err());
    }

    #[test]
    fn account_validation_names_the_account() {
        let mut acc = Account::new_single_key(
            AccountName::new("alice").unwrap(),
            vec![1u8; 32],
        );
        acc.authority.threshold = 0;
        let err = acc.validate_basic().unwrap_err();
        assert!(err.to_string().contains("alice"));
    }
}
