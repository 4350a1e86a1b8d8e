//! Well-known state key prefixes and key builders.
//!
//! These constants are the single source of truth for the backing-store key
//! space. Keys prefixed `module/<module_name>/` are owned by that module's
//! capability; the SDK never writes outside such a prefix.

use crate::account::AccountName;

/// The top-level prefix under which every module's keys live.
pub const MODULE_KEY_PREFIX: &[u8] = b"module/";

/// The sub-prefix for account records inside a module's key space.
pub const ACCOUNT_SUBPREFIX: &[u8] = b"account/";
/// The sub-prefix for balance records inside a module's key space.
pub const BALANCE_SUBPREFIX: &[u8] = b"balance/";
/// The sub-prefix for validator records inside a module's key space.
pub const VALIDATOR_SUBPREFIX: &[u8] = b"validator/";
/// The sub-prefix for delegation records inside a module's key space.
pub const DELEGATION_SUBPREFIX: &[u8] = b"delegation/";

/// Builds the canonical key-space prefix for a module.
///
/// # Example
/// `module_prefix("bank")` -> `b"module/bank/"`
pub fn module_prefix<S: AsRef<str>>(module: S) -> Vec<u8> {
    let mut key = MODULE_KEY_PREFIX.to_vec();
    key.extend_from_slice(module.as_ref().as_bytes());
    key.push(b'/');
    key
}

/// Builds the composite key for a balance record: `"<account>/<denom>"`.
pub fn balance_key(account: &AccountName, denom: &str) -> Vec<u8> {
    format!("{}/{}", account, denom).into_bytes()
}

/// Builds the per-account balance scan prefix: `"<account>/"`.
pub fn balance_account_prefix(account: &AccountName) -> Vec<u8> {
    format!("{}/", account).into_bytes()
}

/// Builds the composite key for a delegation record:
/// `"<delegator>/<hex(validator)>"`.
pub fn delegation_key(delegator: &AccountName, validator: &[u8]) -> Vec<u8> {
    format!("{}/{}", delegator, hex::encode(validator)).into_bytes()
}

/// Builds the per-delegator delegation scan prefix: `"<delegator>/"`.
pub fn delegation_delegator_prefix(delegator: &AccountName) -> Vec<u8> {
    format!("{}/", delegator).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_prefix_shape() {
        assert_eq!(module_prefix("bank"), b"module/bank/".to_vec());
        assert_eq!(module_prefix("auth"), b"module/auth/".to_vec());
    }

    #[test]
    fn composite_keys() {
        let alice = AccountName::new("alice").unwrap();
        assert_eq!(balance_key(&alice, "stake"), b"alice/stake".to_vec());
        assert_eq!(balance_account_prefix(&alice), b"alice/".to_vec());
        assert_eq!(
            delegation_key(&alice, &[0xab, 0xcd]),
            b"alice/abcd".to_vec()
        );
    }
}
