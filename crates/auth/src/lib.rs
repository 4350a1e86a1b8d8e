//! Recursive weighted-threshold authorization verification.
//!
//! An account's [`Authority`] grants weight to direct signatures and to
//! satisfied authorizations of delegated accounts. Verification walks the
//! [`Authorization`] tree, credits weight, and accepts once the account's
//! threshold is reached. The walk is bounded by [`MAX_RECURSION_DEPTH`] and
//! a visited set, so delegation cycles are detected rather than relied on to
//! overflow the stack.

use punnet_crypto::verify_signature;
use punnet_types::account::{Account, AccountName};
use punnet_types::authorization::Authorization;
use punnet_types::error::{AuthError, StateError};
use std::collections::BTreeSet;

/// The hard cap on authorization recursion depth.
pub const MAX_RECURSION_DEPTH: u32 = 10;

/// Resolves account names to accounts during verification.
pub trait AccountGetter {
    /// Fetches the named account; absent accounts are an error.
    fn get_account(&self, name: &AccountName) -> Result<Account, StateError>;
}

/// Verifies `authorization` over `msg` against `account`'s authority.
///
/// Accepts when the credited weight reaches the authority's threshold.
/// Weight is credited by:
/// - each valid direct signature whose public key the authority lists
///   (a duplicate key counts at most once; unknown keys are tolerated and
///   credit nothing; an *invalid* signature aborts with `BadSignature`);
/// - each nested authorization that satisfies the delegated account's own
///   authority (an unsatisfied nested authorization credits nothing; a bad
///   signature, depth overflow, or cycle anywhere below aborts).
pub fn verify_authorization(
    getter: &dyn AccountGetter,
    account: &Account,
    authorization: &Authorization,
    msg: &[u8],
) -> Result<(), AuthError> {
    account
        .authority
        .validate_basic()
        .map_err(|e| AuthError::InvalidAuthority(e.to_string()))?;
    let mut visited = BTreeSet::new();
    verify_at_depth(getter, account, authorization, msg, 0, &mut visited)
}

fn verify_at_depth(
    getter: &dyn AccountGetter,
    account: &Account,
    authorization: &Authorization,
    msg: &[u8],
    depth: u32,
    visited: &mut BTreeSet<AccountName>,
) -> Result<(), AuthError> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(AuthError::MaxRecursionDepth(depth));
    }
    if visited.contains(&account.name) {
        return Err(AuthError::CycleDetected(account.name.to_string()));
    }

    let mut weight: u128 = 0;
    let mut credited_keys = BTreeSet::new();

    for sig in &authorization.signatures {
        // An invalid signature is evidence of a malformed authorization and
        // aborts; it is never silently skipped.
        verify_signature(sig.pub_key.as_bytes(), msg, &sig.signature)?;

        if let Some(key_weight) = account.authority.key_weights.get(&sig.pub_key) {
            if credited_keys.insert(sig.pub_key.clone()) {
                weight += u128::from(*key_weight);
            }
        }
        // A valid signature from a key the authority does not list is
        // tolerated and credits nothing.
    }

    for (name, sub_authorization) in &authorization.account_authorizations {
        let Some(account_weight) = account.authority.account_weights.get(name) else {
            // Not a delegate of this authority; no weight credit.
            continue;
        };

        let sub_account = getter.get_account(name)?;
        visited.insert(account.name.clone());
        let outcome = verify_at_depth(
            getter,
            &sub_account,
            sub_authorization,
            msg,
            depth + 1,
            visited,
        );
        visited.remove(&account.name);

        match outcome {
            Ok(()) => weight += u128::from(*account_weight),
            Err(AuthError::InsufficientWeight { .. }) => {
                tracing::debug!(
                    target: "auth",
                    account = %name,
                    "nested authorization below threshold; crediting zero"
                );
            }
            Err(fatal) => return Err(fatal),
        }
    }

    if weight >= u128::from(account.authority.threshold) {
        Ok(())
    } else {
        Err(AuthError::InsufficientWeight {
            have: weight.min(u128::from(u64::MAX)) as u64,
            need: account.authority.threshold,
        })
    }
}
