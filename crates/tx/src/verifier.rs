//! The per-transaction verification pipeline.
//!
//! Ordering follows the cheapest-first rule: structural checks, then the
//! nonce (state-cheap, key-independent), then sign bytes and the full
//! authorization walk. `InvalidNonce` therefore takes precedence over any
//! authorization failure class.

use crate::message::Tx;
use punnet_auth::{verify_authorization, AccountGetter};
use punnet_types::account::Account;
use punnet_types::error::TxError;
use std::collections::BTreeSet;

/// Verifies a transaction against the signer's current account state.
///
/// On success returns the primary signer's account as fetched, so the
/// caller can route the nonce increment through the same record. No state
/// is mutated here: the nonce increment happens only after the handlers and
/// effects succeed.
pub fn verify_tx(
    accounts: &dyn AccountGetter,
    chain_id: &str,
    tx: &Tx,
) -> Result<Account, TxError> {
    // 1. Message shape and signer set.
    if tx.msgs.is_empty() {
        return Err(TxError::Invalid("transaction has no messages".into()));
    }
    let mut signers = BTreeSet::new();
    for msg in &tx.msgs {
        msg.validate_basic()?;
        signers.extend(msg.signers());
    }
    if signers.is_empty() {
        return Err(TxError::Invalid("transaction has no signers".into()));
    }
    if let Some(foreign) = signers.iter().find(|s| **s != tx.account) {
        return Err(TxError::Invalid(format!(
            "signer '{}' is not the declared primary account '{}'",
            foreign, tx.account
        )));
    }

    // 2. Primary account must exist.
    let account = accounts
        .get_account(&tx.account)
        .map_err(TxError::State)?;

    // 3. Replay nonce, before any key-dependent work.
    if tx.nonce != account.nonce {
        return Err(TxError::InvalidNonce {
            expected: account.nonce,
            got: tx.nonce,
        });
    }

    // 4. Sign bytes over the canonical document.
    let sign_bytes = tx.sign_bytes(chain_id, account.nonce)?;

    // 5. The recursive authorization walk. The deepest meaningful cause
    //    (e.g. a bad signature several delegation levels down) surfaces
    //    unchanged.
    verify_authorization(accounts, &account, &tx.authorization, &sign_bytes)?;

    tracing::debug!(
        target: "tx",
        account = %tx.account,
        nonce = tx.nonce,
        msgs = tx.msgs.len(),
        "transaction verified"
    );
    Ok(account)
}
