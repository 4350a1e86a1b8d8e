//! Reified state mutations emitted by message handlers.
//!
//! Effects are the only means by which a handler mutates state: the handler
//! returns a list, and the runtime applies them in order through the
//! capability stores. This keeps handlers pure functions of
//! `(context, message)` plus read access.

use crate::account::AccountName;
use crate::coin::Coin;
use crate::staking::{Delegation, Validator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single reified mutation.
///
/// Each variant maps to a store tag the runtime routes on; the tag is
/// exposed by [`Effect::store_tag`] for logging and event purposes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Write a validator record.
    SetValidator(Validator),
    /// Write a delegation record.
    SetDelegation(Delegation),
    /// Delete a delegation record.
    DeleteDelegation {
        /// The delegating account.
        delegator: AccountName,
        /// The target validator's consensus public key.
        #[serde(with = "hex::serde")]
        validator: Vec<u8>,
    },
    /// Credit an `(account, denom)` balance. Rejects on u64 overflow.
    AddBalance {
        /// The credited account.
        account: AccountName,
        /// The denomination.
        denom: String,
        /// The amount to add.
        amount: u64,
    },
    /// Debit an `(account, denom)` balance. Rejects with insufficient funds
    /// when the current amount is less than the subtrahend.
    SubBalance {
        /// The debited account.
        account: AccountName,
        /// The denomination.
        denom: String,
        /// The amount to subtract.
        amount: u64,
    },
    /// Move coins between accounts: for each coin, a debit of `from`
    /// followed by a credit of `to`. Rollback of completed sub-steps on
    /// failure is best-effort; serialization is the runtime's responsibility.
    Transfer {
        /// The debited account.
        from: AccountName,
        /// The credited account.
        to: AccountName,
        /// The coins to move.
        coins: Vec<Coin>,
    },
    /// Append an event to the block's event log. Attributes are emitted in
    /// sorted key order.
    Event {
        /// The event type, e.g. `"bank.send"`.
        kind: String,
        /// Event attributes; the map keeps keys sorted.
        attrs: BTreeMap<String, Vec<u8>>,
    },
}

impl Effect {
    /// The store tag the runtime routes this effect on.
    pub fn store_tag(&self) -> &'static str {
        match self {
            Effect::SetValidator(_) => "validator",
            Effect::SetDelegation(_) | Effect::DeleteDelegation { .. } => "delegation",
            Effect::AddBalance { .. } => "balance_add",
            Effect::SubBalance { .. } => "balance_sub",
            Effect::Transfer { .. } => "transfer",
            Effect::Event { .. } => "event",
        }
    }
}
