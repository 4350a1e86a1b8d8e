//! Effect application with rollback.
//!
//! Effects are applied in list order through the capability stores. Every
//! mutation records the prior state in an undo log first; when a later
//! effect fails, the log unwinds in reverse so the transaction leaves no
//! trace. The unwind is best-effort in the same sense as `Transfer`
//! rollback: the runtime's single-writer discipline is what makes it exact
//! in practice.

use punnet_state::{AccountCapability, BalanceCapability, ValidatorCapability};
use punnet_types::account::{Account, AccountName};
use punnet_types::balance::Balance;
use punnet_types::effect::Effect;
use punnet_types::error::{RuntimeError, StateError};
use punnet_types::staking::{Delegation, Validator};

/// An event captured during effect application, pending transaction success.
#[derive(Clone, Debug)]
pub(crate) struct PendingEvent {
    pub kind: String,
    /// Attributes frozen in sorted key order.
    pub attrs: Vec<(String, Vec<u8>)>,
}

/// One recorded prior state, to restore on unwind.
enum UndoOp {
    Balance {
        account: AccountName,
        denom: String,
        amount: u64,
    },
    Validator {
        pub_key: Vec<u8>,
        prior: Option<Validator>,
    },
    Delegation {
        delegator: AccountName,
        validator: Vec<u8>,
        prior: Option<Delegation>,
    },
    Account {
        prior: Account,
    },
}

/// The undo log of one transaction.
pub(crate) struct UndoLog {
    ops: Vec<UndoOp>,
}

/// Treats `NotFound` as absence and propagates every other error.
fn found<T>(result: Result<T, StateError>) -> Result<Option<T>, StateError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StateError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

impl UndoLog {
    pub(crate) fn new() -> Self {
        Self { ops: Vec::new() }
    }

    fn record_balance(
        &mut self,
        balances: &BalanceCapability,
        account: &AccountName,
        denom: &str,
    ) -> Result<(), StateError> {
        let prior = balances.get_balance(account, denom)?;
        self.ops.push(UndoOp::Balance {
            account: account.clone(),
            denom: denom.to_string(),
            amount: prior.amount,
        });
        Ok(())
    }

    fn record_validator(
        &mut self,
        validators: &ValidatorCapability,
        pub_key: &[u8],
    ) -> Result<(), StateError> {
        let prior = found(validators.get_validator(pub_key))?;
        self.ops.push(UndoOp::Validator {
            pub_key: pub_key.to_vec(),
            prior,
        });
        Ok(())
    }

    fn record_delegation(
        &mut self,
        validators: &ValidatorCapability,
        delegator: &AccountName,
        validator: &[u8],
    ) -> Result<(), StateError> {
        let prior = found(validators.get_delegation(delegator, validator))?;
        self.ops.push(UndoOp::Delegation {
            delegator: delegator.clone(),
            validator: validator.to_vec(),
            prior,
        });
        Ok(())
    }

    pub(crate) fn record_account(&mut self, prior: Account) {
        self.ops.push(UndoOp::Account { prior });
    }

    /// Restores recorded prior states in reverse order.
    pub(crate) fn unwind(
        self,
        accounts: &AccountCapability,
        balances: &BalanceCapability,
        validators: &ValidatorCapability,
    ) {
        for op in self.ops.into_iter().rev() {
            let outcome = match op {
                UndoOp::Balance {
                    account,
                    denom,
                    amount,
                } => balances.set_balance(Balance::new(account, denom, amount)),
                UndoOp::Validator { pub_key, prior } => match prior {
                    Some(validator) => validators.set_validator(validator),
                    None => validators.delete_validator(&pub_key),
                },
                UndoOp::Delegation {
                    delegator,
                    validator,
                    prior,
                } => match prior {
                    Some(delegation) => validators.set_delegation(delegation),
                    None => validators.delete_delegation(&delegator, &validator),
                },
                UndoOp::Account { prior } => accounts.update_account(prior),
            };
            if let Err(err) = outcome {
                tracing::warn!(target: "runtime", error = %err, "undo step failed during rollback");
            }
        }
    }
}

/// Applies `effects` in order, recording undo information as it goes.
///
/// On error the caller unwinds the returned log; nothing is unwound here so
/// that the nonce increment can join the same log.
pub(crate) fn apply_effects(
    balances: &BalanceCapability,
    validators: &ValidatorCapability,
    effects: &[Effect],
    undo: &mut UndoLog,
) -> Result<Vec<PendingEvent>, RuntimeError> {
    let mut events = Vec::new();

    for effect in effects {
        tracing::trace!(target: "runtime", tag = effect.store_tag(), "applying effect");
        match effect {
            Effect::SetValidator(validator) => {
                undo.record_validator(validators, &validator.pub_key)?;
                validators.set_validator(validator.clone())?;
            }
            Effect::SetDelegation(delegation) => {
                undo.record_delegation(validators, &delegation.delegator, &delegation.validator)?;
                validators.set_delegation(delegation.clone())?;
            }
            Effect::DeleteDelegation {
                delegator,
                validator,
            } => {
                undo.record_delegation(validators, delegator, validator)?;
                validators.delete_delegation(delegator, validator)?;
            }
            Effect::AddBalance {
                account,
                denom,
                amount,
            } => {
                undo.record_balance(balances, account, denom)?;
                balances.add_balance(account, denom, *amount)?;
            }
            Effect::SubBalance {
                account,
                denom,
                amount,
            } => {
                undo.record_balance(balances, account, denom)?;
                balances.sub_balance(account, denom, *amount)?;
            }
            Effect::Transfer { from, to, coins } => {
                for coin in coins {
                    undo.record_balance(balances, from, &coin.denom)?;
                    undo.record_balance(balances, to, &coin.denom)?;
                }
                balances.transfer(from, to, coins)?;
            }
            Effect::Event { kind, attrs } => {
                events.push(PendingEvent {
                    kind: kind.clone(),
                    attrs: attrs
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                });
            }
        }
    }

    Ok(events)
}
