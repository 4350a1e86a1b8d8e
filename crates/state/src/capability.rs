//! The capability manager and per-module capability handles.
//!
//! A module must be registered before it can be granted a capability. A
//! grant builds typed domain stores over a prefix store rooted at
//! `module/<name>/` on the shared backing store, with a fresh cache layer
//! per grant; the runtime is responsible for using one handle consistently
//! within a block. Capabilities expose only domain operations; raw
//! key-value access never crosses this boundary.

use crate::account::AccountStore;
use crate::balance::BalanceStore;
use crate::staking::{DelegationStore, ValidatorStore};
use parking_lot::RwLock;
use punnet_auth::AccountGetter;
use punnet_store::{CacheConfig, CancelScope, PrefixStore, SharedKvStore};
use punnet_types::account::{Account, AccountName};
use punnet_types::authorization::{Authorization, PubKeyBytes};
use punnet_types::balance::Balance;
use punnet_types::coin::Coin;
use punnet_types::error::{AuthError, RuntimeError, StateError, StoreError};
use punnet_types::keys::{
    module_prefix, ACCOUNT_SUBPREFIX, BALANCE_SUBPREFIX, DELEGATION_SUBPREFIX,
    VALIDATOR_SUBPREFIX,
};
use punnet_types::staking::{Delegation, Validator, ValidatorUpdate};
use std::collections::BTreeSet;

/// Validates a module name: same charset and length rules as account names.
fn check_module_name(name: &str) -> Result<(), RuntimeError> {
    AccountName::new(name).map(|_| ()).map_err(|_| {
        RuntimeError::State(StateError::InvalidValue(format!(
            "invalid module name '{}'",
            name
        )))
    })
}

/// Owns the shared backing store and the module registry.
pub struct CapabilityManager {
    backing: SharedKvStore,
    modules: RwLock<BTreeSet<String>>,
    cache_config: CacheConfig,
}

impl CapabilityManager {
    /// Creates a manager over a shared backing store with default cache
    /// geometry.
    pub fn new(backing: SharedKvStore) -> Self {
        Self::with_cache_config(backing, CacheConfig::default())
    }

    /// Creates a manager with explicit cache geometry for granted stores.
    pub fn with_cache_config(backing: SharedKvStore, cache_config: CacheConfig) -> Self {
        Self {
            backing,
            modules: RwLock::new(BTreeSet::new()),
            cache_config,
        }
    }

    /// Registers a module name. Re-registration is
    /// [`RuntimeError::DuplicateModule`].
    pub fn register_module(&self, name: &str) -> Result<(), RuntimeError> {
        check_module_name(name)?;
        let mut modules = self.modules.write();
        if !modules.insert(name.to_string()) {
            return Err(RuntimeError::DuplicateModule(name.to_string()));
        }
        tracing::debug!(target: "state", module = name, "registered module");
        Ok(())
    }

    /// True when the module has been registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.modules.read().contains(name)
    }

    /// The registered module names, sorted.
    pub fn modules(&self) -> Vec<String> {
        self.modules.read().iter().cloned().collect()
    }

    fn module_store(&self, name: &str) -> Result<PrefixStore, RuntimeError> {
        if !self.is_registered(name) {
            return Err(RuntimeError::ModuleNotFound(name.to_string()));
        }
        Ok(PrefixStore::new(self.backing.clone(), module_prefix(name)))
    }

    /// Grants an account capability to a registered module.
    pub fn grant_account_capability(
        &self,
        module: &str,
        scope: CancelScope,
    ) -> Result<AccountCapability, RuntimeError> {
        let root = self.module_store(module)?;
        Ok(AccountCapability {
            accounts: AccountStore::new(
                root.child(ACCOUNT_SUBPREFIX),
                self.cache_config,
                scope,
            ),
        })
    }

    /// Grants a balance capability to a registered module.
    pub fn grant_balance_capability(
        &self,
        module: &str,
        scope: CancelScope,
    ) -> Result<BalanceCapability, RuntimeError> {
        let root = self.module_store(module)?;
        Ok(BalanceCapability {
            balances: BalanceStore::new(
                root.child(BALANCE_SUBPREFIX),
                self.cache_config,
                scope,
            ),
        })
    }

    /// Grants a validator capability to a registered module.
    pub fn grant_validator_capability(
        &self,
        module: &str,
        scope: CancelScope,
    ) -> Result<ValidatorCapability, RuntimeError> {
        let root = self.module_store(module)?;
        Ok(ValidatorCapability {
            validators: ValidatorStore::new(
                root.child(VALIDATOR_SUBPREFIX),
                self.cache_config,
                scope.clone(),
            ),
            delegations: DelegationStore::new(
                root.child(DELEGATION_SUBPREFIX),
                self.cache_config,
                scope,
            ),
        })
    }

    /// A read handle on the shared backing store, for commit-time versioning.
    pub fn backing(&self) -> SharedKvStore {
        self.backing.clone()
    }

    /// Closes the backing store. Only the manager may do this; prefix and
    /// typed stores never close their parent.
    pub fn close(&self) -> Result<(), StoreError> {
        self.backing.write().close()
    }
}

/// The account capability: account records plus nonce bookkeeping and
/// authorization verification.
pub struct AccountCapability {
    accounts: AccountStore,
}

impl AccountCapability {
    /// Fetches an account; absent is [`StateError::NotFound`].
    pub fn get_account(&self, name: &AccountName) -> Result<Account, StateError> {
        self.accounts.get(name)
    }

    /// Creates a fresh account with a single-key authority and nonce 0.
    /// An existing account of the same name is [`StateError::InvalidAccount`].
    pub fn create_account(
        &self,
        name: AccountName,
        pub_key: impl Into<PubKeyBytes>,
    ) -> Result<Account, StateError> {
        if self.accounts.has(&name)? {
            return Err(StateError::InvalidAccount(format!(
                "account '{}' already exists",
                name
            )));
        }
        let account = Account::new_single_key(name, pub_key);
        self.accounts.set(account.clone())?;
        Ok(account)
    }

    /// Writes a fully-formed account record, for genesis and administrative
    /// tooling. An existing account of the same name is rejected.
    pub fn init_account(&self, account: Account) -> Result<(), StateError> {
        if self.accounts.has(&account.name)? {
            return Err(StateError::InvalidAccount(format!(
                "account '{}' already exists",
                account.name
            )));
        }
        self.accounts.set(account)
    }

    /// Overwrites an existing account record.
    pub fn update_account(&self, account: Account) -> Result<(), StateError> {
        if !self.accounts.has(&account.name)? {
            return Err(StateError::NotFound(format!("account '{}'", account.name)));
        }
        self.accounts.set(account)
    }

    /// Deletes an account.
    pub fn delete_account(&self, name: &AccountName) -> Result<(), StateError> {
        self.accounts.delete(name)
    }

    /// True when the account exists.
    pub fn has_account(&self, name: &AccountName) -> Result<bool, StateError> {
        self.accounts.has(name)
    }

    /// Verifies `authorization` over `msg` against `account`'s authority,
    /// resolving delegated accounts through this capability.
    pub fn verify_authorization(
        &self,
        account: &Account,
        authorization: &Authorization,
        msg: &[u8],
    ) -> Result<(), AuthError> {
        punnet_auth::verify_authorization(self, account, authorization, msg)
    }

    /// The account's current nonce.
    pub fn get_nonce(&self, name: &AccountName) -> Result<u64, StateError> {
        Ok(self.accounts.get(name)?.nonce)
    }

    /// Increments the account's nonce, returning the new value.
    pub fn increment_nonce(&self, name: &AccountName) -> Result<u64, StateError> {
        let mut account = self.accounts.get(name)?;
        account.nonce = account.nonce.checked_add(1).ok_or_else(|| {
            StateError::InvalidValue(format!("nonce overflow for account '{}'", name))
        })?;
        let nonce = account.nonce;
        self.accounts.set(account)?;
        Ok(nonce)
    }

    /// Visits every flushed account in key order.
    pub fn iterate_accounts<F>(&self, callback: F) -> Result<(), StateError>
    where
        F: FnMut(Account) -> bool,
    {
        self.accounts.iterate(callback)
    }

    /// Flushes through to the backing store.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.accounts.flush()
    }

    /// Applies dirty entries without flushing the backing store.
    pub fn write_through(&self) -> Result<(), StoreError> {
        self.accounts.write_through()
    }

    /// Drops unflushed cache state.
    pub fn discard_cache(&self) {
        self.accounts.discard_cache()
    }

    /// Closes the capability's stores.
    pub fn close(&self) {
        self.accounts.close()
    }
}

impl AccountGetter for AccountCapability {
    fn get_account(&self, name: &AccountName) -> Result<Account, StateError> {
        self.accounts.get(name)
    }
}

/// The balance capability.
pub struct BalanceCapability {
    balances: BalanceStore,
}

impl BalanceCapability {
    /// The balance of `(account, denom)`; zero when absent.
    pub fn get_balance(&self, account: &AccountName, denom: &str) -> Result<Balance, StateError> {
        self.balances.get(account, denom)
    }

    /// Writes a balance record.
    pub fn set_balance(&self, balance: Balance) -> Result<(), StateError> {
        self.balances.set(balance)
    }

    /// Credits a balance, rejecting on overflow.
    pub fn add_balance(
        &self,
        account: &AccountName,
        denom: &str,
        amount: u64,
    ) -> Result<Balance, StateError> {
        self.balances.add_amount(account, denom, amount)
    }

    /// Debits a balance, rejecting on insufficient funds.
    pub fn sub_balance(
        &self,
        account: &AccountName,
        denom: &str,
        amount: u64,
    ) -> Result<Balance, StateError> {
        self.balances.sub_amount(account, denom, amount)
    }

    /// Moves coins from `from` to `to`: for each coin a debit then a
    /// credit. On failure the completed sub-steps are rolled back in
    /// reverse; the rollback is best-effort and conflicting transfers must
    /// be serialized by the runtime's single-writer discipline.
    pub fn transfer(
        &self,
        from: &AccountName,
        to: &AccountName,
        coins: &[Coin],
    ) -> Result<(), StateError> {
        if !punnet_types::coin::coins_all_positive(coins) {
            return Err(StateError::InvalidValue(
                "transfer requires positive coins with non-empty denoms".into(),
            ));
        }

        // (account-is-from, denom, amount) of completed sub-steps.
        let mut completed: Vec<(bool, &str, u64)> = Vec::new();
        let mut apply = || -> Result<(), StateError> {
            for coin in coins {
                self.balances.sub_amount(from, &coin.denom, coin.amount)?;
                completed.push((true, coin.denom.as_str(), coin.amount));
                self.balances.add_amount(to, &coin.denom, coin.amount)?;
                completed.push((false, coin.denom.as_str(), coin.amount));
            }
            Ok(())
        };

        if let Err(err) = apply() {
            for (was_sub, denom, amount) in completed.into_iter().rev() {
                let undo = if was_sub {
                    self.balances.add_amount(from, denom, amount).map(|_| ())
                } else {
                    self.balances.sub_amount(to, denom, amount).map(|_| ())
                };
                if let Err(undo_err) = undo {
                    tracing::warn!(
                        target: "state",
                        %from,
                        %to,
                        denom,
                        amount,
                        error = %undo_err,
                        "transfer rollback step failed"
                    );
                }
            }
            return Err(err);
        }
        Ok(())
    }

    /// All positive coins of `account`, in denom order.
    pub fn get_account_balances(&self, account: &AccountName) -> Result<Vec<Coin>, StateError> {
        self.balances.account_balances(account)
    }

    /// True when a record exists for `(account, denom)`.
    pub fn has_balance(&self, account: &AccountName, denom: &str) -> Result<bool, StateError> {
        self.balances.has(account, denom)
    }

    /// Visits every flushed balance in key order.
    pub fn iterate_balances<F>(&self, callback: F) -> Result<(), StateError>
    where
        F: FnMut(Balance) -> bool,
    {
        self.balances.iterate(callback)
    }

    /// Visits every flushed balance of `account` in denom order.
    pub fn iterate_account_balances<F>(
        &self,
        account: &AccountName,
        callback: F,
    ) -> Result<(), StateError>
    where
        F: FnMut(Balance) -> bool,
    {
        self.balances.iterate_account(account, callback)
    }

    /// Flushes through to the backing store.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.balances.flush()
    }

    /// Applies dirty entries without flushing the backing store.
    pub fn write_through(&self) -> Result<(), StoreError> {
        self.balances.write_through()
    }

    /// Drops unflushed cache state.
    pub fn discard_cache(&self) {
        self.balances.discard_cache()
    }

    /// Closes the capability's stores.
    pub fn close(&self) {
        self.balances.close()
    }
}

/// The validator capability: validators plus delegations.
pub struct ValidatorCapability {
    validators: ValidatorStore,
    delegations: DelegationStore,
}

impl ValidatorCapability {
    /// Fetches a validator.
    pub fn get_validator(&self, pub_key: &[u8]) -> Result<Validator, StateError> {
        self.validators.get(pub_key)
    }

    /// Writes a validator.
    pub fn set_validator(&self, validator: Validator) -> Result<(), StateError> {
        self.validators.set(validator)
    }

    /// Deletes a validator.
    pub fn delete_validator(&self, pub_key: &[u8]) -> Result<(), StateError> {
        self.validators.delete(pub_key)
    }

    /// True when the validator exists.
    pub fn has_validator(&self, pub_key: &[u8]) -> Result<bool, StateError> {
        self.validators.has(pub_key)
    }

    /// The validators with `active && power > 0`.
    pub fn get_active_validators(&self) -> Result<Vec<Validator>, StateError> {
        self.validators.active_validators()
    }

    /// The consensus updates for the active set.
    pub fn get_validator_set(&self) -> Result<Vec<ValidatorUpdate>, StateError> {
        self.validators.validator_updates()
    }

    /// Overwrites a validator's power.
    pub fn set_validator_power(&self, pub_key: &[u8], power: i64) -> Result<(), StateError> {
        self.validators.set_power(pub_key, power)
    }

    /// Flips a validator's active flag.
    pub fn set_validator_active(&self, pub_key: &[u8], active: bool) -> Result<(), StateError> {
        self.validators.set_active(pub_key, active)
    }

    /// Visits every flushed validator in key order.
    pub fn iterate_validators<F>(&self, callback: F) -> Result<(), StateError>
    where
        F: FnMut(Validator) -> bool,
    {
        self.validators.iterate(callback)
    }

    /// Fetches a delegation.
    pub fn get_delegation(
        &self,
        delegator: &AccountName,
        validator: &[u8],
    ) -> Result<Delegation, StateError> {
        self.delegations.get(delegator, validator)
    }

    /// Writes a delegation.
    pub fn set_delegation(&self, delegation: Delegation) -> Result<(), StateError> {
        self.delegations.set(delegation)
    }

    /// Deletes a delegation.
    pub fn delete_delegation(
        &self,
        delegator: &AccountName,
        validator: &[u8],
    ) -> Result<(), StateError> {
        self.delegations.delete(delegator, validator)
    }

    /// True when the delegation exists.
    pub fn has_delegation(
        &self,
        delegator: &AccountName,
        validator: &[u8],
    ) -> Result<bool, StateError> {
        self.delegations.has(delegator, validator)
    }

    /// Visits every flushed delegation in key order.
    pub fn iterate_delegations<F>(&self, callback: F) -> Result<(), StateError>
    where
        F: FnMut(Delegation) -> bool,
    {
        self.delegations.iterate(callback)
    }

    /// Flushes both stores through to the backing store, validators first.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.validators.flush()?;
        self.delegations.flush()
    }

    /// Applies dirty entries of both stores without a backing flush.
    pub fn write_through(&self) -> Result<(), StoreError> {
        self.validators.write_through()?;
        self.delegations.write_through()
    }

    /// Drops unflushed cache state of both stores.
    pub fn discard_cache(&self) {
        self.validators.discard_cache();
        self.delegations.discard_cache();
    }

    /// Closes the capability's stores.
    pub fn close(&self) {
        self.validators.close();
        self.delegations.close();
    }
}
