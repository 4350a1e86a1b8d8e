//! The balance domain store.

use punnet_store::{prefix_bound, CacheConfig, CancelScope, PrefixStore, TypedStore};
use punnet_types::balance::Balance;
use punnet_types::coin::Coin;
use punnet_types::error::{StateError, StoreError};
use punnet_types::keys::{balance_account_prefix, balance_key};
use punnet_types::AccountName;

/// Balances keyed by `"<account>/<denom>"`. A missing record is the zero
/// balance, never an error.
pub struct BalanceStore {
    inner: TypedStore<Balance>,
}

impl BalanceStore {
    /// Creates the store over a prefix store.
    pub fn new(store: PrefixStore, config: CacheConfig, scope: CancelScope) -> Self {
        Self {
            inner: TypedStore::new(store, config, scope),
        }
    }

    /// The balance of `(account, denom)`; zero when absent.
    pub fn get(&self, account: &AccountName, denom: &str) -> Result<Balance, StateError> {
        if denom.is_empty() {
            return Err(StateError::InvalidValue(
                "balance denom must be non-empty".into(),
            ));
        }
        let key = balance_key(account, denom);
        Ok(self
            .inner
            .get(&key)?
            .unwrap_or_else(|| Balance::zero(account.clone(), denom)))
    }

    /// Writes a balance record after validation.
    pub fn set(&self, balance: Balance) -> Result<(), StateError> {
        balance.validate_basic()?;
        let key = balance_key(&balance.account, &balance.denom);
        self.inner.set(&key, balance)?;
        Ok(())
    }

    /// True when a record exists for `(account, denom)`.
    pub fn has(&self, account: &AccountName, denom: &str) -> Result<bool, StateError> {
        Ok(self.inner.has(&balance_key(account, denom))?)
    }

    /// Adds `amount` to the balance, rejecting on u64 overflow.
    pub fn add_amount(
        &self,
        account: &AccountName,
        denom: &str,
        amount: u64,
    ) -> Result<Balance, StateError> {
        let mut balance = self.get(account, denom)?;
        balance.amount = balance.amount.checked_add(amount).ok_or_else(|| {
            StateError::BalanceOverflow {
                account: account.to_string(),
                denom: denom.to_string(),
            }
        })?;
        self.set(balance.clone())?;
        Ok(balance)
    }

    /// Subtracts `amount` from the balance, rejecting with
    /// [`StateError::InsufficientFunds`] when the balance is smaller.
    pub fn sub_amount(
        &self,
        account: &AccountName,
        denom: &str,
        amount: u64,
    ) -> Result<Balance, StateError> {
        let mut balance = self.get(account, denom)?;
        balance.amount =
            balance
                .amount
                .checked_sub(amount)
                .ok_or_else(|| StateError::InsufficientFunds {
                    account: account.to_string(),
                    denom: denom.to_string(),
                    have: balance.amount,
                    need: amount,
                })?;
        self.set(balance.clone())?;
        Ok(balance)
    }

    /// Visits every flushed balance of `account` in denom order.
    pub fn iterate_account<F>(&self, account: &AccountName, mut callback: F) -> Result<(), StateError>
    where
        F: FnMut(Balance) -> bool,
    {
        let start = balance_account_prefix(account);
        let end = prefix_bound(&start);
        let mut iter = self.inner.iterator(Some(&start), end.as_deref())?;
        for entry in iter.by_ref() {
            let (_, balance) = entry?;
            if !callback(balance) {
                break;
            }
        }
        iter.close();
        Ok(())
    }

    /// Visits every flushed balance in key order.
    pub fn iterate<F>(&self, mut callback: F) -> Result<(), StateError>
    where
        F: FnMut(Balance) -> bool,
    {
        let mut iter = self.inner.iterator(None, None)?;
        for entry in iter.by_ref() {
            let (_, balance) = entry?;
            if !callback(balance) {
                break;
            }
        }
        iter.close();
        Ok(())
    }

    /// All coins of `account` with a positive amount, in denom order.
    pub fn account_balances(&self, account: &AccountName) -> Result<Vec<Coin>, StateError> {
        let mut coins = Vec::new();
        self.iterate_account(account, |balance| {
            if balance.amount > 0 {
                coins.push(Coin::new(balance.denom, balance.amount));
            }
            true
        })?;
        Ok(coins)
    }

    /// Flushes through to the backing store.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.inner.flush()
    }

    /// Applies dirty entries without flushing the backing store.
    pub fn write_through(&self) -> Result<(), StoreError> {
        self.inner.write_through()
    }

    /// Drops unflushed cache state.
    pub fn discard_cache(&self) {
        self.inner.discard_cache()
    }

    /// Closes the store.
    pub fn close(&self) {
        self.inner.close()
    }
}
