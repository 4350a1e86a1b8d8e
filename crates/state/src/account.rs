//! The account domain store.

use punnet_store::{CacheConfig, CancelScope, PrefixStore, TypedStore};
use punnet_types::account::{Account, AccountName};
use punnet_types::error::{StateError, StoreError};

/// Accounts keyed by their name bytes.
pub struct AccountStore {
    inner: TypedStore<Account>,
}

impl AccountStore {
    /// Creates the store over a prefix store.
    pub fn new(store: PrefixStore, config: CacheConfig, scope: CancelScope) -> Self {
        Self {
            inner: TypedStore::new(store, config, scope),
        }
    }

    /// Fetches an account; absent is [`StateError::NotFound`].
    pub fn get(&self, name: &AccountName) -> Result<Account, StateError> {
        self.try_get(name)?
            .ok_or_else(|| StateError::NotFound(format!("account '{}'", name)))
    }

    /// Fetches an account, `None` when absent.
    pub fn try_get(&self, name: &AccountName) -> Result<Option<Account>, StateError> {
        Ok(self.inner.get(name.as_bytes())?)
    }

    /// Writes an account after validating it.
    pub fn set(&self, account: Account) -> Result<(), StateError> {
        account.validate_basic()?;
        let key = account.name.as_bytes().to_vec();
        self.inner.set(&key, account)?;
        Ok(())
    }

    /// Deletes an account.
    pub fn delete(&self, name: &AccountName) -> Result<(), StateError> {
        Ok(self.inner.delete(name.as_bytes())?)
    }

    /// True when the account exists.
    pub fn has(&self, name: &AccountName) -> Result<bool, StateError> {
        Ok(self.inner.has(name.as_bytes())?)
    }

    /// Visits every flushed account in key order until the callback returns
    /// `false`.
    pub fn iterate<F>(&self, mut callback: F) -> Result<(), StateError>
    where
        F: FnMut(Account) -> bool,
    {
        let mut iter = self.inner.iterator(None, None)?;
        for entry in iter.by_ref() {
            let (_, account) = entry?;
            if !callback(account) {
                break;
            }
        }
        iter.close();
        Ok(())
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
