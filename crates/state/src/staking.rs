//! The validator and delegation domain stores.

use punnet_store::{prefix_bound, CacheConfig, CancelScope, PrefixStore, TypedStore};
use punnet_types::error::{StateError, StoreError};
use punnet_types::keys::{delegation_delegator_prefix, delegation_key};
use punnet_types::staking::{Delegation, Validator, ValidatorUpdate};
use punnet_types::AccountName;

/// Validators keyed by their consensus public key.
pub struct ValidatorStore {
    inner: TypedStore<Validator>,
}

impl ValidatorStore {
    /// Creates the store over a prefix store.
    pub fn new(store: PrefixStore, config: CacheConfig, scope: CancelScope) -> Self {
        Self {
            inner: TypedStore::new(store, config, scope),
        }
    }

    /// Fetches a validator; absent is [`StateError::NotFound`].
    pub fn get(&self, pub_key: &[u8]) -> Result<Validator, StateError> {
        self.inner
            .get(pub_key)?
            .ok_or_else(|| StateError::NotFound(format!("validator '{}'", hex::encode(pub_key))))
    }

    /// Writes a validator after validation.
    pub fn set(&self, validator: Validator) -> Result<(), StateError> {
        validator.validate_basic()?;
        let key = validator.pub_key.clone();
        self.inner.set(&key, validator)?;
        Ok(())
    }

    /// Deletes a validator.
    pub fn delete(&self, pub_key: &[u8]) -> Result<(), StateError> {
        Ok(self.inner.delete(pub_key)?)
    }

    /// True when the validator exists.
    pub fn has(&self, pub_key: &[u8]) -> Result<bool, StateError> {
        Ok(self.inner.has(pub_key)?)
    }

    /// Overwrites a validator's power.
    pub fn set_power(&self, pub_key: &[u8], power: i64) -> Result<(), StateError> {
        let mut validator = self.get(pub_key)?;
        validator.power = power;
        self.set(validator)
    }

    /// Flips a validator's active flag.
    pub fn set_active(&self, pub_key: &[u8], active: bool) -> Result<(), StateError> {
        let mut validator = self.get(pub_key)?;
        validator.active = active;
        self.set(validator)
    }

    /// Visits every flushed validator in key order.
    pub fn iterate<F>(&self, mut callback: F) -> Result<(), StateError>
    where
        F: FnMut(Validator) -> bool,
    {
        let mut iter = self.inner.iterator(None, None)?;
        for entry in iter.by_ref() {
            let (_, validator) = entry?;
            if !callback(validator) {
                break;
            }
        }
        iter.close();
        Ok(())
    }

    /// The validators with `active && power > 0`, in iteration order.
    pub fn active_validators(&self) -> Result<Vec<Validator>, StateError> {
        let mut out = Vec::new();
        self.iterate(|v| {
            if v.active && v.power > 0 {
                out.push(v);
            }
            true
        })?;
        Ok(out)
    }

    /// The consensus updates for the active set.
    pub fn validator_updates(&self) -> Result<Vec<ValidatorUpdate>, StateError> {
        Ok(self
            .active_validators()?
            .iter()
            .map(ValidatorUpdate::from)
            .collect())
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

/// Delegations keyed by `"<delegator>/<hex(validator)>"`.
pub struct DelegationStore {
    inner: TypedStore<Delegation>,
}

impl DelegationStore {
    /// Creates the store over a prefix store.
    pub fn new(store: PrefixStore, config: CacheConfig, scope: CancelScope) -> Self {
        Self {
            inner: TypedStore::new(store, config, scope),
        }
    }

    /// Fetches a delegation; absent is [`StateError::NotFound`].
    pub fn get(
        &self,
        delegator: &AccountName,
        validator: &[u8],
    ) -> Result<Delegation, StateError> {
        self.inner
            .get(&delegation_key(delegator, validator))?
            .ok_or_else(|| {
                StateError::NotFound(format!(
                    "delegation '{}/{}'",
                    delegator,
                    hex::encode(validator)
                ))
            })
    }

    /// Writes a delegation after validation.
    pub fn set(&self, delegation: Delegation) -> Result<(), StateError> {
        delegation.validate_basic()?;
        let key = delegation_key(&delegation.delegator, &delegation.validator);
        self.inner.set(&key, delegation)?;
        Ok(())
    }

    /// Deletes a delegation.
    pub fn delete(&self, delegator: &AccountName, validator: &[u8]) -> Result<(), StateError> {
        Ok(self.inner.delete(&delegation_key(delegator, validator))?)
    }

    /// True when the delegation exists.
    pub fn has(&self, delegator: &AccountName, validator: &[u8]) -> Result<bool, StateError> {
        Ok(self.inner.has(&delegation_key(delegator, validator))?)
    }

    /// Visits every flushed delegation in key order.
    pub fn iterate<F>(&self, mut callback: F) -> Result<(), StateError>
    where
        F: FnMut(Delegation) -> bool,
    {
        let mut iter = self.inner.iterator(None, None)?;
        for entry in iter.by_ref() {
            let (_, delegation) = entry?;
            if !callback(delegation) {
                break;
            }
        }
        iter.close();
        Ok(())
    }

    /// Visits every flushed delegation of `delegator` in validator order.
    pub fn iterate_delegator<F>(
        &self,
        delegator: &AccountName,
        mut callback: F,
    ) -> Result<(), StateError>
    where
        F: FnMut(Delegation) -> bool,
    {
        let start = delegation_delegator_prefix(delegator);
        let end = prefix_bound(&start);
        let mut iter = self.inner.iterator(Some(&start), end.as_deref())?;
        for entry in iter.by_ref() {
            let (_, delegation) = entry?;
            if !callback(delegation) {
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
