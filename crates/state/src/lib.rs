//! Domain stores and the capability layer of the Punnet SDK.
//!
//! The domain stores ([`account`], [`balance`], [`staking`]) wrap typed
//! stores with domain keys and invariants. The capability layer
//! ([`capability`]) registers modules and issues handles whose stores live
//! under the module's `module/<name>/` slice of the shared backing store;
//! a capability exposes only domain operations, never raw key-value access.

pub mod account;
pub mod balance;
pub mod capability;
pub mod staking;

pub use account::AccountStore;
pub use balance::BalanceStore;
pub use capability::{
    AccountCapability, BalanceCapability, CapabilityManager, ValidatorCapability,
};
pub use staking::{DelegationStore, ValidatorStore};
