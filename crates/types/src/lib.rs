//! Core data structures shared by every crate in the Punnet SDK.
//!
//! The types here are deliberately free of store, crypto, and runtime
//! dependencies so that every other crate can depend on them without
//! cycles:
//! - account and authority model ([`account`], [`authorization`])
//! - coins, balances, and staking records ([`coin`], [`balance`], [`staking`])
//! - block headers ([`block`]) and reified mutations ([`effect`])
//! - the canonical JSON codec ([`codec`]) and well-known state keys ([`keys`])
//! - the error taxonomy ([`error`])

pub mod account;
pub mod authorization;
pub mod balance;
pub mod block;
pub mod codec;
pub mod coin;
pub mod effect;
pub mod error;
pub mod keys;
pub mod staking;

pub use account::{Account, AccountName, Authority};
pub use authorization::{Authorization, PubKeyBytes, Signature};
pub use balance::Balance;
pub use block::BlockHeader;
pub use coin::Coin;
pub use effect::Effect;
pub use staking::{Delegation, Validator, ValidatorUpdate};
