//! The module runtime of the Punnet SDK.
//!
//! The runtime owns the capability handles, dispatches messages to module
//! handlers, applies the returned effects through the capability stores with
//! rollback on failure, and drives the block lifecycle
//! (`begin_block` / `deliver_tx` / `end_block` / `commit`).

pub mod context;
pub mod effects;
pub mod module;
pub mod runtime;

pub use context::Context;
pub use module::{Module, MsgHandler, QueryContext, QueryHandler};
pub use runtime::{BlockEvent, ChainConfig, GenesisState, Runtime, RuntimeBuilder};
