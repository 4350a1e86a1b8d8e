//! The per-transaction execution context.

use punnet_store::CancelScope;
use punnet_types::account::AccountName;
use punnet_types::block::BlockHeader;

/// Read-only context handed to message handlers: the block being processed,
/// the transaction's signer, and the cancellation scope that propagates into
/// store operations.
#[derive(Clone, Debug)]
pub struct Context {
    /// The header of the block being processed.
    pub header: BlockHeader,
    /// The primary signer of the transaction being executed.
    pub signer: AccountName,
    /// The cancellation scope shared with the capability stores.
    pub scope: CancelScope,
}

impl Context {
    /// The current block height.
    pub fn height(&self) -> i64 {
        self.header.height
    }

    /// The chain identifier.
    pub fn chain_id(&self) -> &str {
        &self.header.chain_id
    }

    /// The block timestamp in seconds since the Unix epoch.
    pub fn time(&self) -> u64 {
        self.header.time
    }
}
