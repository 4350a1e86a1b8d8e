//! Block headers.

use serde::{Deserialize, Serialize};

/// The header of the block currently being processed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// The block height.
    pub height: i64,
    /// The block timestamp, in seconds since the Unix epoch.
    pub time: u64,
    /// The chain identifier, used for replay protection.
    pub chain_id: String,
    /// The proposer's consensus public key.
    #[serde(with = "hex::serde")]
    pub proposer: Vec<u8>,
}

impl BlockHeader {
    /// Creates a header.
    pub fn new<S: Into<String>>(height: i64, time: u64, chain_id: S, proposer: Vec<u8>) -> Self {
        Self {
            height,
            time,
            chain_id: chain_id.into(),
            proposer,
        }
    }
}
