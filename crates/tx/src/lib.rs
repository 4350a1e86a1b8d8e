//! Transaction handling for the Punnet SDK.
//!
//! - [`signdoc`]: the canonical JSON signing document and its SHA-256 sign
//!   bytes. The byte-exact canonical form is a wire format; changing field
//!   order, number encoding, or null-normalization is a hard fork.
//! - [`message`]: the dyn message contract and the transaction envelope.
//! - [`verifier`]: the per-transaction pipeline (shape, nonce, sign bytes,
//!   authorization).

pub mod message;
pub mod signdoc;
pub mod verifier;

pub use message::{Fee, FeeSlippage, Message, Tx};
pub use signdoc::{SignDoc, SignDocCoin, SignDocFee, SignDocFeeSlippage, SignDocMsg};
pub use verifier::verify_tx;
