//! Cryptographic implementations for the Punnet SDK.
//!
//! The SDK stores no algorithm tag with a key or signature: the verifier
//! dispatches on key length (32 bytes = Ed25519, 33 bytes = SEC1-compressed
//! secp256k1 or secp256r1) and, for the secp curves, attempts a parse.
//! [`sign`] holds the verification dispatch and the per-curve key pairs used
//! by wallets and tests; [`hash`] holds the SHA-256 helpers.

pub mod hash;
pub mod sign;

pub use hash::sha256;
pub use sign::{
    verify_signature, Ed25519KeyPair, KeyPair, Secp256k1KeyPair, Secp256r1KeyPair,
    ED25519_PUBKEY_LEN, SECP_PUBKEY_LEN, SIGNATURE_LEN,
};
