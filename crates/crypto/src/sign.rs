//! Signature verification and key pairs for the supported algorithms.
//!
//! Supported algorithms and their wire shapes:
//! - Ed25519: 32-byte public key, 64-byte signature, signs the raw message.
//! - secp256k1: 33-byte SEC1-compressed public key, 64-byte R‖S signature,
//!   message is hashed with SHA-256 inside the ECDSA scheme.
//! - secp256r1: same shapes as secp256k1, big-endian R‖S.
//!
//! A 33-byte key is tried against secp256k1 first; if the point does not
//! parse on that curve, secp256r1 is tried. Once a curve accepts the key,
//! that curve's verdict is final.

use ed25519_dalek::Verifier as _;
use k256::ecdsa::signature::{Signer as _, Verifier as _};
use punnet_types::error::CryptoError;
use rand::rngs::OsRng;

/// Ed25519 public key length in bytes.
pub const ED25519_PUBKEY_LEN: usize = 32;
/// SEC1-compressed secp256k1 / secp256r1 public key length in bytes.
pub const SECP_PUBKEY_LEN: usize = 33;
/// Signature length in bytes, shared by every supported algorithm.
pub const SIGNATURE_LEN: usize = 64;

/// Verifies `signature` over `message` with `public_key`, inferring the
/// algorithm from the key length.
pub fn verify_signature(
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), CryptoError> {
    if signature.len() != SIGNATURE_LEN {
        return Err(CryptoError::InvalidSignature(format!(
            "expected {}-byte signature, got {}",
            SIGNATURE_LEN,
            signature.len()
        )));
    }

    match public_key.len() {
        ED25519_PUBKEY_LEN => verify_ed25519(public_key, message, signature),
        SECP_PUBKEY_LEN => verify_secp(public_key, message, signature),
        other => Err(CryptoError::InvalidKey(format!(
            "unsupported public key length {}",
            other
        ))),
    }
}

fn verify_ed25519(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
    let key_bytes: [u8; 32] = public_key
        .try_into()
        .expect("length checked by dispatcher");
    let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| CryptoError::InvalidKey(format!("ed25519: {}", e)))?;
    let sig_bytes: [u8; 64] = signature
        .try_into()
        .expect("length checked by dispatcher");
    let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
    verifying_key
        .verify(message, &sig)
        .map_err(|_| CryptoError::VerificationFailed)
}

fn verify_secp(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
    // secp256k1 first; fall through to secp256r1 only when the point is not
    // on the k1 curve at all.
    if let Ok(verifying_key) = k256::ecdsa::VerifyingKey::from_sec1_bytes(public_key) {
        let sig = k256::ecdsa::Signature::from_slice(signature)
            .map_err(|e| CryptoError::InvalidSignature(format!("secp256k1: {}", e)))?;
        return verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed);
    }

    let verifying_key = p256::ecdsa::VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|e| CryptoError::InvalidKey(format!("secp256r1: {}", e)))?;
    let sig = p256::ecdsa::Signature::from_slice(signature)
        .map_err(|e| CryptoError::InvalidSignature(format!("secp256r1: {}", e)))?;
    verifying_key
        .verify(message, &sig)
        .map_err(|_| CryptoError::VerificationFailed)
}

/// A signing key pair for one of the supported algorithms.
///
/// Production verification only needs [`verify_signature`]; key pairs exist
/// for wallets, genesis tooling, and tests.
pub trait KeyPair {
    /// The public key in its wire form (the form the verifier dispatches on).
    fn public_key(&self) -> Vec<u8>;

    /// Signs `message`, returning the 64-byte wire signature.
    fn sign(&self, message: &[u8]) -> Vec<u8>;
}

/// An Ed25519 key pair.
#[derive(Clone)]
pub struct Ed25519KeyPair(ed25519_dalek::SigningKey);

impl Ed25519KeyPair {
    /// Generates a fresh key pair from the OS RNG.
    pub fn generate() -> Self {
        Self(ed25519_dalek::SigningKey::generate(&mut OsRng))
    }

    /// Rebuilds a key pair from a 32-byte seed.
    pub fn from_seed(seed: &[u8]) -> Result<Self, CryptoError> {
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("ed25519 seed must be 32 bytes".into()))?;
        Ok(Self(ed25519_dalek::SigningKey::from_bytes(&seed)))
    }
}

impl KeyPair for Ed25519KeyPair {
    fn public_key(&self) -> Vec<u8> {
        self.0.verifying_key().to_bytes().to_vec()
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        use ed25519_dalek::Signer as _;
        self.0.sign(message).to_bytes().to_vec()
    }
}

/// A secp256k1 ECDSA key pair.
#[derive(Clone)]
pub struct Secp256k1KeyPair(k256::ecdsa::SigningKey);

impl Secp256k1KeyPair {
    /// Generates a fresh key pair from the OS RNG.
    pub fn generate() -> Self {
        Self(k256::ecdsa::SigningKey::random(&mut OsRng))
    }
}

impl KeyPair for Secp256k1KeyPair {
    fn public_key(&self) -> Vec<u8> {
        self.0.verifying_key().to_sec1_bytes().to_vec()
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        let sig: k256::ecdsa::Signature = self.0.sign(message);
        sig.to_bytes().to_vec()
    }
}

/// A secp256r1 (P-256) ECDSA key pair.
#[derive(Clone)]
pub struct Secp256r1KeyPair(p256::ecdsa::SigningKey);

impl Secp256r1KeyPair {
    /// Generates a fresh key pair from the OS RNG.
    pub fn generate() -> Self {
        Self(p256::ecdsa::SigningKey::random(&mut OsRng))
    }
}

impl KeyPair for Secp256r1KeyPair {
    fn public_key(&self) -> Vec<u8> {
        self.0.verifying_key().to_sec1_bytes().to_vec()
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        use p256::ecdsa::signature::Signer as _;
        let sig: p256::ecdsa::Signature = self.0.sign(message);
        sig.to_bytes().to_vec()
    }
}
