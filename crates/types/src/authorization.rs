//! Signatures and the recursive authorization structure.

use crate::account::AccountName;
use crate::error::StateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Raw public key bytes, serialized as a lowercase hex string.
///
/// The signature algorithm is not tagged: it is inferred from the key
/// length (32 bytes = Ed25519, 33 bytes = SEC1-compressed secp256k1 or
/// secp256r1) by the verifier.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PubKeyBytes(Vec<u8>);

impl PubKeyBytes {
    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the key length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the key is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for PubKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PubKeyBytes({})", hex::encode(&self.0))
    }
}

impl fmt::Display for PubKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl From<Vec<u8>> for PubKeyBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for PubKeyBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl TryFrom<String> for PubKeyBytes {
    type Error = StateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        hex::decode(&value)
            .map(Self)
            .map_err(|e| StateError::InvalidValue(format!("invalid hex public key: {}", e)))
    }
}

impl From<PubKeyBytes> for String {
    fn from(key: PubKeyBytes) -> Self {
        hex::encode(key.0)
    }
}

/// A single signature: the signing key and the signature bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// The public key that produced the signature.
    pub pub_key: PubKeyBytes,
    /// The raw signature bytes (64 bytes for every supported algorithm).
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
}

/// A self-referential authorization: direct signatures plus nested
/// authorizations for delegated accounts.
///
/// Verification is recursive, bounded by a depth cap, and cycle-detected;
/// see the authorization verifier for the algorithm.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    /// Direct signatures over the message.
    pub signatures: Vec<Signature>,
    /// Nested authorizations keyed by the delegated account's name.
    pub account_authorizations: BTreeMap<AccountName, Authorization>,
}

impl Authorization {
    /// An authorization consisting of a single direct signature.
    pub fn single(pub_key: impl Into<PubKeyBytes>, signature: Vec<u8>) -> Self {
        Self {
            signatures: vec![Signature {
                pub_key: pub_key.into(),
                signature,
            }],
            account_authorizations: BTreeMap::new(),
        }
    }

    /// Adds a nested authorization for a delegated account.
    pub fn with_account(mut self, name: AccountName, auth: Authorization) -> Self {
        self.account_authorizations.insert(name, auth);
        self
    }
}
