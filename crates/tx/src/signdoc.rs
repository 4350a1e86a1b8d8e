//! The canonical signing document.
//!
//! `SignDoc` binds a transaction to a chain, an account, a nonce, and a fee
//! schedule. Its canonical JSON form is emitted with fields in the order
//! declared below and with no insignificant whitespace; every integer is a
//! decimal string to avoid JSON number precision ambiguity across
//! implementations. `sign_bytes` is the SHA-256 of that canonical form,
//! the value signatures actually bind to.

use punnet_crypto::sha256;
use punnet_types::error::TxError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Serde helpers for u64 fields carried as decimal strings.
mod u64_string {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<u64>()
            .map_err(|e| D::Error::custom(format!("invalid string-encoded u64 '{}': {}", s, e)))
    }
}

/// Normalizes an absent or `null` memo to the empty string.
fn null_to_empty_string<'de, D: serde::Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

/// Normalizes an absent or `null` fee amount to the empty list.
fn null_to_empty_vec<'de, D: serde::Deserializer<'de>>(
    d: D,
) -> Result<Vec<SignDocCoin>, D::Error> {
    Ok(Option::<Vec<SignDocCoin>>::deserialize(d)?.unwrap_or_default())
}

/// One message inside the signing document.
///
/// `data` is the message's own canonical JSON; the distinction between `{}`
/// and `null` is preserved and produces different sign bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignDocMsg {
    /// The stable message type identifier, e.g. `/punnet.bank.v1.MsgSend`.
    #[serde(rename = "type")]
    pub type_url: String,
    /// The message payload. Object keys are kept in sorted order.
    pub data: Value,
}

/// A fee coin with a string-encoded amount.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignDocCoin {
    /// The denomination.
    pub denom: String,
    /// The amount, string-encoded.
    #[serde(with = "u64_string")]
    pub amount: u64,
}

/// The fee block of the signing document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignDocFee {
    /// The fee coins. Absent/`null` is normalized to `[]`.
    #[serde(default, deserialize_with = "null_to_empty_vec")]
    pub amount: Vec<SignDocCoin>,
    /// The gas limit, string-encoded.
    #[serde(with = "u64_string")]
    pub gas_limit: u64,
}

/// The fee slippage bound of the signing document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignDocFeeSlippage {
    /// Slippage numerator, string-encoded.
    #[serde(with = "u64_string")]
    pub numerator: u64,
    /// Slippage denominator, string-encoded.
    #[serde(with = "u64_string")]
    pub denominator: u64,
}

/// The canonical signing document.
///
/// Field declaration order below *is* the wire order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignDoc {
    /// The chain identifier. Empty is a hard validation failure (it would
    /// permit cross-chain replay).
    pub chain_id: String,
    /// The signer's account sequence, string-encoded.
    #[serde(with = "u64_string")]
    pub account_sequence: u64,
    /// The signer's account name.
    pub account: String,
    /// The transaction nonce, string-encoded.
    #[serde(with = "u64_string")]
    pub nonce: u64,
    /// The memo. Absent/`null` is normalized to `""`.
    #[serde(default, deserialize_with = "null_to_empty_string")]
    pub memo: String,
    /// The transaction's messages.
    pub msgs: Vec<SignDocMsg>,
    /// The fee block.
    pub fee: SignDocFee,
    /// The fee slippage bound.
    pub fee_slippage: SignDocFeeSlippage,
}

impl SignDoc {
    /// Validates the document. Only the chain id is load-bearing here; the
    /// rest of the shape is enforced by construction.
    pub fn validate(&self) -> Result<(), TxError> {
        if self.chain_id.is_empty() {
            return Err(TxError::Invalid(
                "sign doc chain_id must be non-empty".into(),
            ));
        }
        Ok(())
    }

    /// Emits the canonical JSON byte form.
    pub fn canonical_json(&self) -> Result<Vec<u8>, TxError> {
        self.validate()?;
        serde_json::to_vec(self).map_err(|e| TxError::Serialization(e.to_string()))
    }

    /// Computes the sign bytes: `SHA-256(canonical_json)`.
    pub fn sign_bytes(&self) -> Result<[u8; 32], TxError> {
        Ok(sha256(&self.canonical_json()?))
    }

    /// Parses a document from JSON, applying the normalization rules
    /// (`null` memo → `""`, `null` fee amount → `[]`).
    pub fn parse(bytes: &[u8]) -> Result<Self, TxError> {
        serde_json::from_slice(bytes).map_err(|e| TxError::Deserialization(e.to_string()))
    }
}
