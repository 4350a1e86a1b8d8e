//! The message contract and the transaction envelope.

use crate::signdoc::{SignDoc, SignDocCoin, SignDocFee, SignDocFeeSlippage, SignDocMsg};
use punnet_types::account::AccountName;
use punnet_types::authorization::Authorization;
use punnet_types::coin::Coin;
use punnet_types::error::TxError;
use serde_json::Value;
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

/// A transaction message.
///
/// Implementations are registered with the runtime by type URL; handlers
/// downcast through [`Message::as_any`].
pub trait Message: Debug + Send + Sync {
    /// The stable message type identifier, e.g. `/punnet.bank.v1.MsgSend`.
    fn type_url(&self) -> &str;

    /// Stateless structural validation.
    fn validate_basic(&self) -> Result<(), TxError>;

    /// The accounts whose authorization this message requires.
    fn signers(&self) -> Vec<AccountName>;

    /// The message's canonical payload for the signing document. Key order
    /// inside the returned value must be deterministic; `serde_json::Value`
    /// objects keep keys sorted.
    fn sign_doc_data(&self) -> Result<Value, TxError>;

    /// Upcast for handler downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// The transaction fee.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fee {
    /// The fee coins.
    pub amount: Vec<Coin>,
    /// The gas limit.
    pub gas_limit: u64,
}

/// The tolerated fee slippage, as a fraction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeeSlippage {
    /// The numerator of the tolerated fraction.
    pub numerator: u64,
    /// The denominator of the tolerated fraction.
    pub denominator: u64,
}

impl Default for FeeSlippage {
    fn default() -> Self {
        Self {
            numerator: 0,
            denominator: 1,
        }
    }
}

/// A transaction: the primary signer, its replay nonce, the messages, the
/// fee schedule, and the authorization satisfying the signer's authority.
#[derive(Clone, Debug)]
pub struct Tx {
    /// The declared primary signing account.
    pub account: AccountName,
    /// The signer's expected nonce.
    pub nonce: u64,
    /// A free-form memo included in the sign bytes.
    pub memo: String,
    /// The messages, executed in order.
    pub msgs: Vec<Arc<dyn Message>>,
    /// The fee.
    pub fee: Fee,
    /// The tolerated fee slippage.
    pub fee_slippage: FeeSlippage,
    /// The authorization over the sign bytes.
    pub authorization: Authorization,
}

impl Tx {
    /// Builds the canonical signing document for this transaction.
    ///
    /// `account_sequence` is the signer's current on-chain nonce; for a
    /// valid transaction it equals `self.nonce`, but the document carries
    /// both so a mismatch changes the sign bytes.
    pub fn sign_doc(&self, chain_id: &str, account_sequence: u64) -> Result<SignDoc, TxError> {
        let msgs = self
            .msgs
            .iter()
            .map(|m| {
                Ok(SignDocMsg {
                    type_url: m.type_url().to_string(),
                    data: m.sign_doc_data()?,
                })
            })
            .collect::<Result<Vec<_>, TxError>>()?;

        Ok(SignDoc {
            chain_id: chain_id.to_string(),
            account_sequence,
            account: self.account.to_string(),
            nonce: self.nonce,
            memo: self.memo.clone(),
            msgs,
            fee: SignDocFee {
                amount: self
                    .fee
                    .amount
                    .iter()
                    .map(|c| SignDocCoin {
                        denom: c.denom.clone(),
                        amount: c.amount,
                    })
                    .collect(),
                gas_limit: self.fee.gas_limit,
            },
            fee_slippage: SignDocFeeSlippage {
                numerator: self.fee_slippage.numerator,
                denominator: self.fee_slippage.denominator,
            },
        })
    }

    /// The sign bytes of this transaction under `chain_id`.
    pub fn sign_bytes(&self, chain_id: &str, account_sequence: u64) -> Result<[u8; 32], TxError> {
        self.sign_doc(chain_id, account_sequence)?.sign_bytes()
    }
}
