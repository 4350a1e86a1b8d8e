//! End-to-end scenarios driving the full pipeline: verifier, handlers,
//! effects, capability stores, and the block lifecycle.

use punnet_crypto::{Ed25519KeyPair, KeyPair};
use punnet_runtime::{
    BlockEvent, Context, GenesisState, Module, MsgHandler, QueryHandler, Runtime,
};
use punnet_tx::{Fee, FeeSlippage, Message, Tx};
use punnet_types::account::{Account, AccountName, Authority};
use punnet_types::authorization::{Authorization, PubKeyBytes, Signature};
use punnet_types::balance::Balance;
use punnet_types::block::BlockHeader;
use punnet_types::coin::Coin;
use punnet_types::effect::Effect;
use punnet_types::error::{AuthError, RuntimeError, StateError, TxError};
use punnet_types::staking::{Delegation, Validator};
use serde_json::{json, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

const CHAIN_ID: &str = "punnet-mainnet-1";

fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
}

// --- Test modules -----------------------------------------------------------

#[derive(Debug, Clone)]
struct MsgSend {
    from: AccountName,
    to: AccountName,
    denom: String,
    amount: u64,
}

impl Message for MsgSend {
    fn type_url(&self) -> &str {
        "/punnet.bank.v1.MsgSend"
    }

    fn validate_basic(&self) -> Result<(), TxError> {
        if self.denom.is_empty() {
            return Err(TxError::Invalid("send denom must be non-empty".into()));
        }
        if self.amount == 0 {
            return Err(TxError::Invalid("send amount must be positive".into()));
        }
        Ok(())
    }

    fn signers(&self) -> Vec<AccountName> {
        vec![self.from.clone()]
    }

    fn sign_doc_data(&self) -> Result<Value, TxError> {
        Ok(json!({
            "amount": self.amount.to_string(),
            "denom": self.denom,
            "from": self.from.to_string(),
            "to": self.to.to_string(),
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct PaymentsModule;

impl Module for PaymentsModule {
    fn name(&self) -> &str {
        "payments"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["bank".into(), "auth".into()]
    }

    fn register_msg_handlers(&self) -> BTreeMap<String, MsgHandler> {
        let mut handlers: BTreeMap<String, MsgHandler> = BTreeMap::new();
        handlers.insert(
            "/punnet.bank.v1.MsgSend".into(),
            Arc::new(|ctx: &Context, msg: &dyn Message| {
                let send = msg
                    .as_any()
                    .downcast_ref::<MsgSend>()
                    .ok_or_else(|| RuntimeError::Handler("unexpected message type".into()))?;

                let mut attrs = BTreeMap::new();
                attrs.insert("from".to_string(), send.from.to_string().into_bytes());
                attrs.insert("to".to_string(), send.to.to_string().into_bytes());
                attrs.insert("denom".to_string(), send.denom.clone().into_bytes());
                attrs.insert("amount".to_string(), send.amount.to_string().into_bytes());
                attrs.insert(
                    "height".to_string(),
                    ctx.height().to_string().into_bytes(),
                );

                Ok(vec![
                    Effect::Transfer {
                        from: send.from.clone(),
                        to: send.to.clone(),
                        coins: vec![Coin::new(send.denom.clone(), send.amount)],
                    },
                    Effect::Event {
                        kind: "bank.send".into(),
                        attrs,
                    },
                ])
            }),
        );
        handlers
    }

    fn register_query_handlers(&self) -> BTreeMap<String, QueryHandler> {
        let mut handlers: BTreeMap<String, QueryHandler> = BTreeMap::new();
        handlers.insert(
            "/punnet.bank.v1.balance".into(),
            Arc::new(|ctx, data: &[u8]| {
                let request = std::str::from_utf8(data)
                    .map_err(|e| RuntimeError::Handler(e.to_string()))?;
                let (account, denom) = request
                    .split_once('/')
                    .ok_or_else(|| RuntimeError::Handler("expected account/denom".into()))?;
                let account = AccountName::new(account)
                    .map_err(|e| RuntimeError::Handler(e.to_string()))?;
                let balance = ctx.balances.get_balance(&account, denom)?;
                Ok(balance.amount.to_string().into_bytes())
            }),
        );
        handlers
    }
}

#[derive(Debug, Clone)]
struct MsgCreateValidator {
    operator: AccountName,
    pub_key: Vec<u8>,
    power: i64,
}

impl Message for MsgCreateValidator {
    fn type_url(&self) -> &str {
        "/punnet.staking.v1.MsgCreateValidator"
    }

    fn validate_basic(&self) -> Result<(), TxError> {
        if self.pub_key.is_empty() {
            return Err(TxError::Invalid("validator pub_key must be non-empty".into()));
        }
        Ok(())
    }

    fn signers(&self) -> Vec<AccountName> {
        vec![self.operator.clone()]
    }

    fn sign_doc_data(&self) -> Result<Value, TxError> {
        Ok(json!({
            "operator": self.operator.to_string(),
            "power": self.power.to_string(),
            "pub_key": hex::encode(&self.pub_key),
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct StakingAppModule;

impl Module for StakingAppModule {
    fn name(&self) -> &str {
        "stakingapp"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["staking".into()]
    }

    fn register_msg_handlers(&self) -> BTreeMap<String, MsgHandler> {
        let mut handlers: BTreeMap<String, MsgHandler> = BTreeMap::new();
        handlers.insert(
            "/punnet.staking.v1.MsgCreateValidator".into(),
            Arc::new(|_ctx: &Context, msg: &dyn Message| {
                let create = msg
                    .as_any()
                    .downcast_ref::<MsgCreateValidator>()
                    .ok_or_else(|| RuntimeError::Handler("unexpected message type".into()))?;
                Ok(vec![
                    Effect::SetValidator(Validator {
                        pub_key: create.pub_key.clone(),
                        power: create.power,
                        delegator: create.operator.clone(),
                        commission: 0,
                        active: true,
                    }),
                    Effect::SetDelegation(Delegation {
                        delegator: create.operator.clone(),
                        validator: create.pub_key.clone(),
                        shares: create.power as u64,
                    }),
                ])
            }),
        );
        handlers
    }
}

// --- Harness ----------------------------------------------------------------

struct Chain {
    runtime: Runtime,
}

impl Chain {
    fn start(genesis: GenesisState) -> Self {
        let runtime = Runtime::builder(CHAIN_ID)
            .module(Arc::new(PaymentsModule))
            .module(Arc::new(StakingAppModule))
            .genesis(genesis)
            .build()
            .unwrap();
        let mut chain = Self { runtime };
        chain.begin(1);
        chain
    }

    fn begin(&mut self, height: i64) {
        self.runtime
            .begin_block(BlockHeader::new(height, 1_700_000_000, CHAIN_ID, vec![0xAA]))
            .unwrap();
    }

    fn balance(&self, account: &str, denom: &str) -> u64 {
        self.runtime
            .balances()
            .get_balance(&name(account), denom)
            .unwrap()
            .amount
    }

    fn nonce(&self, account: &str) -> u64 {
        self.runtime.accounts().get_nonce(&name(account)).unwrap()
    }
}

fn single_key_genesis(entries: &[(&str, &Ed25519KeyPair, u64)]) -> GenesisState {
    GenesisState {
        accounts: entries
            .iter()
            .map(|(n, key, _)| Account::new_single_key(name(n), key.public_key()))
            .collect(),
        balances: entries
            .iter()
            .filter(|(_, _, amount)| *amount > 0)
            .map(|(n, _, amount)| Balance::new(name(n), "stake", *amount))
            .collect(),
        validators: Vec::new(),
    }
}

fn send_tx(signer: &Ed25519KeyPair, from: &str, to: &str, amount: u64, nonce: u64) -> Tx {
    let mut tx = Tx {
        account: name(from),
        nonce,
        memo: String::new(),
        msgs: vec![Arc::new(MsgSend {
            from: name(from),
            to: name(to),
            denom: "stake".into(),
            amount,
        })],
        fee: Fee::default(),
        fee_slippage: FeeSlippage::default(),
        authorization: Authorization::default(),
    };
    let sign_bytes = tx.sign_bytes(CHAIN_ID, nonce).unwrap();
    tx.authorization = Authorization::single(signer.public_key(), signer.sign(&sign_bytes));
    tx
}

// --- Seed scenarios ---------------------------------------------------------

#[test]
fn simple_transfer() {
    let alice_key = Ed25519KeyPair::generate();
    let bob_key = Ed25519KeyPair::generate();
    let mut chain = Chain::start(single_key_genesis(&[
        ("alice", &alice_key, 1000),
        ("bob", &bob_key, 0),
    ]));

    chain
        .runtime
        .deliver_tx(&send_tx(&alice_key, "alice", "bob", 300, 0))
        .unwrap();

    assert_eq!(chain.balance("alice", "stake"), 700);
    assert_eq!(chain.balance("bob", "stake"), 300);
    assert_eq!(chain.nonce("alice"), 1);

    let events = chain.runtime.events();
    assert_eq!(events.len(), 1);
    let BlockEvent {
        tx_index,
        kind,
        attrs,
    } = &events[0];
    assert_eq!(*tx_index, 0);
    assert_eq!(kind, "bank.send");
    let keys: Vec<&str> = attrs.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["amount", "denom", "from", "height", "to"]);
    assert_eq!(attrs[0].1, b"300".to_vec());
    assert_eq!(attrs[3].1, b"1".to_vec());

    // Committing yields a real versioned root (genesis was version 1).
    let (root, version) = chain.runtime.commit().unwrap();
    assert_eq!(version, 2);
    assert_ne!(root, [0u8; 32]);
}

#[test]
fn insufficient_funds_leaves_no_trace() {
    let alice_key = Ed25519KeyPair::generate();
    let bob_key = Ed25519KeyPair::generate();
    let mut chain = Chain::start(single_key_genesis(&[
        ("alice", &alice_key, 100),
        ("bob", &bob_key, 0),
    ]));

    let err = chain
        .runtime
        .deliver_tx(&send_tx(&alice_key, "alice", "bob", 200, 0))
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::State(StateError::InsufficientFunds { .. })
    ));

    assert_eq!(chain.balance("alice", "stake"), 100);
    assert_eq!(chain.balance("bob", "stake"), 0);
    assert_eq!(chain.nonce("alice"), 0);
    assert!(chain.runtime.events().is_empty());
}

#[test]
fn wrong_nonce_is_rejected_without_side_effects() {
    let alice_key = Ed25519KeyPair::generate();
    let bob_key = Ed25519KeyPair::generate();
    let mut genesis = single_key_genesis(&[("alice", &alice_key, 1000), ("bob", &bob_key, 0)]);
    genesis.accounts[0].nonce = 5;
    let mut chain = Chain::start(genesis);

    let err = chain
        .runtime
        .deliver_tx(&send_tx(&alice_key, "alice", "bob", 10, 0))
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Tx(TxError::InvalidNonce { expected: 5, got: 0 })
    ));
    assert_eq!(chain.balance("alice", "stake"), 1000);
    assert_eq!(chain.nonce("alice"), 5);
}

#[test]
fn weighted_multisig_thresholds() {
    let admin = Ed25519KeyPair::generate();
    let user1 = Ed25519KeyPair::generate();
    let user2 = Ed25519KeyPair::generate();
    let bob_key = Ed25519KeyPair::generate();

    let multi = Account {
        name: name("multi"),
        authority: Authority {
            threshold: 3,
            key_weights: [
                (PubKeyBytes::from(admin.public_key()), 3),
                (PubKeyBytes::from(user1.public_key()), 1),
                (PubKeyBytes::from(user2.public_key()), 1),
            ]
            .into_iter()
            .collect(),
            account_weights: BTreeMap::new(),
        },
        nonce: 0,
    };
    let genesis = GenesisState {
        accounts: vec![
            multi,
            Account::new_single_key(name("bob"), bob_key.public_key()),
        ],
        balances: vec![Balance::new(name("multi"), "stake", 1000)],
        validators: Vec::new(),
    };
    let mut chain = Chain::start(genesis);

    let multisig_tx = |signers: &[&Ed25519KeyPair], nonce: u64| -> Tx {
        let mut tx = send_tx(&admin, "multi", "bob", 10, nonce);
        let sign_bytes = tx.sign_bytes(CHAIN_ID, nonce).unwrap();
        tx.authorization = Authorization {
            signatures: signers
                .iter()
                .map(|k| Signature {
                    pub_key: PubKeyBytes::from(k.public_key()),
                    signature: k.sign(&sign_bytes),
                })
                .collect(),
            account_authorizations: BTreeMap::new(),
        };
        tx
    };

    // (a) admin alone: weight 3 >= 3.
    chain.runtime.deliver_tx(&multisig_tx(&[&admin], 0)).unwrap();

    // (b) the two users alone: weight 2 < 3.
    let err = chain
        .runtime
        .deliver_tx(&multisig_tx(&[&user1, &user2], 1))
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Tx(TxError::Auth(AuthError::InsufficientWeight {
            have: 2,
            need: 3
        }))
    ));

    // (c) admin plus one user: weight 4 >= 3.
    chain
        .runtime
        .deliver_tx(&multisig_tx(&[&admin, &user1], 1))
        .unwrap();
    assert_eq!(chain.nonce("multi"), 2);
    assert_eq!(chain.balance("bob", "stake"), 20);
}

#[test]
fn delegation_cycle_is_detected() {
    let alice = Account {
        name: name("alice"),
        authority: Authority {
            threshold: 1,
            key_weights: BTreeMap::new(),
            account_weights: [(name("bob"), 1)].into_iter().collect(),
        },
        nonce: 0,
    };
    let bob = Account {
        name: name("bob"),
        authority: Authority {
            threshold: 1,
            key_weights: BTreeMap::new(),
            account_weights: [(name("alice"), 1)].into_iter().collect(),
        },
        nonce: 0,
    };
    let genesis = GenesisState {
        accounts: vec![alice, bob],
        balances: vec![Balance::new(name("alice"), "stake", 100)],
        validators: Vec::new(),
    };
    let mut chain = Chain::start(genesis);

    let mut tx = send_tx(&Ed25519KeyPair::generate(), "alice", "bob", 10, 0);
    tx.authorization = Authorization::default().with_account(
        name("bob"),
        Authorization::default().with_account(name("alice"), Authorization::default()),
    );

    let err = chain.runtime.deliver_tx(&tx).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Tx(TxError::Auth(AuthError::CycleDetected(_)))
    ));
}

#[test]
fn commit_root_is_independent_of_write_order() {
    let alice_key = Ed25519KeyPair::generate();
    let bob_key = Ed25519KeyPair::generate();

    let run = |alice_first: bool| -> [u8; 32] {
        let mut chain = Chain::start(single_key_genesis(&[
            ("alice", &alice_key, 1000),
            ("bob", &bob_key, 1000),
        ]));
        let alice_tx = send_tx(&alice_key, "alice", "bob", 10, 0);
        let bob_tx = send_tx(&bob_key, "bob", "alice", 10, 0);
        let (first, second) = if alice_first {
            (&alice_tx, &bob_tx)
        } else {
            (&bob_tx, &alice_tx)
        };
        chain.runtime.deliver_tx(first).unwrap();
        chain.runtime.deliver_tx(second).unwrap();
        chain.runtime.commit().unwrap().0
    };

    // Same logical end state reached through differently-ordered writes.
    assert_eq!(run(true), run(false));
}

// --- Runtime behavior beyond the seeds --------------------------------------

#[test]
fn failing_message_rolls_back_the_whole_transaction() {
    let alice_key = Ed25519KeyPair::generate();
    let bob_key = Ed25519KeyPair::generate();
    let mut chain = Chain::start(single_key_genesis(&[
        ("alice", &alice_key, 100),
        ("bob", &bob_key, 0),
    ]));

    // One transaction, two messages: the first succeeds, the second
    // overdraws. Everything must unwind.
    let mut tx = Tx {
        account: name("alice"),
        nonce: 0,
        memo: String::new(),
        msgs: vec![
            Arc::new(MsgSend {
                from: name("alice"),
                to: name("bob"),
                denom: "stake".into(),
                amount: 60,
            }),
            Arc::new(MsgSend {
                from: name("alice"),
                to: name("bob"),
                denom: "stake".into(),
                amount: 60,
            }),
        ],
        fee: Fee::default(),
        fee_slippage: FeeSlippage::default(),
        authorization: Authorization::default(),
    };
    let sign_bytes = tx.sign_bytes(CHAIN_ID, 0).unwrap();
    tx.authorization = Authorization::single(alice_key.public_key(), alice_key.sign(&sign_bytes));

    let err = chain.runtime.deliver_tx(&tx).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::State(StateError::InsufficientFunds { .. })
    ));
    assert_eq!(chain.balance("alice", "stake"), 100);
    assert_eq!(chain.balance("bob", "stake"), 0);
    assert_eq!(chain.nonce("alice"), 0);
    assert!(chain.runtime.events().is_empty());
}

#[test]
fn validator_updates_flow_to_end_block() {
    let op_key = Ed25519KeyPair::generate();
    let mut chain = Chain::start(single_key_genesis(&[("operator", &op_key, 0)]));

    let mut tx = Tx {
        account: name("operator"),
        nonce: 0,
        memo: String::new(),
        msgs: vec![Arc::new(MsgCreateValidator {
            operator: name("operator"),
            pub_key: vec![0xBB; 32],
            power: 25,
        })],
        fee: Fee::default(),
        fee_slippage: FeeSlippage::default(),
        authorization: Authorization::default(),
    };
    let sign_bytes = tx.sign_bytes(CHAIN_ID, 0).unwrap();
    tx.authorization = Authorization::single(op_key.public_key(), op_key.sign(&sign_bytes));
    chain.runtime.deliver_tx(&tx).unwrap();

    let updates = chain.runtime.end_block().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].pub_key, vec![0xBB; 32]);
    assert_eq!(updates[0].power, 25);

    chain.runtime.commit().unwrap();
    assert!(chain
        .runtime
        .validators()
        .has_delegation(&name("operator"), &[0xBB; 32])
        .unwrap());
}

#[test]
fn unknown_message_type_is_rejected() {
    let alice_key = Ed25519KeyPair::generate();
    let mut chain = Chain::start(single_key_genesis(&[("alice", &alice_key, 10)]));

    #[derive(Debug)]
    struct MsgUnknown(AccountName);
    impl Message for MsgUnknown {
        fn type_url(&self) -> &str {
            "/punnet.unknown.v1.MsgNope"
        }
        fn validate_basic(&self) -> Result<(), TxError> {
            Ok(())
        }
        fn signers(&self) -> Vec<AccountName> {
            vec![self.0.clone()]
        }
        fn sign_doc_data(&self) -> Result<Value, TxError> {
            Ok(Value::Null)
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    let mut tx = Tx {
        account: name("alice"),
        nonce: 0,
        memo: String::new(),
        msgs: vec![Arc::new(MsgUnknown(name("alice")))],
        fee: Fee::default(),
        fee_slippage: FeeSlippage::default(),
        authorization: Authorization::default(),
    };
    let sign_bytes = tx.sign_bytes(CHAIN_ID, 0).unwrap();
    tx.authorization = Authorization::single(alice_key.public_key(), alice_key.sign(&sign_bytes));

    let err = chain.runtime.deliver_tx(&tx).unwrap_err();
    assert!(matches!(err, RuntimeError::UnknownMsgType(_)));
    assert_eq!(chain.nonce("alice"), 0);
}

#[test]
fn queries_route_by_path() {
    let alice_key = Ed25519KeyPair::generate();
    let mut chain = Chain::start(single_key_genesis(&[("alice", &alice_key, 777)]));
    chain.runtime.commit().unwrap();

    let amount = chain
        .runtime
        .query("/punnet.bank.v1.balance", b"alice/stake")
        .unwrap();
    assert_eq!(amount, b"777".to_vec());

    assert!(matches!(
        chain.runtime.query("/punnet.nope", b""),
        Err(RuntimeError::UnknownQueryPath(_))
    ));
}

#[test]
fn block_lifecycle_is_enforced() {
    let alice_key = Ed25519KeyPair::generate();
    let chain = Chain::start(single_key_genesis(&[("alice", &alice_key, 10)]));
    let mut runtime = chain.runtime;

    // Double begin.
    assert!(matches!(
        runtime.begin_block(BlockHeader::new(2, 0, CHAIN_ID, vec![])),
        Err(RuntimeError::Lifecycle(_))
    ));

    // Wrong chain id.
    runtime.commit().unwrap();
    assert!(matches!(
        runtime.begin_block(BlockHeader::new(2, 0, "other-chain", vec![])),
        Err(RuntimeError::Lifecycle(_))
    ));

    // Deliver and commit outside a block.
    assert!(matches!(
        runtime.deliver_tx(&send_tx(&alice_key, "alice", "alice", 1, 0)),
        Err(RuntimeError::Lifecycle(_))
    ));
    assert!(matches!(runtime.commit(), Err(RuntimeError::Lifecycle(_))));
}

#[test]
fn duplicate_and_cyclic_modules_are_rejected_at_startup() {
    struct Dup;
    impl Module for Dup {
        fn name(&self) -> &str {
            "payments"
        }
        fn register_msg_handlers(&self) -> BTreeMap<String, MsgHandler> {
            BTreeMap::new()
        }
    }
    let err = Runtime::builder(CHAIN_ID)
        .module(Arc::new(PaymentsModule))
        .module(Arc::new(Dup))
        .build()
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, RuntimeError::DuplicateModule(_)));

    struct NeedsGhost;
    impl Module for NeedsGhost {
        fn name(&self) -> &str {
            "ghostly"
        }
        fn dependencies(&self) -> Vec<String> {
            vec!["ghost".into()]
        }
        fn register_msg_handlers(&self) -> BTreeMap<String, MsgHandler> {
            BTreeMap::new()
        }
    }
    let err = Runtime::builder(CHAIN_ID)
        .module(Arc::new(NeedsGhost))
        .build()
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, RuntimeError::MissingDependency { .. }));
}

#[test]
fn cancelled_scope_halts_delivery() {
    let alice_key = Ed25519KeyPair::generate();
    let bob_key = Ed25519KeyPair::generate();
    let mut chain = Chain::start(single_key_genesis(&[
        ("alice", &alice_key, 1000),
        ("bob", &bob_key, 0),
    ]));

    chain.runtime.scope().cancel();
    let err = chain
        .runtime
        .deliver_tx(&send_tx(&alice_key, "alice", "bob", 1, 0))
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Store(punnet_types::error::StoreError::Cancelled)
    ));
}
