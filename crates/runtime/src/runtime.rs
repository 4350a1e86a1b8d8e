//! The runtime driver: capability wiring, genesis, and the block lifecycle.

use crate::context::Context;
use crate::effects::{apply_effects, UndoLog};
use crate::module::{validate_modules, Module, MsgHandler, QueryContext, QueryHandler};
use punnet_state::{
    AccountCapability, BalanceCapability, CapabilityManager, ValidatorCapability,
};
use punnet_store::{share, CacheConfig, CancelScope, MerkleStore, SharedKvStore, VersionedKvStore};
use punnet_tx::{verify_tx, Tx};
use punnet_types::account::Account;
use punnet_types::balance::Balance;
use punnet_types::block::BlockHeader;
use punnet_types::error::{RuntimeError, StoreError};
use punnet_types::staking::{Validator, ValidatorUpdate};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The core modules the runtime always registers, in capability order.
const CORE_MODULES: [&str; 3] = ["auth", "bank", "staking"];

/// Chain-level configuration.
#[derive(Clone, Debug)]
pub struct ChainConfig {
    /// The chain identifier bound into every sign doc.
    pub chain_id: String,
    /// Cache geometry for granted capability stores.
    pub cache: CacheConfig,
}

impl ChainConfig {
    /// A configuration with default cache geometry.
    pub fn new<S: Into<String>>(chain_id: S) -> Self {
        Self {
            chain_id: chain_id.into(),
            cache: CacheConfig::default(),
        }
    }
}

/// Initial state written through the capabilities and committed as version 1
/// before the first block.
#[derive(Default)]
pub struct GenesisState {
    /// Accounts to create.
    pub accounts: Vec<Account>,
    /// Balances to credit.
    pub balances: Vec<Balance>,
    /// Validators to install.
    pub validators: Vec<Validator>,
}

/// An event recorded in the block event log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockEvent {
    /// The index of the emitting transaction within the block.
    pub tx_index: u64,
    /// The event type, e.g. `"bank.send"`.
    pub kind: String,
    /// Attributes in sorted key order.
    pub attrs: Vec<(String, Vec<u8>)>,
}

/// Builds a [`Runtime`].
pub struct RuntimeBuilder {
    config: ChainConfig,
    backing: Option<SharedKvStore>,
    modules: Vec<Arc<dyn Module>>,
    genesis: GenesisState,
}

impl RuntimeBuilder {
    /// Starts a builder for the given chain id.
    pub fn new<S: Into<String>>(chain_id: S) -> Self {
        Self {
            config: ChainConfig::new(chain_id),
            backing: None,
            modules: Vec::new(),
            genesis: GenesisState::default(),
        }
    }

    /// Uses an explicit backing store instead of a fresh Merkle store.
    pub fn backing(mut self, backing: SharedKvStore) -> Self {
        self.backing = Some(backing);
        self
    }

    /// Overrides the cache geometry of granted stores.
    pub fn cache_config(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    /// Adds an application module.
    pub fn module(mut self, module: Arc<dyn Module>) -> Self {
        self.modules.push(module);
        self
    }

    /// Sets the genesis state.
    pub fn genesis(mut self, genesis: GenesisState) -> Self {
        self.genesis = genesis;
        self
    }

    /// Validates the configuration, wires the capabilities, applies genesis,
    /// and commits version 1.
    pub fn build(self) -> Result<Runtime, RuntimeError> {
        if self.config.chain_id.is_empty() {
            return Err(RuntimeError::Lifecycle("chain id must be non-empty".into()));
        }
        validate_modules(&self.modules, &CORE_MODULES)?;

        let backing = self
            .backing
            .unwrap_or_else(|| share(MerkleStore::new()));
        let manager = CapabilityManager::with_cache_config(backing, self.config.cache);

        for core in CORE_MODULES {
            manager.register_module(core)?;
        }
        for module in &self.modules {
            manager.register_module(module.name())?;
        }

        let scope = CancelScope::new();
        let accounts = manager.grant_account_capability("auth", scope.clone())?;
        let balances = manager.grant_balance_capability("bank", scope.clone())?;
        let validators = manager.grant_validator_capability("staking", scope.clone())?;

        let mut handlers: BTreeMap<String, MsgHandler> = BTreeMap::new();
        let mut queries: BTreeMap<String, QueryHandler> = BTreeMap::new();
        for module in &self.modules {
            for (type_url, handler) in module.register_msg_handlers() {
                if handlers.insert(type_url.clone(), handler).is_some() {
                    return Err(RuntimeError::DuplicateHandler(type_url));
                }
            }
            for (path, handler) in module.register_query_handlers() {
                if queries.insert(path.clone(), handler).is_some() {
                    return Err(RuntimeError::DuplicateHandler(path));
                }
            }
        }

        let mut runtime = Runtime {
            config: self.config,
            manager,
            accounts,
            balances,
            validators,
            handlers,
            queries,
            header: None,
            events: Vec::new(),
            tx_index: 0,
            scope,
        };
        runtime.apply_genesis(self.genesis)?;
        Ok(runtime)
    }
}

/// The module runtime.
///
/// Transactions within a block are processed serially for determinism;
/// effect application within a transaction is serial as well.
pub struct Runtime {
    config: ChainConfig,
    manager: CapabilityManager,
    accounts: AccountCapability,
    balances: BalanceCapability,
    validators: ValidatorCapability,
    handlers: BTreeMap<String, MsgHandler>,
    queries: BTreeMap<String, QueryHandler>,
    header: Option<BlockHeader>,
    events: Vec<BlockEvent>,
    tx_index: u64,
    scope: CancelScope,
}

impl Runtime {
    /// Starts a builder.
    pub fn builder<S: Into<String>>(chain_id: S) -> RuntimeBuilder {
        RuntimeBuilder::new(chain_id)
    }

    fn apply_genesis(&mut self, genesis: GenesisState) -> Result<(), RuntimeError> {
        for account in genesis.accounts {
            self.accounts.init_account(account)?;
        }
        for balance in genesis.balances {
            self.balances.set_balance(balance)?;
        }
        for validator in genesis.validators {
            self.validators.set_validator(validator)?;
        }
        let (root, version) = self.commit_stores()?;
        tracing::info!(
            target: "runtime",
            chain_id = %self.config.chain_id,
            version,
            root = %hex::encode(root),
            "genesis committed"
        );
        Ok(())
    }

    /// Starts a block. The header's chain id must match the configuration.
    pub fn begin_block(&mut self, header: BlockHeader) -> Result<(), RuntimeError> {
        if self.header.is_some() {
            return Err(RuntimeError::Lifecycle("a block is already in progress".into()));
        }
        if header.chain_id != self.config.chain_id {
            return Err(RuntimeError::Lifecycle(format!(
                "header chain id '{}' does not match '{}'",
                header.chain_id, self.config.chain_id
            )));
        }
        tracing::debug!(target: "runtime", height = header.height, "begin block");
        self.events.clear();
        self.tx_index = 0;
        self.header = Some(header);
        Ok(())
    }

    /// Verifies and executes one transaction.
    ///
    /// On any handler or effect failure the transaction's mutations are
    /// rolled back and the nonce is not incremented. On success the primary
    /// signer's nonce increments exactly once, through the same rollback
    /// scope as the effects.
    pub fn deliver_tx(&mut self, tx: &Tx) -> Result<(), RuntimeError> {
        let header = self
            .header
            .clone()
            .ok_or_else(|| RuntimeError::Lifecycle("no block in progress".into()))?;
        self.scope.check().map_err(RuntimeError::Store)?;

        let account = verify_tx(&self.accounts, &self.config.chain_id, tx)?;
        let context = Context {
            header,
            signer: account.name.clone(),
            scope: self.scope.clone(),
        };

        // Handlers are pure: collect every effect before touching state.
        let mut effects = Vec::new();
        for msg in &tx.msgs {
            let handler = self
                .handlers
                .get(msg.type_url())
                .ok_or_else(|| RuntimeError::UnknownMsgType(msg.type_url().to_string()))?;
            effects.extend(handler(&context, msg.as_ref())?);
        }

        let mut undo = UndoLog::new();
        let pending = match apply_effects(&self.balances, &self.validators, &effects, &mut undo) {
            Ok(pending) => pending,
            Err(err) => {
                tracing::debug!(target: "runtime", error = %err, "transaction failed; rolling back");
                undo.unwind(&self.accounts, &self.balances, &self.validators);
                return Err(err);
            }
        };

        // The nonce increment is itself an effect in the same rollback scope.
        undo.record_account(account.clone());
        if let Err(err) = self.accounts.increment_nonce(&account.name) {
            tracing::debug!(target: "runtime", error = %err, "nonce increment failed; rolling back");
            undo.unwind(&self.accounts, &self.balances, &self.validators);
            return Err(err.into());
        }

        for event in pending {
            self.events.push(BlockEvent {
                tx_index: self.tx_index,
                kind: event.kind,
                attrs: event.attrs,
            });
        }
        self.tx_index += 1;
        Ok(())
    }

    /// Ends the block, reporting validator updates for the consensus driver.
    pub fn end_block(&mut self) -> Result<Vec<ValidatorUpdate>, RuntimeError> {
        if self.header.is_none() {
            return Err(RuntimeError::Lifecycle("no block in progress".into()));
        }
        // Make this block's validator writes visible to the scan.
        self.validators.write_through()?;
        Ok(self.validators.get_validator_set()?)
    }

    /// Commits the block: writes every capability through in deterministic
    /// (module-name) order, then saves a version of the backing store.
    pub fn commit(&mut self) -> Result<([u8; 32], u64), RuntimeError> {
        if self.header.is_none() {
            return Err(RuntimeError::Lifecycle("no block in progress".into()));
        }
        let (root, version) = self.commit_stores()?;
        self.header = None;
        tracing::debug!(
            target: "runtime",
            version,
            root = %hex::encode(root),
            "block committed"
        );
        Ok((root, version))
    }

    fn commit_stores(&self) -> Result<([u8; 32], u64), RuntimeError> {
        // Capability order mirrors sorted module names: auth, bank, staking.
        self.accounts.write_through()?;
        self.balances.write_through()?;
        self.validators.write_through()?;

        let backing = self.manager.backing();
        let mut guard = backing.write();
        if let Some(versioned) = guard.as_any_mut().downcast_mut::<MerkleStore>() {
            Ok(versioned.save_version()?)
        } else {
            // A plain backing store has no versions; flush and report the
            // zero root.
            guard.flush()?;
            Ok(([0u8; 32], 0))
        }
    }

    /// Routes a query to the module that registered its path.
    pub fn query(&self, path: &str, data: &[u8]) -> Result<Vec<u8>, RuntimeError> {
        let handler = self
            .queries
            .get(path)
            .ok_or_else(|| RuntimeError::UnknownQueryPath(path.to_string()))?;
        let context = QueryContext {
            accounts: &self.accounts,
            balances: &self.balances,
            validators: &self.validators,
        };
        handler(&context, data)
    }

    /// The events of the block most recently delivered into. Cleared by the
    /// next `begin_block`.
    pub fn events(&self) -> &[BlockEvent] {
        &self.events
    }

    /// The account capability.
    pub fn accounts(&self) -> &AccountCapability {
        &self.accounts
    }

    /// The balance capability.
    pub fn balances(&self) -> &BalanceCapability {
        &self.balances
    }

    /// The validator capability.
    pub fn validators(&self) -> &ValidatorCapability {
        &self.validators
    }

    /// The chain configuration.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// The runtime's cancellation scope.
    pub fn scope(&self) -> &CancelScope {
        &self.scope
    }

    /// Closes every capability and then the backing store.
    pub fn close(&self) -> Result<(), StoreError> {
        self.accounts.close();
        self.balances.close();
        self.validators.close();
        self.manager.close()
    }
}
