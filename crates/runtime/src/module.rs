//! The module contract.
//!
//! A module contributes message handlers keyed by stable type URLs and query
//! handlers keyed by path, and declares its dependencies statically. The
//! runtime validates the configuration (unique names, resolvable and acyclic
//! dependencies) at startup and owns all dispatch.

use crate::context::Context;
use punnet_state::{AccountCapability, BalanceCapability, ValidatorCapability};
use punnet_tx::Message;
use punnet_types::effect::Effect;
use punnet_types::error::RuntimeError;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A message handler: a pure function of `(context, message)` returning the
/// effects to apply. Handlers never mutate state directly.
pub type MsgHandler =
    Arc<dyn Fn(&Context, &dyn Message) -> Result<Vec<Effect>, RuntimeError> + Send + Sync>;

/// Read-only capability views handed to query handlers.
pub struct QueryContext<'a> {
    /// The account capability.
    pub accounts: &'a AccountCapability,
    /// The balance capability.
    pub balances: &'a BalanceCapability,
    /// The validator capability.
    pub validators: &'a ValidatorCapability,
}

/// A query handler over committed state.
pub type QueryHandler =
    Arc<dyn Fn(&QueryContext<'_>, &[u8]) -> Result<Vec<u8>, RuntimeError> + Send + Sync>;

/// A runtime module.
pub trait Module: Send + Sync {
    /// The module's unique name (also its capability key space).
    fn name(&self) -> &str;

    /// Names of modules this module depends on.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// The message handlers this module registers, keyed by type URL.
    fn register_msg_handlers(&self) -> BTreeMap<String, MsgHandler>;

    /// The query handlers this module registers, keyed by path.
    fn register_query_handlers(&self) -> BTreeMap<String, QueryHandler> {
        BTreeMap::new()
    }
}

/// Validates a module configuration: unique names, dependencies resolvable
/// against `known` (the core modules) plus the provided set, and no cycles.
pub(crate) fn validate_modules(
    modules: &[Arc<dyn Module>],
    known: &[&str],
) -> Result<(), RuntimeError> {
    let mut names: BTreeSet<String> = known.iter().map(|s| s.to_string()).collect();
    for module in modules {
        if !names.insert(module.name().to_string()) {
            return Err(RuntimeError::DuplicateModule(module.name().to_string()));
        }
    }

    let deps: BTreeMap<String, Vec<String>> = modules
        .iter()
        .map(|m| (m.name().to_string(), m.dependencies()))
        .collect();

    for (module, dependencies) in &deps {
        for dependency in dependencies {
            if !names.contains(dependency) {
                return Err(RuntimeError::MissingDependency {
                    module: module.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    // Depth-first walk over the declared graph; core modules are leaves.
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }
    fn visit(
        node: &str,
        deps: &BTreeMap<String, Vec<String>>,
        marks: &mut BTreeMap<String, Mark>,
    ) -> Result<(), RuntimeError> {
        match marks.get(node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(RuntimeError::CyclicDependency(node.to_string()))
            }
            None => {}
        }
        marks.insert(node.to_string(), Mark::Visiting);
        if let Some(dependencies) = deps.get(node) {
            for dependency in dependencies {
                visit(dependency, deps, marks)?;
            }
        }
        marks.insert(node.to_string(), Mark::Done);
        Ok(())
    }

    let mut marks = BTreeMap::new();
    for module in deps.keys() {
        visit(module, &deps, &mut marks)?;
    }
    Ok(())
}
