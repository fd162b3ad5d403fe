//! The iteration driver (spec.md §4.6): walks a network's topological
//! layering in order, resolving each node's belief via the signal combiner.

use std::collections::HashMap;

use crate::cache::DiamondCache;
use crate::combiner;
use crate::config::EngineConfig;
use crate::error::BeliefError;
use crate::graph::{Belief, BeliefStore, DiamondsAtNode, Network, NodeId, NodeState};

/// Propagate beliefs across `network` and return every node's resolved
/// belief. `diamonds_at_node` is the full, already-decomposed per-join
/// record (diamond *detection* is out of scope here, per spec.md's
/// Non-goals — the caller supplies it).
pub fn update_beliefs(
    network: &Network,
    diamonds_at_node: &HashMap<NodeId, DiamondsAtNode>,
    config: &EngineConfig,
) -> Result<HashMap<NodeId, Belief>, BeliefError> {
    let cache = DiamondCache::new();
    let store = run(network, diamonds_at_node, config, &cache, 0, BeliefStore::new(), None)?;
    Ok(store.into_map())
}

/// Shared by [`update_beliefs`] and [`crate::diamond`]'s per-state
/// sub-iterations: `seed` may already hold `Resolved` nodes (a diamond's
/// pinned conditioning nodes), which this skips over rather than
/// re-resolving.
///
/// `join_override` lets [`crate::diamond`] run a diamond's own restricted
/// sub-network without that diamond's join re-triggering *itself* through
/// the global `diamonds_at_node` map: within D's own relevant_nodes, J's
/// immediate parents are independent by construction of the conditioning
/// set, so J is resolved there as a plain (non-diamond) node using its
/// local parents, while every *other* node keeps its normal global lookup
/// (picking up genuinely nested diamonds elsewhere in D's subgraph).
#[allow(clippy::too_many_arguments)]
pub(crate) fn run(
    network: &Network,
    diamonds_at_node: &HashMap<NodeId, DiamondsAtNode>,
    config: &EngineConfig,
    cache: &DiamondCache,
    depth: u32,
    mut store: BeliefStore,
    join_override: Option<(NodeId, &DiamondsAtNode)>,
) -> Result<BeliefStore, BeliefError> {
    for layer in &network.iteration_sets {
        for &node in layer {
            if store.state(node) == NodeState::Resolved {
                continue;
            }
            store.begin_resolving(node)?;
            let belief = if network.parents(node).next().is_none() {
                network.prior(node)?.clone()
            } else {
                let dn = match join_override {
                    Some((overridden, dn)) if overridden == node => Some(dn),
                    _ => diamonds_at_node.get(&node),
                };
                combiner::resolve_node(network, node, dn, &store, diamonds_at_node, cache, config, depth)?
            };
            store.resolve(node, belief)?;
        }
    }
    Ok(store)
}
