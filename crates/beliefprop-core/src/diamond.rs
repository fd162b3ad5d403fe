//! The diamond evaluator (spec.md §4.4): exact conditional enumeration over
//! a diamond's conditioning ancestors ("highest nodes"), recursing into the
//! iteration driver on the diamond's own subgraph for each conditioning
//! state.

use std::collections::HashMap;

use indexmap::IndexSet;

use crate::algebra::{clamp, ValueAlgebra};
use crate::cache::{DiamondCache, DiamondCacheKey};
use crate::config::EngineConfig;
use crate::driver;
use crate::error::BeliefError;
use crate::graph::{Belief, BeliefStore, Diamond, DiamondsAtNode, Network, NodeId};

/// Evaluate `diamond`'s contribution to `join`'s belief. `outer` must have
/// every node in `diamond.highest_nodes` already `Resolved` (invariant 4,
/// spec.md §3) — a diamond is only evaluated once its conditioning
/// ancestors have a belief to condition on.
pub fn update_diamond_join(
    diamond: &Diamond,
    join: NodeId,
    outer: &BeliefStore,
    network: &Network,
    diamonds_at_node: &HashMap<NodeId, DiamondsAtNode>,
    cache: &DiamondCache,
    config: &EngineConfig,
) -> Result<Belief, BeliefError> {
    update_diamond_join_at_depth(diamond, join, outer, network, diamonds_at_node, cache, config, 1)
}

/// Depth-tracked entry point, called directly by [`crate::combiner`] so
/// nested diamonds (a join inside D's own subgraph with its own diamond
/// group) share one recursion counter with their enclosing call.
#[allow(clippy::too_many_arguments)]
pub(crate) fn update_diamond_join_at_depth(
    diamond: &Diamond,
    join: NodeId,
    outer: &BeliefStore,
    network: &Network,
    diamonds_at_node: &HashMap<NodeId, DiamondsAtNode>,
    cache: &DiamondCache,
    config: &EngineConfig,
    depth: u32,
) -> Result<Belief, BeliefError> {
    if depth > config.max_depth {
        return Err(BeliefError::topology(
            join,
            format!("diamond recursion exceeded max_depth={}", config.max_depth),
        ));
    }

    let compute = || evaluate(diamond, join, outer, network, diamonds_at_node, cache, config, depth);

    if config.caching_enabled {
        let key = DiamondCacheKey::build(diamond, outer);
        cache.get_or_insert_with(key, compute)
    } else {
        compute()
    }
}

#[allow(clippy::too_many_arguments)]
fn evaluate(
    diamond: &Diamond,
    join: NodeId,
    outer: &BeliefStore,
    network: &Network,
    diamonds_at_node: &HashMap<NodeId, DiamondsAtNode>,
    cache: &DiamondCache,
    config: &EngineConfig,
    depth: u32,
) -> Result<Belief, BeliefError> {
    for &h in &diamond.highest_nodes {
        outer.require(h)?;
    }

    // The diamond evaluator's contract is the *pre-prior* signal at J (see
    // the Diamond cache entry definition, spec.md §3): J's own prior is
    // applied exactly once, by the caller's signal combiner, after this
    // returns. Pin J's prior to the identity inside the sub-network so the
    // ordinary per-node combiner logic — which always multiplies by
    // `node_priors[N]` — doesn't apply it here too.
    let mut sub_network = network.restrict(&diamond.relevant_nodes, &diamond.edges);
    let identity = network.prior(join)?.one();
    sub_network.node_priors.insert(join, identity);

    // Within D's own subgraph, J's immediate parents are independent given
    // the conditioning on `highest_nodes` — that's what makes D a diamond
    // decomposition in the first place. Route J through a plain
    // non-diamond lookup using D's local edges so the sub-iteration
    // doesn't re-discover D as J's diamond group and recurse on itself.
    let join_parents: IndexSet<NodeId> = sub_network
        .incoming
        .get(&join)
        .into_iter()
        .flatten()
        .copied()
        .collect();
    let join_as_plain_node = DiamondsAtNode {
        diamonds: vec![],
        non_diamond_parents: join_parents,
    };

    if diamond.highest_nodes.is_empty() {
        // n = 0 tie-break: run the sub-iteration once, unconditioned.
        let result_store = driver::run(
            &sub_network,
            diamonds_at_node,
            config,
            cache,
            depth,
            BeliefStore::new(),
            Some((join, &join_as_plain_node)),
        )?;
        return Ok(result_store.require(join)?.clone());
    }

    let n = diamond.highest_nodes.len();
    let mut total: Option<Belief> = None;
    for mask in 0u32..(1u32 << n) {
        let mut seed = BeliefStore::new();
        let mut p_state: Option<Belief> = None;
        for (i, &h) in diamond.highest_nodes.iter().enumerate() {
            let belief_h = outer.require(h)?.clone();
            let active = mask & (1 << i) != 0;

            // Pin h to `one`/`zero` in the overlay so the sub-iteration
            // treats it as certainly reached/unreached; h is marked
            // Resolved up front, so the driver never re-derives it from
            // `node_priors`, which would double-count h's own uncertainty
            // (already spent in `p_state` below).
            let pinned = if active { belief_h.one() } else { belief_h.zero() };
            seed.begin_resolving(h)?;
            seed.resolve(h, pinned)?;

            let weight = if active { belief_h } else { belief_h.complement() };
            p_state = Some(match p_state {
                None => weight,
                Some(acc) => acc.mul(&weight),
            });
        }
        let p_state = p_state.expect("n > 0, loop body runs at least once");

        let result_store = driver::run(
            &sub_network,
            diamonds_at_node,
            config,
            cache,
            depth,
            seed,
            Some((join, &join_as_plain_node)),
        )?;
        let j_belief = result_store.require(join)?.clone();
        let contribution = p_state.mul(&j_belief);
        total = Some(match total {
            None => contribution,
            Some(acc) => acc.add(&contribution),
        });
    }

    Ok(clamp(total.expect("n > 0, loop runs at least once")))
}
