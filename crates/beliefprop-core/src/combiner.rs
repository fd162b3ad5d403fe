//! The per-node signal combiner (spec.md §4.3): partitions a join's
//! parents into independent non-diamond signals and correlated diamond
//! signals, unions them, and folds in the node's own prior.

use crate::algebra::{clamp, ValueAlgebra};
use crate::cache::DiamondCache;
use crate::config::{EngineConfig, Evaluator};
use crate::diamond::update_diamond_join_at_depth;
use crate::error::{BeliefError, MissingDataKind};
use crate::graph::{Belief, BeliefStore, DiamondsAtNode, Network, NodeId};
use crate::kernel::inclusion_exclusion;
use crate::sdp::update_diamond_join_sdp;
use std::collections::HashMap;

/// Resolve `node`'s belief from its already-`Resolved` parents.
///
/// 1. Each non-diamond parent contributes `belief[p] ⊗ edge_prob(p, node)`.
/// 2. Each diamond group contributes whatever [`crate::diamond`] (or
///    [`crate::sdp`], depending on `config.evaluator`) computes for its
///    join, which already folds edges-into-node on D's side.
/// 3. All signals are unioned via inclusion-exclusion (step 1's
///    independence assumption holds across distinct diamonds and
///    non-diamond parents, since a `DiamondsAtNode` partition by
///    construction puts every correlated pair inside one diamond group).
/// 4. The union is multiplied by `node`'s own prior.
#[allow(clippy::too_many_arguments)]
pub(crate) fn resolve_node(
    network: &Network,
    node: NodeId,
    diamonds_at_node: Option<&DiamondsAtNode>,
    store: &BeliefStore,
    all_diamonds_at_node: &HashMap<NodeId, DiamondsAtNode>,
    cache: &DiamondCache,
    config: &EngineConfig,
    depth: u32,
) -> Result<Belief, BeliefError> {
    let mut signals = Vec::new();

    match diamonds_at_node {
        Some(dn) => {
            for &parent in &dn.non_diamond_parents {
                signals.push(parent_signal(network, store, parent, node)?);
            }
            for diamond in &dn.diamonds {
                let signal = match config.evaluator {
                    Evaluator::Diamond => {
                        update_diamond_join_at_depth(diamond, node, store, network, all_diamonds_at_node, cache, config, depth + 1)?
                    }
                    Evaluator::Sdp => {
                        let sdp_result = update_diamond_join_sdp(diamond, node, store, network)?;
                        if config.verify_sdp_against_diamond {
                            let exact = update_diamond_join_at_depth(
                                diamond,
                                node,
                                store,
                                network,
                                all_diamonds_at_node,
                                cache,
                                config,
                                depth + 1,
                            )?;
                            check_agreement(node, &sdp_result, &exact, config.sdp_tolerance)?;
                        }
                        sdp_result
                    }
                };
                signals.push(signal);
            }
        }
        None => {
            let parents: Vec<NodeId> = network.parents(node).copied().collect();
            if parents.len() >= 2 {
                return Err(BeliefError::missing_data(
                    node,
                    MissingDataKind::DiamondsAtNode,
                    "diamonds_at_node missing for a join with multiple parents",
                ));
            }
            for parent in parents {
                signals.push(parent_signal(network, store, parent, node)?);
            }
        }
    }

    if signals.is_empty() {
        return Err(BeliefError::topology(
            node,
            "node has parents but no independent or diamond signal was produced",
        ));
    }

    let union = inclusion_exclusion(&signals);
    let prior = network.prior(node)?;
    Ok(clamp(union.mul(prior)))
}

fn parent_signal(network: &Network, store: &BeliefStore, parent: NodeId, node: NodeId) -> Result<Belief, BeliefError> {
    let belief = store.require(parent)?;
    let edge_prob = network.edge_probability(parent, node)?;
    Ok(belief.mul(edge_prob))
}

fn check_agreement(node: NodeId, sdp: &Belief, exact: &Belief, tolerance: f64) -> Result<(), BeliefError> {
    let disagreement = match (sdp, exact) {
        (Belief::Scalar(a), Belief::Scalar(b)) => (a - b).abs() > tolerance,
        (Belief::Interval { lo: al, hi: ah }, Belief::Interval { lo: bl, hi: bh }) => {
            (al - bl).abs() > tolerance || (ah - bh).abs() > tolerance
        }
        (Belief::PBox { lower: al, upper: ah }, Belief::PBox { lower: bl, upper: bh }) => al
            .iter()
            .zip(bl)
            .chain(ah.iter().zip(bh))
            .any(|(a, b)| (a - b).abs() > tolerance),
        _ => true,
    };
    if disagreement {
        return Err(BeliefError::cache_consistency(
            format!("node={node}"),
            format!("SDP evaluator ({sdp:?}) disagrees with diamond evaluator ({exact:?}) beyond tolerance {tolerance}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexSet;
    use std::collections::HashMap as Map;

    fn network_with_two_parents() -> Network {
        let mut edge_probabilities = Map::new();
        edge_probabilities.insert((NodeId(1), NodeId(3)), Belief::Scalar(0.5));
        edge_probabilities.insert((NodeId(2), NodeId(3)), Belief::Scalar(0.5));
        let mut node_priors = Map::new();
        node_priors.insert(NodeId(3), Belief::Scalar(1.0));
        let mut incoming = Map::new();
        incoming.insert(NodeId(3), std::collections::HashSet::from([NodeId(1), NodeId(2)]));
        Network {
            edges: vec![(NodeId(1), NodeId(3)), (NodeId(2), NodeId(3))],
            outgoing: Map::new(),
            incoming,
            source_nodes: std::collections::HashSet::new(),
            node_priors,
            edge_probabilities,
            iteration_sets: vec![],
        }
    }

    #[test]
    fn non_diamond_parents_union_through_inclusion_exclusion() {
        let network = network_with_two_parents();
        let mut store = BeliefStore::new();
        store.begin_resolving(NodeId(1)).unwrap();
        store.resolve(NodeId(1), Belief::Scalar(0.8)).unwrap();
        store.begin_resolving(NodeId(2)).unwrap();
        store.resolve(NodeId(2), Belief::Scalar(0.8)).unwrap();

        let dn = DiamondsAtNode {
            diamonds: vec![],
            non_diamond_parents: IndexSet::from([NodeId(1), NodeId(2)]),
        };
        let cache = DiamondCache::new();
        let config = EngineConfig::default();
        let belief = resolve_node(&network, NodeId(3), Some(&dn), &store, &Map::new(), &cache, &config, 0).unwrap();
        let sig = 0.8 * 0.5;
        let expected = sig + sig - sig * sig;
        match belief {
            Belief::Scalar(p) => assert!((p - expected).abs() < 1e-12),
            _ => panic!("expected scalar"),
        }
    }

    #[test]
    fn prior_less_than_one_scales_result() {
        let mut network = network_with_two_parents();
        network.node_priors.insert(NodeId(3), Belief::Scalar(0.5));
        let mut store = BeliefStore::new();
        store.begin_resolving(NodeId(1)).unwrap();
        store.resolve(NodeId(1), Belief::Scalar(1.0)).unwrap();
        store.begin_resolving(NodeId(2)).unwrap();
        store.resolve(NodeId(2), Belief::Scalar(0.0)).unwrap();

        let dn = DiamondsAtNode {
            diamonds: vec![],
            non_diamond_parents: IndexSet::from([NodeId(1), NodeId(2)]),
        };
        let cache = DiamondCache::new();
        let config = EngineConfig::default();
        let belief = resolve_node(&network, NodeId(3), Some(&dn), &store, &Map::new(), &cache, &config, 0).unwrap();
        match belief {
            Belief::Scalar(p) => assert!((p - 0.25).abs() < 1e-12),
            _ => panic!("expected scalar"),
        }
    }
}
