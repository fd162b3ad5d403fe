//! Sum of Disjoint Products: an alternative to [`crate::diamond`]'s 2^n
//! conditional enumeration for diamonds with many conditioning nodes but
//! few minimal paths to the join.

use std::collections::HashMap;

use itertools::Itertools;

use crate::algebra::{clamp, ValueAlgebra};
use crate::error::BeliefError;
use crate::graph::{Belief, BeliefStore, Diamond, Network, NodeId};
use crate::kernel::inclusion_exclusion;

/// Evaluate `diamond`'s join belief via minimal-path enumeration and
/// disjoint-product expansion (spec.md §4.5), rather than the 2^n
/// conditional enumeration [`crate::update_diamond_join`] performs. Does not
/// consult `diamonds_at_node`: a diamond nested inside `diamond`'s own
/// subgraph is treated as a plain probabilistic edge chain here, which is
/// this evaluator's whole simplifying trade.
pub fn update_diamond_join_sdp(
    diamond: &Diamond,
    join: NodeId,
    outer: &BeliefStore,
    network: &Network,
) -> Result<Belief, BeliefError> {
    let adjacency = build_adjacency(&diamond.edges);
    let conditioning = shannon_order(diamond, network);

    if conditioning.is_empty() {
        return unconditioned_union(diamond, join, network, &adjacency);
    }

    let mut paths_by_source: HashMap<NodeId, Vec<Belief>> = HashMap::new();
    for &c in &conditioning {
        let paths = enumerate_simple_paths(&adjacency, c, join);
        let mut path_beliefs = Vec::with_capacity(paths.len());
        for path in paths {
            path_beliefs.push(path_probability(&path, network)?);
        }
        paths_by_source.insert(c, path_beliefs);
    }

    let n = conditioning.len();
    let mut total: Option<Belief> = None;
    for mask in 1u32..(1u32 << n) {
        let mut weight: Option<Belief> = None;
        let mut contributing: Vec<Belief> = Vec::new();
        for (i, &c) in conditioning.iter().enumerate() {
            let belief_c = outer.require(c)?;
            let active = mask & (1 << i) != 0;
            let factor = if active { belief_c.clone() } else { belief_c.complement() };
            weight = Some(match weight {
                None => factor,
                Some(acc) => acc.mul(&factor),
            });
            if active {
                contributing.extend(paths_by_source[&c].iter().cloned());
            }
        }
        let weight = weight.expect("mask is non-zero, at least one conditioning node is active");

        let path_union = if contributing.is_empty() {
            outer.require(conditioning[0])?.zero()
        } else {
            inclusion_exclusion(&contributing)
        };

        let term = weight.mul(&path_union);
        total = Some(match total {
            None => term,
            Some(acc) => acc.add(&term),
        });
    }

    Ok(clamp(total.expect("conditioning is non-empty, loop runs at least once")))
}

/// n = 0 tie-break (spec.md §4.4, reused here since SDP has no conditioning
/// subsets to branch on): union every minimal path from every true source
/// of the diamond subgraph, each weighted by that source's own node prior.
fn unconditioned_union(
    diamond: &Diamond,
    join: NodeId,
    network: &Network,
    adjacency: &HashMap<NodeId, Vec<NodeId>>,
) -> Result<Belief, BeliefError> {
    let has_incoming: std::collections::HashSet<NodeId> = adjacency
        .values()
        .flatten()
        .copied()
        .collect();
    let sources: Vec<NodeId> = diamond
        .relevant_nodes
        .iter()
        .copied()
        .filter(|n| !has_incoming.contains(n))
        .sorted()
        .collect();

    let mut weighted_paths = Vec::new();
    for source in sources {
        if source == join {
            continue;
        }
        let prior = network.prior(source)?.clone();
        for path in enumerate_simple_paths(adjacency, source, join) {
            let p = path_probability(&path, network)?;
            weighted_paths.push(prior.mul(&p));
        }
    }

    if weighted_paths.is_empty() {
        return Err(BeliefError::topology(
            join,
            "SDP evaluator found no path from any diamond source to the join",
        ));
    }
    Ok(clamp(inclusion_exclusion(&weighted_paths)))
}

fn build_adjacency(edges: &[(NodeId, NodeId)]) -> HashMap<NodeId, Vec<NodeId>> {
    let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for &(from, to) in edges {
        adjacency.entry(from).or_default().push(to);
    }
    adjacency
}

/// DFS enumeration of every simple (no repeated node) path from `start` to
/// `target` in `adjacency`. The diamond subgraph is acyclic, so "simple"
/// and "all" coincide; the visited set is kept anyway as a guard against a
/// malformed `Diamond` rather than a case expected to trigger.
fn enumerate_simple_paths(
    adjacency: &HashMap<NodeId, Vec<NodeId>>,
    start: NodeId,
    target: NodeId,
) -> Vec<Vec<NodeId>> {
    let mut paths = Vec::new();
    let mut current = vec![start];
    let mut visited = std::collections::HashSet::from([start]);
    walk(adjacency, target, &mut current, &mut visited, &mut paths);
    paths
}

fn walk(
    adjacency: &HashMap<NodeId, Vec<NodeId>>,
    target: NodeId,
    current: &mut Vec<NodeId>,
    visited: &mut std::collections::HashSet<NodeId>,
    paths: &mut Vec<Vec<NodeId>>,
) {
    let last = *current.last().expect("current path is never empty");
    if last == target {
        paths.push(current.clone());
        return;
    }
    let Some(neighbors) = adjacency.get(&last) else {
        return;
    };
    for &next in neighbors {
        if visited.insert(next) {
            current.push(next);
            walk(adjacency, target, current, visited, paths);
            current.pop();
            visited.remove(&next);
        }
    }
}

/// `path_probability = Π edge_probs` along the path (spec.md §4.5 step 1);
/// intermediate node priors are not folded in, only link reliability.
fn path_probability(path: &[NodeId], network: &Network) -> Result<Belief, BeliefError> {
    let mut iter = path.windows(2);
    let Some([a, b]) = iter.next().map(|w| [w[0], w[1]]) else {
        // A degenerate single-node "path": start == target, probability one.
        let template = network.edge_probabilities.values().next();
        return Ok(match template {
            Some(b) => b.one(),
            None => Belief::Scalar(1.0),
        });
    };
    let mut acc = network.edge_probability(a, b)?.clone();
    for w in iter {
        let (a, b) = (w[0], w[1]);
        acc = acc.mul(network.edge_probability(a, b)?);
    }
    Ok(acc)
}

/// Shannon-style variable ordering: topological (as given in `highest_nodes`,
/// already topologically sound per `Diamond`'s invariant), ties among nodes
/// at the same incoming layer broken by higher out-degree within the
/// diamond subgraph — fewer non-disjoint terms fall out of the expansion.
fn shannon_order(diamond: &Diamond, network: &Network) -> Vec<NodeId> {
    let mut ordered = diamond.highest_nodes.clone();
    ordered.sort_by_key(|n| {
        let out_degree = network.outgoing.get(n).map_or(0, |s| s.len());
        std::cmp::Reverse(out_degree)
    });
    ordered
}
