use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;

use crate::error::{BeliefError, MissingDataKind};

/// Opaque node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A belief value under one of the three supported uncertainty types. All
/// beliefs and link probabilities in a single run share one variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Belief {
    /// A scalar probability in `[0, 1]`.
    Scalar(f64),
    /// An interval `[lo, hi]` with `0 <= lo <= hi <= 1`.
    Interval { lo: f64, hi: f64 },
    /// A probability box, represented as `n` equally-likely focal intervals
    /// `[lower[i], upper[i]]` (a finite random-set / Dempster-Shafer
    /// encoding of a p-box). `lower[i] <= upper[i]` pointwise; `n` is chosen
    /// by whoever builds the network and need not match across nodes.
    PBox { lower: Vec<f64>, upper: Vec<f64> },
}

impl Belief {
    /// Check this belief lies in the valid range of its uncertainty type.
    /// Invariant 1 (spec.md §3): every belief must pass this check once
    /// written to a [`BeliefStore`].
    pub fn validate(&self, node: NodeId) -> Result<(), BeliefError> {
        match self {
            Belief::Scalar(p) => {
                if !(0.0..=1.0).contains(p) {
                    return Err(BeliefError::value_range(
                        node,
                        format!("scalar {p} outside [0, 1]"),
                    ));
                }
            }
            Belief::Interval { lo, hi } => {
                if !(lo <= hi && (0.0..=1.0).contains(lo) && (0.0..=1.0).contains(hi)) {
                    return Err(BeliefError::value_range(
                        node,
                        format!("interval [{lo}, {hi}] invalid"),
                    ));
                }
            }
            Belief::PBox { lower, upper } => {
                if lower.len() != upper.len() {
                    return Err(BeliefError::value_range(
                        node,
                        "p-box lower/upper length mismatch".to_string(),
                    ));
                }
                for (&l, &u) in lower.iter().zip(upper) {
                    if !(l <= u && (0.0..=1.0).contains(&l) && (0.0..=1.0).contains(&u)) {
                        return Err(BeliefError::value_range(
                            node,
                            format!("p-box point [{l}, {u}] invalid"),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Debug-only counterpart to [`Belief::validate`]: panics with the
    /// same detail instead of returning a `Result`, for test code that
    /// would just `unwrap()` the error anyway.
    pub fn assert_valid(&self, node: NodeId) {
        if let Err(err) = self.validate(node) {
            panic!("{err}");
        }
    }
}

/// An immutable network over which beliefs are propagated. Built by an
/// out-of-scope graph-decomposition collaborator.
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub edges: Vec<(NodeId, NodeId)>,
    pub outgoing: HashMap<NodeId, HashSet<NodeId>>,
    pub incoming: HashMap<NodeId, HashSet<NodeId>>,
    pub source_nodes: HashSet<NodeId>,
    pub node_priors: HashMap<NodeId, Belief>,
    pub edge_probabilities: HashMap<(NodeId, NodeId), Belief>,
    /// Topological layering: set `k` contains nodes whose parents are all
    /// in sets `< k`.
    pub iteration_sets: Vec<Vec<NodeId>>,
}

impl Network {
    pub fn parents(&self, node: NodeId) -> impl Iterator<Item = &NodeId> {
        self.incoming.get(&node).into_iter().flatten()
    }

    pub fn prior(&self, node: NodeId) -> Result<&Belief, BeliefError> {
        self.node_priors.get(&node).ok_or_else(|| {
            BeliefError::missing_data(node, MissingDataKind::NodePrior, "no prior registered")
        })
    }

    pub fn edge_probability(&self, from: NodeId, to: NodeId) -> Result<&Belief, BeliefError> {
        self.edge_probabilities.get(&(from, to)).ok_or_else(|| {
            BeliefError::missing_data(
                to,
                MissingDataKind::EdgeProbability,
                format!("no edge probability for {from}->{to}"),
            )
        })
    }

    /// Restrict this network to `relevant`, keeping only edges whose both
    /// endpoints survive. Used to build the sub-network a diamond's
    /// conditional enumeration iterates over.
    pub fn restrict(&self, relevant: &HashSet<NodeId>, edges: &[(NodeId, NodeId)]) -> Network {
        let mut outgoing: HashMap<NodeId, HashSet<NodeId>> = HashMap::new();
        let mut incoming: HashMap<NodeId, HashSet<NodeId>> = HashMap::new();
        for &(from, to) in edges {
            outgoing.entry(from).or_default().insert(to);
            incoming.entry(to).or_default().insert(from);
        }

        let source_nodes: HashSet<NodeId> = relevant
            .iter()
            .copied()
            .filter(|n| incoming.get(n).is_none_or(HashSet::is_empty))
            .collect();

        Network {
            edges: edges.to_vec(),
            outgoing,
            incoming,
            source_nodes,
            node_priors: self
                .node_priors
                .iter()
                .filter(|(n, _)| relevant.contains(n))
                .map(|(n, b)| (*n, b.clone()))
                .collect(),
            edge_probabilities: self
                .edge_probabilities
                .iter()
                .filter(|((f, t), _)| relevant.contains(f) && relevant.contains(t))
                .map(|(k, v)| (*k, v.clone()))
                .collect(),
            iteration_sets: topological_layers(relevant, &incoming),
        }
    }
}

/// Layer `relevant` nodes into topological sets using Kahn's algorithm:
/// layer `k` holds every node whose unresolved in-degree (within
/// `relevant`) drops to zero after removing layers `< k`.
fn topological_layers(
    relevant: &HashSet<NodeId>,
    incoming: &HashMap<NodeId, HashSet<NodeId>>,
) -> Vec<Vec<NodeId>> {
    let mut remaining: HashSet<NodeId> = relevant.clone();
    let mut layers = Vec::new();

    while !remaining.is_empty() {
        let mut layer: Vec<NodeId> = remaining
            .iter()
            .copied()
            .filter(|n| {
                incoming
                    .get(n)
                    .is_none_or(|parents| parents.iter().all(|p| !remaining.contains(p)))
            })
            .collect();
        if layer.is_empty() {
            // Every remaining node has an unresolved parent inside `remaining`:
            // a cycle. The caller (restrict, used only on diamond subgraphs)
            // surfaces this as a topology error when the driver actually
            // visits these nodes and finds no progress.
            layer = remaining.iter().copied().collect();
            layer.sort();
            layers.push(layer);
            break;
        }
        layer.sort();
        for n in &layer {
            remaining.remove(n);
        }
        layers.push(layer);
    }
    layers
}

/// A correlated parent cluster at a join node: two or more paths from a
/// common ancestor reconverge here, so the parent signals aren't
/// independent.
#[derive(Debug, Clone)]
pub struct Diamond {
    /// All nodes participating: conditioning ancestors, intermediates, and
    /// the join.
    pub relevant_nodes: HashSet<NodeId>,
    /// The minimal ancestor set whose joint state d-separates this diamond
    /// from the outside. Order is significant: it fixes the bit assignment
    /// used by conditional enumeration, so results are deterministic.
    pub highest_nodes: Vec<NodeId>,
    /// Edges of the diamond subgraph.
    pub edges: Vec<(NodeId, NodeId)>,
}

/// Per-join-node record: every parent of the join is either a non-diamond
/// parent or belongs to exactly one diamond's top layer.
#[derive(Debug, Clone, Default)]
pub struct DiamondsAtNode {
    pub diamonds: Vec<Diamond>,
    pub non_diamond_parents: IndexSet<NodeId>,
}

/// Per-node resolution state during one iteration-driver pass. Visiting a
/// `Resolving` node is a fatal topology error; no node is ever revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Unresolved,
    Resolving,
    Resolved,
}

/// A mutable node -> belief mapping filled in iteration order. Write-once
/// per node per scope: once `Resolved`, a node's belief is never mutated
/// except through a [`crate::diamond`] overlay, which never touches the
/// underlying store.
#[derive(Debug, Clone, Default)]
pub struct BeliefStore {
    beliefs: HashMap<NodeId, Belief>,
    states: HashMap<NodeId, NodeState>,
}

impl BeliefStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, node: NodeId) -> NodeState {
        self.states.get(&node).copied().unwrap_or(NodeState::Unresolved)
    }

    pub fn begin_resolving(&mut self, node: NodeId) -> Result<(), BeliefError> {
        match self.state(node) {
            NodeState::Unresolved => {
                self.states.insert(node, NodeState::Resolving);
                Ok(())
            }
            NodeState::Resolving => Err(BeliefError::topology(
                node,
                "node visited while already Resolving (cycle)",
            )),
            NodeState::Resolved => Err(BeliefError::topology(
                node,
                "node visited again after being Resolved",
            )),
        }
    }

    pub fn resolve(&mut self, node: NodeId, belief: Belief) -> Result<(), BeliefError> {
        belief.validate(node)?;
        self.beliefs.insert(node, belief);
        self.states.insert(node, NodeState::Resolved);
        Ok(())
    }

    pub fn get(&self, node: NodeId) -> Option<&Belief> {
        self.beliefs.get(&node)
    }

    pub fn require(&self, node: NodeId) -> Result<&Belief, BeliefError> {
        self.get(node)
            .ok_or_else(|| BeliefError::topology(node, "belief not yet resolved"))
    }

    pub fn into_map(self) -> HashMap<NodeId, Belief> {
        self.beliefs
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Belief)> {
        self.beliefs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_validate_in_range() {
        assert!(Belief::Scalar(0.5).validate(NodeId(0)).is_ok());
        assert!(Belief::Scalar(0.0).validate(NodeId(0)).is_ok());
        assert!(Belief::Scalar(1.0).validate(NodeId(0)).is_ok());
    }

    #[test]
    fn scalar_validate_out_of_range() {
        assert!(Belief::Scalar(1.1).validate(NodeId(0)).is_err());
        assert!(Belief::Scalar(-0.1).validate(NodeId(0)).is_err());
    }

    #[test]
    fn interval_validate_lo_gt_hi() {
        let b = Belief::Interval { lo: 0.6, hi: 0.4 };
        assert!(b.validate(NodeId(0)).is_err());
    }

    #[test]
    fn interval_validate_ok() {
        let b = Belief::Interval { lo: 0.4, hi: 0.6 };
        assert!(b.validate(NodeId(0)).is_ok());
    }

    #[test]
    fn belief_store_rejects_revisit_while_resolving() {
        let mut store = BeliefStore::new();
        let n = NodeId(1);
        store.begin_resolving(n).unwrap();
        assert!(store.begin_resolving(n).is_err());
    }

    #[test]
    fn belief_store_rejects_revisit_after_resolved() {
        let mut store = BeliefStore::new();
        let n = NodeId(1);
        store.begin_resolving(n).unwrap();
        store.resolve(n, Belief::Scalar(0.5)).unwrap();
        assert!(store.begin_resolving(n).is_err());
    }

    #[test]
    fn belief_store_resolve_rejects_out_of_range() {
        let mut store = BeliefStore::new();
        let n = NodeId(1);
        store.begin_resolving(n).unwrap();
        assert!(store.resolve(n, Belief::Scalar(2.0)).is_err());
    }

    #[test]
    fn topological_layers_chain() {
        let a = NodeId(1);
        let b = NodeId(2);
        let c = NodeId(3);
        let mut incoming = HashMap::new();
        incoming.insert(b, HashSet::from([a]));
        incoming.insert(c, HashSet::from([b]));
        let relevant = HashSet::from([a, b, c]);
        let layers = topological_layers(&relevant, &incoming);
        assert_eq!(layers, vec![vec![a], vec![b], vec![c]]);
    }

    #[test]
    fn topological_layers_diamond() {
        let a = NodeId(1);
        let b = NodeId(2);
        let c = NodeId(3);
        let d = NodeId(4);
        let mut incoming = HashMap::new();
        incoming.insert(b, HashSet::from([a]));
        incoming.insert(c, HashSet::from([a]));
        incoming.insert(d, HashSet::from([b, c]));
        let relevant = HashSet::from([a, b, c, d]);
        let layers = topological_layers(&relevant, &incoming);
        assert_eq!(layers, vec![vec![a], vec![b, c], vec![d]]);
    }
}
