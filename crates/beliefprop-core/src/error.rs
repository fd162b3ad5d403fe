use crate::graph::NodeId;

/// What kind of input was missing. Carried by [`BeliefError::MissingData`]
/// so callers can match on the shape of the hole without parsing the
/// message string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingDataKind {
    NodePrior,
    EdgeProbability,
    DiamondsAtNode,
}

impl std::fmt::Display for MissingDataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NodePrior => "node prior",
            Self::EdgeProbability => "edge probability",
            Self::DiamondsAtNode => "diamonds_at_node entry",
        };
        f.write_str(s)
    }
}

/// All failure modes of belief propagation. Every variant is fatal: the run
/// aborts and the error identifies the offending node or edge. There are no
/// retries, since the computation is deterministic.
#[derive(Debug, thiserror::Error)]
pub enum BeliefError {
    /// A parent wasn't resolved when its child was visited, or a cycle was
    /// found in a diamond subgraph.
    #[error("topology error at node {node:?}: {detail}")]
    Topology { node: NodeId, detail: String },

    /// No prior for a node, no edge probability for a parent edge, or
    /// `diamonds_at_node` missing for a join with multiple parents.
    #[error("missing {kind} for node {node:?}: {detail}")]
    MissingData {
        node: NodeId,
        kind: MissingDataKind,
        detail: String,
    },

    /// A belief fell outside its uncertainty type's valid range (e.g. an
    /// interval with `lo > hi`, or a scalar outside `[0, 1]`).
    #[error("value range error at node {node:?}: {detail}")]
    ValueRange { node: NodeId, detail: String },

    /// A diamond cache hit disagreed with a debug-mode recompute.
    #[error("cache consistency error for key {key}: {detail}")]
    CacheConsistency { key: String, detail: String },
}

impl BeliefError {
    pub fn topology(node: NodeId, detail: impl Into<String>) -> Self {
        let err = Self::Topology {
            node,
            detail: detail.into(),
        };
        tracing::error!(?node, "{err}");
        err
    }

    pub fn missing_data(node: NodeId, kind: MissingDataKind, detail: impl Into<String>) -> Self {
        let err = Self::MissingData {
            node,
            kind,
            detail: detail.into(),
        };
        tracing::error!(?node, ?kind, "{err}");
        err
    }

    pub fn value_range(node: NodeId, detail: impl Into<String>) -> Self {
        let err = Self::ValueRange {
            node,
            detail: detail.into(),
        };
        tracing::error!(?node, "{err}");
        err
    }

    pub fn cache_consistency(key: impl Into<String>, detail: impl Into<String>) -> Self {
        let key = key.into();
        let err = Self::CacheConsistency {
            key: key.clone(),
            detail: detail.into(),
        };
        tracing::error!(%key, "{err}");
        err
    }
}
