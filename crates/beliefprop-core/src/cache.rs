//! Memoization of diamond evaluations.
//!
//! Keyed by `(canonicalized edgelist, fingerprint of current priors over the
//! diamond's relevant nodes)`. Entries are pure functions of their key, so
//! concurrent inserts race safely: whichever value lands first in the map
//! wins, and both are correct (spec.md §5's single-writer-wins policy).

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::BeliefError;
use crate::graph::{Belief, BeliefStore, Diamond, NodeId};

/// Cache key for one diamond evaluation: stable across runs with identical
/// inputs, human-diffable when a test fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiamondCacheKey(String);

impl std::fmt::Display for DiamondCacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl DiamondCacheKey {
    /// Build the key for `diamond` from the outer store's beliefs over
    /// `diamond.relevant_nodes`. Nodes without a resolved belief yet (the
    /// join itself, on the very first evaluation) are omitted from the
    /// fingerprint; they carry no information until resolved.
    pub fn build(diamond: &Diamond, outer: &BeliefStore) -> Self {
        let mut edges: Vec<String> = diamond
            .edges
            .iter()
            .map(|(from, to)| format!("{from}->{to}"))
            .collect();
        edges.sort();

        let mut relevant: Vec<&NodeId> = diamond.relevant_nodes.iter().collect();
        relevant.sort();
        let mut priors: Vec<String> = relevant
            .into_iter()
            .filter_map(|&node| outer.get(node).map(|b| format!("{node}={}", fingerprint(b))))
            .collect();
        priors.sort();

        Self(format!("edges:[{}]|priors:[{}]", edges.join(","), priors.join(",")))
    }
}

fn fingerprint(belief: &Belief) -> String {
    match belief {
        Belief::Scalar(p) => format!("s:{p:.17e}"),
        Belief::Interval { lo, hi } => format!("i:{lo:.17e},{hi:.17e}"),
        Belief::PBox { lower, upper } => {
            let lo = lower.iter().map(|v| format!("{v:.17e}")).collect::<Vec<_>>().join(";");
            let hi = upper.iter().map(|v| format!("{v:.17e}")).collect::<Vec<_>>().join(";");
            format!("p:{lo}/{hi}")
        }
    }
}

/// Shared, write-once-per-key memo table for diamond evaluations.
#[derive(Debug, Default)]
pub struct DiamondCache {
    entries: Mutex<HashMap<DiamondCacheKey, Belief>>,
}

impl DiamondCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &DiamondCacheKey) -> Option<Belief> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Return the cached value for `key` if present, otherwise compute it
    /// with `compute` and store it. If two callers race on the same key,
    /// both compute (pure function) and the map keeps whichever insert
    /// lands first; both results are equal.
    ///
    /// Under the `debug-recompute-check` feature, a hit is recomputed and
    /// compared against the cached value; disagreement raises
    /// [`BeliefError::CacheConsistency`] rather than silently trusting the
    /// cache. Off by default since it defeats the point of caching.
    pub fn get_or_insert_with<E: From<BeliefError>>(
        &self,
        key: DiamondCacheKey,
        compute: impl Fn() -> Result<Belief, E>,
    ) -> Result<Belief, E> {
        if let Some(hit) = self.get(&key) {
            tracing::trace!(%key, "diamond cache hit");
            #[cfg(feature = "debug-recompute-check")]
            {
                let recomputed = compute()?;
                if recomputed != hit {
                    return Err(BeliefError::cache_consistency(
                        key.to_string(),
                        format!("cache hit {hit:?} disagrees with recompute {recomputed:?}"),
                    )
                    .into());
                }
            }
            return Ok(hit);
        }
        let value = compute()?;
        let mut guard = self.entries.lock().unwrap();
        let stored = guard.entry(key).or_insert_with(|| value.clone());
        Ok(stored.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
