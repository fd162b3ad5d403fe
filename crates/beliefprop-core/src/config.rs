//! Engine-wide knobs: which diamond evaluator to use, whether to cache, and
//! how deep conditional enumeration is allowed to recurse.

/// Which algorithm resolves a diamond's join belief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Evaluator {
    /// Recursive conditional enumeration over the diamond's highest nodes
    /// (spec.md §4.4). Authoritative: every other evaluator is checked
    /// against it when [`EngineConfig::verify_sdp_against_diamond`] is set.
    #[default]
    Diamond,
    /// Sum of Disjoint Products over minimal paths from the highest nodes to
    /// the join (spec.md §4.5). Cheaper when the diamond has many
    /// conditioning nodes but few minimal paths; exact only up to the
    /// tolerance the minimal-path enumeration achieves.
    Sdp,
}

/// Tunables threaded through [`crate::update_beliefs`]. Cloned cheaply and
/// shared across recursive diamond sub-evaluations.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Which evaluator resolves diamond joins.
    pub evaluator: Evaluator,
    /// Memoize diamond evaluations keyed by [`crate::DiamondCacheKey`].
    pub caching_enabled: bool,
    /// Recursion ceiling for nested diamonds (a diamond whose own subgraph
    /// contains another diamond). Exceeding it is a topology error rather
    /// than a stack overflow.
    pub max_depth: u32,
    /// When [`Evaluator::Sdp`] runs, also run the diamond evaluator and
    /// compare results within [`Self::sdp_tolerance`]; disagreement is a
    /// cache/evaluator consistency error. Expensive; intended for testing
    /// and validation runs, not production throughput.
    pub verify_sdp_against_diamond: bool,
    /// Absolute tolerance for the `verify_sdp_against_diamond` comparison.
    pub sdp_tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            evaluator: Evaluator::default(),
            caching_enabled: true,
            max_depth: 64,
            verify_sdp_against_diamond: false,
            sdp_tolerance: 1e-9,
        }
    }
}

impl EngineConfig {
    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.caching_enabled = enabled;
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_verify_sdp_against_diamond(mut self, verify: bool) -> Self {
        self.verify_sdp_against_diamond = verify;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_diamond_with_caching() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.evaluator, Evaluator::Diamond);
        assert!(cfg.caching_enabled);
        assert!(!cfg.verify_sdp_against_diamond);
    }

    #[test]
    fn builders_compose() {
        let cfg = EngineConfig::default()
            .with_evaluator(Evaluator::Sdp)
            .with_caching(false)
            .with_max_depth(8)
            .with_verify_sdp_against_diamond(true);
        assert_eq!(cfg.evaluator, Evaluator::Sdp);
        assert!(!cfg.caching_enabled);
        assert_eq!(cfg.max_depth, 8);
        assert!(cfg.verify_sdp_against_diamond);
    }
}
