//! Exact probabilistic reachability inference over directed acyclic graphs.
//!
//! Given a DAG whose nodes carry prior probabilities and whose edges carry
//! transmission probabilities, this crate computes, for every node `N`,
//! `belief[N] = prior[N] * P(N receives >= 1 signal from its active parents)`.
//! Source nodes (no parents) simply receive their prior.
//!
//! The hard part is belief propagation across *diamonds*: when two or more
//! paths from a common ancestor reconverge at a join node, the parent
//! signals at that join are not independent, so naive inclusion-exclusion
//! over parents is wrong. [`diamond`] evaluates the correlated part exactly
//! by conditioning on a minimal ancestor set; [`sdp`] offers an alternative
//! evaluator for diamonds where that enumeration would explode.
//!
//! Graph parsing, diamond *detection*, CLI, and file I/O are out of scope:
//! this crate consumes an already-built [`Network`] plus, for every join
//! node, a [`DiamondsAtNode`] record describing its diamonds and
//! non-diamond parents.

mod algebra;
mod cache;
mod combiner;
mod config;
mod diamond;
mod driver;
mod error;
mod graph;
mod kernel;
mod sdp;

pub use algebra::ValueAlgebra;
pub use cache::{DiamondCache, DiamondCacheKey};
pub use config::{EngineConfig, Evaluator};
pub use diamond::update_diamond_join;
pub use driver::update_beliefs;
pub use error::{BeliefError, MissingDataKind};
pub use graph::{Belief, BeliefStore, Diamond, DiamondsAtNode, Network, NodeId};
pub use kernel::inclusion_exclusion;
pub use sdp::update_diamond_join_sdp;
