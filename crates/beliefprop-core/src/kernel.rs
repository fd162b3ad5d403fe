//! The inclusion-exclusion kernel: `P(union Ai)` for independent `Ai`.

use crate::algebra::{clamp, ValueAlgebra};
use crate::graph::Belief;

/// `P(A1 ∪ A2 ∪ ... ∪ Ak) = sum over non-empty T of (-1)^(|T|+1) * prod_{i in T} Ai`,
/// assuming the `Ai` are independent. `beliefs` must be non-empty (every
/// caller only reaches this with at least one parent/diamond signal). `k=1`
/// returns that one belief directly. `O(2^k)`; the caller is responsible
/// for keeping `k` small (the diamond and SDP evaluators exist precisely so
/// a join node's diamond parents don't all land in one `inclusion_exclusion`
/// call).
pub fn inclusion_exclusion(beliefs: &[Belief]) -> Belief {
    assert!(
        !beliefs.is_empty(),
        "inclusion_exclusion requires at least one belief"
    );
    if beliefs.len() == 1 {
        return beliefs[0].clone();
    }
    let k = beliefs.len();
    if k > 20 {
        tracing::warn!(k, "inclusion-exclusion over {k} terms is O(2^k); batch large fan-in through a diamond or SDP evaluator instead");
    }

    let mut acc = beliefs[0].zero();
    for mask in 1u32..(1u32 << k) {
        let mut product: Option<Belief> = None;
        for (i, belief) in beliefs.iter().enumerate() {
            if mask & (1 << i) != 0 {
                product = Some(match product {
                    None => belief.clone(),
                    Some(p) => p.mul(belief),
                });
            }
        }
        let product = product.expect("mask is non-zero, so at least one bit is set");
        acc = if mask.count_ones() % 2 == 1 {
            acc.add(&product)
        } else {
            acc.sub(&product)
        };
    }
    clamp(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_belief_passthrough() {
        let b = Belief::Scalar(0.37);
        assert_eq!(inclusion_exclusion(std::slice::from_ref(&b)), b);
    }

    #[test]
    fn two_independent_halves() {
        // 1 - (1-0.5)(1-0.5) = 0.75 (scenario S2 in the spec)
        let beliefs = [Belief::Scalar(0.5), Belief::Scalar(0.5)];
        match inclusion_exclusion(&beliefs) {
            Belief::Scalar(p) => assert!((p - 0.75).abs() < 1e-12),
            _ => panic!("expected scalar"),
        }
    }

    #[test]
    fn three_terms_matches_direct_formula() {
        let a = 0.2;
        let b = 0.3;
        let c = 0.4;
        let expected = a + b + c - a * b - a * c - b * c + a * b * c;
        let beliefs = [Belief::Scalar(a), Belief::Scalar(b), Belief::Scalar(c)];
        match inclusion_exclusion(&beliefs) {
            Belief::Scalar(p) => assert!((p - expected).abs() < 1e-12),
            _ => panic!("expected scalar"),
        }
    }

    #[test]
    fn order_independent() {
        let beliefs_a = [Belief::Scalar(0.1), Belief::Scalar(0.6), Belief::Scalar(0.3)];
        let beliefs_b = [Belief::Scalar(0.6), Belief::Scalar(0.3), Belief::Scalar(0.1)];
        assert_eq!(inclusion_exclusion(&beliefs_a), inclusion_exclusion(&beliefs_b));
    }

    #[test]
    #[should_panic(expected = "at least one belief")]
    fn empty_panics() {
        let _ = inclusion_exclusion(&[]);
    }
}
