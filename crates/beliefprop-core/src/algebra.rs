//! Uniform arithmetic over the three supported uncertainty types.
//!
//! Algorithms elsewhere in this crate never branch on which [`Belief`]
//! variant they're holding; they call [`ValueAlgebra`] methods instead. This
//! module does no range clamping (per design): a caller that needs a result
//! forced back into a valid range after this algebra produces one outside
//! it (floating-point drift from repeated `add`/`sub`, mostly) calls
//! [`clamp`] itself.

use crate::graph::Belief;

/// `mul / add / sub / complement / zero / one`, dispatched by matching on
/// the [`Belief`] variant rather than by generic type parameter — the
/// uncertainty type is a single compile-time/config choice per run, not
/// something every call site needs to thread through.
pub trait ValueAlgebra {
    fn mul(&self, other: &Belief) -> Belief;
    fn add(&self, other: &Belief) -> Belief;
    fn sub(&self, other: &Belief) -> Belief;
    fn complement(&self) -> Belief;
    fn zero(&self) -> Belief;
    fn one(&self) -> Belief;
}

impl ValueAlgebra for Belief {
    fn mul(&self, other: &Belief) -> Belief {
        match (self, other) {
            (Belief::Scalar(a), Belief::Scalar(b)) => Belief::Scalar(a * b),
            (Belief::Interval { lo: al, hi: ah }, Belief::Interval { lo: bl, hi: bh }) => {
                Belief::Interval {
                    lo: al * bl,
                    hi: ah * bh,
                }
            }
            (Belief::PBox { .. }, Belief::PBox { .. }) => {
                pbox_combine(self, other, |al, ah, bl, bh| (al * bl, ah * bh))
            }
            _ => mismatched_variants("mul"),
        }
    }

    fn add(&self, other: &Belief) -> Belief {
        match (self, other) {
            (Belief::Scalar(a), Belief::Scalar(b)) => Belief::Scalar(a + b),
            (Belief::Interval { lo: al, hi: ah }, Belief::Interval { lo: bl, hi: bh }) => {
                Belief::Interval {
                    lo: al + bl,
                    hi: ah + bh,
                }
            }
            (Belief::PBox { .. }, Belief::PBox { .. }) => {
                pbox_combine(self, other, |al, ah, bl, bh| (al + bl, ah + bh))
            }
            _ => mismatched_variants("add"),
        }
    }

    fn sub(&self, other: &Belief) -> Belief {
        match (self, other) {
            (Belief::Scalar(a), Belief::Scalar(b)) => Belief::Scalar(a - b),
            // a - b: the subtrahend's bounds flip, so the result's lower
            // bound comes from the subtrahend's upper bound and vice versa.
            (Belief::Interval { lo: al, hi: ah }, Belief::Interval { lo: bl, hi: bh }) => {
                Belief::Interval {
                    lo: al - bh,
                    hi: ah - bl,
                }
            }
            (Belief::PBox { .. }, Belief::PBox { .. }) => {
                pbox_combine(self, other, |al, ah, bl, bh| (al - bh, ah - bl))
            }
            _ => mismatched_variants("sub"),
        }
    }

    fn complement(&self) -> Belief {
        match self {
            Belief::Scalar(a) => Belief::Scalar(1.0 - a),
            Belief::Interval { lo, hi } => Belief::Interval {
                lo: 1.0 - hi,
                hi: 1.0 - lo,
            },
            Belief::PBox { lower, upper } => Belief::PBox {
                lower: upper.iter().map(|u| 1.0 - u).collect(),
                upper: lower.iter().map(|l| 1.0 - l).collect(),
            },
        }
    }

    fn zero(&self) -> Belief {
        match self {
            Belief::Scalar(_) => Belief::Scalar(0.0),
            Belief::Interval { .. } => Belief::Interval { lo: 0.0, hi: 0.0 },
            Belief::PBox { lower, .. } => Belief::PBox {
                lower: vec![0.0; lower.len()],
                upper: vec![0.0; lower.len()],
            },
        }
    }

    fn one(&self) -> Belief {
        match self {
            Belief::Scalar(_) => Belief::Scalar(1.0),
            Belief::Interval { .. } => Belief::Interval { lo: 1.0, hi: 1.0 },
            Belief::PBox { lower, .. } => Belief::PBox {
                lower: vec![1.0; lower.len()],
                upper: vec![1.0; lower.len()],
            },
        }
    }
}

fn mismatched_variants(op: &str) -> ! {
    panic!("belief algebra `{op}` called with mismatched uncertainty types; all beliefs in a run must share one variant")
}

/// Independent convolution of two p-boxes, each a set of equally-weighted
/// focal intervals. Forms the full `n_a * n_b` outer product of focal
/// intervals under `combine` (the random-set independence assumption), then
/// rebins down to `self`'s granularity by sorting the combined lower bounds
/// and upper bounds independently and taking evenly-spaced quantiles — the
/// standard discretized p-box convolution, traded for exactness in the
/// (rare, and explicitly out of the critical path) case this engine runs
/// with p-box beliefs.
fn pbox_combine(a: &Belief, b: &Belief, combine: impl Fn(f64, f64, f64, f64) -> (f64, f64)) -> Belief {
    let (Belief::PBox {
        lower: a_lo,
        upper: a_hi,
    },
    Belief::PBox {
        lower: b_lo,
        upper: b_hi,
    }) = (a, b)
    else {
        mismatched_variants("pbox_combine");
    };

    let mut los = Vec::with_capacity(a_lo.len() * b_lo.len());
    let mut his = Vec::with_capacity(a_lo.len() * b_lo.len());
    for (&al, &ah) in a_lo.iter().zip(a_hi) {
        for (&bl, &bh) in b_lo.iter().zip(b_hi) {
            let (lo, hi) = combine(al, ah, bl, bh);
            los.push(lo);
            his.push(hi);
        }
    }
    los.sort_by(|x, y| x.total_cmp(y));
    his.sort_by(|x, y| x.total_cmp(y));

    let n_out = a_lo.len().max(1);
    let pick = |sorted: &[f64], i: usize| -> f64 {
        let idx = (i * sorted.len() / n_out).min(sorted.len() - 1);
        sorted[idx]
    };
    let lower = (0..n_out).map(|i| pick(&los, i)).collect();
    let upper = (0..n_out).map(|i| pick(&his, i)).collect();
    Belief::PBox { lower, upper }
}

/// Clamp a belief back into the valid range of its uncertainty type.
/// Algebra operations above never do this themselves; callers that
/// accumulate floating-point error (inclusion-exclusion's alternating sum,
/// the final `prior * preprior` multiply) call it explicitly.
pub fn clamp(belief: Belief) -> Belief {
    match belief {
        Belief::Scalar(p) => Belief::Scalar(p.clamp(0.0, 1.0)),
        Belief::Interval { lo, hi } => {
            let lo = lo.clamp(0.0, 1.0);
            let hi = hi.clamp(0.0, 1.0);
            Belief::Interval {
                lo: lo.min(hi),
                hi: hi.max(lo),
            }
        }
        Belief::PBox { lower, upper } => {
            let lower: Vec<f64> = lower.into_iter().map(|l| l.clamp(0.0, 1.0)).collect();
            let upper: Vec<f64> = upper.into_iter().map(|u| u.clamp(0.0, 1.0)).collect();
            let upper = lower
                .iter()
                .zip(upper)
                .map(|(&l, u)| u.max(l))
                .collect();
            Belief::PBox { lower, upper }
        }
    }
}
