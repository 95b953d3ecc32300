//! Problem representation handed to solvers.
//!
//! A session keeps only the fixed part of a problem (its dimensions and the
//! binary constraint indices). The numeric buffers stay host-owned and are
//! lent to the solver for the duration of one call as a [`ProblemView`].

use serde::{Deserialize, Serialize};

/// Per-constraint sense bits.
///
/// The values belong to the solver contract and are passed through by the
/// bridge unchanged.
pub mod sense {
    /// Constraint is in the working set.
    pub const ACTIVE: i32 = 1;
    /// Active at the lower rather than the upper bound.
    pub const LOWER: i32 = 2;
    /// Working-set membership may not change. With `ACTIVE` this is an equality.
    pub const IMMUTABLE: i32 = 4;
    /// Constraint may be violated at a penalty.
    pub const SOFT: i32 = 8;
    /// Constraint must end at one of its bounds.
    pub const BINARY: i32 = 16;

    /// Equality constraint (held at the upper bound unless `LOWER` is set).
    pub fn is_equality(code: i32) -> bool {
        code & (ACTIVE | IMMUTABLE) == ACTIVE | IMMUTABLE
    }

    /// Constraint removed from the problem.
    pub fn is_removed(code: i32) -> bool {
        code & IMMUTABLE != 0 && code & ACTIVE == 0
    }

    pub fn is_soft(code: i32) -> bool {
        code & SOFT != 0
    }

    pub fn is_binary(code: i32) -> bool {
        code & BINARY != 0
    }
}

/// Problem dimensions, fixed at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProblemDims {
    /// Decision variables.
    pub n: usize,
    /// Constraints in total.
    pub m: usize,
    /// Leading constraints that bound a single variable (`x[i]` for `i < ms`).
    pub ms: usize,
    /// Binary constraints.
    pub nb: usize,
}

impl ProblemDims {
    /// Rows of the general constraint block (`m - ms`).
    pub fn general(&self) -> usize {
        self.m - self.ms
    }
}

impl std::fmt::Display for ProblemDims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "n={}, m={}, ms={}, nb={}",
            self.n, self.m, self.ms, self.nb
        )
    }
}

/// Borrowed problem buffers for a single call.
///
/// Every slice aliases host memory and cannot outlive the call it was
/// created for. Lengths are validated by the bridge before a view is built.
#[derive(Debug, Clone, Copy)]
pub struct ProblemView<'a> {
    pub dims: ProblemDims,
    /// Quadratic cost, `n x n` column-major. `None` means zero.
    pub h: Option<&'a [f64]>,
    /// Linear cost, length `n`. `None` means zero.
    pub f: Option<&'a [f64]>,
    /// General constraint block, `m - ms` rows of `n` coefficients each.
    ///
    /// The host passes the block transposed (`n x (m - ms)` column-major),
    /// which makes each constraint row contiguous.
    pub a: &'a [f64],
    pub bupper: &'a [f64],
    pub blower: &'a [f64],
    pub sense: &'a [i32],
}

impl<'a> ProblemView<'a> {
    /// Entry `H[row, col]`, zero when the quadratic term is absent.
    #[inline]
    pub fn hessian(&self, row: usize, col: usize) -> f64 {
        self.h.map_or(0.0, |h| h[col * self.dims.n + row])
    }

    /// Coefficients of general constraint `k` (constraint index `ms + k`).
    #[inline]
    pub fn constraint_row(&self, k: usize) -> &'a [f64] {
        let n = self.dims.n;
        &self.a[k * n..(k + 1) * n]
    }

    /// Value of constraint `i` at `x`.
    pub fn constraint_value(&self, i: usize, x: &[f64]) -> f64 {
        if i < self.dims.ms {
            x[i]
        } else {
            dot(self.constraint_row(i - self.dims.ms), x)
        }
    }

    /// Objective `½ xᵀHx + fᵀx` at `x`.
    pub fn objective(&self, x: &[f64]) -> f64 {
        let n = self.dims.n;
        let mut value = 0.0;
        if let Some(h) = self.h {
            for col in 0..n {
                let column = &h[col * n..(col + 1) * n];
                value += 0.5 * x[col] * dot(column, x);
            }
        }
        if let Some(f) = self.f {
            value += dot(f, x);
        }
        value
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Bitmask naming the problem fields that changed since the last solve.
///
/// The enumeration is owned by the solver contract; the bridge forwards the
/// raw bits without looking at them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UpdateMask(i32);

impl UpdateMask {
    /// Quadratic cost changed.
    pub const HESSIAN: UpdateMask = UpdateMask(1);
    /// Constraint matrix changed. Also required whenever `HESSIAN` is set.
    pub const CONSTRAINTS: UpdateMask = UpdateMask(2);
    /// Linear cost changed.
    pub const LINEAR_COST: UpdateMask = UpdateMask(4);
    /// Upper or lower bounds changed.
    pub const BOUNDS: UpdateMask = UpdateMask(8);
    /// Sense codes changed.
    pub const SENSE: UpdateMask = UpdateMask(16);

    /// Wraps raw bits as received from the host.
    pub const fn from_bits(bits: i32) -> Self {
        UpdateMask(bits)
    }

    pub const fn bits(self) -> i32 {
        self.0
    }

    pub const fn contains(self, other: UpdateMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for UpdateMask {
    type Output = UpdateMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        UpdateMask(self.0 | rhs.0)
    }
}

impl std::fmt::Display for UpdateMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#07b}", self.0)
    }
}
