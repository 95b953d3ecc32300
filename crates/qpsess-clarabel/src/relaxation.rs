//! One continuous relaxation, assembled as a conic program and solved by Clarabel.
//!
//! Clarabel solves
//!
//! ```text
//! minimize    ½ xᵀPx + qᵀx
//! subject to  Ax + s = b,  s ∈ K
//! ```
//!
//! Each QP constraint `blower ≤ a·x ≤ bupper` becomes up to two nonnegative-cone
//! rows (`a·x ≤ bupper`, `-a·x ≤ -blower`) or one zero-cone row when it is held
//! as an equality. Soft constraints share one extra variable `t ≥ 0` that
//! loosens both sides and is penalised by `t² / (2·rho_soft)`.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettings, DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use qpsess_common::{is_infinite, sense, ExitFlag, Settings, SolverError, SolverResult};

use crate::workspace::ClarabelWorkspace;
use crate::EngineOptions;

/// Which bound a constraint is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Lower,
    Upper,
}

/// A constraint pinned to one of its bounds by the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fixing {
    pub constraint: usize,
    pub side: Side,
}

/// Result of one relaxation.
#[derive(Debug, Clone)]
pub(crate) struct Relaxation {
    pub flag: ExitFlag,
    pub x: Vec<f64>,
    pub lambda: Vec<f64>,
    /// Engine objective, including the soft penalty.
    pub objective: f64,
    pub soft_slack: f64,
    pub iterations: usize,
}

/// Maps a conic row back to the constraint it came from.
#[derive(Debug, Clone, Copy)]
struct RowOrigin {
    constraint: usize,
    /// Contribution of the row's dual to the constraint multiplier.
    sign: f64,
}

/// Accumulates conic rows column-wise, merging consecutive cones of one kind.
struct ConicBuilder {
    columns: Vec<Vec<(usize, f64)>>,
    rhs: Vec<f64>,
    cones: Vec<SupportedConeT<f64>>,
    origins: Vec<Option<RowOrigin>>,
}

impl ConicBuilder {
    fn new(n_var: usize) -> Self {
        Self {
            columns: vec![Vec::new(); n_var],
            rhs: Vec::new(),
            cones: Vec::new(),
            origins: Vec::new(),
        }
    }

    fn push_row(&mut self, coeffs: &[(usize, f64)], b: f64, origin: Option<RowOrigin>) -> usize {
        let row = self.rhs.len();
        for &(col, val) in coeffs {
            self.columns[col].push((row, val));
        }
        self.rhs.push(b);
        self.origins.push(origin);
        row
    }

    /// Σ coeffᵢ·xᵢ = b
    fn push_eq(&mut self, coeffs: &[(usize, f64)], b: f64, origin: Option<RowOrigin>) {
        self.push_row(coeffs, b, origin);
        match self.cones.last_mut() {
            Some(SupportedConeT::ZeroConeT(n)) => *n += 1,
            _ => self.cones.push(SupportedConeT::ZeroConeT(1)),
        }
    }

    /// Σ coeffᵢ·xᵢ ≤ b
    fn push_leq(&mut self, coeffs: &[(usize, f64)], b: f64, origin: Option<RowOrigin>) {
        self.push_row(coeffs, b, origin);
        match self.cones.last_mut() {
            Some(SupportedConeT::NonnegativeConeT(n)) => *n += 1,
            _ => self.cones.push(SupportedConeT::NonnegativeConeT(1)),
        }
    }

    fn matrix(&mut self) -> CscMatrix<f64> {
        let n_var = self.columns.len();
        let mut col_ptr = Vec::with_capacity(n_var + 1);
        let mut row_idx = Vec::new();
        let mut values = Vec::new();
        for column in &mut self.columns {
            col_ptr.push(row_idx.len());
            column.sort_by_key(|&(r, _)| r);
            for &(r, v) in column.iter() {
                row_idx.push(r);
                values.push(v);
            }
        }
        col_ptr.push(row_idx.len());
        CscMatrix::new(self.rhs.len(), n_var, col_ptr, row_idx, values)
    }
}

/// Upper triangle of the quadratic cost in CSC form, plus the soft penalty.
fn quadratic_cost(work: &ClarabelWorkspace, n_var: usize, soft_weight: Option<f64>) -> CscMatrix<f64> {
    let n = work.dims.n;
    let mut col_ptr = Vec::with_capacity(n_var + 1);
    let mut row_idx = Vec::new();
    let mut values = Vec::new();
    for col in 0..n_var {
        col_ptr.push(row_idx.len());
        if col < n {
            if let Some(h) = &work.hessian {
                for row in 0..=col {
                    let v = h[col * n + row];
                    if v != 0.0 {
                        row_idx.push(row);
                        values.push(v);
                    }
                }
            }
        } else if let Some(w) = soft_weight {
            row_idx.push(col);
            values.push(w);
        }
    }
    col_ptr.push(row_idx.len());
    CscMatrix::new(n_var, n_var, col_ptr, row_idx, values)
}

/// Translates the engine status into the solver's exit flag.
fn exit_flag(status: SolverStatus) -> ExitFlag {
    match status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => ExitFlag::Optimal,
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            ExitFlag::Infeasible
        }
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => ExitFlag::Unbounded,
        SolverStatus::MaxIterations | SolverStatus::MaxTime => ExitFlag::IterLimit,
        _ => ExitFlag::Numerical,
    }
}

/// Solves the relaxation of `work` with `fixings` applied.
pub(crate) fn solve_relaxation(
    work: &ClarabelWorkspace,
    fixings: &[Fixing],
    settings: &Settings,
    options: &EngineOptions,
) -> SolverResult<Relaxation> {
    let dims = work.dims;
    let n = dims.n;

    let has_soft = (0..dims.m).any(|i| {
        let code = work.sense[i];
        sense::is_soft(code) && !sense::is_removed(code) && !fixings.iter().any(|f| f.constraint == i)
    });

    let soft_weight = if has_soft {
        if settings.rho_soft <= 0.0 {
            return Err(SolverError::InvalidSetting {
                field: "rho_soft",
                reason: format!("must be positive, got {}", settings.rho_soft),
            });
        }
        Some(1.0 / settings.rho_soft)
    } else {
        None
    };
    let engine_settings = engine_settings(settings, options)?;
    if n == 0 {
        // Clarabel needs at least one primal variable.
        return Ok(constant_relaxation(work, fixings, settings.primal_tol, soft_weight));
    }

    let n_var = n + usize::from(has_soft);
    let slack = n;

    let mut builder = ConicBuilder::new(n_var);
    for i in 0..dims.m {
        let code = work.sense[i];
        if sense::is_removed(code) {
            continue;
        }
        let coeffs = work.coefficients(i);
        let upper = work.bupper[i];
        let lower = work.blower[i];

        if let Some(side) = pinned_side(i, code, fixings) {
            let b = match side {
                Side::Lower => lower,
                Side::Upper => upper,
            };
            if !is_infinite(b) {
                let origin = RowOrigin {
                    constraint: i,
                    sign: 1.0,
                };
                builder.push_eq(&coeffs, b, Some(origin));
            }
            continue;
        }

        let soft = has_soft && sense::is_soft(code);
        if !is_infinite(upper) {
            let mut row = coeffs.clone();
            if soft {
                row.push((slack, -1.0));
            }
            let origin = RowOrigin {
                constraint: i,
                sign: 1.0,
            };
            builder.push_leq(&row, upper, Some(origin));
        }
        if !is_infinite(lower) {
            let mut row: Vec<(usize, f64)> = coeffs.iter().map(|&(j, v)| (j, -v)).collect();
            if soft {
                row.push((slack, -1.0));
            }
            let origin = RowOrigin {
                constraint: i,
                sign: -1.0,
            };
            builder.push_leq(&row, -lower, Some(origin));
        }
    }
    if has_soft {
        builder.push_leq(&[(slack, -1.0)], 0.0, None);
    }

    let p = quadratic_cost(work, n_var, soft_weight);
    let mut q = vec![0.0; n_var];
    if let Some(f) = &work.linear {
        q[..n].copy_from_slice(f);
    }
    let a = builder.matrix();

    let mut solver = DefaultSolver::new(&p, &q, &a, &builder.rhs, &builder.cones, engine_settings)
        .map_err(|e| SolverError::Engine(format!("Clarabel initialization failed: {:?}", e)))?;
    solver.solve();

    let solution = &solver.solution;
    let flag = exit_flag(solution.status);
    let mut lambda = vec![0.0; dims.m];
    for (row, origin) in builder.origins.iter().enumerate() {
        if let Some(origin) = origin {
            lambda[origin.constraint] += origin.sign * solution.z[row];
        }
    }

    Ok(Relaxation {
        flag,
        x: solution.x[..n].to_vec(),
        lambda,
        objective: solution.obj_val,
        soft_slack: if has_soft {
            solution.x[slack].max(0.0)
        } else {
            0.0
        },
        iterations: solution.iterations as usize,
    })
}

/// Bound a constraint is held at: a search fixing first, then an active equality.
fn pinned_side(constraint: usize, code: i32, fixings: &[Fixing]) -> Option<Side> {
    fixings
        .iter()
        .find(|f| f.constraint == constraint)
        .map(|f| f.side)
        .or_else(|| {
            sense::is_equality(code).then(|| {
                if code & sense::LOWER != 0 {
                    Side::Lower
                } else {
                    Side::Upper
                }
            })
        })
}

/// Relaxation of a problem without variables, where every constraint reads 0.
fn constant_relaxation(
    work: &ClarabelWorkspace,
    fixings: &[Fixing],
    tol: f64,
    soft_weight: Option<f64>,
) -> Relaxation {
    let mut feasible = true;
    let mut soft_slack: f64 = 0.0;
    for i in 0..work.dims.m {
        let code = work.sense[i];
        if sense::is_removed(code) {
            continue;
        }
        let pinned = pinned_side(i, code, fixings);
        let (lower, upper) = match pinned {
            Some(Side::Lower) => (work.blower[i], work.blower[i]),
            Some(Side::Upper) => (work.bupper[i], work.bupper[i]),
            None => (work.blower[i], work.bupper[i]),
        };
        let mut violation: f64 = 0.0;
        if !is_infinite(lower) {
            violation = violation.max(lower);
        }
        if !is_infinite(upper) {
            violation = violation.max(-upper);
        }

        if soft_weight.is_some() && sense::is_soft(code) && pinned.is_none() {
            soft_slack = soft_slack.max(violation);
        } else if violation > tol {
            feasible = false;
        }
    }

    Relaxation {
        flag: if feasible {
            ExitFlag::Optimal
        } else {
            ExitFlag::Infeasible
        },
        x: Vec::new(),
        lambda: vec![0.0; work.dims.m],
        objective: soft_weight.map_or(0.0, |w| 0.5 * w * soft_slack * soft_slack),
        soft_slack,
        iterations: 0,
    }
}

/// Maps session settings onto Clarabel's own.
///
/// Only the tolerance and iteration limit have a Clarabel counterpart; the
/// remaining fields are consumed by the search or not at all.
fn engine_settings(
    settings: &Settings,
    options: &EngineOptions,
) -> SolverResult<DefaultSettings<f64>> {
    if settings.iter_limit <= 0 {
        return Err(SolverError::InvalidSetting {
            field: "iter_limit",
            reason: format!("must be positive, got {}", settings.iter_limit),
        });
    }
    if settings.primal_tol.is_nan() || settings.primal_tol <= 0.0 {
        return Err(SolverError::InvalidSetting {
            field: "primal_tol",
            reason: format!("must be positive, got {}", settings.primal_tol),
        });
    }

    DefaultSettingsBuilder::default()
        .verbose(options.verbose)
        .max_iter(settings.iter_limit as u32)
        .tol_feas(settings.primal_tol)
        .time_limit(options.time_limit.unwrap_or(f64::INFINITY))
        .build()
        .map_err(|e| SolverError::Engine(format!("Clarabel settings error: {:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_merges_consecutive_cones() {
        let mut b = ConicBuilder::new(2);
        b.push_eq(&[(0, 1.0)], 1.0, None);
        b.push_eq(&[(1, 1.0)], 1.0, None);
        b.push_leq(&[(0, 1.0), (1, 1.0)], 3.0, None);
        b.push_eq(&[(1, 2.0)], 0.0, None);
        assert_eq!(b.cones.len(), 3);
        assert!(matches!(b.cones[0], SupportedConeT::ZeroConeT(2)));
        assert!(matches!(b.cones[1], SupportedConeT::NonnegativeConeT(1)));
        assert!(matches!(b.cones[2], SupportedConeT::ZeroConeT(1)));

        let a = b.matrix();
        assert_eq!(a.m, 4);
        assert_eq!(a.n, 2);
        assert_eq!(a.colptr, vec![0, 2, 5]);
        assert_eq!(a.rowval, vec![0, 2, 1, 2, 3]);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(exit_flag(SolverStatus::Solved), ExitFlag::Optimal);
        assert_eq!(exit_flag(SolverStatus::PrimalInfeasible), ExitFlag::Infeasible);
        assert_eq!(exit_flag(SolverStatus::DualInfeasible), ExitFlag::Unbounded);
        assert_eq!(exit_flag(SolverStatus::MaxIterations), ExitFlag::IterLimit);
        assert_eq!(exit_flag(SolverStatus::NumericalError), ExitFlag::Numerical);
    }
}
