//! Working state kept between calls.
//!
//! The workspace holds owned copies of the problem data as it stood at setup
//! or the last update. `solve` reads from here, so data changes reach the
//! solver only through `update`.

use qpsess_common::{
    sense, ExitFlag, ProblemDims, ProblemView, Settings, SolverError, SolverResult, UpdateMask,
};

/// Solver-internal state owned by one session.
#[derive(Debug, Clone)]
pub struct ClarabelWorkspace {
    pub(crate) dims: ProblemDims,
    /// Symmetrised quadratic cost, `n x n` column-major.
    pub(crate) hessian: Option<Vec<f64>>,
    pub(crate) linear: Option<Vec<f64>>,
    /// General constraint rows, `m - ms` rows of `n`.
    pub(crate) rows: Vec<f64>,
    pub(crate) bupper: Vec<f64>,
    pub(crate) blower: Vec<f64>,
    /// Sense codes with the binary bit forced on for `bin_ids`.
    pub(crate) sense: Vec<i32>,
    pub(crate) bin_ids: Vec<usize>,
    /// Proximal weight in force at setup, used by later convexity checks.
    pub(crate) eps_prox: f64,
    /// Seconds spent in setup or the most recent update.
    pub(crate) setup_time: f64,
}

impl ClarabelWorkspace {
    /// Builds the workspace, rejecting problems the solver cannot accept.
    pub(crate) fn build(
        problem: &ProblemView<'_>,
        bin_ids: &[usize],
        settings: &Settings,
    ) -> Result<Self, ExitFlag> {
        let dims = problem.dims;
        let hessian = problem.h.map(|h| symmetrise(h, dims.n));
        if let Some(h) = &hessian {
            if !is_positive_semidefinite(h, dims.n, settings.eps_prox) {
                return Err(ExitFlag::NonConvex);
            }
        }

        let mut sense = problem.sense.to_vec();
        mark_binary(&mut sense, bin_ids);
        if count_equalities(&sense) > dims.n {
            return Err(ExitFlag::OverdeterminedInitial);
        }

        Ok(Self {
            dims,
            hessian,
            linear: problem.f.map(<[f64]>::to_vec),
            rows: problem.a.to_vec(),
            bupper: problem.bupper.to_vec(),
            blower: problem.blower.to_vec(),
            sense,
            bin_ids: bin_ids.to_vec(),
            eps_prox: settings.eps_prox,
            setup_time: 0.0,
        })
    }

    /// Applies the parts of `problem` named by `mask`.
    ///
    /// Everything is validated before anything is written.
    pub(crate) fn apply(
        &mut self,
        problem: &ProblemView<'_>,
        mask: UpdateMask,
    ) -> SolverResult<()> {
        let n = self.dims.n;

        let hessian = if mask.contains(UpdateMask::HESSIAN) {
            let h = problem.h.map(|h| symmetrise(h, n));
            if let Some(h) = &h {
                if !is_positive_semidefinite(h, n, self.eps_prox) {
                    return Err(SolverError::UpdateRejected {
                        flag: ExitFlag::NonConvex,
                    });
                }
            }
            Some(h)
        } else {
            None
        };

        let sense = if mask.contains(UpdateMask::SENSE) {
            let mut s = problem.sense.to_vec();
            mark_binary(&mut s, &self.bin_ids);
            if count_equalities(&s) > n {
                return Err(SolverError::UpdateRejected {
                    flag: ExitFlag::OverdeterminedInitial,
                });
            }
            Some(s)
        } else {
            None
        };

        if let Some(h) = hessian {
            self.hessian = h;
        }
        if let Some(s) = sense {
            self.sense = s;
        }
        if mask.contains(UpdateMask::CONSTRAINTS) {
            self.rows.clear();
            self.rows.extend_from_slice(problem.a);
        }
        if mask.contains(UpdateMask::LINEAR_COST) {
            self.linear = problem.f.map(<[f64]>::to_vec);
        }
        if mask.contains(UpdateMask::BOUNDS) {
            self.bupper.clear();
            self.bupper.extend_from_slice(problem.bupper);
            self.blower.clear();
            self.blower.extend_from_slice(problem.blower);
        }
        Ok(())
    }

    pub fn dims(&self) -> ProblemDims {
        self.dims
    }

    /// The stored problem as a borrowed view.
    pub fn view(&self) -> ProblemView<'_> {
        ProblemView {
            dims: self.dims,
            h: self.hessian.as_deref(),
            f: self.linear.as_deref(),
            a: &self.rows,
            bupper: &self.bupper,
            blower: &self.blower,
            sense: &self.sense,
        }
    }

    /// Objective of the stored problem at `x`.
    pub fn objective(&self, x: &[f64]) -> f64 {
        self.view().objective(x)
    }

    /// Coefficients of constraint `i` as `(variable, coefficient)` pairs.
    pub(crate) fn coefficients(&self, i: usize) -> Vec<(usize, f64)> {
        let n = self.dims.n;
        if i < self.dims.ms {
            return vec![(i, 1.0)];
        }
        let k = i - self.dims.ms;
        self.rows[k * n..(k + 1) * n]
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v != 0.0)
            .map(|(j, &v)| (j, v))
            .collect()
    }

    /// Value of constraint `i` at `x`.
    pub(crate) fn constraint_value(&self, i: usize, x: &[f64]) -> f64 {
        self.coefficients(i).iter().map(|&(j, v)| v * x[j]).sum()
    }
}

/// Checks that every buffer in `problem` has the length `dims` implies.
pub(crate) fn check_lengths(dims: ProblemDims, problem: &ProblemView<'_>) -> SolverResult<()> {
    let checks = [
        ("H", problem.h.map(<[f64]>::len), dims.n * dims.n),
        ("f", problem.f.map(<[f64]>::len), dims.n),
        ("A", Some(problem.a.len()), dims.general() * dims.n),
        ("bupper", Some(problem.bupper.len()), dims.m),
        ("blower", Some(problem.blower.len()), dims.m),
        ("sense", Some(problem.sense.len()), dims.m),
    ];
    for (what, found, expected) in checks {
        if let Some(found) = found {
            if found != expected {
                return Err(SolverError::BufferLength {
                    what,
                    expected,
                    found,
                });
            }
        }
    }
    Ok(())
}

fn mark_binary(sense_codes: &mut [i32], bin_ids: &[usize]) {
    for &i in bin_ids {
        if let Some(code) = sense_codes.get_mut(i) {
            *code |= sense::BINARY;
        }
    }
}

fn count_equalities(sense_codes: &[i32]) -> usize {
    sense_codes
        .iter()
        .filter(|&&c| sense::is_equality(c))
        .count()
}

/// `(H + Hᵀ) / 2`, column-major.
fn symmetrise(h: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![0.0; n * n];
    for col in 0..n {
        for row in 0..n {
            out[col * n + row] = 0.5 * (h[col * n + row] + h[row * n + col]);
        }
    }
    out
}

/// Dense Cholesky of `H + δI`, where δ is `eps_prox` plus a small relative shift.
///
/// Positive semidefinite matrices pass; a negative eigenvalue larger than the
/// shift makes a pivot non-positive.
fn is_positive_semidefinite(h: &[f64], n: usize, eps_prox: f64) -> bool {
    let max_diag = (0..n).map(|i| h[i * n + i].abs()).fold(0.0, f64::max);
    let shift = eps_prox.max(0.0) + 1e-9 * (1.0 + max_diag);

    // Row-major lower factor.
    let mut l = vec![0.0; n * n];
    for j in 0..n {
        let mut d = h[j * n + j] + shift;
        for k in 0..j {
            d -= l[j * n + k] * l[j * n + k];
        }
        if d <= 0.0 || !d.is_finite() {
            return false;
        }
        let d = d.sqrt();
        l[j * n + j] = d;
        for i in j + 1..n {
            let mut s = h[j * n + i];
            for k in 0..j {
                s -= l[i * n + k] * l[j * n + k];
            }
            l[i * n + j] = s / d;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psd_check() {
        assert!(is_positive_semidefinite(&[1.0, 0.0, 0.0, 1.0], 2, 0.0));
        // Singular but PSD
        assert!(is_positive_semidefinite(&[1.0, 1.0, 1.0, 1.0], 2, 0.0));
        assert!(is_positive_semidefinite(&[0.0; 4], 2, 0.0));
        assert!(!is_positive_semidefinite(&[-1.0, 0.0, 0.0, 1.0], 2, 0.0));
        assert!(!is_positive_semidefinite(&[1.0, 2.0, 2.0, 1.0], 2, 0.0));
    }

    #[test]
    fn test_proximal_weight_rescues_mildly_indefinite() {
        let h = [1.0, 0.0, 0.0, -0.01];
        assert!(!is_positive_semidefinite(&h, 2, 0.0));
        assert!(is_positive_semidefinite(&h, 2, 0.1));
    }

    #[test]
    fn test_symmetrise_averages_off_diagonal() {
        let h = symmetrise(&[1.0, 4.0, 0.0, 1.0], 2);
        assert_eq!(h, vec![1.0, 2.0, 2.0, 1.0]);
    }

    #[test]
    fn test_mark_binary_ignores_out_of_range() {
        let mut s = vec![0, sense::SOFT];
        mark_binary(&mut s, &[1, 7]);
        assert_eq!(s, vec![0, sense::SOFT | sense::BINARY]);
    }
}
