//! Clarabel-backed solver collaborator for qpsess sessions.
//!
//! [`ClarabelSolver`] implements [`QpSolver`] on top of the pure-Rust
//! [Clarabel](https://clarabel.org) interior-point solver. Each solve runs a
//! depth-first branch-and-bound over binary constraints, where every node is
//! one continuous relaxation handed to Clarabel. Soft constraints share a
//! single penalised slack.
//!
//! Setup copies the problem into a [`ClarabelWorkspace`] after checking that
//! the quadratic cost is positive semidefinite and that the equality set is
//! not overdetermined. `solve` reads the workspace; `update` refreshes it.

mod relaxation;
mod search;
mod workspace;

use qpsess_common::{
    ExitFlag, ProblemView, QpSolver, SetupReport, Settings, SolveInfo, SolverError, SolverResult,
    UpdateMask,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use web_time::Instant;

pub use workspace::ClarabelWorkspace;

/// Engine options that are not part of the session settings record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Print Clarabel's iteration log.
    pub verbose: bool,
    /// Wall-clock limit per relaxation, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<f64>,
}

/// Quadratic-programming solver built on Clarabel.
#[derive(Debug, Clone, Default)]
pub struct ClarabelSolver {
    options: EngineOptions,
}

impl ClarabelSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }
}

impl QpSolver for ClarabelSolver {
    type Workspace = ClarabelWorkspace;

    fn name(&self) -> &'static str {
        "clarabel"
    }

    fn default_settings(&self) -> Settings {
        Settings {
            primal_tol: 1e-6,
            dual_tol: 1e-12,
            zero_tol: 1e-11,
            pivot_tol: 1e-6,
            progress_tol: 1e-6,
            cycle_tol: 10,
            iter_limit: 1000,
            fval_bound: 1e30,
            eps_prox: 0.0,
            eta_prox: 1e-6,
            rho_soft: 1e-3,
        }
    }

    fn setup(
        &self,
        problem: &ProblemView<'_>,
        bin_ids: &[usize],
        settings: &Settings,
    ) -> SetupReport<ClarabelWorkspace> {
        let start = Instant::now();
        let outcome = workspace::check_lengths(problem.dims, problem)
            .map_err(|e| {
                warn!(error = %e, "setup rejected inconsistent buffers");
                ExitFlag::Numerical
            })
            .and_then(|()| ClarabelWorkspace::build(problem, bin_ids, settings));
        let setup_time = start.elapsed().as_secs_f64();

        let outcome = match outcome {
            Ok(mut work) => {
                work.setup_time = setup_time;
                debug!(dims = %problem.dims, setup_time, "workspace built");
                Ok(work)
            }
            Err(flag) => {
                debug!(dims = %problem.dims, %flag, "setup failed");
                Err(flag)
            }
        };
        SetupReport {
            setup_time,
            outcome,
        }
    }

    fn solve(
        &self,
        work: &mut ClarabelWorkspace,
        problem: &ProblemView<'_>,
        settings: &Settings,
        x: &mut [f64],
        lambda: &mut [f64],
    ) -> SolverResult<SolveInfo> {
        let dims = work.dims;
        workspace::check_lengths(dims, problem)?;
        if x.len() != dims.n {
            return Err(SolverError::BufferLength {
                what: "x",
                expected: dims.n,
                found: x.len(),
            });
        }
        if lambda.len() != dims.m {
            return Err(SolverError::BufferLength {
                what: "lambda",
                expected: dims.m,
                found: lambda.len(),
            });
        }

        let start = Instant::now();
        let outcome = search::search(work, settings, &self.options)?;
        let solve_time = start.elapsed().as_secs_f64();

        x.copy_from_slice(&outcome.x);
        lambda.copy_from_slice(&outcome.lambda);
        let fval = work.objective(x);
        debug!(
            exitflag = %outcome.flag,
            fval,
            iterations = outcome.iterations,
            nodes = ?outcome.nodes,
            solve_time,
            "solve finished"
        );

        Ok(SolveInfo {
            exitflag: outcome.flag,
            fval,
            iterations: outcome.iterations,
            setup_time: work.setup_time,
            solve_time,
            nodes: outcome.nodes,
            soft_slack: outcome.soft_slack,
        })
    }

    fn update(
        &self,
        work: &mut ClarabelWorkspace,
        problem: &ProblemView<'_>,
        mask: UpdateMask,
    ) -> SolverResult<()> {
        workspace::check_lengths(work.dims, problem)?;
        let start = Instant::now();
        work.apply(problem, mask)?;
        work.setup_time = start.elapsed().as_secs_f64();
        debug!(%mask, setup_time = work.setup_time, "workspace updated");
        Ok(())
    }
}
