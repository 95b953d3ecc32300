//! The solver contract.
//!
//! A solver collaborator implements [`QpSolver`]. The bridge calls it once
//! per dispatched command and never looks inside its workspace.
//!
//! # Usage
//!
//! ```rust,ignore
//! use qpsess_common::{QpSolver, ProblemView, Settings, SetupReport, SolveInfo, UpdateMask};
//!
//! struct MySolver;
//!
//! impl QpSolver for MySolver {
//!     type Workspace = MyWorkspace;
//!     fn name(&self) -> &'static str { "my-solver" }
//!     fn default_settings(&self) -> Settings { /* ... */ }
//!     fn setup(&self, problem: &ProblemView<'_>, bin_ids: &[usize], settings: &Settings)
//!         -> SetupReport<MyWorkspace> { /* ... */ }
//!     // ...
//! }
//! ```

use crate::error::SolverResult;
use crate::problem::{ProblemView, UpdateMask};
use crate::settings::Settings;
use crate::solution::{ExitFlag, SolveInfo};

/// Outcome of [`QpSolver::setup`].
#[derive(Debug)]
pub struct SetupReport<W> {
    /// Seconds spent in setup, reported even on failure.
    pub setup_time: f64,
    /// The working state, or the flag explaining why none was built.
    pub outcome: Result<W, ExitFlag>,
}

impl<W> SetupReport<W> {
    /// Code as reported to the host: `0` on success, the negative flag otherwise.
    pub fn code(&self) -> i32 {
        match &self.outcome {
            Ok(_) => 0,
            Err(flag) => flag.code(),
        }
    }
}

/// Trait for a quadratic-programming solver driven through sessions.
///
/// The problem buffers arrive as borrowed [`ProblemView`]s that are valid for
/// one call only. Anything the solver needs across calls must be copied into
/// its [`Workspace`](QpSolver::Workspace).
pub trait QpSolver {
    /// Solver-internal working state, owned by a session.
    type Workspace;

    /// The solver name (e.g., "clarabel").
    fn name(&self) -> &'static str;

    /// Canonical default settings.
    fn default_settings(&self) -> Settings;

    /// Builds working state for a new problem.
    ///
    /// `bin_ids` lists constraints that must end at one of their bounds.
    /// A failed setup must not leave anything behind.
    fn setup(
        &self,
        problem: &ProblemView<'_>,
        bin_ids: &[usize],
        settings: &Settings,
    ) -> SetupReport<Self::Workspace>;

    /// Solves the current problem, writing the primal point into `x`
    /// (length `n`) and the multipliers into `lambda` (length `m`).
    fn solve(
        &self,
        work: &mut Self::Workspace,
        problem: &ProblemView<'_>,
        settings: &Settings,
        x: &mut [f64],
        lambda: &mut [f64],
    ) -> SolverResult<SolveInfo>;

    /// Refreshes the parts of the working state named by `mask` from `problem`.
    ///
    /// On error the workspace must be left as it was.
    fn update(
        &self,
        work: &mut Self::Workspace,
        problem: &ProblemView<'_>,
        mask: UpdateMask,
    ) -> SolverResult<()>;
}
