//! Solve outcomes reported by solvers.

use serde::{Deserialize, Serialize};

/// Exit flag of a setup or solve.
///
/// Positive values are successes, negative values failures. Setup reports
/// `0` on success, which has no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum ExitFlag {
    /// Optimal, with some soft constraints violated.
    SoftOptimal = 2,
    /// Optimal.
    Optimal = 1,
    /// Primal infeasible.
    Infeasible = -1,
    /// Cycling detected.
    Cycle = -2,
    /// Unbounded.
    Unbounded = -3,
    /// Iteration limit reached.
    IterLimit = -4,
    /// Quadratic cost is not positive semidefinite.
    NonConvex = -5,
    /// Initial working set has more active constraints than variables.
    OverdeterminedInitial = -6,
    /// Numerical failure in the engine.
    Numerical = -7,
}

impl ExitFlag {
    /// Raw int32 code as seen by the host.
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for ExitFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExitFlag::SoftOptimal => "soft_optimal",
            ExitFlag::Optimal => "optimal",
            ExitFlag::Infeasible => "infeasible",
            ExitFlag::Cycle => "cycle",
            ExitFlag::Unbounded => "unbounded",
            ExitFlag::IterLimit => "iteration_limit",
            ExitFlag::NonConvex => "nonconvex",
            ExitFlag::OverdeterminedInitial => "overdetermined_initial",
            ExitFlag::Numerical => "numerical_error",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// Scalar diagnostics of one solve.
///
/// The solution vectors are written into caller-provided buffers; this
/// struct carries everything else.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveInfo {
    pub exitflag: ExitFlag,
    /// Objective value at the returned point.
    pub fval: f64,
    pub iterations: usize,
    /// Seconds spent in setup or the last update.
    pub setup_time: f64,
    /// Seconds spent in this solve.
    pub solve_time: f64,
    /// Search nodes explored, `None` if no discrete search ran.
    pub nodes: Option<usize>,
    /// Largest soft constraint violation.
    pub soft_slack: f64,
}
