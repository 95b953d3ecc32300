//! Common types and solver contract for qpsess.
//!
//! This crate defines everything that crosses a boundary in a qpsess
//! deployment: the restricted value domain a host can carry, the borrowed
//! problem views handed to a solver, the settings record and its declarative
//! field table, and the [`QpSolver`] trait that a solver collaborator
//! implements.
//!
//! # Architecture
//!
//! ```text
//! host ──HostValue──> qpsess-bridge ──ProblemView──> QpSolver (e.g. qpsess-clarabel)
//!      <─HostValue───               <──SolveInfo────
//! ```
//!
//! The bridge owns sessions and marshals host values; the solver owns all
//! numerics. Nothing in this crate performs numerical work beyond evaluating
//! the quadratic objective of a given point.
//!
//! # Problem form
//!
//! ```text
//! minimize    ½ xᵀHx + fᵀx
//! subject to  blower[i] ≤ x[i]      ≤ bupper[i]   for i < ms
//!             blower[i] ≤ A[i-ms]·x ≤ bupper[i]   for ms ≤ i < m
//! ```
//!
//! Per-constraint [`sense`] codes refine the meaning of each row (equality,
//! soft, binary, removed).

pub mod error;
pub mod ipc;
pub mod problem;
pub mod settings;
pub mod solution;
pub mod solver;
pub mod value;

pub use error::{SolverError, SolverResult};
pub use problem::{sense, ProblemDims, ProblemView, UpdateMask};
pub use settings::{SettingField, SettingKind, Settings, SETTING_FIELDS};
pub use solution::{ExitFlag, SolveInfo};
pub use solver::{QpSolver, SetupReport};
pub use value::{HostValue, IntMatrix, Matrix, Record};

/// Protocol version of the host transport.
/// Increment when making breaking changes to the request/reply layout.
pub const PROTOCOL_VERSION: i32 = 1;

/// Bound magnitude at or above which a bound is treated as absent.
pub const INFINITY: f64 = 1e30;

/// Returns true if `bound` is infinite in the solver's sense.
#[inline]
pub fn is_infinite(bound: f64) -> bool {
    bound.abs() >= INFINITY
}
