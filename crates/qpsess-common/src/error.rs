//! Error types reported by solver collaborators.

use thiserror::Error;

use crate::solution::ExitFlag;

/// Errors a [`QpSolver`](crate::QpSolver) can raise outside of its exit flags.
///
/// Ordinary solve outcomes (infeasible, iteration limit, ...) are reported
/// through [`ExitFlag`] and are not errors. These variants cover failures of
/// the collaborator itself.
#[derive(Debug, Error)]
pub enum SolverError {
    /// The underlying numerical engine refused to start.
    #[error("solver engine error: {0}")]
    Engine(String),

    /// A settings value cannot be represented by the engine.
    #[error("invalid setting {field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    /// An incremental update left the problem in a state the solver rejects.
    ///
    /// The workspace is unchanged when this is returned.
    #[error("update rejected by solver ({flag})")]
    UpdateRejected { flag: ExitFlag },

    /// Problem buffers do not match the dimensions fixed at setup.
    #[error("{what}: expected {expected} entries, found {found}")]
    BufferLength {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Result type alias for solver operations.
pub type SolverResult<T> = Result<T, SolverError>;
