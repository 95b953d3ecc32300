//! Error types for bridge dispatch.

use qpsess_common::SolverError;
use thiserror::Error;

use crate::registry::SessionHandle;

/// Result type for bridge operations.
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

/// Errors from a single dispatch.
///
/// None of these leave state behind on the session: a failed command has
/// either changed nothing or, for `setup`, rolled back completely.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The command name is not one the bridge knows.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A positional argument was not supplied.
    #[error("{command}: missing argument {position} ({name})")]
    MissingArgument {
        command: &'static str,
        position: usize,
        name: &'static str,
    },

    /// An argument has the wrong value kind.
    #[error("{command}: argument {name} must be {expected}, got {found}")]
    TypeMismatch {
        command: &'static str,
        name: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// An argument has the wrong shape for the problem.
    #[error("{argument}: expected {expected}, found {found}")]
    DimensionMismatch {
        argument: &'static str,
        expected: String,
        found: String,
    },

    /// The handle was never issued by this registry.
    #[error("invalid session handle {0}")]
    InvalidHandle(SessionHandle),

    /// The handle referred to a session that has since been deleted.
    #[error("stale session handle {0}")]
    StaleHandle(SessionHandle),

    /// The registry is at its configured capacity.
    #[error("session limit of {0} reached")]
    RegistryFull(usize),

    /// `setup` on a session that already has a problem.
    #[error("setup already completed")]
    SetupAlreadyCompleted,

    /// `solve` on a session without a problem.
    #[error("no problem to solve")]
    NoProblemToSolve,

    /// `update` on a session without a problem.
    #[error("no problem to update")]
    NoProblemToUpdate,

    /// Settings were read or written before initialization.
    #[error("settings not initialized")]
    SettingsNotInitialized,

    /// A settings record lacks a field.
    #[error("settings record is missing field {0}")]
    MissingSettingsField(&'static str),

    /// A settings field is not a numeric scalar.
    #[error("settings field {field} must be a numeric scalar, got {found}")]
    InvalidSettingsField {
        field: &'static str,
        found: &'static str,
    },

    /// The solver collaborator failed outside its exit flags.
    #[error("solver error: {0}")]
    Solver(#[from] SolverError),
}

impl BridgeError {
    /// Stable snake_case name of the error, for transports.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::UnknownCommand(_) => "unknown_command",
            BridgeError::MissingArgument { .. } => "missing_argument",
            BridgeError::TypeMismatch { .. } => "type_mismatch",
            BridgeError::DimensionMismatch { .. } => "dimension_mismatch",
            BridgeError::InvalidHandle(_) => "invalid_handle",
            BridgeError::StaleHandle(_) => "stale_handle",
            BridgeError::RegistryFull(_) => "registry_full",
            BridgeError::SetupAlreadyCompleted => "setup_already_completed",
            BridgeError::NoProblemToSolve => "no_problem_to_solve",
            BridgeError::NoProblemToUpdate => "no_problem_to_update",
            BridgeError::SettingsNotInitialized => "settings_not_initialized",
            BridgeError::MissingSettingsField(_) => "missing_settings_field",
            BridgeError::InvalidSettingsField { .. } => "invalid_settings_field",
            BridgeError::Solver(_) => "solver",
        }
    }
}
