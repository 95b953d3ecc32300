//! Solver settings and their field table.
//!
//! [`SETTING_FIELDS`] is the single description of the settings record used
//! in both marshaling directions: reading a snapshot for the host and writing
//! a host record back. Adding a field here is enough for both to pick it up.

use serde::{Deserialize, Serialize};

/// Numeric tuning parameters of a solver session.
///
/// The values are opaque to the bridge. Their canonical defaults come from
/// the solver via [`QpSolver::default_settings`](crate::QpSolver::default_settings).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Primal feasibility tolerance.
    pub primal_tol: f64,
    /// Dual feasibility tolerance.
    pub dual_tol: f64,
    /// Values below this are treated as zero.
    pub zero_tol: f64,
    /// Pivoting threshold.
    pub pivot_tol: f64,
    /// Minimum objective progress before cycling is suspected.
    pub progress_tol: f64,
    /// Iterations without progress tolerated before declaring a cycle.
    pub cycle_tol: i32,
    /// Maximum iterations per solve.
    pub iter_limit: i32,
    /// Objective value above which a solve (or a search node) is abandoned.
    pub fval_bound: f64,
    /// Proximal-point regularisation weight.
    pub eps_prox: f64,
    /// Proximal-point outer tolerance.
    pub eta_prox: f64,
    /// Penalty weight for soft constraint violations.
    pub rho_soft: f64,
}

/// Numeric representation of a settings field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Float,
    /// Stored as `i32`; host values are truncated toward zero.
    Integer,
}

/// One row of the settings table.
#[derive(Clone, Copy)]
pub struct SettingField {
    pub name: &'static str,
    pub kind: SettingKind,
    get: fn(&Settings) -> f64,
    set: fn(&mut Settings, f64),
}

impl SettingField {
    /// Reads the field as a double.
    pub fn get(&self, settings: &Settings) -> f64 {
        (self.get)(settings)
    }

    /// Writes the field, converting to its stored kind.
    pub fn set(&self, settings: &mut Settings, value: f64) {
        (self.set)(settings, value)
    }
}

impl std::fmt::Debug for SettingField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingField")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Converts a host double to an integer field value.
///
/// Truncates toward zero, saturates at the `i32` range, maps NaN to 0.
pub fn coerce_integer(value: f64) -> i32 {
    value as i32
}

macro_rules! float_field {
    ($name:ident) => {
        SettingField {
            name: stringify!($name),
            kind: SettingKind::Float,
            get: {
                fn get(s: &Settings) -> f64 {
                    s.$name
                }
                get
            },
            set: {
                fn set(s: &mut Settings, v: f64) {
                    s.$name = v;
                }
                set
            },
        }
    };
}

macro_rules! integer_field {
    ($name:ident) => {
        SettingField {
            name: stringify!($name),
            kind: SettingKind::Integer,
            get: {
                fn get(s: &Settings) -> f64 {
                    f64::from(s.$name)
                }
                get
            },
            set: {
                fn set(s: &mut Settings, v: f64) {
                    s.$name = coerce_integer(v);
                }
                set
            },
        }
    };
}

/// Every settings field, in host presentation order.
pub const SETTING_FIELDS: [SettingField; 11] = [
    float_field!(primal_tol),
    float_field!(dual_tol),
    float_field!(zero_tol),
    float_field!(pivot_tol),
    float_field!(progress_tol),
    integer_field!(cycle_tol),
    integer_field!(iter_limit),
    float_field!(fval_bound),
    float_field!(eps_prox),
    float_field!(eta_prox),
    float_field!(rho_soft),
];

/// Looks up a field by name.
pub fn field(name: &str) -> Option<&'static SettingField> {
    SETTING_FIELDS.iter().find(|f| f.name == name)
}
