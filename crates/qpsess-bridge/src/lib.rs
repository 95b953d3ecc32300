//! Stateful session bridge between numeric-array hosts and QP solvers.
//!
//! A host that can only pass numeric arrays, integers and records drives a
//! solver through a fixed command set:
//!
//! | Command | Arguments (after the command name) | Outputs |
//! |---|---|---|
//! | `new` | | handle |
//! | `delete` | handle | |
//! | `setup` | handle, H, f, A, bupper, blower, sense, bin_ids | code, setup_time |
//! | `solve` | handle, H, f, A, bupper, blower, sense | x, fval, exitflag, info |
//! | `set_default_settings` | handle | |
//! | `get_settings` | handle | settings |
//! | `set_settings` | handle, settings | |
//! | `update` | handle, H, f, A, bupper, blower, sense, mask | |
//!
//! Sessions live in a [`SessionRegistry`]; the handle the host sees is an
//! `i64` that packs a slot index and a generation, so deleted sessions are
//! detected instead of dereferenced. Problem buffers are borrowed for the
//! duration of one command and never retained.
//!
//! # Example
//!
//! ```rust,ignore
//! use qpsess_bridge::Bridge;
//! use qpsess_clarabel::ClarabelSolver;
//!
//! let mut bridge = Bridge::new(ClarabelSolver::new());
//! let handle = bridge.dispatch("new", &[])?.remove(0);
//! bridge.dispatch("setup", &[handle.clone(), h, f, a, bu, bl, sense, bin_ids])?;
//! let out = bridge.dispatch("solve", &[handle.clone(), h, f, a, bu, bl, sense])?;
//! bridge.dispatch("delete", &[handle])?;
//! ```

pub mod dispatch;
pub mod error;
pub mod marshal;
pub mod registry;
pub mod session;

pub use dispatch::{Bridge, BridgeOptions, Command};
pub use error::{BridgeError, BridgeResult};
pub use registry::{SessionHandle, SessionRegistry};
pub use session::{ProblemRecord, Session};
