//! Per-session state.

use qpsess_common::{ProblemDims, Settings};

use crate::error::{BridgeError, BridgeResult};

/// What the bridge remembers about a problem after `setup`.
///
/// Only the shape survives the call; the numeric buffers belong to the host
/// and are supplied again on every `solve` and `update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemRecord {
    pub dims: ProblemDims,
}

/// One solver session.
///
/// Field order is release order: the working state goes before the problem
/// it was built from, then the settings.
#[derive(Debug)]
pub struct Session<W> {
    workspace: Option<W>,
    problem: Option<ProblemRecord>,
    settings: Option<Settings>,
}

impl<W> Default for Session<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> Session<W> {
    /// An empty session: no problem, no settings, no working state.
    pub fn new() -> Self {
        Self {
            workspace: None,
            problem: None,
            settings: None,
        }
    }

    pub fn has_problem(&self) -> bool {
        self.problem.is_some()
    }

    /// Settings, or [`BridgeError::SettingsNotInitialized`].
    pub fn require_settings(&self) -> BridgeResult<&Settings> {
        self.settings
            .as_ref()
            .ok_or(BridgeError::SettingsNotInitialized)
    }

    pub fn require_settings_mut(&mut self) -> BridgeResult<&mut Settings> {
        self.settings
            .as_mut()
            .ok_or(BridgeError::SettingsNotInitialized)
    }

    /// Replaces the settings, creating them if absent.
    pub fn install_settings(&mut self, settings: Settings) {
        self.settings = Some(settings);
    }

    /// Settings, initialising them with `defaults` if absent.
    pub fn settings_or_init(&mut self, defaults: impl FnOnce() -> Settings) -> &Settings {
        self.settings.get_or_insert_with(defaults)
    }

    /// Attaches a problem and the working state built for it.
    pub fn attach(&mut self, problem: ProblemRecord, workspace: W) {
        self.problem = Some(problem);
        self.workspace = Some(workspace);
    }

    /// Borrows everything `solve` and `update` need at once.
    ///
    /// `missing` is returned when the session has no problem yet.
    pub fn parts_mut(
        &mut self,
        missing: BridgeError,
    ) -> BridgeResult<(&ProblemRecord, &mut W, Option<&Settings>)> {
        match (&self.problem, &mut self.workspace) {
            (Some(problem), Some(work)) => Ok((problem, work, self.settings.as_ref())),
            _ => Err(missing),
        }
    }

    /// Releases the working state, then the problem, then the settings.
    pub fn release(self) {
        let Session {
            workspace,
            problem,
            settings,
        } = self;
        drop(workspace);
        drop(problem);
        drop(settings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims() -> ProblemDims {
        ProblemDims {
            n: 1,
            m: 1,
            ms: 1,
            nb: 0,
        }
    }

    #[test]
    fn test_new_session_is_empty() {
        let session: Session<()> = Session::new();
        assert!(!session.has_problem());
        assert!(matches!(
            session.require_settings(),
            Err(BridgeError::SettingsNotInitialized)
        ));
    }

    #[test]
    fn test_parts_require_problem() {
        let mut session: Session<u32> = Session::new();
        assert!(matches!(
            session.parts_mut(BridgeError::NoProblemToSolve),
            Err(BridgeError::NoProblemToSolve)
        ));

        session.attach(
            ProblemRecord { dims: dims() },
            7,
        );
        let (problem, work, settings) = session.parts_mut(BridgeError::NoProblemToSolve).unwrap();
        assert_eq!(problem.dims, dims());
        assert_eq!(*work, 7);
        assert!(settings.is_none());
    }
}
