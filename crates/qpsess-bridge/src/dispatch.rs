//! The command dispatcher.

use qpsess_common::settings::coerce_integer;
use qpsess_common::{HostValue, QpSolver, UpdateMask};
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};
use crate::marshal::{
    setup_outputs, settings_from_record, settings_to_record, solve_outputs,
    unknown_settings_fields, Args, ProblemArgs,
};
use crate::registry::SessionRegistry;
use crate::session::{ProblemRecord, Session};

/// Commands understood by [`Bridge::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    New,
    Delete,
    Setup,
    Solve,
    SetDefaultSettings,
    GetSettings,
    SetSettings,
    Update,
}

impl Command {
    pub const ALL: [Command; 8] = [
        Command::New,
        Command::Delete,
        Command::Setup,
        Command::Solve,
        Command::SetDefaultSettings,
        Command::GetSettings,
        Command::SetSettings,
        Command::Update,
    ];

    /// Exact, case-sensitive lookup.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::New => "new",
            Command::Delete => "delete",
            Command::Setup => "setup",
            Command::Solve => "solve",
            Command::SetDefaultSettings => "set_default_settings",
            Command::GetSettings => "get_settings",
            Command::SetSettings => "set_settings",
            Command::Update => "update",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Bridge behaviour that is not part of any single command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Live session cap; 0 means unlimited.
    pub max_sessions: usize,
    /// Give every new session the solver's default settings.
    pub default_settings_on_new: bool,
}

/// Routes host commands to sessions and the solver.
///
/// Each call to [`dispatch`](Bridge::dispatch) runs exactly one command to
/// completion. Sessions persist between calls inside the registry; nothing
/// else does.
pub struct Bridge<S: QpSolver> {
    solver: S,
    sessions: SessionRegistry<Session<S::Workspace>>,
    options: BridgeOptions,
}

impl<S: QpSolver> Bridge<S> {
    pub fn new(solver: S) -> Self {
        Self::with_options(solver, BridgeOptions::default())
    }

    pub fn with_options(solver: S, options: BridgeOptions) -> Self {
        let sessions = match options.max_sessions {
            0 => SessionRegistry::new(),
            cap => SessionRegistry::with_capacity_limit(cap),
        };
        Self {
            solver,
            sessions,
            options,
        }
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Number of live sessions.
    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Runs one command. `values` excludes the command name.
    pub fn dispatch(&mut self, command: &str, values: &[HostValue]) -> BridgeResult<Vec<HostValue>> {
        let command =
            Command::parse(command).ok_or_else(|| BridgeError::UnknownCommand(command.to_string()))?;
        debug!(%command, args = values.len(), "dispatch");
        let args = Args::new(command.name(), values);

        match command {
            Command::New => self.new_session(),
            Command::Delete => self.delete(args),
            Command::Setup => self.setup(args),
            Command::Solve => self.solve(args),
            Command::SetDefaultSettings => self.set_default_settings(args),
            Command::GetSettings => self.get_settings(args),
            Command::SetSettings => self.set_settings(args),
            Command::Update => self.update(args),
        }
    }

    /// Releases every live session, returning how many there were.
    pub fn shutdown(&mut self) -> usize {
        let sessions = self.sessions.drain();
        let count = sessions.len();
        for session in sessions {
            session.release();
        }
        count
    }

    fn new_session(&mut self) -> BridgeResult<Vec<HostValue>> {
        let mut session = Session::new();
        if self.options.default_settings_on_new {
            session.install_settings(self.solver.default_settings());
        }
        let handle = self.sessions.create(session)?;
        debug!(%handle, live = self.sessions.len(), "session created");
        Ok(vec![HostValue::Int64(handle.raw())])
    }

    fn delete(&mut self, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
        let handle = args.handle()?;
        self.sessions.destroy(handle)?.release();
        debug!(%handle, live = self.sessions.len(), "session deleted");
        Ok(vec![])
    }

    fn setup(&mut self, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
        let handle = args.handle()?;
        let session = self.sessions.get_mut(handle)?;
        if session.has_problem() {
            return Err(BridgeError::SetupAlreadyCompleted);
        }

        let problem = ProblemArgs::read(&args)?;
        let bin_ids = args.int_array(7, "bin_ids")?;
        let (dims, bin_ids) = problem.infer_dims(bin_ids)?;

        let solver = &self.solver;
        let settings = *session.settings_or_init(|| solver.default_settings());
        let report = solver.setup(&problem.view(dims), &bin_ids, &settings);
        let code = report.code();
        match report.outcome {
            Ok(work) => {
                session.attach(ProblemRecord { dims }, work);
                debug!(%handle, %dims, "setup complete");
            }
            Err(flag) => {
                // Nothing was attached; the session stays eligible for setup.
                debug!(%handle, %dims, %flag, "setup failed");
            }
        }
        Ok(setup_outputs(code, report.setup_time))
    }

    fn solve(&mut self, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
        let handle = args.handle()?;
        let session = self.sessions.get_mut(handle)?;
        let (record, work, settings) = session.parts_mut(BridgeError::NoProblemToSolve)?;

        let problem = ProblemArgs::read(&args)?;
        problem.check_shapes(record.dims)?;
        let settings = settings
            .copied()
            .unwrap_or_else(|| self.solver.default_settings());

        let mut x = vec![0.0; record.dims.n];
        let mut lambda = vec![0.0; record.dims.m];
        let info = self.solver.solve(
            work,
            &problem.view(record.dims),
            &settings,
            &mut x,
            &mut lambda,
        )?;
        debug!(%handle, exitflag = %info.exitflag, "solved");
        Ok(solve_outputs(x, lambda, &info))
    }

    fn update(&mut self, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
        let handle = args.handle()?;
        let session = self.sessions.get_mut(handle)?;
        let (record, work, _) = session.parts_mut(BridgeError::NoProblemToUpdate)?;

        let problem = ProblemArgs::read(&args)?;
        let mask = UpdateMask::from_bits(coerce_integer(args.scalar(7, "mask")?));
        problem.check_shapes(record.dims)?;

        self.solver.update(work, &problem.view(record.dims), mask)?;
        debug!(%handle, %mask, "updated");
        Ok(vec![])
    }

    fn set_default_settings(&mut self, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
        let handle = args.handle()?;
        let defaults = self.solver.default_settings();
        self.sessions.get_mut(handle)?.install_settings(defaults);
        Ok(vec![])
    }

    fn get_settings(&mut self, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
        let handle = args.handle()?;
        let settings = self.sessions.get(handle)?.require_settings()?;
        Ok(vec![HostValue::Record(settings_to_record(settings))])
    }

    fn set_settings(&mut self, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
        let handle = args.handle()?;
        let current = self.sessions.get_mut(handle)?.require_settings_mut()?;
        let record = args.record(1, "settings")?;

        let updated = settings_from_record(record, current)?;
        let ignored = unknown_settings_fields(record);
        if !ignored.is_empty() {
            debug!(%handle, ?ignored, "ignoring unknown settings fields");
        }
        *current = updated;
        Ok(vec![])
    }
}
