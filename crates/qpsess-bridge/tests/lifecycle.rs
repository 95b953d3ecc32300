//! Session lifecycle tests against a counting mock solver.
//!
//! The mock tracks how many workspaces are alive so that every path through
//! the dispatcher can be checked for leaks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use qpsess_bridge::{Bridge, BridgeError, BridgeOptions};
use qpsess_common::{
    ExitFlag, HostValue, IntMatrix, Matrix, ProblemView, QpSolver, Record, SetupReport, Settings,
    SolveInfo, SolverResult, UpdateMask,
};

#[derive(Clone, Default)]
struct CountingSolver {
    live: Arc<AtomicUsize>,
    masks: Arc<Mutex<Vec<UpdateMask>>>,
}

struct Tracked {
    live: Arc<AtomicUsize>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CountingSolver {
    fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl QpSolver for CountingSolver {
    type Workspace = Tracked;

    fn name(&self) -> &'static str {
        "counting"
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
        _bin_ids: &[usize],
        _settings: &Settings,
    ) -> SetupReport<Tracked> {
        // A negative leading diagonal stands in for a non-convex cost.
        let outcome = match problem.h {
            Some(h) if h[0] < 0.0 => Err(ExitFlag::NonConvex),
            _ => {
                self.live.fetch_add(1, Ordering::SeqCst);
                Ok(Tracked {
                    live: Arc::clone(&self.live),
                })
            }
        };
        SetupReport {
            setup_time: 0.001,
            outcome,
        }
    }

    fn solve(
        &self,
        _work: &mut Tracked,
        problem: &ProblemView<'_>,
        settings: &Settings,
        x: &mut [f64],
        lambda: &mut [f64],
    ) -> SolverResult<SolveInfo> {
        x.fill(0.5);
        lambda.fill(0.0);
        Ok(SolveInfo {
            exitflag: ExitFlag::Optimal,
            fval: problem.objective(x),
            iterations: settings.iter_limit as usize,
            setup_time: 0.001,
            solve_time: 0.002,
            nodes: None,
            soft_slack: 0.0,
        })
    }

    fn update(
        &self,
        _work: &mut Tracked,
        _problem: &ProblemView<'_>,
        mask: UpdateMask,
    ) -> SolverResult<()> {
        self.masks.lock().unwrap().push(mask);
        Ok(())
    }
}

/// `[H, f, A, bupper, blower, sense]` for `n` variables, `m` constraints, `ms` simple.
fn problem(n: usize, m: usize, ms: usize) -> Vec<HostValue> {
    vec![
        HostValue::Matrix(Matrix::identity(n)),
        HostValue::Empty,
        HostValue::Matrix(Matrix::zeros(n, m - ms)),
        HostValue::column(vec![1.0; m]),
        HostValue::column(vec![-1.0; m]),
        HostValue::int_column(vec![0; m]),
    ]
}

fn with_handle(handle: &HostValue, rest: Vec<HostValue>) -> Vec<HostValue> {
    let mut args = vec![handle.clone()];
    args.extend(rest);
    args
}

fn setup_args(handle: &HostValue, n: usize, m: usize, ms: usize, bin_ids: Vec<i32>) -> Vec<HostValue> {
    let mut args = with_handle(handle, problem(n, m, ms));
    args.push(HostValue::int_column(bin_ids));
    args
}

fn new_session<S: QpSolver>(bridge: &mut Bridge<S>) -> HostValue {
    let mut out = bridge.dispatch("new", &[]).unwrap();
    assert_eq!(out.len(), 1);
    out.remove(0)
}

fn code(out: &[HostValue]) -> f64 {
    out[0].as_scalar().unwrap()
}

#[test]
fn test_setup_then_delete_releases_everything() {
    let dims = [(0, 0, 0, 0), (1, 1, 1, 0), (2, 2, 0, 2), (2, 2, 2, 1), (3, 5, 2, 3)];
    for (n, m, ms, nb) in dims {
        let solver = CountingSolver::default();
        let mut bridge = Bridge::new(solver.clone());
        let handle = new_session(&mut bridge);

        let bin_ids = (0..nb as i32).collect();
        let out = bridge
            .dispatch("setup", &setup_args(&handle, n, m, ms, bin_ids))
            .unwrap();
        assert_eq!(code(&out), 0.0, "n={n} m={m} ms={ms}");
        assert_eq!(solver.live(), 1);

        bridge.dispatch("delete", &[handle]).unwrap();
        assert_eq!(solver.live(), 0);
        assert_eq!(bridge.live_sessions(), 0);
    }
}

#[test]
fn test_second_setup_fails_and_keeps_first_problem() {
    let solver = CountingSolver::default();
    let mut bridge = Bridge::new(solver.clone());
    let handle = new_session(&mut bridge);
    bridge
        .dispatch("setup", &setup_args(&handle, 2, 2, 2, vec![]))
        .unwrap();

    let err = bridge
        .dispatch("setup", &setup_args(&handle, 3, 1, 0, vec![]))
        .unwrap_err();
    assert!(matches!(err, BridgeError::SetupAlreadyCompleted));
    assert_eq!(solver.live(), 1);

    let out = bridge
        .dispatch("solve", &with_handle(&handle, problem(2, 2, 2)))
        .unwrap();
    assert_eq!(out[0].as_matrix().unwrap().rows, 2);
}

#[test]
fn test_solve_and_update_need_a_problem() {
    let mut bridge = Bridge::new(CountingSolver::default());
    let handle = new_session(&mut bridge);

    let inputs = [
        vec![handle.clone()],
        with_handle(&handle, problem(2, 2, 0)),
        with_handle(&handle, vec![HostValue::Text("junk".into())]),
    ];
    for args in &inputs {
        assert!(matches!(
            bridge.dispatch("solve", args),
            Err(BridgeError::NoProblemToSolve)
        ));
        assert!(matches!(
            bridge.dispatch("update", args),
            Err(BridgeError::NoProblemToUpdate)
        ));
    }
}

#[test]
fn test_failed_setup_rolls_back() {
    let solver = CountingSolver::default();
    let mut bridge = Bridge::new(solver.clone());
    let handle = new_session(&mut bridge);

    let mut args = setup_args(&handle, 2, 2, 2, vec![]);
    args[1] = HostValue::Matrix(Matrix::new(2, 2, vec![-1.0, 0.0, 0.0, 1.0]));
    let out = bridge.dispatch("setup", &args).unwrap();
    assert_eq!(code(&out), -5.0);
    assert_eq!(out[1].as_scalar(), Some(0.001));
    assert_eq!(solver.live(), 0);
    assert!(matches!(
        bridge.dispatch("solve", &with_handle(&handle, problem(2, 2, 2))),
        Err(BridgeError::NoProblemToSolve)
    ));

    // Still eligible for a fresh setup.
    let out = bridge
        .dispatch("setup", &setup_args(&handle, 2, 2, 2, vec![]))
        .unwrap();
    assert_eq!(code(&out), 0.0);
    assert_eq!(solver.live(), 1);
}

#[test]
fn test_invalid_setup_arguments_leave_session_empty() {
    let solver = CountingSolver::default();
    let mut bridge = Bridge::new(solver.clone());
    let handle = new_session(&mut bridge);

    let mut args = setup_args(&handle, 2, 2, 0, vec![5]);
    let err = bridge.dispatch("setup", &args).unwrap_err();
    assert_eq!(err.kind(), "dimension_mismatch");

    args[7] = HostValue::int_column(vec![]);
    args[5] = HostValue::column(vec![-1.0; 3]);
    let err = bridge.dispatch("setup", &args).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::DimensionMismatch {
            argument: "blower",
            ..
        }
    ));
    assert_eq!(solver.live(), 0);
}

#[test]
fn test_settings_before_initialization() {
    let mut bridge = Bridge::new(CountingSolver::default());
    let handle = new_session(&mut bridge);

    assert!(matches!(
        bridge.dispatch("get_settings", &[handle.clone()]),
        Err(BridgeError::SettingsNotInitialized)
    ));
    let record = HostValue::Record(Record::new());
    assert!(matches!(
        bridge.dispatch("set_settings", &[handle, record]),
        Err(BridgeError::SettingsNotInitialized)
    ));
}

#[test]
fn test_default_settings_round_trip() {
    let solver = CountingSolver::default();
    let mut bridge = Bridge::new(solver.clone());
    let handle = new_session(&mut bridge);

    bridge
        .dispatch("set_default_settings", &[handle.clone()])
        .unwrap();
    let out = bridge.dispatch("get_settings", &[handle]).unwrap();
    let record = out[0].as_record().unwrap();

    assert_eq!(record.len(), 11);
    assert_eq!(record["primal_tol"].as_scalar(), Some(1e-6));
    assert_eq!(record["dual_tol"].as_scalar(), Some(1e-12));
    assert_eq!(record["cycle_tol"].as_scalar(), Some(10.0));
    assert_eq!(record["iter_limit"].as_scalar(), Some(1000.0));
    assert_eq!(record["fval_bound"].as_scalar(), Some(1e30));
    assert_eq!(record["rho_soft"].as_scalar(), Some(1e-3));
}

#[test]
fn test_set_settings_round_trip_truncates_integers() {
    let mut bridge = Bridge::new(CountingSolver::default());
    let handle = new_session(&mut bridge);
    bridge
        .dispatch("set_default_settings", &[handle.clone()])
        .unwrap();

    let mut record = bridge.dispatch("get_settings", &[handle.clone()]).unwrap()[0]
        .as_record()
        .unwrap()
        .clone();
    record.insert("primal_tol".into(), HostValue::scalar(1e-4));
    record.insert("iter_limit".into(), HostValue::scalar(250.9));
    record.insert("cycle_tol".into(), HostValue::IntMatrix(IntMatrix::scalar(3)));
    bridge
        .dispatch("set_settings", &[handle.clone(), HostValue::Record(record)])
        .unwrap();

    let out = bridge.dispatch("get_settings", &[handle]).unwrap();
    let record = out[0].as_record().unwrap();
    assert_eq!(record["primal_tol"].as_scalar(), Some(1e-4));
    assert_eq!(record["iter_limit"].as_scalar(), Some(250.0));
    assert_eq!(record["cycle_tol"].as_scalar(), Some(3.0));
}

#[test]
fn test_partial_settings_record_writes_nothing() {
    let mut bridge = Bridge::new(CountingSolver::default());
    let handle = new_session(&mut bridge);
    bridge
        .dispatch("set_default_settings", &[handle.clone()])
        .unwrap();

    let mut record = Record::new();
    record.insert("primal_tol".into(), HostValue::scalar(0.5));
    let err = bridge
        .dispatch("set_settings", &[handle.clone(), HostValue::Record(record)])
        .unwrap_err();
    assert!(matches!(err, BridgeError::MissingSettingsField(_)));

    let out = bridge.dispatch("get_settings", &[handle]).unwrap();
    assert_eq!(out[0].as_record().unwrap()["primal_tol"].as_scalar(), Some(1e-6));
}

#[test]
fn test_setup_initializes_settings() {
    let mut bridge = Bridge::new(CountingSolver::default());
    let handle = new_session(&mut bridge);
    bridge
        .dispatch("setup", &setup_args(&handle, 1, 1, 1, vec![]))
        .unwrap();

    let out = bridge.dispatch("get_settings", &[handle]).unwrap();
    assert_eq!(out[0].as_record().unwrap()["iter_limit"].as_scalar(), Some(1000.0));
}

#[test]
fn test_solve_output_layout() {
    let mut bridge = Bridge::new(CountingSolver::default());
    let handle = new_session(&mut bridge);
    bridge
        .dispatch("setup", &setup_args(&handle, 2, 3, 1, vec![]))
        .unwrap();

    let out = bridge
        .dispatch("solve", &with_handle(&handle, problem(2, 3, 1)))
        .unwrap();
    assert_eq!(out.len(), 4);
    assert_eq!(out[0], HostValue::column(vec![0.5, 0.5]));
    // ½ xᵀ I x at x = (0.5, 0.5)
    assert_eq!(out[1].as_scalar(), Some(0.25));
    assert_eq!(out[2], HostValue::IntMatrix(IntMatrix::scalar(1)));

    let info = out[3].as_record().unwrap();
    assert_eq!(info["lambda"].as_matrix().unwrap().rows, 3);
    assert_eq!(info["nodes"].as_scalar(), Some(1.0));
    assert_eq!(info["iter"].as_scalar(), Some(1000.0));
    for key in ["solve_time", "setup_time", "soft_slack"] {
        assert!(info.contains_key(key), "missing {key}");
    }
}

#[test]
fn test_rebind_shapes_are_checked() {
    let mut bridge = Bridge::new(CountingSolver::default());
    let handle = new_session(&mut bridge);
    bridge
        .dispatch("setup", &setup_args(&handle, 2, 2, 0, vec![]))
        .unwrap();

    let mut args = with_handle(&handle, problem(2, 2, 0));
    args[4] = HostValue::column(vec![1.0; 3]);
    assert!(matches!(
        bridge.dispatch("solve", &args),
        Err(BridgeError::DimensionMismatch {
            argument: "bupper",
            ..
        })
    ));

    let mut args = with_handle(&handle, problem(2, 2, 0));
    args[1] = HostValue::Empty;
    assert!(bridge.dispatch("solve", &args).is_ok());
}

#[test]
fn test_update_forwards_mask_bits() {
    let solver = CountingSolver::default();
    let mut bridge = Bridge::new(solver.clone());
    let handle = new_session(&mut bridge);
    bridge
        .dispatch("setup", &setup_args(&handle, 2, 2, 2, vec![]))
        .unwrap();

    for mask in [8.0, 31.0] {
        let mut args = with_handle(&handle, problem(2, 2, 2));
        args.push(HostValue::scalar(mask));
        assert!(bridge.dispatch("update", &args).unwrap().is_empty());
    }
    let masks = solver.masks.lock().unwrap().clone();
    assert_eq!(masks, vec![UpdateMask::BOUNDS, UpdateMask::from_bits(31)]);
}

#[test]
fn test_handles_are_checked() {
    let solver = CountingSolver::default();
    let mut bridge = Bridge::new(solver.clone());
    let handle = new_session(&mut bridge);
    bridge.dispatch("delete", &[handle.clone()]).unwrap();

    assert!(matches!(
        bridge.dispatch("delete", &[handle.clone()]),
        Err(BridgeError::StaleHandle(_))
    ));
    assert!(matches!(
        bridge.dispatch("get_settings", &[handle]),
        Err(BridgeError::StaleHandle(_))
    ));
    assert!(matches!(
        bridge.dispatch("delete", &[HostValue::Int64(12345)]),
        Err(BridgeError::InvalidHandle(_))
    ));
    assert!(matches!(
        bridge.dispatch("delete", &[HostValue::scalar(1.0)]),
        Err(BridgeError::TypeMismatch { name: "handle", .. })
    ));
    assert!(matches!(
        bridge.dispatch("delete", &[]),
        Err(BridgeError::MissingArgument { position: 0, .. })
    ));
}

#[test]
fn test_unknown_command() {
    let mut bridge = Bridge::new(CountingSolver::default());
    let err = bridge.dispatch("reset", &[]).unwrap_err();
    assert_eq!(err.kind(), "unknown_command");
    assert_eq!(err.to_string(), "unknown command: reset");
}

#[test]
fn test_session_limit_and_default_settings_option() {
    let options = BridgeOptions {
        max_sessions: 1,
        default_settings_on_new: true,
    };
    let mut bridge = Bridge::with_options(CountingSolver::default(), options);
    let handle = new_session(&mut bridge);
    assert!(bridge.dispatch("get_settings", &[handle.clone()]).is_ok());

    assert!(matches!(
        bridge.dispatch("new", &[]),
        Err(BridgeError::RegistryFull(1))
    ));
    bridge.dispatch("delete", &[handle]).unwrap();
    assert!(bridge.dispatch("new", &[]).is_ok());
}

#[test]
fn test_shutdown_releases_live_sessions() {
    let solver = CountingSolver::default();
    let mut bridge = Bridge::new(solver.clone());
    for _ in 0..3 {
        let handle = new_session(&mut bridge);
        bridge
            .dispatch("setup", &setup_args(&handle, 1, 1, 1, vec![]))
            .unwrap();
    }
    new_session(&mut bridge);
    assert_eq!(solver.live(), 3);

    assert_eq!(bridge.shutdown(), 4);
    assert_eq!(solver.live(), 0);
    assert_eq!(bridge.live_sessions(), 0);
}
