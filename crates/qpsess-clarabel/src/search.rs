//! Depth-first branch-and-bound over binary constraints.
//!
//! Each node is a continuous relaxation with some binary constraints pinned to
//! one of their bounds. A node is pruned when its relaxation is infeasible or
//! cannot beat the incumbent; a node whose binary constraints all sit at a
//! bound becomes the new incumbent. Without binary constraints the search is a
//! single relaxation.

use qpsess_common::{is_infinite, sense, ExitFlag, Settings, SolverResult};
use tracing::debug;

use crate::relaxation::{solve_relaxation, Fixing, Relaxation, Side};
use crate::workspace::ClarabelWorkspace;
use crate::EngineOptions;

/// Best point found by the search.
#[derive(Debug, Clone)]
pub(crate) struct SearchOutcome {
    pub flag: ExitFlag,
    pub x: Vec<f64>,
    pub lambda: Vec<f64>,
    pub soft_slack: f64,
    /// Engine iterations summed over all nodes.
    pub iterations: usize,
    pub nodes: Option<usize>,
}

impl SearchOutcome {
    fn from_relaxation(relaxation: Relaxation, iterations: usize, nodes: Option<usize>, tol: f64) -> Self {
        let flag = match relaxation.flag {
            ExitFlag::Optimal if relaxation.soft_slack > tol => ExitFlag::SoftOptimal,
            flag => flag,
        };
        Self {
            flag,
            x: relaxation.x,
            lambda: relaxation.lambda,
            soft_slack: relaxation.soft_slack,
            iterations,
            nodes,
        }
    }

    fn infeasible(work: &ClarabelWorkspace, iterations: usize, nodes: usize) -> Self {
        Self {
            flag: ExitFlag::Infeasible,
            x: vec![0.0; work.dims.n],
            lambda: vec![0.0; work.dims.m],
            soft_slack: 0.0,
            iterations,
            nodes: Some(nodes),
        }
    }
}

/// Runs the search on the current workspace data.
pub(crate) fn search(
    work: &ClarabelWorkspace,
    settings: &Settings,
    options: &EngineOptions,
) -> SolverResult<SearchOutcome> {
    let tol = settings.primal_tol;
    let binaries = binary_constraints(work);
    if binaries.is_empty() {
        let relaxation = solve_relaxation(work, &[], settings, options)?;
        let iterations = relaxation.iterations;
        return Ok(SearchOutcome::from_relaxation(relaxation, iterations, None, tol));
    }

    let mut stack: Vec<Vec<Fixing>> = vec![Vec::new()];
    let mut incumbent: Option<Relaxation> = None;
    let mut bound = settings.fval_bound;
    let mut iterations = 0;
    let mut nodes = 0;

    while let Some(fixings) = stack.pop() {
        nodes += 1;
        let relaxation = solve_relaxation(work, &fixings, settings, options)?;
        iterations += relaxation.iterations;

        match relaxation.flag {
            ExitFlag::Optimal => {}
            ExitFlag::Infeasible => {
                debug!(node = nodes, depth = fixings.len(), "pruned: infeasible");
                continue;
            }
            // Fixing bounds cannot make a bounded problem unbounded or cure a
            // numerical failure, so a failing root ends the search.
            flag if fixings.is_empty() => {
                debug!(%flag, "root relaxation failed");
                return Ok(SearchOutcome::from_relaxation(relaxation, iterations, Some(nodes), tol));
            }
            flag => {
                debug!(node = nodes, %flag, "pruned: relaxation failed");
                continue;
            }
        }

        if relaxation.objective >= bound - tol * (1.0 + bound.abs()) {
            debug!(node = nodes, objective = relaxation.objective, bound, "pruned: bound");
            continue;
        }

        match branch_candidate(work, &binaries, &fixings, &relaxation.x, tol) {
            None => {
                debug!(node = nodes, objective = relaxation.objective, "new incumbent");
                bound = relaxation.objective;
                incumbent = Some(relaxation);
            }
            Some((constraint, closer)) => {
                let farther = match closer {
                    Side::Lower => Side::Upper,
                    Side::Upper => Side::Lower,
                };
                // Pushed last, explored first.
                for side in [farther, closer] {
                    let b = match side {
                        Side::Lower => work.blower[constraint],
                        Side::Upper => work.bupper[constraint],
                    };
                    if is_infinite(b) {
                        continue;
                    }
                    let mut child = fixings.clone();
                    child.push(Fixing { constraint, side });
                    stack.push(child);
                }
            }
        }
    }

    debug!(nodes, iterations, found = incumbent.is_some(), "search finished");
    Ok(match incumbent {
        Some(best) => SearchOutcome::from_relaxation(best, iterations, Some(nodes), tol),
        None => SearchOutcome::infeasible(work, iterations, nodes),
    })
}

/// Binary constraints still in play.
fn binary_constraints(work: &ClarabelWorkspace) -> Vec<usize> {
    (0..work.dims.m)
        .filter(|&i| {
            let code = work.sense[i];
            sense::is_binary(code) && !sense::is_removed(code) && !sense::is_equality(code)
        })
        .collect()
}

/// First unpinned binary constraint away from both bounds, with its closer side.
fn branch_candidate(
    work: &ClarabelWorkspace,
    binaries: &[usize],
    fixings: &[Fixing],
    x: &[f64],
    tol: f64,
) -> Option<(usize, Side)> {
    binaries
        .iter()
        .copied()
        .filter(|&i| fixings.iter().all(|f| f.constraint != i))
        .find_map(|i| {
            let value = work.constraint_value(i, x);
            let to_upper = bound_distance(work.bupper[i], value);
            let to_lower = bound_distance(work.blower[i], value);
            if to_upper.min(to_lower) <= tol * (1.0 + value.abs()) {
                return None;
            }
            if to_upper.is_infinite() && to_lower.is_infinite() {
                return None;
            }
            Some((i, if to_lower <= to_upper { Side::Lower } else { Side::Upper }))
        })
}

fn bound_distance(bound: f64, value: f64) -> f64 {
    if is_infinite(bound) {
        f64::INFINITY
    } else {
        (bound - value).abs()
    }
}
