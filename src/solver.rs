//! Turns a parsed [`Problem`] into a [`Solution`] with explanation steps.
//!
//! Solving never fails. Every problem along the way (nothing to solve, a
//! backend error, an equation with symbols nobody can resolve) becomes a step
//! in the returned [`Solution`], and whatever was resolved before is kept.
//!
//! # Examples
//!
//! ```
//! use wordprob::{parse_problem, solve_problem};
//!
//! let solution = solve_problem(&parse_problem("Solve for x: 2x + 5 = 13"));
//! assert_eq!(solution.solution.get("x"), Some(&4.0));
//! assert_eq!(solution.steps, vec!["Equation 1: 2*x + 5 = 13", "x = 4"]);
//! ```
//!
//! Physics problems also carry an analysis:
//!
//! ```
//! use wordprob::{parse_problem, solve_problem};
//! use wordprob::physics::ProblemType;
//!
//! let text = "A car travels 100 meters in 10 seconds. What is its velocity?";
//! let solution = solve_problem(&parse_problem(text));
//! let analysis = solution.physics_analysis.expect("physics problem");
//! assert_eq!(analysis.problem_type, ProblemType::Kinematics);
//! ```

use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};
use serde::Serialize;

use crate::expr::Equation;
use crate::interner::VarId;
use crate::physics::{self, PhysicsAnalysis, ProblemType};
use crate::problem::{Problem, ProblemKind};
use crate::system::{NumericSolver, Roots, SolveError, SystemSolver};

/// Result of one solve call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Solution {
    /// identifier -> value, for every unknown that was resolved
    pub solution: BTreeMap<String, f64>,
    /// Human-readable trace. Never empty.
    pub steps: Vec<String>,
    /// Present only for physics problems.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physics_analysis: Option<PhysicsAnalysis>,
}

/// Solves `problem` with the default [`NumericSolver`].
#[must_use]
pub fn solve_problem(problem: &Problem) -> Solution {
    solve_problem_with(problem, &NumericSolver::default())
}

/// Solves `problem` with the given backend.
#[must_use]
pub fn solve_problem_with(problem: &Problem, backend: &impl SystemSolver) -> Solution {
    let mut result =
        Solution { solution: BTreeMap::new(), steps: Vec::new(), physics_analysis: None };

    solve_equations(problem, backend, &mut result);

    if problem.kind() == ProblemKind::Physics {
        let analysis = physics::analyze(problem.text());
        if analysis.problem_type == ProblemType::Unclassified {
            warn!("problem is marked physics but no keyword group matches its text");
        }
        result.physics_analysis = Some(analysis);
    }

    result
}

fn solve_equations(problem: &Problem, backend: &impl SystemSolver, result: &mut Solution) {
    if problem.equations().is_empty() {
        result.steps.push("No equations found".to_string());
        return;
    }
    if problem.unknowns().is_empty() {
        result.steps.push("No unknown variables found".to_string());
        return;
    }

    let known: HashMap<VarId, f64> = problem.known_values().iter().copied().collect();
    let unknowns = problem.unknowns();

    // (1-based number, substituted equation)
    let mut system: Vec<(usize, Equation)> = Vec::new();
    for (i, eq) in problem.equations().iter().enumerate() {
        let number = i + 1;
        let substituted = eq.substitute(&known);
        result
            .steps
            .push(format!("Equation {number}: {}", substituted.display(problem.symbols())));

        let unresolved: Vec<&str> = substituted
            .vars_in_order()
            .into_iter()
            .filter(|id| !unknowns.contains(id))
            .map(|id| problem.name(id))
            .collect();
        if !unresolved.is_empty() {
            let names = unresolved.join(", ");
            result.steps.push(format!("Equation {number} skipped: unresolved symbol(s) {names}"));
            continue;
        }
        system.push((number, substituted));
    }

    let numbers: Vec<usize> = system.iter().map(|(n, _)| *n).collect();
    let equations: Vec<Equation> = system.into_iter().map(|(_, eq)| eq).collect();

    match backend.solve(&equations, unknowns) {
        Ok(Roots::Positional(values)) => {
            // zip stops at the shorter side: a short result leaves the tail unresolved
            for (id, value) in unknowns.iter().zip(values) {
                record(problem, result, *id, value);
            }
        }
        Ok(Roots::Mapping(pairs)) => {
            for (id, value) in pairs {
                record(problem, result, id, value);
            }
        }
        Err(e) => {
            let e = renumber(e, &numbers);
            debug!("backend failed: {}", e.display_detailed());
            result.steps.push(format!("Error solving equations: {e}"));
        }
    }
}

fn record(problem: &Problem, result: &mut Solution, id: VarId, value: f64) {
    let name = problem.name(id);
    result.steps.push(format!("{name} = {value}"));
    result.solution.insert(name.to_string(), value);
}

/// Maps a backend equation index back to the problem's equation numbering.
fn renumber(e: SolveError, numbers: &[usize]) -> SolveError {
    match e {
        SolveError::Inconsistent { index, residual } => SolveError::Inconsistent {
            index: index.checked_sub(1).and_then(|i| numbers.get(i)).copied().unwrap_or(index),
            residual,
        },
        other => other,
    }
}
