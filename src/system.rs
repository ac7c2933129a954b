//! Numeric backend: solves a set of equations for an ordered list of unknowns.
//!
//! # Error Handling
//!
//! The backend reports failures with [`SolveError`]:
//!
//! - S001: `Inconsistent` (An equation can never hold)
//! - S002: `Singular` (No unknown could be pinned down)
//! - S003: `NoConvergence` (Iterative solve did not converge)
//! - S004: `NonFinite` (NaN or infinity during solving)
//!
//! The pipeline never lets these escape: `solve_problem` turns them into an
//! `"Error solving equations: ..."` step.
//!
//! # Strategy
//!
//! Residuals `lhs - rhs` are folded first. Constant residuals are checked and
//! dropped. If every remaining residual is affine in the unknowns the system is
//! solved exactly by Gauss-Jordan elimination; otherwise a damped Gauss-Newton
//! (Levenberg-Marquardt) iteration runs over symbolic Jacobians.

use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::errors::format_error_with_code_and_help;
use crate::expr::{Equation, Expr};
use crate::interner::VarId;

/// Default iteration cap for the nonlinear solve.
pub const DEFAULT_MAX_ITERATIONS: usize = 200;

/// Default residual tolerance.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

// Pivots smaller than this are treated as zero.
const PIVOT_EPSILON: f64 = 1e-12;

// Initial damping factor and the point at which we give up raising it.
const INITIAL_DAMPING: f64 = 1e-3;
const MAX_DAMPING: f64 = 1e12;

/// Knobs for [`NumericSolver`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveOptions {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        SolveOptions { max_iterations: DEFAULT_MAX_ITERATIONS, tolerance: DEFAULT_TOLERANCE }
    }
}

/// Shape of a backend result.
#[derive(Debug, Clone, PartialEq)]
pub enum Roots {
    /// One value per unknown, aligned with the unknown list passed in.
    /// May be shorter than that list; consumers must not index past its end.
    Positional(Vec<f64>),
    /// Values for the unknowns that could be determined.
    Mapping(Vec<(VarId, f64)>),
}

/// Errors raised by a [`SystemSolver`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolveError {
    /// `index` is the 1-based position of the equation in the input.
    #[error("equation {index} is inconsistent (residual {residual})")]
    Inconsistent { index: usize, residual: f64 },

    #[error("system is singular ({free} unknown(s) left undetermined)")]
    Singular { free: usize },

    #[error("no convergence after {iterations} iterations (residual norm {residual:e})")]
    NoConvergence { iterations: usize, residual: f64 },

    #[error("non-finite value encountered")]
    NonFinite,
}

impl SolveError {
    /// Returns the error code for this error variant
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            SolveError::Inconsistent { .. } => "S001",
            SolveError::Singular { .. } => "S002",
            SolveError::NoConvergence { .. } => "S003",
            SolveError::NonFinite => "S004",
        }
    }

    /// Returns a short description of this error type (for documentation)
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            SolveError::Inconsistent { .. } => "An equation can never hold",
            SolveError::Singular { .. } => "No unknown could be pinned down",
            SolveError::NoConvergence { .. } => "Iterative solve did not converge",
            SolveError::NonFinite => "NaN or infinity during solving",
        }
    }

    /// Returns detailed explanation of this error type (for documentation)
    #[must_use]
    pub fn details(&self) -> &'static str {
        match self {
            SolveError::Inconsistent { .. } => "After substituting known values (or eliminating other equations) an equation reduced to a false constant statement such as `0 = 3`.",
            SolveError::Singular { .. } => "There are fewer independent equations than unknowns, so no unknown has a unique value. For nonlinear systems this is reported whenever there are fewer equations than unknowns.",
            SolveError::NoConvergence { .. } => "The nonlinear system was attacked with a damped Gauss-Newton iteration starting at 1.0 for every unknown, and the residual did not reach the tolerance within the iteration budget.",
            SolveError::NonFinite => "Evaluating a residual or a Jacobian entry produced NaN or infinity, typically from a division by zero or a negative base under a fractional power.",
        }
    }

    /// Returns a helpful suggestion for this error
    #[must_use]
    pub fn help(&self) -> Option<&'static str> {
        match self {
            SolveError::Inconsistent { .. } => Some("Check the known values: '3 y' binds y to 3 wherever it appears"),
            SolveError::Singular { .. } => Some("Add one equation or known value per remaining unknown"),
            SolveError::NoConvergence { .. } => Some("Try raising --max-iterations or loosening --tolerance"),
            SolveError::NonFinite => None,
        }
    }

    /// Formats the error with code and optional help text
    #[must_use]
    pub fn display_detailed(&self) -> String {
        format_error_with_code_and_help(&self.to_string(), self.code(), self.help())
    }
}

/// A numeric backend.
pub trait SystemSolver {
    /// Solves `equations` for `unknowns`.
    ///
    /// Every symbol in `equations` is expected to be one of `unknowns`.
    fn solve(&self, equations: &[Equation], unknowns: &[VarId]) -> Result<Roots, SolveError>;
}

/// Default backend: exact elimination for linear systems, Levenberg-Marquardt otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericSolver {
    pub options: SolveOptions,
}

impl NumericSolver {
    #[must_use]
    pub fn new(options: SolveOptions) -> Self {
        NumericSolver { options }
    }
}

impl SystemSolver for NumericSolver {
    fn solve(&self, equations: &[Equation], unknowns: &[VarId]) -> Result<Roots, SolveError> {
        let tolerance = self.options.tolerance;

        // (1-based equation number, folded residual)
        let mut residuals: Vec<(usize, Expr)> = Vec::new();
        for (i, eq) in equations.iter().enumerate() {
            let residual = eq.residual().fold();
            let mut vars = BTreeSet::new();
            residual.collect_vars(&mut vars);
            if vars.is_empty() {
                let value = residual.eval(&HashMap::new()).unwrap_or(f64::NAN);
                if !value.is_finite() {
                    return Err(SolveError::NonFinite);
                }
                if value.abs() > tolerance {
                    return Err(SolveError::Inconsistent { index: i + 1, residual: value });
                }
                debug!("equation {} holds trivially, dropped", i + 1);
                continue;
            }
            residuals.push((i + 1, residual));
        }

        let mut referenced = BTreeSet::new();
        for (_, r) in &residuals {
            r.collect_vars(&mut referenced);
        }
        let active: Vec<VarId> =
            unknowns.iter().copied().filter(|id| referenced.contains(id)).collect();
        if active.is_empty() {
            return Ok(Roots::Mapping(Vec::new()));
        }

        let affine: Option<Vec<_>> = residuals.iter().map(|(_, r)| r.affine()).collect();
        let roots = match affine {
            Some(forms) => {
                debug!("solving {} linear equation(s) in {} unknown(s)", forms.len(), active.len());
                let rows: Vec<(Vec<f64>, f64)> = forms
                    .iter()
                    .map(|form| {
                        let coeffs: Vec<f64> = active
                            .iter()
                            .map(|id| form.coeffs.get(id).copied().unwrap_or(0.0))
                            .collect();
                        (coeffs, -form.constant)
                    })
                    .collect();
                let origins: Vec<usize> = residuals.iter().map(|(index, _)| *index).collect();
                let values = gauss_jordan(rows, origins, tolerance)?;
                let determined: Vec<(VarId, f64)> =
                    active.iter().zip(&values).filter_map(|(id, v)| v.map(|v| (*id, v))).collect();
                if determined.is_empty() {
                    return Err(SolveError::Singular { free: active.len() });
                }
                if determined.len() == unknowns.len() {
                    // every unknown is active and determined, in order
                    Roots::Positional(determined.into_iter().map(|(_, v)| v).collect())
                } else {
                    Roots::Mapping(determined)
                }
            }
            None => {
                debug!(
                    "solving {} nonlinear equation(s) in {} unknown(s)",
                    residuals.len(),
                    active.len()
                );
                if residuals.len() < active.len() {
                    return Err(SolveError::Singular { free: active.len() - residuals.len() });
                }
                let exprs: Vec<Expr> = residuals.into_iter().map(|(_, r)| r).collect();
                let values = levenberg_marquardt(&exprs, &active, self.options)?;
                Roots::Mapping(active.into_iter().zip(values).collect())
            }
        };
        Ok(roots)
    }
}

/// Reduces `rows` (coefficients, right-hand side) to reduced row echelon form.
///
/// Returns one entry per column: `Some(value)` if the column's unknown is
/// fully determined, `None` if it depends on a free column.
fn gauss_jordan(
    mut rows: Vec<(Vec<f64>, f64)>,
    mut origins: Vec<usize>,
    tolerance: f64,
) -> Result<Vec<Option<f64>>, SolveError> {
    let n = rows.first().map_or(0, |(coeffs, _)| coeffs.len());
    let m = rows.len();
    let mut pivots: Vec<(usize, usize)> = Vec::new(); // (row, col)
    let mut row = 0;

    for col in 0..n {
        if row == m {
            break;
        }
        // first row with the largest magnitude, so ties keep input order
        let best = (row..m).fold(row, |best, r| {
            if rows[r].0[col].abs() > rows[best].0[col].abs() { r } else { best }
        });
        if rows[best].0[col].abs() <= PIVOT_EPSILON {
            continue;
        }
        rows.swap(row, best);
        origins.swap(row, best);

        let pivot = rows[row].0[col];
        for c in &mut rows[row].0 {
            *c /= pivot;
        }
        rows[row].1 /= pivot;

        let (pivot_coeffs, pivot_rhs) = rows[row].clone();
        for (r, (coeffs, rhs)) in rows.iter_mut().enumerate() {
            if r == row {
                continue;
            }
            let factor = coeffs[col];
            if factor == 0.0 {
                continue;
            }
            for (c, p) in coeffs.iter_mut().zip(&pivot_coeffs) {
                *c -= factor * p;
            }
            *rhs -= factor * pivot_rhs;
        }

        pivots.push((row, col));
        row += 1;
    }

    // leftover rows are all-zero on the left
    for r in row..m {
        let rhs = rows[r].1;
        if !rhs.is_finite() {
            return Err(SolveError::NonFinite);
        }
        if rhs.abs() > tolerance {
            return Err(SolveError::Inconsistent { index: origins[r], residual: -rhs });
        }
    }

    let pivot_cols: BTreeSet<usize> = pivots.iter().map(|&(_, col)| col).collect();
    let mut values = vec![None; n];
    for (r, col) in pivots {
        let (coeffs, rhs) = &rows[r];
        let depends_on_free = coeffs
            .iter()
            .enumerate()
            .any(|(c, v)| !pivot_cols.contains(&c) && v.abs() > PIVOT_EPSILON);
        if depends_on_free {
            continue;
        }
        if !rhs.is_finite() {
            return Err(SolveError::NonFinite);
        }
        values[col] = Some(*rhs);
    }
    Ok(values)
}

/// Damped Gauss-Newton from 1.0 for every unknown.
fn levenberg_marquardt(
    residuals: &[Expr],
    vars: &[VarId],
    options: SolveOptions,
) -> Result<Vec<f64>, SolveError> {
    let jacobian: Vec<Vec<Expr>> = residuals
        .iter()
        .map(|r| vars.iter().map(|&v| r.derivative(v).fold()).collect())
        .collect();

    let mut x = vec![1.0; vars.len()];
    let mut damping = INITIAL_DAMPING;
    let mut r = eval_all(residuals, vars, &x)?;
    let mut cost = squared_norm(&r);

    for iteration in 0..options.max_iterations {
        if cost.sqrt() <= options.tolerance {
            debug!("converged after {iteration} iteration(s)");
            return Ok(x);
        }

        let env = environment(vars, &x);
        let mut jac = vec![vec![0.0; vars.len()]; residuals.len()];
        for (i, row) in jacobian.iter().enumerate() {
            for (j, entry) in row.iter().enumerate() {
                let value = entry.eval(&env).unwrap_or(f64::NAN);
                if !value.is_finite() {
                    return Err(SolveError::NonFinite);
                }
                jac[i][j] = value;
            }
        }

        // normal equations: (J^T J + damping I) delta = -J^T r
        let n = vars.len();
        let mut improved = false;
        while damping <= MAX_DAMPING {
            let mut lhs = vec![vec![0.0; n]; n];
            let mut rhs = vec![0.0; n];
            for (jrow, ri) in jac.iter().zip(&r) {
                for a in 0..n {
                    rhs[a] -= jrow[a] * ri;
                    for b in 0..n {
                        lhs[a][b] += jrow[a] * jrow[b];
                    }
                }
            }
            for (a, row) in lhs.iter_mut().enumerate() {
                row[a] += damping;
            }

            let Some(delta) = solve_dense(lhs, rhs) else {
                damping *= 10.0;
                continue;
            };
            let candidate: Vec<f64> = x.iter().zip(&delta).map(|(xi, di)| xi + di).collect();
            let candidate_r = match eval_all(residuals, vars, &candidate) {
                Ok(values) => values,
                Err(_) => {
                    // stepped outside the domain; shorten the step
                    damping *= 10.0;
                    continue;
                }
            };
            let candidate_cost = squared_norm(&candidate_r);
            if candidate_cost < cost {
                x = candidate;
                r = candidate_r;
                cost = candidate_cost;
                damping = (damping / 10.0).max(f64::MIN_POSITIVE);
                improved = true;
                break;
            }
            damping *= 10.0;
        }

        if !improved {
            break;
        }
    }

    if cost.sqrt() <= options.tolerance {
        return Ok(x);
    }
    Err(SolveError::NoConvergence { iterations: options.max_iterations, residual: cost.sqrt() })
}

fn environment(vars: &[VarId], values: &[f64]) -> HashMap<VarId, f64> {
    vars.iter().copied().zip(values.iter().copied()).collect()
}

fn eval_all(residuals: &[Expr], vars: &[VarId], values: &[f64]) -> Result<Vec<f64>, SolveError> {
    let env = environment(vars, values);
    residuals
        .iter()
        .map(|r| match r.eval(&env) {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(SolveError::NonFinite),
        })
        .collect()
}

fn squared_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum()
}

/// Solves a square system by Gaussian elimination with partial pivoting.
fn solve_dense(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let best =
            (col..n).fold(col, |best, r| if a[r][col].abs() > a[best][col].abs() { r } else { best });
        if a[best][col].abs() <= PIVOT_EPSILON {
            return None;
        }
        a.swap(col, best);
        b.swap(col, best);
        for r in col + 1..n {
            let factor = a[r][col] / a[col][col];
            for c in col..n {
                a[r][c] -= factor * a[col][c];
            }
            b[r] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for r in (0..n).rev() {
        let tail: f64 = (r + 1..n).map(|c| a[r][c] * x[c]).sum();
        x[r] = (b[r] - tail) / a[r][r];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interner::SymbolTable;
    use crate::parser::parse_equation;

    fn system(sources: &[&str]) -> (SymbolTable, Vec<Equation>) {
        let mut symbols = SymbolTable::new();
        let equations = sources.iter().map(|s| parse_equation(s, &mut symbols).unwrap()).collect();
        (symbols, equations)
    }

    fn ids(symbols: &SymbolTable, names: &[&str]) -> Vec<VarId> {
        names.iter().map(|n| symbols.get(n).unwrap()).collect()
    }

    fn value_of(roots: &Roots, unknowns: &[VarId], id: VarId) -> Option<f64> {
        match roots {
            Roots::Positional(values) => {
                unknowns.iter().zip(values).find(|(u, _)| **u == id).map(|(_, v)| *v)
            }
            Roots::Mapping(pairs) => pairs.iter().find(|(u, _)| *u == id).map(|(_, v)| *v),
        }
    }

    #[test]
    fn test_single_linear_equation_is_positional() {
        let (symbols, eqs) = system(&["2x + 5 = 13"]);
        let unknowns = ids(&symbols, &["x"]);
        let roots = NumericSolver::default().solve(&eqs, &unknowns).unwrap();
        assert_eq!(roots, Roots::Positional(vec![4.0]));
    }

    #[test]
    fn test_linear_system_two_unknowns() {
        let (symbols, eqs) = system(&["x + y = 10", "x - y = 4"]);
        let unknowns = ids(&symbols, &["x", "y"]);
        let roots = NumericSolver::default().solve(&eqs, &unknowns).unwrap();
        let Roots::Positional(values) = roots else { panic!("expected positional roots") };
        assert!((values[0] - 7.0).abs() < 1e-9);
        assert!((values[1] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_outside_equations_gives_mapping() {
        let (mut symbols, eqs) = system(&["2x = 8"]);
        let solve = symbols.intern("Solve");
        let x = symbols.get("x").unwrap();
        let roots = NumericSolver::default().solve(&eqs, &[solve, x]).unwrap();
        assert_eq!(roots, Roots::Mapping(vec![(x, 4.0)]));
    }

    #[test]
    fn test_underdetermined_linear_keeps_determined_part() {
        let (symbols, eqs) = system(&["x + y = 10", "z = 2"]);
        let unknowns = ids(&symbols, &["x", "y", "z"]);
        let roots = NumericSolver::default().solve(&eqs, &unknowns).unwrap();
        assert_eq!(roots, Roots::Mapping(vec![(unknowns[2], 2.0)]));
    }

    #[test]
    fn test_fully_free_linear_is_singular() {
        let (symbols, eqs) = system(&["x + y = 10"]);
        let unknowns = ids(&symbols, &["x", "y"]);
        let err = NumericSolver::default().solve(&eqs, &unknowns).unwrap_err();
        assert_eq!(err, SolveError::Singular { free: 2 });
        assert_eq!(err.code(), "S002");
    }

    #[test]
    fn test_inconsistent_linear_system() {
        let (symbols, eqs) = system(&["x + y = 1", "x + y = 2"]);
        let unknowns = ids(&symbols, &["x", "y"]);
        let err = NumericSolver::default().solve(&eqs, &unknowns).unwrap_err();
        assert!(matches!(err, SolveError::Inconsistent { index: 2, .. }));
    }

    #[test]
    fn test_constant_equation_checked() {
        let (_, eqs) = system(&["2 + 2 = 5"]);
        let err = NumericSolver::default().solve(&eqs, &[]).unwrap_err();
        assert!(matches!(err, SolveError::Inconsistent { index: 1, .. }));

        let (_, eqs) = system(&["2 + 2 = 4"]);
        assert_eq!(NumericSolver::default().solve(&eqs, &[]).unwrap(), Roots::Mapping(vec![]));
    }

    #[test]
    fn test_nonlinear_quadratic_converges_from_one() {
        let (symbols, eqs) = system(&["x^2 = 9"]);
        let unknowns = ids(&symbols, &["x"]);
        let roots = NumericSolver::default().solve(&eqs, &unknowns).unwrap();
        let x = value_of(&roots, &unknowns, unknowns[0]).unwrap();
        assert!((x - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_nonlinear_system() {
        let (symbols, eqs) = system(&["x*y = 6", "x - y = 1"]);
        let unknowns = ids(&symbols, &["x", "y"]);
        let roots = NumericSolver::default().solve(&eqs, &unknowns).unwrap();
        let x = value_of(&roots, &unknowns, unknowns[0]).unwrap();
        let y = value_of(&roots, &unknowns, unknowns[1]).unwrap();
        assert!((x * y - 6.0).abs() < 1e-6);
        assert!((x - y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_nonlinear_without_real_root_does_not_converge() {
        let (symbols, eqs) = system(&["x^2 = -1"]);
        let unknowns = ids(&symbols, &["x"]);
        let err = NumericSolver::default().solve(&eqs, &unknowns).unwrap_err();
        assert!(matches!(err, SolveError::NoConvergence { .. }));
        assert_eq!(err.code(), "S003");
    }

    #[test]
    fn test_nonlinear_underdetermined_is_singular() {
        let (symbols, eqs) = system(&["x*y = 6"]);
        let unknowns = ids(&symbols, &["x", "y"]);
        let err = NumericSolver::default().solve(&eqs, &unknowns).unwrap_err();
        assert_eq!(err, SolveError::Singular { free: 1 });
    }

    #[test]
    fn test_iteration_cap_is_respected() {
        let (symbols, eqs) = system(&["x^3 = 1000"]);
        let unknowns = ids(&symbols, &["x"]);
        let solver = NumericSolver::new(SolveOptions { max_iterations: 1, tolerance: 1e-12 });
        let result = solver.solve(&eqs, &unknowns);
        assert!(matches!(result, Err(SolveError::NoConvergence { iterations: 1, .. })));
    }

    #[test]
    fn test_display_detailed_has_code() {
        let err = SolveError::NonFinite;
        assert_eq!(err.display_detailed(), "non-finite value encountered (S004)");
    }
}
