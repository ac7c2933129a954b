//! Direct arithmetic: evaluate or simplify a single expression without
//! building a [`Problem`](crate::problem::Problem).
//!
//! ```
//! use wordprob::arithmetic::{self, Operation};
//!
//! assert_eq!(arithmetic::evaluate("2+3")?, 5.0);
//! assert_eq!(arithmetic::simplify("2x + 3x - 1")?, "5*x - 1");
//! assert_eq!(Operation::detect("Simplify 2x + 3x"), Operation::Simplify);
//! # Ok::<(), Box<wordprob::errors::ParseError>>(())
//! ```

use crate::errors::ParseError;
use crate::expr::{Affine, Expr};
use crate::interner::SymbolTable;
use crate::parser::expr::MAX_HEIGHT;
use crate::parser::parse_expression;

/// What a free-form query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Solve,
    Simplify,
    Evaluate,
}

impl Operation {
    /// Routes a query by keyword: `solve`/`equation` -> Solve, `simplify` ->
    /// Simplify, anything else -> Evaluate. Case-insensitive.
    #[must_use]
    pub fn detect(query: &str) -> Operation {
        let query = query.to_lowercase();
        if query.contains("solve") || query.contains("equation") {
            Operation::Solve
        } else if query.contains("simplify") {
            Operation::Simplify
        } else {
            Operation::Evaluate
        }
    }

    /// The part of `query` this operation works on.
    ///
    /// For `Simplify` that is the text after the `simplify` keyword (and an
    /// optional colon); other operations use the whole query.
    #[must_use]
    pub fn operand(self, query: &str) -> &str {
        if self != Operation::Simplify {
            return query;
        }
        let lowered = query.to_ascii_lowercase();
        match lowered.find("simplify") {
            Some(at) => query[at + "simplify".len()..].trim_start().trim_start_matches(':'),
            None => query,
        }
    }
}

/// Evaluates a pure arithmetic expression.
///
/// # Errors
/// - `UnboundIdentifier` if the expression names a variable.
/// - `NonFiniteResult` for NaN or infinite results (`1/0`).
/// - Any parse error from the expression grammar.
pub fn evaluate(text: &str) -> Result<f64, Box<ParseError>> {
    let mut symbols = SymbolTable::new();
    let expr = parse_expression(text, &mut symbols)?;
    if let Some((_, name)) = symbols.iter().next() {
        return Err(Box::new(ParseError::UnboundIdentifier { name: name.to_string() }));
    }
    let value = expr.fold().eval(&Default::default()).unwrap_or(f64::NAN);
    if !value.is_finite() {
        return Err(Box::new(ParseError::NonFiniteResult { value }));
    }
    Ok(value)
}

/// Folds constants and, for linear expressions, collects like terms.
///
/// # Errors
/// Any parse error from the expression grammar.
pub fn simplify(text: &str) -> Result<String, Box<ParseError>> {
    let mut symbols = SymbolTable::new();
    let expr = parse_expression(text, &mut symbols)?;
    // the canonical form is a chain as tall as its term count
    let simplified = match expr.affine() {
        Some(form) if form.coeffs.len() < MAX_HEIGHT => from_affine(&form),
        _ => expr.fold(),
    };
    Ok(simplified.display(&symbols).to_string())
}

/// Canonical expression for an affine form: terms in interning order, constant last.
fn from_affine(form: &Affine) -> Expr {
    let mut acc: Option<Expr> = None;
    for (&id, &coeff) in &form.coeffs {
        if coeff == 0.0 {
            continue;
        }
        let magnitude = coeff.abs();
        let term = if magnitude == 1.0 {
            Expr::Var(id)
        } else {
            Expr::mul(Expr::Num(magnitude), Expr::Var(id))
        };
        acc = Some(match (acc, coeff < 0.0) {
            (None, false) => term,
            (None, true) => Expr::neg(term),
            (Some(prev), false) => Expr::add(prev, term),
            (Some(prev), true) => Expr::sub(prev, term),
        });
    }

    match acc {
        None => Expr::Num(form.constant),
        Some(terms) if form.constant > 0.0 => Expr::add(terms, Expr::Num(form.constant)),
        Some(terms) if form.constant < 0.0 => Expr::sub(terms, Expr::Num(-form.constant)),
        Some(terms) => terms,
    }
}
