//! Symbolic expressions and equations over interned identifiers.
//!
//! Expressions are small trees whose leaves are numbers or [`VarId`] handles.
//! Everything the solver needs lives here: substitution of known values,
//! constant folding, evaluation, symbolic differentiation (for Jacobians) and
//! affine decomposition (to detect linear systems).
//!
//! Every walk recurses once per tree level. Trees built by the parser are at
//! most [`MAX_HEIGHT`](crate::parser::expr::MAX_HEIGHT) tall.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::interner::{SymbolTable, VarId};

/// A symbolic arithmetic expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(VarId),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    /// Natural logarithm. Only produced by differentiation of `u^v`.
    Ln(Box<Expr>),
}

/// An affine form `sum(coeff * var) + constant`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Affine {
    pub coeffs: BTreeMap<VarId, f64>,
    pub constant: f64,
}

impl Affine {
    fn constant(value: f64) -> Self {
        Affine { coeffs: BTreeMap::new(), constant: value }
    }

    fn var(id: VarId) -> Self {
        Affine { coeffs: BTreeMap::from([(id, 1.0)]), constant: 0.0 }
    }

    fn is_constant(&self) -> bool {
        self.coeffs.values().all(|c| *c == 0.0)
    }

    fn scale(mut self, factor: f64) -> Self {
        for c in self.coeffs.values_mut() {
            *c *= factor;
        }
        self.constant *= factor;
        self
    }

    fn combine(mut self, other: Affine, sign: f64) -> Self {
        for (id, c) in other.coeffs {
            *self.coeffs.entry(id).or_insert(0.0) += sign * c;
        }
        self.constant += sign * other.constant;
        self
    }
}

impl Expr {
    pub fn add(lhs: Expr, rhs: Expr) -> Expr {
        Expr::Add(Box::new(lhs), Box::new(rhs))
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Expr {
        Expr::Sub(Box::new(lhs), Box::new(rhs))
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Expr {
        Expr::Mul(Box::new(lhs), Box::new(rhs))
    }

    pub fn div(lhs: Expr, rhs: Expr) -> Expr {
        Expr::Div(Box::new(lhs), Box::new(rhs))
    }

    pub fn pow(base: Expr, exponent: Expr) -> Expr {
        Expr::Pow(Box::new(base), Box::new(exponent))
    }

    pub fn neg(inner: Expr) -> Expr {
        Expr::Neg(Box::new(inner))
    }

    pub fn ln(inner: Expr) -> Expr {
        Expr::Ln(Box::new(inner))
    }

    /// Numeric value if the expression is a literal.
    #[must_use]
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Expr::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// Collects the handles referenced by this expression.
    pub fn collect_vars(&self, out: &mut BTreeSet<VarId>) {
        match self {
            Expr::Num(_) => {}
            Expr::Var(id) => {
                out.insert(*id);
            }
            Expr::Neg(inner) | Expr::Ln(inner) => inner.collect_vars(out),
            Expr::Add(l, r)
            | Expr::Sub(l, r)
            | Expr::Mul(l, r)
            | Expr::Div(l, r)
            | Expr::Pow(l, r) => {
                l.collect_vars(out);
                r.collect_vars(out);
            }
        }
    }

    /// Handles referenced by this expression, in first-occurrence order.
    #[must_use]
    pub fn vars_in_order(&self) -> Vec<VarId> {
        fn walk(expr: &Expr, out: &mut Vec<VarId>) {
            match expr {
                Expr::Num(_) => {}
                Expr::Var(id) => {
                    if !out.contains(id) {
                        out.push(*id);
                    }
                }
                Expr::Neg(inner) | Expr::Ln(inner) => walk(inner, out),
                Expr::Add(l, r)
                | Expr::Sub(l, r)
                | Expr::Mul(l, r)
                | Expr::Div(l, r)
                | Expr::Pow(l, r) => {
                    walk(l, out);
                    walk(r, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }

    /// Replaces every bound handle with its value. Unbound handles stay symbolic.
    #[must_use]
    pub fn substitute(&self, values: &HashMap<VarId, f64>) -> Expr {
        match self {
            Expr::Num(n) => Expr::Num(*n),
            Expr::Var(id) => values.get(id).map_or(Expr::Var(*id), |v| Expr::Num(*v)),
            Expr::Neg(inner) => Expr::neg(inner.substitute(values)),
            Expr::Add(l, r) => Expr::add(l.substitute(values), r.substitute(values)),
            Expr::Sub(l, r) => Expr::sub(l.substitute(values), r.substitute(values)),
            Expr::Mul(l, r) => Expr::mul(l.substitute(values), r.substitute(values)),
            Expr::Div(l, r) => Expr::div(l.substitute(values), r.substitute(values)),
            Expr::Pow(l, r) => Expr::pow(l.substitute(values), r.substitute(values)),
            Expr::Ln(inner) => Expr::ln(inner.substitute(values)),
        }
    }

    /// Constant-folds literal subtrees and drops additive/multiplicative identities.
    #[must_use]
    pub fn fold(&self) -> Expr {
        match self {
            Expr::Num(_) | Expr::Var(_) => self.clone(),
            Expr::Neg(inner) => match inner.fold() {
                Expr::Num(n) => Expr::Num(-n),
                Expr::Neg(x) => *x,
                other => Expr::neg(other),
            },
            Expr::Add(l, r) => match (l.fold(), r.fold()) {
                (Expr::Num(a), Expr::Num(b)) => Expr::Num(a + b),
                (Expr::Num(z), other) | (other, Expr::Num(z)) if z == 0.0 => other,
                (a, b) => Expr::add(a, b),
            },
            Expr::Sub(l, r) => match (l.fold(), r.fold()) {
                (Expr::Num(a), Expr::Num(b)) => Expr::Num(a - b),
                (a, Expr::Num(z)) if z == 0.0 => a,
                (a, b) => Expr::sub(a, b),
            },
            Expr::Mul(l, r) => match (l.fold(), r.fold()) {
                (Expr::Num(a), Expr::Num(b)) => Expr::Num(a * b),
                (Expr::Num(one), other) | (other, Expr::Num(one)) if one == 1.0 => other,
                (a, b) => Expr::mul(a, b),
            },
            Expr::Div(l, r) => match (l.fold(), r.fold()) {
                (Expr::Num(a), Expr::Num(b)) if b != 0.0 => Expr::Num(a / b),
                (a, Expr::Num(one)) if one == 1.0 => a,
                (a, b) => Expr::div(a, b),
            },
            Expr::Pow(l, r) => match (l.fold(), r.fold()) {
                (Expr::Num(a), Expr::Num(b)) if a.powf(b).is_finite() => Expr::Num(a.powf(b)),
                (a, Expr::Num(one)) if one == 1.0 => a,
                (_, Expr::Num(zero)) if zero == 0.0 => Expr::Num(1.0),
                (a, b) => Expr::pow(a, b),
            },
            Expr::Ln(inner) => match inner.fold() {
                Expr::Num(n) if n > 0.0 => Expr::Num(n.ln()),
                other => Expr::ln(other),
            },
        }
    }

    /// Evaluates the expression. Returns `None` if a handle is missing from `env`.
    #[must_use]
    pub fn eval(&self, env: &HashMap<VarId, f64>) -> Option<f64> {
        match self {
            Expr::Num(n) => Some(*n),
            Expr::Var(id) => env.get(id).copied(),
            Expr::Neg(inner) => Some(-inner.eval(env)?),
            Expr::Add(l, r) => Some(l.eval(env)? + r.eval(env)?),
            Expr::Sub(l, r) => Some(l.eval(env)? - r.eval(env)?),
            Expr::Mul(l, r) => Some(l.eval(env)? * r.eval(env)?),
            Expr::Div(l, r) => Some(l.eval(env)? / r.eval(env)?),
            Expr::Pow(l, r) => Some(l.eval(env)?.powf(r.eval(env)?)),
            Expr::Ln(inner) => Some(inner.eval(env)?.ln()),
        }
    }

    /// Symbolic partial derivative with respect to `var`.
    #[must_use]
    pub fn derivative(&self, var: VarId) -> Expr {
        match self {
            Expr::Num(_) => Expr::Num(0.0),
            Expr::Var(id) => Expr::Num(if *id == var { 1.0 } else { 0.0 }),
            Expr::Neg(inner) => Expr::neg(inner.derivative(var)),
            Expr::Add(l, r) => Expr::add(l.derivative(var), r.derivative(var)),
            Expr::Sub(l, r) => Expr::sub(l.derivative(var), r.derivative(var)),
            // (uv)' = u'v + uv'
            Expr::Mul(l, r) => Expr::add(
                Expr::mul(l.derivative(var), (**r).clone()),
                Expr::mul((**l).clone(), r.derivative(var)),
            ),
            // (u/v)' = (u'v - uv') / v^2
            Expr::Div(l, r) => Expr::div(
                Expr::sub(
                    Expr::mul(l.derivative(var), (**r).clone()),
                    Expr::mul((**l).clone(), r.derivative(var)),
                ),
                Expr::pow((**r).clone(), Expr::Num(2.0)),
            ),
            Expr::Pow(base, exponent) => {
                let mut exponent_vars = BTreeSet::new();
                exponent.collect_vars(&mut exponent_vars);
                if exponent_vars.contains(&var) {
                    // d(u^v) = u^v * (v' ln u + v u'/u)
                    Expr::mul(
                        self.clone(),
                        Expr::add(
                            Expr::mul(exponent.derivative(var), Expr::ln((**base).clone())),
                            Expr::div(
                                Expr::mul((**exponent).clone(), base.derivative(var)),
                                (**base).clone(),
                            ),
                        ),
                    )
                } else {
                    // d(u^n) = n u^(n-1) u'
                    Expr::mul(
                        Expr::mul(
                            (**exponent).clone(),
                            Expr::pow(
                                (**base).clone(),
                                Expr::sub((**exponent).clone(), Expr::Num(1.0)),
                            ),
                        ),
                        base.derivative(var),
                    )
                }
            }
            Expr::Ln(inner) => Expr::div(inner.derivative(var), (**inner).clone()),
        }
    }

    /// Decomposes the expression into an affine form over all its handles.
    ///
    /// Returns `None` when the expression is not linear (products of handles,
    /// handles in denominators or under non-trivial powers).
    #[must_use]
    pub fn affine(&self) -> Option<Affine> {
        match self {
            Expr::Num(n) => Some(Affine::constant(*n)),
            Expr::Var(id) => Some(Affine::var(*id)),
            Expr::Neg(inner) => Some(inner.affine()?.scale(-1.0)),
            Expr::Add(l, r) => Some(l.affine()?.combine(r.affine()?, 1.0)),
            Expr::Sub(l, r) => Some(l.affine()?.combine(r.affine()?, -1.0)),
            Expr::Mul(l, r) => {
                let (a, b) = (l.affine()?, r.affine()?);
                if a.is_constant() {
                    Some(b.scale(a.constant))
                } else if b.is_constant() {
                    Some(a.scale(b.constant))
                } else {
                    None
                }
            }
            Expr::Div(l, r) => {
                let (a, b) = (l.affine()?, r.affine()?);
                (b.is_constant() && b.constant != 0.0).then(|| a.scale(1.0 / b.constant))
            }
            Expr::Pow(l, r) => {
                let (base, exponent) = (l.affine()?, r.affine()?);
                if !exponent.is_constant() {
                    return None;
                }
                if base.is_constant() {
                    Some(Affine::constant(base.constant.powf(exponent.constant)))
                } else if exponent.constant == 1.0 {
                    Some(base)
                } else if exponent.constant == 0.0 {
                    Some(Affine::constant(1.0))
                } else {
                    None
                }
            }
            Expr::Ln(inner) => {
                let a = inner.affine()?;
                (a.is_constant() && a.constant > 0.0).then(|| Affine::constant(a.constant.ln()))
            }
        }
    }

    /// Renders the expression with identifier names from `symbols`.
    #[must_use]
    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> ExprDisplay<'a> {
        ExprDisplay { expr: self, symbols }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Num(n) if *n < 0.0 => 3,
            Expr::Num(_) | Expr::Var(_) | Expr::Ln(_) => 5,
            Expr::Add(..) | Expr::Sub(..) => 1,
            Expr::Mul(..) | Expr::Div(..) => 2,
            Expr::Neg(_) => 3,
            Expr::Pow(..) => 4,
        }
    }
}

/// Display adapter pairing an [`Expr`] with the table that names its handles.
pub struct ExprDisplay<'a> {
    expr: &'a Expr,
    symbols: &'a SymbolTable,
}

impl ExprDisplay<'_> {
    fn child<'b>(&'b self, expr: &'b Expr) -> ExprDisplay<'b> {
        ExprDisplay { expr, symbols: self.symbols }
    }

    fn write_operand(
        &self,
        f: &mut fmt::Formatter<'_>,
        operand: &Expr,
        min_prec: u8,
    ) -> fmt::Result {
        if operand.precedence() < min_prec {
            write!(f, "({})", self.child(operand))
        } else {
            write!(f, "{}", self.child(operand))
        }
    }
}

impl fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expr {
            Expr::Num(n) => write!(f, "{n}"),
            Expr::Var(id) => write!(f, "{}", self.symbols.name(*id)),
            Expr::Neg(inner) => {
                write!(f, "-")?;
                self.write_operand(f, inner, 3)
            }
            Expr::Add(l, r) => {
                self.write_operand(f, l, 1)?;
                write!(f, " + ")?;
                self.write_operand(f, r, 2)
            }
            Expr::Sub(l, r) => {
                self.write_operand(f, l, 1)?;
                write!(f, " - ")?;
                self.write_operand(f, r, 2)
            }
            Expr::Mul(l, r) => {
                self.write_operand(f, l, 2)?;
                write!(f, "*")?;
                self.write_operand(f, r, 3)
            }
            Expr::Div(l, r) => {
                self.write_operand(f, l, 2)?;
                write!(f, "/")?;
                self.write_operand(f, r, 3)
            }
            Expr::Pow(l, r) => {
                self.write_operand(f, l, 5)?;
                write!(f, "^")?;
                self.write_operand(f, r, 4)
            }
            Expr::Ln(inner) => write!(f, "ln({})", self.child(inner)),
        }
    }
}

/// A symbolic equality constraint `lhs = rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub lhs: Expr,
    pub rhs: Expr,
    /// Source fragment the equation was built from.
    pub source: String,
    /// Name of the extraction rule that produced it.
    pub rule: &'static str,
}

impl Equation {
    #[must_use]
    pub fn new(lhs: Expr, rhs: Expr) -> Self {
        let source = String::new();
        Equation { lhs, rhs, source, rule: "manual" }
    }

    /// `lhs - rhs`, the expression the solver drives to zero.
    #[must_use]
    pub fn residual(&self) -> Expr {
        Expr::sub(self.lhs.clone(), self.rhs.clone())
    }

    /// Substitutes known values on both sides and folds constants.
    #[must_use]
    pub fn substitute(&self, values: &HashMap<VarId, f64>) -> Equation {
        Equation {
            lhs: self.lhs.substitute(values).fold(),
            rhs: self.rhs.substitute(values).fold(),
            source: self.source.clone(),
            rule: self.rule,
        }
    }

    /// Handles referenced on either side, in first-occurrence order (left side first).
    #[must_use]
    pub fn vars_in_order(&self) -> Vec<VarId> {
        let mut vars = self.lhs.vars_in_order();
        for id in self.rhs.vars_in_order() {
            if !vars.contains(&id) {
                vars.push(id);
            }
        }
        vars
    }

    /// Structural equality of both sides, ignoring provenance.
    #[must_use]
    pub fn same_constraint(&self, other: &Equation) -> bool {
        self.lhs == other.lhs && self.rhs == other.rhs
    }

    #[must_use]
    pub fn display(&self, symbols: &SymbolTable) -> String {
        format!("{} = {}", self.lhs.display(symbols), self.rhs.display(symbols))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> (SymbolTable, VarId, VarId) {
        let mut symbols = SymbolTable::new();
        let x = symbols.intern("x");
        let y = symbols.intern("y");
        (symbols, x, y)
    }

    #[test]
    fn test_substitute_replaces_handles_only() {
        let (_, x, y) = table();
        let expr = Expr::add(Expr::Var(x), Expr::Var(y));
        let values = HashMap::from([(y, 3.0)]);
        assert_eq!(expr.substitute(&values), Expr::add(Expr::Var(x), Expr::Num(3.0)));
    }

    #[test]
    fn test_fold_constants() {
        let expr = Expr::mul(Expr::add(Expr::Num(2.0), Expr::Num(3.0)), Expr::Num(4.0));
        assert_eq!(expr.fold(), Expr::Num(20.0));
    }

    #[test]
    fn test_fold_keeps_division_by_zero_symbolic() {
        let expr = Expr::div(Expr::Num(1.0), Expr::Num(0.0));
        assert_eq!(expr.fold(), expr);
    }

    #[test]
    fn test_eval_missing_var_is_none() {
        let (_, x, _) = table();
        assert_eq!(Expr::Var(x).eval(&HashMap::new()), None);
    }

    #[test]
    fn test_derivative_of_polynomial() {
        let (_, x, _) = table();
        // d/dx (3x^2 + 2x) = 6x + 2 -> at x = 2: 14
        let expr = Expr::add(
            Expr::mul(Expr::Num(3.0), Expr::pow(Expr::Var(x), Expr::Num(2.0))),
            Expr::mul(Expr::Num(2.0), Expr::Var(x)),
        );
        let d = expr.derivative(x);
        let value = d.eval(&HashMap::from([(x, 2.0)])).unwrap();
        assert!((value - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_derivative_of_quotient() {
        let (_, x, _) = table();
        // d/dx (1/x) = -1/x^2 -> at x = 2: -0.25
        let d = Expr::div(Expr::Num(1.0), Expr::Var(x)).derivative(x);
        let value = d.eval(&HashMap::from([(x, 2.0)])).unwrap();
        assert!((value + 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_affine_linear_combination() {
        let (_, x, y) = table();
        // 2x + 5 - (y - 1) / 2
        let expr = Expr::sub(
            Expr::add(Expr::mul(Expr::Num(2.0), Expr::Var(x)), Expr::Num(5.0)),
            Expr::div(Expr::sub(Expr::Var(y), Expr::Num(1.0)), Expr::Num(2.0)),
        );
        let affine = expr.affine().unwrap();
        assert_eq!(affine.coeffs[&x], 2.0);
        assert_eq!(affine.coeffs[&y], -0.5);
        assert_eq!(affine.constant, 5.5);
    }

    #[test]
    fn test_affine_rejects_products_of_vars() {
        let (_, x, y) = table();
        assert!(Expr::mul(Expr::Var(x), Expr::Var(y)).affine().is_none());
        assert!(Expr::div(Expr::Num(1.0), Expr::Var(x)).affine().is_none());
        assert!(Expr::pow(Expr::Var(x), Expr::Num(2.0)).affine().is_none());
    }

    #[test]
    fn test_display_respects_precedence() {
        let (symbols, x, y) = table();
        let expr = Expr::mul(Expr::Num(2.0), Expr::add(Expr::Var(x), Expr::Var(y)));
        assert_eq!(expr.display(&symbols).to_string(), "2*(x + y)");

        let expr = Expr::sub(Expr::Var(x), Expr::sub(Expr::Var(y), Expr::Num(1.0)));
        assert_eq!(expr.display(&symbols).to_string(), "x - (y - 1)");
    }

    #[test]
    fn test_equation_vars_in_order() {
        let (_, x, y) = table();
        let eq = Equation::new(Expr::add(Expr::Var(y), Expr::Var(x)), Expr::Var(y));
        assert_eq!(eq.vars_in_order(), vec![y, x]);
    }
}
