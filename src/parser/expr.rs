//! Arithmetic expression grammar.
//!
//! ```text
//! sum     = product (("+" | "-") product)*
//! product = unary (("*" | "/") unary | power)*      -- juxtaposition multiplies
//! unary   = ("-" | "+") unary | power
//! power   = primary (("^" | "**") unary)?          -- right-associative
//! primary = number | identifier | "(" sum ")"
//! ```
//!
//! Juxtaposition only multiplies when nothing separates the factors (`2x`,
//! `3(x+1)`, `(x+1)(x-1)`), so prose such as `the x` is not a product.
//!
//! Identifiers are interned into the caller's [`SymbolTable`] as they are read.
//!
//! Recursion is bounded: parentheses, sign chains and exponents may nest at
//! most [`MAX_NESTING`] levels, and the resulting tree is at most
//! [`MAX_HEIGHT`] nodes tall. Anything beyond is rejected with
//! [`ParseError::TooDeep`], which keeps every later tree walk shallow.

use nom::Parser;
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, one_of},
    combinator::opt,
};

use crate::errors::ParseError;
use crate::expr::{Equation, Expr};
use crate::interner::SymbolTable;

use super::PResult;
use super::utils::{identifier, lead, number, starts_implicit_factor, ws, ws_char};

/// Deepest nesting of parentheses, signs and exponents in one expression.
pub const MAX_NESTING: usize = 32;

/// Tallest expression tree accepted. Also bounds operator chains like `x + x + ...`.
pub const MAX_HEIGHT: usize = 256;

fn too_deep(limit: usize) -> nom::Err<Box<ParseError>> {
    nom::Err::Failure(Box::new(ParseError::TooDeep { limit }))
}

/// A parsed subtree and its height.
struct Node {
    expr: Expr,
    height: usize,
}

impl Node {
    fn leaf(expr: Expr) -> Self {
        Node { expr, height: 1 }
    }

    fn unary(inner: Node, build: fn(Expr) -> Expr) -> Result<Node, nom::Err<Box<ParseError>>> {
        Self::checked(build(inner.expr), inner.height + 1)
    }

    fn binary(
        lhs: Node,
        rhs: Node,
        build: fn(Expr, Expr) -> Expr,
    ) -> Result<Node, nom::Err<Box<ParseError>>> {
        Self::checked(build(lhs.expr, rhs.expr), lhs.height.max(rhs.height) + 1)
    }

    fn checked(expr: Expr, height: usize) -> Result<Node, nom::Err<Box<ParseError>>> {
        if height > MAX_HEIGHT {
            return Err(too_deep(MAX_HEIGHT));
        }
        Ok(Node { expr, height })
    }
}

/// Recursive-descent expression parser bound to a symbol table.
struct ExprParser<'t> {
    symbols: &'t mut SymbolTable,
    nesting: usize,
}

impl ExprParser<'_> {
    /// Runs `parse` one nesting level down.
    fn nested<'a>(
        &mut self,
        input: &'a str,
        parse: fn(&mut Self, &'a str) -> PResult<'a, Node>,
    ) -> PResult<'a, Node> {
        if self.nesting == MAX_NESTING {
            return Err(too_deep(MAX_NESTING));
        }
        self.nesting += 1;
        let result = parse(self, input);
        self.nesting -= 1;
        result
    }

    /// Parses left-associative `+`/`-`.
    fn sum<'a>(&mut self, input: &'a str) -> PResult<'a, Node> {
        let (mut input, mut acc) = self.product(input)?;
        loop {
            let (next, op) = opt(ws(one_of("+-"))).parse(input)?;
            let Some(op) = op else {
                break;
            };
            let (next, rhs) = self.product(next)?;
            let build: fn(Expr, Expr) -> Expr = if op == '+' { Expr::add } else { Expr::sub };
            acc = Node::binary(acc, rhs, build)?;
            input = next;
        }
        Ok((input, acc))
    }

    /// Parses left-associative `*`/`/` and implicit multiplication.
    fn product<'a>(&mut self, input: &'a str) -> PResult<'a, Node> {
        let (mut input, mut acc) = self.unary(input)?;
        loop {
            // `**` is a power operator, consumed by `power` before we get here
            let (next, op) = opt(ws(one_of("*/"))).parse(input)?;
            if let Some(op) = op {
                let (next, rhs) = self.unary(next)?;
                let build: fn(Expr, Expr) -> Expr = if op == '*' { Expr::mul } else { Expr::div };
                acc = Node::binary(acc, rhs, build)?;
                input = next;
            } else if starts_implicit_factor(input) {
                let (next, rhs) = self.power(input)?;
                acc = Node::binary(acc, rhs, Expr::mul)?;
                input = next;
            } else {
                break;
            }
        }
        Ok((input, acc))
    }

    /// Parses unary sign chains like `--x`.
    fn unary<'a>(&mut self, input: &'a str) -> PResult<'a, Node> {
        if let Ok((next, sign)) = ws(one_of::<_, _, Box<ParseError>>("+-")).parse(input) {
            let (next, inner) = self.nested(next, Self::unary)?;
            let node = if sign == '-' { Node::unary(inner, Expr::neg)? } else { inner };
            return Ok((next, node));
        }
        self.power(input)
    }

    /// Parses `base ^ exponent`, right-associative.
    fn power<'a>(&mut self, input: &'a str) -> PResult<'a, Node> {
        let (input, base) = self.primary(input)?;
        let (input, op) = opt(ws(alt((tag("**"), tag("^"))))).parse(input)?;
        if op.is_none() {
            return Ok((input, base));
        }
        let (input, exponent) = self.nested(input, Self::unary)?;
        Ok((input, Node::binary(base, exponent, Expr::pow)?))
    }

    /// Parses expression atoms. Trailing blanks are left in place so `product`
    /// can tell `2x` from `2 x`.
    fn primary<'a>(&mut self, input: &'a str) -> PResult<'a, Node> {
        if let Ok((next, _)) = ws_char('(').parse(input) {
            let (next, inner) = self.nested(next, Self::sum)?;
            let (next, _) = lead(char(')')).parse(next)?;
            return Ok((next, inner));
        }
        if let Ok((next, value)) = lead(number).parse(input) {
            return Ok((next, Node::leaf(Expr::Num(value))));
        }
        let (next, name) = lead(identifier).parse(input)?;
        Ok((next, Node::leaf(Expr::Var(self.symbols.intern(name)))))
    }
}

/// Parses a complete arithmetic expression, interning identifiers into `symbols`.
///
/// The whole input must be consumed. On failure `symbols` is left untouched.
///
/// # Errors
/// - `EmptyExpression` for blank input.
/// - `TrailingInput` when only a prefix is an expression (`"Solve for x: 2x"`).
/// - `TooDeep` past [`MAX_NESTING`] or [`MAX_HEIGHT`].
/// - `NomError`/`InvalidNumber` for token-level failures.
pub fn parse_expression(source: &str, symbols: &mut SymbolTable) -> Result<Expr, Box<ParseError>> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Err(Box::new(ParseError::EmptyExpression));
    }

    // intern into a scratch copy so a failed parse leaves no stray identifiers
    let mut scratch = symbols.clone();
    let result = ExprParser { symbols: &mut scratch, nesting: 0 }.sum(trimmed);
    match result {
        Ok((rest, node)) if rest.trim().is_empty() => {
            *symbols = scratch;
            Ok(node.expr)
        }
        Ok((rest, _)) => Err(Box::new(ParseError::TrailingInput {
            parsed: trimmed[..trimmed.len() - rest.len()].trim().to_string(),
            rest: rest.trim().to_string(),
        })),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(e),
        Err(nom::Err::Incomplete(_)) => {
            Err(Box::new(ParseError::NomError(nom::error::ErrorKind::Complete)))
        }
    }
}

/// Builds an equation from a fragment containing exactly one `=`.
///
/// # Errors
/// `MalformedEquation` if the fragment does not split into two sides, or any
/// error from [`parse_expression`] for either side.
pub fn parse_equation(
    fragment: &str,
    symbols: &mut SymbolTable,
) -> Result<Equation, Box<ParseError>> {
    let parts: Vec<&str> = fragment.split('=').collect();
    let [left, right] = parts.as_slice() else {
        return Err(Box::new(ParseError::MalformedEquation {
            fragment: fragment.trim().to_string(),
            parts: parts.len(),
        }));
    };

    let mut scratch = symbols.clone();
    let lhs = parse_expression(left, &mut scratch)?;
    let rhs = parse_expression(right, &mut scratch)?;
    *symbols = scratch;

    Ok(Equation {
        lhs,
        rhs,
        source: fragment.trim().to_string(),
        rule: "manual",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn eval(source: &str) -> f64 {
        let mut symbols = SymbolTable::new();
        parse_expression(source, &mut symbols).unwrap().eval(&HashMap::new()).unwrap()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("2 + 3 * 4"), 14.0);
        assert_eq!(eval("(2 + 3) * 4"), 20.0);
        assert_eq!(eval("10 - 4 - 3"), 3.0);
        assert_eq!(eval("16 / 4 / 2"), 2.0);
    }

    #[test]
    fn test_power_is_right_associative() {
        assert_eq!(eval("2 ^ 3 ^ 2"), 512.0);
        assert_eq!(eval("2 ** 3"), 8.0);
        assert_eq!(eval("-2 ^ 2"), -4.0);
    }

    #[test]
    fn test_unary_chains() {
        assert_eq!(eval("--3"), 3.0);
        assert_eq!(eval("+-3"), -3.0);
        assert_eq!(eval("4 * -2"), -8.0);
    }

    #[test]
    fn test_implicit_multiplication() {
        let mut symbols = SymbolTable::new();
        let expr = parse_expression("2x + 5", &mut symbols).unwrap();
        let x = symbols.get("x").unwrap();
        assert_eq!(expr, Expr::add(Expr::mul(Expr::Num(2.0), Expr::Var(x)), Expr::Num(5.0)));

        assert_eq!(eval("3(1 + 1)"), 6.0);
    }

    #[test]
    fn test_implicit_multiplication_of_groups() {
        assert_eq!(eval("(1 + 2)(3 + 4)"), 21.0);
        assert_eq!(eval("2(3)(4)"), 24.0);
    }

    #[test]
    fn test_whitespace_breaks_juxtaposition() {
        let mut symbols = SymbolTable::new();
        for source in ["the x + 1", "2 x", "Find x if x + 2", "(1 + 2) (3 + 4)"] {
            let err = parse_expression(source, &mut symbols).unwrap_err();
            assert!(matches!(*err, ParseError::TrailingInput { .. }), "{source}: {err:?}");
        }
        assert!(symbols.is_empty());
    }

    #[test]
    fn test_nesting_up_to_the_limit_parses() {
        let source = format!("{}1{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert_eq!(eval(&source), 1.0);
        assert_eq!(eval(&format!("{}3", "-".repeat(MAX_NESTING))), 3.0);
    }

    #[test]
    fn test_deep_parentheses_are_rejected() {
        let mut symbols = SymbolTable::new();
        let source = format!("{}x{}", "(".repeat(20_000), ")".repeat(20_000));
        let err = parse_expression(&source, &mut symbols).unwrap_err();
        assert!(matches!(*err, ParseError::TooDeep { limit: MAX_NESTING }));
        assert_eq!(err.code(), "E009");
        assert!(symbols.is_empty());
    }

    #[test]
    fn test_deep_sign_and_exponent_chains_are_rejected() {
        let mut symbols = SymbolTable::new();
        let signs = format!("{}1", "-".repeat(50_000));
        let err = parse_expression(&signs, &mut symbols).unwrap_err();
        assert!(matches!(*err, ParseError::TooDeep { limit: MAX_NESTING }));

        let towers = format!("2{}", "^2".repeat(50_000));
        let err = parse_expression(&towers, &mut symbols).unwrap_err();
        assert!(matches!(*err, ParseError::TooDeep { limit: MAX_NESTING }));
    }

    #[test]
    fn test_long_operator_chain_is_rejected() {
        let mut symbols = SymbolTable::new();
        let long = "x + ".repeat(100_000) + "1";
        let err = parse_expression(&long, &mut symbols).unwrap_err();
        assert!(matches!(*err, ParseError::TooDeep { limit: MAX_HEIGHT }));

        let short = "x + ".repeat(MAX_HEIGHT - 2) + "1";
        assert!(parse_expression(&short, &mut symbols).is_ok());
    }

    #[test]
    fn test_implicit_multiplication_binds_tighter_than_power_operand() {
        let mut symbols = SymbolTable::new();
        let expr = parse_expression("2x^2", &mut symbols).unwrap();
        let x = symbols.get("x").unwrap();
        assert_eq!(expr, Expr::mul(Expr::Num(2.0), Expr::pow(Expr::Var(x), Expr::Num(2.0))));
    }

    #[test]
    fn test_trailing_input_is_rejected() {
        let mut symbols = SymbolTable::new();
        let err = parse_expression("Solve for x: 2x + 5", &mut symbols).unwrap_err();
        let ParseError::TrailingInput { ref parsed, ref rest } = *err else {
            panic!("expected TrailingInput, got {err:?}");
        };
        assert_eq!(parsed, "Solve");
        assert!(rest.starts_with("for x:"));
        // nothing was interned
        assert!(symbols.is_empty());
    }

    #[test]
    fn test_empty_expression() {
        let mut symbols = SymbolTable::new();
        let err = parse_expression("   ", &mut symbols).unwrap_err();
        assert!(matches!(*err, ParseError::EmptyExpression));
    }

    #[test]
    fn test_unbalanced_parenthesis() {
        let mut symbols = SymbolTable::new();
        assert!(parse_expression("(1 + 2", &mut symbols).is_err());
        assert!(parse_expression("1 + 2)", &mut symbols).is_err());
    }

    #[test]
    fn test_dangling_operator() {
        let mut symbols = SymbolTable::new();
        assert!(parse_expression("2 +", &mut symbols).is_err());
        assert!(parse_expression("* 2", &mut symbols).is_err());
    }

    #[test]
    fn test_parse_equation_two_sides() {
        let mut symbols = SymbolTable::new();
        let eq = parse_equation(" 2x + 5 = 13 ", &mut symbols).unwrap();
        assert_eq!(eq.source, "2x + 5 = 13");
        assert_eq!(eq.rhs, Expr::Num(13.0));
        assert_eq!(eq.display(&symbols), "2*x + 5 = 13");
    }

    #[test]
    fn test_parse_equation_rejects_chained_equals() {
        let mut symbols = SymbolTable::new();
        let err = parse_equation("a = b = c", &mut symbols).unwrap_err();
        assert!(matches!(*err, ParseError::MalformedEquation { parts: 3, .. }));
        assert!(symbols.is_empty());
    }

    #[test]
    fn test_parse_equation_failed_rhs_leaves_table_clean() {
        let mut symbols = SymbolTable::new();
        assert!(parse_equation("y + 1 = 3 apples?", &mut symbols).is_err());
        assert!(symbols.get("y").is_none());
    }
}
