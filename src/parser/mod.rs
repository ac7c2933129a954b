pub mod expr;
pub mod rules;
mod utils;

use nom::IResult;

use crate::errors::ParseError;

/// Parser result with our boxed error type.
pub type PResult<'a, O> = IResult<&'a str, O, Box<ParseError>>;

// Re-export the public API so call sites can use `parser::parse_equation`.
pub use expr::{parse_equation, parse_expression};
pub use rules::{
    ConflictPolicy, EQUATION_RULES, EquationRule, extract_equations, extract_known_values,
    extract_tokens, is_stop_word,
};
