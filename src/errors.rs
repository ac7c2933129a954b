//! Error types for expression and equation parsing, with error codes and helpful messages.
//!
//! # Error Codes
//!
//! Each error variant has a unique code (E001-E009) for documentation lookup:
//!
//! - E001: `EmptyExpression` (Empty expression string)
//! - E002: `TrailingInput` (Expression followed by unparsed text)
//! - E003: `InvalidNumber` (Numeric literal could not be parsed)
//! - E004: `UnboundIdentifier` (Identifier in a pure arithmetic expression)
//! - E005: `MalformedEquation` (Fragment does not split into two sides)
//! - E006: `RegexError` (Regex engine failure)
//! - E007: `NonFiniteResult` (Evaluation produced NaN or infinity)
//! - E008: `NomError` (Low-level nom parser error)
//! - E009: `TooDeep` (Expression nested beyond the parser's budget)
//!
//! None of these errors escape `parse_problem`: a fragment that fails to parse
//! is skipped. They surface through [`crate::arithmetic`] and in debug logs.
//!
//! # Examples
//!
//! ```
//! use wordprob::arithmetic;
//!
//! match arithmetic::evaluate("2 + ") {
//!     Err(e) => {
//!         println!("Error: {}", e);
//!         println!("Code: {}", e.code());
//!         if let Some(help) = e.help() {
//!             println!("Help: {}", help);
//!         }
//!     }
//!     Ok(value) => println!("= {value}"),
//! }
//! ```

use nom::error::{ErrorKind, ParseError as NomParseError};
use std::num::ParseFloatError;

/// Custom error type for parsing operations
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Empty expression")]
    EmptyExpression,

    #[error("Unexpected \"{rest}\" after expression \"{parsed}\"")]
    TrailingInput { parsed: String, rest: String },

    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] ParseFloatError),

    #[error("Identifier '{name}' has no value")]
    UnboundIdentifier { name: String },

    #[error("Equation \"{fragment}\" has {parts} side(s), expected 2")]
    MalformedEquation { fragment: String, parts: usize },

    #[error("Regex failure: {0}")]
    RegexError(#[from] fancy_regex::Error),

    #[error("Expression evaluated to {value}")]
    NonFiniteResult { value: f64 },

    // nom parser error (lowest level)
    #[error("nom parser error: {0:?}")]
    NomError(ErrorKind),

    #[error("Expression nests deeper than {limit} levels")]
    TooDeep { limit: usize },
}

impl From<ParseFloatError> for Box<ParseError> {
    fn from(e: ParseFloatError) -> Self {
        Box::new(ParseError::InvalidNumber(e))
    }
}

impl From<fancy_regex::Error> for Box<ParseError> {
    fn from(e: fancy_regex::Error) -> Self {
        Box::new(ParseError::RegexError(e))
    }
}

impl<'a> NomParseError<&'a str> for Box<ParseError> {
    fn from_error_kind(_input: &'a str, kind: ErrorKind) -> Self {
        Box::new(ParseError::NomError(kind))
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl ParseError {
    /// Returns the error code for this error variant
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::EmptyExpression => "E001",
            ParseError::TrailingInput { .. } => "E002",
            ParseError::InvalidNumber(_) => "E003",
            ParseError::UnboundIdentifier { .. } => "E004",
            ParseError::MalformedEquation { .. } => "E005",
            ParseError::RegexError(_) => "E006",
            ParseError::NonFiniteResult { .. } => "E007",
            ParseError::NomError(_) => "E008",
            ParseError::TooDeep { .. } => "E009",
        }
    }

    /// Returns a short description of this error type (for documentation)
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ParseError::EmptyExpression => "Empty expression string",
            ParseError::TrailingInput { .. } => "Expression followed by unparsed text",
            ParseError::InvalidNumber(_) => "Numeric literal could not be parsed",
            ParseError::UnboundIdentifier { .. } => "Identifier in a pure arithmetic expression",
            ParseError::MalformedEquation { .. } => "Fragment does not split into two sides",
            ParseError::RegexError(_) => "Regex engine failure",
            ParseError::NonFiniteResult { .. } => "Evaluation produced NaN or infinity",
            ParseError::NomError(_) => "Low-level nom parser error",
            ParseError::TooDeep { .. } => "Expression nested beyond the parser's budget",
        }
    }

    /// Returns detailed explanation of this error type (for documentation)
    #[must_use]
    pub fn details(&self) -> &'static str {
        match self {
            ParseError::EmptyExpression => "One side of an equation, or the whole arithmetic query, was empty after trimming whitespace.",
            ParseError::TrailingInput { .. } => "A prefix of the text parsed as an expression but the rest did not. Word problems hit this constantly (\"Solve for x: 2x\"); the fragment is skipped.",
            ParseError::InvalidNumber(_) => "A digit sequence matched the number grammar but could not be converted to a 64-bit float.",
            ParseError::UnboundIdentifier { .. } => "Direct evaluation only accepts numbers and operators. Identifiers need the full parse/solve pipeline.",
            ParseError::MalformedEquation { .. } => "An equation candidate contained zero or several '=' signs, so it could not be split into a left and a right side.",
            ParseError::RegexError(_) => "The regex engine gave up on a match (for example, by hitting its backtracking limit). The affected rule is skipped.",
            ParseError::NonFiniteResult { .. } => "The expression is well-formed but its value is not finite, typically after a division by zero.",
            ParseError::NomError(_) => "The expression grammar rejected the input at the token level.",
            ParseError::TooDeep { .. } => "Parentheses, sign chains or exponents were nested too deeply, or an operator chain such as 'x + x + ...' had too many terms. The fragment is skipped.",
        }
    }

    /// Returns a helpful suggestion or example for this error
    #[must_use]
    pub fn help(&self) -> Option<&'static str> {
        match self {
            ParseError::EmptyExpression => Some("Example: use '2x + 5 = 13' or '3 * (4 + 1)'"),
            ParseError::TrailingInput { .. } => Some("Put the equation on its own, e.g. 'x + 1 = 3' rather than 'x + 1 = 3 apples'"),
            ParseError::UnboundIdentifier { .. } => Some("Write an equation with '=' to solve for unknowns"),
            ParseError::MalformedEquation { .. } => Some("State one equation per clause, e.g. 'x + y = 10; 3 y'"),
            ParseError::NonFiniteResult { .. } => Some("Check for division by zero"),
            ParseError::TooDeep { .. } => Some("Split the expression into several shorter equations"),
            _ => None,
        }
    }

    /// Formats the error with code and optional help text
    #[must_use]
    pub fn display_detailed(&self) -> String {
        format_error_with_code_and_help(&self.to_string(), self.code(), self.help())
    }
}

/// Helper function to format error messages with code and optional help text
pub(crate) fn format_error_with_code_and_help(
    base_msg: &str,
    code: &str,
    help: Option<&str>,
) -> String {
    if let Some(help_text) = help {
        format!("{base_msg} ({code})\n{help_text}")
    } else {
        format!("{base_msg} ({code})")
    }
}
