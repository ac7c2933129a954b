//! Generate error code documentation from the error enums.
//!
//! Codes, descriptions, details and help text come straight from the
//! `code()`, `description()`, `details()` and `help()` methods of
//! `ParseError` and `SolveError`.
//!
//! Run with:
//! ```bash
//! cargo run --bin generate_error_docs > docs/ERROR_CODES.md
//! ```

use wordprob::errors::ParseError;
use wordprob::system::SolveError;

/// Prints a documentation section for every error in `$errors`
macro_rules! generate_error_docs {
    ($errors:expr) => {
        for error in $errors {
            println!("### {}: {}\n", error.code(), error.description());
            println!("**Details:** {}\n", error.details());

            if let Some(help_text) = error.help() {
                println!("**How to fix:**");
                println!("```");
                println!("{help_text}");
                println!("```\n");
            }

            println!("**Example error message:**");
            println!("```");
            println!("{error}");
            println!("```\n");

            println!("**Detailed format:**");
            println!("```");
            println!("{}", error.display_detailed());
            println!("```\n");

            println!("---\n");
        }
    };
}

/// One example of every `ParseError` variant
fn all_parse_error_variants() -> Vec<ParseError> {
    let mut errors = vec![
        ParseError::EmptyExpression,
        ParseError::TrailingInput {
            parsed: "Solve for x".to_string(),
            rest: ": 2x + 5".to_string(),
        },
    ];
    if let Err(e) = "1.2.3".parse::<f64>() {
        errors.push(ParseError::InvalidNumber(e));
    }
    errors.push(ParseError::UnboundIdentifier { name: "x".to_string() });
    errors.push(ParseError::MalformedEquation { fragment: "a = b = c".to_string(), parts: 3 });
    if let Err(e) = fancy_regex::Regex::new("(?P<invalid") {
        errors.push(ParseError::RegexError(e));
    }
    errors.push(ParseError::NonFiniteResult { value: f64::INFINITY });
    errors.push(ParseError::NomError(nom::error::ErrorKind::Char));
    errors.push(ParseError::TooDeep { limit: wordprob::parser::expr::MAX_NESTING });
    errors
}

/// One example of every `SolveError` variant
fn all_solve_error_variants() -> Vec<SolveError> {
    vec![
        SolveError::Inconsistent { index: 2, residual: -1.0 },
        SolveError::Singular { free: 2 },
        SolveError::NoConvergence { iterations: 200, residual: 1.0 },
        SolveError::NonFinite,
    ]
}

fn main() {
    println!("# Error Code Reference\n");
    println!("**This document is auto-generated from the source code. Do not edit manually.**\n");

    println!("## Table of Contents\n");
    println!("- [Parse Errors (E001-E009)](#parse-errors)");
    println!("- [Solve Errors (S001-S004)](#solve-errors)");
    println!("- [How to Use Error Codes](#how-to-use-error-codes)\n");

    println!("## Parse Errors\n");
    println!("Raised while parsing expressions and equation fragments. During `parse_problem` they only show up in debug logs; `arithmetic::evaluate` and `ProblemBuilder::build` return them.\n");
    generate_error_docs!(all_parse_error_variants());

    println!("## Solve Errors\n");
    println!("Raised by the numeric backend. `solve_problem` reports them as an `Error solving equations: ...` step.\n");
    generate_error_docs!(all_solve_error_variants());

    println!("\n## How to Use Error Codes\n");
    println!("When you see an error like:\n");
    println!("```");
    println!("{}", ParseError::EmptyExpression.display_detailed());
    println!("```\n");
    println!("1. Note the error code (e.g., `E001`)");
    println!("2. Look it up in this document for detailed explanation");
    println!("3. Follow the suggested resolution steps\n");
}
