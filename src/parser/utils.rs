//! Lexical helpers shared by the expression grammar.

use nom::Parser;
use nom::{
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{opt, recognize},
    sequence::{delimited, pair, preceded},
};

use crate::errors::ParseError;

use super::PResult;

/// Wraps a parser with leading/trailing whitespace skipping.
pub(super) fn ws<'a, O, P>(inner: P) -> impl Parser<&'a str, Output = O, Error = Box<ParseError>>
where
    P: Parser<&'a str, Output = O, Error = Box<ParseError>>,
{
    delimited(multispace0, inner, multispace0)
}

/// Skips leading whitespace only, leaving whatever follows `inner` untouched.
pub(super) fn lead<'a, O, P>(inner: P) -> impl Parser<&'a str, Output = O, Error = Box<ParseError>>
where
    P: Parser<&'a str, Output = O, Error = Box<ParseError>>,
{
    preceded(multispace0, inner)
}

/// Parses a single character token with surrounding whitespace.
pub(super) fn ws_char<'a>(c: char) -> impl Parser<&'a str, Output = char, Error = Box<ParseError>> {
    ws(char(c))
}

/// Parses identifiers (`[A-Za-z][A-Za-z0-9]*`).
pub(super) fn identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic()),
        take_while(|c: char| c.is_ascii_alphanumeric()),
    ))
    .parse(input)
}

/// Parses an unsigned decimal literal (`\d+(\.\d+)?`).
///
/// Exponent notation is not accepted: `2e` in `2energy` must stay a number
/// followed by an identifier.
pub(super) fn number(input: &str) -> PResult<'_, f64> {
    let (rest, digits) = recognize(pair(digit1, opt(pair(char('.'), digit1)))).parse(input)?;
    let value = digits
        .parse::<f64>()
        .map_err(|e| nom::Err::Failure(Box::new(ParseError::InvalidNumber(e))))?;
    Ok((rest, value))
}

/// True if `input` directly continues a factor (`2x`, `3(x+1)`).
///
/// Whitespace breaks juxtaposition: `2 x` and `the x` are not products.
pub(super) fn starts_implicit_factor(input: &str) -> bool {
    input.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '(')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_alpha_start() {
        assert_eq!(identifier("x2 + 1").unwrap(), (" + 1", "x2"));
        assert!(identifier("2x").is_err());
    }

    #[test]
    fn test_number_integer_and_decimal() {
        assert_eq!(number("13").unwrap(), ("", 13.0));
        assert_eq!(number("2.5x").unwrap(), ("x", 2.5));
    }

    #[test]
    fn test_number_stops_before_exponent_letters() {
        assert_eq!(number("2energy").unwrap(), ("energy", 2.0));
    }

    #[test]
    fn test_number_without_fraction_digits() {
        // "3." leaves the period for the caller
        assert_eq!(number("3.").unwrap(), (".", 3.0));
    }

    #[test]
    fn test_ws_char_skips_blanks() {
        let (rest, c) = ws_char('+').parse("  +  y").unwrap();
        assert_eq!(c, '+');
        assert_eq!(rest, "y");
    }

    #[test]
    fn test_lead_keeps_trailing_blanks() {
        let (rest, name) = lead(identifier).parse("  the x").unwrap();
        assert_eq!(name, "the");
        assert_eq!(rest, " x");
    }

    #[test]
    fn test_starts_implicit_factor() {
        assert!(starts_implicit_factor("x"));
        assert!(starts_implicit_factor("(x+1)"));
        assert!(!starts_implicit_factor(" x"));
        assert!(!starts_implicit_factor(" (x+1)"));
        assert!(!starts_implicit_factor(" + x"));
        assert!(!starts_implicit_factor(""));
    }
}
