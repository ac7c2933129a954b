//! Extraction rules: the ordered heuristics that turn free text into model parts.
//!
//! Every rule is a value with a name, a priority and a conflict policy, so it
//! can be inspected and tested on its own:
//!
//! | rule          | priority | proposes                                      |
//! |---------------|----------|-----------------------------------------------|
//! | `whole-text`  | 0        | the full text, if it has exactly one `=`      |
//! | `equation`    | 1        | arithmetic runs containing `=`                |
//! | `inequality`  | 2        | arithmetic runs with comparison operators     |
//! | `expression`  | 3        | arithmetic runs without comparison operators  |
//!
//! Candidates are only turned into equations when they split on `=` into two
//! parseable sides, so the `expression` template never contributes on its own.
//! Newlines end a template match: one clause per line.

use std::sync::LazyLock;

use fancy_regex::Regex;
use log::{debug, warn};

use crate::expr::Equation;
use crate::interner::SymbolTable;

use super::expr::parse_equation;

/// Words never treated as variables (compared case-insensitively).
pub const STOP_WORDS: [&str; 8] = ["the", "and", "or", "in", "on", "at", "to", "for"];

#[must_use]
pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.iter().any(|w| w.eq_ignore_ascii_case(token))
}

/// Identifier-like word tokens.
pub(crate) static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z][a-zA-Z0-9]*\b").unwrap());

/// `<number> <identifier>` adjacency, e.g. `100 meters`.
pub(crate) static KNOWN_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s+([a-zA-Z][a-zA-Z0-9]*)").unwrap());

/// What to do when a rule produces something already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Keep the first occurrence; structurally identical later ones are dropped.
    SkipDuplicate,
    /// A later binding for the same key replaces the earlier value.
    LastWins,
}

/// How a rule finds its candidate fragments.
enum Matcher {
    WholeText,
    Template(Regex),
}

/// One equation extraction rule.
pub struct EquationRule {
    pub name: &'static str,
    pub priority: u8,
    pub policy: ConflictPolicy,
    matcher: Matcher,
}

impl EquationRule {
    fn template(name: &'static str, priority: u8, pattern: &str) -> Self {
        EquationRule {
            name,
            priority,
            policy: ConflictPolicy::SkipDuplicate,
            matcher: Matcher::Template(Regex::new(pattern).unwrap()),
        }
    }

    /// Fragments this rule proposes as equations, in text order.
    ///
    /// Only fragments containing `=` are proposed.
    pub fn candidates<'t>(&self, text: &'t str) -> Vec<&'t str> {
        match &self.matcher {
            Matcher::WholeText => {
                if text.split('=').count() == 2 {
                    vec![text]
                } else {
                    Vec::new()
                }
            }
            Matcher::Template(re) => {
                let mut out = Vec::new();
                for m in re.find_iter(text) {
                    match m {
                        Ok(m) if m.as_str().contains('=') => out.push(m.as_str()),
                        Ok(_) => {}
                        Err(e) => {
                            // the engine gave up (backtrack limit); keep what we have
                            warn!("rule '{}' stopped scanning: {e}", self.name);
                            break;
                        }
                    }
                }
                out
            }
        }
    }
}

/// Equation rules, in application order.
pub static EQUATION_RULES: LazyLock<Vec<EquationRule>> = LazyLock::new(|| {
    let mut rules = vec![
        EquationRule {
            name: "whole-text",
            priority: 0,
            policy: ConflictPolicy::SkipDuplicate,
            matcher: Matcher::WholeText,
        },
        EquationRule::template("equation", 1, r"(?:[\w \t+\-*/=()^]|\.(?=\d))+"),
        EquationRule::template("inequality", 2, r"(?:[\w \t+\-*/=<>≤≥()^]|\.(?=\d))+"),
        EquationRule::template("expression", 3, r"(?:[\w \t+\-*/()^]|\.(?=\d))+"),
    ];
    rules.sort_by_key(|r| r.priority);
    rules
});

/// Applies every equation rule to `text`, concatenating results in rule order.
///
/// Identifiers of accepted equations are interned into `symbols`. Fragments
/// that fail to parse are skipped.
pub fn extract_equations(text: &str, symbols: &mut SymbolTable) -> Vec<Equation> {
    let mut equations: Vec<Equation> = Vec::new();

    for rule in EQUATION_RULES.iter() {
        for fragment in rule.candidates(text) {
            match parse_equation(fragment, symbols) {
                Ok(mut eq) => {
                    eq.rule = rule.name;
                    let duplicate = equations.iter().any(|e| e.same_constraint(&eq));
                    if duplicate && rule.policy == ConflictPolicy::SkipDuplicate {
                        debug!(
                            "rule '{}': duplicate equation \"{}\" skipped",
                            rule.name, eq.source
                        );
                        continue;
                    }
                    debug!("rule '{}': accepted \"{}\"", rule.name, eq.source);
                    equations.push(eq);
                }
                Err(e) => {
                    debug!("rule '{}': skipped \"{}\": {e}", rule.name, fragment.trim());
                }
            }
        }
    }

    equations
}

/// Distinct identifier tokens, minus stop words, in first-seen order.
pub fn extract_tokens(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for m in TOKEN_RE.find_iter(text) {
        let token = match m {
            Ok(m) => m.as_str(),
            Err(e) => {
                warn!("token scan stopped: {e}");
                break;
            }
        };
        if is_stop_word(token) {
            continue;
        }
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// `<number> <identifier>` bindings, in first-seen order of the identifier.
///
/// Policy is [`ConflictPolicy::LastWins`]: a repeated identifier keeps its
/// first position but takes the last value.
pub fn extract_known_values(text: &str) -> Vec<(String, f64)> {
    let mut known: Vec<(String, f64)> = Vec::new();
    for caps in KNOWN_VALUE_RE.captures_iter(text) {
        let caps = match caps {
            Ok(caps) => caps,
            Err(e) => {
                warn!("known-value scan stopped: {e}");
                break;
            }
        };
        let (Some(number), Some(name)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let Ok(value) = number.as_str().parse::<f64>() else {
            continue;
        };
        let name = name.as_str();
        match known.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => known.push((name.to_string(), value)),
        }
    }
    known
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str) -> &'static EquationRule {
        EQUATION_RULES.iter().find(|r| r.name == name).unwrap()
    }

    #[test]
    fn test_rules_are_ordered_by_priority() {
        let names: Vec<&str> = EQUATION_RULES.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["whole-text", "equation", "inequality", "expression"]);
    }

    #[test]
    fn test_whole_text_requires_exactly_one_equals() {
        let r = rule("whole-text");
        assert_eq!(r.candidates("x = 1"), vec!["x = 1"]);
        assert!(r.candidates("x = 1 = 2").is_empty());
        assert!(r.candidates("x + 1").is_empty());
    }

    #[test]
    fn test_equation_template_stops_at_punctuation() {
        let r = rule("equation");
        assert_eq!(r.candidates("Solve for x: 2x + 5 = 13"), vec![" 2x + 5 = 13"]);
    }

    #[test]
    fn test_equation_template_keeps_decimals_but_not_full_stops() {
        let r = rule("equation");
        assert_eq!(r.candidates("Given 2.5x = 5. Find x"), vec!["Given 2.5x = 5"]);
    }

    #[test]
    fn test_equation_template_splits_lines() {
        let r = rule("equation");
        assert_eq!(r.candidates("x + y = 10\ny = 3"), vec!["x + y = 10", "y = 3"]);
    }

    #[test]
    fn test_inequality_template_includes_comparisons() {
        let r = rule("inequality");
        assert_eq!(r.candidates("so x <= 4 holds"), vec!["so x <= 4 holds"]);
    }

    #[test]
    fn test_expression_template_never_proposes() {
        let r = rule("expression");
        assert!(r.candidates("2x + 5 = 13").is_empty());
    }

    #[test]
    fn test_extract_equations_deduplicates() {
        let mut symbols = SymbolTable::new();
        let eqs = extract_equations("Solve for x: 2x + 5 = 13", &mut symbols);
        assert_eq!(eqs.len(), 1);
        assert_eq!(eqs[0].rule, "equation");
        assert_eq!(eqs[0].display(&symbols), "2*x + 5 = 13");
    }

    #[test]
    fn test_extract_equations_whole_text_wins_first() {
        let mut symbols = SymbolTable::new();
        let eqs = extract_equations("x + 1 = 3", &mut symbols);
        assert_eq!(eqs.len(), 1);
        assert_eq!(eqs[0].rule, "whole-text");
    }

    #[test]
    fn test_extract_equations_skips_inequalities() {
        let mut symbols = SymbolTable::new();
        assert!(extract_equations("x <= 4", &mut symbols).is_empty());
        assert!(symbols.is_empty());
    }

    #[test]
    fn test_extract_tokens_filters_stop_words_case_insensitively() {
        let tokens = extract_tokens("The car and THE driver went to town");
        assert_eq!(tokens, vec!["car", "driver", "went", "town"]);
    }

    #[test]
    fn test_is_stop_word() {
        assert!(is_stop_word("FOR"));
        assert!(is_stop_word("in"));
        assert!(!is_stop_word("inch"));
    }

    #[test]
    fn test_extract_tokens_dedupes_and_is_case_sensitive() {
        let tokens = extract_tokens("x X x y");
        assert_eq!(tokens, vec!["x", "X", "y"]);
    }

    #[test]
    fn test_extract_tokens_ignores_glued_digits() {
        // no word boundary between 2 and x
        assert_eq!(extract_tokens("2x + 5"), Vec::<String>::new());
        assert_eq!(extract_tokens("v2 = 3"), vec!["v2"]);
    }

    #[test]
    fn test_known_values_require_whitespace() {
        let known = extract_known_values("A car travels 100 meters in 10 seconds");
        assert_eq!(known, vec![("meters".to_string(), 100.0), ("seconds".to_string(), 10.0)]);
        assert!(extract_known_values("2x + 5 = 13").is_empty());
    }

    #[test]
    fn test_known_values_last_wins() {
        let known = extract_known_values("3 y then 4.5 z then 7 y");
        assert_eq!(known, vec![("y".to_string(), 7.0), ("z".to_string(), 4.5)]);
    }
}
