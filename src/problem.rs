//! The structured model extracted from a word problem.
//!
//! # Examples
//!
//! ```
//! use wordprob::problem::{parse_problem, ProblemKind};
//!
//! let problem = parse_problem("x + y = 10; 3 y");
//! assert_eq!(problem.kind(), ProblemKind::Math);
//! assert_eq!(problem.equations().len(), 1);
//! assert_eq!(problem.known_value("y"), Some(3.0));
//! assert_eq!(problem.unknown_names(), vec!["x"]);
//! ```

use log::debug;
use serde::Serialize;

use crate::errors::ParseError;
use crate::expr::Equation;
use crate::interner::{SymbolTable, VarId};
use crate::parser::{
    extract_equations, extract_known_values, extract_tokens, is_stop_word, parse_equation,
};
use crate::physics::{self, ProblemType};

/// Coarse problem domain, decided by keyword scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemKind {
    Math,
    Physics,
}

/// A parsed problem. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    text: String,
    kind: ProblemKind,
    symbols: SymbolTable,
    variables: Vec<VarId>,
    equations: Vec<Equation>,
    known_values: Vec<(VarId, f64)>,
    unknowns: Vec<VarId>,
}

impl Problem {
    /// The original input, verbatim.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn kind(&self) -> ProblemKind {
        self.kind
    }

    /// The table naming every handle in this problem.
    #[must_use]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Variables in discovery order.
    #[must_use]
    pub fn variables(&self) -> &[VarId] {
        &self.variables
    }

    #[must_use]
    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    /// Known values in first-seen order.
    #[must_use]
    pub fn known_values(&self) -> &[(VarId, f64)] {
        &self.known_values
    }

    /// Variables without a known value, in discovery order.
    #[must_use]
    pub fn unknowns(&self) -> &[VarId] {
        &self.unknowns
    }

    #[must_use]
    pub fn name(&self, id: VarId) -> &str {
        self.symbols.name(id)
    }

    #[must_use]
    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.iter().map(|id| self.name(*id)).collect()
    }

    #[must_use]
    pub fn unknown_names(&self) -> Vec<&str> {
        self.unknowns.iter().map(|id| self.name(*id)).collect()
    }

    /// Known value bound to `name`, if any.
    #[must_use]
    pub fn known_value(&self, name: &str) -> Option<f64> {
        let id = self.symbols.get(name)?;
        self.known_values.iter().find(|(k, _)| *k == id).map(|(_, v)| *v)
    }
}

/// Builds a problem from text. Never fails; a text with nothing to extract
/// yields a problem with no equations and no variables.
#[must_use]
pub fn parse_problem(text: &str) -> Problem {
    Draft::from_text(text).finish()
}

/// Problem under construction.
struct Draft {
    text: String,
    kind: ProblemKind,
    symbols: SymbolTable,
    variables: Vec<VarId>,
    equations: Vec<Equation>,
    known_values: Vec<(VarId, f64)>,
}

impl Draft {
    fn from_text(text: &str) -> Self {
        let kind = match physics::classify(text) {
            ProblemType::Unclassified => ProblemKind::Math,
            _ => ProblemKind::Physics,
        };

        let mut draft = Draft {
            text: text.to_string(),
            kind,
            symbols: SymbolTable::new(),
            variables: Vec::new(),
            equations: Vec::new(),
            known_values: Vec::new(),
        };

        for token in extract_tokens(text) {
            let id = draft.symbols.intern(token);
            draft.add_variable(id);
        }
        for eq in extract_equations(text, &mut draft.symbols) {
            draft.add_equation(eq);
        }
        for (name, value) in extract_known_values(text) {
            draft.bind(&name, value);
        }

        debug!(
            "parsed {:?} problem: {} variable(s), {} equation(s), {} known value(s)",
            draft.kind,
            draft.variables.len(),
            draft.equations.len(),
            draft.known_values.len()
        );
        draft
    }

    fn add_variable(&mut self, id: VarId) {
        if !self.variables.contains(&id) {
            self.variables.push(id);
        }
    }

    /// Adds an equation; identifiers tokenization missed become variables.
    ///
    /// Stop words stay out of the variables even when an equation uses them,
    /// so the solver reports that equation as unresolved.
    fn add_equation(&mut self, eq: Equation) {
        for id in eq.vars_in_order() {
            if !is_stop_word(self.symbols.name(id)) {
                self.add_variable(id);
            }
        }
        self.equations.push(eq);
    }

    /// Binds a known value; a later binding for the same identifier wins.
    fn bind(&mut self, name: &str, value: f64) {
        let id = self.symbols.intern(name);
        match self.known_values.iter_mut().find(|(k, _)| *k == id) {
            Some(slot) => slot.1 = value,
            None => self.known_values.push((id, value)),
        }
    }

    fn finish(self) -> Problem {
        let unknowns = self
            .variables
            .iter()
            .copied()
            .filter(|id| !self.known_values.iter().any(|(k, _)| k == id))
            .collect();

        Problem {
            text: self.text,
            kind: self.kind,
            symbols: self.symbols,
            variables: self.variables,
            equations: self.equations,
            known_values: self.known_values,
            unknowns,
        }
    }
}

/// Programmatic construction for callers that already hold structured input.
///
/// The text goes through the same extraction as [`parse_problem`]; extra
/// equations and known values are layered on top, and unknowns are derived
/// with the same rule.
///
/// ```
/// use wordprob::problem::ProblemBuilder;
///
/// let problem = ProblemBuilder::new("Find x")
///     .equation("x + y = 10")
///     .known_value("y", 3.0)
///     .build()?;
/// assert_eq!(problem.unknown_names(), vec!["Find", "x"]);
/// # Ok::<(), Box<wordprob::errors::ParseError>>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProblemBuilder {
    text: String,
    kind: Option<ProblemKind>,
    equations: Vec<String>,
    known_values: Vec<(String, f64)>,
}

impl ProblemBuilder {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        ProblemBuilder { text: text.into(), ..Self::default() }
    }

    /// Overrides the keyword classification.
    #[must_use]
    pub fn kind(mut self, kind: ProblemKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Adds an equation such as `"2x + 5 = 13"`.
    #[must_use]
    pub fn equation(mut self, source: impl Into<String>) -> Self {
        self.equations.push(source.into());
        self
    }

    #[must_use]
    pub fn known_value(mut self, name: impl Into<String>, value: f64) -> Self {
        self.known_values.push((name.into(), value));
        self
    }

    /// Builds the problem.
    ///
    /// # Errors
    /// Any [`ParseError`] raised by an explicitly added equation.
    pub fn build(self) -> Result<Problem, Box<ParseError>> {
        let mut draft = Draft::from_text(&self.text);
        if let Some(kind) = self.kind {
            draft.kind = kind;
        }
        for source in &self.equations {
            let eq = parse_equation(source, &mut draft.symbols)?;
            draft.add_equation(eq);
        }
        for (name, value) in &self.known_values {
            draft.bind(name, *value);
        }
        Ok(draft.finish())
    }
}
