//! Physics keyword classification and unit tagging.
//!
//! Both the parser (MATH vs PHYSICS) and the solver (problem type) classify
//! with the same ordered keyword table. Matching is a case-insensitive
//! substring search and the first matching group wins; there is no scoring,
//! so `power` always lands in `energy` before `electricity` is tried.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use fancy_regex::Regex;
use log::warn;
use serde::Serialize;

/// Physics sub-domain of a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemType {
    Kinematics,
    Dynamics,
    Energy,
    Electricity,
    /// No keyword group matched.
    #[serde(rename = "none")]
    Unclassified,
}

impl ProblemType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProblemType::Kinematics => "kinematics",
            ProblemType::Dynamics => "dynamics",
            ProblemType::Energy => "energy",
            ProblemType::Electricity => "electricity",
            ProblemType::Unclassified => "none",
        }
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered keyword groups. Order matters: `acceleration` and `power` appear twice.
pub static KEYWORD_GROUPS: LazyLock<Vec<(ProblemType, Regex)>> = LazyLock::new(|| {
    [
        (ProblemType::Kinematics, r"(?i)(velocity|speed|acceleration|distance|time|displacement)"),
        (ProblemType::Dynamics, r"(?i)(force|mass|acceleration|weight|friction)"),
        (ProblemType::Energy, r"(?i)(energy|work|power|kinetic|potential)"),
        (ProblemType::Electricity, r"(?i)(current|voltage|resistance|power|circuit)"),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).unwrap()))
    .collect()
});

/// `<number> <identifier> <unit>`; the identifier may give up its tail to the unit.
static UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*([a-zA-Z][a-zA-Z0-9]*)\s*(m|s|kg|N|J|W|V|A|Ω)").unwrap()
});

/// First keyword group found in `text`, or [`ProblemType::Unclassified`].
#[must_use]
pub fn classify(text: &str) -> ProblemType {
    for (kind, re) in KEYWORD_GROUPS.iter() {
        match re.is_match(text) {
            Ok(true) => return *kind,
            Ok(false) => {}
            Err(e) => warn!("keyword group '{kind}' failed on input: {e}"),
        }
    }
    ProblemType::Unclassified
}

/// Extra information attached to solutions of physics problems.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhysicsAnalysis {
    pub problem_type: ProblemType,
    /// identifier -> unit symbol
    pub units: BTreeMap<String, String>,
}

/// Classifies `text` and tags units. The last tag for an identifier wins.
#[must_use]
pub fn analyze(text: &str) -> PhysicsAnalysis {
    let mut units = BTreeMap::new();
    for caps in UNIT_RE.captures_iter(text) {
        let caps = match caps {
            Ok(caps) => caps,
            Err(e) => {
                warn!("unit scan stopped: {e}");
                break;
            }
        };
        if let (Some(name), Some(unit)) = (caps.get(2), caps.get(3)) {
            units.insert(name.as_str().to_string(), unit.as_str().to_string());
        }
    }

    PhysicsAnalysis { problem_type: classify(text), units }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_first_group_wins() {
        assert_eq!(classify("What is its velocity?"), ProblemType::Kinematics);
        // acceleration is listed under kinematics first
        assert_eq!(classify("force and acceleration"), ProblemType::Kinematics);
        // power is listed under energy first
        assert_eq!(classify("power in a circuit"), ProblemType::Energy);
        assert_eq!(classify("the circuit current"), ProblemType::Electricity);
        assert_eq!(classify("friction on a block"), ProblemType::Dynamics);
    }

    #[test]
    fn test_classify_is_case_insensitive_substring() {
        assert_eq!(classify("VELOCITY"), ProblemType::Kinematics);
        // "sometimes" contains "time"
        assert_eq!(classify("sometimes"), ProblemType::Kinematics);
        assert_eq!(classify("Describe gravity."), ProblemType::Unclassified);
    }

    #[test]
    fn test_units_backtrack_into_identifier() {
        let analysis = analyze("A car travels 100 meters in 10 seconds. What is its velocity?");
        assert_eq!(analysis.problem_type, ProblemType::Kinematics);
        assert_eq!(analysis.units.get("meter").map(String::as_str), Some("s"));
        assert_eq!(analysis.units.get("second").map(String::as_str), Some("s"));
    }

    #[test]
    fn test_units_with_space_before_symbol() {
        let analysis = analyze("a mass 5 block kg");
        assert_eq!(analysis.units.get("block").map(String::as_str), Some("kg"));
    }

    #[test]
    fn test_problem_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ProblemType::Energy).unwrap(), "\"energy\"");
        assert_eq!(serde_json::to_string(&ProblemType::Unclassified).unwrap(), "\"none\"");
        assert_eq!(ProblemType::Unclassified.to_string(), "none");
    }
}
