use wasm_bindgen::prelude::*;

use crate::errors::ParseError;
use crate::log::init_logger;
use crate::{parse_problem, solve_problem};

/// Structured error information for JavaScript consumers
#[derive(serde::Serialize)]
struct WasmError {
    /// Error code (e.g., "E001", "WASM001")
    code: String,
    /// Display message
    message: String,
    /// Short description of error type
    description: String,
    /// Detailed explanation
    details: String,
    /// Optional helpful suggestion
    #[serde(skip_serializing_if = "Option::is_none")]
    help: Option<String>,
}

impl From<Box<ParseError>> for WasmError {
    fn from(e: Box<ParseError>) -> Self {
        WasmError {
            code: e.code().to_string(),
            message: e.to_string(),
            description: e.description().to_string(),
            details: e.details().to_string(),
            help: e.help().map(str::to_string),
        }
    }
}

impl WasmError {
    fn serialization(e: &serde_wasm_bindgen::Error) -> Self {
        WasmError {
            code: "WASM001".to_string(),
            message: format!("serialization failed: {e}"),
            description: "Failed to serialize result".to_string(),
            details: "The result could not be converted to JavaScript format.".to_string(),
            help: Some("This is an internal error. Please report this issue.".to_string()),
        }
    }
}

impl From<WasmError> for JsValue {
    fn from(e: WasmError) -> Self {
        let mut msg = format!("Error {}: {}", e.code, e.message);

        if !e.details.is_empty() {
            msg.push_str(&format!("\n\n{}", e.details));
        }

        if let Some(help) = e.help {
            msg.push_str(&format!("\n\nSuggestion: {help}"));
        }

        js_sys::Error::new(&msg).into()
    }
}

/// Forces compilation of every `LazyLock<Regex>` so a bad pattern fails at
/// startup rather than on the first query.
///
/// A new `LazyLock<Regex>` must be added here.
fn validate_internal_regexes() {
    let _ = &*crate::parser::rules::TOKEN_RE;
    let _ = &*crate::parser::rules::KNOWN_VALUE_RE;
    let _ = &*crate::parser::EQUATION_RULES;
    let _ = &*crate::physics::KEYWORD_GROUPS;
    crate::physics::analyze("");
    log::debug!("Internal regex patterns validated successfully");
}

/// Initialize logging and validation. Call from JavaScript after the module loads.
#[wasm_bindgen]
pub fn initialize(debug_enabled: bool) {
    console_error_panic_hook::set_once();
    validate_internal_regexes();
    init_logger(debug_enabled);

    log::info!("WASM module initialized");
}

/// JS entry: parses and solves `text`, returning the serialized solution
/// (`{ solution, steps, physics_analysis? }`).
#[wasm_bindgen]
pub fn solve_problem_wasm(text: &str) -> Result<JsValue, JsValue> {
    let solution = solve_problem(&parse_problem(text));
    serde_wasm_bindgen::to_value(&solution).map_err(|e| WasmError::serialization(&e).into())
}

/// JS entry: evaluates pure arithmetic such as `"2+3"`.
#[wasm_bindgen]
pub fn evaluate_wasm(text: &str) -> Result<f64, JsValue> {
    crate::arithmetic::evaluate(text).map_err(|e| WasmError::from(e).into())
}

/// Crate version with the git hash it was built from.
#[wasm_bindgen]
pub fn version() -> String {
    format!("{} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_HASH_FULL"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_regexes_validated() {
        validate_internal_regexes();
    }

    #[test]
    fn test_wasm_error_from_parse_error() {
        let err = WasmError::from(Box::new(ParseError::EmptyExpression));
        assert_eq!(err.code, "E001");
        assert!(err.help.is_some());
    }
}
