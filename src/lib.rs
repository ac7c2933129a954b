// Library API shared by the CLI and wasm builds
pub mod arithmetic;
pub mod errors;
pub mod expr;
pub mod interner;
pub mod log;
pub mod parser;
pub mod physics;
pub mod problem;
pub mod solver;
pub mod system;

// Compile the wasm glue only when targeting wasm32.
#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use problem::{Problem, ProblemBuilder, ProblemKind, parse_problem};
pub use solver::{Solution, solve_problem, solve_problem_with};
