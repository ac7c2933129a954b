use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use wordprob::arithmetic::{self, Operation};
use wordprob::system::{DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE, NumericSolver, SolveOptions};
use wordprob::{Solution, parse_problem, solve_problem_with};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

/// Word-problem solver
#[derive(Parser, Debug)]
#[command(author, version = VERSION, about, long_about = None)]
struct Cli {
    /// The problem text (e.g., "Solve for x: 2x + 5 = 13")
    problem: String,

    /// Print the solution record as JSON
    #[arg(long)]
    json: bool,

    /// Iteration cap for nonlinear systems
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// Residual tolerance
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    tolerance: f64,

    /// Enable debug logging (same as setting WORDPROB_DEBUG)
    #[arg(short, long)]
    debug: bool,
}

/// Entry point of the wordprob CLI.
///
/// Delegates to [`try_main`], printing any error before exiting with code 1.
fn main() -> ExitCode {
    let cli = Cli::parse();

    wordprob::log::init_logger(cli.debug || wordprob::log::debug_requested());
    log::info!("Starting wordprob");

    if let Err(e) = try_main(&cli) {
        eprintln!("Error: {e}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Core application logic.
///
/// 1. Route the query: pure arithmetic and `simplify` requests are answered directly.
/// 2. Otherwise parse the text into a problem and solve it.
/// 3. Print the solution (text or JSON) on stdout and timings on stderr.
fn try_main(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !(cli.tolerance.is_finite() && cli.tolerance > 0.0) {
        return Err(format!("tolerance must be a positive number, got {}", cli.tolerance).into());
    }

    let operation = Operation::detect(&cli.problem);
    log::debug!("detected operation: {operation:?}");

    match operation {
        Operation::Evaluate => match arithmetic::evaluate(&cli.problem) {
            Ok(value) => {
                print_direct(cli, "value", &value.to_string())?;
                return Ok(());
            }
            Err(e) => {
                log::debug!(
                    "not plain arithmetic ({}), solving as a word problem",
                    e.display_detailed()
                );
            }
        },
        Operation::Simplify => match arithmetic::simplify(operation.operand(&cli.problem)) {
            Ok(simplified) => {
                print_direct(cli, "simplified", &simplified)?;
                return Ok(());
            }
            Err(e) => {
                log::debug!(
                    "could not simplify ({}), solving as a word problem",
                    e.display_detailed()
                );
            }
        },
        Operation::Solve => {}
    }

    let t_parse = Instant::now();
    let problem = parse_problem(&cli.problem);
    let parse_secs = t_parse.elapsed().as_secs_f64();

    let options = SolveOptions { max_iterations: cli.max_iterations, tolerance: cli.tolerance };
    let backend = NumericSolver::new(options);
    let t_solve = Instant::now();
    let solution = solve_problem_with(&problem, &backend);
    let solve_secs = t_solve.elapsed().as_secs_f64();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&solution)?);
    } else {
        print_solution(&solution);
    }

    eprintln!(
        "Parsed {} equation(s) and {} known value(s) in {:.3}s; solved in {:.3}s.",
        problem.equations().len(),
        problem.known_values().len(),
        parse_secs,
        solve_secs
    );

    Ok(())
}

fn print_direct(cli: &Cli, key: &str, value: &str) -> Result<(), serde_json::Error> {
    if cli.json {
        let mut record = serde_json::Map::new();
        record.insert(key.to_string(), serde_json::Value::String(value.to_string()));
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!("{value}");
    }
    Ok(())
}

fn print_solution(solution: &Solution) {
    println!("Steps:");
    for step in &solution.steps {
        println!("  {step}");
    }

    if !solution.solution.is_empty() {
        println!("Solution:");
        for (name, value) in &solution.solution {
            println!("  {name} = {value}");
        }
    }

    if let Some(analysis) = &solution.physics_analysis {
        println!("Physics ({}):", analysis.problem_type);
        for (name, unit) in &analysis.units {
            println!("  {name}: {unit}");
        }
    }
}
