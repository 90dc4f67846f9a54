// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! The command-line driver: parse the arguments, load the instance and the
//! initial placement, run the engine until the deadline, and write the best
//! placement found. The `--analyze` mode prints instance and solution
//! statistics instead of searching.

use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;

use remach::*;

/// The identifier printed by the `-name` option.
const TEAM_ID: &str = "RM1";
/// Seconds shaved off the time limit to leave room for joining the workers
/// and writing the output.
const TIME_SAFETY_GAP: u64 = 2;
/// The heuristics run when none are requested explicitly.
const DEFAULT_HEURISTIC: &str = "vns3#ls=optimized:ls@maxSamples=10000,simulated_annealing";

const ERROR_READ_INPUT: i32 = -1;
const ERROR_HEURISTIC_PARSE: i32 = -2;
const ERROR_HEURISTIC_INIT: i32 = -3;
const ERROR_HEURISTIC_RUN: i32 = -4;

// `-h` belongs to `--heuristic`, so the automatic help flag is disabled and
// only the long `--help` spelling remains.
#[derive(Parser, Debug)]
#[command(name = "remach", disable_help_flag = true)]
#[command(about = "A parallel neighborhood-search solver for the machine reassignment problem")]
struct Args {
    /// Time limit (in seconds) after which the program terminates. The time
    /// measured is real (wall-clock) time.
    #[arg(short = 't', long = "time-limit")]
    time_limit: Option<u64>,
    /// The path of the problem instance file.
    #[arg(short = 'p', long = "problem-instance")]
    problem_instance: String,
    /// The path to read the initial solution from.
    #[arg(short = 'i', long = "input-solution")]
    input_solution: String,
    /// The path to write the new solution to.
    #[arg(short = 'o', long = "output-solution")]
    output_solution: String,
    /// The seed to use for random number generation.
    #[arg(short = 's', long = "seed", default_value_t = 0)]
    seed: u64,
    /// Output the team identifier. The syntax "-name" is also recognized.
    #[arg(short = 'n', long = "name")]
    name: bool,
    /// The comma-separated list of heuristics to run, each optionally
    /// configured as name#key=value:key=value.
    #[arg(short = 'h', long = "heuristic")]
    heuristic: Option<String>,
    /// Display information about the problem and its solution, then exit.
    #[arg(short = 'a', long = "analyze")]
    analyze: bool,
    /// Print this help message.
    #[arg(long = "help", action = clap::ArgAction::Help)]
    help: Option<bool>,
}

/// The ways the driver can fail to read its inputs.
#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid token '{0}'")]
    Token(String),
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("the solution file holds {got} entries, the instance has {expected} processes")]
    SolutionLength { got: usize, expected: usize },
    #[error("machine index {0} out of range")]
    MachineRange(usize),
}

/// Reads a whitespace-separated vector of unsigned integers from a file.
fn read_values<T: FromStr>(path: &str) -> Result<Vec<T>, Error> {
    let text = std::fs::read_to_string(Path::new(path))?;
    text.split_whitespace()
        .map(|tok| tok.parse().map_err(|_| Error::Token(tok.to_string())))
        .collect()
}

/// Reads an assignment file and checks it against the instance dimensions.
fn read_assignment(path: &str, problem: &Problem) -> Result<Assignment, Error> {
    let assignment: Assignment = read_values(path)?;
    if assignment.len() != problem.process_count() {
        return Err(Error::SolutionLength {
            got: assignment.len(),
            expected: problem.process_count(),
        });
    }
    if let Some(&m) = assignment.iter().find(|&&m| m >= problem.machine_count()) {
        return Err(Error::MachineRange(m));
    }
    Ok(assignment)
}

fn write_assignment(path: &str, solution: &[MachineId]) -> Result<(), Error> {
    let mut text = String::new();
    for &m in solution {
        let _ = write!(text, "{m} ");
    }
    std::fs::write(Path::new(path), text)?;
    Ok(())
}

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    // the deadline is anchored before any parsing or file reading
    let started = Instant::now();

    let mut argv: Vec<String> = std::env::args().collect();
    // the single-dash "-name" spelling, possibly as the only argument
    if argv.len() == 2 && argv[1] == "-name" {
        println!("{TEAM_ID}");
        return 0;
    }
    for arg in argv.iter_mut().skip(1) {
        if arg == "-name" {
            *arg = "--name".to_string();
        }
    }
    let args = match Args::try_parse_from(argv) {
        Ok(args) => args,
        Err(error) => {
            let help = error.kind() == clap::error::ErrorKind::DisplayHelp;
            let _ = error.print();
            return if help { 0 } else { ERROR_READ_INPUT };
        }
    };

    if args.name {
        println!("{TEAM_ID}");
    }
    if args.analyze && (args.time_limit.is_some() || args.heuristic.is_some()) {
        eprintln!(
            "Invalid program options: analyze mode does not support \
             \"time-limit\" and \"heuristic\"."
        );
        return ERROR_READ_INPUT;
    }
    let time_limit = match (args.analyze, args.time_limit) {
        (true, _) => 0,
        (false, Some(limit)) => limit,
        (false, None) => {
            eprintln!("Invalid program options: time limit required.");
            return ERROR_READ_INPUT;
        }
    };

    // load the instance and the initial placement
    let loaded = read_values::<u64>(&args.problem_instance)
        .and_then(|values| Problem::parse(&values).map_err(Error::from))
        .and_then(|problem| {
            let initial = read_assignment(&args.input_solution, &problem)?;
            Ok((Arc::new(problem), Arc::new(initial)))
        });
    let (problem, initial) = match loaded {
        Ok(loaded) => loaded,
        Err(error) => {
            eprintln!("Error while reading input files: {error}");
            return ERROR_READ_INPUT;
        }
    };

    if args.analyze {
        let solution = match read_assignment(&args.output_solution, &problem) {
            Ok(solution) => solution,
            Err(error) => {
                eprintln!("Error while reading input files: {error}");
                return ERROR_READ_INPUT;
            }
        };
        let info = SolutionInfo::from_assignment(problem, initial, solution);
        let stdout = std::io::stdout();
        if let Err(error) = analyze(&info, &mut stdout.lock()) {
            eprintln!("Error while writing the report: {error}");
            return ERROR_READ_INPUT;
        }
        return 0;
    }

    // an initial placement breaking the spread or dependency constraints is
    // not a valid starting point for the search
    {
        let info = SolutionInfo::new(Arc::clone(&problem), Arc::clone(&initial));
        if !structure_feasible(&info) {
            eprintln!("Error while reading input files: the initial solution is infeasible");
            return ERROR_READ_INPUT;
        }
    }

    let deadline =
        started + Duration::from_secs(time_limit.saturating_sub(TIME_SAFETY_GAP).max(1));
    let spec = args.heuristic.as_deref().unwrap_or(DEFAULT_HEURISTIC);
    let mut engine = match Engine::new(Arc::clone(&problem), Arc::clone(&initial), spec, args.seed)
    {
        Ok(engine) => engine,
        Err(error @ EngineError::SpecParse(_)) => {
            eprintln!("{error}");
            return ERROR_HEURISTIC_PARSE;
        }
        Err(error) => {
            eprintln!("{error}");
            return ERROR_HEURISTIC_INIT;
        }
    };

    let outcome = match engine.solve(deadline) {
        Ok(outcome) => outcome,
        Err(error) => {
            eprintln!("{error}");
            return ERROR_HEURISTIC_RUN;
        }
    };

    if let Err(error) = write_assignment(&args.output_solution, outcome.best.solution()) {
        eprintln!("Error while writing the output file: {error}");
        return ERROR_READ_INPUT;
    }

    if !outcome.errors.is_empty() {
        for (name, error) in outcome.errors.iter() {
            eprintln!("Error during the execution of heuristic '{name}': {error}");
        }
        return ERROR_HEURISTIC_RUN;
    }
    0
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_driver {
    use super::*;

    #[test]
    fn assignments_round_trip_through_files() {
        let dir = std::env::temp_dir();
        let path = dir.join("remach_driver_roundtrip.txt");
        let path = path.to_str().unwrap();
        write_assignment(path, &[0, 3, 1, 2]).unwrap();
        let values: Vec<usize> = read_values(path).unwrap();
        assert_eq!(vec![0, 3, 1, 2], values);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        let dir = std::env::temp_dir();
        let path = dir.join("remach_driver_garbage.txt");
        std::fs::write(&path, "1 2 three 4").unwrap();
        let result: Result<Vec<u64>, Error> = read_values(path.to_str().unwrap());
        assert!(matches!(result, Err(Error::Token(_))));
        let _ = std::fs::remove_file(path);
    }
}
