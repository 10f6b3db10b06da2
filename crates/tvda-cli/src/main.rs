//! # tvda CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tvda_cli::score::{run_score, ScoreArgs};
use tvda_cli::simulate::{run_simulate, SimulateArgs};
use tvda_cli::weights::{run_weights, WeightsArgs};

/// TVDA escrow dispute arbitration tooling.
///
/// Scores dispute case files offline, inspects scoring weights, and
/// simulates the time-bounded arbitration workflow.
#[derive(Parser, Debug)]
#[command(name = "tvda", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score a case file and print the ruling.
    Score(ScoreArgs),

    /// Print the active scoring weights, validating an override file.
    Weights(WeightsArgs),

    /// Run a case through the workflow on a simulated clock.
    Simulate(SimulateArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Score(args) => run_score(&args),
        Commands::Weights(args) => run_weights(&args),
        Commands::Simulate(args) => run_simulate(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn cli_parse_score() {
        let cli = Cli::try_parse_from(["tvda", "score", "case.yaml", "--json"]).unwrap();
        if let Commands::Score(args) = cli.command {
            assert_eq!(args.case, PathBuf::from("case.yaml"));
            assert!(args.json);
            assert!(args.weights.is_none());
        } else {
            panic!("expected score");
        }
    }

    #[test]
    fn cli_parse_simulate_defaults() {
        let cli = Cli::try_parse_from(["tvda", "-vv", "simulate", "case.yaml"]).unwrap();
        assert_eq!(cli.verbose, 2);
        if let Commands::Simulate(args) = cli.command {
            assert_eq!(args.step_hours, 6);
            assert_eq!(args.horizon_hours, 96);
        } else {
            panic!("expected simulate");
        }
    }

    #[test]
    fn cli_parse_weights_override() {
        let cli = Cli::try_parse_from(["tvda", "weights", "--weights", "w.yaml"]).unwrap();
        if let Commands::Weights(args) = cli.command {
            assert_eq!(args.weights, Some(PathBuf::from("w.yaml")));
        } else {
            panic!("expected weights");
        }
    }

    #[test]
    fn cli_requires_a_subcommand() {
        assert!(Cli::try_parse_from(["tvda"]).is_err());
    }
}
