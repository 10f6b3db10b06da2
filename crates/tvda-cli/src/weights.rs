//! # Weights Subcommand
//!
//! Prints the active scoring weights as YAML. With `--weights`, the file is
//! loaded and validated first, so operators can check an override before
//! pointing `SCORING_WEIGHTS_PATH` at it.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use tvda_arbitration::ScoringWeights;

/// Arguments for `tvda weights`.
#[derive(Args, Debug)]
pub struct WeightsArgs {
    /// Weights YAML to validate; the defaults are printed when absent.
    #[arg(long)]
    pub weights: Option<PathBuf>,
}

/// Resolve the weights and render them as YAML.
pub fn render_weights(args: &WeightsArgs) -> Result<String> {
    let weights = match &args.weights {
        Some(path) => {
            let w = ScoringWeights::load(path)?;
            tracing::info!(path = %path.display(), "weights file is valid");
            w
        }
        None => ScoringWeights::default(),
    };
    Ok(serde_yaml::to_string(&weights)?)
}

/// Execute `tvda weights`.
pub fn run_weights(args: &WeightsArgs) -> Result<u8> {
    print!("{}", render_weights(args)?);
    Ok(0)
}
