//! Command-line interface
//!
//! ```bash
//! # Train from config
//! sdn-grow train run.yaml
//!
//! # Train with overrides, writing metrics as JSON
//! sdn-grow train run.yaml --epochs 4 --output metrics.json
//!
//! # Validate config
//! sdn-grow validate run.yaml
//! ```

mod commands;
mod logging;

pub use commands::run_command;
pub use logging::{init_tracing, LogLevel};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Growth and saliency pruning for shallow-deep networks
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "sdn-grow")]
#[command(version)]
#[command(about = "Train shallow-deep networks with scheduled IC growth and SNIP pruning")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Train an SDN from a YAML configuration
    Train(TrainArgs),

    /// Validate a configuration file without training
    Validate(ValidateArgs),
}

/// Arguments for the train command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct TrainArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Override number of epochs
    #[arg(short, long)]
    pub epochs: Option<usize>,

    /// Write the metrics record to this JSON file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override the model and data seed
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_train_with_overrides() {
        let cli = Cli::try_parse_from([
            "sdn-grow", "train", "run.yaml", "--epochs", "4", "--output", "m.json", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Train(args) => {
                assert_eq!(args.config, PathBuf::from("run.yaml"));
                assert_eq!(args.epochs, Some(4));
                assert_eq!(args.output, Some(PathBuf::from("m.json")));
                assert_eq!(args.seed, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_validate() {
        let cli = Cli::try_parse_from(["sdn-grow", "validate", "run.yaml", "--quiet"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(cli.command, Command::Validate(_)));
    }

    #[test]
    fn test_missing_config_is_rejected() {
        assert!(Cli::try_parse_from(["sdn-grow", "train"]).is_err());
    }
}
