//! sdn-grow CLI
//!
//! ```bash
//! sdn-grow train run.yaml --epochs 10 --output metrics.json
//! sdn-grow validate run.yaml
//! ```

use clap::Parser;
use sdn_grow::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
