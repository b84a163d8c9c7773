//! Validate command implementation

use crate::cli::logging::log;
use crate::cli::{LogLevel, ValidateArgs};
use crate::config::{load_spec, validate_spec, SdnSpec};

/// Format the run as indented summary lines
pub fn format_spec_info(spec: &SdnSpec) -> String {
    let model = &spec.model;
    let training = &spec.training;
    let mut lines = vec![
        format!(
            "  Model: {} -> {}x{} -> {} classes, up to {} ICs (starts with {} heads)",
            model.input_dim,
            model.num_ics + 1,
            model.hidden_dim,
            model.num_classes,
            model.num_ics,
            model.initial_heads
        ),
        format!(
            "  Optimizer: {} (lr={}, momentum={}, weight_decay={})",
            spec.optimizer.name, spec.optimizer.lr, spec.optimizer.momentum, spec.optimizer.weight_decay
        ),
        format!("  Epochs: {}", training.epochs),
        format!("  Growth: {:?} at {:?}", training.growth, training.epoch_growth),
    ];
    if model.flags.prune {
        lines.push(format!(
            "  Pruning: {} at {:?} (keep_ratio={}, min_ratio={:?})",
            training.prune_type, training.epoch_prune, model.flags.keep_ratio, training.min_ratio
        ));
    }
    lines.join("\n")
}

pub fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    let spec = load_spec(&args.config).map_err(|e| format!("Config error: {e}"))?;
    validate_spec(&spec).map_err(|e| format!("Validation failed: {e}"))?;

    log(
        level,
        LogLevel::Normal,
        &format!("✓ {} is valid", args.config.display()),
    );
    log(level, LogLevel::Verbose, &format_spec_info(&spec));
    Ok(())
}
