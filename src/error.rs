//! Error types for SDN training and evaluation

use thiserror::Error;

/// Errors raised by the training controller, the pruning strategies and
/// the evaluation passes.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Shape mismatch for {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Cannot grow: model already has {num_output} heads (maximum {max})")]
    GrowthExhausted { num_output: usize, max: usize },

    #[error("No best checkpoint was captured: {0}")]
    NoCheckpoint(String),

    #[error("Block {block} cannot be pruned: model has {available} blocks")]
    InvalidBlock { block: usize, available: usize },

    #[error("Unknown parameter id {0} in mask set")]
    UnknownParam(usize),

    #[error("Label {label} out of range for {num_classes} classes")]
    InvalidLabel { label: usize, num_classes: usize },

    #[error("Backward pass requested without a training-mode forward pass")]
    NotTraining,

    #[error("Loader '{0}' yielded no examples")]
    EmptyLoader(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for sdn-grow operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this error comes from user configuration rather than a
    /// failure during training.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::GrowthExhausted { .. }
                | Self::InvalidBlock { .. }
                | Self::ShapeMismatch { .. }
                | Self::Yaml(_)
        )
    }
}
