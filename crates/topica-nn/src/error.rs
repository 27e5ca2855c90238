//! Error types for topica-nn.

use thiserror::Error;

/// Model and optimizer errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Candle tensor error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// A node type reached the encoder with neither features nor an embedding table.
    #[error("no input for node type {0}")]
    MissingInput(String),

    /// A node type the decoder needs is absent from the encoder output.
    #[error("node type {0} missing from batch")]
    MissingNodeType(String),

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Training error.
    #[error("training error: {0}")]
    Training(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
