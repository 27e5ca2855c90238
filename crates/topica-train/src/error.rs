//! Error types for topica-train.

use thiserror::Error;

/// Errors raised while preparing data or training.
#[derive(Debug, Error)]
pub enum Error {
    /// Graph store, split or sampler error.
    #[error(transparent)]
    Data(#[from] topica_core::Error),

    /// Model or optimizer error.
    #[error(transparent)]
    Model(#[from] topica_nn::Error),

    /// Candle tensor error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
