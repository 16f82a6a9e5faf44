//! Error types for Convergir

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown optimizer: {0:?}")]
    UnknownOptimizer(String),

    #[error("Unknown learning-rate decay: {0:?}")]
    UnknownDecay(String),

    #[error("Unknown loss: {0:?}")]
    UnknownLoss(String),

    #[error("Unknown metric: {0:?}")]
    UnknownMetric(String),

    #[error("Unknown initializer: {0:?}")]
    UnknownInitializer(String),

    #[error("Model must be compiled before training")]
    NotCompiled,

    #[error("Loss weights have {got} entries but the objective has {expected} components")]
    LossWeightMismatch { expected: usize, got: usize },

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Session error: {0}")]
    Session(String),

    #[error("No training data: {0}")]
    NoData(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;
