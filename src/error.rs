//! Error taxonomy shared by the decoder and the file glue around it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Dimension mismatch between the model matrices, or a probability that
    /// is negative or not finite.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// Empty observation sequence, or a symbol outside the alphabet.
    #[error("invalid observation: {0}")]
    InvalidObservation(String),

    /// Every state has probability zero of explaining the observations up to
    /// `position`.
    #[error("no feasible state path: every state is unreachable at position {position}")]
    NoFeasiblePath { position: usize },

    #[error("decoding cancelled at position {position}")]
    Cancelled { position: usize },

    #[error("cannot order lattice scores: {0}")]
    Ordering(#[from] ndarray_stats::errors::MinMaxError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("matrix error: {0}")]
    Matrix(#[from] ndarray_csv::ReadError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
