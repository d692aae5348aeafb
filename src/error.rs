//! Error types for the online-fdr library.

use thiserror::Error;

/// Main error type for the library.
///
/// Every variant is a deterministic configuration mistake detected before
/// any element of the p-value stream is processed; there are no transient
/// or recoverable errors inside a run.
#[derive(Error, Debug)]
pub enum FdrError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid p-value {value} at index {index}: p-values must lie in [0, 1]")]
    InvalidPValue { index: usize, value: f64 },

    #[error("Invalid weighting sequence: {0}")]
    InvalidWeights(String),

    #[error("Length mismatch for {name}: expected {expected}, got {actual}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, FdrError>;
