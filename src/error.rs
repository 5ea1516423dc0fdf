//! Error types shared by every analysis stage.

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur during cleaning, filtering, correlation or spectral analysis
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// An operation needing a backing table ran before any table was loaded
    #[error("No data loaded: load measurements before running this operation")]
    NoDataLoaded,

    /// A requested channel is not one of the tracked channels
    #[error("Unknown variable '{name}'. Available: {}", valid.join(", "))]
    UnknownVariable { name: String, valid: Vec<String> },

    /// A filter or spectral parameter violates its precondition
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Not enough data points for the requested analysis
    #[error("Insufficient data: need {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// The result store rejected a read or write
    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

/// Helper to reject parameters before any computation starts
pub fn invalid(msg: impl Into<String>) -> AnalysisError {
    AnalysisError::InvalidParameter(msg.into())
}
