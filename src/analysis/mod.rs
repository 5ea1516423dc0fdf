//! Analysis algorithms for air-quality sensor logs.
//!
//! Every stage takes its input by reference and returns a new value:
//!
//! - [`cleaner`] turns raw readings into a gap-free [`CleanedTable`]
//! - [`filters`] derives smoothed, clipped or outlier-free series from it
//! - [`correlation`] builds the pairwise correlation matrix and rankings
//! - [`spectral`] decomposes a series into its frequency content, using the
//!   IIR designs in [`butterworth`] for band filtering
//!
//! [`CleanedTable`]: crate::table::CleanedTable

pub mod butterworth;
pub mod cleaner;
pub mod correlation;
pub mod filters;
pub mod spectral;
pub mod statistics;

use std::time::Instant;

use crate::error::AnalysisError;

/// Metadata about an analysis run, kept alongside derived values
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnalysisMetadata {
    /// Algorithm label, e.g. "Spearman correlation"
    pub algorithm: String,
    /// Parameter name/value pairs as displayed
    pub parameters: Vec<(String, String)>,
    /// Degenerate-input notes (constant series, etc.)
    pub warnings: Vec<String>,
    /// Wall-clock milliseconds
    pub computation_time_ms: u64,
}

impl AnalysisMetadata {
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            ..Default::default()
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.parameters.push((key.to_string(), value.to_string()));
        self
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Run `f` and return its result with the elapsed milliseconds
pub fn timed_analyze<F, T>(f: F) -> (T, u64)
where
    F: FnOnce() -> T,
{
    let start = Instant::now();
    let result = f();
    let elapsed = start.elapsed().as_millis() as u64;
    (result, elapsed)
}

/// `InsufficientData` unless `data` holds at least `min_len` points
pub fn require_min_length(data: &[f64], min_len: usize) -> Result<(), AnalysisError> {
    if data.len() < min_len {
        Err(AnalysisError::InsufficientData {
            needed: min_len,
            got: data.len(),
        })
    } else {
        Ok(())
    }
}
