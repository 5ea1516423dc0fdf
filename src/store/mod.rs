//! Persistence boundary for measurements and analysis results.
//!
//! The analysis stages never talk to a database directly; they hand plain
//! rows to an [`AnalysisStore`]. Result writes replace everything previously
//! stored under the same key (method tag or channel name) atomically.

pub mod sqlite;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::correlation::{CorrelationMethod, CorrelationPair};
use crate::analysis::spectral::SpectralSummary;
use crate::table::{Channel, Measurement, MeasurementTable};

pub use sqlite::SqliteStore;

/// Errors raised by a store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid stored row: {0}")]
    InvalidRow(String),
}

/// One stored correlation coefficient
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationRow {
    pub variable1: String,
    pub variable2: String,
    pub coefficient: f64,
}

impl From<&CorrelationPair> for CorrelationRow {
    fn from(pair: &CorrelationPair) -> Self {
        Self {
            variable1: pair.first.name().to_string(),
            variable2: pair.second.name().to_string(),
            coefficient: pair.coefficient,
        }
    }
}

/// Truncated power spectrum kept alongside the dominant frequency
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectrumSample {
    pub frequencies: Vec<f64>,
    pub power: Vec<f64>,
}

/// One stored spectral result.
///
/// The spectrum sample holds the PSD produced by the engine's configured
/// estimator, which is Welch unless `SpectralEngine::psd_method` is set to
/// the periodogram. It is not the raw FFT periodogram by default.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectralRow {
    /// Absent when the series had no variation
    pub dominant_frequency: Option<f64>,
    pub spectrum: SpectrumSample,
}

impl SpectralRow {
    /// Keep the dominant frequency and the first `cap` PSD bins
    pub fn from_summary(summary: &SpectralSummary, cap: usize) -> Self {
        let bins = summary.spectrum.frequencies.len().min(cap);
        Self {
            dominant_frequency: summary.dominant.as_ref().map(|d| d.frequency),
            spectrum: SpectrumSample {
                frequencies: summary.spectrum.frequencies[..bins].to_vec(),
                power: summary.spectrum.power[..bins].to_vec(),
            },
        }
    }
}

/// Backing storage for the analysis pipeline
pub trait AnalysisStore {
    /// Every stored measurement in insertion order
    fn read_all_measurements(&self) -> Result<MeasurementTable, StoreError>;

    /// Replace the whole measurement table, returns the number of rows written
    fn replace_measurements(&mut self, table: &MeasurementTable) -> Result<usize, StoreError>;

    /// Append one measurement and return its id
    fn insert_measurement(&mut self, row: &Measurement) -> Result<i64, StoreError>;

    /// Returns whether a row was removed
    fn delete_measurement(&mut self, id: i64) -> Result<bool, StoreError>;

    /// Drop every row stored for `method` and write `rows` in their place
    fn replace_correlation_results(
        &mut self,
        method: CorrelationMethod,
        rows: &[CorrelationRow],
    ) -> Result<usize, StoreError>;

    fn read_correlation_results(
        &self,
        method: CorrelationMethod,
    ) -> Result<Vec<CorrelationRow>, StoreError>;

    /// Drop the previous result for `channel` and store `row`
    fn replace_spectral_result(
        &mut self,
        channel: Channel,
        row: &SpectralRow,
    ) -> Result<(), StoreError>;

    fn read_spectral_result(&self, channel: Channel) -> Result<Option<SpectralRow>, StoreError>;
}
