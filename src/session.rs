//! Working state of one analysis run.
//!
//! The session owns the raw table read from the store and the current
//! cleaned table. Filters return derived values without touching the cleaned
//! table; a caller that wants to keep a filtered table commits it explicitly
//! with [`AnalysisSession::commit_cleaned`].

use crate::analysis::cleaner::{Cleaner, CleaningReport};
use crate::analysis::correlation::{
    self, CorrelationMatrix, CorrelationMethod, CorrelationPair, PairCorrelation,
};
use crate::analysis::filters::{self, FilterKind, FilterOutput};
use crate::analysis::spectral::{
    BandFilter, DominantFrequency, DominantSource, FilteredComparison, FourierSpectrum,
    PowerSpectrum, PsdMethod, SpectralEngine, SpectralSummary,
};
use crate::analysis::statistics::{self, DescriptiveStats};
use crate::error::AnalysisError;
use crate::settings::EngineSettings;
use crate::store::{AnalysisStore, CorrelationRow, SpectralRow};
use crate::table::{Channel, CleanedTable, MeasurementTable};

/// Loaded data plus the engines configured for it
#[derive(Clone, Debug)]
pub struct AnalysisSession {
    cleaner: Cleaner,
    spectral: SpectralEngine,
    spectrum_sample_cap: usize,
    raw: Option<MeasurementTable>,
    cleaned: Option<CleanedTable>,
}

impl AnalysisSession {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            cleaner: Cleaner::from_settings(settings),
            spectral: SpectralEngine::from_settings(settings),
            spectrum_sample_cap: settings.spectrum_sample_cap,
            raw: None,
            cleaned: None,
        }
    }

    pub fn spectral_engine(&self) -> &SpectralEngine {
        &self.spectral
    }

    pub fn spectral_engine_mut(&mut self) -> &mut SpectralEngine {
        &mut self.spectral
    }

    // ------------------------------------------------------------------------
    // Data
    // ------------------------------------------------------------------------

    /// Read every measurement from the store; any cleaned table is discarded
    pub fn load_from_store(&mut self, store: &dyn AnalysisStore) -> Result<usize, AnalysisError> {
        let table = store.read_all_measurements()?;
        Ok(self.load_table(table))
    }

    pub fn load_table(&mut self, table: MeasurementTable) -> usize {
        let rows = table.len();
        self.raw = Some(table);
        self.cleaned = None;
        rows
    }

    pub fn raw(&self) -> Result<&MeasurementTable, AnalysisError> {
        self.raw.as_ref().ok_or(AnalysisError::NoDataLoaded)
    }

    pub fn cleaned(&self) -> Result<&CleanedTable, AnalysisError> {
        self.cleaned.as_ref().ok_or(AnalysisError::NoDataLoaded)
    }

    /// Clean the loaded raw table and make the result current
    pub fn clean(&mut self) -> Result<CleaningReport, AnalysisError> {
        let (cleaned, report) = self.cleaner.clean_with_report(self.raw()?)?;
        self.cleaned = Some(cleaned);
        Ok(report)
    }

    /// Replace the current cleaned table (e.g. with a filtered one)
    pub fn commit_cleaned(&mut self, table: CleanedTable) -> Result<(), AnalysisError> {
        if self.raw.is_none() {
            return Err(AnalysisError::NoDataLoaded);
        }
        tracing::debug!("Committed cleaned table with {} rows", table.len());
        self.cleaned = Some(table);
        Ok(())
    }

    /// Write the current cleaned table back as the stored measurements
    pub fn persist_cleaned(&self, store: &mut dyn AnalysisStore) -> Result<usize, AnalysisError> {
        let rows = self.cleaned()?.to_measurements();
        Ok(store.replace_measurements(&rows)?)
    }

    /// Count, mean, spread and quartiles of every cleaned channel
    pub fn summary_statistics(&self) -> Result<Vec<(Channel, DescriptiveStats)>, AnalysisError> {
        Ok(statistics::summary_statistics(self.cleaned()?))
    }

    // ------------------------------------------------------------------------
    // Filters
    // ------------------------------------------------------------------------

    /// Apply a filter to a channel by column name
    pub fn filter(&self, variable: &str, kind: FilterKind) -> Result<FilterOutput, AnalysisError> {
        let channel = Channel::parse(variable)?;
        filters::apply_filter(self.cleaned()?, channel, kind)
    }

    // ------------------------------------------------------------------------
    // Correlation
    // ------------------------------------------------------------------------

    pub fn correlation_matrix(
        &self,
        method: CorrelationMethod,
    ) -> Result<CorrelationMatrix, AnalysisError> {
        correlation::correlation_matrix(self.cleaned()?, method)
    }

    pub fn correlate_pair(
        &self,
        first: &str,
        second: &str,
        method: CorrelationMethod,
    ) -> Result<PairCorrelation, AnalysisError> {
        let first = Channel::parse(first)?;
        let second = Channel::parse(second)?;
        correlation::correlate_pair(self.cleaned()?, first, second, method)
    }

    pub fn strongest_correlations(
        &self,
        n: usize,
        method: CorrelationMethod,
    ) -> Result<Vec<CorrelationPair>, AnalysisError> {
        correlation::strongest_correlations(self.cleaned()?, n, method)
    }

    /// Compute the matrix and replace the stored rows for `method`
    pub fn store_correlations(
        &self,
        store: &mut dyn AnalysisStore,
        method: CorrelationMethod,
    ) -> Result<usize, AnalysisError> {
        let matrix = self.correlation_matrix(method)?;
        let rows: Vec<CorrelationRow> = matrix.pairs().iter().map(CorrelationRow::from).collect();
        Ok(store.replace_correlation_results(method, &rows)?)
    }

    // ------------------------------------------------------------------------
    // Spectral
    // ------------------------------------------------------------------------

    fn series(&self, variable: &str) -> Result<&[f64], AnalysisError> {
        self.cleaned()?.series_named(variable)
    }

    pub fn fourier(&self, variable: &str) -> Result<FourierSpectrum, AnalysisError> {
        self.spectral.fourier(self.series(variable)?)
    }

    pub fn power_spectrum(
        &self,
        variable: &str,
        method: PsdMethod,
    ) -> Result<PowerSpectrum, AnalysisError> {
        self.spectral.power_spectrum(self.series(variable)?, method)
    }

    pub fn dominant_frequencies(
        &self,
        variable: &str,
        n_peaks: usize,
        source: DominantSource,
    ) -> Result<Vec<DominantFrequency>, AnalysisError> {
        self.spectral
            .dominant_frequencies(self.series(variable)?, n_peaks, source)
    }

    pub fn band_filter(&self, variable: &str, band: BandFilter) -> Result<Vec<f64>, AnalysisError> {
        self.spectral.band_filter(self.series(variable)?, band)
    }

    pub fn compare_filtered(
        &self,
        variable: &str,
        band: BandFilter,
        method: PsdMethod,
    ) -> Result<FilteredComparison, AnalysisError> {
        self.spectral
            .compare_filtered(self.series(variable)?, band, method)
    }

    /// Summarize one channel and replace its stored spectral result
    pub fn store_spectrum(
        &self,
        store: &mut dyn AnalysisStore,
        channel: Channel,
    ) -> Result<SpectralSummary, AnalysisError> {
        let summary = self.spectral.summarize(self.cleaned()?, channel)?;
        let row = SpectralRow::from_summary(&summary, self.spectrum_sample_cap);
        store.replace_spectral_result(channel, &row)?;
        Ok(summary)
    }
}
