//! Missing-value resolution for raw sensor tables.
//!
//! Cleaning runs in four steps:
//! 1. sentinel and non-finite readings become missing
//! 2. rows missing too many channels are dropped
//! 3. interior gaps are linearly interpolated by row order
//! 4. leading/trailing gaps get the channel median of the remaining rows

use crate::analysis::statistics::median;
use crate::error::{invalid, AnalysisError};
use crate::settings::{EngineSettings, DEFAULT_MAX_MISSING_FRACTION, DEFAULT_SENTINEL};
use crate::table::{Channel, CleanedTable, MeasurementTable, RowKey, CHANNEL_COUNT};

/// Counts describing what a cleaning pass did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleaningReport {
    /// Missing channel values after sentinel normalization
    pub missing_before: usize,
    /// Missing channel values in the output (always 0)
    pub missing_after: usize,
    pub rows_dropped: usize,
    pub rows_remaining: usize,
    /// Values filled by linear interpolation
    pub interpolated: usize,
    /// Values filled with the channel median
    pub median_filled: usize,
}

/// Turns a raw [`MeasurementTable`] into a gap-free [`CleanedTable`]
#[derive(Clone, Debug, PartialEq)]
pub struct Cleaner {
    /// Raw value meaning "no reading"
    pub sentinel: f64,
    /// A row is dropped when more than this fraction of channels is missing
    pub max_missing_fraction: f64,
}

impl Default for Cleaner {
    fn default() -> Self {
        Self {
            sentinel: DEFAULT_SENTINEL,
            max_missing_fraction: DEFAULT_MAX_MISSING_FRACTION,
        }
    }
}

impl Cleaner {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            sentinel: settings.sentinel_value,
            max_missing_fraction: settings.max_missing_fraction,
        }
    }

    /// Clean a table, discarding the report
    pub fn clean(&self, table: &MeasurementTable) -> Result<CleanedTable, AnalysisError> {
        self.clean_with_report(table).map(|(cleaned, _)| cleaned)
    }

    /// Clean a table and report what was changed
    pub fn clean_with_report(
        &self,
        table: &MeasurementTable,
    ) -> Result<(CleanedTable, CleaningReport), AnalysisError> {
        if !(0.0..=1.0).contains(&self.max_missing_fraction) {
            return Err(invalid(format!(
                "max_missing_fraction must be within [0, 1], got {}",
                self.max_missing_fraction
            )));
        }

        let mut report = CleaningReport::default();
        let max_missing = self.max_missing_fraction * CHANNEL_COUNT as f64;

        // Steps 1 and 2: normalize, then keep rows with few enough gaps
        let mut keys: Vec<RowKey> = Vec::with_capacity(table.len());
        let mut columns: [Vec<Option<f64>>; CHANNEL_COUNT] =
            std::array::from_fn(|_| Vec::with_capacity(table.len()));

        for row in table.rows() {
            let values = row.values.map(|v| self.normalize(v));
            let missing = values.iter().filter(|v| v.is_none()).count();
            report.missing_before += missing;

            if missing as f64 > max_missing {
                report.rows_dropped += 1;
                continue;
            }

            keys.push(row.key());
            for (column, value) in columns.iter_mut().zip(values) {
                column.push(value);
            }
        }

        // Steps 3 and 4, per channel
        let mut filled: [Vec<f64>; CHANNEL_COUNT] = Default::default();
        for channel in Channel::ALL {
            let column = &mut columns[channel.index()];
            report.interpolated += interpolate_gaps(column);
            let (values, median_filled) = fill_with_median(channel, column)?;
            report.median_filled += median_filled;
            filled[channel.index()] = values;
        }

        report.rows_remaining = keys.len();
        let cleaned = CleanedTable::from_parts(keys, filled)?;

        tracing::info!(
            "Data cleaned: {} missing before, {} after, {} rows dropped, {} rows remaining",
            report.missing_before,
            report.missing_after,
            report.rows_dropped,
            report.rows_remaining
        );

        Ok((cleaned, report))
    }

    fn normalize(&self, value: Option<f64>) -> Option<f64> {
        value.filter(|v| v.is_finite() && *v != self.sentinel)
    }
}

/// Fill interior gaps by linear interpolation between the nearest present
/// neighbours. Returns the number of values filled.
pub fn interpolate_gaps(values: &mut [Option<f64>]) -> usize {
    let mut filled = 0;
    let mut prev: Option<(usize, f64)> = None;

    for i in 0..values.len() {
        let Some(current) = values[i] else {
            continue;
        };

        if let Some((start, start_value)) = prev {
            let span = (i - start) as f64;
            for (offset, slot) in values[start + 1..i].iter_mut().enumerate() {
                let t = (offset + 1) as f64 / span;
                *slot = Some(start_value + (current - start_value) * t);
                filled += 1;
            }
        }
        prev = Some((i, current));
    }

    filled
}

/// Replace remaining gaps with the median of the present values
fn fill_with_median(
    channel: Channel,
    values: &[Option<f64>],
) -> Result<(Vec<f64>, usize), AnalysisError> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let gaps = values.len() - present.len();

    if gaps == 0 {
        return Ok((present, 0));
    }

    let Some(fill) = median(&present) else {
        tracing::warn!("Channel '{}' has no readings to fill gaps from", channel);
        return Err(AnalysisError::InsufficientData {
            needed: 1,
            got: 0,
        });
    };

    let values = values.iter().map(|v| v.unwrap_or(fill)).collect();
    Ok((values, gaps))
}
