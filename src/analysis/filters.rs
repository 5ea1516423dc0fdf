//! Filter bank for cleaned series.
//!
//! Provides smoothing, threshold clipping and outlier suppression. Every
//! filter is stateless: it reads a cleaned series and returns a new one
//! together with the number of values (or rows) it affected.

use super::statistics::{is_constant, mean, quantile, sample_std};
use super::{timed_analyze, AnalysisMetadata};
use crate::error::{invalid, AnalysisError};
use crate::table::{Channel, CleanedTable};

/// Default IQR multiplier
pub const DEFAULT_IQR_K: f64 = 1.5;

/// Default z-score cutoff
pub const DEFAULT_ZSCORE_K: f64 = 3.0;

// ============================================================================
// Parameters
// ============================================================================

/// Inclusive value bounds; either side may be open
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThresholdBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ThresholdBounds {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// Closed interval `[min, max]`
    pub fn between(min: f64, max: f64) -> Self {
        Self::new(Some(min), Some(max))
    }

    /// Check the bounds are usable; `min >= max` is never swapped
    pub fn validate(&self) -> Result<(), AnalysisError> {
        match (self.min, self.max) {
            (None, None) => Err(invalid("threshold filter needs a minimum or a maximum")),
            (Some(v), _) | (_, Some(v)) if v.is_nan() => {
                Err(invalid("threshold bounds must not be NaN"))
            }
            (Some(min), Some(max)) if min >= max => Err(invalid(format!(
                "minimum threshold ({}) must be less than maximum threshold ({})",
                min, max
            ))),
            _ => Ok(()),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    /// Clamp a value to the nearest bound
    pub fn clamp(&self, value: f64) -> f64 {
        let value = self.min.map_or(value, |min| value.max(min));
        self.max.map_or(value, |max| value.min(max))
    }
}

/// How outliers are detected
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OutlierPolicy {
    /// Outside `[Q1 - k*IQR, Q3 + k*IQR]`
    Iqr { k: f64 },
    /// `|x - mean| / std > k`
    ZScore { k: f64 },
}

impl OutlierPolicy {
    pub fn iqr() -> Self {
        OutlierPolicy::Iqr { k: DEFAULT_IQR_K }
    }

    pub fn zscore() -> Self {
        OutlierPolicy::ZScore { k: DEFAULT_ZSCORE_K }
    }

    pub fn k(&self) -> f64 {
        match *self {
            OutlierPolicy::Iqr { k } | OutlierPolicy::ZScore { k } => k,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutlierPolicy::Iqr { .. } => "iqr",
            OutlierPolicy::ZScore { .. } => "zscore",
        }
    }

    fn validate(&self) -> Result<(), AnalysisError> {
        let k = self.k();
        if !k.is_finite() || k <= 0.0 {
            return Err(invalid(format!(
                "{} multiplier must be a positive number, got {}",
                self.name(),
                k
            )));
        }
        Ok(())
    }
}

/// What happens to values flagged as outliers in the series view
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutlierAction {
    /// Drop them (the result is shorter than the input)
    Remove,
    /// Clamp them to the outlier bounds
    Clip,
}

/// Filter applied to produce a result, with its parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FilterKind {
    MovingAverage { window: usize },
    ThresholdClip(ThresholdBounds),
    ThresholdRows(ThresholdBounds),
    Outlier {
        policy: OutlierPolicy,
        action: OutlierAction,
    },
    OutlierRows(OutlierPolicy),
}

impl FilterKind {
    /// Short tag used in derived series names
    pub fn tag(&self) -> String {
        match self {
            FilterKind::MovingAverage { window } => format!("MA{}", window),
            FilterKind::ThresholdClip(_) => "clipped".to_string(),
            FilterKind::ThresholdRows(_) => "threshold".to_string(),
            FilterKind::Outlier { policy, action } => match action {
                OutlierAction::Remove => format!("{} filtered", policy.name()),
                OutlierAction::Clip => format!("{} clipped", policy.name()),
            },
            FilterKind::OutlierRows(policy) => format!("{} rows", policy.name()),
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// A derived series with its provenance
#[derive(Clone, Debug, PartialEq)]
pub struct FilterResult {
    pub channel: Channel,
    pub kind: FilterKind,
    pub values: Vec<f64>,
    /// Values changed (smoothing, clipping) or removed (outlier removal)
    pub affected: usize,
    pub metadata: AnalysisMetadata,
}

impl FilterResult {
    /// Display name, e.g. `temperature (MA5)`
    pub fn name(&self) -> String {
        format!("{} ({})", self.channel, self.kind.tag())
    }
}

/// A reduced table produced by a row-dropping filter
#[derive(Clone, Debug, PartialEq)]
pub struct RowFilterResult {
    pub channel: Channel,
    pub kind: FilterKind,
    pub table: CleanedTable,
    pub removed: usize,
}

/// Output of [`apply_filter`]: a derived series or a reduced table
#[derive(Clone, Debug, PartialEq)]
pub enum FilterOutput {
    Series(FilterResult),
    Rows(RowFilterResult),
}

/// Run any filter on one channel of the table
pub fn apply_filter(
    table: &CleanedTable,
    channel: Channel,
    kind: FilterKind,
) -> Result<FilterOutput, AnalysisError> {
    Ok(match kind {
        FilterKind::MovingAverage { window } => {
            FilterOutput::Series(apply_moving_average(table, channel, window)?)
        }
        FilterKind::ThresholdClip(bounds) => {
            FilterOutput::Series(apply_threshold_clip(table, channel, bounds)?)
        }
        FilterKind::ThresholdRows(bounds) => {
            FilterOutput::Rows(filter_rows_by_threshold(table, channel, bounds)?)
        }
        FilterKind::Outlier { policy, action } => {
            FilterOutput::Series(suppress_outliers(table, channel, policy, action)?)
        }
        FilterKind::OutlierRows(policy) => {
            FilterOutput::Rows(remove_outlier_rows(table, channel, policy)?)
        }
    })
}

// ============================================================================
// Table-level filters
// ============================================================================

/// Centered moving average of one channel
pub fn apply_moving_average(
    table: &CleanedTable,
    channel: Channel,
    window: usize,
) -> Result<FilterResult, AnalysisError> {
    let data = table.series(channel);
    let (values, computation_time) = timed_analyze(|| moving_average(data, window));
    let values = values?;
    let affected = count_changed(data, &values);

    tracing::debug!(
        "Moving average applied on '{}' (window={}): {} values changed",
        channel,
        window,
        affected
    );

    Ok(FilterResult {
        channel,
        kind: FilterKind::MovingAverage { window },
        values,
        affected,
        metadata: AnalysisMetadata {
            computation_time_ms: computation_time,
            ..AnalysisMetadata::new("Centered Moving Average").param("window_size", window)
        },
    })
}

/// Clamp one channel to the given bounds
pub fn apply_threshold_clip(
    table: &CleanedTable,
    channel: Channel,
    bounds: ThresholdBounds,
) -> Result<FilterResult, AnalysisError> {
    let (values, affected) = clip_to_bounds(table.series(channel), bounds)?;

    tracing::debug!("Threshold clip on '{}': {} values clamped", channel, affected);

    Ok(FilterResult {
        channel,
        kind: FilterKind::ThresholdClip(bounds),
        values,
        affected,
        metadata: bounds_metadata("Threshold Clip", bounds),
    })
}

/// Drop every row whose `channel` value falls outside the bounds
pub fn filter_rows_by_threshold(
    table: &CleanedTable,
    channel: Channel,
    bounds: ThresholdBounds,
) -> Result<RowFilterResult, AnalysisError> {
    bounds.validate()?;

    let keep: Vec<bool> = table
        .series(channel)
        .iter()
        .map(|&v| bounds.contains(v))
        .collect();
    let filtered = table.retain_rows(&keep)?;
    let removed = table.len() - filtered.len();

    tracing::debug!(
        "Threshold filter on '{}' (min={:?}, max={:?}): {} records after filtering",
        channel,
        bounds.min,
        bounds.max,
        filtered.len()
    );

    Ok(RowFilterResult {
        channel,
        kind: FilterKind::ThresholdRows(bounds),
        table: filtered,
        removed,
    })
}

/// Suppress outliers in one channel's series view
pub fn suppress_outliers(
    table: &CleanedTable,
    channel: Channel,
    policy: OutlierPolicy,
    action: OutlierAction,
) -> Result<FilterResult, AnalysisError> {
    let data = table.series(channel);
    let bounds = outlier_bounds(data, policy)?;

    let (values, affected) = match action {
        OutlierAction::Remove => {
            let kept: Vec<f64> = data.iter().copied().filter(|&v| bounds.contains(v)).collect();
            let removed = data.len() - kept.len();
            (kept, removed)
        }
        OutlierAction::Clip => clamp_series(data, bounds),
    };

    tracing::debug!(
        "Outliers in '{}' (method={}): {} values affected",
        channel,
        policy.name(),
        affected
    );

    let mut metadata = bounds_metadata("Outlier Suppression", bounds)
        .param("method", policy.name())
        .param("k", policy.k());
    if !data.is_empty() && affected * 10 > data.len() {
        metadata.warnings.push(format!(
            "{} of {} values flagged as outliers",
            affected,
            data.len()
        ));
    }

    Ok(FilterResult {
        channel,
        kind: FilterKind::Outlier { policy, action },
        values,
        affected,
        metadata,
    })
}

/// Drop every row whose `channel` value is an outlier
pub fn remove_outlier_rows(
    table: &CleanedTable,
    channel: Channel,
    policy: OutlierPolicy,
) -> Result<RowFilterResult, AnalysisError> {
    let data = table.series(channel);
    let bounds = outlier_bounds(data, policy)?;

    let keep: Vec<bool> = data.iter().map(|&v| bounds.contains(v)).collect();
    let filtered = table.retain_rows(&keep)?;
    let removed = table.len() - filtered.len();

    tracing::debug!(
        "Outliers removed from '{}' (method={}): {} removed, {} remaining",
        channel,
        policy.name(),
        removed,
        filtered.len()
    );

    Ok(RowFilterResult {
        channel,
        kind: FilterKind::OutlierRows(policy),
        table: filtered,
        removed,
    })
}

fn bounds_metadata(algorithm: &str, bounds: ThresholdBounds) -> AnalysisMetadata {
    let fmt = |b: Option<f64>| b.map_or_else(|| "none".to_string(), |v| format!("{:.4}", v));
    AnalysisMetadata::new(algorithm)
        .param("min", fmt(bounds.min))
        .param("max", fmt(bounds.max))
}

fn count_changed(before: &[f64], after: &[f64]) -> usize {
    before
        .iter()
        .zip(after)
        .filter(|(a, b)| (*a - *b).abs() > f64::EPSILON * a.abs().max(1.0))
        .count()
}

// ============================================================================
// Core filter implementations
// ============================================================================

/// Centered moving average.
///
/// The window at position `i` spans `i - w/2 ..= i + (w - 1 - w/2)`.
/// Positions without a full window take the nearest computed value
/// (back-fill at the start, forward-fill at the end), so the output has the
/// same length as the input and no undefined entries.
pub fn moving_average(data: &[f64], window: usize) -> Result<Vec<f64>, AnalysisError> {
    if window == 0 {
        return Err(invalid("moving average window must be positive"));
    }
    if window > data.len() {
        return Err(invalid(format!(
            "moving average window ({}) exceeds series length ({})",
            window,
            data.len()
        )));
    }

    let n = data.len();
    let left = window / 2;
    let right = window - 1 - left;

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    let mut sum = 0.0;
    for &v in data {
        sum += v;
        prefix.push(sum);
    }

    let first = left;
    let last = n - 1 - right;
    let mut result = vec![0.0; n];
    for i in first..=last {
        result[i] = (prefix[i + right + 1] - prefix[i - left]) / window as f64;
    }

    let head = result[first];
    let tail = result[last];
    result[..first].fill(head);
    result[last + 1..].fill(tail);

    Ok(result)
}

/// Clamp every value into the bounds; returns the clamped series and the
/// number of values that moved
pub fn clip_to_bounds(
    data: &[f64],
    bounds: ThresholdBounds,
) -> Result<(Vec<f64>, usize), AnalysisError> {
    bounds.validate()?;
    Ok(clamp_series(data, bounds))
}

fn clamp_series(data: &[f64], bounds: ThresholdBounds) -> (Vec<f64>, usize) {
    let mut clipped = 0;
    let values = data
        .iter()
        .map(|&v| {
            if bounds.contains(v) {
                v
            } else {
                clipped += 1;
                bounds.clamp(v)
            }
        })
        .collect();

    (values, clipped)
}

/// Inclusive bounds outside which a value counts as an outlier
pub fn outlier_bounds(data: &[f64], policy: OutlierPolicy) -> Result<ThresholdBounds, AnalysisError> {
    policy.validate()?;

    if data.is_empty() {
        return Err(AnalysisError::InsufficientData { needed: 1, got: 0 });
    }

    let bounds = match policy {
        OutlierPolicy::Iqr { k } => {
            let q1 = quantile(data, 0.25).unwrap_or(f64::NAN);
            let q3 = quantile(data, 0.75).unwrap_or(f64::NAN);
            let iqr = q3 - q1;
            ThresholdBounds::between(q1 - k * iqr, q3 + k * iqr)
        }
        OutlierPolicy::ZScore { k } => {
            if is_constant(data) {
                // Nothing deviates
                ThresholdBounds::new(None, None)
            } else {
                let std = sample_std(data);
                let m = mean(data);
                ThresholdBounds::between(m - k * std, m + k * std)
            }
        }
    };

    Ok(bounds)
}

/// Drop outliers from a series; returns the kept values and the number removed
pub fn remove_outliers(
    data: &[f64],
    policy: OutlierPolicy,
) -> Result<(Vec<f64>, usize), AnalysisError> {
    let bounds = outlier_bounds(data, policy)?;
    let kept: Vec<f64> = data.iter().copied().filter(|&v| bounds.contains(v)).collect();
    let removed = data.len() - kept.len();
    Ok((kept, removed))
}
