//! Statistical building blocks.
//!
//! Descriptive statistics, quantiles and ranking shared by the cleaner, the
//! outlier filters and the correlation engine.

use crate::table::{Channel, CleanedTable};

/// Container for descriptive statistics
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub stdev: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
    pub range: f64,
    pub cv: f64, // Coefficient of variation (%)
}

/// Compute descriptive statistics for a dataset
pub fn compute_descriptive_stats(data: &[f64]) -> DescriptiveStats {
    if data.is_empty() {
        return DescriptiveStats::default();
    }

    let n = data.len();
    let mean = mean(data);
    let stdev = sample_std(data);

    let mut sorted = data.to_vec();
    sort_values(&mut sorted);

    let min = sorted[0];
    let max = sorted[n - 1];

    // Coefficient of variation
    let cv = if mean.abs() > f64::EPSILON {
        (stdev / mean.abs()) * 100.0
    } else {
        0.0
    };

    DescriptiveStats {
        count: n,
        mean,
        median: quantile_sorted(&sorted, 0.5),
        stdev,
        min,
        max,
        q1: quantile_sorted(&sorted, 0.25),
        q3: quantile_sorted(&sorted, 0.75),
        range: max - min,
        cv,
    }
}

/// Descriptive statistics for every channel of a cleaned table
pub fn summary_statistics(table: &CleanedTable) -> Vec<(Channel, DescriptiveStats)> {
    Channel::ALL
        .iter()
        .map(|&c| (c, compute_descriptive_stats(table.series(c))))
        .collect()
}

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Sample standard deviation (n - 1 denominator)
pub fn sample_std(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
    variance.sqrt()
}

/// Median of the values, `None` when empty
pub fn median(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    let mut sorted = data.to_vec();
    sort_values(&mut sorted);
    Some(quantile_sorted(&sorted, 0.5))
}

/// Quantile with linear interpolation between closest ranks
pub fn quantile(data: &[f64], q: f64) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    let mut sorted = data.to_vec();
    sort_values(&mut sorted);
    Some(quantile_sorted(&sorted, q))
}

/// Quantile of already sorted, non-empty data
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

fn sort_values(values: &mut [f64]) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
}

/// True when every value equals the first (or there are none)
pub fn is_constant(data: &[f64]) -> bool {
    data.iter().all(|&v| v == data[0])
}

/// Pearson correlation coefficient.
///
/// Returns 0.0 when either input is constant. Rescaling either input
/// leaves the coefficient unchanged.
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 || is_constant(x) || is_constant(y) {
        return 0.0;
    }

    let mean_x = mean(x);
    let mean_y = mean(y);

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;

    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    // Separate roots keep tiny variances from underflowing in the product
    let denom = var_x.sqrt() * var_y.sqrt();
    if denom > 0.0 {
        (cov / denom).clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Fractional ranks (1-based), ties get the average of their ranks
pub fn average_ranks(data: &[f64]) -> Vec<f64> {
    let n = data.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        data[a]
            .partial_cmp(&data[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && data[order[j + 1]] == data[order[i]] {
            j += 1;
        }
        // Positions i..=j share the mean of ranks i+1..=j+1
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}
