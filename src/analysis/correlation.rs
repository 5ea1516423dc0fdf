//! Pairwise correlation between the tracked channels.
//!
//! Spearman coefficients are Pearson coefficients over average ranks, so
//! ties share a rank. A channel without variance correlates at 0.0 with
//! every other channel.

use std::fmt;

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use super::statistics::{average_ranks, is_constant, pearson_correlation};
use super::{require_min_length, timed_analyze, AnalysisMetadata};
use crate::error::{invalid, AnalysisError};
use crate::table::{Channel, CleanedTable, CHANNEL_COUNT};

/// Number of distinct channel pairs
pub const PAIR_COUNT: usize = CHANNEL_COUNT * (CHANNEL_COUNT - 1) / 2;

/// Correlation coefficient flavour, stored by its lowercase tag
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    Spearman,
}

impl CorrelationMethod {
    /// Coefficient of two equally long series
    pub fn coefficient(self, x: &[f64], y: &[f64]) -> f64 {
        match self {
            CorrelationMethod::Pearson => pearson_correlation(x, y),
            CorrelationMethod::Spearman => {
                pearson_correlation(&average_ranks(x), &average_ranks(y))
            }
        }
    }
}

/// One upper-triangle entry of the matrix
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationPair {
    pub first: Channel,
    pub second: Channel,
    pub coefficient: f64,
}

/// Coefficient of one pair with its two-sided p-value
#[derive(Clone, Debug, PartialEq)]
pub struct PairCorrelation {
    pub first: Channel,
    pub second: Channel,
    pub method: CorrelationMethod,
    pub coefficient: f64,
    pub p_value: f64,
    pub samples: usize,
}

/// Symmetric coefficient matrix over every tracked channel
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationMatrix {
    pub method: CorrelationMethod,
    values: [[f64; CHANNEL_COUNT]; CHANNEL_COUNT],
    pub metadata: AnalysisMetadata,
}

impl CorrelationMatrix {
    pub fn get(&self, a: Channel, b: Channel) -> f64 {
        self.values[a.index()][b.index()]
    }

    pub fn rows(&self) -> &[[f64; CHANNEL_COUNT]; CHANNEL_COUNT] {
        &self.values
    }

    /// Every `i < j` pair in channel order
    pub fn pairs(&self) -> Vec<CorrelationPair> {
        let mut pairs = Vec::with_capacity(PAIR_COUNT);
        for (i, &first) in Channel::ALL.iter().enumerate() {
            for &second in &Channel::ALL[i + 1..] {
                pairs.push(CorrelationPair {
                    first,
                    second,
                    coefficient: self.get(first, second),
                });
            }
        }
        pairs
    }

    /// Pairs ordered by absolute coefficient, strongest first.
    ///
    /// Equal magnitudes keep channel order. At most `n` pairs are returned.
    pub fn strongest(&self, n: usize) -> Vec<CorrelationPair> {
        let mut pairs = self.pairs();
        pairs.sort_by(|a, b| {
            b.coefficient
                .abs()
                .partial_cmp(&a.coefficient.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        pairs.truncate(n);
        pairs
    }
}

/// Correlation matrix of every tracked channel
pub fn correlation_matrix(
    table: &CleanedTable,
    method: CorrelationMethod,
) -> Result<CorrelationMatrix, AnalysisError> {
    require_min_length(table.series(Channel::CarbonMonoxide), 2)?;

    let (values, computation_time) = timed_analyze(|| {
        // Rank once per channel rather than once per pair
        let columns: Vec<Vec<f64>> = Channel::ALL
            .iter()
            .map(|&c| match method {
                CorrelationMethod::Pearson => table.series(c).to_vec(),
                CorrelationMethod::Spearman => average_ranks(table.series(c)),
            })
            .collect();

        let mut values = [[0.0; CHANNEL_COUNT]; CHANNEL_COUNT];
        for i in 0..CHANNEL_COUNT {
            values[i][i] = 1.0;
            for j in i + 1..CHANNEL_COUNT {
                let r = pearson_correlation(&columns[i], &columns[j]);
                values[i][j] = r;
                values[j][i] = r;
            }
        }
        values
    });

    let mut metadata = AnalysisMetadata::new(format!("{} correlation", method))
        .param("rows", table.len());
    metadata.computation_time_ms = computation_time;
    for channel in Channel::ALL {
        if is_constant(table.series(channel)) {
            tracing::warn!("Channel '{}' is constant, its correlations are 0", channel);
            metadata
                .warnings
                .push(format!("'{}' has no variance", channel));
        }
    }

    tracing::info!("{} correlation computed over {} rows", method, table.len());

    Ok(CorrelationMatrix {
        method,
        values,
        metadata,
    })
}

/// Correlation of two channels with a two-sided p-value
pub fn correlate_pair(
    table: &CleanedTable,
    first: Channel,
    second: Channel,
    method: CorrelationMethod,
) -> Result<PairCorrelation, AnalysisError> {
    let x = table.series(first);
    let y = table.series(second);
    require_min_length(x, 3)?;

    let coefficient = if first == second {
        1.0
    } else {
        method.coefficient(x, y)
    };
    let p_value = correlation_p_value(coefficient, x.len())?;

    tracing::debug!(
        "{} correlation between '{}' and '{}': r={:.4}, p={:.2e}",
        method,
        first,
        second,
        coefficient,
        p_value
    );

    Ok(PairCorrelation {
        first,
        second,
        method,
        coefficient,
        p_value,
        samples: x.len(),
    })
}

/// Two-sided p-value of a coefficient from `n` samples (Student's t, n - 2 df)
pub fn correlation_p_value(r: f64, n: usize) -> Result<f64, AnalysisError> {
    if n < 3 {
        return Err(AnalysisError::InsufficientData { needed: 3, got: n });
    }
    if r.abs() >= 1.0 {
        return Ok(0.0);
    }

    let df = (n - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| invalid(format!("Failed to create t-distribution: {}", e)))?;
    Ok((2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0))
}

/// The `n` strongest pairs of the table
pub fn strongest_correlations(
    table: &CleanedTable,
    n: usize,
    method: CorrelationMethod,
) -> Result<Vec<CorrelationPair>, AnalysisError> {
    Ok(correlation_matrix(table, method)?.strongest(n))
}

/// Strength band of a coefficient's magnitude
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strength {
    VeryWeak,
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Positive,
    Negative,
}

/// Verbal reading of a coefficient
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interpretation {
    pub strength: Strength,
    pub direction: Direction,
}

impl fmt::Display for Interpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strength = match self.strength {
            Strength::VeryWeak => "Very weak",
            Strength::Weak => "Weak",
            Strength::Moderate => "Moderate",
            Strength::Strong => "Strong",
            Strength::VeryStrong => "Very strong",
        };
        let direction = match self.direction {
            Direction::Positive => "positive",
            Direction::Negative => "negative",
        };
        write!(f, "{} {} correlation", strength, direction)
    }
}

/// Classify a coefficient; zero counts as negative
pub fn interpret(coefficient: f64) -> Interpretation {
    let magnitude = coefficient.abs();
    let strength = if magnitude >= 0.9 {
        Strength::VeryStrong
    } else if magnitude >= 0.7 {
        Strength::Strong
    } else if magnitude >= 0.5 {
        Strength::Moderate
    } else if magnitude >= 0.3 {
        Strength::Weak
    } else {
        Strength::VeryWeak
    };
    let direction = if coefficient > 0.0 {
        Direction::Positive
    } else {
        Direction::Negative
    };
    Interpretation {
        strength,
        direction,
    }
}
