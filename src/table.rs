//! Measurement tables and the tracked sensor channels.
//!
//! Raw readings live in a row-oriented [`MeasurementTable`] where any channel
//! may be missing. The cleaner turns it into a column-oriented
//! [`CleanedTable`] with one gap-free series per channel.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::error::AnalysisError;

// ============================================================================
// Channels
// ============================================================================

/// Number of tracked numeric channels
pub const CHANNEL_COUNT: usize = 4;

/// A tracked sensor channel
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Channel {
    /// CO concentration (mg/m³)
    #[strum(serialize = "co_gt")]
    #[serde(rename = "co_gt")]
    CarbonMonoxide,
    /// NO2 concentration (µg/m³)
    #[strum(serialize = "no2_gt")]
    #[serde(rename = "no2_gt")]
    NitrogenDioxide,
    /// Temperature (°C)
    #[strum(serialize = "temperature")]
    #[serde(rename = "temperature")]
    Temperature,
    /// Relative humidity (%)
    #[strum(serialize = "humidity")]
    #[serde(rename = "humidity")]
    Humidity,
}

impl Channel {
    /// All channels in table order
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::CarbonMonoxide,
        Channel::NitrogenDioxide,
        Channel::Temperature,
        Channel::Humidity,
    ];

    /// Column position of this channel
    pub fn index(self) -> usize {
        match self {
            Channel::CarbonMonoxide => 0,
            Channel::NitrogenDioxide => 1,
            Channel::Temperature => 2,
            Channel::Humidity => 3,
        }
    }

    /// Canonical column name (`co_gt`, `temperature`, ...)
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Human readable label
    pub fn label(self) -> &'static str {
        match self {
            Channel::CarbonMonoxide => "CO",
            Channel::NitrogenDioxide => "NO2",
            Channel::Temperature => "Temperature",
            Channel::Humidity => "Humidity",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Channel::CarbonMonoxide => "mg/m³",
            Channel::NitrogenDioxide => "µg/m³",
            Channel::Temperature => "°C",
            Channel::Humidity => "%",
        }
    }

    /// Canonical names of every channel, used in error messages
    pub fn valid_names() -> Vec<String> {
        Channel::iter().map(|c| c.name().to_string()).collect()
    }

    /// Resolve a channel from its column name (case-insensitive)
    pub fn parse(name: &str) -> Result<Channel, AnalysisError> {
        Channel::from_str(name.trim()).map_err(|_| AnalysisError::UnknownVariable {
            name: name.to_string(),
            valid: Channel::valid_names(),
        })
    }
}

// ============================================================================
// Raw measurements
// ============================================================================

/// One raw sensor reading
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Store key, `None` until persisted
    pub id: Option<i64>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    /// Channel values in [`Channel::ALL`] order; `None` means missing
    pub values: [Option<f64>; CHANNEL_COUNT],
}

impl Measurement {
    /// Create a reading with every channel missing
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            id: None,
            date,
            time,
            values: [None; CHANNEL_COUNT],
        }
    }

    /// Set a channel value (builder style)
    pub fn with(mut self, channel: Channel, value: f64) -> Self {
        self.values[channel.index()] = Some(value);
        self
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn get(&self, channel: Channel) -> Option<f64> {
        self.values[channel.index()]
    }

    pub fn key(&self) -> RowKey {
        RowKey {
            id: self.id,
            date: self.date,
            time: self.time,
        }
    }
}

/// Row-oriented table of raw readings
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeasurementTable {
    rows: Vec<Measurement>,
}

impl MeasurementTable {
    pub fn new(rows: Vec<Measurement>) -> Self {
        Self { rows }
    }

    pub fn push(&mut self, row: Measurement) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[Measurement] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one channel in row order
    pub fn column(&self, channel: Channel) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.get(channel)).collect()
    }

    /// Total number of missing channel values
    pub fn missing_count(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.values.iter().filter(|v| v.is_none()).count())
            .sum()
    }
}

impl FromIterator<Measurement> for MeasurementTable {
    fn from_iter<I: IntoIterator<Item = Measurement>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// ============================================================================
// Cleaned table
// ============================================================================

/// Identity of a row, carried through cleaning and filtering
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowKey {
    pub id: Option<i64>,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

/// Column-oriented, gap-free table produced by the cleaner
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CleanedTable {
    keys: Vec<RowKey>,
    columns: [Vec<f64>; CHANNEL_COUNT],
}

impl CleanedTable {
    /// Build a table from row keys and one series per channel.
    ///
    /// Every series must have the same length as `keys` and contain only
    /// finite values.
    pub fn from_parts(
        keys: Vec<RowKey>,
        columns: [Vec<f64>; CHANNEL_COUNT],
    ) -> Result<Self, AnalysisError> {
        for channel in Channel::ALL {
            let column = &columns[channel.index()];
            if column.len() != keys.len() {
                return Err(AnalysisError::InvalidParameter(format!(
                    "series '{}' has {} values for {} rows",
                    channel,
                    column.len(),
                    keys.len()
                )));
            }
            if column.iter().any(|v| !v.is_finite()) {
                return Err(AnalysisError::InvalidParameter(format!(
                    "series '{}' contains missing or non-finite values",
                    channel
                )));
            }
        }
        Ok(Self { keys, columns })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[RowKey] {
        &self.keys
    }

    /// Gap-free series for a channel
    pub fn series(&self, channel: Channel) -> &[f64] {
        &self.columns[channel.index()]
    }

    /// Series lookup by column name
    pub fn series_named(&self, name: &str) -> Result<&[f64], AnalysisError> {
        Ok(self.series(Channel::parse(name)?))
    }

    /// Keep only the rows where `keep` is true; the mask must cover every row
    pub fn retain_rows(&self, keep: &[bool]) -> Result<CleanedTable, AnalysisError> {
        if keep.len() != self.len() {
            return Err(AnalysisError::InvalidParameter(format!(
                "row mask has {} entries for {} rows",
                keep.len(),
                self.len()
            )));
        }

        let keys = self
            .keys
            .iter()
            .zip(keep)
            .filter(|&(_, &k)| k)
            .map(|(key, _)| *key)
            .collect();

        let columns = std::array::from_fn(|i| {
            self.columns[i]
                .iter()
                .zip(keep)
                .filter(|&(_, &k)| k)
                .map(|(v, _)| *v)
                .collect()
        });

        Ok(CleanedTable { keys, columns })
    }

    /// Return a copy with one channel's series replaced (e.g. a smoothed series)
    pub fn with_series(&self, channel: Channel, values: Vec<f64>) -> Result<Self, AnalysisError> {
        let mut columns = self.columns.clone();
        columns[channel.index()] = values;
        Self::from_parts(self.keys.clone(), columns)
    }

    /// Convert back into raw rows (every value present)
    pub fn to_measurements(&self) -> MeasurementTable {
        self.keys
            .iter()
            .enumerate()
            .map(|(row, key)| Measurement {
                id: key.id,
                date: key.date,
                time: key.time,
                values: std::array::from_fn(|i| Some(self.columns[i][row])),
            })
            .collect()
    }
}
