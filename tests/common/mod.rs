//! Common test utilities shared across all test modules
//!
//! Synthetic hourly logs with known structure: a daily cycle in every
//! channel, NO2 tracking CO, humidity mirroring temperature.

#![allow(dead_code)]

use std::f64::consts::PI;

use airlog::table::{Channel, Measurement, MeasurementTable, RowKey, CHANNEL_COUNT};
use airlog::CleanedTable;
use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Raw value the sensors use for "no reading"
pub const SENTINEL: f64 = -200.0;

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2004, 3, 10)
        .unwrap()
        .and_hms_opt(18, 0, 0)
        .unwrap()
}

/// Deterministic jitter in [-0.5, 0.5)
fn jitter(i: usize) -> f64 {
    ((i * 7919 + 13) % 1000) as f64 / 1000.0 - 0.5
}

/// Channel values for hour `i` of the synthetic log
pub fn synthetic_values(i: usize) -> [f64; CHANNEL_COUNT] {
    let t = i as f64;
    let daily = (2.0 * PI * t / 24.0).sin();
    let co = 2.0 + daily + 0.1 * jitter(i);
    let no2 = 80.0 + 30.0 * daily + 2.0 * jitter(i + 1);
    let temperature = 15.0 + 5.0 * (2.0 * PI * (t - 6.0) / 24.0).sin() + 0.2 * jitter(i + 2);
    let humidity = 90.0 - 2.0 * temperature + 0.5 * jitter(i + 3);
    [co, no2, temperature, humidity]
}

/// `hours` consecutive hourly readings with every channel present
pub fn hourly_log(hours: usize) -> MeasurementTable {
    (0..hours)
        .map(|i| {
            let at = start() + Duration::hours(i as i64);
            let values = synthetic_values(i);
            Measurement {
                id: None,
                date: at.date(),
                time: at.time(),
                values: values.map(Some),
            }
        })
        .collect()
}

/// Consecutive hourly readings taken verbatim, sentinels included
pub fn raw_log(rows: &[[f64; CHANNEL_COUNT]]) -> MeasurementTable {
    rows.iter()
        .enumerate()
        .map(|(i, values)| {
            let at = start() + Duration::hours(i as i64);
            Measurement {
                id: None,
                date: at.date(),
                time: at.time(),
                values: values.map(Some),
            }
        })
        .collect()
}

/// Five readings whose temperature cleans to 20, 22, 24, 26.
///
/// The middle row misses three channels and is dropped, leaving a
/// two-row temperature gap between 20 and 26.
pub fn gap_between_20_and_26() -> MeasurementTable {
    raw_log(&[
        [1.0, 50.0, 20.0, 40.0],
        [1.1, 51.0, SENTINEL, 41.0],
        [SENTINEL, SENTINEL, 99.0, SENTINEL],
        [1.3, 53.0, SENTINEL, 43.0],
        [1.4, 54.0, 26.0, 44.0],
    ])
}

/// Replace the given (row, channel) cells with the sentinel value
pub fn with_sentinels(table: &MeasurementTable, cells: &[(usize, Channel)]) -> MeasurementTable {
    let mut rows = table.rows().to_vec();
    for &(row, channel) in cells {
        rows[row].values[channel.index()] = Some(SENTINEL);
    }
    MeasurementTable::new(rows)
}

/// Cleaned table straight from column data
pub fn cleaned_from_columns(columns: [Vec<f64>; CHANNEL_COUNT]) -> CleanedTable {
    let keys = (0..columns[0].len())
        .map(|i| {
            let at = start() + Duration::hours(i as i64);
            RowKey {
                id: Some(i as i64 + 1),
                date: at.date(),
                time: at.time(),
            }
        })
        .collect();
    CleanedTable::from_parts(keys, columns).expect("columns should form a valid table")
}

/// Cleaned table where every channel holds the same series
pub fn cleaned_uniform(series: Vec<f64>) -> CleanedTable {
    cleaned_from_columns(std::array::from_fn(|_| series.clone()))
}

/// Pure sine sampled once per hour
pub fn sine(n: usize, frequency: f64, amplitude: f64) -> Vec<f64> {
    (0..n)
        .map(|i| amplitude * (2.0 * PI * frequency * i as f64).sin())
        .collect()
}
