//! Tests for channels and tables
//!
//! Tests cover:
//! - Channel name lookup
//! - Raw table accessors
//! - Cleaned table construction and row filtering

use airlog::table::{Channel, Measurement, MeasurementTable, RowKey};
use airlog::{AnalysisError, CleanedTable};
use chrono::{NaiveDate, NaiveTime};

use crate::common::{cleaned_from_columns, hourly_log};

fn reading(hour: u32) -> Measurement {
    Measurement::new(
        NaiveDate::from_ymd_opt(2004, 3, 10).unwrap(),
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
    )
}

// ============================================
// Channel Tests
// ============================================

#[test]
fn test_channel_parse_canonical_names() {
    for channel in Channel::ALL {
        assert_eq!(Channel::parse(channel.name()).unwrap(), channel);
        assert_eq!(channel.to_string(), channel.name());
    }
}

#[test]
fn test_channel_parse_case_insensitive() {
    assert_eq!(Channel::parse("CO_GT").unwrap(), Channel::CarbonMonoxide);
    assert_eq!(Channel::parse(" Humidity ").unwrap(), Channel::Humidity);
}

#[test]
fn test_unknown_channel_lists_valid_names() {
    match Channel::parse("ozone") {
        Err(AnalysisError::UnknownVariable { name, valid }) => {
            assert_eq!(name, "ozone");
            assert_eq!(valid, vec!["co_gt", "no2_gt", "temperature", "humidity"]);
        }
        other => panic!("expected UnknownVariable, got {:?}", other),
    }
}

#[test]
fn test_channel_indices_follow_table_order() {
    for (i, channel) in Channel::ALL.iter().enumerate() {
        assert_eq!(channel.index(), i);
    }
}

// ============================================
// Raw Table Tests
// ============================================

#[test]
fn test_measurement_builder() {
    let row = reading(3)
        .with(Channel::Temperature, 12.5)
        .with(Channel::Humidity, 40.0)
        .with_id(7);

    assert_eq!(row.id, Some(7));
    assert_eq!(row.get(Channel::Temperature), Some(12.5));
    assert_eq!(row.get(Channel::CarbonMonoxide), None);
    assert_eq!(row.key().id, Some(7));
}

#[test]
fn test_missing_count_and_columns() {
    let mut table = MeasurementTable::default();
    table.push(reading(0).with(Channel::CarbonMonoxide, 1.0));
    table.push(reading(1).with(Channel::CarbonMonoxide, 2.0).with(Channel::Humidity, 3.0));

    assert_eq!(table.len(), 2);
    assert_eq!(table.missing_count(), 5);
    assert_eq!(table.column(Channel::Humidity), vec![None, Some(3.0)]);
}

// ============================================
// Cleaned Table Tests
// ============================================

#[test]
fn test_from_parts_rejects_ragged_columns() {
    let keys = vec![reading(0).key(), reading(1).key()];
    let result = CleanedTable::from_parts(
        keys,
        [vec![1.0, 2.0], vec![1.0], vec![1.0, 2.0], vec![1.0, 2.0]],
    );
    assert!(matches!(result, Err(AnalysisError::InvalidParameter(_))));
}

#[test]
fn test_from_parts_rejects_non_finite() {
    let keys: Vec<RowKey> = vec![reading(0).key()];
    let result = CleanedTable::from_parts(keys, [vec![f64::NAN], vec![1.0], vec![1.0], vec![1.0]]);
    assert!(matches!(result, Err(AnalysisError::InvalidParameter(_))));
}

#[test]
fn test_retain_rows_keeps_columns_aligned() {
    let table = cleaned_from_columns([
        vec![1.0, 2.0, 3.0],
        vec![4.0, 5.0, 6.0],
        vec![7.0, 8.0, 9.0],
        vec![10.0, 11.0, 12.0],
    ]);
    let kept = table.retain_rows(&[true, false, true]).unwrap();

    assert_eq!(kept.len(), 2);
    assert_eq!(kept.series(Channel::NitrogenDioxide), &[4.0, 6.0]);
    assert_eq!(kept.keys()[1], table.keys()[2]);
    assert!(matches!(
        table.retain_rows(&[true]),
        Err(AnalysisError::InvalidParameter(_))
    ));
}

#[test]
fn test_series_named() {
    let table = cleaned_from_columns([vec![1.0], vec![2.0], vec![3.0], vec![4.0]]);
    assert_eq!(table.series_named("temperature").unwrap(), &[3.0]);
    assert!(table.series_named("pm10").is_err());
}

#[test]
fn test_to_measurements_has_every_value() {
    let table = cleaned_from_columns([vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0], vec![7.0, 8.0]]);
    let raw = table.to_measurements();

    assert_eq!(raw.len(), 2);
    assert_eq!(raw.missing_count(), 0);
    assert_eq!(raw.rows()[1].get(Channel::Humidity), Some(8.0));
    assert_eq!(raw.rows()[0].id, Some(1));
}

#[test]
fn test_with_series_replaces_one_channel() {
    let table = cleaned_from_columns([vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0], vec![7.0, 8.0]]);
    let replaced = table.with_series(Channel::Temperature, vec![0.0, 0.0]).unwrap();

    assert_eq!(replaced.series(Channel::Temperature), &[0.0, 0.0]);
    assert_eq!(replaced.series(Channel::Humidity), table.series(Channel::Humidity));
    assert!(table.with_series(Channel::Temperature, vec![0.0]).is_err());
}

#[test]
fn test_hourly_log_keys_are_consecutive() {
    let raw = hourly_log(30);
    let rows = raw.rows();
    // Crosses midnight on the first day
    assert_eq!(rows[6].date, NaiveDate::from_ymd_opt(2004, 3, 11).unwrap());
    assert_eq!(rows[6].time, NaiveTime::from_hms_opt(0, 0, 0).unwrap());
}
