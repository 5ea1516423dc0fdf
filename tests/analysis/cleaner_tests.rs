//! Tests for missing-value cleaning
//!
//! Tests cover:
//! - Sentinel and non-finite normalization
//! - Row dropping threshold
//! - Interpolation and median fill
//! - Idempotence

use airlog::analysis::cleaner::Cleaner;
use airlog::table::{Channel, MeasurementTable};
use airlog::AnalysisError;

use crate::common::{
    gap_between_20_and_26, hourly_log, raw_log, synthetic_values, with_sentinels, SENTINEL,
};

// ============================================
// Output Shape Tests
// ============================================

#[test]
fn test_cleaned_table_has_no_missing_values() {
    let raw = with_sentinels(
        &hourly_log(72),
        &[
            (0, Channel::CarbonMonoxide),
            (10, Channel::Humidity),
            (11, Channel::Humidity),
            (40, Channel::Temperature),
            (71, Channel::NitrogenDioxide),
        ],
    );
    assert_eq!(raw.len(), 72);

    let (cleaned, report) = Cleaner::default().clean_with_report(&raw).unwrap();

    assert_eq!(cleaned.len(), 72);
    assert_eq!(report.missing_before, 5);
    assert_eq!(report.missing_after, 0);
    assert_eq!(report.interpolated + report.median_filled, 5);
    for channel in Channel::ALL {
        assert!(
            cleaned.series(channel).iter().all(|v| v.is_finite()),
            "{} should be gap-free",
            channel
        );
    }
}

#[test]
fn test_cleaning_does_not_mutate_input() {
    let raw = with_sentinels(&hourly_log(24), &[(3, Channel::Temperature)]);
    let before = raw.clone();
    Cleaner::default().clean(&raw).unwrap();
    assert_eq!(raw, before);
}

#[test]
fn test_cleaning_is_idempotent() {
    let raw = with_sentinels(
        &hourly_log(48),
        &[(0, Channel::Humidity), (20, Channel::CarbonMonoxide)],
    );
    let cleaner = Cleaner::default();

    let once = cleaner.clean(&raw).unwrap();
    let twice = cleaner.clean(&once.to_measurements()).unwrap();
    assert_eq!(once, twice);
}

// ============================================
// Gap Filling Tests
// ============================================

#[test]
fn test_interior_gap_is_interpolated() {
    let raw = with_sentinels(&hourly_log(24), &[(5, Channel::NitrogenDioxide)]);
    let cleaned = Cleaner::default().clean(&raw).unwrap();

    let before = synthetic_values(4)[Channel::NitrogenDioxide.index()];
    let after = synthetic_values(6)[Channel::NitrogenDioxide.index()];
    let filled = cleaned.series(Channel::NitrogenDioxide)[5];
    assert!(
        (filled - (before + after) / 2.0).abs() < 1e-9,
        "expected midpoint of {} and {}, got {}",
        before,
        after,
        filled
    );
}

#[test]
fn test_gap_after_dropped_row_is_interpolated() {
    let (cleaned, report) = Cleaner::default()
        .clean_with_report(&gap_between_20_and_26())
        .unwrap();

    assert_eq!(report.rows_dropped, 1);
    assert_eq!(report.interpolated, 2);
    assert_eq!(report.median_filled, 0);
    assert_eq!(cleaned.len(), 4);

    let temperature = cleaned.series(Channel::Temperature);
    for (got, want) in temperature.iter().zip([20.0, 22.0, 24.0, 26.0]) {
        assert!((got - want).abs() < 1e-12, "{:?}", temperature);
    }
    assert_eq!(cleaned.series(Channel::CarbonMonoxide), &[1.0, 1.1, 1.3, 1.4]);
}

#[test]
fn test_edge_gaps_take_the_median() {
    // Forward fill would give 40.0 at the end, back fill 10.0 at the start
    let trailing = raw_log(&[
        [1.0, 50.0, 10.0, 40.0],
        [1.1, 51.0, 30.0, 41.0],
        [1.2, 52.0, 40.0, 42.0],
        [1.3, 53.0, SENTINEL, 43.0],
    ]);
    let (cleaned, report) = Cleaner::default().clean_with_report(&trailing).unwrap();
    assert_eq!(cleaned.series(Channel::Temperature), &[10.0, 30.0, 40.0, 30.0]);
    assert_eq!(report.median_filled, 1);
    assert_eq!(report.interpolated, 0);

    let leading = raw_log(&[
        [1.0, 50.0, SENTINEL, 40.0],
        [1.1, 51.0, 10.0, 41.0],
        [1.2, 52.0, 30.0, 42.0],
        [1.3, 53.0, 40.0, 43.0],
    ]);
    let cleaned = Cleaner::default().clean(&leading).unwrap();
    assert_eq!(cleaned.series(Channel::Temperature), &[30.0, 10.0, 30.0, 40.0]);
}

#[test]
fn test_non_finite_values_are_missing() {
    let mut rows = hourly_log(10).rows().to_vec();
    rows[4].values[Channel::Temperature.index()] = Some(f64::NAN);
    rows[5].values[Channel::Temperature.index()] = Some(f64::INFINITY);
    let raw = MeasurementTable::new(rows);

    let (cleaned, report) = Cleaner::default().clean_with_report(&raw).unwrap();
    assert_eq!(report.missing_before, 2);
    assert_eq!(report.interpolated, 2);
    assert!(cleaned.series(Channel::Temperature).iter().all(|v| v.is_finite()));
}

#[test]
fn test_custom_sentinel() {
    let mut rows = hourly_log(10).rows().to_vec();
    rows[2].values[Channel::CarbonMonoxide.index()] = Some(-999.0);
    let raw = MeasurementTable::new(rows);

    let cleaner = Cleaner {
        sentinel: -999.0,
        ..Default::default()
    };
    let (_, report) = cleaner.clean_with_report(&raw).unwrap();
    assert_eq!(report.missing_before, 1);
}

// ============================================
// Row Dropping Tests
// ============================================

#[test]
fn test_row_missing_more_than_half_is_dropped() {
    let raw = with_sentinels(
        &hourly_log(24),
        &[
            (7, Channel::CarbonMonoxide),
            (7, Channel::NitrogenDioxide),
            (7, Channel::Temperature),
            // Two missing values stay within the limit
            (12, Channel::CarbonMonoxide),
            (12, Channel::Humidity),
        ],
    );

    let (cleaned, report) = Cleaner::default().clean_with_report(&raw).unwrap();
    assert_eq!(report.rows_dropped, 1);
    assert_eq!(report.rows_remaining, 23);
    assert_eq!(cleaned.len(), 23);
    assert!(!cleaned
        .keys()
        .iter()
        .any(|k| k.time == raw.rows()[7].time && k.date == raw.rows()[7].date));
}

#[test]
fn test_empty_channel_cannot_be_cleaned() {
    let cells: Vec<_> = (0..12).map(|i| (i, Channel::Humidity)).collect();
    let raw = with_sentinels(&hourly_log(12), &cells);

    let err = Cleaner::default().clean(&raw).unwrap_err();
    assert!(matches!(err, AnalysisError::InsufficientData { .. }));
}
