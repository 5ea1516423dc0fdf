//! End-to-end pipeline tests
//!
//! Each test works on a fresh database file in a temporary directory.

use airlog::analysis::correlation::{CorrelationMethod, PAIR_COUNT};
use airlog::analysis::filters::{FilterKind, FilterOutput, OutlierPolicy};
use airlog::analysis::spectral::{BandFilter, CycleKind, FilterPhase, PsdMethod};
use airlog::settings::EngineSettings;
use airlog::store::{AnalysisStore, SqliteStore};
use airlog::table::Channel;
use airlog::{AnalysisError, AnalysisSession};
use tempfile::TempDir;

use crate::common::{gap_between_20_and_26, hourly_log, with_sentinels};

const HOURS: usize = 24 * 21;

/// Seed a store with three weeks of readings and a few failed cells
fn seeded_store(dir: &TempDir) -> SqliteStore {
    let mut store = SqliteStore::open(dir.path().join("data").join("air_quality.db")).unwrap();
    let raw = with_sentinels(
        &hourly_log(HOURS),
        &[
            (0, Channel::Humidity),
            (50, Channel::CarbonMonoxide),
            (51, Channel::CarbonMonoxide),
            (200, Channel::Temperature),
            // Three of four channels missing: the row is dropped
            (300, Channel::CarbonMonoxide),
            (300, Channel::NitrogenDioxide),
            (300, Channel::Temperature),
        ],
    );
    for row in raw.rows() {
        store.insert_measurement(row).unwrap();
    }
    store
}

fn cleaned_session(store: &mut SqliteStore) -> AnalysisSession {
    let mut session = AnalysisSession::new(&EngineSettings::default());
    assert_eq!(session.load_from_store(&*store).unwrap(), HOURS);
    session.clean().unwrap();
    session.persist_cleaned(store).unwrap();
    session
}

// ============================================
// Cleaning Round Trip
// ============================================

#[test]
fn test_clean_and_persist_replaces_measurements() {
    let dir = TempDir::new().unwrap();
    let mut store = seeded_store(&dir);

    let mut session = AnalysisSession::new(&EngineSettings::default());
    session.load_from_store(&store).unwrap();
    let report = session.clean().unwrap();
    assert_eq!(report.rows_dropped, 1);
    assert_eq!(report.missing_before, 7);

    let written = session.persist_cleaned(&mut store).unwrap();
    assert_eq!(written, HOURS - 1);

    let stored = store.read_all_measurements().unwrap();
    assert_eq!(stored.len(), HOURS - 1);
    assert_eq!(stored.missing_count(), 0);
    assert!(stored
        .rows()
        .iter()
        .flat_map(|r| r.values)
        .all(|v| v.is_some_and(|x| x != -200.0)));
    // Ids survive the rewrite
    assert_eq!(stored.rows()[0].id, session.cleaned().unwrap().keys()[0].id);
}

#[test]
fn test_session_fills_gap_across_dropped_row() {
    let dir = TempDir::new().unwrap();
    let mut store = SqliteStore::open(dir.path().join("air.db")).unwrap();
    store.replace_measurements(&gap_between_20_and_26()).unwrap();

    let mut session = AnalysisSession::new(&EngineSettings::default());
    assert_eq!(session.load_from_store(&store).unwrap(), 5);
    let report = session.clean().unwrap();
    assert_eq!(report.rows_dropped, 1);
    assert_eq!(report.interpolated, 2);

    assert_eq!(session.persist_cleaned(&mut store).unwrap(), 4);
    let temperatures: Vec<f64> = store
        .read_all_measurements()
        .unwrap()
        .rows()
        .iter()
        .map(|r| r.get(Channel::Temperature).unwrap())
        .collect();
    for (got, want) in temperatures.iter().zip([20.0, 22.0, 24.0, 26.0]) {
        assert!((got - want).abs() < 1e-12, "{:?}", temperatures);
    }
    assert_eq!(temperatures.len(), 4);
}

#[test]
fn test_reopened_store_keeps_cleaned_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("air_quality.db");
    {
        let mut store = seeded_store(&dir);
        cleaned_session(&mut store);
    }

    let store = SqliteStore::open(&path).unwrap();
    let mut session = AnalysisSession::new(&EngineSettings::default());
    assert_eq!(session.load_from_store(&store).unwrap(), HOURS - 1);

    // Already clean: a second pass changes nothing
    let report = session.clean().unwrap();
    assert_eq!(report.missing_before, 0);
    assert_eq!(report.rows_dropped, 0);
}

// ============================================
// Stored Results
// ============================================

#[test]
fn test_correlation_results_replaced_per_method() {
    let dir = TempDir::new().unwrap();
    let mut store = seeded_store(&dir);
    let session = cleaned_session(&mut store);

    for _ in 0..2 {
        for method in [CorrelationMethod::Pearson, CorrelationMethod::Spearman] {
            assert_eq!(session.store_correlations(&mut store, method).unwrap(), PAIR_COUNT);
        }
    }

    let pearson = store
        .read_correlation_results(CorrelationMethod::Pearson)
        .unwrap();
    let spearman = store
        .read_correlation_results(CorrelationMethod::Spearman)
        .unwrap();
    assert_eq!(pearson.len(), PAIR_COUNT);
    assert_eq!(spearman.len(), PAIR_COUNT);

    let matrix = session
        .correlation_matrix(CorrelationMethod::Pearson)
        .unwrap();
    for row in &pearson {
        let a = Channel::parse(&row.variable1).unwrap();
        let b = Channel::parse(&row.variable2).unwrap();
        assert!((row.coefficient - matrix.get(a, b)).abs() < 1e-12);
    }
}

#[test]
fn test_spectral_results_stored_per_channel() {
    let dir = TempDir::new().unwrap();
    let mut store = seeded_store(&dir);
    let session = cleaned_session(&mut store);

    for channel in Channel::ALL {
        let summary = session.store_spectrum(&mut store, channel).unwrap();
        let stored = store.read_spectral_result(channel).unwrap().unwrap();

        assert_eq!(
            stored.dominant_frequency,
            summary.dominant.as_ref().map(|d| d.frequency)
        );
        assert!(stored.spectrum.frequencies.len() <= 100);
        assert_eq!(stored.spectrum.frequencies.len(), stored.spectrum.power.len());
    }

    let temperature = session.store_spectrum(&mut store, Channel::Temperature).unwrap();
    assert_eq!(temperature.dominant.unwrap().cycle(), CycleKind::Daily);
}

// ============================================
// Session Behaviour
// ============================================

#[test]
fn test_committed_filter_flows_into_store() {
    let dir = TempDir::new().unwrap();
    let mut store = seeded_store(&dir);
    let mut session = cleaned_session(&mut store);
    let before = session.cleaned().unwrap().len();

    let FilterOutput::Rows(result) = session
        .filter("no2_gt", FilterKind::OutlierRows(OutlierPolicy::ZScore { k: 1.0 }))
        .unwrap()
    else {
        panic!("row filter should return a table");
    };
    assert!(result.removed > 0);
    assert_eq!(session.cleaned().unwrap().len(), before);

    session.commit_cleaned(result.table).unwrap();
    let written = session.persist_cleaned(&mut store).unwrap();
    assert_eq!(written, before - result.removed);
    assert_eq!(store.read_all_measurements().unwrap().len(), written);
}

#[test]
fn test_session_band_filter_uses_configured_phase() {
    let dir = TempDir::new().unwrap();
    let mut store = seeded_store(&dir);
    let mut session = cleaned_session(&mut store);

    session.spectral_engine_mut().phase = FilterPhase::ZeroPhase;
    assert_eq!(session.spectral_engine().phase, FilterPhase::ZeroPhase);

    // Removing the daily cycle leaves little power at 1/24 cycles per hour
    let comparison = session
        .compare_filtered(
            "temperature",
            BandFilter::HighPass { cutoff: 0.2 },
            PsdMethod::Welch,
        )
        .unwrap();
    let daily = 1.0 / 24.0;
    let ratio = comparison.filtered_spectrum.power_at(daily).unwrap()
        / comparison.original_spectrum.power_at(daily).unwrap();
    assert!(ratio < 0.01, "daily power ratio {}", ratio);
    assert_eq!(comparison.filtered.len(), session.cleaned().unwrap().len());
}

#[test]
fn test_empty_store_yields_empty_analysis() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(dir.path().join("empty.db")).unwrap();

    let mut session = AnalysisSession::new(&EngineSettings::default());
    assert!(matches!(
        session.strongest_correlations(3, CorrelationMethod::Pearson),
        Err(AnalysisError::NoDataLoaded)
    ));

    assert_eq!(session.load_from_store(&store).unwrap(), 0);
    let report = session.clean().unwrap();
    assert_eq!(report.rows_remaining, 0);
    assert!(matches!(
        session.strongest_correlations(3, CorrelationMethod::Pearson),
        Err(AnalysisError::InsufficientData { .. })
    ));
    assert!(matches!(
        session.fourier("co_gt"),
        Err(AnalysisError::InsufficientData { needed: 10, got: 0 })
    ));
}
