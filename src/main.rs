//! airlog - batch analysis of a stored air-quality log
//!
//! Reads every measurement from the SQLite store, cleans it, writes the
//! cleaned table back, logs per-channel statistics, then stores Pearson and Spearman correlations and the
//! spectral summary of every channel.
//!
//! Usage: `airlog [DATABASE_PATH]` (defaults to the path in the settings file)

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use airlog::analysis::correlation::{interpret, CorrelationMethod};
use airlog::analysis::spectral::DominantSource;
use airlog::settings::EngineSettings;
use airlog::store::SqliteStore;
use airlog::{AnalysisSession, Channel};

/// Number of correlation pairs reported in the log
const TOP_PAIRS: usize = 5;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = EngineSettings::load();
    let db_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| settings.database_path.clone());

    let mut store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let mut session = AnalysisSession::new(&settings);
    let rows = session
        .load_from_store(&store)
        .context("Failed to read measurements")?;
    if rows == 0 {
        tracing::warn!("No measurements in {}, nothing to analyze", db_path.display());
        return Ok(());
    }

    let report = session.clean().context("Cleaning failed")?;
    tracing::info!(
        "Cleaned {} rows ({} interpolated, {} median-filled)",
        report.rows_remaining,
        report.interpolated,
        report.median_filled
    );
    session
        .persist_cleaned(&mut store)
        .context("Failed to store cleaned measurements")?;

    for (channel, stats) in session.summary_statistics()? {
        tracing::info!(
            "{} ({}): mean {:.2}, std {:.2}, min {:.2}, median {:.2}, max {:.2}",
            channel.label(),
            channel.unit(),
            stats.mean,
            stats.stdev,
            stats.min,
            stats.median,
            stats.max
        );
    }

    for method in [CorrelationMethod::Pearson, CorrelationMethod::Spearman] {
        session
            .store_correlations(&mut store, method)
            .with_context(|| format!("Failed to store {} correlations", method))?;

        for pair in session.strongest_correlations(TOP_PAIRS, method)? {
            tracing::info!(
                "{} {} / {}: {:+.4} ({})",
                method,
                pair.first.label(),
                pair.second.label(),
                pair.coefficient,
                interpret(pair.coefficient)
            );
        }
    }

    for channel in Channel::ALL {
        let summary = session
            .store_spectrum(&mut store, channel)
            .with_context(|| format!("Spectral analysis of '{}' failed", channel))?;
        if summary.dominant.is_none() {
            tracing::warn!("'{}' has no periodic component", channel);
            continue;
        }

        let peaks = session.dominant_frequencies(
            channel.name(),
            settings.dominant_peaks,
            DominantSource::Amplitude,
        )?;
        for peak in peaks {
            tracing::info!(
                "{}: {:.5} cycles/h, period {:.1} h ({:.2} days) - {}",
                channel.label(),
                peak.frequency,
                peak.period_hours,
                peak.period_days,
                peak.cycle()
            );
        }
    }

    Ok(())
}
