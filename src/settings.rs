//! Engine settings persistence.
//!
//! Numeric defaults for cleaning and spectral analysis, plus the location of
//! the result database. Stored as JSON in the platform config directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::analysis::spectral::PsdMethod;

/// Raw value the sensors report when a reading failed
pub const DEFAULT_SENTINEL: f64 = -200.0;

/// Largest fraction of tracked channels a row may miss before it is dropped
pub const DEFAULT_MAX_MISSING_FRACTION: f64 = 0.5;

/// Hours between consecutive samples
pub const DEFAULT_SAMPLING_INTERVAL_HOURS: f64 = 1.0;

/// Series shorter than this are refused by the spectral engine
pub const DEFAULT_MIN_SPECTRAL_SAMPLES: usize = 10;

/// Upper bound on the Welch segment length
pub const DEFAULT_WELCH_MAX_SEGMENT: usize = 256;

/// Number of spectrum bins kept in a stored spectral result
pub const DEFAULT_SPECTRUM_SAMPLE_CAP: usize = 100;

/// Butterworth order for band filtering
pub const DEFAULT_BAND_FILTER_ORDER: usize = 3;

/// Settings that drive the analysis engines
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Settings file version for migration support
    #[serde(default = "default_version")]
    pub version: u32,
    /// Path of the SQLite result database
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_sentinel")]
    pub sentinel_value: f64,
    #[serde(default = "default_max_missing_fraction")]
    pub max_missing_fraction: f64,
    #[serde(default = "default_sampling_interval")]
    pub sampling_interval_hours: f64,
    #[serde(default = "default_min_spectral_samples")]
    pub min_spectral_samples: usize,
    #[serde(default = "default_welch_max_segment")]
    pub welch_max_segment: usize,
    #[serde(default = "default_spectrum_sample_cap")]
    pub spectrum_sample_cap: usize,
    #[serde(default = "default_band_filter_order")]
    pub band_filter_order: usize,
    /// PSD estimator used for stored spectra
    #[serde(default)]
    pub psd_method: PsdMethod,
    /// Number of dominant frequencies reported per channel
    #[serde(default = "default_dominant_peaks")]
    pub dominant_peaks: usize,
}

fn default_version() -> u32 {
    1
}

fn default_database_path() -> PathBuf {
    EngineSettings::get_config_dir()
        .map(|p| p.join("air_quality.db"))
        .unwrap_or_else(|| PathBuf::from("air_quality.db"))
}

fn default_sentinel() -> f64 {
    DEFAULT_SENTINEL
}

fn default_max_missing_fraction() -> f64 {
    DEFAULT_MAX_MISSING_FRACTION
}

fn default_sampling_interval() -> f64 {
    DEFAULT_SAMPLING_INTERVAL_HOURS
}

fn default_min_spectral_samples() -> usize {
    DEFAULT_MIN_SPECTRAL_SAMPLES
}

fn default_welch_max_segment() -> usize {
    DEFAULT_WELCH_MAX_SEGMENT
}

fn default_spectrum_sample_cap() -> usize {
    DEFAULT_SPECTRUM_SAMPLE_CAP
}

fn default_band_filter_order() -> usize {
    DEFAULT_BAND_FILTER_ORDER
}

fn default_dominant_peaks() -> usize {
    5
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            version: default_version(),
            database_path: default_database_path(),
            sentinel_value: DEFAULT_SENTINEL,
            max_missing_fraction: DEFAULT_MAX_MISSING_FRACTION,
            sampling_interval_hours: DEFAULT_SAMPLING_INTERVAL_HOURS,
            min_spectral_samples: DEFAULT_MIN_SPECTRAL_SAMPLES,
            welch_max_segment: DEFAULT_WELCH_MAX_SEGMENT,
            spectrum_sample_cap: DEFAULT_SPECTRUM_SAMPLE_CAP,
            band_filter_order: DEFAULT_BAND_FILTER_ORDER,
            psd_method: PsdMethod::default(),
            dominant_peaks: default_dominant_peaks(),
        }
    }
}

impl EngineSettings {
    /// Get the config directory path for airlog
    pub fn get_config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            dirs::data_dir().map(|p| p.join("airlog"))
        }
        #[cfg(not(target_os = "macos"))]
        {
            dirs::config_dir().map(|p| p.join("airlog"))
        }
    }

    /// Get the path to the settings JSON file
    pub fn get_settings_path() -> Option<PathBuf> {
        Self::get_config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let path = match Self::get_settings_path() {
            Some(p) => p,
            None => return Self::default(),
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable settings file {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<(), String> {
        let path = Self::get_settings_path()
            .ok_or_else(|| "Could not determine config directory".to_string())?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        std::fs::write(&path, content)
            .map_err(|e| format!("Failed to write settings file: {}", e))?;

        Ok(())
    }
}
