//! Frequency-domain analysis of a single channel.
//!
//! All transforms de-mean the series first, so the DC bin only carries
//! numerical residue and is never reported as a dominant cycle. Frequencies
//! are in cycles per hour, derived from the sampling interval.

use std::cmp::Ordering;
use std::f64::consts::PI;
use std::fmt;

use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};

use super::butterworth::{BandType, SosFilter};
use super::require_min_length;
use super::statistics::mean;
use crate::error::{invalid, AnalysisError};
use crate::settings::{
    EngineSettings, DEFAULT_BAND_FILTER_ORDER, DEFAULT_MIN_SPECTRAL_SAMPLES,
    DEFAULT_SAMPLING_INTERVAL_HOURS, DEFAULT_WELCH_MAX_SEGMENT,
};
use crate::table::{Channel, CleanedTable};

/// Power spectral density estimator
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PsdMethod {
    /// Averaged Hann-windowed segments with 50% overlap
    #[default]
    Welch,
    /// Single boxcar segment over the whole series
    Periodogram,
}

impl PsdMethod {
    pub fn name(&self) -> &'static str {
        match self {
            PsdMethod::Welch => "welch",
            PsdMethod::Periodogram => "periodogram",
        }
    }
}

/// Which magnitude ranks dominant frequencies
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DominantSource {
    /// FFT amplitude
    #[default]
    Amplitude,
    /// Power spectral density
    Power,
}

/// How a band filter is applied to the series
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterPhase {
    /// Single forward pass
    #[default]
    Causal,
    /// Forward-backward pass with no phase shift
    ZeroPhase,
}

/// Band filter with edges in cycles per hour
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BandFilter {
    LowPass { cutoff: f64 },
    HighPass { cutoff: f64 },
    BandPass { low: f64, high: f64 },
    BandStop { low: f64, high: f64 },
}

impl BandFilter {
    pub fn name(&self) -> &'static str {
        match self {
            BandFilter::LowPass { .. } => "lowpass",
            BandFilter::HighPass { .. } => "highpass",
            BandFilter::BandPass { .. } => "bandpass",
            BandFilter::BandStop { .. } => "bandstop",
        }
    }

    /// Edges relative to the sample rate, so Nyquist is 0.5
    fn normalized(&self, sample_rate: f64) -> BandType {
        match *self {
            BandFilter::LowPass { cutoff } => BandType::LowPass {
                cutoff: cutoff / sample_rate,
            },
            BandFilter::HighPass { cutoff } => BandType::HighPass {
                cutoff: cutoff / sample_rate,
            },
            BandFilter::BandPass { low, high } => BandType::BandPass {
                low: low / sample_rate,
                high: high / sample_rate,
            },
            BandFilter::BandStop { low, high } => BandType::BandStop {
                low: low / sample_rate,
                high: high / sample_rate,
            },
        }
    }
}

/// One-sided FFT of a de-meaned series
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FourierSpectrum {
    pub frequencies: Vec<f64>,
    pub amplitudes: Vec<f64>,
    pub phases: Vec<f64>,
}

/// One-sided power spectral density
#[derive(Clone, Debug, PartialEq)]
pub struct PowerSpectrum {
    pub method: PsdMethod,
    pub frequencies: Vec<f64>,
    pub power: Vec<f64>,
}

impl PowerSpectrum {
    /// Spectral density at the bin closest to `frequency`
    pub fn power_at(&self, frequency: f64) -> Option<f64> {
        self.frequencies
            .iter()
            .zip(&self.power)
            .min_by(|(a, _), (b, _)| {
                (*a - frequency)
                    .abs()
                    .partial_cmp(&(*b - frequency).abs())
                    .unwrap_or(Ordering::Equal)
            })
            .map(|(_, &p)| p)
    }
}

/// A strong periodic component
#[derive(Clone, Debug, PartialEq)]
pub struct DominantFrequency {
    pub frequency: f64,
    /// Amplitude or power, depending on the ranking source
    pub magnitude: f64,
    pub period_hours: f64,
    pub period_days: f64,
}

impl DominantFrequency {
    /// `frequency` in cycles per hour
    fn new(frequency: f64, magnitude: f64) -> Self {
        let period_hours = 1.0 / frequency;
        Self {
            frequency,
            magnitude,
            period_hours,
            period_days: period_hours / 24.0,
        }
    }

    pub fn cycle(&self) -> CycleKind {
        interpret_frequency(self.frequency)
    }
}

/// Spectral findings for one channel, as persisted
#[derive(Clone, Debug, PartialEq)]
pub struct SpectralSummary {
    pub channel: Channel,
    /// Strongest FFT component, absent when the series has no variation
    pub dominant: Option<DominantFrequency>,
    pub spectrum: PowerSpectrum,
}

/// Original and band-filtered series with their spectra
#[derive(Clone, Debug, PartialEq)]
pub struct FilteredComparison {
    pub band: BandFilter,
    pub filtered: Vec<f64>,
    pub original_spectrum: PowerSpectrum,
    pub filtered_spectrum: PowerSpectrum,
}

/// Named reading of a cycle frequency (in cycles per hour)
#[derive(Clone, Debug, PartialEq)]
pub enum CycleKind {
    Constant,
    Daily,
    SemiDaily,
    Weekly,
    LongTerm { days: f64 },
    Other { hours: f64 },
}

impl fmt::Display for CycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleKind::Constant => write!(f, "Constant component"),
            CycleKind::Daily => write!(f, "Daily cycle (~24h)"),
            CycleKind::SemiDaily => write!(f, "Semi-daily cycle (~12h)"),
            CycleKind::Weekly => write!(f, "Weekly cycle (~7 days)"),
            CycleKind::LongTerm { days } => write!(f, "Long-term trend ({:.1} days)", days),
            CycleKind::Other { hours } => write!(f, "Cycle of {:.1} hours", hours),
        }
    }
}

/// Classify a frequency given in cycles per hour
pub fn interpret_frequency(frequency: f64) -> CycleKind {
    if frequency <= 0.0 || !frequency.is_finite() {
        return CycleKind::Constant;
    }

    let hours = 1.0 / frequency;
    if (hours - 24.0).abs() < 2.0 {
        CycleKind::Daily
    } else if (hours - 12.0).abs() < 1.0 {
        CycleKind::SemiDaily
    } else if (hours - 168.0).abs() < 10.0 {
        CycleKind::Weekly
    } else if hours > 500.0 {
        CycleKind::LongTerm { days: hours / 24.0 }
    } else {
        CycleKind::Other { hours }
    }
}

/// Fourier, PSD and band filtering for gap-free series
#[derive(Clone, Debug, PartialEq)]
pub struct SpectralEngine {
    pub sampling_interval_hours: f64,
    pub min_samples: usize,
    pub welch_max_segment: usize,
    pub filter_order: usize,
    pub psd_method: PsdMethod,
    pub phase: FilterPhase,
}

impl Default for SpectralEngine {
    fn default() -> Self {
        Self {
            sampling_interval_hours: DEFAULT_SAMPLING_INTERVAL_HOURS,
            min_samples: DEFAULT_MIN_SPECTRAL_SAMPLES,
            welch_max_segment: DEFAULT_WELCH_MAX_SEGMENT,
            filter_order: DEFAULT_BAND_FILTER_ORDER,
            psd_method: PsdMethod::default(),
            phase: FilterPhase::default(),
        }
    }
}

impl SpectralEngine {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            sampling_interval_hours: settings.sampling_interval_hours,
            min_samples: settings.min_spectral_samples,
            welch_max_segment: settings.welch_max_segment,
            filter_order: settings.band_filter_order,
            psd_method: settings.psd_method,
            phase: FilterPhase::default(),
        }
    }

    pub fn with_phase(mut self, phase: FilterPhase) -> Self {
        self.phase = phase;
        self
    }

    /// Samples per hour
    pub fn sample_rate(&self) -> f64 {
        1.0 / self.sampling_interval_hours
    }

    pub fn nyquist(&self) -> f64 {
        self.sample_rate() / 2.0
    }

    fn check(&self, series: &[f64]) -> Result<(), AnalysisError> {
        if !(self.sampling_interval_hours > 0.0 && self.sampling_interval_hours.is_finite()) {
            return Err(invalid(format!(
                "sampling interval must be positive, got {}",
                self.sampling_interval_hours
            )));
        }
        require_min_length(series, self.min_samples.max(2))
    }

    /// One-sided FFT: bins with non-negative frequency
    pub fn fourier(&self, series: &[f64]) -> Result<FourierSpectrum, AnalysisError> {
        self.check(series)?;

        let n = series.len();
        let mut buffer = demeaned(series)
            .into_iter()
            .map(|x| Complex64::new(x, 0.0))
            .collect::<Vec<_>>();

        let mut planner = FftPlanner::new();
        planner.plan_fft_forward(n).process(&mut buffer);

        let bins = n.div_ceil(2);
        let step = self.sample_rate() / n as f64;
        let scale = 2.0 / n as f64;

        Ok(FourierSpectrum {
            frequencies: (0..bins).map(|k| k as f64 * step).collect(),
            amplitudes: buffer[..bins].iter().map(|c| c.norm() * scale).collect(),
            phases: buffer[..bins].iter().map(|c| c.arg()).collect(),
        })
    }

    /// Power spectral density with the given estimator
    pub fn power_spectrum(
        &self,
        series: &[f64],
        method: PsdMethod,
    ) -> Result<PowerSpectrum, AnalysisError> {
        self.check(series)?;

        let data = demeaned(series);
        let fs = self.sample_rate();
        let (frequencies, power) = match method {
            PsdMethod::Welch => {
                let mut segment = (data.len() / 4).min(self.welch_max_segment);
                if segment < 4 {
                    segment = data.len();
                }
                welch(&data, fs, segment)
            }
            PsdMethod::Periodogram => segment_density(&data, &vec![1.0; data.len()], fs),
        };

        tracing::debug!(
            "Power spectrum ({}) computed: {} bins from {} samples",
            method.name(),
            power.len(),
            series.len()
        );

        Ok(PowerSpectrum {
            method,
            frequencies,
            power,
        })
    }

    /// Strongest components with frequency above zero
    pub fn dominant_frequencies(
        &self,
        series: &[f64],
        n_peaks: usize,
        source: DominantSource,
    ) -> Result<Vec<DominantFrequency>, AnalysisError> {
        if n_peaks == 0 {
            return Err(invalid("number of peaks must be at least 1"));
        }

        let (frequencies, magnitudes) = match source {
            DominantSource::Amplitude => {
                let spectrum = self.fourier(series)?;
                (spectrum.frequencies, spectrum.amplitudes)
            }
            DominantSource::Power => {
                let spectrum = self.power_spectrum(series, self.psd_method)?;
                (spectrum.frequencies, spectrum.power)
            }
        };

        let mut peaks: Vec<(f64, f64)> = frequencies
            .into_iter()
            .zip(magnitudes)
            .filter(|&(f, _)| f > 0.0)
            .collect();
        // Stable sort keeps the lower frequency first on ties
        peaks.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        Ok(peaks
            .into_iter()
            .take(n_peaks)
            .map(|(f, m)| DominantFrequency::new(f, m))
            .collect())
    }

    /// Apply a Butterworth band filter
    pub fn band_filter(&self, series: &[f64], band: BandFilter) -> Result<Vec<f64>, AnalysisError> {
        // Edges are checked before anything touches the data
        let filter = SosFilter::butterworth(self.filter_order, band.normalized(self.sample_rate()))?;
        self.check(series)?;

        let data = demeaned(series);
        let offset = mean(series);
        let filtered = match self.phase {
            FilterPhase::Causal => filter.filter(&data),
            FilterPhase::ZeroPhase => filter.filtfilt(&data),
        };

        tracing::debug!(
            "Applied {} filter (order {}, {:?}) to {} samples",
            band.name(),
            self.filter_order,
            self.phase,
            series.len()
        );

        // Low-pass and band-stop keep the mean level, the others remove it
        Ok(match band {
            BandFilter::LowPass { .. } | BandFilter::BandStop { .. } => {
                filtered.into_iter().map(|v| v + offset).collect()
            }
            BandFilter::HighPass { .. } | BandFilter::BandPass { .. } => filtered,
        })
    }

    /// Filter a series and compute the spectra before and after
    pub fn compare_filtered(
        &self,
        series: &[f64],
        band: BandFilter,
        method: PsdMethod,
    ) -> Result<FilteredComparison, AnalysisError> {
        let filtered = self.band_filter(series, band)?;
        let original_spectrum = self.power_spectrum(series, method)?;
        let filtered_spectrum = self.power_spectrum(&filtered, method)?;
        Ok(FilteredComparison {
            band,
            filtered,
            original_spectrum,
            filtered_spectrum,
        })
    }

    /// Dominant FFT component and PSD of one channel
    pub fn summarize(
        &self,
        table: &CleanedTable,
        channel: Channel,
    ) -> Result<SpectralSummary, AnalysisError> {
        let series = table.series(channel);
        let spectrum = self.power_spectrum(series, self.psd_method)?;
        let dominant = self
            .dominant_frequencies(series, 1, DominantSource::Amplitude)?
            .into_iter()
            .next()
            .filter(|d| d.magnitude > f64::EPSILON);

        if let Some(d) = &dominant {
            tracing::info!(
                "Dominant cycle for '{}': {:.5} cycles/h ({})",
                channel,
                d.frequency,
                d.cycle()
            );
        }

        Ok(SpectralSummary {
            channel,
            dominant,
            spectrum,
        })
    }
}

fn demeaned(series: &[f64]) -> Vec<f64> {
    let m = mean(series);
    series.iter().map(|x| x - m).collect()
}

/// Periodic Hann window
fn hann(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / len as f64).cos())
        .collect()
}

/// Welch average over half-overlapping segments
fn welch(data: &[f64], fs: f64, segment: usize) -> (Vec<f64>, Vec<f64>) {
    let window = hann(segment);
    let step = (segment - segment / 2).max(1);

    let mut frequencies = Vec::new();
    let mut total: Vec<f64> = Vec::new();
    let mut count = 0usize;

    let mut start = 0;
    while start + segment <= data.len() {
        let chunk = &data[start..start + segment];
        let m = mean(chunk);
        let detrended: Vec<f64> = chunk.iter().map(|x| x - m).collect();

        let (f, p) = segment_density(&detrended, &window, fs);
        if total.is_empty() {
            frequencies = f;
            total = p;
        } else {
            for (acc, v) in total.iter_mut().zip(p) {
                *acc += v;
            }
        }
        count += 1;
        start += step;
    }

    if count > 1 {
        for v in &mut total {
            *v /= count as f64;
        }
    }
    (frequencies, total)
}

/// One-sided density of a single windowed segment
fn segment_density(data: &[f64], window: &[f64], fs: f64) -> (Vec<f64>, Vec<f64>) {
    let n = data.len();
    let mut buffer: Vec<Complex64> = data
        .iter()
        .zip(window)
        .map(|(x, w)| Complex64::new(x * w, 0.0))
        .collect();

    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n).process(&mut buffer);

    let window_power: f64 = window.iter().map(|w| w * w).sum();
    let scale = 1.0 / (fs * window_power);
    let bins = n / 2 + 1;

    let power = buffer[..bins]
        .iter()
        .enumerate()
        .map(|(k, c)| {
            let p = c.norm_sqr() * scale;
            // Fold negative frequencies in; DC and an even-length Nyquist bin have no mirror
            let mirrored = k == 0 || (n % 2 == 0 && k == n / 2);
            if mirrored {
                p
            } else {
                2.0 * p
            }
        })
        .collect();

    let frequencies = (0..bins).map(|k| k as f64 * fs / n as f64).collect();
    (frequencies, power)
}
