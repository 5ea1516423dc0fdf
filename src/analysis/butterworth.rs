//! Butterworth IIR filters as cascaded second-order sections.
//!
//! Design follows the classic analog-prototype route:
//! - prototype poles on the unit circle in the left half plane
//! - pre-warped band edges and a lowpass→{low, high, band, stop}
//!   frequency transformation in the zero/pole/gain domain
//! - bilinear transform to the z plane
//! - pairing of conjugate roots into biquads
//!
//! Frequencies are normalized to the sample rate, so the Nyquist frequency
//! is 0.5 and a valid cutoff lies strictly inside `(0, 0.5)`.

use rustfft::num_complex::Complex64;
use std::f64::consts::PI;

use crate::error::{invalid, AnalysisError};

/// Highest supported design order
pub const MAX_ORDER: usize = 8;

/// Frequency response shape
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BandType {
    LowPass { cutoff: f64 },
    HighPass { cutoff: f64 },
    BandPass { low: f64, high: f64 },
    BandStop { low: f64, high: f64 },
}

impl BandType {
    /// Check the normalized edges against the Nyquist limit
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let inside = |f: f64| f > 0.0 && f < 0.5;
        match *self {
            BandType::LowPass { cutoff } | BandType::HighPass { cutoff } => {
                if !inside(cutoff) {
                    return Err(invalid(format!(
                        "cutoff must be strictly between 0 and the Nyquist frequency, got {} (normalized)",
                        cutoff
                    )));
                }
            }
            BandType::BandPass { low, high } | BandType::BandStop { low, high } => {
                if !inside(low) || !inside(high) {
                    return Err(invalid(format!(
                        "band edges must be strictly between 0 and the Nyquist frequency, got {}-{} (normalized)",
                        low, high
                    )));
                }
                if low >= high {
                    return Err(invalid(format!(
                        "low cutoff ({}) must be less than high cutoff ({})",
                        low, high
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A second-order section (biquad) filter
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sos {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Sos {
    /// Apply this biquad section to data using Direct Form II Transposed
    fn filter(&self, data: &[f64], zi: [f64; 2]) -> Vec<f64> {
        let mut output = Vec::with_capacity(data.len());
        let [mut z1, mut z2] = zi;

        for &x in data {
            let y = self.b0 * x + z1;
            z1 = self.b1 * x - self.a1 * y + z2;
            z2 = self.b2 * x - self.a2 * y;
            output.push(y);
        }

        output
    }

    /// Gain at zero frequency
    fn dc_gain(&self) -> f64 {
        let den = 1.0 + self.a1 + self.a2;
        if den.abs() > f64::EPSILON {
            (self.b0 + self.b1 + self.b2) / den
        } else {
            0.0
        }
    }

    /// Steady-state delay values for a constant input `x0`.
    ///
    /// Returns the state and the constant output the section settles to.
    fn steady_state(&self, x0: f64) -> ([f64; 2], f64) {
        let y0 = self.dc_gain() * x0;
        let z2 = self.b2 * x0 - self.a2 * y0;
        let z1 = self.b1 * x0 - self.a1 * y0 + z2;
        ([z1, z2], y0)
    }

    /// Magnitude response at normalized frequency `f`
    fn magnitude(&self, f: f64) -> f64 {
        let w = 2.0 * PI * f;
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;
        let num = self.b0 + z1 * self.b1 + z2 * self.b2;
        let den = 1.0 + z1 * self.a1 + z2 * self.a2;
        (num / den).norm()
    }
}

/// Cascade of biquads forming one filter
#[derive(Clone, Debug, PartialEq)]
pub struct SosFilter {
    pub sections: Vec<Sos>,
}

impl SosFilter {
    /// Design a digital Butterworth filter of the given order
    pub fn butterworth(order: usize, band: BandType) -> Result<Self, AnalysisError> {
        if order == 0 || order > MAX_ORDER {
            return Err(invalid(format!(
                "filter order must be between 1 and {}, got {}",
                MAX_ORDER, order
            )));
        }
        band.validate()?;

        let (zeros, poles, gain) = analog_design(order, band);
        let (zeros, poles, gain) = bilinear_zpk(&zeros, &poles, gain);
        Ok(Self {
            sections: zpk_to_sos(&zeros, &poles, gain),
        })
    }

    /// Causal filtering from a zero initial state
    pub fn filter(&self, data: &[f64]) -> Vec<f64> {
        let mut result = data.to_vec();
        for section in &self.sections {
            result = section.filter(&result, [0.0, 0.0]);
        }
        result
    }

    /// Zero-phase filtering using forward-backward passes with edge padding
    pub fn filtfilt(&self, data: &[f64]) -> Vec<f64> {
        if data.len() < 2 || self.sections.is_empty() {
            return data.to_vec();
        }

        let n = data.len();

        // Padding length: 3 taps per biquad coefficient set
        let pad_len = (3 * self.sections.len() * 2).min(n - 1).max(1);
        let padded = reflect_pad(data, pad_len);

        let mut forward = self.filter_steady(&padded);
        forward.reverse();
        let mut backward = self.filter_steady(&forward);
        backward.reverse();

        backward[pad_len..pad_len + n].to_vec()
    }

    /// Filter starting from the steady state for the first sample
    fn filter_steady(&self, data: &[f64]) -> Vec<f64> {
        let mut result = data.to_vec();
        for section in &self.sections {
            let x0 = result.first().copied().unwrap_or(0.0);
            let (zi, _) = section.steady_state(x0);
            result = section.filter(&result, zi);
        }
        result
    }

    /// Magnitude response of the whole cascade at normalized frequency `f`
    pub fn magnitude(&self, f: f64) -> f64 {
        self.sections.iter().map(|s| s.magnitude(f)).product()
    }
}

/// Reflect-pad the signal to reduce edge transients
/// Pads with reflected values at both ends
fn reflect_pad(data: &[f64], pad_len: usize) -> Vec<f64> {
    if data.len() < 2 {
        return data.to_vec();
    }

    let n = data.len();
    let pad_len = pad_len.min(n - 1);

    let mut padded = Vec::with_capacity(n + 2 * pad_len);

    // Left padding: reflect about first element
    for i in (1..=pad_len).rev() {
        padded.push(2.0 * data[0] - data[i]);
    }

    padded.extend_from_slice(data);

    // Right padding: reflect about last element
    for i in 1..=pad_len {
        padded.push(2.0 * data[n - 1] - data[n - 1 - i]);
    }

    padded
}

// ============================================================================
// Zero/pole/gain design
// ============================================================================

/// Sample rate used for the bilinear transform (any value works once the
/// edges are pre-warped with the same value)
const BILINEAR_FS: f64 = 2.0;

type Zpk = (Vec<Complex64>, Vec<Complex64>, f64);

/// Analog Butterworth prototype with the band transformation applied
fn analog_design(order: usize, band: BandType) -> Zpk {
    let prototype: Vec<Complex64> = (0..order)
        .map(|k| {
            let theta = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
            Complex64::from_polar(1.0, theta)
        })
        .collect();

    let warp = |f: f64| 2.0 * BILINEAR_FS * (PI * f).tan();
    let zero = Complex64::new(0.0, 0.0);

    match band {
        BandType::LowPass { cutoff } => {
            let wo = warp(cutoff);
            let poles = prototype.iter().map(|p| p * wo).collect();
            (vec![], poles, wo.powi(order as i32))
        }
        BandType::HighPass { cutoff } => {
            let wo = warp(cutoff);
            let poles = prototype.iter().map(|p| wo / p).collect();
            // Prototype poles multiply to (-1)^n, so the gain stays 1
            (vec![zero; order], poles, 1.0)
        }
        BandType::BandPass { low, high } => {
            let (wl, wh) = (warp(low), warp(high));
            let bw = wh - wl;
            let wo = (wl * wh).sqrt();
            let mut poles = Vec::with_capacity(2 * order);
            for p in &prototype {
                let scaled = p * (bw / 2.0);
                let root = (scaled * scaled - wo * wo).sqrt();
                poles.push(scaled + root);
                poles.push(scaled - root);
            }
            (vec![zero; order], poles, bw.powi(order as i32))
        }
        BandType::BandStop { low, high } => {
            let (wl, wh) = (warp(low), warp(high));
            let bw = wh - wl;
            let wo = (wl * wh).sqrt();
            let mut poles = Vec::with_capacity(2 * order);
            for p in &prototype {
                let inverted = (bw / 2.0) / p;
                let root = (inverted * inverted - wo * wo).sqrt();
                poles.push(inverted + root);
                poles.push(inverted - root);
            }
            let mut zeros = Vec::with_capacity(2 * order);
            for _ in 0..order {
                zeros.push(Complex64::new(0.0, wo));
                zeros.push(Complex64::new(0.0, -wo));
            }
            (zeros, poles, 1.0)
        }
    }
}

/// Map analog zeros/poles to the z plane
fn bilinear_zpk(zeros: &[Complex64], poles: &[Complex64], gain: f64) -> Zpk {
    let fs2 = Complex64::new(2.0 * BILINEAR_FS, 0.0);
    let map = |s: &Complex64| (fs2 + s) / (fs2 - s);

    let mut z: Vec<Complex64> = zeros.iter().map(map).collect();
    let p: Vec<Complex64> = poles.iter().map(map).collect();

    // Zeros at infinity land on Nyquist
    z.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(poles.len() - zeros.len()));

    let num: Complex64 = zeros.iter().map(|s| fs2 - s).product();
    let den: Complex64 = poles.iter().map(|s| fs2 - s).product();
    let k = gain * (num / den).re;

    (z, p, k)
}

/// Group roots into conjugate pairs and leftover real roots.
///
/// Roots with positive imaginary part stand for their conjugate pair.
fn split_roots(roots: &[Complex64]) -> (Vec<Complex64>, Vec<f64>) {
    const TOL: f64 = 1e-9;
    let mut pairs = Vec::new();
    let mut reals = Vec::new();
    for r in roots {
        if r.im.abs() <= TOL * r.norm().max(1.0) {
            reals.push(r.re);
        } else if r.im > 0.0 {
            pairs.push(*r);
        }
    }
    (pairs, reals)
}

/// Polynomial coefficients `[1, c1, c2]` of a section's roots
fn quadratic(pair: Option<Complex64>, reals: &[f64]) -> [f64; 2] {
    match (pair, reals) {
        (Some(r), _) => [-2.0 * r.re, r.norm_sqr()],
        (None, [a, b]) => [-(a + b), a * b],
        (None, [a]) => [-a, 0.0],
        _ => [0.0, 0.0],
    }
}

/// Convert zeros/poles/gain to cascaded biquads.
///
/// Pole pairs closest to the unit circle are emitted last; each pole group
/// takes the nearest remaining zeros.
fn zpk_to_sos(zeros: &[Complex64], poles: &[Complex64], gain: f64) -> Vec<Sos> {
    let (mut pole_pairs, mut pole_reals) = split_roots(poles);
    let (mut zero_pairs, mut zero_reals) = split_roots(zeros);

    pole_pairs.sort_by(|a, b| {
        (1.0 - a.norm())
            .abs()
            .partial_cmp(&(1.0 - b.norm()).abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .reverse()
    });

    // Each entry: one conjugate pair or up to two real poles
    let mut groups: Vec<(Option<Complex64>, Vec<f64>)> = Vec::new();
    while pole_reals.len() >= 2 {
        let b = pole_reals.pop().unwrap_or_default();
        let a = pole_reals.pop().unwrap_or_default();
        groups.push((None, vec![a, b]));
    }
    if let Some(a) = pole_reals.pop() {
        groups.push((None, vec![a]));
    }
    groups.extend(pole_pairs.drain(..).map(|p| (Some(p), Vec::new())));

    let mut sections = Vec::with_capacity(groups.len());
    for (pair, reals) in &groups {
        let order = if pair.is_some() { 2 } else { reals.len() };
        let anchor = pair.unwrap_or_else(|| Complex64::new(reals[0], 0.0));

        // Zeros for this section: a conjugate pair when one is left and the
        // section is second order, otherwise the nearest real zeros
        let mut zero_pair = None;
        let mut zero_real = Vec::new();
        if order == 2 && zero_reals.len() < 2 && !zero_pairs.is_empty() {
            zero_pair = Some(take_nearest(&mut zero_pairs, anchor));
        } else {
            while zero_real.len() < order && !zero_reals.is_empty() {
                let idx = nearest_real(&zero_reals, anchor);
                zero_real.push(zero_reals.remove(idx));
            }
        }

        let [b1, b2] = quadratic(zero_pair, &zero_real);
        let [a1, a2] = quadratic(*pair, reals);
        sections.push(Sos {
            b0: 1.0,
            b1,
            b2,
            a1,
            a2,
        });
    }

    if let Some(first) = sections.first_mut() {
        first.b0 *= gain;
        first.b1 *= gain;
        first.b2 *= gain;
    }

    sections
}

fn take_nearest(roots: &mut Vec<Complex64>, anchor: Complex64) -> Complex64 {
    let idx = roots
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (*a - anchor)
                .norm()
                .partial_cmp(&(*b - anchor).norm())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0);
    roots.remove(idx)
}

fn nearest_real(roots: &[f64], anchor: Complex64) -> usize {
    roots
        .iter()
        .enumerate()
        .min_by(|(_, &a), (_, &b)| {
            (Complex64::new(a, 0.0) - anchor)
                .norm()
                .partial_cmp(&(Complex64::new(b, 0.0) - anchor).norm())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}
