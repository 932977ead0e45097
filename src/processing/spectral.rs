// src/processing/spectral.rs
//! Power spectral density estimation (Welch's method) and PSD queries

use crate::config::constants::spectral::{DEFAULT_WELCH_OVERLAP, DEFAULT_WELCH_SEGMENT};
use crate::error::{EmgError, EmgResult};
use crate::processing::filters::validate_sample_rate;
use crate::processing::windowing::hann_window;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

/// Welch estimator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelchConfig {
    /// Segment length in samples, clipped to the signal length
    #[serde(default = "default_segment")]
    pub segment_length: usize,
    /// Fraction of each segment shared with the next, in `[0, 1)`
    #[serde(default = "default_overlap")]
    pub overlap: f64,
}

fn default_segment() -> usize {
    DEFAULT_WELCH_SEGMENT
}

fn default_overlap() -> f64 {
    DEFAULT_WELCH_OVERLAP
}

impl Default for WelchConfig {
    fn default() -> Self {
        Self {
            segment_length: default_segment(),
            overlap: default_overlap(),
        }
    }
}

impl WelchConfig {
    /// One segment spanning the whole signal
    pub fn full_signal() -> Self {
        Self {
            segment_length: usize::MAX,
            overlap: 0.0,
        }
    }

    pub fn validate(&self) -> EmgResult<()> {
        if self.segment_length < 2 {
            return Err(EmgError::parameter("segment_length", "Welch segments need at least two samples"));
        }
        if !(0.0..1.0).contains(&self.overlap) {
            return Err(EmgError::parameter("overlap", format!("{} must lie in [0, 1)", self.overlap)));
        }
        Ok(())
    }
}

/// One PSD row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PsdPoint {
    pub frequency_hz: f64,
    /// Power density in (signal unit)^2 / Hz
    pub power: f64,
}

/// PSD rows in ascending frequency
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PsdTable {
    points: Vec<PsdPoint>,
}

impl PsdTable {
    pub fn new(points: Vec<PsdPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[PsdPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn frequencies(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.frequency_hz)
    }

    pub fn powers(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.power)
    }

    /// Spacing between adjacent frequency rows
    pub fn resolution_hz(&self) -> Option<f64> {
        match self.points.as_slice() {
            [first, second, ..] => Some(second.frequency_hz - first.frequency_hz),
            _ => None,
        }
    }

    /// Mean power over all rows
    pub fn mean_power(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.powers().sum::<f64>() / self.points.len() as f64
    }

    /// Row with the largest power; the lowest frequency wins ties
    pub fn peak(&self) -> Option<PsdPoint> {
        self.points.iter().copied().fold(None, |best, point| match best {
            Some(b) if b.power >= point.power => Some(b),
            _ => Some(point),
        })
    }

    /// Power-weighted mean frequency; zero when the table carries no power
    pub fn spectral_centroid(&self) -> f64 {
        let total: f64 = self.powers().sum();
        if total <= 0.0 {
            return 0.0;
        }
        self.points.iter().map(|p| p.frequency_hz * p.power).sum::<f64>() / total
    }
}

/// Estimate the one-sided PSD of `signal` with Welch's method.
///
/// Segments are Hann-windowed after removing their mean, and the averaged
/// periodograms are scaled to a density so that integrating over frequency
/// gives the signal variance.
pub fn compute_psd(signal: &[f64], sample_rate_hz: u32, config: &WelchConfig) -> EmgResult<PsdTable> {
    validate_sample_rate(sample_rate_hz)?;
    config.validate()?;
    if signal.len() < 2 {
        return Err(EmgError::data(
            "signal",
            format!("PSD needs at least two samples, got {}", signal.len()),
        ));
    }
    if signal.iter().any(|x| !x.is_finite()) {
        return Err(EmgError::data("signal", "PSD input contains missing or non-finite samples"));
    }

    let rate = sample_rate_hz as f64;
    let segment = config.segment_length.min(signal.len());
    let overlap = ((segment as f64 * config.overlap) as usize).min(segment - 1);
    let step = segment - overlap;

    let window = hann_window(segment);
    let window_power: f64 = window.iter().map(|w| w * w).sum();
    let scale = 1.0 / (rate * window_power);

    let bins = segment / 2 + 1;
    let fft = FftPlanner::<f64>::new().plan_fft_forward(segment);
    let mut accumulated = vec![0.0; bins];
    let mut buffer = vec![Complex::new(0.0, 0.0); segment];
    let mut segments = 0usize;

    let mut start = 0;
    while start + segment <= signal.len() {
        let chunk = &signal[start..start + segment];
        let mean = chunk.iter().sum::<f64>() / segment as f64;
        for ((slot, &x), &w) in buffer.iter_mut().zip(chunk).zip(&window) {
            *slot = Complex::new((x - mean) * w, 0.0);
        }
        fft.process(&mut buffer);

        for (acc, value) in accumulated.iter_mut().zip(&buffer[..bins]) {
            *acc += value.norm_sqr();
        }
        segments += 1;
        start += step;
    }

    let points = accumulated
        .into_iter()
        .enumerate()
        .map(|(k, sum)| {
            let mut power = sum * scale / segments as f64;
            // DC and (for even segments) Nyquist have no mirrored negative bin
            let unpaired = k == 0 || (segment % 2 == 0 && k == bins - 1);
            if !unpaired {
                power *= 2.0;
            }
            PsdPoint {
                frequency_hz: k as f64 * rate / segment as f64,
                power,
            }
        })
        .collect();

    Ok(PsdTable::new(points))
}

/// Rows with `low_hz <= frequency <= high_hz`, in their original order
pub fn zoom_frequency_range(psd: &PsdTable, low_hz: f64, high_hz: f64) -> PsdTable {
    PsdTable::new(
        psd.points
            .iter()
            .filter(|p| p.frequency_hz >= low_hz && p.frequency_hz <= high_hz)
            .copied()
            .collect(),
    )
}

/// Power integrated over `[low_hz, high_hz]` (rectangle rule)
pub fn band_power(psd: &PsdTable, low_hz: f64, high_hz: f64) -> f64 {
    let resolution = psd.resolution_hz().unwrap_or(1.0);
    zoom_frequency_range(psd, low_hz, high_hz).powers().sum::<f64>() * resolution
}

/// Before/after spectra of one signal, handed to external renderers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumComparison {
    pub before: PsdTable,
    pub after: PsdTable,
}

impl SpectrumComparison {
    pub fn between(before: &[f64], after: &[f64], sample_rate_hz: u32, config: &WelchConfig) -> EmgResult<Self> {
        Ok(Self {
            before: compute_psd(before, sample_rate_hz, config)?,
            after: compute_psd(after, sample_rate_hz, config)?,
        })
    }

    /// Band power change in dB; negative means the band was attenuated
    pub fn attenuation_db(&self, low_hz: f64, high_hz: f64) -> f64 {
        let before = band_power(&self.before, low_hz, high_hz);
        let after = band_power(&self.after, low_hz, high_hz);
        10.0 * ((after + f64::MIN_POSITIVE) / (before + f64::MIN_POSITIVE)).log10()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq_hz: f64, rate: f64, n: usize, amplitude: f64) -> Vec<f64> {
        (0..n).map(|i| amplitude * (2.0 * PI * freq_hz * i as f64 / rate).sin()).collect()
    }

    #[test]
    fn test_peak_at_sine_frequency() {
        let psd = compute_psd(&sine(50.0, 1000.0, 4000, 1.0), 1000, &WelchConfig::default()).unwrap();
        let resolution = psd.resolution_hz().unwrap();
        assert!((resolution - 1000.0 / 256.0).abs() < 1e-9);

        let peak = psd.peak().unwrap();
        assert!((peak.frequency_hz - 50.0).abs() <= resolution);
    }

    #[test]
    fn test_frequency_axis() {
        let psd = compute_psd(&sine(10.0, 200.0, 1000, 1.0), 200, &WelchConfig::default()).unwrap();
        assert_eq!(psd.len(), 129);
        assert_eq!(psd.points()[0].frequency_hz, 0.0);
        assert!((psd.points()[128].frequency_hz - 100.0).abs() < 1e-9);
        assert!(psd.frequencies().zip(psd.frequencies().skip(1)).all(|(a, b)| a < b));
    }

    #[test]
    fn test_density_integrates_to_variance() {
        // Sine of amplitude 2 has variance 2
        let psd = compute_psd(&sine(125.0, 1000.0, 8192, 2.0), 1000, &WelchConfig::default()).unwrap();
        let total = band_power(&psd, 0.0, 500.0);
        assert!((total - 2.0).abs() < 0.1, "integrated power {}", total);
    }

    #[test]
    fn test_short_signal_uses_single_segment() {
        let psd = compute_psd(&sine(10.0, 100.0, 64, 1.0), 100, &WelchConfig::default()).unwrap();
        assert_eq!(psd.len(), 33);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(compute_psd(&[1.0], 1000, &WelchConfig::default()).is_err());
        assert!(compute_psd(&[1.0, f64::NAN, 2.0], 1000, &WelchConfig::default()).is_err());
        let bad = WelchConfig { segment_length: 256, overlap: 1.0 };
        assert!(compute_psd(&[0.0; 512], 1000, &bad).is_err());
    }

    #[test]
    fn test_zoom_inclusive_and_ordered() {
        let psd = PsdTable::new(
            (0..10)
                .map(|k| PsdPoint { frequency_hz: k as f64, power: 1.0 })
                .collect(),
        );
        let zoomed = zoom_frequency_range(&psd, 2.0, 5.0);
        let freqs: Vec<f64> = zoomed.frequencies().collect();
        assert_eq!(freqs, vec![2.0, 3.0, 4.0, 5.0]);
        assert!(zoom_frequency_range(&psd, 5.5, 5.9).is_empty());
    }

    #[test]
    fn test_centroid_and_peak() {
        let psd = PsdTable::new(vec![
            PsdPoint { frequency_hz: 10.0, power: 1.0 },
            PsdPoint { frequency_hz: 20.0, power: 3.0 },
            PsdPoint { frequency_hz: 30.0, power: 3.0 },
        ]);
        assert!((psd.spectral_centroid() - (10.0 + 60.0 + 90.0) / 7.0).abs() < 1e-12);
        assert_eq!(psd.peak().unwrap().frequency_hz, 20.0);
        assert!((psd.mean_power() - 7.0 / 3.0).abs() < 1e-12);
        assert_eq!(PsdTable::default().spectral_centroid(), 0.0);
    }

    #[test]
    fn test_comparison_attenuation() {
        let before = sine(60.0, 1000.0, 4096, 1.0);
        let after: Vec<f64> = before.iter().map(|x| x * 0.1).collect();
        let comparison = SpectrumComparison::between(&before, &after, 1000, &WelchConfig::default()).unwrap();
        assert!((comparison.attenuation_db(55.0, 65.0) + 20.0).abs() < 1e-6);
    }
}
