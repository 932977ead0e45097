// src/processing/filters/bandpass.rs
//! Zero-phase Butterworth bandpass

use super::iir::{butterworth_qs, Biquad, SosCascade};
use super::validate_sample_rate;
use crate::config::constants::filters::{DEFAULT_FILTER_ORDER, MAX_FILTER_ORDER, MIN_FILTER_ORDER};
use crate::error::{EmgError, EmgResult};

/// Butterworth bandpass design: a high-pass cascade at `low_hz` followed by a
/// low-pass cascade at `high_hz`, each of the given even order.
#[derive(Debug, Clone, PartialEq)]
pub struct BandpassDesign {
    pub low_hz: f64,
    pub high_hz: f64,
    pub order: usize,
    cascade: SosCascade,
}

impl BandpassDesign {
    pub fn new(low_hz: f64, high_hz: f64, order: usize, sample_rate_hz: u32) -> EmgResult<Self> {
        validate_bandpass(low_hz, high_hz, order, sample_rate_hz)?;

        let rate = sample_rate_hz as f64;
        let qs = butterworth_qs(order);
        let sections = qs
            .iter()
            .map(|&q| Biquad::highpass(low_hz, q, rate))
            .chain(qs.iter().map(|&q| Biquad::lowpass(high_hz, q, rate)))
            .collect();

        Ok(Self {
            low_hz,
            high_hz,
            order,
            cascade: SosCascade::new(sections),
        })
    }

    pub fn apply(&self, signal: &[f64]) -> Vec<f64> {
        self.cascade.filtfilt(signal)
    }
}

/// Check cutoffs against each other and against Nyquist
pub fn validate_bandpass(low_hz: f64, high_hz: f64, order: usize, sample_rate_hz: u32) -> EmgResult<()> {
    validate_sample_rate(sample_rate_hz)?;
    let nyquist = sample_rate_hz as f64 / 2.0;

    if !low_hz.is_finite() || !high_hz.is_finite() {
        return Err(EmgError::parameter("cutoff", "cutoff frequencies must be finite"));
    }
    if low_hz <= 0.0 {
        return Err(EmgError::parameter("low_hz", format!("{} Hz must be positive", low_hz)));
    }
    if low_hz >= high_hz {
        return Err(EmgError::parameter(
            "low_hz",
            format!("low cutoff {} Hz must be below high cutoff {} Hz", low_hz, high_hz),
        ));
    }
    if high_hz >= nyquist {
        return Err(EmgError::parameter(
            "high_hz",
            format!("{} Hz must be below Nyquist ({} Hz)", high_hz, nyquist),
        ));
    }
    if order < MIN_FILTER_ORDER || order > MAX_FILTER_ORDER || order % 2 != 0 {
        return Err(EmgError::parameter(
            "order",
            format!("order {} must be even and within {}..={}", order, MIN_FILTER_ORDER, MAX_FILTER_ORDER),
        ));
    }
    Ok(())
}

/// Keep energy within `[low_hz, high_hz]` using the default filter order
pub fn apply_bandpass(signal: &[f64], sample_rate_hz: u32, low_hz: f64, high_hz: f64) -> EmgResult<Vec<f64>> {
    apply_bandpass_with_order(signal, sample_rate_hz, low_hz, high_hz, DEFAULT_FILTER_ORDER)
}

pub fn apply_bandpass_with_order(
    signal: &[f64],
    sample_rate_hz: u32,
    low_hz: f64,
    high_hz: f64,
    order: usize,
) -> EmgResult<Vec<f64>> {
    let design = BandpassDesign::new(low_hz, high_hz, order, sample_rate_hz)?;
    Ok(design.apply(signal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::f64::consts::PI;

    fn tone(freq_hz: f64, rate: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| (2.0 * PI * freq_hz * i as f64 / rate).sin()).collect()
    }

    fn interior_rms(data: &[f64]) -> f64 {
        let interior = &data[data.len() / 4..3 * data.len() / 4];
        (interior.iter().map(|x| x * x).sum::<f64>() / interior.len() as f64).sqrt()
    }

    #[test]
    fn test_design_section_count() {
        let design = BandpassDesign::new(20.0, 450.0, 4, 2000).unwrap();
        assert_eq!(design.cascade.sections().len(), 4);
    }

    #[test]
    fn test_passband_and_stopband() {
        let rate = 2000;
        let pass = apply_bandpass(&tone(100.0, rate as f64, 4000), rate, 20.0, 450.0).unwrap();
        let stop_low = apply_bandpass(&tone(2.0, rate as f64, 4000), rate, 20.0, 450.0).unwrap();
        let stop_high = apply_bandpass(&tone(900.0, rate as f64, 4000), rate, 20.0, 450.0).unwrap();

        assert!(interior_rms(&pass) > 0.95 * std::f64::consts::FRAC_1_SQRT_2);
        assert!(interior_rms(&stop_low) < 0.01);
        assert!(interior_rms(&stop_high) < 0.01);
    }

    #[test]
    fn test_invalid_cutoffs() {
        let signal = vec![0.0; 32];
        for (low, high) in [(100.0, 50.0), (50.0, 50.0), (20.0, 1000.0), (1200.0, 1500.0), (0.0, 100.0)] {
            let err = apply_bandpass(&signal, 2000, low, high).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Parameter, "({}, {})", low, high);
        }
    }

    #[test]
    fn test_invalid_order() {
        assert!(apply_bandpass_with_order(&[0.0; 8], 2000, 20.0, 450.0, 3).is_err());
        assert!(apply_bandpass_with_order(&[0.0; 8], 2000, 20.0, 450.0, 10).is_err());
        assert!(apply_bandpass_with_order(&[0.0; 8], 2000, 20.0, 450.0, 2).is_ok());
    }
}
