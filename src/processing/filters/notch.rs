// src/processing/filters/notch.rs
//! Notch filters for power line and other narrow-band interference

use super::iir::{Biquad, SosCascade};
use super::validate_sample_rate;
use crate::error::{EmgError, EmgResult};
use serde::{Deserialize, Serialize};

/// One notch: center frequency and quality factor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NotchParams {
    pub center_hz: f64,
    pub q: f64,
}

impl NotchParams {
    pub fn new(center_hz: f64, q: f64) -> Self {
        Self { center_hz, q }
    }

    /// Rejected bandwidth in Hz
    pub fn bandwidth_hz(&self) -> f64 {
        self.center_hz / self.q
    }

    pub fn validate(&self, sample_rate_hz: u32) -> EmgResult<()> {
        validate_sample_rate(sample_rate_hz)?;
        let nyquist = sample_rate_hz as f64 / 2.0;

        if !self.center_hz.is_finite() || self.center_hz <= 0.0 || self.center_hz >= nyquist {
            return Err(EmgError::parameter(
                "center_hz",
                format!("{} Hz must lie in (0, {} Hz)", self.center_hz, nyquist),
            ));
        }
        if !self.q.is_finite() || self.q <= 0.0 {
            return Err(EmgError::parameter(
                "q",
                format!("quality factor {} must be positive", self.q),
            ));
        }
        Ok(())
    }
}

/// Remove a narrow band around `params.center_hz`.
///
/// Zero-phase: the section runs forward then backward, so the output is
/// aligned with the input and has the same length.
pub fn apply_notch(signal: &[f64], sample_rate_hz: u32, params: NotchParams) -> EmgResult<Vec<f64>> {
    params.validate(sample_rate_hz)?;
    let section = Biquad::notch(params.center_hz, params.q, sample_rate_hz as f64);
    Ok(SosCascade::new(vec![section]).filtfilt(signal))
}

/// Apply each notch in order
pub fn apply_notches(signal: &[f64], sample_rate_hz: u32, notches: &[NotchParams]) -> EmgResult<Vec<f64>> {
    for notch in notches {
        notch.validate(sample_rate_hz)?;
    }

    let mut output = signal.to_vec();
    for notch in notches {
        output = apply_notch(&output, sample_rate_hz, *notch)?;
    }
    Ok(output)
}
