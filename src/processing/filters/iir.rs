// src/processing/filters/iir.rs
//! IIR (Infinite Impulse Response) second-order sections and zero-phase filtering

use crate::config::constants::filters::FILTFILT_PAD_PER_SECTION;
use std::f64::consts::PI;

/// Second-order section, coefficients normalized so that `a0 == 1`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Biquad {
    /// Notch centered on `center_hz` with bandwidth `center_hz / q`
    pub fn notch(center_hz: f64, q: f64, sample_rate_hz: f64) -> Self {
        let omega = 2.0 * PI * center_hz / sample_rate_hz;
        let cos_omega = omega.cos();
        let alpha = omega.sin() / (2.0 * q);
        let norm = 1.0 + alpha;

        Self {
            b0: 1.0 / norm,
            b1: -2.0 * cos_omega / norm,
            b2: 1.0 / norm,
            a1: -2.0 * cos_omega / norm,
            a2: (1.0 - alpha) / norm,
        }
    }

    /// Low-pass section via the bilinear transform with pre-warped cutoff
    pub fn lowpass(cutoff_hz: f64, q: f64, sample_rate_hz: f64) -> Self {
        let omega = 2.0 * PI * cutoff_hz / sample_rate_hz;
        let cos_omega = omega.cos();
        let alpha = omega.sin() / (2.0 * q);
        let norm = 1.0 + alpha;

        Self {
            b0: (1.0 - cos_omega) / 2.0 / norm,
            b1: (1.0 - cos_omega) / norm,
            b2: (1.0 - cos_omega) / 2.0 / norm,
            a1: -2.0 * cos_omega / norm,
            a2: (1.0 - alpha) / norm,
        }
    }

    /// High-pass section via the bilinear transform with pre-warped cutoff
    pub fn highpass(cutoff_hz: f64, q: f64, sample_rate_hz: f64) -> Self {
        let omega = 2.0 * PI * cutoff_hz / sample_rate_hz;
        let cos_omega = omega.cos();
        let alpha = omega.sin() / (2.0 * q);
        let norm = 1.0 + alpha;

        Self {
            b0: (1.0 + cos_omega) / 2.0 / norm,
            b1: -(1.0 + cos_omega) / norm,
            b2: (1.0 + cos_omega) / 2.0 / norm,
            a1: -2.0 * cos_omega / norm,
            a2: (1.0 - alpha) / norm,
        }
    }

    /// Gain at 0 Hz
    pub fn dc_gain(&self) -> f64 {
        let denominator = 1.0 + self.a1 + self.a2;
        if denominator.abs() < f64::EPSILON {
            0.0
        } else {
            (self.b0 + self.b1 + self.b2) / denominator
        }
    }

    /// Filter in Direct Form II transposed, state primed for a constant
    /// input of `initial` so a DC offset produces no start-up transient.
    fn filter_primed(&self, input: &[f64], initial: f64, output: &mut Vec<f64>) {
        let gain = self.dc_gain();
        let steady = gain * initial;
        let mut z2 = self.b2 * initial - self.a2 * steady;
        let mut z1 = self.b1 * initial - self.a1 * steady + z2;

        output.clear();
        output.reserve(input.len());
        for &x in input {
            let y = self.b0 * x + z1;
            z1 = self.b1 * x - self.a1 * y + z2;
            z2 = self.b2 * x - self.a2 * y;
            output.push(y);
        }
    }
}

/// Butterworth section quality factors for an even `order`
pub fn butterworth_qs(order: usize) -> Vec<f64> {
    (0..order / 2)
        .map(|k| {
            let theta = PI * (2 * k + 1) as f64 / (2 * order) as f64;
            1.0 / (2.0 * theta.cos())
        })
        .collect()
}

/// Cascade of second-order sections applied in sequence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SosCascade {
    sections: Vec<Biquad>,
}

impl SosCascade {
    pub fn new(sections: Vec<Biquad>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Single causal pass through every section
    pub fn filter(&self, input: &[f64]) -> Vec<f64> {
        let initial = input.first().copied().unwrap_or(0.0);
        self.run(input, initial)
    }

    /// Zero-phase forward-backward filtering with odd-reflection edge padding.
    ///
    /// Output length always equals input length; the magnitude response is the
    /// square of the single-pass response and the phase response is zero.
    pub fn filtfilt(&self, input: &[f64]) -> Vec<f64> {
        let n = input.len();
        if n == 0 || self.sections.is_empty() {
            return input.to_vec();
        }

        let pad = (FILTFILT_PAD_PER_SECTION * self.sections.len()).min(n - 1);
        let padded = odd_extend(input, pad);

        let forward = self.run(&padded, padded[0]);
        let mut backward: Vec<f64> = forward.into_iter().rev().collect();
        let initial = backward[0];
        backward = self.run(&backward, initial);
        backward.reverse();

        backward[pad..pad + n].to_vec()
    }

    fn run(&self, input: &[f64], initial: f64) -> Vec<f64> {
        let mut current = input.to_vec();
        let mut scratch = Vec::with_capacity(input.len());
        let mut stage_initial = initial;

        for section in &self.sections {
            section.filter_primed(&current, stage_initial, &mut scratch);
            stage_initial *= section.dc_gain();
            std::mem::swap(&mut current, &mut scratch);
        }

        current
    }
}

/// Extend both ends by point reflection through the edge samples
fn odd_extend(input: &[f64], pad: usize) -> Vec<f64> {
    let n = input.len();
    let first = input[0];
    let last = input[n - 1];

    let mut padded = Vec::with_capacity(n + 2 * pad);
    padded.extend((1..=pad).rev().map(|i| 2.0 * first - input[i]));
    padded.extend_from_slice(input);
    padded.extend((1..=pad).map(|i| 2.0 * last - input[n - 1 - i]));
    padded
}
