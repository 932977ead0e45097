// src/processing/features/frequency.rs
//! Frequency domain descriptors computed from a window's own spectrum

use crate::error::EmgResult;
use crate::processing::spectral::{compute_psd, PsdTable, WelchConfig};

/// Spectral descriptors of one window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralDescriptors {
    pub centroid_hz: f64,
    pub peak_hz: f64,
}

/// Single Hann-windowed periodogram spanning the window
pub fn window_psd(window: &[f64], sample_rate_hz: u32) -> EmgResult<PsdTable> {
    let config = WelchConfig {
        segment_length: window.len(),
        overlap: 0.0,
    };
    compute_psd(window, sample_rate_hz, &config)
}

pub fn spectral_descriptors(window: &[f64], sample_rate_hz: u32) -> EmgResult<SpectralDescriptors> {
    let psd = window_psd(window, sample_rate_hz)?;
    Ok(SpectralDescriptors {
        centroid_hz: psd.spectral_centroid(),
        peak_hz: psd.peak().map_or(0.0, |p| p.frequency_hz),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_tone_descriptors() {
        // 125 Hz sits exactly on bin 32 of a 256-point window at 1 kHz
        let window: Vec<f64> = (0..256).map(|i| (2.0 * PI * 125.0 * i as f64 / 1000.0).sin()).collect();
        let descriptors = spectral_descriptors(&window, 1000).unwrap();
        assert!((descriptors.peak_hz - 125.0).abs() < 1e-9);
        assert!((descriptors.centroid_hz - 125.0).abs() < 1.0);
    }

    #[test]
    fn test_constant_window_has_no_spectrum() {
        let descriptors = spectral_descriptors(&[3.0; 128], 1000).unwrap();
        assert_eq!(descriptors.centroid_hz, 0.0);
        assert_eq!(descriptors.peak_hz, 0.0);
    }
}
