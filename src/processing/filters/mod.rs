// src/processing/filters/mod.rs
//! Digital filters for EMG recordings
//!
//! All filters here are pure: they take a sample slice and return a new
//! vector of the same length, with no I/O and no hidden state.

pub mod iir;
pub mod notch;
pub mod bandpass;
pub mod smoothing;

pub use iir::{Biquad, SosCascade};
pub use notch::{apply_notch, apply_notches, NotchParams};
pub use bandpass::{apply_bandpass, apply_bandpass_with_order, BandpassDesign};
pub use smoothing::apply_rms_smooth;

use crate::config::constants::filters::DEFAULT_FILTER_ORDER;
use crate::error::{EmgError, EmgResult};
use serde::{Deserialize, Serialize};

/// Filter parameter set for one stage invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterSpec {
    /// Notches applied in sequence
    Notch { notches: Vec<NotchParams> },
    /// Zero-phase Butterworth bandpass
    Bandpass {
        low_hz: f64,
        high_hz: f64,
        #[serde(default = "default_order")]
        order: usize,
    },
    /// Centered RMS envelope
    RmsSmooth { window: usize },
}

fn default_order() -> usize {
    DEFAULT_FILTER_ORDER
}

impl FilterSpec {
    pub fn notch(notches: Vec<NotchParams>) -> Self {
        FilterSpec::Notch { notches }
    }

    pub fn bandpass(low_hz: f64, high_hz: f64) -> Self {
        FilterSpec::Bandpass { low_hz, high_hz, order: DEFAULT_FILTER_ORDER }
    }

    pub fn rms_smooth(window: usize) -> Self {
        FilterSpec::RmsSmooth { window }
    }

    /// Short name used in logs and stage directory names
    pub fn name(&self) -> &'static str {
        match self {
            FilterSpec::Notch { .. } => "notch",
            FilterSpec::Bandpass { .. } => "bandpass",
            FilterSpec::RmsSmooth { .. } => "rms_smooth",
        }
    }

    /// Fail-fast check of every parameter against the sampling rate
    pub fn validate(&self, sample_rate_hz: u32) -> EmgResult<()> {
        match self {
            FilterSpec::Notch { notches } => {
                if notches.is_empty() {
                    return Err(EmgError::parameter("notches", "at least one notch is required"));
                }
                notches.iter().try_for_each(|n| n.validate(sample_rate_hz))
            }
            FilterSpec::Bandpass { low_hz, high_hz, order } => {
                bandpass::validate_bandpass(*low_hz, *high_hz, *order, sample_rate_hz)
            }
            FilterSpec::RmsSmooth { window } => {
                if *window == 0 {
                    return Err(EmgError::parameter("window", "RMS window must be at least one sample"));
                }
                Ok(())
            }
        }
    }

    /// Run the filter over one signal
    pub fn apply(&self, signal: &[f64], sample_rate_hz: u32) -> EmgResult<Vec<f64>> {
        match self {
            FilterSpec::Notch { notches } => apply_notches(signal, sample_rate_hz, notches),
            FilterSpec::Bandpass { low_hz, high_hz, order } => {
                apply_bandpass_with_order(signal, sample_rate_hz, *low_hz, *high_hz, *order)
            }
            FilterSpec::RmsSmooth { window } => apply_rms_smooth(signal, *window),
        }
    }
}

pub(crate) fn validate_sample_rate(sample_rate_hz: u32) -> EmgResult<()> {
    if sample_rate_hz == 0 {
        return Err(EmgError::parameter("sample_rate_hz", "sampling rate must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_validation() {
        assert!(FilterSpec::bandpass(20.0, 450.0).validate(2000).is_ok());
        assert!(FilterSpec::bandpass(20.0, 450.0).validate(800).is_err());
        assert!(FilterSpec::notch(vec![]).validate(2000).is_err());
        assert!(FilterSpec::rms_smooth(0).validate(2000).is_err());
        assert!(FilterSpec::rms_smooth(50).validate(0).is_ok());
        assert!(FilterSpec::notch(vec![NotchParams::new(50.0, 30.0)]).validate(0).is_err());
    }

    #[test]
    fn test_spec_toml_roundtrip() {
        let toml_str = r#"
kind = "notch"
notches = [{ center_hz = 50.0, q = 30.0 }, { center_hz = 150.0, q = 30.0 }]
"#;
        let spec: FilterSpec = toml::from_str(toml_str).unwrap();
        assert_eq!(
            spec,
            FilterSpec::notch(vec![NotchParams::new(50.0, 30.0), NotchParams::new(150.0, 30.0)])
        );

        let spec: FilterSpec = toml::from_str("kind = \"bandpass\"\nlow_hz = 20.0\nhigh_hz = 450.0").unwrap();
        assert_eq!(spec, FilterSpec::bandpass(20.0, 450.0));
    }

    #[test]
    fn test_apply_dispatch_preserves_length() {
        let signal: Vec<f64> = (0..500).map(|i| (i as f64 * 0.37).sin()).collect();
        for spec in [
            FilterSpec::notch(vec![NotchParams::new(50.0, 30.0)]),
            FilterSpec::bandpass(20.0, 450.0),
            FilterSpec::rms_smooth(25),
        ] {
            assert_eq!(spec.apply(&signal, 2000).unwrap().len(), signal.len(), "{}", spec.name());
        }
    }
}
