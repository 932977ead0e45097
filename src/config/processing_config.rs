// src/config/processing_config.rs
//! Section structures of the batch configuration file

use super::constants::{batch, features, filters, io, outliers, signal};
use crate::error::{EmgError, EmgResult};
use crate::processing::filters::{FilterSpec, NotchParams};
use crate::processing::missing::FillMethod;
use crate::processing::pipeline::{FilterStage, SubjectOverrides};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Table format and tree layout
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct IoConfig {
    #[serde(default = "defaults::delimiter")]
    pub delimiter: String,

    #[serde(default = "defaults::extension")]
    pub extension: String,

    #[serde(default = "defaults::time_column")]
    pub time_column: String,

    /// Regex with a named `subject` group and optional `file` group
    #[serde(default = "defaults::subject_pattern")]
    pub subject_pattern: String,
}

/// Parameters of the standard chain run when no stages are configured
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FilterDefaults {
    #[serde(default = "defaults::notch_frequencies_hz")]
    pub notch_frequencies_hz: Vec<f64>,

    #[serde(default = "defaults::notch_q")]
    pub notch_q: f64,

    #[serde(default = "defaults::highpass_cutoff_hz")]
    pub highpass_cutoff_hz: f64,

    #[serde(default = "defaults::lowpass_cutoff_hz")]
    pub lowpass_cutoff_hz: f64,

    #[serde(default = "defaults::filter_order")]
    pub filter_order: usize,

    /// Adds an RMS envelope stage when set
    #[serde(default)]
    pub rms_window_samples: Option<usize>,
}

impl FilterDefaults {
    pub fn notch_spec(&self) -> FilterSpec {
        FilterSpec::notch(
            self.notch_frequencies_hz
                .iter()
                .map(|&f| NotchParams::new(f, self.notch_q))
                .collect(),
        )
    }

    pub fn bandpass_spec(&self) -> FilterSpec {
        FilterSpec::Bandpass {
            low_hz: self.highpass_cutoff_hz,
            high_hz: self.lowpass_cutoff_hz,
            order: self.filter_order,
        }
    }

    /// Notch, bandpass and the optional envelope, in that order
    pub fn standard_stages(&self, columns: &[String]) -> Vec<FilterStage> {
        let mut stages = Vec::with_capacity(3);
        if !self.notch_frequencies_hz.is_empty() {
            stages.push(FilterStage::new("notch", self.notch_spec(), columns.to_vec()));
        }
        stages.push(FilterStage::new("bandpass", self.bandpass_spec(), columns.to_vec()));
        if let Some(window) = self.rms_window_samples {
            stages.push(FilterStage::new("envelope", FilterSpec::rms_smooth(window), columns.to_vec()));
        }
        stages
    }
}

/// Spectral outlier scan
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OutlierConfig {
    /// Falls back to the first signal column
    #[serde(default)]
    pub column: Option<String>,

    #[serde(default = "defaults::target_frequencies_hz")]
    pub target_frequencies_hz: Vec<f64>,

    #[serde(default = "defaults::tolerance_hz")]
    pub tolerance_hz: f64,

    #[serde(default = "defaults::threshold_ratio")]
    pub threshold_ratio: f64,
}

/// Sliding-window feature extraction
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FeatureConfig {
    #[serde(default = "defaults::window_samples")]
    pub window_samples: usize,

    #[serde(default = "defaults::step_samples")]
    pub step_samples: usize,

    /// Falls back to the signal columns
    #[serde(default)]
    pub columns: Vec<String>,
}

/// Worker pool and failure policy
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BatchConfig {
    /// Zero uses every available core
    #[serde(default = "defaults::threads")]
    pub threads: usize,

    #[serde(default)]
    pub max_failures: Option<usize>,
}

/// One configured filter stage
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StageConfig {
    /// Defaults to the filter kind
    #[serde(default)]
    pub name: Option<String>,

    pub filter: FilterSpec,

    /// Falls back to the signal columns
    #[serde(default)]
    pub columns: Vec<String>,

    #[serde(default)]
    pub overrides: Option<SubjectOverrides>,

    /// Regex on the relative path selecting files to filter
    #[serde(default)]
    pub match_expr: Option<String>,

    #[serde(default = "defaults::copy_unmatched")]
    pub copy_unmatched: bool,

    #[serde(default)]
    pub gap_fill: Option<FillMethod>,
}

impl StageConfig {
    pub fn stage_name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.filter.name())
    }

    pub fn build(&self, default_columns: &[String]) -> EmgResult<FilterStage> {
        let columns = if self.columns.is_empty() {
            default_columns.to_vec()
        } else {
            self.columns.clone()
        };

        let mut stage = FilterStage::new(self.stage_name(), self.filter.clone(), columns)
            .copy_unmatched(self.copy_unmatched);
        if let Some(overrides) = &self.overrides {
            stage = stage.with_overrides(overrides.clone());
        }
        if let Some(expr) = &self.match_expr {
            let regex = Regex::new(expr).map_err(|e| EmgError::parameter("match_expr", e.to_string()))?;
            stage = stage.with_match(regex);
        }
        if let Some(method) = self.gap_fill {
            stage = stage.with_gap_fill(method);
        }
        Ok(stage)
    }
}

pub(crate) mod defaults {
    use super::*;

    pub fn sampling_rate_hz() -> u32 { signal::DEFAULT_SAMPLING_RATE_HZ }

    pub fn delimiter() -> String { (io::DEFAULT_DELIMITER as char).to_string() }
    pub fn extension() -> String { io::DEFAULT_FILE_EXTENSION.to_string() }
    pub fn time_column() -> String { signal::DEFAULT_TIME_COLUMN.to_string() }
    pub fn subject_pattern() -> String { io::DEFAULT_SUBJECT_PATTERN.to_string() }

    pub fn notch_frequencies_hz() -> Vec<f64> { filters::DEFAULT_NOTCH_FREQUENCIES_HZ.to_vec() }
    pub fn notch_q() -> f64 { filters::DEFAULT_NOTCH_Q }
    pub fn highpass_cutoff_hz() -> f64 { filters::DEFAULT_HIGHPASS_CUTOFF_HZ }
    pub fn lowpass_cutoff_hz() -> f64 { filters::DEFAULT_LOWPASS_CUTOFF_HZ }
    pub fn filter_order() -> usize { filters::DEFAULT_FILTER_ORDER }

    pub fn target_frequencies_hz() -> Vec<f64> { outliers::DEFAULT_TARGET_FREQUENCIES_HZ.to_vec() }
    pub fn tolerance_hz() -> f64 { outliers::DEFAULT_TOLERANCE_HZ }
    pub fn threshold_ratio() -> f64 { outliers::DEFAULT_THRESHOLD_RATIO }

    pub fn window_samples() -> usize { features::DEFAULT_WINDOW_SAMPLES }
    pub fn step_samples() -> usize { features::DEFAULT_STEP_SAMPLES }

    pub fn threads() -> usize { batch::DEFAULT_WORKER_THREADS }
    pub fn copy_unmatched() -> bool { true }
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            delimiter: defaults::delimiter(),
            extension: defaults::extension(),
            time_column: defaults::time_column(),
            subject_pattern: defaults::subject_pattern(),
        }
    }
}

impl Default for FilterDefaults {
    fn default() -> Self {
        Self {
            notch_frequencies_hz: defaults::notch_frequencies_hz(),
            notch_q: defaults::notch_q(),
            highpass_cutoff_hz: defaults::highpass_cutoff_hz(),
            lowpass_cutoff_hz: defaults::lowpass_cutoff_hz(),
            filter_order: defaults::filter_order(),
            rms_window_samples: None,
        }
    }
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            column: None,
            target_frequencies_hz: defaults::target_frequencies_hz(),
            tolerance_hz: defaults::tolerance_hz(),
            threshold_ratio: defaults::threshold_ratio(),
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            window_samples: defaults::window_samples(),
            step_samples: defaults::step_samples(),
            columns: Vec::new(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            threads: defaults::threads(),
            max_failures: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::pipeline::OverrideMode;

    #[test]
    fn test_standard_stages() {
        let mut defaults = FilterDefaults::default();
        let columns = vec!["EMG1".to_string()];
        let names: Vec<String> = defaults.standard_stages(&columns).iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["notch", "bandpass"]);

        defaults.rms_window_samples = Some(50);
        defaults.notch_frequencies_hz.clear();
        let names: Vec<String> = defaults.standard_stages(&columns).iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["bandpass", "envelope"]);
    }

    #[test]
    fn test_stage_config_from_toml() {
        let stage: StageConfig = toml::from_str(
            r#"
filter = { kind = "notch", notches = [{ center_hz = 50.0, q = 30.0 }] }
match_expr = "^S(08|11)/"

[overrides]
mode = "append"

[overrides.subjects.S08]
kind = "notch"
notches = [{ center_hz = 100.0, q = 30.0 }]
"#,
        )
        .unwrap();

        assert_eq!(stage.stage_name(), "notch");
        assert!(stage.copy_unmatched);
        let overrides = stage.overrides.as_ref().unwrap();
        assert_eq!(overrides.mode, OverrideMode::Append);
        assert!(overrides.get("S08").is_some());

        let built = stage.build(&["EMG1".to_string()]).unwrap();
        assert_eq!(built.columns(), &["EMG1".to_string()]);
    }

    #[test]
    fn test_bad_match_expr_is_parameter_error() {
        let stage = StageConfig {
            name: Some("broken".into()),
            filter: FilterSpec::rms_smooth(10),
            columns: vec!["EMG1".into()],
            overrides: None,
            match_expr: Some("(unclosed".into()),
            copy_unmatched: true,
            gap_fill: None,
        };
        assert!(stage.build(&[]).is_err());
    }
}
