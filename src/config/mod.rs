// src/config/mod.rs
//! Batch configuration: defaults, file and environment layering, validation

pub mod constants;
pub mod loader;
pub mod processing_config;

pub use loader::ConfigLoader;
pub use processing_config::*;

use crate::error::{EmgError, EmgResult};
use crate::io::{CsvStore, SubjectPattern};
use crate::processing::batch::BatchOptions;
use crate::processing::features::FeatureExtractor;
use crate::processing::filters::bandpass::validate_bandpass;
use crate::processing::filters::NotchParams;
use crate::processing::outliers::OutlierDetector;
use crate::processing::pipeline::FilterStage;
use crate::processing::spectral::WelchConfig;
use processing_config::defaults;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Complete batch configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EmgConfig {
    /// Constant across every stage of a run
    #[serde(default = "defaults::sampling_rate_hz")]
    pub sampling_rate_hz: u32,

    /// Signal columns used wherever a section names none
    #[serde(default)]
    pub signal_columns: Vec<String>,

    #[serde(default)]
    pub io: IoConfig,

    #[serde(default)]
    pub filters: FilterDefaults,

    #[serde(default)]
    pub welch: WelchConfig,

    #[serde(default)]
    pub outliers: OutlierConfig,

    #[serde(default)]
    pub features: FeatureConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    /// Explicit stage chain; the standard chain runs when empty
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

impl Default for EmgConfig {
    fn default() -> Self {
        Self {
            sampling_rate_hz: defaults::sampling_rate_hz(),
            signal_columns: Vec::new(),
            io: IoConfig::default(),
            filters: FilterDefaults::default(),
            welch: WelchConfig::default(),
            outliers: OutlierConfig::default(),
            features: FeatureConfig::default(),
            batch: BatchConfig::default(),
            stages: Vec::new(),
        }
    }
}

impl EmgConfig {
    pub fn nyquist_hz(&self) -> f64 {
        self.sampling_rate_hz as f64 / 2.0
    }

    /// Validate configuration consistency, reporting every problem found
    pub fn validate_consistency(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let rate = self.sampling_rate_hz;

        if rate < constants::signal::MIN_SAMPLING_RATE_HZ {
            errors.push(format!("Sampling rate ({} Hz) must be positive", rate));
            // Every frequency check below depends on the rate
            return Err(errors);
        }

        if self.io.delimiter.len() != 1 {
            errors.push(format!("Delimiter `{}` must be a single ASCII character", self.io.delimiter));
        }
        if let Err(e) = SubjectPattern::new(&self.io.subject_pattern) {
            errors.push(e.to_string());
        }

        for &freq in &self.filters.notch_frequencies_hz {
            if let Err(e) = NotchParams::new(freq, self.filters.notch_q).validate(rate) {
                errors.push(e.to_string());
            }
        }
        if let Err(e) = validate_bandpass(
            self.filters.highpass_cutoff_hz,
            self.filters.lowpass_cutoff_hz,
            self.filters.filter_order,
            rate,
        ) {
            errors.push(e.to_string());
        }
        if self.filters.rms_window_samples == Some(0) {
            errors.push("RMS window must be at least one sample".to_string());
        }

        if let Err(e) = self.welch.validate() {
            errors.push(e.to_string());
        }

        for &freq in &self.outliers.target_frequencies_hz {
            if freq <= 0.0 || freq > self.nyquist_hz() {
                errors.push(format!(
                    "Outlier target ({} Hz) must lie in (0, {} Hz]",
                    freq,
                    self.nyquist_hz()
                ));
            }
        }
        if self.outliers.tolerance_hz < 0.0 {
            errors.push(format!("Outlier tolerance ({} Hz) must not be negative", self.outliers.tolerance_hz));
        }
        if self.outliers.threshold_ratio <= 0.0 {
            errors.push(format!("Outlier threshold ratio ({}) must be positive", self.outliers.threshold_ratio));
        }

        if self.features.window_samples < 2 {
            errors.push(format!(
                "Feature window ({} samples) must hold at least two samples",
                self.features.window_samples
            ));
        }
        if self.features.step_samples == 0 {
            errors.push("Feature step must advance by at least one sample".to_string());
        }

        let mut names = HashSet::new();
        for (index, stage) in self.stages.iter().enumerate() {
            if !names.insert(stage.stage_name()) {
                errors.push(format!("Stage {} reuses the name `{}`", index + 1, stage.stage_name()));
            }
            if let Err(e) = stage.filter.validate(rate) {
                errors.push(format!("Stage `{}`: {}", stage.stage_name(), e));
            }
            if let Some(overrides) = &stage.overrides {
                if let Err(e) = overrides.validate(rate) {
                    errors.push(format!("Stage `{}`: {}", stage.stage_name(), e));
                }
            }
            if let Some(expr) = &stage.match_expr {
                if let Err(e) = regex::Regex::new(expr) {
                    errors.push(format!("Stage `{}`: invalid match_expr: {}", stage.stage_name(), e));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn store(&self) -> EmgResult<CsvStore> {
        match self.io.delimiter.as_bytes() {
            [byte] => Ok(CsvStore::new(*byte)),
            _ => Err(EmgError::parameter("io.delimiter", "must be a single ASCII character")),
        }
    }

    pub fn batch_options(&self) -> EmgResult<BatchOptions> {
        Ok(BatchOptions {
            threads: self.batch.threads,
            max_failures: self.batch.max_failures,
            extension: Some(self.io.extension.clone()),
            subject_pattern: Some(SubjectPattern::new(&self.io.subject_pattern)?),
        })
    }

    /// Configured stages, or the standard chain when none are configured
    pub fn filter_stages(&self) -> EmgResult<Vec<FilterStage>> {
        if self.stages.is_empty() {
            return Ok(self.filters.standard_stages(&self.signal_columns));
        }
        self.stages.iter().map(|s| s.build(&self.signal_columns)).collect()
    }

    pub fn outlier_detector(&self) -> EmgResult<OutlierDetector> {
        let column = self
            .outliers
            .column
            .clone()
            .or_else(|| self.signal_columns.first().cloned())
            .ok_or_else(|| EmgError::parameter("outliers.column", "no column configured"))?;

        Ok(OutlierDetector::new(
            column,
            self.outliers.target_frequencies_hz.clone(),
            self.outliers.tolerance_hz,
            self.outliers.threshold_ratio,
        )
        .with_welch(self.welch.clone()))
    }

    pub fn feature_extractor(&self) -> FeatureExtractor {
        let columns = if self.features.columns.is_empty() {
            self.signal_columns.clone()
        } else {
            self.features.columns.clone()
        };
        FeatureExtractor::new(self.features.window_samples, self.features.step_samples, columns)
            .with_time_column(self.io.time_column.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = EmgConfig::default();
        assert_eq!(config.sampling_rate_hz, constants::signal::DEFAULT_SAMPLING_RATE_HZ);
        assert_eq!(config.io.delimiter, ",");
        assert!(config.validate_consistency().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = EmgConfig::default();
        config.signal_columns = vec!["EMG1".into(), "EMG2".into()];
        config.batch.max_failures = Some(3);

        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: EmgConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: EmgConfig = toml::from_str(
            r#"
sampling_rate_hz = 1000
signal_columns = ["EMG1"]

[outliers]
threshold_ratio = 5.0

[[stages]]
name = "powerline"
filter = { kind = "notch", notches = [{ center_hz = 50.0, q = 30.0 }] }

[[stages]]
filter = { kind = "bandpass", low_hz = 20.0, high_hz = 450.0 }
gap_fill = { method = "interpolate" }
"#,
        )
        .unwrap();

        assert_eq!(config.outliers.tolerance_hz, constants::outliers::DEFAULT_TOLERANCE_HZ);
        assert_eq!(config.features.window_samples, constants::features::DEFAULT_WINDOW_SAMPLES);
        assert!(config.validate_consistency().is_ok());

        let stages = config.filter_stages().unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].name(), "powerline");
        assert_eq!(stages[1].name(), "bandpass");
        assert_eq!(stages[1].columns(), &["EMG1".to_string()]);
        assert_eq!(config.outlier_detector().unwrap().targets_hz(), &[50.0, 60.0]);
    }

    #[test]
    fn test_config_validation_collects_errors() {
        let mut config = EmgConfig::default();
        config.sampling_rate_hz = 800;
        config.features.step_samples = 0;
        config.io.delimiter = ";;".into();

        // 450 Hz lowpass is above the 400 Hz Nyquist limit
        let errors = config.validate_consistency().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("Nyquist")));
    }

    #[test]
    fn test_zero_rate_is_reported_alone() {
        let mut config = EmgConfig::default();
        config.sampling_rate_hz = 0;
        assert_eq!(config.validate_consistency().unwrap_err().len(), 1);
    }

    #[test]
    fn test_outlier_column_fallback() {
        let mut config = EmgConfig::default();
        assert!(config.outlier_detector().is_err());
        config.signal_columns = vec!["EMG2".into()];
        assert!(config.outlier_detector().is_ok());
    }
}
