// src/processing/outliers.rs
//! Spectral outlier detection
//!
//! Flags recordings whose power near a target frequency (typically mains
//! interference) stands out against the mean power of the whole spectrum.
//! Read-only: input files are never modified.

use crate::error::{EmgError, EmgResult};
use crate::io::{FileRef, TableStore};
use crate::processing::batch::{run_per_file, BatchFailure, BatchOptions};
use crate::processing::filters::validate_sample_rate;
use crate::processing::spectral::{compute_psd, zoom_frequency_range, PsdTable, WelchConfig};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Power found around one target frequency
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrequencyFinding {
    pub target_hz: f64,
    /// Frequency of the strongest row inside the tolerance window
    pub peak_hz: f64,
    pub peak_power: f64,
    pub baseline_power: f64,
    /// `peak_power / baseline_power`, zero for a powerless spectrum
    pub power_ratio: f64,
    pub flagged: bool,
}

/// A flagged (file, column, frequency) triple
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierRecord {
    pub file: FileRef,
    pub column: String,
    pub frequency_hz: f64,
    pub peak_hz: f64,
    pub power_ratio: f64,
}

/// Flags of one file plus the targets that could not be evaluated
#[derive(Debug, Default)]
struct FileScan {
    records: Vec<OutlierRecord>,
    failed_targets: Vec<(f64, EmgError)>,
}

/// Outcome of an outlier scan
#[derive(Debug)]
pub struct OutlierReport {
    /// Traversal order, then ascending frequency
    pub records: Vec<OutlierRecord>,
    pub files_scanned: usize,
    /// Whole-file failures and per-target range failures, in traversal order
    pub failures: Vec<BatchFailure>,
    pub skipped: Vec<FileRef>,
    pub aborted: bool,
    pub elapsed: Duration,
}

#[derive(Serialize)]
struct FailureEntry {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_hz: Option<f64>,
    kind: crate::error::ErrorKind,
    message: String,
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    files_scanned: usize,
    records: &'a [OutlierRecord],
    failures: Vec<FailureEntry>,
    aborted: bool,
}

impl OutlierReport {
    pub fn is_flagged(&self, file: &FileRef) -> bool {
        self.records.iter().any(|r| &r.file == file)
    }

    /// Records and failures as a JSON document
    pub fn to_json(&self) -> EmgResult<String> {
        let document = ReportDocument {
            files_scanned: self.files_scanned,
            records: &self.records,
            failures: self
                .failures
                .iter()
                .map(|f| FailureEntry {
                    file: f.file.key(),
                    target_hz: f.target_hz,
                    kind: f.error.kind(),
                    message: f.error.to_string(),
                })
                .collect(),
            aborted: self.aborted,
        };
        serde_json::to_string_pretty(&document)
            .map_err(|e| EmgError::data("outlier report", e.to_string()))
    }
}

/// Threshold test of spectral power around target frequencies
#[derive(Debug, Clone)]
pub struct OutlierDetector {
    column: String,
    targets_hz: Vec<f64>,
    tolerance_hz: f64,
    threshold_ratio: f64,
    welch: WelchConfig,
}

impl OutlierDetector {
    /// Targets are checked in ascending order whatever order they come in
    pub fn new(column: impl Into<String>, targets_hz: Vec<f64>, tolerance_hz: f64, threshold_ratio: f64) -> Self {
        let mut targets_hz = targets_hz;
        targets_hz.sort_by(f64::total_cmp);
        Self {
            column: column.into(),
            targets_hz,
            tolerance_hz,
            threshold_ratio,
            welch: WelchConfig::default(),
        }
    }

    pub fn with_welch(mut self, welch: WelchConfig) -> Self {
        self.welch = welch;
        self
    }

    pub fn targets_hz(&self) -> &[f64] {
        &self.targets_hz
    }

    pub fn validate(&self, sample_rate_hz: u32) -> EmgResult<()> {
        validate_sample_rate(sample_rate_hz)?;
        self.welch.validate()?;
        if self.column.is_empty() {
            return Err(EmgError::parameter("column", "a signal column is required"));
        }
        if self.targets_hz.is_empty() {
            return Err(EmgError::parameter("target_frequencies_hz", "at least one target is required"));
        }
        let nyquist = sample_rate_hz as f64 / 2.0;
        if let Some(bad) = self.targets_hz.iter().find(|&&f| !(f > 0.0 && f <= nyquist)) {
            return Err(EmgError::parameter(
                "target_frequencies_hz",
                format!("{} Hz is outside (0, {} Hz]", bad, nyquist),
            ));
        }
        if !(self.tolerance_hz >= 0.0 && self.tolerance_hz.is_finite()) {
            return Err(EmgError::parameter("tolerance_hz", "must be a finite, non-negative width"));
        }
        if !(self.threshold_ratio > 0.0 && self.threshold_ratio.is_finite()) {
            return Err(EmgError::parameter("threshold_ratio", "must be positive"));
        }
        Ok(())
    }

    /// Evaluate one target against an already computed spectrum.
    ///
    /// A tolerance window holding no PSD rows is a range error.
    pub fn evaluate_target(&self, psd: &PsdTable, target_hz: f64) -> EmgResult<FrequencyFinding> {
        let baseline = psd.mean_power();
        let low = target_hz - self.tolerance_hz;
        let high = target_hz + self.tolerance_hz;
        let peak = zoom_frequency_range(psd, low, high)
            .peak()
            .ok_or_else(|| EmgError::range(low, high))?;
        let power_ratio = if baseline > 0.0 { peak.power / baseline } else { 0.0 };
        Ok(FrequencyFinding {
            target_hz,
            peak_hz: peak.frequency_hz,
            peak_power: peak.power,
            baseline_power: baseline,
            power_ratio,
            flagged: baseline > 0.0 && peak.power >= self.threshold_ratio * baseline,
        })
    }

    /// Evaluate every target in ascending order. Targets fail independently.
    pub fn evaluate(&self, psd: &PsdTable) -> Vec<(f64, EmgResult<FrequencyFinding>)> {
        self.targets_hz
            .iter()
            .map(|&target| (target, self.evaluate_target(psd, target)))
            .collect()
    }

    /// Spectrum and per-target findings for one signal
    pub fn analyze_signal(
        &self,
        signal: &[f64],
        sample_rate_hz: u32,
    ) -> EmgResult<Vec<(f64, EmgResult<FrequencyFinding>)>> {
        if signal.iter().any(|x| !x.is_finite()) {
            return Err(EmgError::data(
                format!("column `{}`", self.column),
                "contains missing samples",
            ));
        }
        let psd = compute_psd(signal, sample_rate_hz, &self.welch)?;
        Ok(self.evaluate(&psd))
    }

    fn scan_file(
        &self,
        file: &FileRef,
        input_root: &Path,
        sample_rate_hz: u32,
        store: &dyn TableStore,
    ) -> EmgResult<FileScan> {
        let table = store.read(&file.source_path(input_root))?;
        let signal = table.require_column(&self.column)?;

        let mut scan = FileScan::default();
        for (target, finding) in self.analyze_signal(signal, sample_rate_hz)? {
            match finding {
                Ok(f) if f.flagged => scan.records.push(OutlierRecord {
                    file: file.clone(),
                    column: self.column.clone(),
                    frequency_hz: f.target_hz,
                    peak_hz: f.peak_hz,
                    power_ratio: f.power_ratio,
                }),
                Ok(_) => {}
                Err(error) => {
                    warn!(file = %file, target_hz = target, %error, "target not evaluated");
                    scan.failed_targets.push((target, error));
                }
            }
        }
        Ok(scan)
    }

    /// Scan every recording under `input_root`
    #[instrument(skip(self, store, options), fields(column = %self.column))]
    pub fn detect(
        &self,
        input_root: &Path,
        sample_rate_hz: u32,
        store: &dyn TableStore,
        options: &BatchOptions,
    ) -> EmgResult<OutlierReport> {
        self.validate(sample_rate_hz)?;
        let files = options.walker(input_root).collect_refs()?;
        let files_scanned = files.len();
        let position: HashMap<String, usize> = files.iter().enumerate().map(|(i, f)| (f.key(), i)).collect();
        info!(targets = ?self.targets_hz, tolerance_hz = self.tolerance_hz,
              threshold_ratio = self.threshold_ratio, files = files_scanned, "scanning for spectral outliers");

        let run = run_per_file("outliers", files, options, |file| {
            self.scan_file(file, input_root, sample_rate_hz, store)
        })?;

        let mut records = Vec::new();
        let mut failures = run.failures;
        for (file, scan) in run.completed {
            records.extend(scan.records);
            failures.extend(
                scan.failed_targets
                    .into_iter()
                    .map(|(target, error)| BatchFailure::for_target(file.clone(), target, error)),
            );
        }
        // Stable sort keeps ascending targets within a file
        failures.sort_by_key(|f| position.get(&f.file.key()).copied().unwrap_or(usize::MAX));
        info!(flagged = records.len(), failed = failures.len(), "outlier scan complete");

        Ok(OutlierReport {
            records,
            files_scanned,
            failures,
            skipped: run.skipped,
            aborted: run.aborted,
            elapsed: run.elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::processing::spectral::PsdPoint;

    fn flat_psd(rows: usize, spacing: f64) -> PsdTable {
        PsdTable::new(
            (0..rows)
                .map(|i| PsdPoint { frequency_hz: i as f64 * spacing, power: 1.0 })
                .collect(),
        )
    }

    #[test]
    fn test_targets_sorted_ascending() {
        let detector = OutlierDetector::new("EMG1", vec![60.0, 50.0], 2.0, 10.0);
        assert_eq!(detector.targets_hz(), &[50.0, 60.0]);
    }

    #[test]
    fn test_spike_flagged_against_mean_baseline() {
        let mut psd = flat_psd(100, 1.0);
        let mut points = psd.points().to_vec();
        points[50].power = 500.0;
        psd = PsdTable::new(points);

        let detector = OutlierDetector::new("EMG1", vec![50.0, 60.0], 1.0, 10.0);
        let findings: Vec<FrequencyFinding> =
            detector.evaluate(&psd).into_iter().map(|(_, f)| f.unwrap()).collect();
        assert!(findings[0].flagged);
        assert_eq!(findings[0].peak_hz, 50.0);
        assert!(!findings[1].flagged);
        assert!((findings[1].power_ratio - 1.0 / psd.mean_power()).abs() < 1e-12);
    }

    #[test]
    fn test_empty_window_is_range_error() {
        let detector = OutlierDetector::new("EMG1", vec![50.5], 0.1, 10.0);
        let err = detector.evaluate_target(&flat_psd(100, 1.0), 50.5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn test_targets_fail_independently() {
        let mut points = flat_psd(100, 1.0).points().to_vec();
        points[50].power = 500.0;
        let psd = PsdTable::new(points);

        let detector = OutlierDetector::new("EMG1", vec![50.5, 50.0], 0.1, 10.0);
        let results = detector.evaluate(&psd);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 50.0);
        assert!(results[0].1.as_ref().unwrap().flagged);
        assert_eq!(results[1].0, 50.5);
        assert_eq!(results[1].1.as_ref().unwrap_err().kind(), ErrorKind::Range);
    }

    #[test]
    fn test_silent_spectrum_never_flags() {
        let psd = PsdTable::new(vec![
            PsdPoint { frequency_hz: 49.0, power: 0.0 },
            PsdPoint { frequency_hz: 50.0, power: 0.0 },
        ]);
        let finding = OutlierDetector::new("EMG1", vec![50.0], 1.0, 10.0).evaluate_target(&psd, 50.0).unwrap();
        assert!(!finding.flagged);
        assert_eq!(finding.power_ratio, 0.0);
    }

    #[test]
    fn test_parameter_validation() {
        assert!(OutlierDetector::new("EMG1", vec![50.0], 2.0, 10.0).validate(1000).is_ok());
        assert!(OutlierDetector::new("EMG1", vec![], 2.0, 10.0).validate(1000).is_err());
        assert!(OutlierDetector::new("EMG1", vec![600.0], 2.0, 10.0).validate(1000).is_err());
        assert!(OutlierDetector::new("EMG1", vec![50.0], -1.0, 10.0).validate(1000).is_err());
        assert!(OutlierDetector::new("EMG1", vec![50.0], 2.0, 0.0).validate(1000).is_err());
        assert!(OutlierDetector::new("", vec![50.0], 2.0, 10.0).validate(1000).is_err());
    }
}
