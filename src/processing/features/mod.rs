// src/processing/features/mod.rs
//! Windowed feature extraction over recording trees
//!
//! Each signal column is cut into fixed-size windows and every window is
//! reduced to the descriptors in [`DESCRIPTOR_NAMES`]:
//! - mean, standard deviation and RMS
//! - spectral centroid and peak frequency of the window's own periodogram
//! - zero crossing rate
//!
//! One row per (file, window) is produced; rows from all files are gathered
//! into a single [`FeatureTable`].

pub mod time_domain;
pub mod frequency;

pub use frequency::{spectral_descriptors, SpectralDescriptors};

use crate::config::constants::features::DESCRIPTOR_NAMES;
use crate::error::{EmgError, EmgResult, IoResultExt};
use crate::io::{FileRef, TableStore};
use crate::processing::batch::{run_per_file, BatchFailure, BatchOptions};
use crate::processing::filters::validate_sample_rate;
use crate::processing::windowing::{validate_window, SlidingWindows};
use ndarray::Array2;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Descriptors of one window, in [`DESCRIPTOR_NAMES`] order
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowDescriptors {
    pub mean: f64,
    pub std: f64,
    pub rms: f64,
    pub spectral_centroid: f64,
    pub zero_crossing_rate: f64,
    pub peak_frequency: f64,
}

impl WindowDescriptors {
    pub fn compute(window: &[f64], sample_rate_hz: u32) -> EmgResult<Self> {
        let spectral = spectral_descriptors(window, sample_rate_hz)?;
        Ok(Self {
            mean: time_domain::mean(window),
            std: time_domain::std_dev(window),
            rms: time_domain::rms(window),
            spectral_centroid: spectral.centroid_hz,
            zero_crossing_rate: time_domain::zero_crossing_rate(window, sample_rate_hz),
            peak_frequency: spectral.peak_hz,
        })
    }

    pub fn values(&self) -> [f64; 6] {
        [
            self.mean,
            self.std,
            self.rms,
            self.spectral_centroid,
            self.zero_crossing_rate,
            self.peak_frequency,
        ]
    }
}

/// One window of one file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    pub subject_id: String,
    pub file_id: String,
    pub window_index: usize,
    pub window_start_s: f64,
    /// Descriptors of every signal column, column-major
    pub values: Vec<f64>,
}

/// Feature rows of a whole tree
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureTable {
    pub signal_columns: Vec<String>,
    /// Traversal order, then window index
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(signal_columns: Vec<String>) -> Self {
        Self {
            signal_columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `<column>_<descriptor>` for every value position
    pub fn descriptor_columns(&self) -> Vec<String> {
        self.signal_columns
            .iter()
            .flat_map(|column| DESCRIPTOR_NAMES.iter().map(move |d| format!("{}_{}", column, d)))
            .collect()
    }

    pub fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = ["subject_id", "file_id", "window_index", "window_start_s"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        header.extend(self.descriptor_columns());
        header
    }

    /// Values of one descriptor column, e.g. `EMG1_rms`
    pub fn column_values(&self, name: &str) -> Option<Vec<f64>> {
        let position = self.descriptor_columns().iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| r.values[position]).collect())
    }

    /// Descriptor values as a rows × descriptors matrix
    pub fn to_matrix(&self) -> EmgResult<Array2<f64>> {
        let width = self.signal_columns.len() * DESCRIPTOR_NAMES.len();
        let flat: Vec<f64> = self.rows.iter().flat_map(|r| r.values.iter().copied()).collect();
        Array2::from_shape_vec((self.rows.len(), width), flat)
            .map_err(|e| EmgError::data("feature table", e.to_string()))
    }

    pub fn write_csv(&self, path: &Path) -> EmgResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).at_path(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(self.header())?;
        for row in &self.rows {
            let mut record = vec![
                row.subject_id.clone(),
                row.file_id.clone(),
                row.window_index.to_string(),
                row.window_start_s.to_string(),
            ];
            record.extend(row.values.iter().map(f64::to_string));
            writer.write_record(&record)?;
        }
        writer.flush().at_path(path)?;
        Ok(())
    }
}

/// Outcome of a feature extraction run
#[derive(Debug)]
pub struct FeatureReport {
    pub table: FeatureTable,
    pub files_processed: usize,
    pub failures: Vec<BatchFailure>,
    pub skipped: Vec<FileRef>,
    pub aborted: bool,
    pub elapsed: Duration,
}

/// Sliding-window descriptor extraction
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    window_size: usize,
    step_size: usize,
    columns: Vec<String>,
    time_column: Option<String>,
}

impl FeatureExtractor {
    pub fn new(window_size: usize, step_size: usize, columns: Vec<String>) -> Self {
        Self {
            window_size,
            step_size,
            columns,
            time_column: None,
        }
    }

    /// Take window start times from this column when a table has it
    pub fn with_time_column(mut self, column: impl Into<String>) -> Self {
        self.time_column = Some(column.into());
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn validate(&self, sample_rate_hz: u32) -> EmgResult<()> {
        validate_sample_rate(sample_rate_hz)?;
        validate_window(self.window_size, self.step_size)?;
        if self.window_size < 2 {
            return Err(EmgError::parameter("window_size", "spectral descriptors need at least two samples"));
        }
        if self.columns.is_empty() {
            return Err(EmgError::parameter("columns", "at least one column is required"));
        }
        Ok(())
    }

    /// Descriptors of every complete window of one signal
    pub fn extract_signal(&self, signal: &[f64], sample_rate_hz: u32) -> EmgResult<Vec<WindowDescriptors>> {
        SlidingWindows::new(signal, self.window_size, self.step_size)?
            .map(|window| WindowDescriptors::compute(window.samples, sample_rate_hz))
            .collect()
    }

    fn extract_file(
        &self,
        file: &FileRef,
        input_root: &Path,
        sample_rate_hz: u32,
        store: &dyn TableStore,
    ) -> EmgResult<Vec<FeatureRow>> {
        let table = store.read(&file.source_path(input_root))?;

        let mut per_column = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let signal = table.require_column(column)?;
            if signal.iter().any(|x| !x.is_finite()) {
                return Err(EmgError::data(format!("column `{}`", column), "contains missing samples"));
            }
            per_column.push(self.extract_signal(signal, sample_rate_hz)?);
        }

        let windows = SlidingWindows::count_for(table.len(), self.window_size, self.step_size);
        if windows == 0 {
            debug!(file = %file, samples = table.len(), window = self.window_size, "shorter than one window");
        }

        let time = self.time_column.as_deref().and_then(|name| table.column(name));
        let rows = (0..windows)
            .map(|index| {
                let start = index * self.step_size;
                FeatureRow {
                    subject_id: file.subject_or_unknown().to_string(),
                    file_id: file.file_id.clone(),
                    window_index: index,
                    window_start_s: time
                        .map_or(start as f64 / sample_rate_hz as f64, |t| t[start]),
                    values: per_column.iter().flat_map(|d| d[index].values()).collect(),
                }
            })
            .collect();
        Ok(rows)
    }

    /// Extract features from every recording under `input_root`
    #[instrument(skip(self, store, options), fields(window = self.window_size, step = self.step_size))]
    pub fn extract(
        &self,
        input_root: &Path,
        sample_rate_hz: u32,
        store: &dyn TableStore,
        options: &BatchOptions,
    ) -> EmgResult<FeatureReport> {
        self.validate(sample_rate_hz)?;
        let files = options.walker(input_root).collect_refs()?;
        info!(files = files.len(), columns = ?self.columns, "extracting features");

        let run = run_per_file("features", files, options, |file| {
            self.extract_file(file, input_root, sample_rate_hz, store)
        })?;

        let files_processed = run.completed.len();
        let mut table = FeatureTable::new(self.columns.clone());
        table.rows = run.completed.into_iter().flat_map(|(_, rows)| rows).collect();
        info!(rows = table.len(), failed = run.failures.len(), "feature extraction complete");

        Ok(FeatureReport {
            table,
            files_processed,
            failures: run.failures,
            skipped: run.skipped,
            aborted: run.aborted,
            elapsed: run.elapsed,
        })
    }
}
