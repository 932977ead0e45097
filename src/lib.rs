//! EMG-Batch: offline processing of recorded EMG trees
//!
//! This library filters, screens and summarises electromyography recordings
//! stored as per-subject delimited tables. It features:
//!
//! - Zero-phase notch and bandpass filters plus an RMS envelope
//! - Welch power spectral density estimates and frequency-range queries
//! - Filter stages that mirror an input tree into an output tree, with
//!   per-subject parameter overrides
//! - Spectral outlier screening against the mean spectral power
//! - Sliding-window feature tables
//! - Gap filling for recordings with missing samples
//!
//! Every batch stage processes files in parallel, records per-file failures
//! instead of aborting and returns results in traversal order.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use emg_batch::config::ConfigLoader;
//! use emg_batch::processing::run_stages;
//! use std::path::Path;
//!
//! fn main() -> Result<(), emg_batch::EmgError> {
//!     let config = ConfigLoader::new().load()?;
//!     let store = config.store()?;
//!     let options = config.batch_options()?;
//!
//!     let reports = run_stages(
//!         &config.filter_stages()?,
//!         Path::new("data/raw"),
//!         Path::new("data/work"),
//!         config.sampling_rate_hz,
//!         &store,
//!         &options,
//!     )?;
//!     for report in &reports {
//!         println!("{}: {} written, {} failed", report.stage, report.written.len(), report.failures.len());
//!     }
//!
//!     let filtered = &reports[reports.len() - 1].output_root;
//!     let features = config.feature_extractor().extract(filtered, config.sampling_rate_hz, &store, &options)?;
//!     features.table.write_csv(Path::new("data/features.csv"))?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod error;
pub mod io;
pub mod processing;

// Re-export commonly used types for convenience
pub use crate::config::{ConfigLoader, EmgConfig};
pub use error::{EmgError, EmgResult, ErrorKind};
pub use io::{CsvStore, FileRef, FileWalker, SignalTable, SubjectPattern, TableStore};
pub use processing::{
    run_stages, BatchOptions, FeatureExtractor, FilterSpec, FilterStage, OutlierDetector,
    SubjectOverrides,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Batch filtering, outlier screening and feature extraction for EMG recordings".to_string(),
        features: vec![
            "Zero-phase notch and bandpass filtering".to_string(),
            "Welch power spectral density".to_string(),
            "Mirrored multi-stage filter pipelines".to_string(),
            "Spectral outlier detection".to_string(),
            "Sliding-window feature extraction".to_string(),
            "Missing sample interpolation".to_string(),
        ],
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// List of features
    pub features: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert_eq!(info.name, NAME);
        assert_eq!(info.version, VERSION);
        assert!(!info.features.is_empty());
    }

    #[test]
    fn test_constants() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "emg-batch");
    }
}
