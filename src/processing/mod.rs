// src/processing/mod.rs
//! Signal processing for recorded EMG batches

pub mod batch;
pub mod features;
pub mod filters;
pub mod missing;
pub mod outliers;
pub mod pipeline;
pub mod spectral;
pub mod windowing;

pub use batch::{BatchFailure, BatchOptions};
pub use features::{FeatureExtractor, FeatureReport, FeatureRow, FeatureTable, WindowDescriptors};
pub use filters::{
    apply_bandpass, apply_notch, apply_notches, apply_rms_smooth, FilterSpec, NotchParams,
};
pub use missing::{fill_missing, fill_missing_table, FillMethod, FilledSignal};
pub use outliers::{OutlierDetector, OutlierRecord, OutlierReport};
pub use pipeline::{run_stages, FilterStage, OverrideMode, StageReport, SubjectOverrides};
pub use spectral::{
    band_power, compute_psd, zoom_frequency_range, PsdPoint, PsdTable, SpectrumComparison,
    WelchConfig,
};
pub use windowing::{hann_window, SlidingWindows};
