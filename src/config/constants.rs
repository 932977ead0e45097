// src/config/constants.rs
//! System-wide configuration constants

/// Signal and recording constants
pub mod signal {
    pub const DEFAULT_SAMPLING_RATE_HZ: u32 = 2000;
    pub const MIN_SAMPLING_RATE_HZ: u32 = 1;
    pub const DEFAULT_TIME_COLUMN: &str = "Time";
}

/// Recording tree and table I/O constants
pub mod io {
    pub const DEFAULT_FILE_EXTENSION: &str = "csv";
    pub const DEFAULT_DELIMITER: u8 = b',';

    /// Parent directory names the subject, file stem names the recording
    pub const DEFAULT_SUBJECT_PATTERN: &str =
        r"(?:^|/)(?P<subject>[^/]+)/(?P<file>[^/]+)\.[^./]+$";

    /// Cell values read as a missing sample
    pub const MISSING_MARKERS: &[&str] = &["", "nan", "NaN", "NAN", "NA", "null"];
}

/// Signal processing filter constants
pub mod filters {
    pub const DEFAULT_HIGHPASS_CUTOFF_HZ: f64 = 20.0;
    pub const DEFAULT_LOWPASS_CUTOFF_HZ: f64 = 450.0;
    pub const DEFAULT_FILTER_ORDER: usize = 4;
    pub const MIN_FILTER_ORDER: usize = 2;
    pub const MAX_FILTER_ORDER: usize = 8;

    pub const DEFAULT_NOTCH_FREQUENCIES_HZ: &[f64] = &[50.0];
    pub const DEFAULT_NOTCH_Q: f64 = 30.0;

    pub const DEFAULT_RMS_WINDOW_SAMPLES: usize = 100;

    /// Edge padding for forward-backward filtering, per biquad section
    pub const FILTFILT_PAD_PER_SECTION: usize = 9;
}

/// Spectral estimation constants
pub mod spectral {
    pub const DEFAULT_WELCH_SEGMENT: usize = 256;
    pub const DEFAULT_WELCH_OVERLAP: f64 = 0.5;
}

/// Outlier detection constants
pub mod outliers {
    pub const DEFAULT_TARGET_FREQUENCIES_HZ: &[f64] = &[50.0, 60.0];
    pub const DEFAULT_TOLERANCE_HZ: f64 = 2.0;
    pub const DEFAULT_THRESHOLD_RATIO: f64 = 10.0;
}

/// Feature extraction constants
pub mod features {
    pub const DEFAULT_WINDOW_SAMPLES: usize = 256;
    pub const DEFAULT_STEP_SAMPLES: usize = 128;

    /// Descriptor names, in output column order
    pub const DESCRIPTOR_NAMES: &[&str] = &[
        "mean",
        "std",
        "rms",
        "spectral_centroid",
        "zero_crossing_rate",
        "peak_frequency",
    ];
}

/// Batch execution constants
pub mod batch {
    /// Zero sizes the worker pool to the available cores
    pub const DEFAULT_WORKER_THREADS: usize = 0;
    pub const WORKER_THREAD_PREFIX: &str = "emg-batch-worker";
}

/// Configuration file locations and environment overrides
pub mod paths {
    pub const DEFAULT_CONFIG_FILE: &str = "emg-batch.toml";
    pub const LOCAL_CONFIG_FILE: &str = "config/local.toml";
    pub const ENV_PREFIX: &str = "EMG";
    pub const ENV_SEPARATOR: &str = "__";
}
