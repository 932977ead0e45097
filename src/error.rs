// src/error.rs
//! Unified error handling for EMG batch processing
//!
//! Every fallible operation in the crate returns [`EmgResult`]. Errors fall
//! into four categories (see [`ErrorKind`]) which decide how they propagate:
//! parameter problems abort the operation immediately, while path, data and
//! range problems hit during a batch are recorded against the offending file
//! and the batch carries on.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the entire EMG batch system
#[derive(Debug, Error)]
pub enum EmgError {
    /// Missing or invalid root directory or file
    #[error("[PATH] {path}: {reason}")]
    Path {
        path: PathBuf,
        reason: String,
    },

    /// Filter or analysis parameters that violate their constraints
    #[error("[PARAMETER] invalid `{parameter}`: {reason}")]
    Parameter {
        parameter: String,
        reason: String,
    },

    /// Malformed or unrecoverably missing signal data
    #[error("[DATA] invalid {data_type}: {reason}")]
    Data {
        data_type: String,
        reason: String,
    },

    /// A frequency window query that matched no spectral points
    #[error("[RANGE] no PSD points within [{low_hz} Hz, {high_hz} Hz]")]
    Range {
        low_hz: f64,
        high_hz: f64,
    },

    /// Filesystem failure on a specific path
    #[error("[IO] {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Delimited table could not be parsed or written
    #[error("[CSV] {0}")]
    Csv(#[from] csv::Error),

    /// Layered configuration could not be loaded
    #[error("[CONFIG] {0}")]
    Config(String),
}

/// Error categories used for propagation policy and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Path,
    Parameter,
    Data,
    Range,
}

impl EmgError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            EmgError::Path { .. } | EmgError::Io { .. } => ErrorKind::Path,
            EmgError::Parameter { .. } | EmgError::Config(_) => ErrorKind::Parameter,
            EmgError::Data { .. } | EmgError::Csv(_) => ErrorKind::Data,
            EmgError::Range { .. } => ErrorKind::Range,
        }
    }

    pub fn path<P: AsRef<Path>>(path: P, reason: impl Into<String>) -> Self {
        EmgError::Path {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn parameter(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        EmgError::Parameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    pub fn data(data_type: impl Into<String>, reason: impl Into<String>) -> Self {
        EmgError::Data {
            data_type: data_type.into(),
            reason: reason.into(),
        }
    }

    pub fn range(low_hz: f64, high_hz: f64) -> Self {
        EmgError::Range { low_hz, high_hz }
    }
}

impl From<::config::ConfigError> for EmgError {
    fn from(err: ::config::ConfigError) -> Self {
        EmgError::Config(err.to_string())
    }
}

/// Result type alias for EMG operations
pub type EmgResult<T> = Result<T, EmgError>;

/// Attach the failing path to I/O errors
pub trait IoResultExt<T> {
    fn at_path<P: AsRef<Path>>(self, path: P) -> EmgResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at_path<P: AsRef<Path>>(self, path: P) -> EmgResult<T> {
        self.map_err(|source| EmgError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })
    }
}
