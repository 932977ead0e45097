// src/processing/batch.rs
//! Per-file batch execution on a bounded worker pool
//!
//! Each file is processed independently. Failures are recorded against the
//! file and never abort the batch unless the optional failure threshold is
//! reached, in which case files not yet started are skipped.

use crate::config::constants::batch::{DEFAULT_WORKER_THREADS, WORKER_THREAD_PREFIX};
use crate::config::constants::io::DEFAULT_FILE_EXTENSION;
use crate::error::{EmgError, EmgResult};
use crate::io::{FileRef, FileWalker, SubjectPattern};
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Options shared by every batch stage
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Worker threads; zero uses one per available core
    pub threads: usize,
    /// Stop starting new files once this many have failed
    pub max_failures: Option<usize>,
    /// Only files with this extension are discovered
    pub extension: Option<String>,
    /// Subject/file id extraction; the standard pattern when unset
    pub subject_pattern: Option<SubjectPattern>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            threads: DEFAULT_WORKER_THREADS,
            max_failures: None,
            extension: Some(DEFAULT_FILE_EXTENSION.to_string()),
            subject_pattern: None,
        }
    }
}

impl BatchOptions {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_max_failures(mut self, max_failures: usize) -> Self {
        self.max_failures = Some(max_failures);
        self
    }

    pub fn with_subject_pattern(mut self, pattern: SubjectPattern) -> Self {
        self.subject_pattern = Some(pattern);
        self
    }

    /// Walker over `root` honouring the extension and subject pattern
    pub fn walker(&self, root: &Path) -> FileWalker {
        let mut walker = FileWalker::new(root);
        if let Some(extension) = &self.extension {
            walker = walker.with_extension(extension.clone());
        }
        if let Some(pattern) = &self.subject_pattern {
            walker = walker.with_subject_pattern(pattern.clone());
        }
        walker
    }

    fn build_pool(&self) -> EmgResult<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|i| format!("{}-{}", WORKER_THREAD_PREFIX, i))
            .build()
            .map_err(|e| EmgError::parameter("threads", format!("failed to build worker pool: {}", e)))
    }
}

/// A file that could not be processed, and why
#[derive(Debug)]
pub struct BatchFailure {
    pub file: FileRef,
    /// Set when only one target frequency of the file failed
    pub target_hz: Option<f64>,
    pub error: EmgError,
}

impl BatchFailure {
    pub fn new(file: FileRef, error: EmgError) -> Self {
        Self { file, target_hz: None, error }
    }

    pub fn for_target(file: FileRef, target_hz: f64, error: EmgError) -> Self {
        Self { file, target_hz: Some(target_hz), error }
    }
}

impl std::fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.target_hz {
            Some(target) => write!(f, "{} @ {} Hz: {}", self.file, target, self.error),
            None => write!(f, "{}: {}", self.file, self.error),
        }
    }
}

enum FileOutcome<T> {
    Done(T),
    Failed(EmgError),
    Skipped,
}

/// Outcomes of one batch, in traversal order
#[derive(Debug)]
pub(crate) struct BatchRun<T> {
    pub completed: Vec<(FileRef, T)>,
    pub failures: Vec<BatchFailure>,
    pub skipped: Vec<FileRef>,
    pub aborted: bool,
    pub elapsed: Duration,
}

/// Run `work` for every file on the worker pool.
///
/// Only pool construction can fail here; per-file errors land in
/// [`BatchRun::failures`].
pub(crate) fn run_per_file<T, F>(
    stage: &str,
    files: Vec<FileRef>,
    options: &BatchOptions,
    work: F,
) -> EmgResult<BatchRun<T>>
where
    T: Send,
    F: Fn(&FileRef) -> EmgResult<T> + Sync,
{
    let pool = options.build_pool()?;
    let total = files.len();
    let failed = AtomicUsize::new(0);
    let finished = AtomicUsize::new(0);
    let started = Instant::now();

    info!(stage, total, threads = pool.current_num_threads(), "starting batch");

    // Indexed collect keeps traversal order regardless of completion order
    let outcomes: Vec<FileOutcome<T>> = pool.install(|| {
        files
            .par_iter()
            .map(|file| {
                if let Some(limit) = options.max_failures {
                    if failed.load(Ordering::SeqCst) >= limit {
                        return FileOutcome::Skipped;
                    }
                }

                #[cfg(feature = "performance_monitoring")]
                let file_started = Instant::now();

                let result = work(file);
                let done = finished.fetch_add(1, Ordering::SeqCst) + 1;

                #[cfg(feature = "performance_monitoring")]
                debug!(stage, file = %file, elapsed_us = file_started.elapsed().as_micros() as u64, "file timing");

                match result {
                    Ok(value) => {
                        debug!(stage, file = %file, done, total, "processed");
                        FileOutcome::Done(value)
                    }
                    Err(error) => {
                        failed.fetch_add(1, Ordering::SeqCst);
                        warn!(stage, file = %file, done, total, %error, "file failed");
                        FileOutcome::Failed(error)
                    }
                }
            })
            .collect()
    });

    let mut run = BatchRun {
        completed: Vec::new(),
        failures: Vec::new(),
        skipped: Vec::new(),
        aborted: false,
        elapsed: Duration::ZERO,
    };
    for (file, outcome) in files.into_iter().zip(outcomes) {
        match outcome {
            FileOutcome::Done(value) => run.completed.push((file, value)),
            FileOutcome::Failed(error) => run.failures.push(BatchFailure::new(file, error)),
            FileOutcome::Skipped => run.skipped.push(file),
        }
    }
    run.aborted = !run.skipped.is_empty();
    run.elapsed = started.elapsed();

    if run.aborted {
        warn!(
            stage,
            failed = run.failures.len(),
            skipped = run.skipped.len(),
            "failure threshold reached, remaining files skipped"
        );
    }
    info!(
        stage,
        succeeded = run.completed.len(),
        failed = run.failures.len(),
        total,
        elapsed_s = run.elapsed.as_secs_f64(),
        "batch complete"
    );

    Ok(run)
}
