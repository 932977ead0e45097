// src/processing/pipeline.rs
//! Batch filter stages over mirrored recording trees
//!
//! A [`FilterStage`] reads every recording under an input root, filters the
//! requested columns and writes the table to the same relative path under an
//! output root. Stages chain through [`run_stages`], each one reading the
//! previous stage's tree.

use crate::error::{EmgError, EmgResult, IoResultExt};
use crate::io::{FileRef, TableStore};
use crate::processing::batch::{run_per_file, BatchFailure, BatchOptions};
use crate::processing::filters::FilterSpec;
use crate::processing::missing::{fill_missing_table, FillMethod};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// How an override combines with the stage default
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideMode {
    /// Use the override instead of the default
    #[default]
    Replace,
    /// Apply the default, then the override
    Append,
}

/// Per-subject filter parameters that take precedence over a stage default
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectOverrides {
    #[serde(default)]
    pub mode: OverrideMode,
    #[serde(default)]
    pub subjects: BTreeMap<String, FilterSpec>,
}

impl SubjectOverrides {
    pub fn new(mode: OverrideMode) -> Self {
        Self {
            mode,
            subjects: BTreeMap::new(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>, spec: FilterSpec) -> Self {
        self.subjects.insert(subject.into(), spec);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn get(&self, subject: &str) -> Option<&FilterSpec> {
        self.subjects.get(subject)
    }

    /// Filters to run, in order, for a file of `subject`
    pub fn resolve<'a>(&'a self, default: &'a FilterSpec, subject: Option<&str>) -> Vec<&'a FilterSpec> {
        match subject.and_then(|s| self.get(s)) {
            Some(spec) => match self.mode {
                OverrideMode::Replace => vec![spec],
                OverrideMode::Append => vec![default, spec],
            },
            None => vec![default],
        }
    }

    pub fn validate(&self, sample_rate_hz: u32) -> EmgResult<()> {
        for (subject, spec) in &self.subjects {
            spec.validate(sample_rate_hz).map_err(|e| {
                EmgError::parameter(format!("overrides.{}", subject), e.to_string())
            })?;
        }
        Ok(())
    }
}

/// What happened to one file in a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileAction {
    Filtered { overridden: bool },
    Copied,
    Ignored,
}

/// Outcome of one filter stage
#[derive(Debug)]
pub struct StageReport {
    pub stage: String,
    pub output_root: PathBuf,
    /// Files discovered under the input root
    pub total: usize,
    /// Files filtered and written
    pub written: Vec<FileRef>,
    /// Written files whose subject had an override
    pub overridden: Vec<FileRef>,
    /// Unmatched files copied byte for byte
    pub copied: Vec<FileRef>,
    /// Unmatched files left out of the output tree
    pub ignored: Vec<FileRef>,
    pub failures: Vec<BatchFailure>,
    /// Files never started because the failure threshold was reached
    pub skipped: Vec<FileRef>,
    pub aborted: bool,
    pub elapsed: Duration,
}

impl StageReport {
    /// Files that reached the output tree
    pub fn succeeded(&self) -> usize {
        self.written.len() + self.copied.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.aborted
    }
}

/// One filter applied across a recording tree
#[derive(Debug, Clone)]
pub struct FilterStage {
    name: String,
    spec: FilterSpec,
    columns: Vec<String>,
    overrides: Option<SubjectOverrides>,
    match_expr: Option<Regex>,
    copy_unmatched: bool,
    gap_fill: Option<FillMethod>,
}

impl FilterStage {
    pub fn new(name: impl Into<String>, spec: FilterSpec, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            spec,
            columns,
            overrides: None,
            match_expr: None,
            copy_unmatched: true,
            gap_fill: None,
        }
    }

    pub fn with_overrides(mut self, overrides: SubjectOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// Only files whose relative path matches are filtered
    pub fn with_match(mut self, expr: Regex) -> Self {
        self.match_expr = Some(expr);
        self
    }

    /// Copy files rejected by the match expression (default) or leave them out
    pub fn copy_unmatched(mut self, copy: bool) -> Self {
        self.copy_unmatched = copy;
        self
    }

    /// Fill missing samples in the filtered columns before filtering
    pub fn with_gap_fill(mut self, method: FillMethod) -> Self {
        self.gap_fill = Some(method);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Check every parameter before any file is touched
    pub fn validate(&self, sample_rate_hz: u32) -> EmgResult<()> {
        if self.name.is_empty() || self.name.contains(['/', '\\']) {
            return Err(EmgError::parameter("name", format!("`{}` is not a usable stage name", self.name)));
        }
        if self.columns.is_empty() {
            return Err(EmgError::parameter("columns", "at least one column is required"));
        }
        self.spec.validate(sample_rate_hz)?;
        if let Some(overrides) = &self.overrides {
            overrides.validate(sample_rate_hz)?;
        }
        Ok(())
    }

    fn matches(&self, file: &FileRef) -> bool {
        self.match_expr
            .as_ref()
            .map_or(true, |expr| expr.is_match(&file.key()))
    }

    fn filters_for(&self, file: &FileRef) -> (Vec<&FilterSpec>, bool) {
        match &self.overrides {
            Some(overrides) => {
                let overridden = file.subject_id.as_deref().and_then(|s| overrides.get(s)).is_some();
                (overrides.resolve(&self.spec, file.subject_id.as_deref()), overridden)
            }
            None => (vec![&self.spec], false),
        }
    }

    fn process_file(
        &self,
        file: &FileRef,
        input_root: &Path,
        output_root: &Path,
        sample_rate_hz: u32,
        store: &dyn TableStore,
    ) -> EmgResult<FileAction> {
        let source = file.source_path(input_root);

        if !self.matches(file) {
            if !self.copy_unmatched {
                return Ok(FileAction::Ignored);
            }
            let target = file.prepare_output(output_root)?;
            std::fs::copy(&source, &target).at_path(&source)?;
            return Ok(FileAction::Copied);
        }

        let mut table = store.read(&source)?;
        if let Some(method) = self.gap_fill {
            let fill = fill_missing_table(&mut table, &self.columns, sample_rate_hz, method)?;
            if fill.filled + fill.rows_dropped_front + fill.rows_dropped_back > 0 {
                debug!(file = %file, filled = fill.filled, dropped_front = fill.rows_dropped_front,
                       dropped_back = fill.rows_dropped_back, "filled gaps");
            }
        }

        let (filters, overridden) = self.filters_for(file);
        for column in &self.columns {
            let signal = table.require_column(column)?;
            if signal.iter().any(|x| !x.is_finite()) {
                return Err(EmgError::data(
                    format!("column `{}`", column),
                    "contains missing samples and gap filling is off",
                ));
            }
            let mut filtered = signal.to_vec();
            for spec in &filters {
                filtered = spec.apply(&filtered, sample_rate_hz)?;
            }
            table.replace_column(column, filtered)?;
        }

        let target = file.prepare_output(output_root)?;
        store.write(&table, &target)?;
        Ok(FileAction::Filtered { overridden })
    }

    /// Filter every recording under `input_root` into `output_root`.
    ///
    /// Parameter and root problems fail before any file is processed.
    /// Per-file problems are collected in the report.
    #[instrument(skip(self, store, options), fields(stage = %self.name))]
    pub fn run(
        &self,
        input_root: &Path,
        output_root: &Path,
        sample_rate_hz: u32,
        store: &dyn TableStore,
        options: &BatchOptions,
    ) -> EmgResult<StageReport> {
        self.validate(sample_rate_hz)?;
        let files = options.walker(input_root).collect_refs()?;
        check_disjoint_roots(input_root, output_root)?;
        let total = files.len();
        info!(filter = self.spec.name(), total, columns = ?self.columns, "running filter stage");

        let run = run_per_file(&self.name, files, options, |file| {
            self.process_file(file, input_root, output_root, sample_rate_hz, store)
        })?;

        let mut report = StageReport {
            stage: self.name.clone(),
            output_root: output_root.to_path_buf(),
            total,
            written: Vec::new(),
            overridden: Vec::new(),
            copied: Vec::new(),
            ignored: Vec::new(),
            failures: run.failures,
            skipped: run.skipped,
            aborted: run.aborted,
            elapsed: run.elapsed,
        };
        for (file, action) in run.completed {
            match action {
                FileAction::Filtered { overridden } => {
                    if overridden {
                        report.overridden.push(file.clone());
                    }
                    report.written.push(file);
                }
                FileAction::Copied => report.copied.push(file),
                FileAction::Ignored => report.ignored.push(file),
            }
        }

        for failure in &report.failures {
            warn!(%failure, "stage failure");
        }
        info!(
            written = report.written.len(),
            overridden = report.overridden.len(),
            copied = report.copied.len(),
            failed = report.failures.len(),
            "filter stage complete"
        );
        Ok(report)
    }
}

/// Directory for stage `index` (zero-based) under a work root
pub fn stage_output_dir(work_root: &Path, index: usize, stage: &FilterStage) -> PathBuf {
    work_root.join(format!("{:02}_{}", index + 1, stage.name()))
}

/// Run stages in order, each reading the previous stage's output tree.
///
/// Every stage is validated before the first one runs. A stage in which no
/// file succeeded stops the chain.
#[instrument(skip(stages, store, options), fields(stages = stages.len()))]
pub fn run_stages(
    stages: &[FilterStage],
    input_root: &Path,
    work_root: &Path,
    sample_rate_hz: u32,
    store: &dyn TableStore,
    options: &BatchOptions,
) -> EmgResult<Vec<StageReport>> {
    for stage in stages {
        stage.validate(sample_rate_hz)?;
    }

    let mut reports = Vec::with_capacity(stages.len());
    let mut current = input_root.to_path_buf();
    for (index, stage) in stages.iter().enumerate() {
        let output = stage_output_dir(work_root, index, stage);
        let report = stage.run(&current, &output, sample_rate_hz, store, options)?;
        let stalled = report.total > 0 && report.succeeded() == 0;
        reports.push(report);
        if stalled {
            warn!(stage = stage.name(), "no file survived the stage, stopping");
            break;
        }
        current = output;
    }
    Ok(reports)
}

/// Absolute form of `path` with symlinks resolved as far as it exists
fn resolve_path(path: &Path) -> EmgResult<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().at_path(path)?.join(path)
    };

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = existing.canonicalize().at_path(existing)?;
    resolved.extend(missing.iter().rev());
    Ok(resolved)
}

/// The output tree may be neither the input tree nor inside it
fn check_disjoint_roots(input_root: &Path, output_root: &Path) -> EmgResult<()> {
    let input = resolve_path(input_root)?;
    let output = resolve_path(output_root)?;
    if output.starts_with(&input) {
        return Err(EmgError::parameter(
            "output_root",
            format!("{} lies inside the input root {}", output.display(), input.display()),
        ));
    }
    Ok(())
}
