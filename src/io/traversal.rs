// src/io/traversal.rs
//! Recording tree traversal and input/output path mirroring

use crate::config::constants::io::DEFAULT_SUBJECT_PATTERN;
use crate::error::{EmgError, EmgResult, IoResultExt};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extracts subject and file identifiers from a relative path.
///
/// The regex is matched against the path with `/` separators. A named group
/// `subject` supplies the subject id; an optional group `file` supplies the
/// file id, which otherwise falls back to the file stem.
#[derive(Debug, Clone)]
pub struct SubjectPattern {
    regex: Regex,
}

impl SubjectPattern {
    pub fn new(pattern: &str) -> EmgResult<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| EmgError::parameter("subject_pattern", e.to_string()))?;
        if !regex.capture_names().flatten().any(|name| name == "subject") {
            return Err(EmgError::parameter(
                "subject_pattern",
                format!("`{}` has no named group `subject`", pattern),
            ));
        }
        Ok(Self { regex })
    }

    /// Parent directory as subject, file stem as file id
    pub fn standard() -> EmgResult<Self> {
        Self::new(DEFAULT_SUBJECT_PATTERN)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// `(subject_id, file_id)` for a `/`-joined relative path
    pub fn identify(&self, relative: &str) -> (Option<String>, Option<String>) {
        match self.regex.captures(relative) {
            Some(caps) => (
                caps.name("subject").map(|m| m.as_str().to_string()),
                caps.name("file").map(|m| m.as_str().to_string()),
            ),
            None => (None, None),
        }
    }
}

/// Handle for one recording, relative to its tree root
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FileRef {
    pub relative: PathBuf,
    pub subject_id: Option<String>,
    pub file_id: String,
}

impl FileRef {
    pub fn new(relative: impl Into<PathBuf>, pattern: &SubjectPattern) -> Self {
        let relative = relative.into();
        let key = slash_path(&relative);
        let (subject_id, file_id) = pattern.identify(&key);
        let file_id = file_id.unwrap_or_else(|| {
            relative
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        Self {
            relative,
            subject_id,
            file_id,
        }
    }

    /// Relative path with `/` separators on every platform
    pub fn key(&self) -> String {
        slash_path(&self.relative)
    }

    pub fn source_path(&self, input_root: &Path) -> PathBuf {
        input_root.join(&self.relative)
    }

    /// Same relative location under another root
    pub fn mirror_path(&self, output_root: &Path) -> PathBuf {
        output_root.join(&self.relative)
    }

    /// Mirror path with its parent directories created.
    ///
    /// `create_dir_all` treats existing directories as success, so concurrent
    /// workers may call this for sibling files.
    pub fn prepare_output(&self, output_root: &Path) -> EmgResult<PathBuf> {
        let target = self.mirror_path(output_root);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).at_path(parent)?;
        }
        Ok(target)
    }

    pub fn subject_or_unknown(&self) -> &str {
        self.subject_id.as_deref().unwrap_or("unknown")
    }
}

impl std::fmt::Display for FileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Recursive discovery of recordings under a root, in file-name order per directory
#[derive(Debug, Clone)]
pub struct FileWalker {
    root: PathBuf,
    extension: Option<String>,
    name_filter: Option<Regex>,
    pattern: Option<SubjectPattern>,
}

impl FileWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: None,
            name_filter: None,
            pattern: None,
        }
    }

    /// Keep files with this extension (case-insensitive, no leading dot)
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        self.extension = Some(extension.trim_start_matches('.').to_ascii_lowercase());
        self
    }

    /// Keep files whose `/`-joined relative path matches `filter`
    pub fn with_name_filter(mut self, filter: Regex) -> Self {
        self.name_filter = Some(filter);
        self
    }

    pub fn with_subject_pattern(mut self, pattern: SubjectPattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn check_root(&self) -> EmgResult<()> {
        if !self.root.exists() {
            return Err(EmgError::path(&self.root, "root does not exist"));
        }
        if !self.root.is_dir() {
            return Err(EmgError::path(&self.root, "root is not a directory"));
        }
        Ok(())
    }

    fn accepts(&self, relative: &Path) -> bool {
        if let Some(ext) = &self.extension {
            let matches = relative
                .extension()
                .map_or(false, |e| e.to_string_lossy().to_ascii_lowercase() == *ext);
            if !matches {
                return false;
            }
        }
        match &self.name_filter {
            Some(filter) => filter.is_match(&slash_path(relative)),
            None => true,
        }
    }

    /// Lazily yield matching files in stable path order.
    ///
    /// The root is checked up front; errors met while descending (unreadable
    /// directories) are yielded in place of the entries they hide.
    pub fn walk(&self) -> EmgResult<impl Iterator<Item = EmgResult<FileRef>> + '_> {
        self.check_root()?;
        let pattern = match &self.pattern {
            Some(pattern) => pattern.clone(),
            None => SubjectPattern::standard()?,
        };

        let iter = WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
                        let reason = err.to_string();
                        return Some(Err(EmgError::path(path, reason)));
                    }
                };
                if !entry.file_type().is_file() {
                    return None;
                }
                let relative = entry.path().strip_prefix(&self.root).ok()?.to_path_buf();
                if !self.accepts(&relative) {
                    return None;
                }
                Some(Ok(FileRef::new(relative, &pattern)))
            });

        Ok(iter)
    }

    /// Collect every matching file, failing on the first traversal error
    pub fn collect_refs(&self) -> EmgResult<Vec<FileRef>> {
        self.walk()?.collect()
    }
}
