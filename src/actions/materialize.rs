//! Materialization of a deduplicated output tree.
//!
//! # Overview
//!
//! [`materialize`] copies one file per logically distinct entry of a
//! [`Classification`] into `output_root/<result_dir>`:
//!
//! 1. every unique entry of tree A, then of tree B, at its relative path;
//! 2. for every duplicated key, the preferred side's entries at their relative
//!    paths, or both sides under per-source directories when the policy keeps
//!    both.
//!
//! # Destructive overwrite
//!
//! The result directory is **removed and recreated** on every call. Nothing
//! from a previous run survives, and nothing is merged with it. Set
//! [`MaterializeConfig::overwrite`] to `false` to fail with
//! [`MaterializeError::OutputConflict`] instead.
//!
//! # Failure model
//!
//! - Per-file copy failures become warnings; the run continues.
//! - The run fails if the output cannot be prepared, if it would overlap a
//!   source tree, if another materialization holds the output lock, or if
//!   nothing at all could be written.
//! - Cancellation removes the partially written result directory.
//!
//! # Example
//!
//! ```no_run
//! use treemerge::actions::{materialize, MaterializeConfig, MergePolicy};
//! use treemerge::duplicates::{Classification, CompareMode};
//! use std::path::Path;
//!
//! let classification = Classification::empty(CompareMode::NameOnly);
//! let outcome = materialize(
//!     &classification,
//!     Path::new("left"),
//!     Path::new("right"),
//!     Path::new("merged"),
//!     &MergePolicy::default(),
//!     &MaterializeConfig::default(),
//! );
//! match outcome {
//!     Ok(o) => println!("{:?}", o.completed().map(|s| s.files_written)),
//!     Err(e) => eprintln!("Failed: {}", e),
//! }
//! ```

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use filetime::FileTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duplicates::Classification;
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::scanner::{FileEntry, TreeSide};
use crate::signal::{CancelToken, Outcome};
use crate::warning::{Stage, Warning, WarningKind};

/// Default name of the result directory created under the output root.
pub const DEFAULT_RESULT_DIR: &str = "dedup_result";

/// Which physical file survives when both trees share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePolicy {
    /// Side whose copy is kept
    pub prefer_tree: TreeSide,
    /// Keep both copies under per-source directories instead
    pub include_both_on_conflict: bool,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            prefer_tree: TreeSide::A,
            include_both_on_conflict: false,
        }
    }
}

impl MergePolicy {
    /// Keep the given side's copy.
    #[must_use]
    pub fn prefer(side: TreeSide) -> Self {
        Self {
            prefer_tree: side,
            include_both_on_conflict: false,
        }
    }

    /// Keep both copies.
    #[must_use]
    pub fn keep_both() -> Self {
        Self {
            include_both_on_conflict: true,
            ..Self::default()
        }
    }
}

/// Error type for materialization.
#[derive(Debug, Error)]
pub enum MaterializeError {
    /// The configuration is unusable.
    #[error("invalid materialize configuration: {0}")]
    InvalidConfig(String),

    /// The output root or result directory cannot be created or cleared.
    #[error("cannot prepare output {path}: {source}")]
    OutputUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The output would overwrite something it must not.
    #[error("output conflict at {path}: {reason}")]
    OutputConflict { path: PathBuf, reason: String },

    /// Another materialization holds the output lock.
    ///
    /// A run that was killed leaves its lock behind; delete the file once no
    /// other merge into this output is running.
    #[error("output is busy: lock file {0} exists (delete it if no other merge is running)")]
    Busy(PathBuf),

    /// Files were planned but none could be written.
    #[error("no files could be written ({attempted} attempted), last error: {last_error}")]
    NothingWritten { attempted: usize, last_error: String },
}

/// Configuration for materialization.
#[derive(Clone)]
pub struct MaterializeConfig {
    /// Name of the result directory under the output root.
    pub result_dir: String,
    /// Per-source directory for tree A copies.
    pub side_dir_a: String,
    /// Per-source directory for tree B copies.
    pub side_dir_b: String,
    /// Replace an existing result directory (default) or refuse.
    pub overwrite: bool,
    /// Copy modification and access times from the source.
    pub preserve_timestamps: bool,
    /// Optional cancellation token, checked before each copy.
    pub cancel: Option<CancelToken>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for MaterializeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterializeConfig")
            .field("result_dir", &self.result_dir)
            .field("side_dir_a", &self.side_dir_a)
            .field("side_dir_b", &self.side_dir_b)
            .field("overwrite", &self.overwrite)
            .field("preserve_timestamps", &self.preserve_timestamps)
            .field("cancel", &self.cancel)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for MaterializeConfig {
    fn default() -> Self {
        Self {
            result_dir: DEFAULT_RESULT_DIR.to_string(),
            side_dir_a: "tree_a".to_string(),
            side_dir_b: "tree_b".to_string(),
            overwrite: true,
            preserve_timestamps: true,
            cancel: None,
            progress_callback: None,
        }
    }
}

impl MaterializeConfig {
    /// Set the result directory name.
    #[must_use]
    pub fn with_result_dir(mut self, name: impl Into<String>) -> Self {
        self.result_dir = name.into();
        self
    }

    /// Enable/disable replacing an existing result directory.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Enable/disable timestamp preservation.
    #[must_use]
    pub fn with_preserve_timestamps(mut self, preserve: bool) -> Self {
        self.preserve_timestamps = preserve;
        self
    }

    /// Set the cancellation token.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Check that directory names are single, plain path components.
    ///
    /// # Errors
    ///
    /// Returns [`MaterializeError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<(), MaterializeError> {
        for (label, name) in [
            ("result_dir", &self.result_dir),
            ("side_dir_a", &self.side_dir_a),
            ("side_dir_b", &self.side_dir_b),
        ] {
            if !is_single_component(name) {
                return Err(MaterializeError::InvalidConfig(format!(
                    "{label} must be a single directory name, got '{name}'"
                )));
            }
        }
        if self.side_dir_a == self.side_dir_b {
            return Err(MaterializeError::InvalidConfig(
                "side_dir_a and side_dir_b must differ".to_string(),
            ));
        }
        Ok(())
    }

    fn side_dir(&self, side: TreeSide) -> &str {
        match side {
            TreeSide::A => &self.side_dir_a,
            TreeSide::B => &self.side_dir_b,
        }
    }

    fn is_cancelled(&self) -> bool {
        crate::signal::is_cancelled(self.cancel.as_ref())
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Whether a run finished cleanly or with recorded warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompletionStatus {
    /// No warnings
    Clean,
    /// Completed, with this many warnings
    WithWarnings(usize),
}

/// Result of a completed materialization.
#[derive(Debug, Clone, Serialize)]
pub struct MaterializeSummary {
    /// Directory the deduplicated tree was written to
    pub output_dir: PathBuf,
    /// Number of files written
    pub files_written: usize,
    /// Bytes written
    pub bytes_written: u64,
    /// Per-file problems (copy failures, redirected destinations)
    pub warnings: Vec<Warning>,
}

impl MaterializeSummary {
    /// Clean or completed-with-warnings.
    #[must_use]
    pub fn status(&self) -> CompletionStatus {
        if self.warnings.is_empty() {
            CompletionStatus::Clean
        } else {
            CompletionStatus::WithWarnings(self.warnings.len())
        }
    }
}

/// One planned copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCopy<'a> {
    /// Tree the source belongs to
    pub side: TreeSide,
    /// Source entry
    pub entry: &'a FileEntry,
    /// Destination relative to the result directory
    pub destination: PathBuf,
}

/// Compute the copy plan for a classification and policy.
///
/// Order: unique A entries, unique B entries, then one block per duplicated key.
#[must_use]
pub fn plan_copies<'a>(
    classification: &'a Classification,
    policy: &MergePolicy,
    config: &MaterializeConfig,
) -> Vec<PlannedCopy<'a>> {
    let mut plan: Vec<PlannedCopy<'a>> = Vec::new();

    for (side, uniques) in [
        (TreeSide::A, &classification.unique_a),
        (TreeSide::B, &classification.unique_b),
    ] {
        plan.extend(uniques.iter().map(|entry| PlannedCopy {
            side,
            entry,
            destination: entry.relative_path.clone(),
        }));
    }

    for group in classification.key_groups() {
        if policy.include_both_on_conflict {
            for side in [TreeSide::A, TreeSide::B] {
                let prefix = Path::new(config.side_dir(side));
                plan.extend(group.side(side).iter().map(|entry| PlannedCopy {
                    side,
                    entry,
                    destination: prefix.join(&entry.relative_path),
                }));
            }
        } else {
            let side = policy.prefer_tree;
            plan.extend(group.side(side).iter().map(|entry| PlannedCopy {
                side,
                entry,
                destination: entry.relative_path.clone(),
            }));
        }
    }

    plan
}

/// Exclusive claim on one output location for the duration of a run.
#[derive(Debug)]
struct OutputLock {
    path: PathBuf,
}

impl OutputLock {
    fn acquire(output_root: &Path, result_dir: &str) -> Result<Self, MaterializeError> {
        let path = output_root.join(format!(".{result_dir}.lock"));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{}", std::process::id()) {
                    log::debug!("Could not record pid in {}: {}", path.display(), e);
                }
                Ok(Self { path })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(MaterializeError::Busy(path)),
            Err(source) => Err(MaterializeError::OutputUnavailable { path, source }),
        }
    }
}

impl Drop for OutputLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Failed to remove lock {}: {}", self.path.display(), e);
        }
    }
}

/// Write the deduplicated tree.
///
/// `root_a` and `root_b` are the source roots; the result directory may not
/// overlap either of them.
///
/// # Errors
///
/// See [`MaterializeError`]. Per-file failures are not errors; they are
/// returned as warnings in the summary.
pub fn materialize(
    classification: &Classification,
    root_a: &Path,
    root_b: &Path,
    output_root: &Path,
    policy: &MergePolicy,
    config: &MaterializeConfig,
) -> Result<Outcome<MaterializeSummary>, MaterializeError> {
    config.validate()?;

    fs::create_dir_all(output_root).map_err(|source| MaterializeError::OutputUnavailable {
        path: output_root.to_path_buf(),
        source,
    })?;
    let output_root =
        fs::canonicalize(output_root).map_err(|source| MaterializeError::OutputUnavailable {
            path: output_root.to_path_buf(),
            source,
        })?;
    let output_dir = output_root.join(&config.result_dir);

    for root in [root_a, root_b] {
        let root = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        if output_dir.starts_with(&root) || root.starts_with(&output_dir) {
            return Err(MaterializeError::OutputConflict {
                path: output_dir,
                reason: format!("overlaps source tree {}", root.display()),
            });
        }
    }

    let _lock = OutputLock::acquire(&output_root, &config.result_dir)?;

    if let Ok(existing) = fs::symlink_metadata(&output_dir) {
        if !config.overwrite {
            return Err(MaterializeError::OutputConflict {
                path: output_dir,
                reason: "result directory already exists and overwrite is disabled".to_string(),
            });
        }
        log::info!("Removing previous result at {}", output_dir.display());
        let removed = if existing.is_dir() {
            fs::remove_dir_all(&output_dir)
        } else {
            fs::remove_file(&output_dir)
        };
        removed.map_err(|source| MaterializeError::OutputUnavailable {
            path: output_dir.clone(),
            source,
        })?;
    }
    fs::create_dir(&output_dir).map_err(|source| MaterializeError::OutputUnavailable {
        path: output_dir.clone(),
        source,
    })?;

    let plan = plan_copies(classification, policy, config);
    let total_bytes: u64 = plan.iter().map(|p| p.entry.size).sum();
    log::info!(
        "Materializing {} files ({} bytes) into {}",
        plan.len(),
        total_bytes,
        output_dir.display()
    );

    let tracker = ProgressTracker::start(
        config.progress_callback.clone(),
        Stage::Copy,
        plan.len(),
        total_bytes,
    );
    let mut summary = MaterializeSummary {
        output_dir: output_dir.clone(),
        files_written: 0,
        bytes_written: 0,
        warnings: Vec::new(),
    };
    let mut claimed: HashSet<PathBuf> = HashSet::new();
    let mut last_error = String::new();

    for copy in &plan {
        if config.is_cancelled() {
            log::info!("Materialization cancelled, removing partial result");
            tracker.finish();
            if let Err(e) = fs::remove_dir_all(&output_dir) {
                log::warn!(
                    "Failed to remove partial result {}: {}",
                    output_dir.display(),
                    e
                );
            }
            return Ok(Outcome::Cancelled);
        }

        let mut destination = copy.destination.clone();
        if claimed.contains(&destination) {
            let redirected = Path::new(config.side_dir(copy.side)).join(&destination);
            let warning = Warning::new(
                Stage::Copy,
                WarningKind::Redirected,
                &copy.entry.full_path,
                format!(
                    "{} already written, copied to {} instead",
                    destination.display(),
                    redirected.display()
                ),
            );
            tracker.warn(&warning);
            summary.warnings.push(warning);
            destination = redirected;

            if claimed.contains(&destination) {
                let warning = Warning::new(
                    Stage::Copy,
                    WarningKind::Io,
                    &copy.entry.full_path,
                    format!("destination {} already written", destination.display()),
                );
                tracker.warn(&warning);
                summary.warnings.push(warning);
                tracker.advance(copy.entry.size, &copy.entry.full_path);
                continue;
            }
        }

        let target = output_dir.join(&destination);
        match copy_file(&copy.entry.full_path, &target, config.preserve_timestamps) {
            Ok(bytes) => {
                log::trace!(
                    "Copied {} -> {}",
                    copy.entry.full_path.display(),
                    target.display()
                );
                summary.files_written += 1;
                summary.bytes_written += bytes;
                claimed.insert(destination);
            }
            Err(e) => {
                last_error = e.to_string();
                let warning = Warning::from_io(Stage::Copy, &copy.entry.full_path, &e);
                tracker.warn(&warning);
                summary.warnings.push(warning);
                if target.is_file() {
                    let _ = fs::remove_file(&target);
                }
            }
        }
        tracker.advance(copy.entry.size, &copy.entry.full_path);
    }
    tracker.finish();

    if !plan.is_empty() && summary.files_written == 0 {
        return Err(MaterializeError::NothingWritten {
            attempted: plan.len(),
            last_error,
        });
    }

    log::info!(
        "Materialized {} files ({} bytes) with {} warnings",
        summary.files_written,
        summary.bytes_written,
        summary.warnings.len()
    );

    Ok(Outcome::Completed(summary))
}

/// Copy one file into a freshly created destination.
fn copy_file(source: &Path, target: &Path, preserve_timestamps: bool) -> io::Result<u64> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = fs::copy(source, target)?;

    if preserve_timestamps {
        let metadata = fs::metadata(source)?;
        let mtime = FileTime::from_last_modification_time(&metadata);
        let atime = FileTime::from_last_access_time(&metadata);
        if let Err(e) = filetime::set_file_times(target, atime, mtime) {
            log::debug!("Failed to preserve times on {}: {}", target.display(), e);
        }
    }

    Ok(bytes)
}
