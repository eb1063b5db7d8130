//! Directory walker implementation using walkdir.
//!
//! # Overview
//!
//! [`Walker`] enumerates one root into a [`Tree`]. It is best-effort: symbolic
//! links, unreadable subdirectories, and per-entry I/O failures are recorded as
//! warnings and skipped, and only problems with the root itself are fatal.
//!
//! Children are visited in file-name order, so two walks of an unchanged tree
//! produce identical entry lists.
//!
//! # Example
//!
//! ```no_run
//! use treemerge::scanner::{TreeSide, Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Music"), TreeSide::A, WalkerConfig::recursive());
//! if let Some(tree) = walker.walk().unwrap().completed() {
//!     println!("{} files, {} warnings", tree.len(), tree.warnings.len());
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use walkdir::{DirEntry, WalkDir};

use super::{FileEntry, ScanError, Tree, TreeSide, WalkerConfig};
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::signal::{CancelToken, Outcome};
use crate::warning::{Stage, Warning, WarningKind};

/// Enumerate `root` with the given configuration and no progress reporting.
///
/// # Errors
///
/// Returns [`ScanError`] if the root does not exist, is not a directory, or
/// cannot be read.
pub fn enumerate(
    root: &Path,
    side: TreeSide,
    config: &WalkerConfig,
) -> Result<Outcome<Tree>, ScanError> {
    Walker::new(root, side, config.clone()).walk()
}

/// Directory walker for one tree.
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Which input tree this is
    side: TreeSide,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional cancellation token
    cancel: Option<CancelToken>,
    /// Optional progress sink
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl Walker {
    /// Create a new walker for the given root.
    #[must_use]
    pub fn new(root: &Path, side: TreeSide, config: WalkerConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            side,
            config,
            cancel: None,
            progress: None,
        }
    }

    /// Set the cancellation token, checked after each entry.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Check the root and resolve it to an absolute path.
    ///
    /// [`Walker::walk`] runs the same check; callers that walk several roots
    /// use this to reject a bad root before any of them is walked.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] if the root is missing, not a directory, or
    /// unreadable.
    pub fn resolve_root(&self) -> Result<PathBuf, ScanError> {
        let metadata = fs::metadata(&self.root).map_err(|e| root_error(&self.root, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(self.root.clone()));
        }

        let root = fs::canonicalize(&self.root).map_err(|e| root_error(&self.root, e))?;
        // Opening the directory is the only reliable readability check
        fs::read_dir(&root).map_err(|e| root_error(&self.root, e))?;
        Ok(root)
    }

    /// Build gitignore matcher from config patterns.
    fn build_gitignore(&self, root: &Path) -> Option<Gitignore> {
        if self.config.ignore_patterns.is_empty() {
            return None;
        }

        let mut builder = GitignoreBuilder::new(root);
        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if !gitignore.is_empty() => Some(gitignore),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    /// Whether an entry is pruned by the hidden/ignore filters.
    fn is_filtered(&self, entry: &DirEntry, root: &Path, gitignore: Option<&Gitignore>) -> bool {
        // The root itself is never filtered, even if its own name is hidden
        if entry.depth() == 0 {
            return false;
        }

        if self.config.skip_hidden && entry.file_name().to_string_lossy().starts_with('.') {
            log::trace!("Skipping hidden entry: {}", entry.path().display());
            return true;
        }

        if let Some(gi) = gitignore {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if gi
                .matched(relative, entry.file_type().is_dir())
                .is_ignore()
            {
                log::trace!("Ignoring: {}", entry.path().display());
                return true;
            }
        }

        false
    }

    /// Walk the tree.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] only for problems with the root. Everything below
    /// the root is best-effort.
    pub fn walk(&self) -> Result<Outcome<Tree>, ScanError> {
        let root = self.resolve_root()?;
        let gitignore = self.build_gitignore(&root);

        log::info!(
            "Enumerating tree {} at {} ({})",
            self.side,
            root.display(),
            if self.config.include_subtrees {
                "recursive"
            } else {
                "top level only"
            }
        );

        let mut walk_dir = WalkDir::new(&root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name();
        if !self.config.include_subtrees {
            walk_dir = walk_dir.max_depth(1);
        }

        let tracker = ProgressTracker::start(self.progress.clone(), Stage::Walk, 0, 0);
        let mut entries = Vec::new();
        let mut warnings = Vec::new();

        let iter = walk_dir
            .into_iter()
            .filter_entry(|e| !self.is_filtered(e, &root, gitignore.as_ref()));

        for result in iter {
            if crate::signal::is_cancelled(self.cancel.as_ref()) {
                log::debug!("Walker: cancellation requested, stopping");
                tracker.finish();
                return Ok(Outcome::Cancelled);
            }

            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map_or_else(|| root.clone(), Path::to_path_buf);
                    let warning = match e.io_error() {
                        Some(io_err) => Warning::from_io(Stage::Walk, &path, io_err),
                        None => Warning::new(Stage::Walk, WarningKind::Io, &path, e.to_string()),
                    };
                    tracker.warn(&warning);
                    warnings.push(warning);
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_symlink() {
                let warning = Warning::new(
                    Stage::Walk,
                    WarningKind::Symlink,
                    entry.path(),
                    "symbolic link skipped",
                );
                tracker.warn(&warning);
                warnings.push(warning);
                continue;
            }
            if !file_type.is_file() {
                // Directories are descended into by walkdir; sockets, fifos
                // and devices are not mergeable content.
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    let warning = match e.io_error() {
                        Some(io_err) => Warning::from_io(Stage::Walk, entry.path(), io_err),
                        None => {
                            Warning::new(Stage::Walk, WarningKind::Io, entry.path(), e.to_string())
                        }
                    };
                    tracker.warn(&warning);
                    warnings.push(warning);
                    continue;
                }
            };

            let full_path = entry.path().to_path_buf();
            let relative_path = full_path
                .strip_prefix(&root)
                .map_or_else(|_| PathBuf::from(entry.file_name()), Path::to_path_buf);

            tracker.tick(&full_path);
            entries.push(FileEntry::new(full_path, relative_path, metadata.len()));
        }

        tracker.finish();
        log::info!(
            "Tree {}: {} files, {} warnings",
            self.side,
            entries.len(),
            warnings.len()
        );

        Ok(Outcome::Completed(Tree {
            side: self.side,
            root,
            entries,
            warnings,
        }))
    }
}

/// Map an I/O error on the root to a fatal scan error.
fn root_error(path: &Path, error: io::Error) -> ScanError {
    match error.kind() {
        io::ErrorKind::NotFound => ScanError::NotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => ScanError::PermissionDenied(path.to_path_buf()),
        _ => ScanError::Io {
            path: path.to_path_buf(),
            source: error,
        },
    }
}
