//! Reconciliation engine.
//!
//! # Overview
//!
//! [`Engine`] runs the pipeline behind both CLI subcommands:
//!
//! 1. **Walk** - enumerate tree A and tree B
//! 2. **Classify** - partition both trees under one [`CompareMode`]
//! 3. **Summarize** - derive the [`ReconciliationReport`]
//! 4. **Materialize** (optional) - write the deduplicated tree
//!
//! The engine holds no global state. Pool size, progress sink, and the
//! cancellation token are all part of [`EngineConfig`].
//!
//! # Example
//!
//! ```no_run
//! use treemerge::engine::{Engine, EngineConfig, ReconcileOptions};
//! use treemerge::duplicates::CompareMode;
//! use std::path::Path;
//!
//! let engine = Engine::new(EngineConfig::default().with_io_threads(4));
//! let options = ReconcileOptions {
//!     mode: CompareMode::ContentHash,
//!     ..ReconcileOptions::default()
//! };
//!
//! let outcome = engine
//!     .reconcile(Path::new("backup_2023"), Path::new("backup_2024"), &options)
//!     .unwrap();
//! if let Some(reconciliation) = outcome.completed() {
//!     println!("{}", reconciliation.report);
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use ignore::gitignore::GitignoreBuilder;

use crate::actions::{materialize, MaterializeConfig, MaterializeError, MaterializeSummary, MergePolicy};
use crate::duplicates::{classify, Classification, ClassifyConfig, CompareMode};
use crate::progress::ProgressCallback;
use crate::report::{summarize, ReconciliationReport};
use crate::scanner::{ScanError, Tree, TreeSide, Walker, WalkerConfig};
use crate::signal::{CancelToken, Outcome};
use crate::warning::Warning;

/// Configuration for the engine.
#[derive(Clone)]
pub struct EngineConfig {
    /// Number of I/O threads for content hashing.
    /// Default is 4 to prevent disk thrashing.
    pub io_threads: usize,
    /// Skip hidden files and directories while walking.
    pub skip_hidden: bool,
    /// Gitignore-style patterns excluded while walking.
    pub ignore_patterns: Vec<String>,
    /// Output layout and overwrite behavior for materialization.
    pub materialize: MaterializeConfig,
    /// Optional cancellation token shared by every phase.
    pub cancel: Option<CancelToken>,
    /// Optional progress callback shared by every phase.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("io_threads", &self.io_threads)
            .field("skip_hidden", &self.skip_hidden)
            .field("ignore_patterns", &self.ignore_patterns)
            .field("materialize", &self.materialize)
            .field("cancel", &self.cancel)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            io_threads: 4,
            skip_hidden: false,
            ignore_patterns: Vec::new(),
            materialize: MaterializeConfig::default(),
            cancel: None,
            progress_callback: None,
        }
    }
}

impl EngineConfig {
    /// Set the I/O thread count.
    ///
    /// Zero is kept as-is and rejected when a reconciliation starts.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads;
        self
    }

    /// Enable/disable hidden entry filtering.
    #[must_use]
    pub fn with_skip_hidden(mut self, skip_hidden: bool) -> Self {
        self.skip_hidden = skip_hidden;
        self
    }

    /// Set gitignore-style ignore patterns.
    #[must_use]
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Set the materialization configuration.
    #[must_use]
    pub fn with_materialize_config(mut self, config: MaterializeConfig) -> Self {
        self.materialize = config;
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
}

/// Per-call options for [`Engine::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Descend into subdirectories of both roots.
    pub include_subtrees: bool,
    /// Equivalence rule.
    pub mode: CompareMode,
    /// Merge policy used when the reconciliation is materialized.
    pub policy: MergePolicy,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            include_subtrees: true,
            mode: CompareMode::NameOnly,
            policy: MergePolicy::default(),
        }
    }
}

impl ReconcileOptions {
    /// Check these options against an engine configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidOptions`] if content mode is requested
    /// without any hashing thread, or if an ignore pattern is not a valid glob.
    pub fn validate(&self, config: &EngineConfig) -> Result<(), EngineError> {
        if self.mode == CompareMode::ContentHash && config.io_threads == 0 {
            return Err(EngineError::InvalidOptions(
                "content comparison needs at least one I/O thread".to_string(),
            ));
        }

        let mut builder = GitignoreBuilder::new("");
        for pattern in &config.ignore_patterns {
            builder.add_line(None, pattern).map_err(|e| {
                EngineError::InvalidOptions(format!("invalid ignore pattern '{pattern}': {e}"))
            })?;
        }

        Ok(())
    }
}

/// The full result of reconciling two trees.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Enumeration of the first root
    pub tree_a: Tree,
    /// Enumeration of the second root
    pub tree_b: Tree,
    /// Options the reconciliation ran with
    pub options: ReconcileOptions,
    /// Partition of both trees
    pub classification: Classification,
    /// Statistics derived from the classification
    pub report: ReconciliationReport,
    /// Walk and hash warnings, tree A first
    pub warnings: Vec<Warning>,
}

impl Reconciliation {
    /// Whether any non-fatal problem was recorded.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Errors that abort an engine operation.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// The options cannot be used with this configuration.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// A root could not be enumerated.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The output tree could not be written.
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
}

/// Orchestrates walking, classification, reporting, and materialization.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    /// Create a new engine with the given configuration.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Create a new engine with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    fn walker_config(&self, include_subtrees: bool) -> WalkerConfig {
        WalkerConfig {
            include_subtrees,
            skip_hidden: self.config.skip_hidden,
            ignore_patterns: self.config.ignore_patterns.clone(),
        }
    }

    /// Enumerate one root.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Scan`] if the root is missing, not a directory,
    /// or unreadable.
    pub fn enumerate(
        &self,
        root: &Path,
        side: TreeSide,
        include_subtrees: bool,
    ) -> Result<Outcome<Tree>, EngineError> {
        Ok(self.walker(root, side, include_subtrees).walk()?)
    }

    fn walker(&self, root: &Path, side: TreeSide, include_subtrees: bool) -> Walker {
        let mut walker = Walker::new(root, side, self.walker_config(include_subtrees));
        if let Some(ref token) = self.config.cancel {
            walker = walker.with_cancel_token(token.clone());
        }
        if let Some(ref callback) = self.config.progress_callback {
            walker = walker.with_progress_callback(callback.clone());
        }
        walker
    }

    /// Classify two enumerated trees.
    pub fn classify(
        &self,
        tree_a: &Tree,
        tree_b: &Tree,
        mode: CompareMode,
    ) -> Outcome<(Classification, Vec<Warning>)> {
        let mut config = ClassifyConfig::default().with_io_threads(self.config.io_threads);
        if let Some(ref token) = self.config.cancel {
            config = config.with_cancel_token(token.clone());
        }
        if let Some(ref callback) = self.config.progress_callback {
            config = config.with_progress_callback(callback.clone());
        }
        classify(tree_a, tree_b, mode, &config)
    }

    /// Walk both roots, classify them, and summarize the result.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidOptions`] for unusable options and
    /// [`EngineError::Scan`] if either root cannot be enumerated.
    pub fn reconcile(
        &self,
        root_a: &Path,
        root_b: &Path,
        options: &ReconcileOptions,
    ) -> Result<Outcome<Reconciliation>, EngineError> {
        options.validate(&self.config)?;
        log::info!(
            "Reconciling {} with {} by {}",
            root_a.display(),
            root_b.display(),
            options.mode
        );

        let walker_a = self.walker(root_a, TreeSide::A, options.include_subtrees);
        let walker_b = self.walker(root_b, TreeSide::B, options.include_subtrees);
        // Both roots must be usable before either tree is walked
        walker_a.resolve_root()?;
        walker_b.resolve_root()?;

        let tree_a = match walker_a.walk()? {
            Outcome::Completed(tree) => tree,
            Outcome::Cancelled => return Ok(Outcome::Cancelled),
        };
        let tree_b = match walker_b.walk()? {
            Outcome::Completed(tree) => tree,
            Outcome::Cancelled => return Ok(Outcome::Cancelled),
        };

        for tree in [&tree_a, &tree_b] {
            log::debug!(
                "Tree {}: {} files, {}",
                tree.side,
                tree.len(),
                bytesize::ByteSize::b(tree.total_size())
            );
        }

        if tree_a.root == tree_b.root {
            log::warn!(
                "Both trees resolve to {}, every file will match itself",
                tree_a.root.display()
            );
        }

        let (classification, hash_warnings) = match self.classify(&tree_a, &tree_b, options.mode) {
            Outcome::Completed(result) => result,
            Outcome::Cancelled => return Ok(Outcome::Cancelled),
        };
        let report = summarize(&classification);

        let mut warnings = Vec::with_capacity(
            tree_a.warnings.len() + tree_b.warnings.len() + hash_warnings.len(),
        );
        warnings.extend(tree_a.warnings.iter().cloned());
        warnings.extend(tree_b.warnings.iter().cloned());
        warnings.extend(hash_warnings);

        log::info!(
            "Reconciliation complete: {} duplicates, {} unique, {:.1}% deduplication",
            report.duplicate_count,
            report.unique_count,
            report.deduplication_rate
        );

        Ok(Outcome::Completed(Reconciliation {
            tree_a,
            tree_b,
            options: *options,
            classification,
            report,
            warnings,
        }))
    }

    /// Write the deduplicated tree of a reconciliation under `output_root`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Materialize`] when the output cannot be prepared,
    /// is busy, overlaps a source tree, or nothing could be written.
    pub fn materialize(
        &self,
        reconciliation: &Reconciliation,
        output_root: &Path,
        policy: &MergePolicy,
    ) -> Result<Outcome<MaterializeSummary>, EngineError> {
        let mut config = self.config.materialize.clone();
        if let Some(ref token) = self.config.cancel {
            config = config.with_cancel_token(token.clone());
        }
        if let Some(ref callback) = self.config.progress_callback {
            config = config.with_progress_callback(callback.clone());
        }

        Ok(materialize(
            &reconciliation.classification,
            &reconciliation.tree_a.root,
            &reconciliation.tree_b.root,
            output_root,
            policy,
            &config,
        )?)
    }
}
