//! File actions module.
//!
//! This module provides materialization of a deduplicated output tree:
//! - Unique files of both trees are copied at their relative paths
//! - Duplicated keys keep the preferred side's copy, or both copies under
//!   per-source directories
//! - Per-file failures are collected as warnings while the batch continues
//!
//! ```no_run
//! use treemerge::actions::{plan_copies, MaterializeConfig, MergePolicy};
//! use treemerge::duplicates::{Classification, CompareMode};
//!
//! let classification = Classification::empty(CompareMode::NameOnly);
//! let plan = plan_copies(&classification, &MergePolicy::keep_both(), &MaterializeConfig::default());
//! println!("{} files would be copied", plan.len());
//! ```

pub mod materialize;

pub use materialize::{
    materialize, plan_copies, CompletionStatus, MaterializeConfig, MaterializeError,
    MaterializeSummary, MergePolicy, PlannedCopy, DEFAULT_RESULT_DIR,
};
