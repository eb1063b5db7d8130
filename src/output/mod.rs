//! Output formatters for reconciliation results.
//!
//! This module provides two output formats:
//! - Text for people reading a terminal
//! - JSON for automation and scripting
//!
//! # Example
//!
//! ```no_run
//! use treemerge::engine::{Engine, ReconcileOptions};
//! use treemerge::error::ExitCode;
//! use treemerge::output::JsonOutput;
//! use std::path::Path;
//!
//! let engine = Engine::with_defaults();
//! let outcome = engine
//!     .reconcile(Path::new("a"), Path::new("b"), &ReconcileOptions::default())
//!     .unwrap();
//! if let Some(rec) = outcome.completed() {
//!     let output = JsonOutput::new(&rec, ExitCode::Success);
//!     println!("{}", output.to_json_pretty().unwrap());
//! }
//! ```

pub mod json;
pub mod text;

// Re-export main types
pub use json::{JsonOutput, JsonOutputError};
pub use text::TextOutput;
