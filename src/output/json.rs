//! JSON output formatter for reconciliation results.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "root_a": "/data/a",
//!   "root_b": "/data/b",
//!   "mode": "name_only",
//!   "duplicates": [
//!     { "key": "readme.txt", "a": "docs/readme.txt", "b": "docs/readme.txt" }
//!   ],
//!   "unique_a": ["img/a.png"],
//!   "unique_b": ["img/b.png"],
//!   "shadowed": [],
//!   "summary": {
//!     "count_a": 2,
//!     "count_b": 2,
//!     "duplicate_count": 1,
//!     "deduplication_rate": 25.0,
//!     "exit_code": 0,
//!     "exit_code_name": "TM000"
//!   },
//!   "warnings": [],
//!   "materialized": null
//! }
//! ```

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::actions::MaterializeSummary;
use crate::duplicates::{CompareMode, DuplicateRecord};
use crate::engine::Reconciliation;
use crate::error::ExitCode;
use crate::report::ReconciliationReport;
use crate::scanner::TreeSide;
use crate::warning::Warning;

/// One duplicate pair in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonPair {
    /// File name or hex digest shared by both files
    pub key: String,
    /// Path relative to root A
    pub a: String,
    /// Path relative to root B
    pub b: String,
}

impl JsonPair {
    /// Create a JSON pair from a duplicate record.
    #[must_use]
    pub fn from_record(record: &DuplicateRecord) -> Self {
        Self {
            key: record.key.to_string(),
            a: display_path(&record.entry_a.relative_path),
            b: display_path(&record.entry_b.relative_path),
        }
    }
}

/// A non-representative copy in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonShadowed {
    /// Tree the copy belongs to
    pub side: TreeSide,
    /// Digest shared with its duplicate pair
    pub key: String,
    /// Path relative to the copy's root
    pub path: String,
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Report counters
    #[serde(flatten)]
    pub report: ReconciliationReport,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "TM000")
    pub exit_code_name: String,
}

/// Materialization result in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonMaterialized {
    /// Directory the merged tree was written to
    pub output_dir: String,
    /// Number of files written
    pub files_written: usize,
    /// Bytes written
    pub bytes_written: u64,
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// Canonical root of tree A
    pub root_a: String,
    /// Canonical root of tree B
    pub root_b: String,
    /// Equivalence rule used
    pub mode: CompareMode,
    /// Duplicate pairs
    pub duplicates: Vec<JsonPair>,
    /// Files only in tree A
    pub unique_a: Vec<String>,
    /// Files only in tree B
    pub unique_b: Vec<String>,
    /// Extra copies of content duplicates
    pub shadowed: Vec<JsonShadowed>,
    /// Summary statistics
    pub summary: JsonSummary,
    /// Walk, hash, and copy warnings
    pub warnings: Vec<Warning>,
    /// Present after a merge
    pub materialized: Option<JsonMaterialized>,
}

impl JsonOutput {
    /// Create JSON output from a reconciliation and the exit code of the run.
    #[must_use]
    pub fn new(reconciliation: &Reconciliation, exit_code: ExitCode) -> Self {
        let classification = &reconciliation.classification;
        Self {
            root_a: display_path(&reconciliation.tree_a.root),
            root_b: display_path(&reconciliation.tree_b.root),
            mode: classification.mode,
            duplicates: classification
                .duplicates
                .iter()
                .map(JsonPair::from_record)
                .collect(),
            unique_a: classification
                .unique_a
                .iter()
                .map(|e| display_path(&e.relative_path))
                .collect(),
            unique_b: classification
                .unique_b
                .iter()
                .map(|e| display_path(&e.relative_path))
                .collect(),
            shadowed: classification
                .shadowed
                .iter()
                .map(|s| JsonShadowed {
                    side: s.side,
                    key: s.key.to_string(),
                    path: display_path(&s.entry.relative_path),
                })
                .collect(),
            summary: JsonSummary {
                report: reconciliation.report.clone(),
                exit_code: exit_code.as_i32(),
                exit_code_name: exit_code.code_prefix().to_string(),
            },
            warnings: reconciliation.warnings.clone(),
            materialized: None,
        }
    }

    /// Attach the result of a merge, including its warnings.
    #[must_use]
    pub fn with_materialized(mut self, summary: &MaterializeSummary) -> Self {
        self.warnings.extend(summary.warnings.iter().cloned());
        self.materialized = Some(JsonMaterialized {
            output_dir: display_path(&summary.output_dir),
            files_written: summary.files_written,
            bytes_written: summary.bytes_written,
        });
        self
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
