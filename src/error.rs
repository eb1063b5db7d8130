//! Structured error handling and exit codes.

use serde::Serialize;

use crate::actions::MaterializeError;
use crate::engine::EngineError;

/// Exit codes for the treemerge application.
///
/// - 0: Success (completed cleanly; for `compare`, duplicates were found)
/// - 1: General error (unexpected failure)
/// - 2: No duplicates found (`compare` completed, trees share nothing)
/// - 3: Partial success (completed with some non-fatal warnings)
/// - 4: Output conflict (output overlaps a source, exists, or is busy)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: Completed without warnings.
    Success = 0,
    /// General error: An unexpected error occurred.
    GeneralError = 1,
    /// No duplicates: Comparison completed but the trees share no key.
    NoDuplicates = 2,
    /// Partial success: Completed but some files produced warnings.
    PartialSuccess = 3,
    /// Output conflict: The output location cannot be used right now.
    OutputConflict = 4,
    /// Interrupted: Run was interrupted by user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "TM000",
            Self::GeneralError => "TM001",
            Self::NoDuplicates => "TM002",
            Self::PartialSuccess => "TM003",
            Self::OutputConflict => "TM004",
            Self::Interrupted => "TM130",
        }
    }

    /// Pick the exit code for a fatal error.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        let materialize = err.downcast_ref::<MaterializeError>().or_else(|| {
            match err.downcast_ref::<EngineError>() {
                Some(EngineError::Materialize(e)) => Some(e),
                _ => None,
            }
        });

        match materialize {
            Some(MaterializeError::OutputConflict { .. } | MaterializeError::Busy(_)) => {
                Self::OutputConflict
            }
            _ => Self::GeneralError,
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "TM001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
