//! Non-fatal problems recorded while a job runs.
//!
//! Per-file failures never abort a walk, a classification, or a
//! materialization. They are turned into [`Warning`] values, forwarded to the
//! progress callback as they happen, and returned with the job's result so the
//! caller can present "completed with N warnings" distinctly from a clean run.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Pipeline stage that produced a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Directory enumeration
    Walk,
    /// Content digest computation
    Hash,
    /// Copying into the output tree
    Copy,
}

impl Stage {
    /// Short lowercase name, used in log lines and progress labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Walk => "walk",
            Self::Hash => "hash",
            Self::Copy => "copy",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// The entry could not be read or written due to permissions.
    PermissionDenied,
    /// The entry vanished between enumeration and use.
    NotFound,
    /// A symbolic link was skipped.
    Symlink,
    /// Any other I/O failure.
    Io,
    /// A copy was written to its per-source directory because its planned
    /// destination was already taken in this run.
    Redirected,
}

/// A recorded, non-fatal problem tied to one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    /// Stage that produced the warning
    pub stage: Stage,
    /// Classification of the problem
    pub kind: WarningKind,
    /// Path the problem relates to
    pub path: PathBuf,
    /// Human-readable detail
    pub message: String,
}

impl Warning {
    /// Create a new warning.
    #[must_use]
    pub fn new(
        stage: Stage,
        kind: WarningKind,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            kind,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Build a warning from an I/O error, classifying it by error kind.
    #[must_use]
    pub fn from_io(stage: Stage, path: &Path, error: &io::Error) -> Self {
        let kind = match error.kind() {
            io::ErrorKind::PermissionDenied => WarningKind::PermissionDenied,
            io::ErrorKind::NotFound => WarningKind::NotFound,
            _ => WarningKind::Io,
        };
        Self::new(stage, kind, path, error.to_string())
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.stage,
            self.path.display(),
            self.message
        )
    }
}
