//! Scanner module for tree enumeration and content hashing.
//!
//! This module provides functionality for:
//! - Enumerating one root directory into a [`Tree`] of [`FileEntry`] values
//! - Streaming BLAKE3 digests for content equivalence
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: BLAKE3 file hashing (streaming)
//!
//! # Example
//!
//! ```no_run
//! use treemerge::scanner::{enumerate, TreeSide, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig::default();
//! let tree = enumerate(Path::new("./photos"), TreeSide::A, &config)
//!     .unwrap()
//!     .completed()
//!     .unwrap();
//! for entry in &tree.entries {
//!     println!("{}", entry.relative_path.display());
//! }
//! ```

pub mod hasher;
pub mod walker;

use std::ffi::OsStr;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::warning::Warning;

// Re-export main types
pub use hasher::{hash_to_hex, Hash, HashError, Hasher, CHUNK_SIZE};
pub use walker::{enumerate, Walker};

/// Which of the two input trees an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeSide {
    /// The first tree
    A,
    /// The second tree
    B,
}

impl fmt::Display for TreeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::B => f.write_str("B"),
        }
    }
}

/// One regular file discovered under a tree root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FileEntry {
    /// File name including extension, lossily converted for display
    pub name: String,
    /// Absolute path to the file
    pub full_path: PathBuf,
    /// Path relative to the entry's own tree root
    pub relative_path: PathBuf,
    /// File size in bytes at enumeration time
    pub size: u64,
}

impl FileEntry {
    /// Create a new FileEntry.
    ///
    /// The name is taken from the last component of `relative_path`.
    #[must_use]
    pub fn new(full_path: PathBuf, relative_path: PathBuf, size: u64) -> Self {
        let name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            full_path,
            relative_path,
            size,
        }
    }

    /// The exact file name, as stored by the filesystem.
    #[must_use]
    pub fn file_name(&self) -> &OsStr {
        self.relative_path.file_name().unwrap_or_default()
    }
}

/// The enumeration of one root directory.
#[derive(Debug, Clone)]
pub struct Tree {
    /// Which input this tree is
    pub side: TreeSide,
    /// Canonical root the entries were enumerated from
    pub root: PathBuf,
    /// Entries in traversal order
    pub entries: Vec<FileEntry>,
    /// Problems recorded while walking
    pub warnings: Vec<Warning>,
}

impl Tree {
    /// Number of entries in this tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if this tree has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total size of all entries in bytes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

/// Configuration for directory walking.
///
/// Controls recursion and filtering. Symbolic links are never followed.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Descend into subdirectories. When false only the root's direct
    /// regular-file children are listed.
    pub include_subtrees: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Glob patterns to ignore (gitignore-style), matched relative to the root.
    pub ignore_patterns: Vec<String>,
}

impl WalkerConfig {
    /// Configuration for a full recursive walk with no filters.
    #[must_use]
    pub fn recursive() -> Self {
        Self {
            include_subtrees: true,
            ..Self::default()
        }
    }

    /// Configuration for a shallow walk with no filters.
    #[must_use]
    pub fn shallow() -> Self {
        Self::default()
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
}

/// Errors that abort a walk before any entry is produced.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// The root path does not exist.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The root path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The root directory cannot be read.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Any other I/O failure on the root itself.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
