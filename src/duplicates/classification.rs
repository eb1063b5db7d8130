//! Classification data model.
//!
//! A [`Classification`] partitions the entries of two trees into cross-tree
//! duplicate pairs and per-tree unique lists under one [`CompareMode`].
//!
//! # Example
//!
//! ```
//! use treemerge::duplicates::{Classification, CompareMode};
//!
//! let empty = Classification::empty(CompareMode::NameOnly);
//! assert!(empty.duplicates.is_empty());
//! assert_eq!(empty.key_groups().len(), 0);
//! ```

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize, Serializer};

use crate::scanner::{FileEntry, TreeSide};

/// Equivalence rule used to decide that two files are "the same".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareMode {
    /// Same file name (case-sensitive, including extension)
    #[default]
    #[serde(alias = "name")]
    NameOnly,
    /// Same content digest
    #[serde(alias = "content")]
    ContentHash,
}

impl fmt::Display for CompareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameOnly => f.write_str("name"),
            Self::ContentHash => f.write_str("content"),
        }
    }
}

/// The value two files share when they are considered equivalent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EquivalenceKey {
    /// A file name, compared byte for byte
    Name(#[serde(serialize_with = "serialize_lossy")] OsString),
    /// A lowercase hex BLAKE3 digest
    Content(String),
}

impl EquivalenceKey {
    /// Name key from anything that converts into an OS string.
    #[must_use]
    pub fn name(name: impl Into<OsString>) -> Self {
        Self::Name(name.into())
    }

    /// The key as text. Names that are not valid UTF-8 are converted lossily,
    /// so two different keys can print the same.
    #[must_use]
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        match self {
            Self::Name(name) => name.to_string_lossy(),
            Self::Content(hex) => Cow::Borrowed(hex),
        }
    }
}

impl fmt::Display for EquivalenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

fn serialize_lossy<S: Serializer>(name: &OsStr, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&name.to_string_lossy())
}

/// How a duplicate pair was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DuplicateKind {
    /// Matched by file name
    NameDuplicate,
    /// Matched by content digest
    ContentDuplicate,
}

impl From<CompareMode> for DuplicateKind {
    fn from(mode: CompareMode) -> Self {
        match mode {
            CompareMode::NameOnly => Self::NameDuplicate,
            CompareMode::ContentHash => Self::ContentDuplicate,
        }
    }
}

/// One matched cross-tree pair.
///
/// `entry_a` always comes from tree A and `entry_b` from tree B.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateRecord {
    /// Shared equivalence key
    pub key: EquivalenceKey,
    /// Entry from tree A
    pub entry_a: FileEntry,
    /// Entry from tree B
    pub entry_b: FileEntry,
    /// Match rule
    pub kind: DuplicateKind,
}

/// A content-mode entry whose digest is duplicated across trees but which was
/// not picked as its side's representative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShadowedEntry {
    /// Tree the entry belongs to
    pub side: TreeSide,
    /// Digest shared with the duplicate record
    pub key: EquivalenceKey,
    /// The entry itself
    pub entry: FileEntry,
}

/// Result of classifying two trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Rule that produced this classification
    pub mode: CompareMode,
    /// Cross-tree pairs, ordered by first appearance of the key in tree A
    pub duplicates: Vec<DuplicateRecord>,
    /// Entries of tree A with no counterpart in tree B, in walk order
    pub unique_a: Vec<FileEntry>,
    /// Entries of tree B with no counterpart in tree A, in walk order
    pub unique_b: Vec<FileEntry>,
    /// Non-representative copies of cross-tree content duplicates
    pub shadowed: Vec<ShadowedEntry>,
}

/// All distinct entries sharing one duplicated key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyGroup<'a> {
    /// The shared key
    pub key: &'a EquivalenceKey,
    /// Distinct tree A entries paired under this key, in record order
    pub entries_a: Vec<&'a FileEntry>,
    /// Distinct tree B entries paired under this key, in record order
    pub entries_b: Vec<&'a FileEntry>,
}

impl<'a> KeyGroup<'a> {
    /// Entries of one side.
    #[must_use]
    pub fn side(&self, side: TreeSide) -> &[&'a FileEntry] {
        match side {
            TreeSide::A => &self.entries_a,
            TreeSide::B => &self.entries_b,
        }
    }
}

impl Classification {
    /// A classification with no entries.
    #[must_use]
    pub fn empty(mode: CompareMode) -> Self {
        Self {
            mode,
            duplicates: Vec::new(),
            unique_a: Vec::new(),
            unique_b: Vec::new(),
            shadowed: Vec::new(),
        }
    }

    /// Duplicate records grouped by key, deduplicating entries that take part
    /// in several cross-product pairs.
    #[must_use]
    pub fn key_groups(&self) -> Vec<KeyGroup<'_>> {
        let mut groups: Vec<KeyGroup<'_>> = Vec::new();
        let mut index: HashMap<&EquivalenceKey, usize> = HashMap::new();
        let mut seen: HashSet<(usize, TreeSide, &Path)> = HashSet::new();

        for record in &self.duplicates {
            let slot = *index.entry(&record.key).or_insert_with(|| {
                groups.push(KeyGroup {
                    key: &record.key,
                    entries_a: Vec::new(),
                    entries_b: Vec::new(),
                });
                groups.len() - 1
            });

            if seen.insert((slot, TreeSide::A, record.entry_a.full_path.as_path())) {
                groups[slot].entries_a.push(&record.entry_a);
            }
            if seen.insert((slot, TreeSide::B, record.entry_b.full_path.as_path())) {
                groups[slot].entries_b.push(&record.entry_b);
            }
        }

        groups
    }

    /// Number of distinct keys among the duplicate records.
    #[must_use]
    pub fn duplicate_key_count(&self) -> usize {
        self.duplicates
            .iter()
            .map(|r| &r.key)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Every classified entry of one side, each exactly once.
    #[must_use]
    pub fn entries_of(&self, side: TreeSide) -> Vec<&FileEntry> {
        let mut seen: HashSet<&Path> = HashSet::new();
        let mut entries = Vec::new();

        for record in &self.duplicates {
            let entry = match side {
                TreeSide::A => &record.entry_a,
                TreeSide::B => &record.entry_b,
            };
            if seen.insert(entry.full_path.as_path()) {
                entries.push(entry);
            }
        }

        let uniques = match side {
            TreeSide::A => &self.unique_a,
            TreeSide::B => &self.unique_b,
        };
        entries.extend(uniques.iter());
        entries.extend(
            self.shadowed
                .iter()
                .filter(|s| s.side == side)
                .map(|s| &s.entry),
        );

        entries
    }
}
