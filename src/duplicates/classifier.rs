//! Equivalence classification of two trees.
//!
//! # Overview
//!
//! [`classify`] partitions the entries of tree A and tree B under one
//! [`CompareMode`]:
//!
//! - **Name mode** matches exact, case-sensitive file names. Every name present
//!   in both trees yields the full cross product of its A entries and B entries,
//!   so a name that occurs in several subdirectories is fully represented.
//! - **Content mode** matches BLAKE3 digests. Each digest present in both trees
//!   yields one pair: the first A entry with the first B entry in walk order.
//!   Further copies of that digest are reported as shadowed entries.
//!
//! Digests are computed on a bounded rayon pool. Results are collected in input
//! order, so the classification does not depend on which worker finishes first.
//!
//! # Example
//!
//! ```no_run
//! use treemerge::duplicates::{classify, ClassifyConfig, CompareMode};
//! use treemerge::scanner::{enumerate, TreeSide, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig::recursive();
//! let a = enumerate(Path::new("left"), TreeSide::A, &config).unwrap().completed().unwrap();
//! let b = enumerate(Path::new("right"), TreeSide::B, &config).unwrap().completed().unwrap();
//!
//! let outcome = classify(&a, &b, CompareMode::ContentHash, &ClassifyConfig::default());
//! if let Some((classification, warnings)) = outcome.completed() {
//!     println!("{} pairs, {} warnings", classification.duplicates.len(), warnings.len());
//! }
//! ```

use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::Arc;

use rayon::prelude::*;

use super::classification::{
    Classification, CompareMode, DuplicateKind, DuplicateRecord, EquivalenceKey, ShadowedEntry,
};
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::scanner::{hash_to_hex, FileEntry, HashError, Hasher, Tree, TreeSide};
use crate::signal::{CancelToken, Outcome};
use crate::warning::{Stage, Warning, WarningKind};

/// Configuration for classification.
#[derive(Clone)]
pub struct ClassifyConfig {
    /// Number of I/O threads for parallel hashing.
    /// Default is 4 to prevent disk thrashing.
    pub io_threads: usize,
    /// Optional cancellation token.
    pub cancel: Option<CancelToken>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ClassifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifyConfig")
            .field("io_threads", &self.io_threads)
            .field("cancel", &self.cancel)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            io_threads: 4,
            cancel: None,
            progress_callback: None,
        }
    }
}

impl ClassifyConfig {
    /// Set the I/O thread count (at least 1).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
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

    fn is_cancelled(&self) -> bool {
        crate::signal::is_cancelled(self.cancel.as_ref())
    }
}

/// Classify the entries of two trees.
///
/// Returns the classification and the warnings for files that could not be
/// hashed (content mode only). Such files are left out of the classification.
pub fn classify(
    tree_a: &Tree,
    tree_b: &Tree,
    mode: CompareMode,
    config: &ClassifyConfig,
) -> Outcome<(Classification, Vec<Warning>)> {
    if config.is_cancelled() {
        return Outcome::Cancelled;
    }

    log::info!(
        "Classifying {} + {} files by {}",
        tree_a.len(),
        tree_b.len(),
        mode
    );

    let outcome = match mode {
        CompareMode::NameOnly => Outcome::Completed((
            classify_by_name(&tree_a.entries, &tree_b.entries),
            Vec::new(),
        )),
        CompareMode::ContentHash => classify_by_content(&tree_a.entries, &tree_b.entries, config),
    };

    if let Outcome::Completed((ref classification, ref warnings)) = outcome {
        log::info!(
            "Classification complete: {} pairs over {} keys, {} unique in A, {} unique in B, {} warnings",
            classification.duplicates.len(),
            classification.duplicate_key_count(),
            classification.unique_a.len(),
            classification.unique_b.len(),
            warnings.len()
        );
    }

    outcome
}

/// Name mode: cross product of same-named entries.
#[must_use]
pub fn classify_by_name(entries_a: &[FileEntry], entries_b: &[FileEntry]) -> Classification {
    let mut names_a: HashMap<&OsStr, Vec<&FileEntry>> = HashMap::new();
    let mut order_a: Vec<&OsStr> = Vec::new();
    for entry in entries_a {
        let slot = names_a.entry(entry.file_name()).or_default();
        if slot.is_empty() {
            order_a.push(entry.file_name());
        }
        slot.push(entry);
    }

    let mut names_b: HashMap<&OsStr, Vec<&FileEntry>> = HashMap::new();
    for entry in entries_b {
        names_b.entry(entry.file_name()).or_default().push(entry);
    }

    let mut classification = Classification::empty(CompareMode::NameOnly);

    for name in order_a {
        let Some(matches_b) = names_b.get(name) else {
            continue;
        };
        for entry_a in &names_a[name] {
            for entry_b in matches_b {
                classification.duplicates.push(DuplicateRecord {
                    key: EquivalenceKey::name(name),
                    entry_a: (*entry_a).clone(),
                    entry_b: (*entry_b).clone(),
                    kind: DuplicateKind::NameDuplicate,
                });
            }
        }
        log::debug!(
            "Name duplicate '{}': {} in A x {} in B",
            name.to_string_lossy(),
            names_a[name].len(),
            matches_b.len()
        );
    }

    classification.unique_a = entries_a
        .iter()
        .filter(|e| !names_b.contains_key(e.file_name()))
        .cloned()
        .collect();
    classification.unique_b = entries_b
        .iter()
        .filter(|e| !names_a.contains_key(e.file_name()))
        .cloned()
        .collect();

    classification
}

/// Members of one digest, as indices into the job list.
#[derive(Debug, Default)]
struct DigestGroup {
    a: Vec<usize>,
    b: Vec<usize>,
}

impl DigestGroup {
    fn is_cross_tree(&self) -> bool {
        !self.a.is_empty() && !self.b.is_empty()
    }

    fn is_representative(&self, side: TreeSide, idx: usize) -> bool {
        match side {
            TreeSide::A => self.a.first() == Some(&idx),
            TreeSide::B => self.b.first() == Some(&idx),
        }
    }
}

/// Content mode: one representative pair per cross-tree digest.
fn classify_by_content(
    entries_a: &[FileEntry],
    entries_b: &[FileEntry],
    config: &ClassifyConfig,
) -> Outcome<(Classification, Vec<Warning>)> {
    let jobs: Vec<(TreeSide, &FileEntry)> = entries_a
        .iter()
        .map(|e| (TreeSide::A, e))
        .chain(entries_b.iter().map(|e| (TreeSide::B, e)))
        .collect();

    let digests = match compute_digests(&jobs, config) {
        Outcome::Completed(digests) => digests,
        Outcome::Cancelled => return Outcome::Cancelled,
    };

    let mut warnings = Vec::new();
    let mut keys: Vec<Option<String>> = Vec::with_capacity(jobs.len());
    let mut groups: HashMap<String, DigestGroup> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for (idx, ((side, entry), digest)) in jobs.iter().zip(digests).enumerate() {
        match digest {
            Ok(hash) => {
                let hex = hash_to_hex(&hash);
                let group = groups.entry(hex.clone()).or_insert_with(|| {
                    order.push(hex.clone());
                    DigestGroup::default()
                });
                match side {
                    TreeSide::A => group.a.push(idx),
                    TreeSide::B => group.b.push(idx),
                }
                keys.push(Some(hex));
            }
            Err(e) => {
                warnings.push(hash_warning(entry, &e));
                keys.push(None);
            }
        }
    }

    let mut classification = Classification::empty(CompareMode::ContentHash);

    for hex in &order {
        let group = &groups[hex];
        if let (Some(&ia), Some(&ib)) = (group.a.first(), group.b.first()) {
            log::debug!(
                "Content duplicate {}: {} in A, {} in B",
                hex,
                group.a.len(),
                group.b.len()
            );
            classification.duplicates.push(DuplicateRecord {
                key: EquivalenceKey::Content(hex.clone()),
                entry_a: jobs[ia].1.clone(),
                entry_b: jobs[ib].1.clone(),
                kind: DuplicateKind::ContentDuplicate,
            });
        }
    }

    for (idx, ((side, entry), key)) in jobs.iter().zip(&keys).enumerate() {
        let Some(hex) = key else {
            continue;
        };
        let group = &groups[hex];
        if !group.is_cross_tree() {
            match side {
                TreeSide::A => classification.unique_a.push((*entry).clone()),
                TreeSide::B => classification.unique_b.push((*entry).clone()),
            }
        } else if !group.is_representative(*side, idx) {
            classification.shadowed.push(ShadowedEntry {
                side: *side,
                key: EquivalenceKey::Content(hex.clone()),
                entry: (*entry).clone(),
            });
        }
    }

    Outcome::Completed((classification, warnings))
}

/// Hash every job on a bounded pool, preserving input order.
fn compute_digests(
    jobs: &[(TreeSide, &FileEntry)],
    config: &ClassifyConfig,
) -> Outcome<Vec<Result<crate::scanner::Hash, HashError>>> {
    let total_bytes: u64 = jobs.iter().map(|(_, e)| e.size).sum();
    let tracker = ProgressTracker::start(
        config.progress_callback.clone(),
        Stage::Hash,
        jobs.len(),
        total_bytes,
    );

    let mut hasher = Hasher::new();
    if let Some(ref token) = config.cancel {
        hasher = hasher.with_cancel_token(token.clone());
    }

    log::info!(
        "Hashing {} files ({} bytes) on {} I/O threads",
        jobs.len(),
        total_bytes,
        config.io_threads
    );

    let work = || -> Vec<Option<Result<crate::scanner::Hash, HashError>>> {
        jobs.par_iter()
            .map(|(_, entry)| {
                if config.is_cancelled() {
                    return None;
                }
                let result = hasher.full_hash(&entry.full_path);
                if matches!(result, Err(ref e) if e.is_cancelled()) {
                    return None;
                }
                log::trace!("Hashed {}", entry.full_path.display());
                tracker.advance(entry.size, &entry.full_path);
                Some(result)
            })
            .collect()
    };

    let results = match rayon::ThreadPoolBuilder::new()
        .num_threads(config.io_threads.max(1))
        .build()
    {
        Ok(pool) => pool.install(work),
        Err(e) => {
            log::warn!(
                "Failed to create I/O thread pool ({}), using global pool with {} threads",
                e,
                rayon::current_num_threads()
            );
            work()
        }
    };

    if config.is_cancelled() || results.iter().any(Option::is_none) {
        log::info!("Hashing interrupted by cancellation");
        tracker.finish();
        return Outcome::Cancelled;
    }

    let results: Vec<_> = results.into_iter().flatten().collect();
    for (result, (_, entry)) in results.iter().zip(jobs) {
        if let Err(e) = result {
            tracker.warn(&hash_warning(entry, e));
        }
    }
    tracker.finish();

    Outcome::Completed(results)
}

/// Turn a per-file hashing failure into a warning.
fn hash_warning(entry: &FileEntry, error: &HashError) -> Warning {
    let kind = match error {
        HashError::NotFound(_) => WarningKind::NotFound,
        HashError::PermissionDenied(_) => WarningKind::PermissionDenied,
        HashError::Io { .. } | HashError::Cancelled(_) => WarningKind::Io,
    };
    Warning::new(Stage::Hash, kind, &entry.full_path, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn make_entry(root: &Path, rel: &str, content: &[u8]) -> FileEntry {
        let full = root.join(rel);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full, content).unwrap();
        FileEntry::new(full, PathBuf::from(rel), content.len() as u64)
    }

    fn tree(side: TreeSide, root: &Path, entries: Vec<FileEntry>) -> Tree {
        Tree {
            side,
            root: root.to_path_buf(),
            entries,
            warnings: Vec::new(),
        }
    }

    fn names(entries: &[FileEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_name_mode_basic_scenario() {
        let dir = TempDir::new().unwrap();
        let (ra, rb) = (dir.path().join("a"), dir.path().join("b"));
        let a = vec![
            make_entry(&ra, "docs/readme.txt", b"A readme"),
            make_entry(&ra, "img/a.png", b"png a"),
        ];
        let b = vec![
            make_entry(&rb, "docs/readme.txt", b"B readme"),
            make_entry(&rb, "img/b.png", b"png b"),
        ];

        let c = classify_by_name(&a, &b);
        assert_eq!(c.duplicates.len(), 1);
        assert_eq!(
            c.duplicates[0].key,
            EquivalenceKey::name("readme.txt")
        );
        assert_eq!(c.duplicates[0].entry_a, a[0]);
        assert_eq!(c.duplicates[0].entry_b, b[0]);
        assert_eq!(c.duplicates[0].kind, DuplicateKind::NameDuplicate);
        assert_eq!(names(&c.unique_a), vec!["a.png"]);
        assert_eq!(names(&c.unique_b), vec!["b.png"]);
        assert!(c.shadowed.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_name_mode_compares_raw_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let rel_a = PathBuf::from(OsStr::from_bytes(b"f\xff.txt"));
        let rel_b = PathBuf::from(OsStr::from_bytes(b"f\xfe.txt"));
        let a = vec![FileEntry::new(Path::new("/a").join(&rel_a), rel_a, 1)];
        let b = vec![FileEntry::new(Path::new("/b").join(&rel_b), rel_b, 1)];

        // Both print as "f\u{FFFD}.txt" but are different names
        assert_eq!(a[0].name, b[0].name);

        let c = classify_by_name(&a, &b);
        assert!(c.duplicates.is_empty());
        assert_eq!(c.unique_a, a);
        assert_eq!(c.unique_b, b);
    }

    #[test]
    fn test_name_mode_cross_product() {
        let dir = TempDir::new().unwrap();
        let (ra, rb) = (dir.path().join("a"), dir.path().join("b"));
        let a = vec![
            make_entry(&ra, "x/notes.md", b"1"),
            make_entry(&ra, "y/notes.md", b"2"),
        ];
        let b = vec![
            make_entry(&rb, "notes.md", b"3"),
            make_entry(&rb, "p/notes.md", b"4"),
            make_entry(&rb, "q/notes.md", b"5"),
        ];

        let c = classify_by_name(&a, &b);
        assert_eq!(c.duplicates.len(), 6);
        assert_eq!(c.duplicate_key_count(), 1);
        assert!(c.unique_a.is_empty());
        assert!(c.unique_b.is_empty());
        // A-major ordering
        assert_eq!(c.duplicates[0].entry_a, a[0]);
        assert_eq!(c.duplicates[2].entry_b, b[2]);
        assert_eq!(c.duplicates[3].entry_a, a[1]);
    }

    #[test]
    fn test_name_mode_is_case_sensitive() {
        let dir = TempDir::new().unwrap();
        let a = vec![make_entry(&dir.path().join("a"), "Photo.JPG", b"x")];
        let b = vec![make_entry(&dir.path().join("b"), "photo.jpg", b"x")];

        let c = classify_by_name(&a, &b);
        assert!(c.duplicates.is_empty());
        assert_eq!(c.unique_a.len(), 1);
        assert_eq!(c.unique_b.len(), 1);
    }

    #[test]
    fn test_content_mode_matches_renamed_files() {
        let dir = TempDir::new().unwrap();
        let (ra, rb) = (dir.path().join("a"), dir.path().join("b"));
        let a = vec![make_entry(&ra, "x.txt", b"identical bytes")];
        let b = vec![make_entry(&rb, "y.txt", b"identical bytes")];
        let (ta, tb) = (tree(TreeSide::A, &ra, a), tree(TreeSide::B, &rb, b));

        let (c, warnings) = classify(&ta, &tb, CompareMode::ContentHash, &ClassifyConfig::default())
            .completed()
            .unwrap();
        assert!(warnings.is_empty());
        assert_eq!(c.duplicates.len(), 1);
        assert_eq!(c.duplicates[0].kind, DuplicateKind::ContentDuplicate);
        assert_eq!(c.duplicates[0].entry_a.name, "x.txt");
        assert_eq!(c.duplicates[0].entry_b.name, "y.txt");
        assert_eq!(
            c.duplicates[0].key,
            EquivalenceKey::Content(blake3::hash(b"identical bytes").to_hex().to_string())
        );

        let (c, _) = classify(&ta, &tb, CompareMode::NameOnly, &ClassifyConfig::default())
            .completed()
            .unwrap();
        assert!(c.duplicates.is_empty());
        assert_eq!(c.unique_a.len(), 1);
        assert_eq!(c.unique_b.len(), 1);
    }

    #[test]
    fn test_content_mode_representatives_and_shadowed() {
        let dir = TempDir::new().unwrap();
        let (ra, rb) = (dir.path().join("a"), dir.path().join("b"));
        let a = vec![
            make_entry(&ra, "one.bin", b"payload"),
            make_entry(&ra, "two.bin", b"payload"),
            make_entry(&ra, "solo.bin", b"only in a"),
            make_entry(&ra, "solo_copy.bin", b"only in a"),
        ];
        let b = vec![
            make_entry(&rb, "three.bin", b"payload"),
            make_entry(&rb, "four.bin", b"payload"),
        ];
        let (ta, tb) = (tree(TreeSide::A, &ra, a), tree(TreeSide::B, &rb, b));

        let (c, _) = classify(&ta, &tb, CompareMode::ContentHash, &ClassifyConfig::default())
            .completed()
            .unwrap();

        assert_eq!(c.duplicates.len(), 1);
        assert_eq!(c.duplicates[0].entry_a.name, "one.bin");
        assert_eq!(c.duplicates[0].entry_b.name, "three.bin");

        // Intra-tree copies of a digest unique to A stay unique
        assert_eq!(names(&c.unique_a), vec!["solo.bin", "solo_copy.bin"]);
        assert!(c.unique_b.is_empty());

        let shadowed: Vec<_> = c
            .shadowed
            .iter()
            .map(|s| (s.side, s.entry.name.as_str()))
            .collect();
        assert_eq!(
            shadowed,
            vec![(TreeSide::A, "two.bin"), (TreeSide::B, "four.bin")]
        );
    }

    #[test]
    fn test_content_mode_excludes_unreadable_files() {
        let dir = TempDir::new().unwrap();
        let (ra, rb) = (dir.path().join("a"), dir.path().join("b"));
        let mut a = vec![make_entry(&ra, "ok.txt", b"fine")];
        a.push(FileEntry::new(ra.join("gone.txt"), PathBuf::from("gone.txt"), 4));
        let b = vec![make_entry(&rb, "ok.txt", b"fine")];
        let (ta, tb) = (tree(TreeSide::A, &ra, a), tree(TreeSide::B, &rb, b));

        let (c, warnings) = classify(&ta, &tb, CompareMode::ContentHash, &ClassifyConfig::default())
            .completed()
            .unwrap();

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].stage, Stage::Hash);
        assert_eq!(warnings[0].kind, WarningKind::NotFound);
        assert_eq!(c.duplicates.len(), 1);
        assert!(c.unique_a.is_empty());
        assert_eq!(c.entries_of(TreeSide::A).len(), 1);
    }

    #[test]
    fn test_content_mode_deterministic_across_pool_sizes() {
        let dir = TempDir::new().unwrap();
        let (ra, rb) = (dir.path().join("a"), dir.path().join("b"));
        let a: Vec<_> = (0..20)
            .map(|i| make_entry(&ra, &format!("f{i}.dat"), format!("c{}", i % 7).as_bytes()))
            .collect();
        let b: Vec<_> = (0..15)
            .map(|i| make_entry(&rb, &format!("g{i}.dat"), format!("c{}", i % 5).as_bytes()))
            .collect();
        let (ta, tb) = (tree(TreeSide::A, &ra, a), tree(TreeSide::B, &rb, b));

        let single = classify(
            &ta,
            &tb,
            CompareMode::ContentHash,
            &ClassifyConfig::default().with_io_threads(1),
        );
        let many = classify(
            &ta,
            &tb,
            CompareMode::ContentHash,
            &ClassifyConfig::default().with_io_threads(8),
        );
        assert_eq!(single, many);
    }

    #[test]
    fn test_classify_cancelled() {
        let dir = TempDir::new().unwrap();
        let ra = dir.path().join("a");
        let a = vec![make_entry(&ra, "x", b"x")];
        let ta = tree(TreeSide::A, &ra, a);
        let tb = tree(TreeSide::B, &ra, Vec::new());

        let token = CancelToken::new();
        token.cancel();
        let config = ClassifyConfig::default().with_cancel_token(token);
        assert!(classify(&ta, &tb, CompareMode::ContentHash, &config).is_cancelled());
        assert!(classify(&ta, &tb, CompareMode::NameOnly, &config).is_cancelled());
    }

    #[test]
    fn test_empty_trees() {
        let dir = TempDir::new().unwrap();
        let ta = tree(TreeSide::A, dir.path(), Vec::new());
        let tb = tree(TreeSide::B, dir.path(), Vec::new());

        for mode in [CompareMode::NameOnly, CompareMode::ContentHash] {
            let (c, w) = classify(&ta, &tb, mode, &ClassifyConfig::default())
                .completed()
                .unwrap();
            assert_eq!(c, Classification::empty(mode));
            assert!(w.is_empty());
        }
    }
}
