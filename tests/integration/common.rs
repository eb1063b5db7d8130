use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Two source trees and an output root inside one temp directory.
pub struct Workspace {
    pub dir: TempDir,
    pub a: PathBuf,
    pub b: PathBuf,
    pub out: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("tree_a_src");
        let b = dir.path().join("tree_b_src");
        let out = dir.path().join("out");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        Self { dir, a, b, out }
    }

    /// The layout used throughout: one shared name, one unique file per side.
    pub fn basic() -> Self {
        let ws = Self::new();
        write(&ws.a, "docs/readme.txt", b"readme from a");
        write(&ws.a, "img/a.png", b"png a");
        write(&ws.b, "docs/readme.txt", b"readme from b");
        write(&ws.b, "img/b.png", b"png b");
        ws
    }
}

pub fn write(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Every regular file under `root`, relative and sorted.
pub fn list_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}
