use std::collections::HashSet;
use std::fs;

use treemerge::duplicates::{CompareMode, EquivalenceKey};
use treemerge::engine::{Engine, EngineConfig, ReconcileOptions};
use treemerge::scanner::TreeSide;
use treemerge::warning::{Stage, WarningKind};

use super::common::{write, Workspace};

fn content_mode() -> ReconcileOptions {
    ReconcileOptions {
        mode: CompareMode::ContentHash,
        ..ReconcileOptions::default()
    }
}

#[test]
fn test_compare_empty_trees() {
    let ws = Workspace::new();
    let engine = Engine::with_defaults();

    let rec = engine
        .reconcile(&ws.a, &ws.b, &ReconcileOptions::default())
        .unwrap()
        .completed()
        .unwrap();

    assert!(rec.classification.duplicates.is_empty());
    assert_eq!(rec.report.count_a + rec.report.count_b, 0);
    assert_eq!(rec.report.deduplication_rate, 0.0);
}

#[test]
fn test_compare_by_name_basic_layout() {
    let ws = Workspace::basic();
    let engine = Engine::with_defaults();

    let rec = engine
        .reconcile(&ws.a, &ws.b, &ReconcileOptions::default())
        .unwrap()
        .completed()
        .unwrap();

    let c = &rec.classification;
    assert_eq!(c.duplicates.len(), 1);
    assert_eq!(
        c.duplicates[0].key,
        EquivalenceKey::name("readme.txt")
    );
    assert_eq!(c.unique_a.len(), 1);
    assert_eq!(c.unique_a[0].name, "a.png");
    assert_eq!(c.unique_b[0].name, "b.png");
    assert!((rec.report.deduplication_rate - 25.0).abs() < f64::EPSILON);
}

#[test]
fn test_compare_by_content_ignores_names() {
    let ws = Workspace::new();
    write(&ws.a, "2023/IMG_0001.jpg", b"holiday photo");
    write(&ws.a, "notes.txt", b"only in a");
    write(&ws.b, "photos/beach.jpg", b"holiday photo");
    write(&ws.b, "notes.txt", b"different notes");

    let engine = Engine::with_defaults();
    let rec = engine
        .reconcile(&ws.a, &ws.b, &content_mode())
        .unwrap()
        .completed()
        .unwrap();

    let c = &rec.classification;
    assert_eq!(c.duplicates.len(), 1);
    assert_eq!(c.duplicates[0].entry_a.name, "IMG_0001.jpg");
    assert_eq!(c.duplicates[0].entry_b.name, "beach.jpg");
    // Same name, different bytes: both unique
    assert_eq!(c.unique_a.len(), 1);
    assert_eq!(c.unique_b.len(), 1);
    assert!(matches!(c.duplicates[0].key, EquivalenceKey::Content(ref hex) if hex.len() == 64));
}

#[test]
fn test_compare_name_cross_product() {
    let ws = Workspace::new();
    write(&ws.a, "x/index.html", b"1");
    write(&ws.a, "y/index.html", b"2");
    write(&ws.b, "p/index.html", b"3");
    write(&ws.b, "q/index.html", b"4");
    write(&ws.b, "r/index.html", b"5");

    let rec = Engine::with_defaults()
        .reconcile(&ws.a, &ws.b, &ReconcileOptions::default())
        .unwrap()
        .completed()
        .unwrap();

    assert_eq!(rec.classification.duplicates.len(), 6);
    assert_eq!(rec.report.duplicate_count, 1);
    assert_eq!(rec.report.pair_count, 6);
    assert!((rec.report.deduplication_rate - 20.0).abs() < 1e-9);
}

#[test]
fn test_partition_is_total_and_disjoint() {
    let ws = Workspace::new();
    for i in 0..6 {
        write(&ws.a, &format!("a{i}.bin"), format!("payload {}", i % 3).as_bytes());
        write(&ws.b, &format!("sub/b{i}.bin"), format!("payload {}", i % 4).as_bytes());
    }

    for options in [ReconcileOptions::default(), content_mode()] {
        let rec = Engine::with_defaults()
            .reconcile(&ws.a, &ws.b, &options)
            .unwrap()
            .completed()
            .unwrap();

        for (side, tree) in [(TreeSide::A, &rec.tree_a), (TreeSide::B, &rec.tree_b)] {
            let classified = rec.classification.entries_of(side);
            let unique: HashSet<_> = classified.iter().map(|e| &e.full_path).collect();
            assert_eq!(unique.len(), classified.len(), "entry classified twice");
            assert_eq!(classified.len(), tree.len(), "entry missing");
        }
    }
}

#[test]
fn test_shallow_compare_ignores_subdirectories() {
    let ws = Workspace::basic();
    write(&ws.a, "top.txt", b"t");
    write(&ws.b, "top.txt", b"t");

    let options = ReconcileOptions {
        include_subtrees: false,
        ..ReconcileOptions::default()
    };
    let rec = Engine::with_defaults()
        .reconcile(&ws.a, &ws.b, &options)
        .unwrap()
        .completed()
        .unwrap();

    assert_eq!(rec.report.count_a, 1);
    assert_eq!(rec.report.count_b, 1);
    assert_eq!(rec.classification.duplicates.len(), 1);
}

#[test]
fn test_ignore_patterns_and_hidden_files() {
    let ws = Workspace::basic();
    write(&ws.a, ".cache/blob", b"x");
    write(&ws.b, "build/out.o", b"y");

    let engine = Engine::new(
        EngineConfig::default()
            .with_skip_hidden(true)
            .with_ignore_patterns(vec!["build/".to_string()]),
    );
    let rec = engine
        .reconcile(&ws.a, &ws.b, &ReconcileOptions::default())
        .unwrap()
        .completed()
        .unwrap();

    assert_eq!(rec.report.count_a, 2);
    assert_eq!(rec.report.count_b, 2);
}

#[test]
fn test_compare_is_deterministic() {
    let ws = Workspace::new();
    for i in 0..20 {
        write(&ws.a, &format!("d{}/f{i}.dat", i % 4), format!("{}", i % 7).as_bytes());
        write(&ws.b, &format!("e{}/g{i}.dat", i % 3), format!("{}", i % 5).as_bytes());
    }

    let run = |threads| {
        Engine::new(EngineConfig::default().with_io_threads(threads))
            .reconcile(&ws.a, &ws.b, &content_mode())
            .unwrap()
            .completed()
            .unwrap()
            .classification
    };

    let first = run(1);
    assert_eq!(first, run(8));
    assert_eq!(first, run(3));
}

#[test]
fn test_empty_files_match_by_content() {
    let ws = Workspace::new();
    write(&ws.a, "empty_a", b"");
    write(&ws.b, "empty_b", b"");

    let rec = Engine::with_defaults()
        .reconcile(&ws.a, &ws.b, &content_mode())
        .unwrap()
        .completed()
        .unwrap();

    assert_eq!(rec.classification.duplicates.len(), 1);
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_becomes_warning() {
    use std::os::unix::fs::PermissionsExt;

    let ws = Workspace::basic();
    write(&ws.a, "locked.bin", b"secret");
    let locked = ws.a.join("locked.bin");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Privileged users can read the file anyway
    if fs::read(&locked).is_ok() {
        return;
    }

    let rec = Engine::with_defaults()
        .reconcile(&ws.a, &ws.b, &content_mode())
        .unwrap()
        .completed()
        .unwrap();

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert!(rec.has_warnings());
    let warning = &rec.warnings[0];
    assert_eq!(warning.stage, Stage::Hash);
    assert_eq!(warning.kind, WarningKind::PermissionDenied);
    assert_eq!(rec.report.count_a, 2);
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_skipped_with_warning() {
    let ws = Workspace::basic();
    std::os::unix::fs::symlink(ws.a.join("img/a.png"), ws.a.join("link.png")).unwrap();

    let rec = Engine::with_defaults()
        .reconcile(&ws.a, &ws.b, &ReconcileOptions::default())
        .unwrap()
        .completed()
        .unwrap();

    assert_eq!(rec.report.count_a, 2);
    assert_eq!(rec.warnings.len(), 1);
    assert_eq!(rec.warnings[0].kind, WarningKind::Symlink);
}
