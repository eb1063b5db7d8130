use std::fs;

use treemerge::actions::{CompletionStatus, MaterializeConfig, MaterializeError, MergePolicy};
use treemerge::duplicates::CompareMode;
use treemerge::engine::{Engine, EngineConfig, EngineError, ReconcileOptions};
use treemerge::scanner::TreeSide;
use treemerge::signal::CancelToken;
use treemerge::warning::WarningKind;

use super::common::{list_files, write, Workspace};

fn merge(ws: &Workspace, options: &ReconcileOptions) -> treemerge::actions::MaterializeSummary {
    let engine = Engine::with_defaults();
    let rec = engine
        .reconcile(&ws.a, &ws.b, options)
        .unwrap()
        .completed()
        .unwrap();
    engine
        .materialize(&rec, &ws.out, &options.policy)
        .unwrap()
        .completed()
        .unwrap()
}

#[test]
fn test_merge_prefer_a() {
    let ws = Workspace::basic();
    let summary = merge(&ws, &ReconcileOptions::default());

    assert_eq!(summary.status(), CompletionStatus::Clean);
    assert_eq!(
        list_files(&summary.output_dir),
        vec!["docs/readme.txt", "img/a.png", "img/b.png"]
    );
    assert_eq!(
        fs::read(summary.output_dir.join("docs/readme.txt")).unwrap(),
        b"readme from a"
    );
}

#[test]
fn test_merge_prefer_b() {
    let ws = Workspace::basic();
    let options = ReconcileOptions {
        policy: MergePolicy::prefer(TreeSide::B),
        ..ReconcileOptions::default()
    };
    let summary = merge(&ws, &options);

    assert_eq!(
        fs::read(summary.output_dir.join("docs/readme.txt")).unwrap(),
        b"readme from b"
    );
}

#[test]
fn test_merge_keep_both() {
    let ws = Workspace::basic();
    let options = ReconcileOptions {
        policy: MergePolicy::keep_both(),
        ..ReconcileOptions::default()
    };
    let summary = merge(&ws, &options);

    assert_eq!(
        list_files(&summary.output_dir),
        vec![
            "img/a.png",
            "img/b.png",
            "tree_a/docs/readme.txt",
            "tree_b/docs/readme.txt"
        ]
    );
}

#[test]
fn test_merge_content_mode_writes_one_copy_per_digest() {
    let ws = Workspace::new();
    write(&ws.a, "music/song.mp3", b"same audio");
    write(&ws.a, "music/song_copy.mp3", b"same audio");
    write(&ws.b, "old/track01.mp3", b"same audio");
    write(&ws.b, "old/only_b.mp3", b"other audio");

    let options = ReconcileOptions {
        mode: CompareMode::ContentHash,
        ..ReconcileOptions::default()
    };
    let summary = merge(&ws, &options);

    assert_eq!(
        list_files(&summary.output_dir),
        vec!["music/song.mp3", "old/only_b.mp3"]
    );
}

#[test]
fn test_merge_covers_every_distinct_file() {
    let ws = Workspace::new();
    for i in 0..10 {
        write(&ws.a, &format!("a/{i}.txt"), format!("a{i}").as_bytes());
        write(&ws.b, &format!("b/{i}.txt"), format!("b{i}").as_bytes());
    }
    write(&ws.a, "shared/x.cfg", b"1");
    write(&ws.b, "shared/x.cfg", b"2");

    let summary = merge(&ws, &ReconcileOptions::default());

    // "0.txt".."9.txt" and x.cfg are shared by name
    let written = list_files(&summary.output_dir);
    assert_eq!(written.len(), summary.files_written);
    assert!(written.contains(&"shared/x.cfg".to_string()));
    for i in 0..10 {
        assert!(written.contains(&format!("a/{i}.txt")));
    }
}

#[test]
fn test_merge_twice_produces_same_tree() {
    let ws = Workspace::basic();
    let first = merge(&ws, &ReconcileOptions::default());
    let first_files = list_files(&first.output_dir);
    write(&first.output_dir, "stray.txt", b"left over");

    let second = merge(&ws, &ReconcileOptions::default());

    assert_eq!(list_files(&second.output_dir), first_files);
    assert_eq!(first.output_dir, second.output_dir);
}

#[test]
fn test_merge_no_clobber_refuses_existing_result() {
    let ws = Workspace::basic();
    merge(&ws, &ReconcileOptions::default());

    let engine = Engine::new(EngineConfig::default().with_materialize_config(
        MaterializeConfig::default().with_overwrite(false),
    ));
    let rec = engine
        .reconcile(&ws.a, &ws.b, &ReconcileOptions::default())
        .unwrap()
        .completed()
        .unwrap();
    let err = engine
        .materialize(&rec, &ws.out, &MergePolicy::default())
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Materialize(MaterializeError::OutputConflict { .. })
    ));
}

#[test]
fn test_merge_into_source_tree_is_rejected() {
    let ws = Workspace::basic();
    let engine = Engine::with_defaults();
    let rec = engine
        .reconcile(&ws.a, &ws.b, &ReconcileOptions::default())
        .unwrap()
        .completed()
        .unwrap();

    let err = engine
        .materialize(&rec, &ws.b.join("docs"), &MergePolicy::default())
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Materialize(MaterializeError::OutputConflict { .. })
    ));
    assert!(!ws.b.join("docs/dedup_result").exists());
}

#[test]
fn test_merge_busy_output() {
    let ws = Workspace::basic();
    fs::create_dir_all(&ws.out).unwrap();
    fs::write(ws.out.join(".dedup_result.lock"), b"1").unwrap();

    let engine = Engine::with_defaults();
    let rec = engine
        .reconcile(&ws.a, &ws.b, &ReconcileOptions::default())
        .unwrap()
        .completed()
        .unwrap();
    let err = engine
        .materialize(&rec, &ws.out, &MergePolicy::default())
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Materialize(MaterializeError::Busy(_))
    ));
}

#[test]
fn test_merge_records_source_removed_after_compare() {
    let ws = Workspace::basic();
    let engine = Engine::with_defaults();
    let rec = engine
        .reconcile(&ws.a, &ws.b, &ReconcileOptions::default())
        .unwrap()
        .completed()
        .unwrap();

    fs::remove_file(ws.b.join("img/b.png")).unwrap();

    let summary = engine
        .materialize(&rec, &ws.out, &MergePolicy::default())
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(summary.files_written, 2);
    assert_eq!(summary.status(), CompletionStatus::WithWarnings(1));
    assert_eq!(summary.warnings[0].kind, WarningKind::NotFound);
}

#[test]
fn test_merge_cancelled_leaves_no_result() {
    let ws = Workspace::basic();
    let token = CancelToken::new();
    let engine = Engine::new(EngineConfig::default().with_cancel_token(token.clone()));
    let rec = engine
        .reconcile(&ws.a, &ws.b, &ReconcileOptions::default())
        .unwrap()
        .completed()
        .unwrap();

    token.cancel();
    let outcome = engine
        .materialize(&rec, &ws.out, &MergePolicy::default())
        .unwrap();

    assert!(outcome.is_cancelled());
    assert!(!ws.out.join("dedup_result").exists());
    assert!(!ws.out.join(".dedup_result.lock").exists());
}

#[test]
fn test_merge_custom_result_dir() {
    let ws = Workspace::basic();
    let engine = Engine::new(EngineConfig::default().with_materialize_config(
        MaterializeConfig::default().with_result_dir("merged"),
    ));
    let rec = engine
        .reconcile(&ws.a, &ws.b, &ReconcileOptions::default())
        .unwrap()
        .completed()
        .unwrap();

    let summary = engine
        .materialize(&rec, &ws.out, &MergePolicy::default())
        .unwrap()
        .completed()
        .unwrap();
    assert!(summary.output_dir.ends_with("merged"));
    assert_eq!(list_files(&summary.output_dir).len(), 3);
}

#[cfg(unix)]
#[test]
fn test_merge_keeps_files_whose_names_differ_only_in_invalid_bytes() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let ws = Workspace::new();
    let name_a = OsStr::from_bytes(b"f\xff.txt");
    let name_b = OsStr::from_bytes(b"f\xfe.txt");
    // Some filesystems only accept UTF-8 names
    if fs::write(ws.a.join(name_a), b"from a").is_err() {
        return;
    }
    fs::write(ws.b.join(name_b), b"from b").unwrap();

    let summary = merge(&ws, &ReconcileOptions::default());

    assert_eq!(summary.files_written, 2);
    assert_eq!(fs::read(summary.output_dir.join(name_a)).unwrap(), b"from a");
    assert_eq!(fs::read(summary.output_dir.join(name_b)).unwrap(), b"from b");
}
