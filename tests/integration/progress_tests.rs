use std::sync::Arc;

use treemerge::duplicates::CompareMode;
use treemerge::engine::{Engine, EngineConfig, ReconcileOptions};
use treemerge::progress::{ChannelProgress, ProgressEvent};
use treemerge::warning::Stage;

use super::common::{write, Workspace};

fn percents(events: &[ProgressEvent], stage: Stage) -> Vec<f64> {
    events
        .iter()
        .filter_map(|event| match event {
            ProgressEvent::Progress(update) if update.stage == stage => update.percent,
            _ => None,
        })
        .collect()
}

#[test]
fn test_progress_is_monotonic_and_completes() {
    let ws = Workspace::new();
    for i in 0..40 {
        let body = "x".repeat(i * 100 + 1);
        write(&ws.a, &format!("a/{i}.txt"), body.as_bytes());
        write(&ws.b, &format!("b/{}.txt", i % 7), body.as_bytes());
    }

    let (progress, rx) = ChannelProgress::new();
    let engine = Engine::new(
        EngineConfig::default()
            .with_io_threads(8)
            .with_progress_callback(Arc::new(progress)),
    );
    let options = ReconcileOptions {
        mode: CompareMode::ContentHash,
        ..ReconcileOptions::default()
    };

    let rec = engine
        .reconcile(&ws.a, &ws.b, &options)
        .unwrap()
        .completed()
        .unwrap();
    engine
        .materialize(&rec, &ws.out, &options.policy)
        .unwrap()
        .completed()
        .unwrap();
    drop(engine);

    let events: Vec<ProgressEvent> = rx.try_iter().collect();
    for stage in [Stage::Hash, Stage::Copy] {
        let values = percents(&events, stage);
        assert!(!values.is_empty(), "no {stage} progress");
        assert!(
            values.windows(2).all(|w| w[0] <= w[1]),
            "{stage} progress went backwards"
        );
        assert!((values[values.len() - 1] - 100.0).abs() < 1e-9);
    }
}

#[test]
fn test_phases_are_bracketed() {
    let ws = Workspace::basic();
    let (progress, rx) = ChannelProgress::new();
    let engine = Engine::new(EngineConfig::default().with_progress_callback(Arc::new(progress)));

    engine
        .reconcile(&ws.a, &ws.b, &ReconcileOptions::default())
        .unwrap();
    drop(engine);

    let mut open: Option<Stage> = None;
    for event in rx.try_iter() {
        match event {
            ProgressEvent::PhaseStarted { stage, .. } => {
                assert!(open.is_none(), "phase started inside another");
                open = Some(stage);
            }
            ProgressEvent::PhaseFinished { stage } => {
                assert_eq!(open.take(), Some(stage));
            }
            ProgressEvent::Progress(update) => {
                assert_eq!(Some(update.stage), open);
            }
            ProgressEvent::Warning(_) => {}
        }
    }
    assert!(open.is_none());
}
