//! Progress reporting for engine jobs.
//!
//! The engine never renders anything itself. It reports through the
//! [`ProgressCallback`] trait, which the calling shell implements. Two
//! implementations ship with the crate:
//!
//! - [`Progress`]: indicatif bars for the terminal.
//! - [`ChannelProgress`]: forwards every event over a crossbeam channel as a
//!   [`ProgressEvent`], for UI threads that consume events in order.
//!
//! Parallel workers never call the callback directly. They go through a
//! [`ProgressTracker`], which holds a lock while it computes the next percent
//! and invokes the callback, so updates arrive one at a time and their percent
//! values never decrease.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::warning::{Stage, Warning};

/// A single progress update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Phase the update belongs to
    pub stage: Stage,
    /// Items finished so far in this phase
    pub completed: usize,
    /// Percent complete, `None` for phases without a known total (walking)
    pub percent: Option<f64>,
    /// Item that was just processed
    pub path: PathBuf,
}

/// Progress callback for engine phases.
///
/// Implement this trait to receive progress updates, warnings, and phase
/// boundaries. Calls are serialized by the engine.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// `total` is the number of items to process, or 0 when unknown.
    fn on_phase_start(&self, stage: Stage, total: usize);

    /// Called after each item is processed.
    fn on_progress(&self, update: &ProgressUpdate);

    /// Called for each non-fatal problem as it is recorded.
    fn on_warning(&self, _warning: &Warning) {}

    /// Called when a phase completes (also after cancellation).
    fn on_phase_end(&self, stage: Stage);
}

/// Serializes progress from parallel workers into one ordered stream.
///
/// Percent is computed from weighted units (bytes for hashing). When the total
/// weight is zero the tracker falls back to item counts.
pub struct ProgressTracker {
    callback: Option<Arc<dyn ProgressCallback>>,
    stage: Stage,
    total_items: usize,
    total_units: u64,
    state: Mutex<TrackerState>,
}

#[derive(Debug, Default)]
struct TrackerState {
    items: usize,
    units: u64,
    last_percent: f64,
}

impl ProgressTracker {
    /// Start a phase. Announces the phase to the callback.
    #[must_use]
    pub fn start(
        callback: Option<Arc<dyn ProgressCallback>>,
        stage: Stage,
        total_items: usize,
        total_units: u64,
    ) -> Self {
        if let Some(ref cb) = callback {
            cb.on_phase_start(stage, total_items);
        }
        Self {
            callback,
            stage,
            total_items,
            total_units,
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Record one finished item carrying `units` of weight.
    pub fn advance(&self, units: u64, path: &Path) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.items += 1;
        state.units += units;

        let percent = if self.total_units > 0 {
            state.units as f64 / self.total_units as f64 * 100.0
        } else if self.total_items > 0 {
            state.items as f64 / self.total_items as f64 * 100.0
        } else {
            100.0
        };
        let percent = percent.min(100.0).max(state.last_percent);
        state.last_percent = percent;

        if let Some(ref cb) = self.callback {
            cb.on_progress(&ProgressUpdate {
                stage: self.stage,
                completed: state.items,
                percent: Some(percent),
                path: path.to_path_buf(),
            });
        }
    }

    /// Record one finished item in a phase without a known total.
    pub fn tick(&self, path: &Path) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.items += 1;

        if let Some(ref cb) = self.callback {
            cb.on_progress(&ProgressUpdate {
                stage: self.stage,
                completed: state.items,
                percent: None,
                path: path.to_path_buf(),
            });
        }
    }

    /// Forward a warning, logging it as well.
    pub fn warn(&self, warning: &Warning) {
        log::warn!("{}", warning);
        let _guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(ref cb) = self.callback {
            cb.on_warning(warning);
        }
    }

    /// Finish the phase.
    pub fn finish(self) {
        if let Some(ref cb) = self.callback {
            cb.on_phase_end(self.stage);
        }
    }
}

/// Event forwarded by [`ChannelProgress`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A phase started with the given item total (0 when unknown)
    PhaseStarted { stage: Stage, total: usize },
    /// An item finished
    Progress(ProgressUpdate),
    /// A non-fatal problem was recorded
    Warning(Warning),
    /// A phase finished
    PhaseFinished { stage: Stage },
}

/// Callback that forwards events over a channel.
///
/// If the receiver is dropped, events are silently discarded.
#[derive(Clone)]
pub struct ChannelProgress {
    sender: Sender<ProgressEvent>,
}

impl ChannelProgress {
    /// Create a callback and the receiver that observes its events.
    #[must_use]
    pub fn new() -> (Self, Receiver<ProgressEvent>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }

    fn send(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }
}

impl ProgressCallback for ChannelProgress {
    fn on_phase_start(&self, stage: Stage, total: usize) {
        self.send(ProgressEvent::PhaseStarted { stage, total });
    }

    fn on_progress(&self, update: &ProgressUpdate) {
        self.send(ProgressEvent::Progress(update.clone()));
    }

    fn on_warning(&self, warning: &Warning) {
        self.send(ProgressEvent::Warning(warning.clone()));
    }

    fn on_phase_end(&self, stage: Stage) {
        self.send(ProgressEvent::PhaseFinished { stage });
    }
}

/// Terminal progress reporter using indicatif.
///
/// One bar per phase: a spinner while walking, bars while hashing and copying.
pub struct Progress {
    multi: MultiProgress,
    active: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, no progress bars will be displayed.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            active: Mutex::new(None),
            quiet,
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn label(stage: Stage) -> &'static str {
        match stage {
            Stage::Walk => "Walking",
            Stage::Hash => "Hashing",
            Stage::Copy => "Copying",
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, stage: Stage, _total: usize) {
        if self.quiet {
            return;
        }

        let pb = match stage {
            Stage::Walk => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::spinner_style());
                pb.enable_steady_tick(Duration::from_millis(100));
                pb
            }
            Stage::Hash | Stage::Copy => {
                let pb = self.multi.add(ProgressBar::new(100));
                pb.set_style(Self::bar_style());
                pb
            }
        };
        pb.set_message(Self::label(stage));
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(pb);
    }

    fn on_progress(&self, update: &ProgressUpdate) {
        if self.quiet {
            return;
        }

        if let Some(ref pb) = *self.active.lock().unwrap_or_else(PoisonError::into_inner) {
            match update.percent {
                Some(percent) => pb.set_position(percent.floor() as u64),
                None => pb.set_position(update.completed as u64),
            }
            pb.set_message(format!(
                "{} {}",
                Self::label(update.stage),
                truncate_path(&update.path.to_string_lossy(), 30)
            ));
        }
    }

    fn on_warning(&self, warning: &Warning) {
        if self.quiet {
            return;
        }
        let _ = self.multi.println(format!("warning: {}", warning));
    }

    fn on_phase_end(&self, stage: Stage) {
        if self.quiet {
            return;
        }

        if let Some(pb) = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pb.finish_with_message(format!("{} complete", Self::label(stage)));
        }
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len >= max_len {
        let tail: String = file_name.chars().skip(name_len + 3 - max_len).collect();
        return format!("...{}", tail);
    }

    format!(".../{}", file_name)
}
