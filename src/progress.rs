//! Progress tracking module for batch runs.
//!
//! Run counters, the observer hook the engine reports through, and the
//! terminal rendering helpers used by the CLI.

use serde::{Deserialize, Serialize};

use crate::batch::{ImageStatus, RunKind, RunSummary};

/// Counters for the most recent whole-batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunProgress {
    /// Images finished so far (success or failure)
    pub processed: usize,
    /// Images in the run's working set
    pub total: usize,
}

impl RunProgress {
    /// Create counters for a run of `total` images
    pub fn new(total: usize) -> Self {
        Self {
            processed: 0,
            total,
        }
    }

    /// Calculate completion percentage
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            100
        } else {
            ((self.processed as f32 / self.total as f32) * 100.0) as u8
        }
    }

    /// Check if every image in the run is finished
    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

/// Observer for engine activity
///
/// Callbacks run on the engine's task between state transitions, so they
/// must return quickly. All methods default to no-ops.
pub trait ProgressCallback: Send + Sync {
    /// A whole-batch run claimed the engine
    fn on_run_start(&self, _kind: RunKind, _total: usize) {}

    /// An image entered processing (`index` is 0-based within the run)
    fn on_image_start(&self, _name: &str, _index: usize, _total: usize) {}

    /// An image reached its final state for this run
    fn on_image_complete(&self, _name: &str, _status: &ImageStatus, _progress: RunProgress) {}

    /// A whole-batch run finished and released the engine
    fn on_run_complete(&self, _summary: &RunSummary) {}
}

/// Callback that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressCallback for NoopProgress {}

/// Output verbosity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// No output
    Quiet,
    /// Normal output (progress bar and summary)
    #[default]
    Normal,
    /// Verbose output (one line per image)
    Verbose,
    /// Very verbose (debug logging)
    VeryVerbose,
}

impl OutputMode {
    /// Create OutputMode from verbosity level
    pub fn from_verbosity(level: u8) -> Self {
        match level {
            0 => OutputMode::Normal,
            1 => OutputMode::Verbose,
            _ => OutputMode::VeryVerbose,
        }
    }

    /// Check if output should be shown at this mode
    pub fn should_show(&self, required: OutputMode) -> bool {
        use OutputMode::*;
        match (self, required) {
            (Quiet, _) => false,
            (Normal, Quiet | Normal) => true,
            (Verbose, Quiet | Normal | Verbose) => true,
            (VeryVerbose, _) => true,
            _ => false,
        }
    }
}

/// Progress bar width in characters
const PROGRESS_BAR_WIDTH: usize = 40;

/// Build a progress bar string
pub fn build_progress_bar(percent: u8) -> String {
    let percent = percent.min(100);
    let filled = (percent as usize * PROGRESS_BAR_WIDTH) / 100;
    let empty = PROGRESS_BAR_WIDTH - filled;
    format!("[{}{}]", "=".repeat(filled), "-".repeat(empty))
}

/// Render `processed / total` with a bar, e.g. for non-interactive output
pub fn format_progress(progress: &RunProgress) -> String {
    format!(
        "{} {:3}% ({}/{})",
        build_progress_bar(progress.percent()),
        progress.percent(),
        progress.processed,
        progress.total
    )
}

/// Print final summary
pub fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", "=".repeat(80));
    println!("Run Summary ({})", summary.kind);
    println!("{}", "=".repeat(80));
    println!("  Images:     {}", summary.total);
    println!("  Succeeded:  {}", summary.succeeded);
    println!("  Failed:     {}", summary.failed);
    println!("  Time:       {:.2}s", summary.elapsed_secs());
    println!("{}", "=".repeat(80));
    println!();
}
