//! Progress reporting for synchronization passes.

use crate::sync::PassTimings;

/// Receives phase and step notifications. Write-only from the engine's side.
pub trait ProgressReporter {
    fn begin_phase(&mut self, name: &str, total: usize);

    fn advance(&mut self, current: usize);

    /// Number of nodes flagged modified once the tree has been cleaned.
    fn report_modified(&mut self, _count: usize) {}

    /// Called once at the end of a pass.
    fn report_timings(&mut self, _timings: &PassTimings) {}
}

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn begin_phase(&mut self, _name: &str, _total: usize) {}

    fn advance(&mut self, _current: usize) {}
}

/// Forwards progress to the `log` facade.
///
/// Phases log at `info`; steps log at `trace`, every `step` items.
#[derive(Debug, Clone)]
pub struct LogProgress {
    phase: String,
    total: usize,
    step: usize,
}

impl LogProgress {
    #[must_use]
    pub fn new(step: usize) -> Self {
        Self {
            phase: String::new(),
            total: 0,
            step: step.max(1),
        }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ProgressReporter for LogProgress {
    fn begin_phase(&mut self, name: &str, total: usize) {
        self.phase.clear();
        self.phase.push_str(name);
        self.total = total;
        log::info!("{name} ({total})");
    }

    fn advance(&mut self, current: usize) {
        if current % self.step == 0 || current == self.total {
            log::trace!("{}: {current}/{}", self.phase, self.total);
        }
    }

    fn report_modified(&mut self, count: usize) {
        log::info!("{count} nodes modified");
    }

    fn report_timings(&mut self, timings: &PassTimings) {
        log::info!("Total - {:?}", timings.total);
        for (name, elapsed) in timings.phases() {
            log::info!("  {name} - {elapsed:?}");
        }
    }
}

/// Records every notification. Handy for asserting phase order.
#[derive(Debug, Default, Clone)]
pub struct RecordingProgress {
    pub phases: Vec<(String, usize)>,
    pub steps: usize,
    pub modified: Option<usize>,
    pub timings: Option<PassTimings>,
}

impl ProgressReporter for RecordingProgress {
    fn begin_phase(&mut self, name: &str, total: usize) {
        self.phases.push((name.to_string(), total));
    }

    fn advance(&mut self, _current: usize) {
        self.steps += 1;
    }

    fn report_modified(&mut self, count: usize) {
        self.modified = Some(count);
    }

    fn report_timings(&mut self, timings: &PassTimings) {
        self.timings = Some(*timings);
    }
}
