use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use crate::live::LiveModel;
use crate::progress::ProgressReporter;
use crate::sync::registry::SyncRegistry;
use crate::target::TargetScene;

/// Outcome of one [`SyncRegistry::synchronize`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Live elements reached by the scan.
    pub scanned: usize,
    /// Elements, lights and cameras left out because the host could not
    /// produce them.
    pub skipped: usize,
    /// Surviving nodes flagged modified after the scan.
    pub modified: usize,
    pub created: usize,
    pub destroyed: usize,
    /// Nodes whose target element was written.
    pub processed: usize,
    /// Registry size after the pass.
    pub node_count: usize,
    /// Live elements left out because their layer is hidden.
    pub hidden: usize,
    pub timings: PassTimings,
}

/// Wall-clock time spent in each phase of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassTimings {
    pub reset: Duration,
    pub scan: Duration,
    pub clean: Duration,
    pub process: Duration,
    pub total: Duration,
}

impl PassTimings {
    /// `(phase name, duration)` in execution order, total excluded.
    #[must_use]
    pub fn phases(&self) -> [(&'static str, Duration); 4] {
        [
            ("Reset", self.reset),
            ("Scan", self.scan),
            ("Clean", self.clean),
            ("Process", self.process),
        ]
    }
}

impl SyncReport {
    /// Nothing was created, destroyed or modified.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.modified == 0 && self.created == 0 && self.destroyed == 0
    }
}

/// Everything one pass works on.
///
/// Built by [`SyncRegistry::synchronize`] and consumed by [`run`](Self::run).
/// The phases live in their own modules (`scan`, `process`) as further
/// `impl` blocks on this type.
pub struct SyncContext<'a> {
    pub(crate) registry: &'a mut SyncRegistry,
    pub(crate) model: &'a dyn LiveModel,
    pub(crate) target: &'a mut dyn TargetScene,
    pub(crate) progress: &'a mut dyn ProgressReporter,
    pub(crate) report: SyncReport,
    /// Last ordinal handed to a record without a host element ordinal.
    pub(crate) ordinal: i32,
    /// Host layer visibility, queried once per layer per pass.
    pub(crate) hidden_layers: FxHashMap<u32, bool>,
}

impl<'a> SyncContext<'a> {
    pub(crate) fn new(
        registry: &'a mut SyncRegistry,
        model: &'a dyn LiveModel,
        target: &'a mut dyn TargetScene,
        progress: &'a mut dyn ProgressReporter,
    ) -> Self {
        Self {
            registry,
            model,
            target,
            progress,
            report: SyncReport::default(),
            ordinal: 0,
            hidden_layers: FxHashMap::default(),
        }
    }

    /// Reset, scan, clean, process. Phases never overlap.
    pub(crate) fn run(mut self) -> SyncReport {
        let start = Instant::now();
        let mut phase_start = start;
        let mut lap = || {
            let now = Instant::now();
            let elapsed = now - phase_start;
            phase_start = now;
            elapsed
        };

        self.reset();
        self.report.timings.reset = lap();
        self.scan();
        self.report.timings.scan = lap();
        self.clean();
        self.report.timings.clean = lap();

        self.report.modified = self.registry.nodes.values().filter(|n| n.is_modified()).count();
        log::debug!("{} nodes modified", self.report.modified);
        self.progress.report_modified(self.report.modified);

        self.process();
        self.report.timings.process = lap();
        self.report.timings.total = start.elapsed();

        self.report.created = self.registry.pass.created;
        self.report.destroyed = self.registry.pass.destroyed;
        self.report.node_count = self.registry.len();

        let stats = self.registry.stats();
        stats.add_scanned(self.report.scanned);
        stats.add_skipped(self.report.skipped);
        stats.add_modified(self.report.modified);

        debug_assert!(self.registry.is_consistent(), "sync tree inconsistent after pass");
        log::debug!(
            "Pass {}: {} scanned, {} skipped, {} created, {} destroyed, {} processed, {} nodes",
            self.registry.passes(),
            self.report.scanned,
            self.report.skipped,
            self.report.created,
            self.report.destroyed,
            self.report.processed,
            self.report.node_count
        );
        self.progress.report_timings(&self.report.timings);
        self.report
    }

    fn reset(&mut self) {
        self.ordinal = 0;
        self.hidden_layers.clear();
        self.registry.reset_pass();
    }

    /// Host visibility of `layer_index` for this pass.
    pub(crate) fn layer_hidden(&mut self, layer_index: u32) -> bool {
        let model = self.model;
        *self
            .hidden_layers
            .entry(layer_index)
            .or_insert_with(|| model.layer_hidden(layer_index))
    }

    /// Sweeps every node the scan did not reach.
    fn clean(&mut self) {
        self.progress.begin_phase("Cleaning", self.registry.len());
        let root = self.registry.root();
        self.registry.sweep(root, self.target);
        let detached = self.registry.sweep_detached(self.target);
        if detached > 0 {
            log::debug!("Clean: {detached} detached nodes destroyed");
        }
        self.progress.advance(self.registry.len());
        log::debug!("Clean: {} nodes destroyed", self.registry.pass.destroyed);
    }
}
