//! Synchronization Statistics
//!
//! Counters are atomic so a geometry stage running on worker threads can
//! share the same [`SyncStats`] through an `Arc` while the reconciliation
//! itself stays single-threaded.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Lifetime counters of one sync session.
#[derive(Debug, Default)]
pub struct SyncStats {
    elements_scanned: AtomicUsize,
    elements_skipped: AtomicUsize,
    nodes_modified: AtomicUsize,
    meshes_created: AtomicUsize,
    meshes_reused: AtomicUsize,
    bugs: AtomicUsize,
    bug_reports: Mutex<Vec<String>>,
}

/// Plain copy of the counters at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub elements_scanned: usize,
    pub elements_skipped: usize,
    pub nodes_modified: usize,
    pub meshes_created: usize,
    pub meshes_reused: usize,
    pub bugs: usize,
}

impl SyncStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_scanned(&self, n: usize) {
        self.elements_scanned.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_skipped(&self, n: usize) {
        self.elements_skipped.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_modified(&self, n: usize) {
        self.nodes_modified.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn mesh_created(&self) {
        self.meshes_created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn mesh_reused(&self) {
        self.meshes_reused.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a host inconsistency that did not stop the pass.
    pub fn report_bug(&self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.bugs.fetch_add(1, Ordering::Relaxed);
        self.bug_reports.lock().push(message);
    }

    #[must_use]
    pub fn bug_reports(&self) -> Vec<String> {
        self.bug_reports.lock().clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            elements_scanned: self.elements_scanned.load(Ordering::Relaxed),
            elements_skipped: self.elements_skipped.load(Ordering::Relaxed),
            nodes_modified: self.nodes_modified.load(Ordering::Relaxed),
            meshes_created: self.meshes_created.load(Ordering::Relaxed),
            meshes_reused: self.meshes_reused.load(Ordering::Relaxed),
            bugs: self.bugs.load(Ordering::Relaxed),
        }
    }
}
