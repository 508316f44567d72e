//! Loop profiling for tier-up decisions
//!
//! The dispatch loop does not report every back-edge. It counts locally and
//! reports lump sums (see [`crate::osr::LoopCounter`]), which accumulate
//! here per `(program, loop header)`.

use bytecode_system::ProgramId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a loop by its program and header bci
pub type LoopKey = (ProgramId, usize);

/// Shared back-edge counts, updated by lump-sum reports.
#[derive(Debug, Default)]
pub struct LoopProfile {
    loops: Mutex<HashMap<LoopKey, u64>>,
    reports: AtomicU64,
    back_edges: AtomicU64,
}

impl LoopProfile {
    /// Create an empty profile
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` back-edges to the loop headed at `bci`
    pub fn report(&self, program: ProgramId, bci: usize, count: u32) {
        let count = u64::from(count);
        *self.loops.lock().entry((program, bci)).or_default() += count;
        self.reports.fetch_add(1, Ordering::Relaxed);
        self.back_edges.fetch_add(count, Ordering::Relaxed);
    }

    /// Back-edges reported for one loop
    pub fn count(&self, program: ProgramId, bci: usize) -> u64 {
        self.loops
            .lock()
            .get(&(program, bci))
            .copied()
            .unwrap_or(0)
    }

    /// Whether the loop has accumulated at least `threshold` back-edges
    pub fn should_compile(&self, program: ProgramId, bci: usize, threshold: u64) -> bool {
        self.count(program, bci) >= threshold
    }

    /// Number of reports received
    pub fn reports(&self) -> u64 {
        self.reports.load(Ordering::Relaxed)
    }

    /// Sum of all reported back-edges
    pub fn total_back_edges(&self) -> u64 {
        self.back_edges.load(Ordering::Relaxed)
    }

    /// The `n` loops with the highest counts, hottest first
    pub fn hottest(&self, n: usize) -> Vec<(LoopKey, u64)> {
        let mut loops: Vec<_> = self.loops.lock().iter().map(|(k, v)| (*k, *v)).collect();
        loops.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        loops.truncate(n);
        loops
    }

    /// Drop every loop of `program`; returns how many were dropped.
    ///
    /// The running totals are kept.
    pub fn forget(&self, program: ProgramId) -> usize {
        let mut loops = self.loops.lock();
        let before = loops.len();
        loops.retain(|key, _| key.0 != program);
        before - loops.len()
    }

    /// Loops with at least one report
    pub fn len(&self) -> usize {
        self.loops.lock().len()
    }

    /// Whether no loop has been reported
    pub fn is_empty(&self) -> bool {
        self.loops.lock().is_empty()
    }

    /// Forget everything
    pub fn clear(&self) {
        self.loops.lock().clear();
        self.reports.store(0, Ordering::Relaxed);
        self.back_edges.store(0, Ordering::Relaxed);
    }
}
