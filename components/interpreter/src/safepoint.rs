//! Cooperative pause points.
//!
//! The dispatch loop calls [`SafepointPoll::poll`] at every backward jump.
//! [`PauseGate`] is the standard implementation: while any
//! [`PauseGuard`] is alive, activations that reach a back-edge park until the
//! last guard is dropped.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Injected pause capability.
pub trait SafepointPoll: Send + Sync {
    /// May block until a pending pause is released
    fn poll(&self);
}

/// Safepoint that never pauses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSafepoint;

impl SafepointPoll for NoSafepoint {
    #[inline(always)]
    fn poll(&self) {}
}

#[derive(Debug, Default)]
struct GateState {
    /// Live pause guards
    pauses: usize,
    /// Activations currently blocked in `poll`
    parked: usize,
}

/// Pause gate shared by every activation that should stop together.
///
/// # Example
///
/// ```
/// use interpreter::{PauseGate, SafepointPoll};
///
/// let gate = PauseGate::new();
/// gate.poll(); // no pause pending: returns immediately
///
/// let guard = gate.request_pause();
/// assert!(gate.is_pause_requested());
/// drop(guard);
/// assert!(!gate.is_pause_requested());
/// ```
#[derive(Debug, Default)]
pub struct PauseGate {
    requested: AtomicBool,
    state: Mutex<GateState>,
    released: Condvar,
    arrived: Condvar,
}

impl PauseGate {
    /// Open gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every polling activation to park until the guard is dropped
    pub fn request_pause(&self) -> PauseGuard<'_> {
        let mut state = self.state.lock();
        state.pauses += 1;
        self.requested.store(true, Ordering::Release);
        log::debug!("pause requested ({} outstanding)", state.pauses);
        PauseGuard { gate: self }
    }

    /// Whether a pause is pending
    pub fn is_pause_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Number of activations currently parked
    pub fn parked(&self) -> usize {
        self.state.lock().parked
    }

    /// Block until at least `count` activations are parked.
    ///
    /// Returns false if `timeout` elapses first.
    pub fn wait_for_parked(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.parked < count {
            if self.arrived.wait_until(&mut state, deadline).timed_out() {
                return state.parked >= count;
            }
        }
        true
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.pauses -= 1;
        if state.pauses == 0 {
            self.requested.store(false, Ordering::Release);
            self.released.notify_all();
            log::debug!("pause released, waking {} activations", state.parked);
        }
    }
}

impl SafepointPoll for PauseGate {
    #[inline]
    fn poll(&self) {
        if !self.requested.load(Ordering::Acquire) {
            return;
        }
        let mut state = self.state.lock();
        if state.pauses == 0 {
            return;
        }
        state.parked += 1;
        self.arrived.notify_all();
        while state.pauses > 0 {
            self.released.wait(&mut state);
        }
        state.parked -= 1;
    }
}

/// Keeps a [`PauseGate`] closed while alive.
#[derive(Debug)]
#[must_use = "the pause ends when the guard is dropped"]
pub struct PauseGuard<'a> {
    gate: &'a PauseGate,
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
