//! Code cache for compiled loops
//!
//! Keyed by `(program id, loop header bci)`. A loop is either compiled,
//! waiting in the background queue, or disabled; loops the cache has never
//! heard of are absent.

use crate::compiled_code::CompiledLoop;
use crate::deopt::{DeoptInfo, Deoptimizer};
use bytecode_system::ProgramId;
use interpreter::LoopKey;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// What the cache knows about a loop.
#[derive(Debug, Clone)]
pub enum LoopState {
    /// Ready to enter
    Compiled(Arc<CompiledLoop>),
    /// A background compile is pending
    Queued,
    /// Compilation failed or the loop deoptimized too often
    Disabled,
}

/// Shared table of compiled loops.
#[derive(Debug)]
pub struct CodeCache {
    loops: RwLock<HashMap<LoopKey, LoopState>>,
    deopts: Mutex<HashMap<LoopKey, Deoptimizer>>,
    max_deopts: u32,
    installed: AtomicU64,
}

impl CodeCache {
    /// Empty cache disabling loops after `max_deopts_per_loop` bail-outs
    pub fn new(max_deopts_per_loop: u32) -> Self {
        Self {
            loops: RwLock::new(HashMap::new()),
            deopts: Mutex::new(HashMap::new()),
            max_deopts: max_deopts_per_loop.max(1),
            installed: AtomicU64::new(0),
        }
    }

    /// Current state of `key`
    pub fn lookup(&self, key: LoopKey) -> Option<LoopState> {
        self.loops.read().get(&key).cloned()
    }

    /// Compiled entry for `key`, if there is one
    pub fn compiled(&self, key: LoopKey) -> Option<Arc<CompiledLoop>> {
        match self.loops.read().get(&key) {
            Some(LoopState::Compiled(entry)) => Some(Arc::clone(entry)),
            _ => None,
        }
    }

    /// Mark an unknown loop as queued; `false` if the cache already knew it
    pub fn mark_queued(&self, key: LoopKey) -> bool {
        let mut loops = self.loops.write();
        if loops.contains_key(&key) {
            return false;
        }
        loops.insert(key, LoopState::Queued);
        true
    }

    /// Drop a queued marker whose request never made it to the worker
    pub fn forget_queued(&self, key: LoopKey) {
        let mut loops = self.loops.write();
        if matches!(loops.get(&key), Some(LoopState::Queued)) {
            loops.remove(&key);
        }
    }

    /// Install compiled code, replacing whatever was there
    pub fn install(&self, entry: Arc<CompiledLoop>) {
        let key = entry.key();
        log::info!("program {} loop @{}: compiled loop installed", key.0, key.1);
        self.loops.write().insert(key, LoopState::Compiled(entry));
        self.installed.fetch_add(1, Ordering::Relaxed);
    }

    /// Install compiled code only if the loop is still waiting for it
    pub fn install_if_queued(&self, entry: Arc<CompiledLoop>) -> bool {
        let key = entry.key();
        let mut loops = self.loops.write();
        if !matches!(loops.get(&key), Some(LoopState::Queued)) {
            return false;
        }
        log::info!("program {} loop @{}: compiled loop installed", key.0, key.1);
        loops.insert(key, LoopState::Compiled(entry));
        self.installed.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Never compile `key` again
    pub fn disable(&self, key: LoopKey) {
        if let Some(LoopState::Compiled(entry)) = self.loops.write().insert(key, LoopState::Disabled) {
            entry.invalidate();
        }
    }

    /// Record a bail-out; returns `true` if it disabled the loop
    pub fn record_deopt(&self, key: LoopKey, info: DeoptInfo) -> bool {
        let disable = {
            let mut deopts = self.deopts.lock();
            let history = deopts
                .entry(key)
                .or_insert_with(|| Deoptimizer::with_max_count(self.max_deopts));
            history.record(info);
            history.should_disable_optimization()
        };
        if disable {
            log::warn!(
                "program {} loop @{}: disabled after {} deoptimizations",
                key.0,
                key.1,
                self.max_deopts
            );
            self.disable(key);
        }
        disable
    }

    /// Bail-outs recorded for `key`
    pub fn deopt_count(&self, key: LoopKey) -> usize {
        self.deopts.lock().get(&key).map_or(0, Deoptimizer::deopt_count)
    }

    /// Forget every loop of `program`, invalidating its compiled code.
    ///
    /// Activations running that code bail out at their next back-edge.
    /// Returns the number of compiled loops invalidated.
    pub fn invalidate(&self, program: ProgramId) -> usize {
        let mut invalidated = 0;
        self.loops.write().retain(|key, state| {
            if key.0 != program {
                return true;
            }
            if let LoopState::Compiled(entry) = state {
                entry.invalidate();
                invalidated += 1;
            }
            false
        });
        self.deopts.lock().retain(|key, _| key.0 != program);
        if invalidated > 0 {
            log::debug!("program {}: invalidated {} compiled loops", program, invalidated);
        }
        invalidated
    }

    /// Loops currently holding compiled code
    pub fn compiled_count(&self) -> usize {
        self.loops
            .read()
            .values()
            .filter(|state| matches!(state, LoopState::Compiled(_)))
            .count()
    }

    /// Compiled loops installed over the cache's lifetime
    pub fn installed(&self) -> u64 {
        self.installed.load(Ordering::Relaxed)
    }
}

impl Default for CodeCache {
    fn default() -> Self {
        Self::new(10)
    }
}
