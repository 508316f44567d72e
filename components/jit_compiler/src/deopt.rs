//! Deoptimization history
//!
//! Compiled loops hand control back to the interpreter by returning the
//! packed `(bci, sp)` they stopped at. Each such exit is recorded here per
//! loop; a loop that keeps bailing out is not worth re-entering.

use core_types::InterpreterPosition;

/// Reason for deoptimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeoptReason {
    /// `MOD` by zero; the interpreter raises the error
    DivisionByZero,
    /// The code was invalidated while running
    Invalidated,
    /// Forced bail-out from the stress knob
    Stress,
}

/// Information about a deoptimization event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeoptInfo {
    /// Reason for deoptimization
    pub reason: DeoptReason,
    /// Where the interpreter resumes
    pub resume: InterpreterPosition,
}

impl DeoptInfo {
    /// Create new deopt info
    pub fn new(reason: DeoptReason, resume: InterpreterPosition) -> Self {
        Self { reason, resume }
    }
}

/// Deoptimization history for one loop.
#[derive(Debug, Clone)]
pub struct Deoptimizer {
    /// History of deoptimizations
    deopt_history: Vec<DeoptInfo>,
    /// Maximum number of deoptimizations before disabling optimization
    max_deopt_count: u32,
}

impl Deoptimizer {
    /// Create a new deoptimizer
    pub fn new() -> Self {
        Self::with_max_count(10)
    }

    /// Create deoptimizer with custom max deopt count
    pub fn with_max_count(max_count: u32) -> Self {
        Self {
            deopt_history: Vec::new(),
            max_deopt_count: max_count,
        }
    }

    /// Record a bail-out
    pub fn record(&mut self, info: DeoptInfo) {
        self.deopt_history.push(info);
    }

    /// Check if too many deoptimizations have occurred
    pub fn should_disable_optimization(&self) -> bool {
        self.deopt_history.len() as u32 >= self.max_deopt_count
    }

    /// Get the deoptimization count
    pub fn deopt_count(&self) -> usize {
        self.deopt_history.len()
    }

    /// Get deoptimization history
    pub fn history(&self) -> &[DeoptInfo] {
        &self.deopt_history
    }

    /// Clear deoptimization history
    pub fn clear_history(&mut self) {
        self.deopt_history.clear();
    }

    /// Check if a specific reason has caused frequent deopts
    pub fn is_frequent_deopt_reason(&self, reason: DeoptReason) -> bool {
        let count = self
            .deopt_history
            .iter()
            .filter(|info| info.reason == reason)
            .count();
        count >= 3
    }
}

impl Default for Deoptimizer {
    fn default() -> Self {
        Self::new()
    }
}
