//! On-stack replacement at loop back-edges.
//!
//! The dispatch loop hands every backward jump to an [`OsrController`],
//! which owns this activation's counters and does three things in order:
//!
//! 1. Tier-up accounting. With a compiled tier present, back-edges are
//!    counted in a [`LoopCounter`] and reported to the shared
//!    [`LoopProfile`] in lumps.
//! 2. A safepoint poll, which may park the activation.
//! 3. An OSR attempt once this activation has taken `osr_threshold`
//!    back-edges, or as soon as a report shows the loop has reached that
//!    many across all activations. The compiled tier is handed the frame
//!    and the packed `(bci, sp)` of the jump target and either finishes the
//!    activation or reports where the interpreter should pick up again.
//!
//! A missing or failing compiled entry never changes the program's result.

use crate::config::{SlotClearing, VmConfig};
use crate::frame::Frame;
use crate::profile::LoopProfile;
use crate::safepoint::{NoSafepoint, SafepointPoll};
use bytecode_system::{Program, ProgramId};
use core_types::{InterpreterPosition, PackedPosition, Value, VmResult};
use std::fmt;
use std::sync::Arc;

/// A loop the interpreter would like compiled.
#[derive(Clone, Copy)]
pub struct OsrRequest<'a> {
    /// The running program
    pub program: &'a Program,
    /// Loop header: target of the back-edge
    pub target: usize,
    /// Local slot count
    pub locals: u16,
    /// Total frame slots
    pub frame_size: usize,
    /// Slot clearing policy the compiled code must honor
    pub clearing: SlotClearing,
    /// Safepoint the compiled code must poll at its own back-edges
    pub safepoint: &'a Arc<dyn SafepointPoll>,
}

impl fmt::Debug for OsrRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OsrRequest")
            .field("program", &self.program.id())
            .field("target", &self.target)
            .field("locals", &self.locals)
            .field("frame_size", &self.frame_size)
            .field("clearing", &self.clearing)
            .finish()
    }
}

/// How a compiled entry gave control back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsrExit {
    /// The activation finished with this value
    Returned(Value),
    /// Compiled code bailed out; resume interpreting here
    Deoptimized(PackedPosition),
}

/// Compiled code for one loop, enterable at its header.
pub trait CompiledEntry: Send + Sync {
    /// Run from `position` on `frame`.
    ///
    /// The frame holds exactly the interpreter's state at the back-edge and
    /// must hold it again, for the returned position, on deoptimization.
    fn enter(&self, frame: &mut dyn Frame, position: PackedPosition) -> VmResult<OsrExit>;
}

/// The compiled tier as seen from the interpreter.
pub trait OsrCompiler: Send + Sync {
    /// Compiled entry for the loop, or `None` if not available (yet)
    fn compile_loop(&self, request: &OsrRequest<'_>) -> Option<Arc<dyn CompiledEntry>>;

    /// Release everything held for `program`
    fn forget(&self, _program: ProgramId) {}
}

/// Process-wide tiering state shared by all activations.
pub struct TierRuntime {
    tiering: bool,
    report_threshold: u32,
    osr_threshold: u32,
    clearing: SlotClearing,
    safepoint: Arc<dyn SafepointPoll>,
    compiler: Option<Arc<dyn OsrCompiler>>,
    profile: Arc<LoopProfile>,
}

impl TierRuntime {
    /// Runtime with no compiled tier and a no-op safepoint
    pub fn new(config: &VmConfig) -> Self {
        Self {
            tiering: config.tiering,
            report_threshold: config.loop_report_threshold.max(1),
            osr_threshold: config.osr_threshold.max(1),
            clearing: config.slot_clearing,
            safepoint: Arc::new(NoSafepoint),
            compiler: None,
            profile: Arc::new(LoopProfile::new()),
        }
    }

    /// Attach a compiled tier
    pub fn with_compiler(mut self, compiler: Arc<dyn OsrCompiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// Attach a safepoint
    pub fn with_safepoint(mut self, safepoint: Arc<dyn SafepointPoll>) -> Self {
        self.safepoint = safepoint;
        self
    }

    /// Report into an existing profile
    pub fn with_profile(mut self, profile: Arc<LoopProfile>) -> Self {
        self.profile = profile;
        self
    }

    /// The compiled tier, if tiering is on and one is attached
    pub fn next_tier(&self) -> Option<&Arc<dyn OsrCompiler>> {
        self.compiler.as_ref().filter(|_| self.tiering)
    }

    /// Shared loop profile
    pub fn profile(&self) -> &Arc<LoopProfile> {
        &self.profile
    }

    /// Slot clearing policy
    pub fn clearing(&self) -> SlotClearing {
        self.clearing
    }

    /// Drop the profile entries and compiled loops of `program`
    pub fn forget(&self, program: ProgramId) {
        let loops = self.profile.forget(program);
        if let Some(compiler) = &self.compiler {
            compiler.forget(program);
        }
        log::debug!("program {}: forgotten ({} profiled loops)", program, loops);
    }
}

impl fmt::Debug for TierRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TierRuntime")
            .field("tiering", &self.tiering)
            .field("report_threshold", &self.report_threshold)
            .field("osr_threshold", &self.osr_threshold)
            .field("clearing", &self.clearing)
            .field("has_compiler", &self.compiler.is_some())
            .finish()
    }
}

/// Per-activation back-edge counter with lump-sum reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopCounter {
    count: u32,
    threshold: u32,
}

impl LoopCounter {
    /// Counter that reports every `threshold` back-edges
    pub fn new(threshold: u32) -> Self {
        Self {
            count: 0,
            threshold: threshold.max(1),
        }
    }

    /// Count one back-edge; returns the lump to report when the threshold
    /// is reached, resetting the counter
    #[inline]
    pub fn tick(&mut self) -> Option<u32> {
        self.count += 1;
        if self.count >= self.threshold {
            let lump = self.count;
            self.count = 0;
            Some(lump)
        } else {
            None
        }
    }

    /// Back-edges since the last report
    pub fn pending(&self) -> u32 {
        self.count
    }
}

/// Outcome of a back-edge check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackEdge {
    /// Take the jump and keep interpreting
    Continue,
    /// Compiled code finished the activation
    Return(Value),
    /// Compiled code deoptimized; continue from here instead
    Resume(InterpreterPosition),
}

/// Back-edge handling for one activation.
#[derive(Debug)]
pub struct OsrController {
    runtime: Arc<TierRuntime>,
    loop_counter: LoopCounter,
    osr_back_edges: u32,
    osr_entries: u32,
    deopts: u32,
}

impl OsrController {
    /// Fresh counters for a new activation
    pub fn new(runtime: Arc<TierRuntime>) -> Self {
        let loop_counter = LoopCounter::new(runtime.report_threshold);
        Self {
            runtime,
            loop_counter,
            osr_back_edges: 0,
            osr_entries: 0,
            deopts: 0,
        }
    }

    /// Slot clearing policy for this activation
    pub fn clearing(&self) -> SlotClearing {
        self.runtime.clearing
    }

    /// Times compiled code was entered
    pub fn osr_entries(&self) -> u32 {
        self.osr_entries
    }

    /// Times compiled code handed control back mid-loop
    pub fn deopts(&self) -> u32 {
        self.deopts
    }

    /// Handle a backward jump to `target` with `sp` live stack slots.
    pub fn back_edge(
        &mut self,
        program: &Program,
        frame: &mut dyn Frame,
        target: usize,
        sp: usize,
    ) -> VmResult<BackEdge> {
        let runtime = &*self.runtime;
        let next_tier = runtime.next_tier();

        let mut hot = false;
        if next_tier.is_some() {
            if let Some(lump) = self.loop_counter.tick() {
                log::debug!(
                    "program {} loop @{}: reporting {} back-edges",
                    program.id(),
                    target,
                    lump
                );
                runtime.profile.report(program.id(), target, lump);
                hot = runtime.profile.should_compile(
                    program.id(),
                    target,
                    u64::from(runtime.osr_threshold),
                );
            }
        }

        runtime.safepoint.poll();

        let Some(compiler) = next_tier else {
            return Ok(BackEdge::Continue);
        };
        self.osr_back_edges += 1;
        if self.osr_back_edges < runtime.osr_threshold && !hot {
            return Ok(BackEdge::Continue);
        }
        self.osr_back_edges = 0;

        let position = InterpreterPosition::from_offsets(target, sp)?.pack();
        let request = OsrRequest {
            program,
            target,
            locals: program.locals(),
            frame_size: frame.size(),
            clearing: runtime.clearing,
            safepoint: &runtime.safepoint,
        };
        let Some(entry) = compiler.compile_loop(&request) else {
            log::trace!("program {} loop @{}: no compiled entry", program.id(), target);
            return Ok(BackEdge::Continue);
        };

        log::debug!(
            "program {} loop @{}: entering compiled code (sp {})",
            program.id(),
            target,
            sp
        );
        self.osr_entries += 1;
        match entry.enter(frame, position)? {
            OsrExit::Returned(value) => Ok(BackEdge::Return(value)),
            OsrExit::Deoptimized(packed) => {
                let resume = packed.unpack();
                self.deopts += 1;
                log::debug!(
                    "program {} loop @{}: resuming interpreter at bci {} sp {}",
                    program.id(),
                    target,
                    resume.bci,
                    resume.sp
                );
                Ok(BackEdge::Resume(resume))
            }
        }
    }
}
