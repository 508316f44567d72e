//! Compiled loop entries
//!
//! A [`CompiledLoop`] runs the pre-decoded operations of a [`LoopCode`]
//! directly on the interpreter's frame, with the same slot layout and the
//! same slot clearing policy, so the frame is interpreter state at every
//! point it can hand control back.

use crate::baseline::{DecodedOp, LoopCode, Op};
use crate::code_cache::CodeCache;
use crate::deopt::{DeoptInfo, DeoptReason};
use core_types::{InterpreterPosition, PackedPosition, Value, VmResult};
use interpreter::{CompiledEntry, Frame, LoopKey, OsrExit, SafepointPoll, SlotClearing};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

enum Exit {
    Returned(Value),
    Deopt(DeoptReason, InterpreterPosition),
}

/// Compiled code for one loop.
pub struct CompiledLoop {
    key: LoopKey,
    code: Arc<LoopCode>,
    clearing: SlotClearing,
    safepoint: Arc<dyn SafepointPoll>,
    stress_after: Option<u32>,
    valid: AtomicBool,
    entries: AtomicU64,
    cache: Weak<CodeCache>,
}

impl CompiledLoop {
    /// Wrap translated code as the entry for loop `key`
    pub fn new(
        key: LoopKey,
        code: Arc<LoopCode>,
        clearing: SlotClearing,
        safepoint: Arc<dyn SafepointPoll>,
        cache: Weak<CodeCache>,
    ) -> Self {
        Self {
            key,
            code,
            clearing,
            safepoint,
            stress_after: None,
            valid: AtomicBool::new(true),
            entries: AtomicU64::new(0),
            cache,
        }
    }

    /// Bail out after `back_edges` of this entry's own back-edges
    pub fn with_stress_deopt(mut self, back_edges: Option<u32>) -> Self {
        self.stress_after = back_edges;
        self
    }

    /// Loop this entry was compiled for
    pub fn key(&self) -> LoopKey {
        self.key
    }

    /// The translated program
    pub fn code(&self) -> &Arc<LoopCode> {
        &self.code
    }

    /// Whether the code may still be entered
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Make running activations bail out at their next back-edge and
    /// refuse new entries
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    /// Times this entry was entered
    pub fn entries(&self) -> u64 {
        self.entries.load(Ordering::Relaxed)
    }

    fn run(&self, frame: &mut dyn Frame, mut pc: usize, mut sp: usize) -> VmResult<Exit> {
        let ops = self.code.ops();
        let locals = self.code.locals();
        let clear = self.clearing.clears();
        let mut back_edges = 0u32;

        loop {
            let DecodedOp { bci, op } = &ops[pc];
            match op {
                Op::Const(value) => {
                    frame.set_int(locals + sp, *value);
                    sp += 1;
                    pc += 1;
                }
                Op::LdLoc(local) => {
                    frame.copy(*local, locals + sp);
                    sp += 1;
                    pc += 1;
                }
                Op::StLoc(local) => {
                    sp -= 1;
                    let top = locals + sp;
                    frame.copy(top, *local);
                    if clear {
                        frame.clear(top);
                    }
                    pc += 1;
                }
                Op::LdConst(value) => {
                    frame.set_value(locals + sp, value.clone());
                    sp += 1;
                    pc += 1;
                }
                Op::Add | Op::Mod | Op::Less => {
                    let lhs = locals + sp - 2;
                    let a = frame.get_int(lhs)?;
                    let b = frame.get_int(lhs + 1)?;
                    match op {
                        Op::Add => frame.set_int(lhs, a.wrapping_add(b)),
                        Op::Less => frame.set_boolean(lhs, a < b),
                        _ => {
                            if b == 0 {
                                return Ok(Exit::Deopt(DeoptReason::DivisionByZero, position(*bci, sp)));
                            }
                            frame.set_int(lhs, a.wrapping_rem(b));
                        }
                    }
                    if clear {
                        frame.clear(lhs + 1);
                    }
                    sp -= 1;
                    pc += 1;
                }
                Op::Return => {
                    sp -= 1;
                    let top = locals + sp;
                    let value = frame.value(top);
                    if clear {
                        frame.clear(top);
                    }
                    return Ok(Exit::Returned(value));
                }
                Op::Jump { target, back_edge } => {
                    if *back_edge {
                        if let Some(exit) = self.back_edge(&mut back_edges, ops[*target].bci, sp) {
                            return Ok(exit);
                        }
                    }
                    pc = *target;
                }
                Op::JumpFalse { target, back_edge } => {
                    sp -= 1;
                    let top = locals + sp;
                    let condition = frame.get_boolean(top)?;
                    if clear {
                        frame.clear(top);
                    }
                    if condition {
                        pc += 1;
                        continue;
                    }
                    if *back_edge {
                        if let Some(exit) = self.back_edge(&mut back_edges, ops[*target].bci, sp) {
                            return Ok(exit);
                        }
                    }
                    pc = *target;
                }
            }
        }
    }

    #[inline]
    fn back_edge(&self, taken: &mut u32, target: usize, sp: usize) -> Option<Exit> {
        self.safepoint.poll();
        if !self.is_valid() {
            return Some(Exit::Deopt(DeoptReason::Invalidated, position(target, sp)));
        }
        *taken += 1;
        match self.stress_after {
            Some(limit) if *taken >= limit => {
                Some(Exit::Deopt(DeoptReason::Stress, position(target, sp)))
            }
            _ => None,
        }
    }
}

fn position(bci: usize, sp: usize) -> InterpreterPosition {
    InterpreterPosition::new(bci as u16, sp as u16)
}

impl CompiledEntry for CompiledLoop {
    fn enter(&self, frame: &mut dyn Frame, packed: PackedPosition) -> VmResult<OsrExit> {
        let at = packed.unpack();
        let (bci, sp) = (at.bci as usize, at.sp as usize);

        // Anything the translation did not plan for is left to the interpreter.
        let Some(pc) = self.code.entry(bci) else {
            return Ok(OsrExit::Deoptimized(packed));
        };
        if !self.is_valid()
            || self.code.depth(pc) != Some(sp)
            || frame.size() < self.code.locals() + self.code.max_stack()
        {
            return Ok(OsrExit::Deoptimized(packed));
        }

        self.entries.fetch_add(1, Ordering::Relaxed);
        match self.run(frame, pc, sp)? {
            Exit::Returned(value) => Ok(OsrExit::Returned(value)),
            Exit::Deopt(reason, resume) => {
                log::debug!(
                    "program {} loop @{}: deoptimized ({:?}) at bci {} sp {}",
                    self.key.0,
                    self.key.1,
                    reason,
                    resume.bci,
                    resume.sp
                );
                if reason != DeoptReason::Invalidated {
                    if let Some(cache) = self.cache.upgrade() {
                        cache.record_deopt(self.key, DeoptInfo::new(reason, resume));
                    }
                }
                Ok(OsrExit::Deoptimized(resume.pack()))
            }
        }
    }
}

impl fmt::Debug for CompiledLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledLoop")
            .field("key", &self.key)
            .field("ops", &self.code.ops().len())
            .field("clearing", &self.clearing)
            .field("stress_after", &self.stress_after)
            .field("valid", &self.is_valid())
            .field("entries", &self.entries())
            .finish()
    }
}
