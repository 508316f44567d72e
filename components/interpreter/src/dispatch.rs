//! Dispatch loop for bytecode execution
//!
//! One exhaustive `match` over [`Opcode`] per instruction. Operand widths
//! are fixed per opcode, so every handler knows statically where its
//! operands and the next instruction are. Superinstructions run the same
//! per-opcode handlers their components would, in order, including the
//! back-edge check when the last component is a backward jump.
//!
//! Stack entry `i` lives in frame slot `locals + i`; `sp` counts live
//! entries. What happens to a popped slot is decided by the
//! [`SlotClearing`](crate::SlotClearing) policy.

use crate::frame::Frame;
use crate::osr::{BackEdge, OsrController};
use bytecode_system::{decode_const, Opcode, Program};
use core_types::{IntegrityViolation, InterpreterPosition, Value, VmResult};

const CONST: usize = Opcode::Const.width();
const LD_LOC: usize = Opcode::LdLoc.width();
const ST_LOC: usize = Opcode::StLoc.width();
const MOD: usize = Opcode::Mod.width();
const LESS: usize = Opcode::Less.width();

/// Result of executing a single instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Execution continues at this position
    Next(InterpreterPosition),
    /// The activation returned
    Returned(Value),
}

enum Flow {
    Continue { bci: usize, sp: usize },
    Return(Value),
}

/// Run `program` from its first instruction with an empty operand stack.
pub fn execute<F: Frame>(program: &Program, frame: &mut F, osr: &mut OsrController) -> VmResult<Value> {
    execute_at(program, frame, InterpreterPosition::START, osr)
}

/// Run `program` from `start`, e.g. after a compiled loop bailed out.
pub fn execute_at<F: Frame>(
    program: &Program,
    frame: &mut F,
    start: InterpreterPosition,
    osr: &mut OsrController,
) -> VmResult<Value> {
    let machine = Machine::new(program, frame, osr)?;
    let (mut bci, mut sp) = machine.checked_position(start)?;
    loop {
        match machine.exec(frame, osr, bci, sp)? {
            Flow::Continue { bci: next, sp: depth } => {
                bci = next;
                sp = depth;
            }
            Flow::Return(value) => return Ok(value),
        }
    }
}

/// Execute exactly one instruction at `at`.
///
/// A superinstruction counts as one instruction.
pub fn step<F: Frame>(
    program: &Program,
    frame: &mut F,
    at: InterpreterPosition,
    osr: &mut OsrController,
) -> VmResult<Step> {
    let machine = Machine::new(program, frame, osr)?;
    let (bci, sp) = machine.checked_position(at)?;
    Ok(match machine.exec(frame, osr, bci, sp)? {
        Flow::Continue { bci, sp } => Step::Next(InterpreterPosition::from_offsets(bci, sp)?),
        Flow::Return(value) => Step::Returned(value),
    })
}

struct Machine<'p> {
    program: &'p Program,
    code: &'p [u16],
    constants: &'p [Option<Value>],
    locals: usize,
    capacity: usize,
    clear_on_pop: bool,
}

impl<'p> Machine<'p> {
    fn new<F: Frame>(
        program: &'p Program,
        frame: &F,
        osr: &OsrController,
    ) -> Result<Self, IntegrityViolation> {
        let locals = program.locals() as usize;
        if frame.size() < locals {
            return Err(IntegrityViolation::SlotOutOfRange {
                bci: 0,
                index: locals - 1,
            });
        }
        Ok(Self {
            program,
            code: program.code(),
            constants: program.constants(),
            locals,
            capacity: frame.size(),
            clear_on_pop: osr.clearing().clears(),
        })
    }

    fn checked_position(&self, pos: InterpreterPosition) -> Result<(usize, usize), IntegrityViolation> {
        let (bci, sp) = (pos.bci as usize, pos.sp as usize);
        if self.locals + sp > self.capacity {
            return Err(IntegrityViolation::StackOverflow { bci });
        }
        Ok((bci, sp))
    }

    #[inline(always)]
    fn fetch(&self, bci: usize) -> Result<Opcode, IntegrityViolation> {
        let word = *self
            .code
            .get(bci)
            .ok_or(IntegrityViolation::TruncatedInstruction { bci })?;
        let op = Opcode::decode(word).ok_or(IntegrityViolation::UnknownOpcode { bci, word })?;
        if bci + op.width() > self.code.len() {
            return Err(IntegrityViolation::TruncatedInstruction { bci });
        }
        Ok(op)
    }

    #[inline(always)]
    fn exec<F: Frame>(
        &self,
        f: &mut F,
        osr: &mut OsrController,
        bci: usize,
        mut sp: usize,
    ) -> VmResult<Flow> {
        let sp = &mut sp;
        let next = match self.fetch(bci)? {
            Opcode::Const => {
                self.konst(f, bci, sp)?;
                bci + CONST
            }
            Opcode::Add => {
                self.add(f, bci, sp)?;
                bci + 1
            }
            Opcode::Mod => {
                self.modulo(f, bci, sp)?;
                bci + MOD
            }
            Opcode::Less => {
                self.less(f, bci, sp)?;
                bci + LESS
            }
            Opcode::LdLoc => {
                self.ld_loc(f, bci, sp)?;
                bci + LD_LOC
            }
            Opcode::StLoc => {
                self.st_loc(f, bci, sp)?;
                bci + ST_LOC
            }
            Opcode::LdConst => {
                self.ld_const(f, bci, sp)?;
                bci + Opcode::LdConst.width()
            }
            Opcode::Jump => return self.jump(f, osr, bci, *sp),
            Opcode::JumpFalse => return self.jump_false(f, osr, bci, *sp),
            Opcode::Return => return self.ret(f, bci, *sp).map(Flow::Return),

            Opcode::SiLdConstModSt => {
                self.ld_loc(f, bci, sp)?;
                self.konst(f, bci + LD_LOC, sp)?;
                self.modulo(f, bci + LD_LOC + CONST, sp)?;
                self.st_loc(f, bci + LD_LOC + CONST + MOD, sp)?;
                bci + LD_LOC + CONST + MOD + ST_LOC
            }
            Opcode::SiLdLdModSt => {
                self.ld_loc(f, bci, sp)?;
                self.ld_loc(f, bci + LD_LOC, sp)?;
                self.modulo(f, bci + 2 * LD_LOC, sp)?;
                self.st_loc(f, bci + 2 * LD_LOC + MOD, sp)?;
                bci + 2 * LD_LOC + MOD + ST_LOC
            }
            Opcode::SiLdSt => {
                self.ld_loc(f, bci, sp)?;
                self.st_loc(f, bci + LD_LOC, sp)?;
                bci + LD_LOC + ST_LOC
            }
            Opcode::SiLdStJump => {
                self.ld_loc(f, bci, sp)?;
                self.st_loc(f, bci + LD_LOC, sp)?;
                return self.jump(f, osr, bci + LD_LOC + ST_LOC, *sp);
            }
            Opcode::SiConstLdLessJf => {
                self.konst(f, bci, sp)?;
                self.ld_loc(f, bci + CONST, sp)?;
                self.less(f, bci + CONST + LD_LOC, sp)?;
                return self.jump_false(f, osr, bci + CONST + LD_LOC + LESS, *sp);
            }
            Opcode::SiLdConstLessJf => {
                self.ld_loc(f, bci, sp)?;
                self.konst(f, bci + LD_LOC, sp)?;
                self.less(f, bci + LD_LOC + CONST, sp)?;
                return self.jump_false(f, osr, bci + LD_LOC + CONST + LESS, *sp);
            }
        };
        Ok(Flow::Continue { bci: next, sp: *sp })
    }

    // Slot of a new top-of-stack entry.
    #[inline(always)]
    fn push_slot(&self, at: usize, sp: usize) -> Result<usize, IntegrityViolation> {
        let slot = self.locals + sp;
        if slot < self.capacity {
            Ok(slot)
        } else {
            Err(IntegrityViolation::StackOverflow { bci: at })
        }
    }

    // Slot of the `depth`-th entry from the top (1 = top).
    #[inline(always)]
    fn stack_slot(&self, at: usize, sp: usize, depth: usize) -> Result<usize, IntegrityViolation> {
        if sp >= depth {
            Ok(self.locals + sp - depth)
        } else {
            Err(IntegrityViolation::StackUnderflow { bci: at })
        }
    }

    #[inline(always)]
    fn local(&self, at: usize) -> Result<usize, IntegrityViolation> {
        let index = self.code[at + 1] as usize;
        if index < self.locals {
            Ok(index)
        } else {
            Err(IntegrityViolation::SlotOutOfRange { bci: at, index })
        }
    }

    #[inline(always)]
    fn vacate<F: Frame>(&self, f: &mut F, slot: usize) {
        if self.clear_on_pop {
            f.clear(slot);
        }
    }

    #[inline(always)]
    fn konst<F: Frame>(&self, f: &mut F, at: usize, sp: &mut usize) -> VmResult<()> {
        let slot = self.push_slot(at, *sp)?;
        f.set_int(slot, decode_const(self.code[at + 1], self.code[at + 2]));
        *sp += 1;
        Ok(())
    }

    #[inline(always)]
    fn ld_loc<F: Frame>(&self, f: &mut F, at: usize, sp: &mut usize) -> VmResult<()> {
        let local = self.local(at)?;
        let slot = self.push_slot(at, *sp)?;
        f.copy(local, slot);
        *sp += 1;
        Ok(())
    }

    #[inline(always)]
    fn st_loc<F: Frame>(&self, f: &mut F, at: usize, sp: &mut usize) -> VmResult<()> {
        let local = self.local(at)?;
        let top = self.stack_slot(at, *sp, 1)?;
        f.copy(top, local);
        self.vacate(f, top);
        *sp -= 1;
        Ok(())
    }

    fn ld_const<F: Frame>(&self, f: &mut F, at: usize, sp: &mut usize) -> VmResult<()> {
        let index = self.code[at + 1] as usize;
        let value = self
            .constants
            .get(index)
            .and_then(Option::as_ref)
            .ok_or(IntegrityViolation::SlotOutOfRange { bci: at, index })?;
        let slot = self.push_slot(at, *sp)?;
        f.set_value(slot, value.clone());
        *sp += 1;
        Ok(())
    }

    #[inline(always)]
    fn int_operands<F: Frame>(&self, f: &F, at: usize, sp: usize) -> VmResult<(usize, i32, i32)> {
        let lhs = self.stack_slot(at, sp, 2)?;
        let a = f.get_int(lhs)?;
        let b = f.get_int(lhs + 1)?;
        Ok((lhs, a, b))
    }

    #[inline(always)]
    fn add<F: Frame>(&self, f: &mut F, at: usize, sp: &mut usize) -> VmResult<()> {
        let (lhs, a, b) = self.int_operands(f, at, *sp)?;
        f.set_int(lhs, a.wrapping_add(b));
        self.vacate(f, lhs + 1);
        *sp -= 1;
        Ok(())
    }

    #[inline(always)]
    fn modulo<F: Frame>(&self, f: &mut F, at: usize, sp: &mut usize) -> VmResult<()> {
        let (lhs, a, b) = self.int_operands(f, at, *sp)?;
        if b == 0 {
            return Err(IntegrityViolation::DivisionByZero { bci: at }.into());
        }
        f.set_int(lhs, a.wrapping_rem(b));
        self.vacate(f, lhs + 1);
        *sp -= 1;
        Ok(())
    }

    #[inline(always)]
    fn less<F: Frame>(&self, f: &mut F, at: usize, sp: &mut usize) -> VmResult<()> {
        let (lhs, a, b) = self.int_operands(f, at, *sp)?;
        f.set_boolean(lhs, a < b);
        self.vacate(f, lhs + 1);
        *sp -= 1;
        Ok(())
    }

    fn ret<F: Frame>(&self, f: &mut F, at: usize, sp: usize) -> VmResult<Value> {
        let top = self.stack_slot(at, sp, 1)?;
        let value = f.value(top);
        self.vacate(f, top);
        Ok(value)
    }

    #[inline(always)]
    fn jump<F: Frame>(
        &self,
        f: &mut F,
        osr: &mut OsrController,
        at: usize,
        sp: usize,
    ) -> VmResult<Flow> {
        let target = self.code[at + 1] as usize;
        if target > at {
            return Ok(Flow::Continue { bci: target, sp });
        }
        match osr.back_edge(self.program, f, target, sp)? {
            BackEdge::Continue => Ok(Flow::Continue { bci: target, sp }),
            BackEdge::Return(value) => Ok(Flow::Return(value)),
            BackEdge::Resume(pos) => {
                let (bci, sp) = self.checked_position(pos)?;
                Ok(Flow::Continue { bci, sp })
            }
        }
    }

    #[inline(always)]
    fn jump_false<F: Frame>(
        &self,
        f: &mut F,
        osr: &mut OsrController,
        at: usize,
        mut sp: usize,
    ) -> VmResult<Flow> {
        let top = self.stack_slot(at, sp, 1)?;
        let condition = f.get_boolean(top)?;
        self.vacate(f, top);
        sp -= 1;
        if condition {
            Ok(Flow::Continue {
                bci: at + Opcode::JumpFalse.width(),
                sp,
            })
        } else {
            self.jump(f, osr, at, sp)
        }
    }
}
