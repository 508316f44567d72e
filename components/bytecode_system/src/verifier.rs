//! Static checks run when a program is built.
//!
//! Walks every reachable instruction with a worklist, tracking the operand
//! stack depth on entry to each instruction. Depths must agree wherever
//! control-flow paths join.

use crate::instruction::Instruction;
use crate::opcode::Opcode;
use core_types::IntegrityViolation;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Reasons a program is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// The program has no instructions
    #[error("empty program")]
    Empty,
    /// The program does not fit 16-bit offsets
    #[error("program of {0} words exceeds the 16-bit offset range")]
    TooLong(usize),
    /// Malformed instruction encoding
    #[error(transparent)]
    Decode(#[from] IntegrityViolation),
    /// Jump into the middle of an instruction or past the end
    #[error("jump at bci {bci} targets {target}, which is not an instruction boundary")]
    BadJumpTarget {
        /// Jump offset
        bci: usize,
        /// Encoded target
        target: usize,
    },
    /// Local slot index out of range
    #[error("local slot {slot} out of range at bci {bci} ({locals} locals)")]
    LocalOutOfRange {
        /// Instruction offset
        bci: usize,
        /// Slot operand
        slot: usize,
        /// Declared locals
        locals: u16,
    },
    /// Constant index out of range
    #[error("constant {index} out of range at bci {bci} ({len} constants)")]
    ConstantOutOfRange {
        /// Instruction offset
        bci: usize,
        /// Index operand
        index: usize,
        /// Constant table length
        len: usize,
    },
    /// An instruction pops more than the stack holds
    #[error("operand stack underflow at bci {bci}")]
    StackUnderflow {
        /// Instruction offset
        bci: usize,
    },
    /// Two paths reach an instruction with different stack depths
    #[error("inconsistent stack depth at bci {bci}: {expected} vs {found}")]
    InconsistentStack {
        /// Instruction offset
        bci: usize,
        /// Depth recorded first
        expected: usize,
        /// Depth on the new path
        found: usize,
    },
    /// Control falls off the end of the program
    #[error("control falls off the end after bci {bci}")]
    FallsOffEnd {
        /// Offset of the last instruction
        bci: usize,
    },
    /// Operand stack exceeds the 16-bit depth range
    #[error("operand stack too deep at bci {bci}")]
    StackTooDeep {
        /// Instruction offset
        bci: usize,
    },
    /// A forward-referenced label was never bound
    #[error("label {0} was never bound")]
    UnboundLabel(usize),
    /// A pooled constant's index does not fit a 16-bit operand
    #[error("constant index {index} exceeds the 16-bit operand range")]
    ConstantIndexTooLarge {
        /// Index assigned by the pool
        index: usize,
    },
}

/// Verify `code` and return the maximum operand-stack depth.
pub fn verify(code: &[u16], locals: u16, constants: usize) -> Result<u16, VerifyError> {
    if code.is_empty() {
        return Err(VerifyError::Empty);
    }
    if code.len() > u16::MAX as usize {
        return Err(VerifyError::TooLong(code.len()));
    }

    let boundaries = boundaries(code)?;
    let mut depth_at: HashMap<usize, usize> = HashMap::new();
    let mut worklist = vec![(0usize, 0usize)];
    let mut max_depth = 0usize;

    while let Some((bci, depth)) = worklist.pop() {
        match depth_at.get(&bci) {
            Some(&seen) if seen == depth => continue,
            Some(&seen) => {
                return Err(VerifyError::InconsistentStack {
                    bci,
                    expected: seen,
                    found: depth,
                })
            }
            None => {
                depth_at.insert(bci, depth);
            }
        }

        let inst = Instruction::decode(code, bci)?;
        let mut d = depth;
        for (at, op) in inst.parts() {
            check_operands(code, at, op, locals, constants)?;
            let (pops, pushes) = op.stack_effect();
            d = d
                .checked_sub(pops)
                .ok_or(VerifyError::StackUnderflow { bci: at })?;
            d += pushes;
            max_depth = max_depth.max(d);
        }
        if max_depth > u16::MAX as usize {
            return Err(VerifyError::StackTooDeep { bci });
        }

        if let Some(target) = inst.jump_target(code) {
            if !boundaries.contains(&target) {
                return Err(VerifyError::BadJumpTarget { bci, target });
            }
            worklist.push((target, d));
        }
        if !inst.opcode.is_unconditional_terminator() {
            let next = inst.next_bci();
            if next >= code.len() {
                return Err(VerifyError::FallsOffEnd { bci });
            }
            worklist.push((next, d));
        }
    }

    Ok(max_depth as u16)
}

/// Offsets of every instruction in straight-line order.
pub fn boundaries(code: &[u16]) -> Result<BTreeSet<usize>, IntegrityViolation> {
    crate::instruction::Instructions::new(code)
        .map(|inst| inst.map(|i| i.bci))
        .collect()
}

fn check_operands(
    code: &[u16],
    at: usize,
    op: Opcode,
    locals: u16,
    constants: usize,
) -> Result<(), VerifyError> {
    match op {
        Opcode::LdLoc | Opcode::StLoc => {
            let slot = code[at + 1] as usize;
            if slot >= locals as usize {
                return Err(VerifyError::LocalOutOfRange {
                    bci: at,
                    slot,
                    locals,
                });
            }
        }
        Opcode::LdConst => {
            let index = code[at + 1] as usize;
            if index >= constants {
                return Err(VerifyError::ConstantOutOfRange {
                    bci: at,
                    index,
                    len: constants,
                });
            }
        }
        _ => {}
    }
    Ok(())
}
