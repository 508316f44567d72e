//! Decoded view over the raw instruction stream.
//!
//! A program is a flat `[u16]`. Instructions are an opcode word followed by
//! a fixed number of operand words; this module turns offsets into
//! [`Instruction`]s and back.

use crate::opcode::Opcode;
use core_types::IntegrityViolation;

/// Split an `i32` immediate into its `(high, low)` operand words.
pub const fn encode_const(value: i32) -> [u16; 2] {
    [((value as u32) >> 16) as u16, value as u32 as u16]
}

/// Rebuild an `i32` immediate from its `(high, low)` operand words.
#[inline(always)]
pub const fn decode_const(high: u16, low: u16) -> i32 {
    (((high as u32) << 16) | low as u32) as i32
}

/// A single decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Offset of the opcode word
    pub bci: usize,
    /// The opcode
    pub opcode: Opcode,
}

impl Instruction {
    /// Decode the instruction at `bci`.
    ///
    /// Fails if the word is not an opcode or its operands run past the end
    /// of `code`.
    pub fn decode(code: &[u16], bci: usize) -> Result<Self, IntegrityViolation> {
        let word = *code
            .get(bci)
            .ok_or(IntegrityViolation::TruncatedInstruction { bci })?;
        let opcode = Opcode::decode(word).ok_or(IntegrityViolation::UnknownOpcode { bci, word })?;
        if bci + opcode.width() > code.len() {
            return Err(IntegrityViolation::TruncatedInstruction { bci });
        }
        Ok(Self { bci, opcode })
    }

    /// Offset of the next instruction in straight-line order
    pub fn next_bci(&self) -> usize {
        self.bci + self.opcode.width()
    }

    /// Components of this instruction with the offset each one starts at.
    ///
    /// For a base opcode this yields a single entry at `self.bci`.
    pub fn parts(&self) -> impl Iterator<Item = (usize, Opcode)> + '_ {
        let mut at = self.bci;
        self.opcode.components().iter().map(move |op| {
            let start = at;
            at += op.width();
            (start, *op)
        })
    }

    /// Jump target of this instruction, if its last component is a jump
    pub fn jump_target(&self, code: &[u16]) -> Option<usize> {
        let (at, op) = self.parts().last()?;
        match op {
            Opcode::Jump | Opcode::JumpFalse => Some(code[at + 1] as usize),
            _ => None,
        }
    }
}

/// Iterator over the instructions of a code slice in straight-line order.
///
/// Stops after the first decode error, which it yields.
pub struct Instructions<'a> {
    code: &'a [u16],
    bci: usize,
    failed: bool,
}

impl<'a> Instructions<'a> {
    /// Iterate over `code` from offset zero
    pub fn new(code: &'a [u16]) -> Self {
        Self {
            code,
            bci: 0,
            failed: false,
        }
    }
}

impl Iterator for Instructions<'_> {
    type Item = Result<Instruction, IntegrityViolation>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.bci >= self.code.len() {
            return None;
        }
        match Instruction::decode(self.code, self.bci) {
            Ok(inst) => {
                self.bci = inst.next_bci();
                Some(Ok(inst))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
