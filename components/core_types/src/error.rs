//! Error types for program construction and execution.
//!
//! Three failure classes exist:
//!
//! - [`IntegrityViolation`]: the bytecode itself is broken. Fatal to the
//!   activation that hit it.
//! - [`PoolFrozenError`]: a constant pool was mutated after it was frozen.
//! - [`TypeMismatchError`]: a checked frame was read with the wrong accessor.
//!
//! OSR bailouts are not errors and have no representation here.

use crate::SlotKind;
use thiserror::Error;

/// Malformed bytecode encountered at run time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityViolation {
    /// Opcode word outside the defined instruction set
    #[error("should not reach here: unknown opcode {word:#06x} at bci {bci}")]
    UnknownOpcode {
        /// Offset of the offending word
        bci: usize,
        /// The raw opcode word
        word: u16,
    },
    /// Instruction operands run past the end of the program
    #[error("truncated instruction at bci {bci}")]
    TruncatedInstruction {
        /// Offset of the instruction
        bci: usize,
    },
    /// Jump target is not an instruction boundary
    #[error("jump at bci {bci} targets {target}, which is not an instruction boundary")]
    BadJumpTarget {
        /// Offset of the jump
        bci: usize,
        /// Encoded target
        target: usize,
    },
    /// An instruction popped below the locals region
    #[error("operand stack underflow at bci {bci}")]
    StackUnderflow {
        /// Offset of the instruction
        bci: usize,
    },
    /// An instruction pushed past the frame's capacity
    #[error("operand stack overflow at bci {bci}")]
    StackOverflow {
        /// Offset of the instruction
        bci: usize,
    },
    /// Local slot or constant index outside its table
    #[error("slot or constant index {index} out of range at bci {bci}")]
    SlotOutOfRange {
        /// Offset of the instruction
        bci: usize,
        /// The offending index
        index: usize,
    },
    /// Integer modulo by zero
    #[error("division by zero at bci {bci}")]
    DivisionByZero {
        /// Offset of the instruction
        bci: usize,
    },
    /// A resume position does not fit the 16-bit `(bci, sp)` encoding
    #[error("position bci {bci} sp {sp} exceeds the 16-bit encoding")]
    PositionOutOfRange {
        /// Instruction offset
        bci: usize,
        /// Operand-stack depth
        sp: usize,
    },
}

/// A constant pool was mutated after being frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("pool frozen")]
pub struct PoolFrozenError;

/// A checked frame slot was accessed as the wrong type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("slot {slot}: expected {expected}, found {found}")]
pub struct TypeMismatchError {
    /// Slot index
    pub slot: usize,
    /// Kind requested by the accessor
    pub expected: SlotKind,
    /// Kind actually stored
    pub found: SlotKind,
}

/// Any error surfaced by running a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    /// Fatal program integrity violation
    #[error("program integrity violation: {0}")]
    Integrity(#[from] IntegrityViolation),
    /// Checked-frame type mismatch
    #[error("type mismatch: {0}")]
    TypeMismatch(#[from] TypeMismatchError),
    /// Constant pool mutation after freeze
    #[error(transparent)]
    PoolFrozen(#[from] PoolFrozenError),
}

impl VmError {
    /// Whether this error is fatal to the activation that raised it
    pub fn is_fatal(&self) -> bool {
        matches!(self, VmError::Integrity(_))
    }
}

/// Result alias for execution
pub type VmResult<T> = Result<T, VmError>;
