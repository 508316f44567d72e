//! Interpreter resume positions.
//!
//! The `(bci, sp)` pair is the unit exchanged between the interpreter and
//! compiled code across an OSR transition. It travels as a single 32-bit
//! word: `sp` in the high half, `bci` in the low half.

use crate::IntegrityViolation;
use std::fmt;

/// Where interpretation resumes: instruction offset plus operand-stack depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InterpreterPosition {
    /// Offset of the next instruction word
    pub bci: u16,
    /// Number of live operand-stack slots above the locals
    pub sp: u16,
}

impl InterpreterPosition {
    /// Position at the start of a program with an empty stack
    pub const START: InterpreterPosition = InterpreterPosition { bci: 0, sp: 0 };

    /// Create a position
    pub const fn new(bci: u16, sp: u16) -> Self {
        Self { bci, sp }
    }

    /// Position from native offsets.
    ///
    /// Fails instead of truncating when either offset exceeds 16 bits.
    pub fn from_offsets(bci: usize, sp: usize) -> Result<Self, IntegrityViolation> {
        match (u16::try_from(bci), u16::try_from(sp)) {
            (Ok(b), Ok(s)) => Ok(Self { bci: b, sp: s }),
            _ => Err(IntegrityViolation::PositionOutOfRange { bci, sp }),
        }
    }

    /// Encode into the portable single-word form
    pub const fn pack(self) -> PackedPosition {
        PackedPosition(((self.sp as u32) << 16) | self.bci as u32)
    }
}

impl fmt::Display for InterpreterPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bci={} sp={}", self.bci, self.sp)
    }
}

/// Packed `(sp << 16) | bci` form of an [`InterpreterPosition`].
///
/// # Examples
///
/// ```
/// use core_types::{InterpreterPosition, PackedPosition};
///
/// let packed = InterpreterPosition::new(0x1234, 3).pack();
/// assert_eq!(packed.raw(), 0x0003_1234);
/// assert_eq!(PackedPosition::from_raw(0x0003_1234).unpack().bci, 0x1234);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedPosition(u32);

impl PackedPosition {
    /// Rebuild from a raw word produced by [`PackedPosition::raw`]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw encoded word
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Decode back into `(bci, sp)`
    pub const fn unpack(self) -> InterpreterPosition {
        InterpreterPosition {
            bci: (self.0 & 0xffff) as u16,
            sp: (self.0 >> 16) as u16,
        }
    }
}

impl From<InterpreterPosition> for PackedPosition {
    fn from(position: InterpreterPosition) -> Self {
        position.pack()
    }
}

impl From<PackedPosition> for InterpreterPosition {
    fn from(packed: PackedPosition) -> Self {
        packed.unpack()
    }
}
