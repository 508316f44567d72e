//! Immutable bytecode programs.
//!
//! A [`Program`] bundles the instruction words, the locals count, the
//! maximum operand-stack depth and the frozen constant table. It is cheap to
//! clone and safe to share between threads.

use crate::instruction::Instructions;
use crate::verifier::{self, VerifyError};
use core_types::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique program identity, used to key compiled code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(u64);

impl ProgramId {
    fn fresh() -> Self {
        Self(NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Frozen constant table shared by a program and everything derived from it
pub type Constants = Arc<[Option<Value>]>;

/// An immutable bytecode program.
#[derive(Debug, Clone)]
pub struct Program {
    id: ProgramId,
    code: Arc<[u16]>,
    locals: u16,
    max_stack: u16,
    constants: Constants,
}

impl Program {
    /// Verify `code` and build a program from it.
    ///
    /// The verifier checks opcode validity, operand bounds, jump targets and
    /// operand-stack balance, and computes the maximum stack depth.
    pub fn verified(code: Vec<u16>, locals: u16, constants: Constants) -> Result<Self, VerifyError> {
        let max_stack = verifier::verify(&code, locals, constants.len())?;
        Ok(Self::unverified(code, locals, max_stack, constants))
    }

    /// Build a program without verification.
    ///
    /// The interpreter still reports any integrity violation it actually
    /// executes into, but guarantees nothing else about such programs.
    pub fn unverified(code: Vec<u16>, locals: u16, max_stack: u16, constants: Constants) -> Self {
        Self {
            id: ProgramId::fresh(),
            code: code.into(),
            locals,
            max_stack,
            constants,
        }
    }

    /// Same layout and constants, different instruction words, new identity
    pub fn with_code(&self, code: Vec<u16>) -> Self {
        Self::unverified(code, self.locals, self.max_stack, Arc::clone(&self.constants))
    }

    /// Program identity
    pub fn id(&self) -> ProgramId {
        self.id
    }

    /// Instruction words
    pub fn code(&self) -> &[u16] {
        &self.code
    }

    /// Number of instruction words
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Whether the program has no instructions
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Number of local slots
    pub fn locals(&self) -> u16 {
        self.locals
    }

    /// Maximum operand-stack depth
    pub fn max_stack(&self) -> u16 {
        self.max_stack
    }

    /// Total frame slots: locals plus operand stack
    pub fn frame_size(&self) -> usize {
        self.locals as usize + self.max_stack as usize
    }

    /// The constant table
    pub fn constants(&self) -> &Constants {
        &self.constants
    }

    /// Decode the program's instructions in straight-line order
    pub fn instructions(&self) -> Instructions<'_> {
        Instructions::new(&self.code)
    }

    /// Whether any superinstruction appears in the stream
    pub fn is_quickened(&self) -> bool {
        self.instructions()
            .filter_map(Result::ok)
            .any(|inst| inst.opcode.is_super())
    }
}
