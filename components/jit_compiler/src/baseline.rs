//! Baseline loop compiler
//!
//! Translates a verified program into a flat array of pre-decoded
//! operations. Superinstructions are expanded back into their parts, so
//! every base-opcode offset the interpreter can stop at, including the
//! interior of a fused sequence, has its own entry. Jump operands are
//! resolved to op indices and constant-pool loads to the values themselves.

use bytecode_system::{decode_const, verifier, Opcode, Program, ProgramId, VerifyError};
use core_types::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Reasons a program cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The program does not verify
    #[error(transparent)]
    Verify(#[from] VerifyError),
    /// The interpreter's frame cannot hold the verified stack depth
    #[error("program needs {needed} frame slots, frame has {available}")]
    FrameTooSmall {
        /// Locals plus verified stack depth
        needed: usize,
        /// Slots in the requesting frame
        available: usize,
    },
    /// A reserved constant-pool entry is loaded
    #[error("constant {index} at bci {bci} is reserved but never set")]
    MissingConstant {
        /// Offset of the `ld_const`
        bci: usize,
        /// Pool index
        index: usize,
    },
    /// The entry offset is not the start of a base operation
    #[error("bci {0} is not an entry point")]
    NotAnEntry(usize),
}

/// One pre-decoded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Push an integer immediate
    Const(i32),
    /// Push a copy of a local
    LdLoc(usize),
    /// Pop into a local
    StLoc(usize),
    /// Push a pooled constant
    LdConst(Value),
    /// Integer addition
    Add,
    /// Integer remainder
    Mod,
    /// Integer comparison
    Less,
    /// Unconditional jump to an op index
    Jump {
        /// Op index of the target
        target: usize,
        /// Target offset is at or before the jump
        back_edge: bool,
    },
    /// Pop a boolean and jump when it is false
    JumpFalse {
        /// Op index of the target
        target: usize,
        /// Target offset is at or before the jump
        back_edge: bool,
    },
    /// Return the top of the stack
    Return,
}

/// A pre-decoded operation and the bytecode offset it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedOp {
    /// Offset of this operation's opcode word
    pub bci: usize,
    /// The operation
    pub op: Op,
}

/// Translated program, enterable at any base-operation offset.
#[derive(Debug)]
pub struct LoopCode {
    program: ProgramId,
    locals: usize,
    max_stack: usize,
    ops: Box<[DecodedOp]>,
    depths: Box<[Option<usize>]>,
    entries: HashMap<usize, usize>,
}

impl LoopCode {
    /// Program this was translated from
    pub fn program(&self) -> ProgramId {
        self.program
    }

    /// Local slot count
    pub fn locals(&self) -> usize {
        self.locals
    }

    /// Verified maximum stack depth
    pub fn max_stack(&self) -> usize {
        self.max_stack
    }

    /// The operations
    pub fn ops(&self) -> &[DecodedOp] {
        &self.ops
    }

    /// Op index for bytecode offset `bci`
    pub fn entry(&self, bci: usize) -> Option<usize> {
        self.entries.get(&bci).copied()
    }

    /// Operand stack depth on arrival at op `index`; `None` if unreachable
    pub fn depth(&self, index: usize) -> Option<usize> {
        self.depths.get(index).copied().flatten()
    }
}

/// Statistics for baseline compilation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaselineStats {
    /// Programs translated
    pub programs_compiled: u64,
    /// Operations emitted over all programs
    pub ops_emitted: u64,
    /// Translations rejected
    pub failures: u64,
}

/// Baseline compiler from bytecode to [`LoopCode`].
#[derive(Debug, Default)]
pub struct BaselineCompiler {
    stats: BaselineStats,
}

impl BaselineCompiler {
    /// Create a new baseline compiler
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate `program` for a frame of `frame_size` slots.
    ///
    /// # Example
    /// ```
    /// use bytecode_system::assemble;
    /// use jit_compiler::BaselineCompiler;
    ///
    /// let program = assemble("const 1\nreturn").unwrap();
    /// let mut compiler = BaselineCompiler::new();
    /// let code = compiler.compile(&program, program.frame_size()).unwrap();
    /// assert_eq!(code.ops().len(), 2);
    /// ```
    pub fn compile(&mut self, program: &Program, frame_size: usize) -> Result<LoopCode, CompileError> {
        match translate(program, frame_size) {
            Ok(code) => {
                self.stats.programs_compiled += 1;
                self.stats.ops_emitted += code.ops.len() as u64;
                Ok(code)
            }
            Err(e) => {
                self.stats.failures += 1;
                Err(e)
            }
        }
    }

    /// Get compilation statistics
    pub fn stats(&self) -> &BaselineStats {
        &self.stats
    }

    /// Reset compilation statistics
    pub fn reset_stats(&mut self) {
        self.stats = BaselineStats::default();
    }
}

fn translate(program: &Program, frame_size: usize) -> Result<LoopCode, CompileError> {
    let code = program.code();
    let locals = program.locals() as usize;
    let max_stack = verifier::verify(code, program.locals(), program.constants().len())? as usize;
    if locals + max_stack > frame_size {
        return Err(CompileError::FrameTooSmall {
            needed: locals + max_stack,
            available: frame_size,
        });
    }

    let mut parts = Vec::new();
    let mut entries = HashMap::new();
    for inst in program.instructions() {
        let inst = inst.map_err(VerifyError::from)?;
        for (at, op) in inst.parts() {
            entries.insert(at, parts.len());
            parts.push((at, op));
        }
    }

    let resolve = |at: usize| -> Result<(usize, bool), CompileError> {
        let target = code[at + 1] as usize;
        let index = *entries.get(&target).ok_or(CompileError::NotAnEntry(target))?;
        Ok((index, target <= at))
    };

    let mut ops = Vec::with_capacity(parts.len());
    for (at, opcode) in parts.iter().copied() {
        let op = match opcode {
            Opcode::Const => Op::Const(decode_const(code[at + 1], code[at + 2])),
            Opcode::LdLoc => Op::LdLoc(code[at + 1] as usize),
            Opcode::StLoc => Op::StLoc(code[at + 1] as usize),
            Opcode::LdConst => {
                let index = code[at + 1] as usize;
                let value = program
                    .constants()
                    .get(index)
                    .and_then(Option::as_ref)
                    .ok_or(CompileError::MissingConstant { bci: at, index })?;
                Op::LdConst(value.clone())
            }
            Opcode::Add => Op::Add,
            Opcode::Mod => Op::Mod,
            Opcode::Less => Op::Less,
            Opcode::Return => Op::Return,
            Opcode::Jump => {
                let (target, back_edge) = resolve(at)?;
                Op::Jump { target, back_edge }
            }
            Opcode::JumpFalse => {
                let (target, back_edge) = resolve(at)?;
                Op::JumpFalse { target, back_edge }
            }
            // parts() only ever yields base opcodes
            _ => return Err(CompileError::NotAnEntry(at)),
        };
        ops.push(DecodedOp { bci: at, op });
    }

    let depths = stack_depths(&parts, &ops);

    log::debug!(
        "program {}: translated {} ops (max stack {})",
        program.id(),
        ops.len(),
        max_stack
    );

    Ok(LoopCode {
        program: program.id(),
        locals,
        max_stack,
        ops: ops.into_boxed_slice(),
        depths,
        entries,
    })
}

// The program has verified, so every reachable op has one consistent depth
// and no op underflows.
fn stack_depths(parts: &[(usize, Opcode)], ops: &[DecodedOp]) -> Box<[Option<usize>]> {
    let mut depths = vec![None; ops.len()];
    let mut worklist = vec![(0usize, 0usize)];
    while let Some((index, depth)) = worklist.pop() {
        if index >= ops.len() || depths[index].is_some() {
            continue;
        }
        depths[index] = Some(depth);
        let (pops, pushes) = parts[index].1.stack_effect();
        let after = depth - pops + pushes;
        match ops[index].op {
            Op::Jump { target, .. } => worklist.push((target, after)),
            Op::JumpFalse { target, .. } => {
                worklist.push((target, after));
                worklist.push((index + 1, after));
            }
            Op::Return => {}
            _ => worklist.push((index + 1, after)),
        }
    }
    depths.into_boxed_slice()
}
