//! Bytecode system for the loop VM
//!
//! This crate defines the 16-bit instruction encoding, the deduplicating
//! constant pool, verified programs, and the quickening pass that fuses
//! common instruction sequences into superinstructions.
//!
//! # Features
//!
//! - Variable-width 16-bit instruction words with explicit jump offsets
//! - Thread-safe constant pool with freeze-on-read semantics
//! - Verifier computing operand stack bounds
//! - Quickening into superinstructions and back
//! - Text assembler and disassembler
//!
//! # Example
//!
//! ```
//! use bytecode_system::{ProgramBuilder, Quickener};
//!
//! let mut b = ProgramBuilder::new(2);
//! b.emit_const(10);
//! b.emit_st_loc(0);
//! b.emit_ld_loc(0);
//! b.emit_st_loc(1);
//! b.emit_ld_loc(1);
//! b.emit_return();
//! let program = b.build().unwrap();
//!
//! let (quick, stats) = Quickener::new().quicken(&program);
//! assert_eq!(stats.total(), 1);
//! assert_eq!(quick.code().len(), program.code().len());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod asm;
pub mod builder;
pub mod disasm;
pub mod instruction;
pub mod opcode;
pub mod pool;
pub mod program;
pub mod quicken;
pub mod verifier;

// Re-export main types at crate root
pub use asm::{assemble, AsmError};
pub use builder::{Label, ProgramBuilder};
pub use disasm::{describe_at, disassemble};
pub use instruction::{decode_const, encode_const, Instruction, Instructions};
pub use opcode::{Opcode, SUPERINSTRUCTIONS};
pub use pool::ConstantPool;
pub use program::{Constants, Program, ProgramId};
pub use quicken::{dequicken, QuickenStats, Quickener};
pub use verifier::VerifyError;
