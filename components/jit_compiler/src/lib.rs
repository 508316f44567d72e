//! Compiled loop tier for the bytecode VM
//!
//! This crate provides:
//! - Baseline compiler: translates a verified program into pre-decoded
//!   operations with resolved jumps
//! - Compiled loops: entered from the interpreter at a loop header on the
//!   interpreter's own frame, with deoptimization exits back to it
//! - Code cache and deoptimization history per loop
//! - Background compilation on a worker thread
//!
//! [`LoopTier`] plugs all of it into the interpreter as its
//! [`OsrCompiler`](interpreter::OsrCompiler).
//!
//! # Example
//!
//! ```
//! use bytecode_system::assemble;
//! use jit_compiler::{BaselineCompiler, Op};
//!
//! let program = assemble("
//!     .locals 1
//!     loop:   ld_loc 0
//!             st_loc 0
//!             jump loop
//! ").unwrap();
//! let code = BaselineCompiler::new()
//!     .compile(&program, program.frame_size())
//!     .unwrap();
//! assert_eq!(code.ops()[2].op, Op::Jump { target: 0, back_edge: true });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod baseline;
pub mod code_cache;
pub mod compilation_queue;
pub mod compiled_code;
pub mod config;
pub mod deopt;
pub mod osr;

// Re-export main types at crate root
pub use baseline::{BaselineCompiler, BaselineStats, CompileError, DecodedOp, LoopCode, Op};
pub use code_cache::{CodeCache, LoopState};
pub use compilation_queue::{CompilationQueue, CompilationQueueStats};
pub use compiled_code::CompiledLoop;
pub use config::CompilerConfig;
pub use deopt::{DeoptInfo, DeoptReason, Deoptimizer};
pub use osr::{CompileJob, LoopTier};
