//! Bytecode interpreter for the loop VM
//!
//! This crate provides the interpreted tier:
//! - Frames with unchecked (`RawFrame`) and checked (`CheckedFrame`) slot access
//! - The dispatch loop, including superinstruction handlers
//! - On-stack replacement at loop back-edges, with the compiled tier and the
//!   safepoint injected as capabilities
//! - Loop profiling and a cooperative pause gate
//!
//! # Example
//!
//! ```
//! use interpreter::{VmConfig, VM};
//! use bytecode_system::assemble;
//! use core_types::Value;
//!
//! let program = assemble("
//!     .locals 1
//!             const 10
//!             st_loc 0
//!     loop:   const 0
//!             ld_loc 0
//!             less
//!             jump_false done
//!             ld_loc 0
//!             const -1
//!             add
//!             st_loc 0
//!             jump loop
//!     done:   ld_loc 0
//!             return
//! ").unwrap();
//!
//! let vm = VM::with_config(VmConfig::new().with_quicken(true));
//! assert_eq!(vm.execute(&program), Ok(Value::Int(0)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod dispatch;
pub mod frame;
pub mod osr;
pub mod profile;
pub mod safepoint;
pub mod vm;

// Re-export main types at crate root
pub use config::{FrameKind, SlotClearing, VmConfig};
pub use context::Activation;
pub use dispatch::{execute, execute_at, step, Step};
pub use frame::{CheckedFrame, Frame, RawFrame};
pub use osr::{
    BackEdge, CompiledEntry, LoopCounter, OsrCompiler, OsrController, OsrExit, OsrRequest,
    TierRuntime,
};
pub use profile::{LoopKey, LoopProfile};
pub use safepoint::{NoSafepoint, PauseGate, PauseGuard, SafepointPoll};
pub use vm::VM;
