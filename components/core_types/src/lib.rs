//! Core value types and error handling for the loop VM.
//!
//! This crate provides the foundational types shared by the bytecode,
//! interpreter and compiled tiers: slot values, the portable interpreter
//! position and the error taxonomy.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of a frame slot
//! - [`ObjectRef`] - Shared, identity-compared object reference
//! - [`InterpreterPosition`] / [`PackedPosition`] - `(bci, sp)` resume points
//! - [`VmError`] - Errors surfaced by execution
//!
//! # Examples
//!
//! ```
//! use core_types::{InterpreterPosition, SlotKind, Value};
//!
//! let v = Value::Int(42);
//! assert_eq!(v.kind(), SlotKind::Int);
//!
//! let pos = InterpreterPosition::new(10, 2);
//! assert_eq!(pos.pack().unpack(), pos);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod position;
mod value;

pub use error::{IntegrityViolation, PoolFrozenError, TypeMismatchError, VmError, VmResult};
pub use position::{InterpreterPosition, PackedPosition};
pub use value::{ObjectRef, SlotKind, Value};
