//! Built-in demo programs, built with [`ProgramBuilder`].

use bytecode_system::{Program, ProgramBuilder, VerifyError};
use core_types::Value;

use crate::cli::Demo;

/// Locals: `a`, `b`, `t`. Loops `t = a % b; a = b; b = t` while `0 < b`.
pub fn gcd() -> Result<Program, VerifyError> {
    let mut b = ProgramBuilder::new(3);
    let top = b.bound_label();
    let end = b.new_label();
    b.emit_const(0);
    b.emit_ld_loc(1);
    b.emit_less();
    b.emit_jump_false(end);
    b.emit_ld_loc(0);
    b.emit_ld_loc(1);
    b.emit_mod();
    b.emit_st_loc(2);
    b.emit_ld_loc(1);
    b.emit_st_loc(0);
    b.emit_ld_loc(2);
    b.emit_st_loc(1);
    b.emit_jump(top);
    b.bind(end);
    b.emit_ld_loc(0);
    b.emit_return();
    b.build()
}

/// Locals: `n`, `i`, `sum`. Adds `1..=n` into `sum`.
pub fn sum() -> Result<Program, VerifyError> {
    let mut b = ProgramBuilder::new(3);
    b.emit_const(0);
    b.emit_st_loc(1);
    b.emit_const(0);
    b.emit_st_loc(2);
    let top = b.bound_label();
    let end = b.new_label();
    b.emit_ld_loc(1);
    b.emit_ld_loc(0);
    b.emit_less();
    b.emit_jump_false(end);
    b.emit_ld_loc(1);
    b.emit_const(1);
    b.emit_add();
    b.emit_st_loc(1);
    b.emit_ld_loc(2);
    b.emit_ld_loc(1);
    b.emit_add();
    b.emit_st_loc(2);
    b.emit_jump(top);
    b.bind(end);
    b.emit_ld_loc(2);
    b.emit_return();
    b.build()
}

/// Program and arguments for `demo`
pub fn program_for(demo: Demo) -> Result<(Program, Vec<Value>), VerifyError> {
    Ok(match demo {
        Demo::Gcd { a, b } => (gcd()?, vec![Value::Int(a), Value::Int(b)]),
        Demo::Sum { n } => (sum()?, vec![Value::Int(n)]),
    })
}
