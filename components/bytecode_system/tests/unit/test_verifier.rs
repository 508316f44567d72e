//! Tests for program verification

use bytecode_system::{encode_const, Opcode, Program, VerifyError};
use core_types::Value;
use std::sync::Arc;

fn words(ops: &[&[u16]]) -> Vec<u16> {
    ops.iter().flat_map(|s| s.iter().copied()).collect()
}

fn konst(v: i32) -> Vec<u16> {
    let [hi, lo] = encode_const(v);
    vec![Opcode::Const.word(), hi, lo]
}

fn no_constants() -> Arc<[Option<Value>]> {
    Arc::from(Vec::new())
}

#[test]
fn test_max_stack_is_computed() {
    let code = words(&[
        &konst(1),
        &konst(2),
        &konst(3),
        &[Opcode::Add.word(), Opcode::Add.word(), Opcode::Return.word()],
    ]);
    let program = Program::verified(code, 0, no_constants()).unwrap();
    assert_eq!(program.max_stack(), 3);
    assert_eq!(program.frame_size(), 3);
}

#[test]
fn test_rejects_empty_program() {
    assert_eq!(
        Program::verified(Vec::new(), 0, no_constants()).unwrap_err(),
        VerifyError::Empty
    );
}

#[test]
fn test_rejects_underflow() {
    let code = vec![Opcode::Add.word(), Opcode::Return.word()];
    assert_eq!(
        Program::verified(code, 0, no_constants()).unwrap_err(),
        VerifyError::StackUnderflow { bci: 0 }
    );
}

#[test]
fn test_rejects_local_out_of_range() {
    let code = vec![Opcode::LdLoc.word(), 2, Opcode::Return.word()];
    assert!(matches!(
        Program::verified(code, 2, no_constants()),
        Err(VerifyError::LocalOutOfRange { bci: 0, slot: 2, .. })
    ));
}

#[test]
fn test_rejects_jump_into_operand() {
    let code = words(&[&konst(1), &[Opcode::Jump.word(), 1]]);
    assert_eq!(
        Program::verified(code, 0, no_constants()).unwrap_err(),
        VerifyError::BadJumpTarget { bci: 3, target: 1 }
    );
}

#[test]
fn test_rejects_falling_off_the_end() {
    let code = konst(1);
    assert_eq!(
        Program::verified(code, 0, no_constants()).unwrap_err(),
        VerifyError::FallsOffEnd { bci: 0 }
    );
}

#[test]
fn test_rejects_missing_constant() {
    let code = vec![Opcode::LdConst.word(), 0, Opcode::Return.word()];
    assert!(matches!(
        Program::verified(code, 0, no_constants()),
        Err(VerifyError::ConstantOutOfRange { index: 0, len: 0, .. })
    ));
}

#[test]
fn test_rejects_unknown_opcode() {
    let code = vec![0x7fff, Opcode::Return.word()];
    assert!(matches!(
        Program::verified(code, 0, no_constants()),
        Err(VerifyError::Decode(_))
    ));
}

#[test]
fn test_rejects_unbalanced_join() {
    // true ? push 1 : push nothing, then both paths meet at the return
    let mut code = words(&[&konst(0), &konst(0), &[Opcode::Less.word()]]);
    code.extend([Opcode::JumpFalse.word(), 0]);
    code.extend(konst(1));
    let join = code.len() as u16;
    code[8] = join;
    code.extend([Opcode::Return.word()]);
    assert!(matches!(
        Program::verified(code, 0, no_constants()),
        Err(VerifyError::InconsistentStack { .. }) | Err(VerifyError::StackUnderflow { .. })
    ));
}
