//! Tests for the assembler and disassembler

use bytecode_system::{assemble, disassemble, AsmError, Opcode, Quickener, VerifyError};
use core_types::Value;

#[test]
fn test_labels_resolve_to_offsets() {
    let program = assemble(
        "
        .locals 1
        start:  ld_loc 0
                jump_false start
                ld_const false
                return
        ",
    );
    // jump_false pops the only value, so ld_const is reached with depth 0
    let program = program.unwrap();
    assert_eq!(program.code()[3], 0);
    assert_eq!(program.constants()[0], Some(Value::Boolean(false)));
}

#[test]
fn test_duplicate_label() {
    let err = assemble("a: const 1\na: return\n").unwrap_err();
    assert!(matches!(err, AsmError::Syntax { line: 2, .. }));
}

#[test]
fn test_locals_after_code() {
    let err = assemble("const 1\n.locals 2\nreturn\n").unwrap_err();
    assert!(matches!(err, AsmError::Syntax { line: 2, .. }));
}

#[test]
fn test_verifier_errors_pass_through() {
    let err = assemble("add\nreturn\n").unwrap_err();
    assert_eq!(err, AsmError::Verify(VerifyError::StackUnderflow { bci: 0 }));
}

#[test]
fn test_superinstructions_cannot_be_written_directly() {
    assert!(assemble("si.ld_st 0 1\nreturn\n").is_err());
}

#[test]
fn test_disassembly_lists_fused_parts() {
    let program = assemble(
        "
        .locals 2
            const 3
            st_loc 0
            ld_loc 0
            st_loc 1
            ld_loc 1
            return
        ",
    )
    .unwrap();
    let (quick, _) = Quickener::new().quicken(&program);
    let text = disassemble(&quick);
    assert!(text.contains(Opcode::SiLdSt.mnemonic()));
    assert!(text.contains("0005   si.ld_st"));
    assert!(text.contains("0007 st_loc 1"));
    assert!(text.contains("0009   ld_loc 1"));
    assert!(!text.contains("►"));
}
