//! Contract compliance tests for core_types
//! Verifies the public surface other components rely on

use core_types::{
    IntegrityViolation, InterpreterPosition, ObjectRef, PackedPosition, PoolFrozenError,
    SlotKind, TypeMismatchError, Value, VmError, VmResult,
};

#[test]
fn test_contract_value_variants() {
    let _ = Value::Int(0);
    let _ = Value::Boolean(true);
    let _ = Value::Reference(ObjectRef::new(()));
    let _ = Value::Cleared;
}

#[test]
fn test_contract_slot_kinds() {
    let kinds = [
        SlotKind::Int,
        SlotKind::Boolean,
        SlotKind::Reference,
        SlotKind::Cleared,
    ];
    assert_eq!(kinds.len(), 4);
}

#[test]
fn test_contract_position_is_copy() {
    fn assert_copy<T: Copy>() {}
    assert_copy::<InterpreterPosition>();
    assert_copy::<PackedPosition>();
}

#[test]
fn test_contract_error_variants() {
    let _ = IntegrityViolation::UnknownOpcode { bci: 0, word: 0 };
    let _ = IntegrityViolation::TruncatedInstruction { bci: 0 };
    let _ = IntegrityViolation::BadJumpTarget { bci: 0, target: 0 };
    let _ = IntegrityViolation::StackUnderflow { bci: 0 };
    let _ = IntegrityViolation::StackOverflow { bci: 0 };
    let _ = IntegrityViolation::SlotOutOfRange { bci: 0, index: 0 };
    let _ = IntegrityViolation::DivisionByZero { bci: 0 };

    let r: VmResult<()> = Err(VmError::PoolFrozen(PoolFrozenError));
    assert!(r.is_err());
    let _ = TypeMismatchError {
        slot: 0,
        expected: SlotKind::Int,
        found: SlotKind::Cleared,
    };
}
