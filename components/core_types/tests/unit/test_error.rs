//! Unit tests for the error taxonomy

use core_types::{IntegrityViolation, PoolFrozenError, SlotKind, TypeMismatchError, VmError};

#[test]
fn test_integrity_violation_is_fatal() {
    let err = VmError::from(IntegrityViolation::UnknownOpcode { bci: 0, word: 99 });
    assert!(err.is_fatal());
    assert!(err.to_string().contains("should not reach here"));
}

#[test]
fn test_recoverable_errors_are_not_fatal() {
    assert!(!VmError::from(PoolFrozenError).is_fatal());
    let mismatch = TypeMismatchError {
        slot: 0,
        expected: SlotKind::Boolean,
        found: SlotKind::Int,
    };
    assert!(!VmError::from(mismatch).is_fatal());
}

#[test]
fn test_error_messages_name_the_location() {
    let err = IntegrityViolation::BadJumpTarget { bci: 12, target: 5 };
    assert!(err.to_string().contains("bci 12"));
    assert!(err.to_string().contains("targets 5"));

    let err = IntegrityViolation::DivisionByZero { bci: 9 };
    assert_eq!(err.to_string(), "division by zero at bci 9");
}

#[test]
fn test_errors_are_std_errors() {
    fn assert_error<E: std::error::Error + Send + Sync + 'static>() {}
    assert_error::<VmError>();
    assert_error::<IntegrityViolation>();
    assert_error::<PoolFrozenError>();
    assert_error::<TypeMismatchError>();
}
