//! Unit tests for slot values

use core_types::{ObjectRef, SlotKind, Value};

#[test]
fn test_accessors_match_kind() {
    assert_eq!(Value::Int(5).as_int(), Some(5));
    assert_eq!(Value::Int(5).as_boolean(), None);
    assert_eq!(Value::Boolean(false).as_boolean(), Some(false));
    assert!(Value::Boolean(false).as_reference().is_none());
}

#[test]
fn test_from_impls() {
    assert_eq!(Value::from(3), Value::Int(3));
    assert_eq!(Value::from(true), Value::Boolean(true));
    let r = ObjectRef::new(vec![1u8, 2, 3]);
    assert_eq!(Value::from(r.clone()).kind(), SlotKind::Reference);
    assert_eq!(
        Value::from(r).as_reference().and_then(|r| r.downcast_ref::<Vec<u8>>()),
        Some(&vec![1u8, 2, 3])
    );
}

#[test]
fn test_equal_contents_different_identity() {
    let a = Value::Reference(ObjectRef::new(String::from("same")));
    let b = Value::Reference(ObjectRef::new(String::from("same")));
    assert_ne!(a, b);
    assert_eq!(a.clone(), a);
}

#[test]
fn test_cleared_default() {
    let v = Value::default();
    assert!(v.is_cleared());
    assert_eq!(v.kind(), SlotKind::Cleared);
}
