//! Tests for the deduplicating constant pool

use bytecode_system::ConstantPool;
use core_types::{ObjectRef, PoolFrozenError, Value};
use std::sync::Arc;
use std::thread;

#[test]
fn test_add_returns_existing_index_for_equal_values() {
    let pool = ConstantPool::new();
    let a = pool.add(Value::Int(7)).unwrap();
    let b = pool.add(Value::Boolean(true)).unwrap();
    let c = pool.add(Value::Int(7)).unwrap();
    assert_eq!(a, 0);
    assert_eq!(b, 1);
    assert_eq!(c, 0);
    assert_eq!(pool.len(), 2);
}

#[test]
fn test_references_dedup_by_identity() {
    let pool = ConstantPool::new();
    let first = ObjectRef::new(String::from("x"));
    let twin = ObjectRef::new(String::from("x"));
    let a = pool.add(Value::Reference(first.clone())).unwrap();
    let b = pool.add(Value::Reference(twin)).unwrap();
    let c = pool.add(Value::Reference(first)).unwrap();
    assert_ne!(a, b);
    assert_eq!(a, c);
}

#[test]
fn test_reserve_then_fill() {
    let pool: ConstantPool<Value> = ConstantPool::new();
    pool.add(Value::Int(1)).unwrap();
    let start = pool.reserve(3).unwrap();
    assert_eq!(start, 1);
    assert_eq!(pool.len(), 4);
    pool.set_value(2, Value::Int(5));

    let values = pool.values();
    assert_eq!(values[1], None);
    assert_eq!(values[2], Some(Value::Int(5)));
    assert_eq!(values[3], None);
}

#[test]
fn test_reserved_slots_never_match() {
    let pool: ConstantPool<Value> = ConstantPool::new();
    pool.reserve(1).unwrap();
    assert_eq!(pool.add(Value::Int(0)).unwrap(), 1);
}

#[test]
fn test_values_freezes() {
    let pool = ConstantPool::new();
    pool.add(Value::Int(1)).unwrap();
    let first = pool.values();
    assert!(pool.is_frozen());
    assert_eq!(pool.add(Value::Int(2)), Err(PoolFrozenError));
    assert_eq!(pool.reserve(1), Err(PoolFrozenError));
    let second = pool.values();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_reset_reopens() {
    let pool = ConstantPool::new();
    pool.add(Value::Int(1)).unwrap();
    pool.freeze();
    pool.reset();
    assert!(!pool.is_frozen());
    assert!(pool.is_empty());
    assert_eq!(pool.add(Value::Int(9)).unwrap(), 0);
}

#[test]
fn test_concurrent_adds_agree_on_indices() {
    let pool = Arc::new(ConstantPool::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                (0..100)
                    .map(|i| pool.add(Value::Int(i)).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let results: Vec<Vec<usize>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(pool.len(), 100);
    let values = pool.values();
    for indices in &results {
        for (i, idx) in indices.iter().enumerate() {
            assert_eq!(values[*idx], Some(Value::Int(i as i32)));
        }
    }
}
