//! Activation frames.
//!
//! A frame is a fixed array of slots. The first `locals` slots hold local
//! variables and the operand stack grows above them, so stack entry `i`
//! lives in slot `locals + i`.
//!
//! Two implementations sit behind the [`Frame`] trait:
//!
//! - [`RawFrame`] trusts the accessor: `get_int` on a boolean slot reads the
//!   raw bits. This is the frame for verified programs.
//! - [`CheckedFrame`] compares every read against the stored tag and fails
//!   with [`TypeMismatchError`] instead.
//!
//! Both panic on a slot index past [`Frame::size`]; the dispatch loop checks
//! indices before touching the frame.

use core_types::{ObjectRef, SlotKind, TypeMismatchError, Value};

/// Slot storage for one activation.
pub trait Frame {
    /// Allocate a frame of `size` cleared slots
    fn with_size(size: usize) -> Self
    where
        Self: Sized;

    /// Number of slots
    fn size(&self) -> usize;

    /// Read an integer
    fn get_int(&self, slot: usize) -> Result<i32, TypeMismatchError>;
    /// Write an integer
    fn set_int(&mut self, slot: usize, value: i32);

    /// Read a boolean
    fn get_boolean(&self, slot: usize) -> Result<bool, TypeMismatchError>;
    /// Write a boolean
    fn set_boolean(&mut self, slot: usize, value: bool);

    /// Read an object reference
    fn get_reference(&self, slot: usize) -> Result<ObjectRef, TypeMismatchError>;
    /// Write an object reference
    fn set_reference(&mut self, slot: usize, value: ObjectRef);

    /// Duplicate `src` into `dst`, tag included
    fn copy(&mut self, src: usize, dst: usize);

    /// Mark `slot` uninitialized, dropping any reference it held
    fn clear(&mut self, slot: usize);

    /// Kind of value last stored in `slot`
    fn kind(&self, slot: usize) -> SlotKind;

    /// Read `slot` as whatever kind it holds
    fn value(&self, slot: usize) -> Value;

    /// Write a tagged value
    fn set_value(&mut self, slot: usize, value: Value) {
        match value {
            Value::Int(v) => self.set_int(slot, v),
            Value::Boolean(b) => self.set_boolean(slot, b),
            Value::Reference(r) => self.set_reference(slot, r),
            Value::Cleared => self.clear(slot),
        }
    }

    /// Every slot, in order
    fn snapshot(&self) -> Vec<Value> {
        (0..self.size()).map(|slot| self.value(slot)).collect()
    }
}

/// Frame storing primitives as raw bits next to a separate reference array.
///
/// Tags are kept so [`Frame::copy`] and [`Frame::value`] stay faithful, but
/// typed reads never consult them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    tags: Box<[SlotKind]>,
    primitives: Box<[u64]>,
    objects: Box<[Option<ObjectRef>]>,
}

impl RawFrame {
    /// Frame of `size` cleared slots
    pub fn new(size: usize) -> Self {
        Self {
            tags: vec![SlotKind::Cleared; size].into_boxed_slice(),
            primitives: vec![0; size].into_boxed_slice(),
            objects: vec![None; size].into_boxed_slice(),
        }
    }

    #[inline(always)]
    fn set_primitive(&mut self, slot: usize, kind: SlotKind, bits: u64) {
        self.tags[slot] = kind;
        self.primitives[slot] = bits;
        self.objects[slot] = None;
    }
}

impl Frame for RawFrame {
    fn with_size(size: usize) -> Self {
        Self::new(size)
    }

    fn size(&self) -> usize {
        self.tags.len()
    }

    #[inline(always)]
    fn get_int(&self, slot: usize) -> Result<i32, TypeMismatchError> {
        Ok(self.primitives[slot] as u32 as i32)
    }

    #[inline(always)]
    fn set_int(&mut self, slot: usize, value: i32) {
        self.set_primitive(slot, SlotKind::Int, value as u32 as u64);
    }

    #[inline(always)]
    fn get_boolean(&self, slot: usize) -> Result<bool, TypeMismatchError> {
        Ok(self.primitives[slot] != 0)
    }

    #[inline(always)]
    fn set_boolean(&mut self, slot: usize, value: bool) {
        self.set_primitive(slot, SlotKind::Boolean, value as u64);
    }

    fn get_reference(&self, slot: usize) -> Result<ObjectRef, TypeMismatchError> {
        // No bits to reinterpret when the reference array is empty
        self.objects[slot].clone().ok_or(TypeMismatchError {
            slot,
            expected: SlotKind::Reference,
            found: self.tags[slot],
        })
    }

    fn set_reference(&mut self, slot: usize, value: ObjectRef) {
        self.tags[slot] = SlotKind::Reference;
        self.primitives[slot] = 0;
        self.objects[slot] = Some(value);
    }

    #[inline(always)]
    fn copy(&mut self, src: usize, dst: usize) {
        self.tags[dst] = self.tags[src];
        self.primitives[dst] = self.primitives[src];
        self.objects[dst] = self.objects[src].clone();
    }

    #[inline(always)]
    fn clear(&mut self, slot: usize) {
        self.set_primitive(slot, SlotKind::Cleared, 0);
    }

    fn kind(&self, slot: usize) -> SlotKind {
        self.tags[slot]
    }

    fn value(&self, slot: usize) -> Value {
        match self.tags[slot] {
            SlotKind::Int => Value::Int(self.primitives[slot] as u32 as i32),
            SlotKind::Boolean => Value::Boolean(self.primitives[slot] != 0),
            SlotKind::Reference => self.objects[slot]
                .clone()
                .map_or(Value::Cleared, Value::Reference),
            SlotKind::Cleared => Value::Cleared,
        }
    }
}

/// Frame of tagged values that rejects mismatched reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedFrame {
    slots: Box<[Value]>,
}

impl CheckedFrame {
    /// Frame of `size` cleared slots
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![Value::Cleared; size].into_boxed_slice(),
        }
    }

    fn mismatch(&self, slot: usize, expected: SlotKind) -> TypeMismatchError {
        TypeMismatchError {
            slot,
            expected,
            found: self.slots[slot].kind(),
        }
    }
}

impl Frame for CheckedFrame {
    fn with_size(size: usize) -> Self {
        Self::new(size)
    }

    fn size(&self) -> usize {
        self.slots.len()
    }

    fn get_int(&self, slot: usize) -> Result<i32, TypeMismatchError> {
        match self.slots[slot] {
            Value::Int(v) => Ok(v),
            _ => Err(self.mismatch(slot, SlotKind::Int)),
        }
    }

    fn set_int(&mut self, slot: usize, value: i32) {
        self.slots[slot] = Value::Int(value);
    }

    fn get_boolean(&self, slot: usize) -> Result<bool, TypeMismatchError> {
        match self.slots[slot] {
            Value::Boolean(b) => Ok(b),
            _ => Err(self.mismatch(slot, SlotKind::Boolean)),
        }
    }

    fn set_boolean(&mut self, slot: usize, value: bool) {
        self.slots[slot] = Value::Boolean(value);
    }

    fn get_reference(&self, slot: usize) -> Result<ObjectRef, TypeMismatchError> {
        match &self.slots[slot] {
            Value::Reference(r) => Ok(r.clone()),
            _ => Err(self.mismatch(slot, SlotKind::Reference)),
        }
    }

    fn set_reference(&mut self, slot: usize, value: ObjectRef) {
        self.slots[slot] = Value::Reference(value);
    }

    fn copy(&mut self, src: usize, dst: usize) {
        self.slots[dst] = self.slots[src].clone();
    }

    fn clear(&mut self, slot: usize) {
        self.slots[slot] = Value::Cleared;
    }

    fn kind(&self, slot: usize) -> SlotKind {
        self.slots[slot].kind()
    }

    fn value(&self, slot: usize) -> Value {
        self.slots[slot].clone()
    }
}
