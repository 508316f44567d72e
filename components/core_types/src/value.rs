//! Slot value representation.
//!
//! Every frame slot holds one of four shapes: a 32-bit integer, a boolean,
//! an object reference, or the "cleared" marker left behind after a slot is
//! vacated.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The kind of value held by a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// 32-bit two's-complement integer
    Int,
    /// Boolean
    Boolean,
    /// Object reference
    Reference,
    /// Uninitialized / vacated slot
    Cleared,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotKind::Int => "int",
            SlotKind::Boolean => "boolean",
            SlotKind::Reference => "reference",
            SlotKind::Cleared => "cleared",
        };
        f.write_str(name)
    }
}

/// Shared reference to an arbitrary host object.
///
/// Equality is identity: two references are equal only if they point at the
/// same allocation, regardless of the contents.
///
/// # Examples
///
/// ```
/// use core_types::ObjectRef;
///
/// let a = ObjectRef::new(String::from("x"));
/// let b = a.clone();
/// let c = ObjectRef::new(String::from("x"));
///
/// assert_eq!(a, b);
/// assert_ne!(a, c);
/// assert_eq!(a.downcast_ref::<String>().map(String::as_str), Some("x"));
/// ```
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn Any + Send + Sync>);

impl ObjectRef {
    /// Wrap a host object
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrow the referenced object as `T`, if it is one
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Whether both references point at the same allocation
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:p})", self.addr())
    }
}

/// A value stored in a frame slot or in the constant pool.
///
/// # Examples
///
/// ```
/// use core_types::{SlotKind, Value};
///
/// assert_eq!(Value::Int(3).as_int(), Some(3));
/// assert_eq!(Value::Boolean(true).kind(), SlotKind::Boolean);
/// assert!(Value::Cleared.is_cleared());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    /// 32-bit integer
    Int(i32),
    /// Boolean
    Boolean(bool),
    /// Object reference
    Reference(ObjectRef),
    /// Uninitialized marker
    #[default]
    Cleared,
}

impl Value {
    /// The slot kind of this value
    pub fn kind(&self) -> SlotKind {
        match self {
            Value::Int(_) => SlotKind::Int,
            Value::Boolean(_) => SlotKind::Boolean,
            Value::Reference(_) => SlotKind::Reference,
            Value::Cleared => SlotKind::Cleared,
        }
    }

    /// Integer payload, if this is an integer
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Boolean payload, if this is a boolean
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Reference payload, if this is a reference
    pub fn as_reference(&self) -> Option<&ObjectRef> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Whether this slot has been cleared
    pub fn is_cleared(&self) -> bool {
        matches!(self, Value::Cleared)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<ObjectRef> for Value {
    fn from(r: ObjectRef) -> Self {
        Value::Reference(r)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Reference(r) => match r.downcast_ref::<String>() {
                Some(s) => write!(f, "{:?}", s),
                None => write!(f, "{:?}", r),
            },
            Value::Cleared => f.write_str("<cleared>"),
        }
    }
}
