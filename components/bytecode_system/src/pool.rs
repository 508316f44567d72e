//! Deduplicating constant pool.
//!
//! A pool starts open, accepting [`ConstantPool::add`] and
//! [`ConstantPool::reserve`]. [`ConstantPool::freeze`] (or the first call to
//! [`ConstantPool::values`]) closes it; from then on mutation fails with
//! [`PoolFrozenError`]. Indices never move once assigned.
//!
//! All mutation and the freeze transition run under one lock, so several
//! builders may intern operands into the same pool concurrently.

use core_types::PoolFrozenError;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug)]
struct PoolInner<T> {
    values: Vec<Option<T>>,
    frozen: bool,
    snapshot: Option<Arc<[Option<T>]>>,
}

impl<T> PoolInner<T> {
    fn new() -> Self {
        Self {
            values: Vec::new(),
            frozen: false,
            snapshot: None,
        }
    }
}

/// Constant pool with first-insertion deduplication.
///
/// Entries are `Option<T>`: reserved slots hold `None` until patched with
/// [`ConstantPool::set_value`].
///
/// # Examples
///
/// ```
/// use bytecode_system::ConstantPool;
///
/// let pool = ConstantPool::new();
/// let a = pool.add(10).unwrap();
/// let b = pool.add(20).unwrap();
/// assert_eq!(pool.add(10).unwrap(), a);
/// assert!(b > a);
///
/// let values = pool.values();
/// assert_eq!(&values[..], &[Some(10), Some(20)]);
/// assert!(pool.add(30).is_err());
/// ```
#[derive(Debug)]
pub struct ConstantPool<T> {
    inner: Mutex<PoolInner<T>>,
}

impl<T: Clone + PartialEq> ConstantPool<T> {
    /// Create an empty, open pool
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PoolInner::new()),
        }
    }

    /// Intern `value`, returning the index of the first equal entry or a
    /// freshly appended one.
    ///
    /// Lookup is a linear scan in insertion order so that the earliest equal
    /// entry always wins.
    pub fn add(&self, value: T) -> Result<usize, PoolFrozenError> {
        let mut inner = self.inner.lock();
        if inner.frozen {
            return Err(PoolFrozenError);
        }
        if let Some(idx) = inner
            .values
            .iter()
            .position(|existing| existing.as_ref() == Some(&value))
        {
            return Ok(idx);
        }
        inner.values.push(Some(value));
        Ok(inner.values.len() - 1)
    }

    /// Append `count` empty placeholders and return the index of the first.
    pub fn reserve(&self, count: usize) -> Result<usize, PoolFrozenError> {
        let mut inner = self.inner.lock();
        if inner.frozen {
            return Err(PoolFrozenError);
        }
        let start = inner.values.len();
        inner.values.resize(start + count, None);
        Ok(start)
    }

    /// Overwrite the entry at `offset`.
    ///
    /// There is no freeze check. A snapshot already handed out by
    /// [`ConstantPool::values`] is not affected by later writes.
    ///
    /// # Panics
    ///
    /// Panics if `offset` was never reserved or added.
    pub fn set_value(&self, offset: usize, value: T) {
        let mut inner = self.inner.lock();
        if inner.snapshot.is_some() {
            log::debug!("constant pool entry {} patched after materialization", offset);
        }
        inner.values[offset] = Some(value);
    }

    /// Close the pool to further `add`/`reserve`. Idempotent.
    pub fn freeze(&self) {
        self.inner.lock().frozen = true;
    }

    /// Whether the pool has been frozen
    pub fn is_frozen(&self) -> bool {
        self.inner.lock().frozen
    }

    /// Freeze the pool and return its immutable contents.
    ///
    /// The array is materialized once; later calls return the same `Arc`.
    pub fn values(&self) -> Arc<[Option<T>]> {
        let mut inner = self.inner.lock();
        inner.frozen = true;
        if let Some(snapshot) = &inner.snapshot {
            return Arc::clone(snapshot);
        }
        let snapshot: Arc<[Option<T>]> = Arc::from(inner.values.as_slice());
        inner.snapshot = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Discard all entries and reopen the pool
    pub fn reset(&self) {
        *self.inner.lock() = PoolInner::new();
    }

    /// Number of entries, placeholders included
    pub fn len(&self) -> usize {
        self.inner.lock().values.len()
    }

    /// Whether the pool holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + PartialEq> Default for ConstantPool<T> {
    fn default() -> Self {
        Self::new()
    }
}
