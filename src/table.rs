//! Entries, their values, and the power-of-two bucket tables that chain them.
//!
//! Entries live in a generational arena owned by the dictionary; a bucket
//! head and an entry's `next` link are arena keys. A stale key never
//! resolves, so a chain walk that races a deletion ends instead of reading
//! freed memory.

use core::fmt;
use slotmap::DefaultKey;

/// Smallest allocated table.
pub const DICT_HT_INITIAL_SIZE: usize = 4;

/// Stable handle to a live entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct EntryId(DefaultKey);

impl EntryId {
    pub(crate) fn new(k: DefaultKey) -> Self {
        EntryId(k)
    }
    pub(crate) fn raw_handle(&self) -> DefaultKey {
        self.0
    }
}

/// The value slot of an entry. Which variant is in use is the caller's
/// convention; the dictionary only runs `val_dup`/`val_destructor` on `Ptr`.
#[derive(Clone, Debug, PartialEq)]
pub enum Value<V> {
    /// Freshly linked by `add_raw`, not yet populated.
    Empty,
    Ptr(V),
    U64(u64),
    S64(i64),
    F64(f64),
}

impl<V> Default for Value<V> {
    fn default() -> Self {
        Value::Empty
    }
}

impl<V> Value<V> {
    pub fn as_ptr(&self) -> Option<&V> {
        match self {
            Value::Ptr(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ptr_mut(&mut self) -> Option<&mut V> {
        match self {
            Value::Ptr(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::U64(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_s64(&self) -> Option<i64> {
        match *self {
            Value::S64(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F64(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }
}

pub struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) v: Value<V>,
    pub(crate) next: Option<DefaultKey>,
}

impl<K, V> Entry<K, V> {
    pub(crate) fn new(key: K, next: Option<DefaultKey>) -> Self {
        Self {
            key,
            v: Value::Empty,
            next,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &Value<V> {
        &self.v
    }

    pub fn val(&self) -> Option<&V> {
        self.v.as_ptr()
    }

    pub fn val_mut(&mut self) -> Option<&mut V> {
        self.v.as_ptr_mut()
    }

    pub fn set_u64_val(&mut self, u: u64) {
        self.v = Value::U64(u);
    }

    pub fn set_s64_val(&mut self, s: i64) {
        self.v = Value::S64(s);
    }

    pub fn set_f64_val(&mut self, d: f64) {
        self.v = Value::F64(d);
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Entry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("v", &self.v)
            .finish()
    }
}

/// One array of chain heads. `size == 0` means unallocated.
#[derive(Debug, Default)]
pub(crate) struct BucketTable {
    pub(crate) table: Vec<Option<DefaultKey>>,
    pub(crate) size: usize,
    pub(crate) sizemask: usize,
    pub(crate) used: usize,
    /// Stamped from the owning dictionary on allocation; stands in for the
    /// table address when fingerprinting.
    pub(crate) generation: u64,
}

impl BucketTable {
    pub(crate) fn with_size(size: usize, generation: u64) -> Self {
        debug_assert!(size.is_power_of_two() && size >= DICT_HT_INITIAL_SIZE);
        Self {
            table: vec![None; size],
            size,
            sizemask: size - 1,
            used: 0,
            generation,
        }
    }

    #[inline]
    pub(crate) fn index_of(&self, hash: u64) -> usize {
        (hash as usize) & self.sizemask
    }
}

/// Smallest power of two holding `size`, never below the initial size.
pub(crate) fn next_power(size: usize) -> usize {
    size.max(DICT_HT_INITIAL_SIZE)
        .checked_next_power_of_two()
        .unwrap_or(1 << (usize::BITS - 1))
}
