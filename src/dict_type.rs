//! Type descriptors: the capability bundle that tells a `Dict` how to hash,
//! copy, compare and destroy its keys and values.
//!
//! Every callback except `hash` receives the dictionary's private data,
//! which the dictionary itself never interprets.

use crate::hash::{gen_case_hash_function, gen_hash_function};
use core::hash::{BuildHasher, Hash};
use core::marker::PhantomData;
use hashbrown::hash_map::DefaultHashBuilder;

pub trait DictType {
    type Key: PartialEq;
    type Val;
    type PrivData;

    fn hash(&self, key: &Self::Key) -> u64;

    /// Transform a key on its way into the dictionary. Identity by default.
    fn key_dup(&self, _privdata: &Self::PrivData, key: Self::Key) -> Self::Key {
        key
    }

    /// Transform a value on its way into the dictionary. Identity by default.
    fn val_dup(&self, _privdata: &Self::PrivData, val: Self::Val) -> Self::Val {
        val
    }

    /// Key equality. Defaults to `PartialEq`; override for looser
    /// matching such as case folding.
    fn key_compare(&self, _privdata: &Self::PrivData, a: &Self::Key, b: &Self::Key) -> bool {
        a == b
    }

    fn key_destructor(&self, _privdata: &Self::PrivData, key: Self::Key) {
        drop(key);
    }

    fn val_destructor(&self, _privdata: &Self::PrivData, val: Self::Val) {
        drop(val);
    }
}

/// Binary-safe string keys hashed with the seeded MurmurHash2.
pub struct StringKeys<V> {
    _pd: PhantomData<fn() -> V>,
}

impl<V> StringKeys<V> {
    pub fn new() -> Self {
        Self { _pd: PhantomData }
    }
}

impl<V> Default for StringKeys<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> DictType for StringKeys<V> {
    type Key = String;
    type Val = V;
    type PrivData = ();

    fn hash(&self, key: &String) -> u64 {
        gen_hash_function(key.as_bytes()) as u64
    }
}

/// String keys compared and hashed without regard to ASCII case, as used for
/// command tables.
pub struct CaseInsensitiveKeys<V> {
    _pd: PhantomData<fn() -> V>,
}

impl<V> CaseInsensitiveKeys<V> {
    pub fn new() -> Self {
        Self { _pd: PhantomData }
    }
}

impl<V> Default for CaseInsensitiveKeys<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> DictType for CaseInsensitiveKeys<V> {
    type Key = String;
    type Val = V;
    type PrivData = ();

    fn hash(&self, key: &String) -> u64 {
        gen_case_hash_function(key.as_bytes()) as u64
    }

    fn key_compare(&self, _: &(), a: &String, b: &String) -> bool {
        a.eq_ignore_ascii_case(b)
    }
}

/// Any `K: Hash + Eq`, hashed through a `BuildHasher`.
pub struct HashedKeys<K, V, S = DefaultHashBuilder> {
    hasher: S,
    _pd: PhantomData<fn() -> (K, V)>,
}

impl<K, V> HashedKeys<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V> Default for HashedKeys<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HashedKeys<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            _pd: PhantomData,
        }
    }
}

impl<K, V, S> DictType for HashedKeys<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    type Key = K;
    type Val = V;
    type PrivData = ();

    fn hash(&self, key: &K) -> u64 {
        self.hasher.hash_one(key)
    }
}
