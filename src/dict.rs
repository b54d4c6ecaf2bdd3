//! Dict: two chained bucket tables over one entry arena, with CRUD,
//! expansion policy and explicit resizing.

use crate::config::DictConfig;
use crate::dict_type::DictType;
use crate::error::DictError;
use crate::table::{next_power, BucketTable, Entry, EntryId, Value, DICT_HT_INITIAL_SIZE};
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use slotmap::{DefaultKey, SlotMap};
use tracing::{debug, warn};

static NEXT_DICT_ID: AtomicU64 = AtomicU64::new(1);

/// Buckets cleared between two invocations of the `empty` callback.
const EMPTY_CALLBACK_PERIOD: usize = 65536;

impl EntryId {
    pub fn key<'a, T: DictType>(&self, d: &'a Dict<T>) -> Option<&'a T::Key> {
        d.entry(*self).map(|e| e.key())
    }

    pub fn value<'a, T: DictType>(&self, d: &'a Dict<T>) -> Option<&'a Value<T::Val>> {
        d.entry(*self).map(|e| e.value())
    }

    pub fn val<'a, T: DictType>(&self, d: &'a Dict<T>) -> Option<&'a T::Val> {
        d.entry(*self).and_then(|e| e.val())
    }
}

/// Outcome of `Dict::add_raw`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AddRaw {
    /// A new entry was linked with `Value::Empty`, ready to be populated.
    New(EntryId),
    /// The key was already present; nothing changed.
    Existing(EntryId),
}

impl AddRaw {
    pub fn id(self) -> EntryId {
        match self {
            AddRaw::New(id) | AddRaw::Existing(id) => id,
        }
    }
}

pub struct Dict<T: DictType> {
    pub(crate) dict_type: T,
    pub(crate) privdata: T::PrivData,
    pub(crate) ht: [BucketTable; 2],
    /// Next bucket of `ht[0]` to migrate; `None` when not rehashing.
    pub(crate) rehash_idx: Option<usize>,
    /// Live safe iterators.
    pub(crate) iterators: usize,
    pub(crate) entries: SlotMap<DefaultKey, Entry<T::Key, T::Val>>,
    pub(crate) config: DictConfig,
    next_generation: u64,
    pub(crate) id: u64,
}

impl<T: DictType> Dict<T> {
    /// Create an empty dictionary. No table is allocated until the first
    /// insert.
    pub fn new(dict_type: T, privdata: T::PrivData) -> Self {
        Self::with_config(dict_type, privdata, DictConfig::default())
    }

    pub fn with_config(dict_type: T, privdata: T::PrivData, config: DictConfig) -> Self {
        Self {
            dict_type,
            privdata,
            ht: [BucketTable::default(), BucketTable::default()],
            rehash_idx: None,
            iterators: 0,
            entries: SlotMap::with_key(),
            config,
            next_generation: 1,
            id: NEXT_DICT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.ht[0].used + self.ht[1].used
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocated buckets across both tables.
    pub fn slots(&self) -> usize {
        self.ht[0].size + self.ht[1].size
    }

    /// Bucket count of table 0 (primary) or 1 (rehash target).
    pub fn table_size(&self, table: usize) -> usize {
        self.ht[table].size
    }

    pub fn is_rehashing(&self) -> bool {
        self.rehash_idx.is_some()
    }

    pub fn rehash_index(&self) -> Option<usize> {
        self.rehash_idx
    }

    /// Number of live safe iterators. Unsafe iterators are not counted: they
    /// do no bookkeeping and are policed by their fingerprint instead, so
    /// creating one needs only `&self`.
    pub fn iterators(&self) -> usize {
        self.iterators
    }

    pub fn dict_type(&self) -> &T {
        &self.dict_type
    }

    pub fn privdata(&self) -> &T::PrivData {
        &self.privdata
    }

    pub fn config(&self) -> &DictConfig {
        &self.config
    }

    pub fn entry(&self, id: EntryId) -> Option<&Entry<T::Key, T::Val>> {
        self.entries.get(id.raw_handle())
    }

    pub fn entry_mut(&mut self, id: EntryId) -> Option<&mut Entry<T::Key, T::Val>> {
        self.entries.get_mut(id.raw_handle())
    }

    /// Store `val` (through `val_dup`) in the entry and hand back the value
    /// it replaces. `None` if the handle is stale.
    pub fn set_val(&mut self, id: EntryId, val: T::Val) -> Option<Value<T::Val>> {
        let e = self.entries.get_mut(id.raw_handle())?;
        let val = self.dict_type.val_dup(&self.privdata, val);
        Some(core::mem::replace(&mut e.v, Value::Ptr(val)))
    }

    pub fn add(&mut self, key: T::Key, val: T::Val) -> Result<EntryId, DictError> {
        match self.add_raw(key) {
            AddRaw::Existing(_) => Err(DictError::KeyExists),
            AddRaw::New(id) => {
                self.set_val(id, val);
                Ok(id)
            }
        }
    }

    /// Return the entry for `key`, linking an empty one if it is absent.
    pub fn add_raw(&mut self, key: T::Key) -> AddRaw {
        self.rehash_step();
        self.expand_if_needed();

        let hash = self.dict_type.hash(&key);
        if let Some(k) = self.find_in_tables(&key, hash) {
            return AddRaw::Existing(EntryId::new(k));
        }

        // While rehashing, new entries go straight to the target table.
        let t = if self.is_rehashing() { 1 } else { 0 };
        let key = self.dict_type.key_dup(&self.privdata, key);
        let idx = self.ht[t].index_of(hash);
        let head = self.ht[t].table[idx];
        let k = self.entries.insert(Entry::new(key, head));
        self.ht[t].table[idx] = Some(k);
        self.ht[t].used += 1;
        AddRaw::New(EntryId::new(k))
    }

    /// Insert or overwrite. Returns `true` if the key was newly added. The
    /// new value is stored before the old one is destroyed.
    pub fn replace(&mut self, key: T::Key, val: T::Val) -> bool {
        match self.add_raw(key) {
            AddRaw::New(id) => {
                self.set_val(id, val);
                true
            }
            AddRaw::Existing(id) => {
                if let Some(Value::Ptr(old)) = self.set_val(id, val) {
                    self.dict_type.val_destructor(&self.privdata, old);
                }
                false
            }
        }
    }

    /// Find-or-add without touching the value.
    pub fn replace_raw(&mut self, key: T::Key) -> EntryId {
        self.add_raw(key).id()
    }

    pub fn find(&mut self, key: &T::Key) -> Option<EntryId> {
        if self.ht[0].size == 0 {
            return None;
        }
        self.rehash_step();
        let hash = self.dict_type.hash(key);
        self.find_in_tables(key, hash).map(EntryId::new)
    }

    pub fn fetch_value(&mut self, key: &T::Key) -> Option<&T::Val> {
        let id = self.find(key)?;
        self.entries.get(id.raw_handle()).and_then(|e| e.val())
    }

    /// Lookup without the opportunistic rehash step.
    pub fn get(&self, key: &T::Key) -> Option<&Entry<T::Key, T::Val>> {
        if self.ht[0].size == 0 {
            return None;
        }
        let hash = self.dict_type.hash(key);
        self.find_in_tables(key, hash)
            .and_then(|k| self.entries.get(k))
    }

    pub fn contains_key(&self, key: &T::Key) -> bool {
        self.get(key).is_some()
    }

    /// Remove `key`, running the key and value destructors.
    pub fn delete(&mut self, key: &T::Key) -> Result<(), DictError> {
        let entry = self.unlink(key)?;
        self.free_entry(entry);
        Ok(())
    }

    /// Remove `key` without destroying it; ownership of the key and value
    /// passes to the caller.
    pub fn delete_no_free(&mut self, key: &T::Key) -> Result<(T::Key, Value<T::Val>), DictError> {
        let entry = self.unlink(key)?;
        Ok((entry.key, entry.v))
    }

    fn unlink(&mut self, key: &T::Key) -> Result<Entry<T::Key, T::Val>, DictError> {
        if self.ht[0].size == 0 {
            return Err(DictError::KeyNotFound);
        }
        self.rehash_step();
        let hash = self.dict_type.hash(key);

        for t in 0..=1 {
            let idx = self.ht[t].index_of(hash);
            let mut prev: Option<DefaultKey> = None;
            let mut cur = self.ht[t].table[idx];
            while let Some(k) = cur {
                let e = &self.entries[k];
                let next = e.next;
                if self.dict_type.key_compare(&self.privdata, key, &e.key) {
                    match prev {
                        Some(p) => self.entries[p].next = next,
                        None => self.ht[t].table[idx] = next,
                    }
                    self.ht[t].used -= 1;
                    return self.entries.remove(k).ok_or(DictError::KeyNotFound);
                }
                prev = cur;
                cur = next;
            }
            if !self.is_rehashing() {
                break;
            }
        }
        Err(DictError::KeyNotFound)
    }

    /// Destroy every entry and free both tables. `callback`, if given, is
    /// called with the private data every 65536 buckets so a server can keep
    /// serving during a very large clear.
    pub fn empty(&mut self, mut callback: Option<&mut dyn FnMut(&T::PrivData)>) {
        for t in 0..=1 {
            let table = core::mem::take(&mut self.ht[t]);
            for (i, head) in table.table.into_iter().enumerate() {
                if i % EMPTY_CALLBACK_PERIOD == 0 {
                    if let Some(cb) = callback.as_deref_mut() {
                        cb(&self.privdata);
                    }
                }
                let mut cur = head;
                while let Some(k) = cur {
                    match self.entries.remove(k) {
                        Some(e) => {
                            cur = e.next;
                            self.free_entry(e);
                        }
                        None => break,
                    }
                }
            }
        }
        self.rehash_idx = None;
    }

    /// Tear the dictionary down, running destructors for every entry.
    pub fn release(self) {
        drop(self);
    }

    /// Pre-size to the smallest power of two holding `max(size, len())`.
    pub fn resize(&mut self, size: usize) -> Result<(), DictError> {
        if !self.config.resize.allows_resize() {
            return Err(DictError::ResizeDisabled);
        }
        if self.is_rehashing() {
            return Err(DictError::AlreadyRehashing);
        }
        self.expand(size)
    }

    /// Shrink (or grow) to the smallest table holding every entry.
    pub fn shrink_to_fit(&mut self) -> Result<(), DictError> {
        if !self.config.resize.allows_resize() {
            return Err(DictError::ResizeDisabled);
        }
        if self.is_rehashing() {
            return Err(DictError::AlreadyRehashing);
        }
        self.expand(self.ht[0].used.max(DICT_HT_INITIAL_SIZE))
    }

    /// Allocate a table for at least `max(size, len())` entries, ignoring the
    /// resize policy. The first allocation becomes the primary table; later
    /// ones start a rehash.
    pub fn expand(&mut self, size: usize) -> Result<(), DictError> {
        if self.is_rehashing() {
            return Err(DictError::AlreadyRehashing);
        }
        let realsize = next_power(size.max(self.ht[0].used));
        if realsize == self.ht[0].size {
            return Ok(());
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        let table = BucketTable::with_size(realsize, generation);

        if self.ht[0].size == 0 {
            self.ht[0] = table;
            return Ok(());
        }
        debug!(
            dict = self.id,
            from = self.ht[0].size,
            to = realsize,
            used = self.ht[0].used,
            "starting incremental rehash"
        );
        self.ht[1] = table;
        self.rehash_idx = Some(0);
        Ok(())
    }

    fn expand_if_needed(&mut self) {
        if self.is_rehashing() {
            return;
        }
        if self.ht[0].size == 0 {
            let _ = self.expand(DICT_HT_INITIAL_SIZE);
            return;
        }
        let used = self.ht[0].used;
        let size = self.ht[0].size;
        if used < size {
            return;
        }
        let allowed = self.config.resize.allows_resize();
        let forced = used / size > self.config.force_resize_ratio;
        if !allowed && !forced {
            return;
        }
        if !allowed {
            warn!(
                dict = self.id,
                used,
                size,
                "load factor past force ratio, expanding with resize disabled"
            );
        }
        let _ = self.expand(used.saturating_mul(2));
    }

    pub(crate) fn find_in_tables(&self, key: &T::Key, hash: u64) -> Option<DefaultKey> {
        for t in 0..=1 {
            let ht = &self.ht[t];
            if ht.size == 0 {
                return None;
            }
            let mut cur = ht.table[ht.index_of(hash)];
            while let Some(k) = cur {
                let e = &self.entries[k];
                if self.dict_type.key_compare(&self.privdata, key, &e.key) {
                    return Some(k);
                }
                cur = e.next;
            }
            if !self.is_rehashing() {
                break;
            }
        }
        None
    }

    /// Arena keys of the chain starting at `head`.
    pub(crate) fn chain(&self, head: Option<DefaultKey>) -> impl Iterator<Item = DefaultKey> + '_ {
        core::iter::successors(head, move |&k| self.entries.get(k).and_then(|e| e.next))
    }

    fn free_entry(&self, entry: Entry<T::Key, T::Val>) {
        self.dict_type.key_destructor(&self.privdata, entry.key);
        if let Value::Ptr(v) = entry.v {
            self.dict_type.val_destructor(&self.privdata, v);
        }
    }
}

impl<T: DictType> Drop for Dict<T> {
    fn drop(&mut self) {
        self.empty(None);
    }
}

impl<T: DictType> fmt::Debug for Dict<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dict")
            .field("len", &self.len())
            .field("sizes", &[self.ht[0].size, self.ht[1].size])
            .field("rehash_idx", &self.rehash_idx)
            .field("iterators", &self.iterators)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResizePolicy;
    use crate::dict_type::StringKeys;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn dict() -> Dict<StringKeys<i32>> {
        Dict::with_config(
            StringKeys::new(),
            (),
            DictConfig::default().with_resize(ResizePolicy::Enabled),
        )
    }

    fn s(k: &str) -> String {
        k.to_string()
    }

    /// Descriptor recording every destructor call in its private data.
    struct Tracked;
    impl DictType for Tracked {
        type Key = String;
        type Val = i32;
        type PrivData = Rc<RefCell<Vec<String>>>;

        fn hash(&self, key: &String) -> u64 {
            crate::hash::murmur2(key.as_bytes(), 0) as u64
        }
        fn key_destructor(&self, log: &Self::PrivData, key: String) {
            log.borrow_mut().push(format!("key:{key}"));
        }
        fn val_destructor(&self, log: &Self::PrivData, val: i32) {
            log.borrow_mut().push(format!("val:{val}"));
        }
    }

    #[test]
    fn tables_are_allocated_lazily() {
        let mut d = dict();
        assert_eq!(d.slots(), 0);
        assert!(d.find(&s("x")).is_none());
        assert_eq!(d.delete(&s("x")), Err(DictError::KeyNotFound));
        d.add(s("x"), 1).unwrap();
        assert_eq!(d.table_size(0), DICT_HT_INITIAL_SIZE);
        assert!(!d.is_rehashing());
    }

    #[test]
    fn add_existing_key_is_rejected_without_change() {
        let mut d = dict();
        let id = d.add(s("a"), 1).unwrap();
        assert_eq!(d.add(s("a"), 3), Err(DictError::KeyExists));
        assert_eq!(d.fetch_value(&s("a")), Some(&1));
        assert_eq!(id.val(&d), Some(&1));
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn add_raw_links_empty_entry_then_reports_existing() {
        let mut d = dict();
        let id = match d.add_raw(s("k")) {
            AddRaw::New(id) => id,
            other => panic!("unexpected: {:?}", other),
        };
        assert!(id.value(&d).unwrap().is_empty());
        d.entry_mut(id).unwrap().set_s64_val(-4);
        assert_eq!(d.add_raw(s("k")), AddRaw::Existing(id));
        assert_eq!(d.get(&s("k")).unwrap().value().as_s64(), Some(-4));
    }

    #[test]
    fn replace_keeps_entry_identity_and_destroys_old_value() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut d = Dict::new(Tracked, log.clone());
        assert!(d.replace(s("a"), 1));
        let id = d.find(&s("a")).unwrap();
        assert!(!d.replace(s("a"), 2));
        assert_eq!(d.find(&s("a")), Some(id));
        assert_eq!(d.fetch_value(&s("a")), Some(&2));
        assert_eq!(*log.borrow(), vec!["val:1".to_string()]);
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn delete_runs_destructors_and_no_free_hands_back_ownership() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut d = Dict::new(Tracked, log.clone());
        d.add(s("a"), 1).unwrap();
        d.add(s("b"), 2).unwrap();

        d.delete(&s("a")).unwrap();
        assert_eq!(*log.borrow(), vec!["key:a".to_string(), "val:1".to_string()]);

        let (k, v) = d.delete_no_free(&s("b")).unwrap();
        assert_eq!(k, "b");
        assert_eq!(v, Value::Ptr(2));
        assert_eq!(log.borrow().len(), 2);
        assert!(d.is_empty());

        assert_eq!(d.delete(&s("b")), Err(DictError::KeyNotFound));
        assert_eq!(d.delete(&s("b")), Err(DictError::KeyNotFound));
    }

    #[test]
    fn fifth_insert_into_size_four_starts_rehash() {
        let mut d = dict();
        for (i, k) in ["a", "b", "c", "d"].iter().enumerate() {
            d.add(s(k), i as i32).unwrap();
        }
        assert_eq!(d.table_size(0), 4);
        assert!(!d.is_rehashing());

        d.add(s("e"), 4).unwrap();
        assert_eq!(d.len(), 5);
        assert!(d.is_rehashing());
        assert_eq!(d.rehash_index(), Some(0));
        assert_eq!(d.table_size(1), 8);
        for k in ["a", "b", "c", "d", "e"] {
            assert!(d.contains_key(&s(k)), "{k} lost while rehashing");
        }
    }

    #[test]
    fn find_probes_both_tables_mid_rehash() {
        let mut d = dict();
        for i in 0..64 {
            d.add(format!("k{i}"), i).unwrap();
        }
        // Interleave single steps with lookups until the rehash finishes.
        while d.is_rehashing() {
            for i in 0..64 {
                assert_eq!(d.get(&format!("k{i}")).and_then(|e| e.val()), Some(&i));
            }
            d.rehash(1);
        }
        assert_eq!(d.len(), 64);
    }

    #[test]
    fn resize_is_advisory_while_rehashing_or_disabled() {
        let mut d = Dict::with_config(
            StringKeys::<i32>::new(),
            (),
            DictConfig::default().with_resize(ResizePolicy::Disabled),
        );
        d.add(s("a"), 1).unwrap();
        assert_eq!(d.resize(100), Err(DictError::ResizeDisabled));
        assert_eq!(d.shrink_to_fit(), Err(DictError::ResizeDisabled));

        let mut d = dict();
        d.add(s("a"), 1).unwrap();
        d.add(s("b"), 2).unwrap();
        d.resize(1000).unwrap();
        assert_eq!(d.table_size(1), 1024);
        assert_eq!(d.resize(10), Err(DictError::AlreadyRehashing));
        assert_eq!(d.expand(10), Err(DictError::AlreadyRehashing));
    }

    #[test]
    fn resize_to_current_size_is_a_no_op() {
        let mut d = dict();
        d.add(s("a"), 1).unwrap();
        d.resize(3).unwrap();
        assert!(!d.is_rehashing());
        assert_eq!(d.table_size(0), 4);
    }

    #[test]
    fn shrink_to_fit_after_mass_delete() {
        let mut d = dict();
        for i in 0..100 {
            d.add(format!("k{i}"), i).unwrap();
        }
        while d.rehash(100) {}
        for i in 0..95 {
            d.delete(&format!("k{i}")).unwrap();
        }
        while d.rehash(100) {}
        assert!(d.table_size(0) >= 128);
        d.shrink_to_fit().unwrap();
        while d.rehash(100) {}
        assert_eq!(d.table_size(0), 8);
        for i in 95..100 {
            assert_eq!(d.fetch_value(&format!("k{i}")), Some(&i));
        }
    }

    #[test]
    fn forced_expansion_bounds_load_factor_with_resize_disabled() {
        let config = DictConfig::default().with_resize(ResizePolicy::Disabled);
        let mut d = Dict::with_config(StringKeys::<i32>::new(), (), config);
        for i in 0..2000 {
            d.add(format!("k{i}"), i).unwrap();
            while d.rehash(100) {}
            let size = d.table_size(0);
            assert!(
                d.len() <= (config.force_resize_ratio + 1) * size,
                "len {} exceeds bound for size {}",
                d.len(),
                size
            );
        }
        // Growth was deferred well past a 1:1 load factor.
        assert!(d.len() > d.table_size(0));
    }

    #[test]
    fn empty_resets_and_calls_back_per_period() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut d = Dict::new(Tracked, log.clone());
        for i in 0..10 {
            d.add(format!("k{i}"), i).unwrap();
        }
        let mut calls = 0;
        let mut cb = |_: &Rc<RefCell<Vec<String>>>| calls += 1;
        d.empty(Some(&mut cb));
        // Bucket 0 of each allocated table.
        assert!(calls >= 1);
        assert!(d.is_empty());
        assert_eq!(d.slots(), 0);
        assert!(!d.is_rehashing());
        assert_eq!(log.borrow().len(), 20);

        d.add(s("again"), 1).unwrap();
        assert_eq!(d.fetch_value(&s("again")), Some(&1));
    }

    #[test]
    fn drop_runs_destructors_for_remaining_entries() {
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let mut d = Dict::new(Tracked, log.clone());
            d.add(s("x"), 7).unwrap();
            d.add(s("y"), 8).unwrap();
            d.release();
        }
        let mut seen = log.borrow().clone();
        seen.sort();
        assert_eq!(seen, vec!["key:x", "key:y", "val:7", "val:8"]);
    }

    #[test]
    fn key_dup_is_applied_on_insert() {
        struct Upper;
        impl DictType for Upper {
            type Key = String;
            type Val = ();
            type PrivData = ();
            fn hash(&self, key: &String) -> u64 {
                crate::hash::djb2_lowercase(key.as_bytes(), 0) as u64
            }
            fn key_dup(&self, _: &(), key: String) -> String {
                key.to_ascii_uppercase()
            }
            fn key_compare(&self, _: &(), a: &String, b: &String) -> bool {
                a.eq_ignore_ascii_case(b)
            }
        }
        let mut d = Dict::new(Upper, ());
        let id = d.add(s("abc"), ()).unwrap();
        assert_eq!(id.key(&d).map(String::as_str), Some("ABC"));
        assert!(d.contains_key(&s("aBc")));
    }
}
