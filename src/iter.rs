//! Iteration over live entries.
//!
//! `DictIterator` is detached from the dictionary borrow so callers can
//! mutate between steps. It comes in two modes:
//! - safe: counted in `Dict::iterators`; opportunistic rehash steps are
//!   paused until it is released, so table geometry stays put.
//! - unsafe: only `next_entry` may be called while it is live. A
//!   fingerprint taken at creation is re-checked at release and a mismatch
//!   is reported as `DictError::IteratorMisuse`.
//!
//! Iterators are linear: dropping one without `Dict::release_iterator`
//! panics.
//!
//! `Iter` is the borrowing alternative; the borrow checker rules out
//! mutation for its lifetime.

use crate::dict::Dict;
use crate::dict_type::DictType;
use crate::error::DictError;
use crate::table::{Entry, EntryId, Value};
use slotmap::DefaultKey;
use tracing::error;

pub struct DictIterator {
    owner: u64,
    table: usize,
    /// Bucket last loaded; `None` before the first step.
    index: Option<usize>,
    entry: Option<DefaultKey>,
    next_entry: Option<DefaultKey>,
    safe: bool,
    fingerprint: u64,
}

impl DictIterator {
    fn new(owner: u64, safe: bool, fingerprint: u64) -> Self {
        Self {
            owner,
            table: 0,
            index: None,
            entry: None,
            next_entry: None,
            safe,
            fingerprint,
        }
    }

    pub fn is_safe(&self) -> bool {
        self.safe
    }
}

impl Drop for DictIterator {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            panic!("DictIterator dropped without Dict::release_iterator");
        }
    }
}

impl<T: DictType> Dict<T> {
    /// Unsafe iterator: the dictionary must not change until it is released.
    pub fn iterator(&self) -> DictIterator {
        DictIterator::new(self.id, false, self.fingerprint())
    }

    /// Safe iterator: mutation is allowed while it is live.
    pub fn safe_iterator(&mut self) -> DictIterator {
        self.iterators += 1;
        DictIterator::new(self.id, true, 0)
    }

    pub fn next_entry(&self, iter: &mut DictIterator) -> Option<EntryId> {
        debug_assert_eq!(iter.owner, self.id, "iterator used with another dictionary");
        loop {
            match iter.entry {
                None => {
                    let mut index = iter.index.map_or(0, |i| i + 1);
                    if index >= self.ht[iter.table].size {
                        if self.is_rehashing() && iter.table == 0 {
                            iter.table = 1;
                            index = 0;
                            if self.ht[1].size == 0 {
                                iter.index = Some(index);
                                return None;
                            }
                        } else {
                            iter.index = Some(index);
                            return None;
                        }
                    }
                    iter.index = Some(index);
                    iter.entry = self.ht[iter.table].table[index];
                }
                Some(cur) => {
                    // Under a safe iterator the look-ahead may have been
                    // deleted; re-read the link from the current entry while
                    // it is still live.
                    iter.entry = match iter.next_entry {
                        Some(k) if self.entries.contains_key(k) => Some(k),
                        Some(_) => self.entries.get(cur).and_then(|e| e.next),
                        None => None,
                    };
                }
            }
            if let Some(k) = iter.entry {
                iter.next_entry = self.entries.get(k).and_then(|e| e.next);
                return Some(EntryId::new(k));
            }
        }
    }

    pub fn release_iterator(&mut self, iter: DictIterator) -> Result<(), DictError> {
        let (safe, fingerprint) = (iter.safe, iter.fingerprint);
        debug_assert_eq!(iter.owner, self.id, "iterator released to another dictionary");
        core::mem::forget(iter);

        if safe {
            debug_assert!(self.iterators > 0);
            self.iterators = self.iterators.saturating_sub(1);
            return Ok(());
        }
        if fingerprint != self.fingerprint() {
            error!(
                dict = self.id,
                "dictionary mutated while an unsafe iterator was live"
            );
            if cfg!(debug_assertions) {
                panic!("dictionary mutated while an unsafe iterator was live");
            }
            return Err(DictError::IteratorMisuse);
        }
        Ok(())
    }

    /// Digest of both tables' identity, size and population. Any insert,
    /// delete or resize changes it.
    pub(crate) fn fingerprint(&self) -> u64 {
        let integers = [
            self.ht[0].generation,
            self.ht[0].size as u64,
            self.ht[0].used as u64,
            self.ht[1].generation,
            self.ht[1].size as u64,
            self.ht[1].used as u64,
        ];
        // Thomas Wang's 64-bit mix, folded over each value in turn.
        integers.iter().fold(0u64, |hash, &i| {
            let mut hash = hash.wrapping_add(i);
            hash = (!hash).wrapping_add(hash << 21);
            hash ^= hash >> 24;
            hash = hash.wrapping_add(hash << 3).wrapping_add(hash << 8);
            hash ^= hash >> 14;
            hash = hash.wrapping_add(hash << 2).wrapping_add(hash << 4);
            hash ^= hash >> 28;
            hash.wrapping_add(hash << 31)
        })
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            dict: self,
            table: 0,
            index: 0,
            cur: None,
            remaining: self.len(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &T::Key> + '_ {
        self.iter().map(|(k, _)| k)
    }
}

/// Borrowing iterator over `(key, value)` pairs in both tables.
pub struct Iter<'a, T: DictType> {
    dict: &'a Dict<T>,
    table: usize,
    index: usize,
    cur: Option<DefaultKey>,
    remaining: usize,
}

impl<'a, T: DictType> Iterator for Iter<'a, T> {
    type Item = (&'a T::Key, &'a Value<T::Val>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(k) = self.cur {
                let e: &'a Entry<T::Key, T::Val> = &self.dict.entries[k];
                self.cur = e.next;
                self.remaining = self.remaining.saturating_sub(1);
                return Some((&e.key, &e.v));
            }
            let ht = &self.dict.ht[self.table];
            if self.index >= ht.size {
                if self.table == 0 && self.dict.is_rehashing() {
                    self.table = 1;
                    self.index = 0;
                    continue;
                }
                return None;
            }
            self.cur = ht.table[self.index];
            self.index += 1;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T: DictType> ExactSizeIterator for Iter<'a, T> {}

impl<'a, T: DictType> IntoIterator for &'a Dict<T> {
    type Item = (&'a T::Key, &'a Value<T::Val>);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
