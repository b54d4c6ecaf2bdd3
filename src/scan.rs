//! Stateless, resize-tolerant traversal driven by an opaque cursor.
//!
//! The cursor is a bucket index incremented in bit-reversed order: the
//! high bits are bumped first. Since table sizes are powers of two, a bucket
//! of a table of size `2^n` maps to the buckets of a `2^(n+k)` table that
//! share its low `n` bits, and reversed increment visits all of those
//! expansions before moving on. So growing the table between calls never
//! revisits a fully covered bucket's expansions, and shrinking it at most
//! revisits some entries. Every entry present for the whole scan is visited
//! at least once.
//!
//! While rehashing, the smaller table's bucket is visited and then every
//! bucket of the larger table that folds into it.

use crate::dict::Dict;
use crate::dict_type::DictType;
use crate::table::{BucketTable, Entry};

impl<T: DictType> Dict<T> {
    /// Visit the bucket(s) addressed by `cursor` and return the next cursor.
    /// Start with 0; a returned 0 means the scan is complete.
    pub fn scan<F>(&self, cursor: u64, mut visitor: F) -> u64
    where
        F: FnMut(&T::PrivData, &Entry<T::Key, T::Val>),
    {
        if self.is_empty() {
            return 0;
        }

        let mut v = cursor;
        let m0;
        if !self.is_rehashing() {
            let t0 = &self.ht[0];
            m0 = t0.sizemask as u64;
            self.scan_bucket(t0, v & m0, &mut visitor);
        } else {
            let (t0, t1) = if self.ht[0].size <= self.ht[1].size {
                (&self.ht[0], &self.ht[1])
            } else {
                (&self.ht[1], &self.ht[0])
            };
            m0 = t0.sizemask as u64;
            let m1 = t1.sizemask as u64;

            self.scan_bucket(t0, v & m0, &mut visitor);
            loop {
                self.scan_bucket(t1, v & m1, &mut visitor);
                // Increment the bits of the larger mask not covered by the
                // smaller one.
                v = ((v | m0).wrapping_add(1) & !m0) | (v & m0);
                if v & (m0 ^ m1) == 0 {
                    break;
                }
            }
        }

        // Saturate the unmasked bits so the reversed increment carries into
        // the masked ones.
        v |= !m0;
        v.reverse_bits().wrapping_add(1).reverse_bits()
    }

    fn scan_bucket<F>(&self, ht: &BucketTable, idx: u64, visitor: &mut F)
    where
        F: FnMut(&T::PrivData, &Entry<T::Key, T::Val>),
    {
        for k in self.chain(ht.table[idx as usize]) {
            visitor(&self.privdata, &self.entries[k]);
        }
    }
}
