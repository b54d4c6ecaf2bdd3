//! Incremental migration of entries from the primary to the target table.
//!
//! Work is done one bucket chain at a time so that a resize of any size is
//! paid for in small slices spread over many operations or maintenance
//! ticks. The embedding server decides how much to do per tick.

use crate::dict::Dict;
use crate::dict_type::DictType;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Buckets migrated per batch by `rehash_milliseconds`.
const REHASH_BATCH: usize = 100;

impl<T: DictType> Dict<T> {
    /// Migrate up to `n` non-empty buckets, visiting at most `n * 10` empty
    /// ones. Returns `true` while migration work remains.
    pub fn rehash(&mut self, n: usize) -> bool {
        let Some(mut idx) = self.rehash_idx else {
            return false;
        };
        let mut empty_visits = n.saturating_mul(10);

        for _ in 0..n {
            if self.ht[0].used == 0 {
                break;
            }
            // Buckets below `idx` are already empty, and `used != 0`
            // guarantees a populated one at or after it.
            debug_assert!(idx < self.ht[0].size);
            while self.ht[0].table[idx].is_none() {
                idx += 1;
                empty_visits -= 1;
                if empty_visits == 0 {
                    self.rehash_idx = Some(idx);
                    return true;
                }
            }

            let mut cur = self.ht[0].table[idx].take();
            while let Some(k) = cur {
                let entry = &mut self.entries[k];
                cur = entry.next;
                let h = self.ht[1].index_of(self.dict_type.hash(&entry.key));
                entry.next = self.ht[1].table[h];
                self.ht[1].table[h] = Some(k);
                self.ht[0].used -= 1;
                self.ht[1].used += 1;
            }
            idx += 1;
        }
        self.rehash_idx = Some(idx);

        if self.ht[0].used == 0 {
            self.ht[0] = core::mem::take(&mut self.ht[1]);
            self.rehash_idx = None;
            debug!(
                dict = self.id,
                size = self.ht[0].size,
                used = self.ht[0].used,
                "rehash complete"
            );
            return false;
        }
        true
    }

    /// Rehash in batches of 100 buckets until `ms` milliseconds have
    /// elapsed or the rehash completes. The deadline is checked between
    /// batches, never inside one. Returns the number of buckets budgeted
    /// (batches run times 100).
    pub fn rehash_milliseconds(&mut self, ms: u64) -> usize {
        let start = Instant::now();
        let budget = Duration::from_millis(ms);
        let mut rehashes = 0;
        while self.rehash(REHASH_BATCH) {
            rehashes += REHASH_BATCH;
            if start.elapsed() > budget {
                break;
            }
        }
        trace!(
            dict = self.id,
            rehashes,
            elapsed_us = start.elapsed().as_micros() as u64,
            rehashing = self.is_rehashing(),
            "timed rehash"
        );
        rehashes
    }

    /// The single opportunistic step taken by lookups and updates, skipped
    /// while a safe iterator is live.
    pub(crate) fn rehash_step(&mut self) {
        if self.iterators == 0 {
            self.rehash(1);
        }
    }
}
