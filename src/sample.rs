//! Random sampling of entries, as used by eviction and expiry sweeps.

use crate::dict::Dict;
use crate::dict_type::DictType;
use crate::table::EntryId;
use rand::Rng;

/// Empty buckets tolerated in a row before `get_some_keys` jumps elsewhere
/// (or `count`, if larger).
const MIN_EMPTY_RUN: usize = 5;

impl<T: DictType> Dict<T> {
    /// A random entry: a random non-empty bucket, then a random position in
    /// its chain. Entries in long chains are therefore slightly less likely.
    pub fn get_random_key(&mut self) -> Option<EntryId> {
        if self.is_empty() {
            return None;
        }
        self.rehash_step();
        let mut rng = rand::thread_rng();

        let head = match self.rehash_idx {
            Some(idx) => {
                // Buckets of ht[0] below idx are already empty.
                let (s0, s1) = (self.ht[0].size, self.ht[1].size);
                loop {
                    let h = idx + rng.gen_range(0..s0 + s1 - idx);
                    let he = if h >= s0 {
                        self.ht[1].table[h - s0]
                    } else {
                        self.ht[0].table[h]
                    };
                    if let Some(k) = he {
                        break k;
                    }
                }
            }
            None => loop {
                let h = rng.gen::<usize>() & self.ht[0].sizemask;
                if let Some(k) = self.ht[0].table[h] {
                    break k;
                }
            },
        };

        let len = self.chain(Some(head)).count();
        self.chain(Some(head))
            .nth(rng.gen_range(0..len))
            .map(EntryId::new)
    }

    /// Up to `count` entries from a walk over consecutive buckets starting
    /// at a random position. Cheap but not uniform, and may return fewer
    /// than asked for.
    pub fn get_some_keys(&mut self, count: usize) -> Vec<EntryId> {
        let count = count.min(self.len());
        let mut found = Vec::with_capacity(count);
        if count == 0 {
            return found;
        }
        let mut maxsteps = count.saturating_mul(10);

        // Rehash work proportional to the sample size.
        for _ in 0..count {
            if !self.is_rehashing() {
                break;
            }
            self.rehash_step();
        }

        let tables = if self.is_rehashing() { 2 } else { 1 };
        let rehash_idx = self.rehash_idx.unwrap_or(0);
        let mut maxsizemask = self.ht[0].sizemask;
        if tables > 1 {
            maxsizemask = maxsizemask.max(self.ht[1].sizemask);
        }

        let mut rng = rand::thread_rng();
        let mut i = rng.gen::<usize>() & maxsizemask;
        let mut emptylen = 0;
        while found.len() < count && maxsteps > 0 {
            maxsteps -= 1;
            for j in 0..tables {
                if tables == 2 && j == 0 && i < rehash_idx {
                    // Nothing left below rehash_idx in ht[0]; if we are also
                    // past the end of ht[1], skip ahead to rehash_idx.
                    if i >= self.ht[1].size {
                        i = rehash_idx;
                    }
                    continue;
                }
                if i >= self.ht[j].size {
                    continue;
                }
                match self.ht[j].table[i] {
                    None => {
                        emptylen += 1;
                        if emptylen >= MIN_EMPTY_RUN && emptylen > count {
                            i = rng.gen::<usize>() & maxsizemask;
                            emptylen = 0;
                        }
                    }
                    Some(head) => {
                        emptylen = 0;
                        for k in self.chain(Some(head)) {
                            found.push(EntryId::new(k));
                            if found.len() == count {
                                return found;
                            }
                        }
                    }
                }
            }
            i = (i + 1) & maxsizemask;
        }
        found
    }
}
