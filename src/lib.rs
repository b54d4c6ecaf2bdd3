//! rehash-dict: an in-memory chained hash table that grows and shrinks by
//! incremental rehashing, for latency-sensitive single-threaded servers.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a dictionary whose resize cost is never paid in one operation.
//!   A resize allocates a second table and entries migrate one bucket at a
//!   time, piggybacked on ordinary operations or driven by a timed
//!   maintenance call.
//! - Pieces:
//!   - `table`: entries, tagged values and power-of-two bucket tables.
//!   - `dict`: the two-table `Dict<T>`, CRUD, expansion policy, resizing.
//!   - `rehash`: bucket-at-a-time migration with bounded empty visits.
//!   - `iter`: detached safe/unsafe iterators plus a borrowing `Iter`.
//!   - `scan`: cursor-driven traversal that tolerates resizes between calls.
//!   - `sample`: random entry selection for eviction-style sampling.
//!   - `stats`: chain-length report.
//!
//! Constraints
//! - Single-threaded: every mutating call takes `&mut self`; nothing is
//!   synchronised internally.
//! - Entries live in a generational arena and chains link arena keys, so
//!   bucket manipulation is safe Rust and stale links never resolve.
//! - Table sizes are powers of two; the first table is allocated lazily on
//!   first insert at `DICT_HT_INITIAL_SIZE`.
//! - While rehashing, lookups probe both tables, inserts go to the target
//!   table only, and `ht[0]` buckets below the rehash index are empty.
//!
//! Behaviour is supplied by a `DictType` descriptor (hash, dup, compare,
//! destroy) and an opaque private-data value handed to every callback.
//!
//! Process-wide state
//! - `enable_resize`/`disable_resize` toggle ordinary growth for
//!   dictionaries built with `ResizePolicy::Global`. Forced growth past
//!   `force_resize_ratio` still happens.
//! - `set_hash_function_seed` seeds `gen_hash_function` and
//!   `gen_case_hash_function`. Change it only before populating tables.
//!
//! Iterator discipline
//! - A safe iterator pauses the opportunistic rehash step until released,
//!   so mutation through the dictionary is allowed while it is live.
//! - An unsafe iterator permits only `next_entry`; mutation is detected by
//!   a fingerprint check on release.
//! - Both must be handed back with `Dict::release_iterator`.

mod config;
mod dict;
mod dict_proptest;
mod dict_type;
mod error;
mod hash;
mod iter;
mod rehash;
mod sample;
mod scan;
mod stats;
mod table;

// Public surface
pub use config::{
    disable_resize, enable_resize, resize_enabled, DictConfig, ResizePolicy, FORCE_RESIZE_RATIO,
};
pub use dict::{AddRaw, Dict};
pub use dict_type::{CaseInsensitiveKeys, DictType, HashedKeys, StringKeys};
pub use error::DictError;
pub use hash::{
    gen_case_hash_function, gen_hash_function, hash_function_seed, identity_hash_function,
    int_hash_function, set_hash_function_seed, DEFAULT_HASH_SEED,
};
pub use iter::{DictIterator, Iter};
pub use table::{Entry, EntryId, Value, DICT_HT_INITIAL_SIZE};
