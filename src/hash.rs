//! Hash functions offered to type descriptors, and the process-wide seed
//! they consume.
//!
//! The seed is meant to be set once at startup, before any dictionary that
//! hashes through these functions holds entries. Changing it later makes
//! existing entries unreachable.

use core::sync::atomic::{AtomicU32, Ordering};

pub const DEFAULT_HASH_SEED: u32 = 5381;

static HASH_SEED: AtomicU32 = AtomicU32::new(DEFAULT_HASH_SEED);

pub fn set_hash_function_seed(seed: u32) {
    HASH_SEED.store(seed, Ordering::Relaxed);
}

pub fn hash_function_seed() -> u32 {
    HASH_SEED.load(Ordering::Relaxed)
}

/// MurmurHash2 (32-bit) over `data`, seeded with the process-wide seed.
pub fn gen_hash_function(data: &[u8]) -> u32 {
    murmur2(data, hash_function_seed())
}

/// Case-insensitive djb2 (`hash * 33 + c`) over ASCII-lowercased bytes.
pub fn gen_case_hash_function(data: &[u8]) -> u32 {
    djb2_lowercase(data, hash_function_seed())
}

/// Thomas Wang's 32-bit integer mix.
pub fn int_hash_function(mut key: u32) -> u32 {
    key = key.wrapping_add(!(key << 15));
    key ^= key >> 10;
    key = key.wrapping_add(key << 3);
    key ^= key >> 6;
    key = key.wrapping_add(!(key << 11));
    key ^= key >> 16;
    key
}

pub fn identity_hash_function(key: u32) -> u32 {
    key
}

pub(crate) fn murmur2(data: &[u8], seed: u32) -> u32 {
    const M: u32 = 0x5bd1e995;
    const R: u32 = 24;

    let mut h = seed ^ (data.len() as u32);
    let mut chunks = data.chunks_exact(4);
    for c in &mut chunks {
        let mut k = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h = h.wrapping_mul(M);
        h ^= k;
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        if tail.len() >= 3 {
            h ^= (tail[2] as u32) << 16;
        }
        if tail.len() >= 2 {
            h ^= (tail[1] as u32) << 8;
        }
        h ^= tail[0] as u32;
        h = h.wrapping_mul(M);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^= h >> 15;
    h
}

pub(crate) fn djb2_lowercase(data: &[u8], seed: u32) -> u32 {
    data.iter().fold(seed, |h, &b| {
        (h << 5)
            .wrapping_add(h)
            .wrapping_add(b.to_ascii_lowercase() as u32)
    })
}
