//! Key partitioning.
//!
//! Uses the murmur2 variant of Kafka's default partitioner, so a key maps to
//! the same partition number a Kafka producer would pick.

use std::num::NonZeroU32;

const SEED: u32 = 0x9747_b28c;
const M: u32 = 0x5bd1_e995;
const R: u32 = 24;

/// Computes the 32-bit murmur2 hash of `data`.
#[must_use]
pub fn murmur2(data: &[u8]) -> i32 {
    // Kafka truncates the length to 32 bits as well.
    #[allow(clippy::cast_possible_truncation)]
    let mut h = SEED ^ (data.len() as u32);

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h = h.wrapping_mul(M);
        h ^= k;
    }

    let tail = chunks.remainder();
    if tail.len() >= 3 {
        h ^= u32::from(tail[2]) << 16;
    }
    if tail.len() >= 2 {
        h ^= u32::from(tail[1]) << 8;
    }
    if let Some(&first) = tail.first() {
        h ^= u32::from(first);
        h = h.wrapping_mul(M);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^= h >> 15;

    i32::from_ne_bytes(h.to_ne_bytes())
}

/// Maps `key` onto one of `partitions` partitions.
#[must_use]
pub fn partition_for(key: &[u8], partitions: NonZeroU32) -> u32 {
    let positive = u32::from_ne_bytes((murmur2(key) & 0x7fff_ffff).to_ne_bytes());
    positive % partitions.get()
}
