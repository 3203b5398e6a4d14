//! # Bloom filter policy
//!
//! A space-efficient probabilistic membership filter, packaged as a
//! [`FilterPolicy`] so filter blocks can use it per data-block range.
//!
//! A bloom filter can tell you with certainty that a key is **not** in the
//! set (no false negatives), but may occasionally report that a key **is**
//! in the set when it isn't (false positives). With 10 bits per key the
//! false-positive rate is roughly 1%.
//!
//! ## Example
//!
//! ```rust
//! use bloom::BloomPolicy;
//! use filterblock::FilterPolicy;
//!
//! let policy = BloomPolicy::new(10);
//! let mut filter = Vec::new();
//! policy.create_filter(&[&b"hello"[..], &b"world"[..]], &mut filter);
//! assert!(policy.key_may_match(b"hello", &filter));
//! ```

use filterblock::FilterPolicy;

/// A bloom filter policy using double hashing.
///
/// Probe bits are derived as `h(i) = h + i * delta` where `h` is an FNV-1a
/// hash of the key and `delta` is a rotation of it. The generated filter is
/// the bit array followed by one byte holding the probe count, so a reader
/// does not need the policy's parameters to evaluate it.
pub struct BloomPolicy {
    /// Filter bits allocated per key.
    bits_per_key: usize,
    /// Number of probe bits per key (k).
    k: u8,
}

impl BloomPolicy {
    /// Creates a policy allocating `bits_per_key` filter bits per key.
    ///
    /// The probe count is derived as `bits_per_key * ln(2)`, rounded down
    /// and clamped to `1..=30`.
    #[must_use]
    pub fn new(bits_per_key: usize) -> Self {
        let k = (bits_per_key as f64 * 0.69) as u8;
        Self {
            bits_per_key,
            k: k.clamp(1, 30),
        }
    }

    /// Returns the probe count per key.
    #[must_use]
    pub fn num_probes(&self) -> u8 {
        self.k
    }
}

impl FilterPolicy for BloomPolicy {
    fn name(&self) -> &'static str {
        "BloomPolicy"
    }

    fn create_filter(&self, keys: &[&[u8]], dst: &mut Vec<u8>) {
        // Small filters have high false-positive rates regardless of the
        // configured ratio; 64 bits is the floor.
        let bits = (keys.len() * self.bits_per_key).max(64);
        let bytes = (bits + 7) / 8;
        let bits = (bytes * 8) as u64;

        let init = dst.len();
        dst.resize(init + bytes, 0);
        for key in keys {
            let mut h = bloom_hash(key);
            let delta = h.rotate_right(17);
            for _ in 0..self.k {
                let bit = h % bits;
                dst[init + (bit / 8) as usize] |= 1 << (bit % 8);
                h = h.wrapping_add(delta);
            }
        }
        dst.push(self.k);
    }

    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
        if filter.len() < 2 {
            // Too short to hold bits plus the probe count.
            return false;
        }
        let bits = ((filter.len() - 1) * 8) as u64;
        let k = filter[filter.len() - 1];
        if k > 30 {
            // Reserved for future encodings: match everything.
            return true;
        }

        let mut h = bloom_hash(key);
        let delta = h.rotate_right(17);
        for _ in 0..k {
            let bit = h % bits;
            if filter[(bit / 8) as usize] & (1 << (bit % 8)) == 0 {
                return false;
            }
            h = h.wrapping_add(delta);
        }
        true
    }
}

/// FNV-1a 64-bit hash.
fn bloom_hash(data: &[u8]) -> u64 {
    const FNV_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = FNV_BASIS;
    for &byte in data {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
