use std::{
    collections::{HashMap, HashSet},
    hash::{BuildHasher, Hash, Hasher},
};
use wyrand::WyHash;

// we don't need a secret, and generating a secret involves primality checks. oww.
// thus, new_with_default_secret

#[derive(Copy, Clone, Debug, Default)]
pub struct WyHashBuilder;
impl BuildHasher for WyHashBuilder {
    type Hasher = WyHash;
    fn build_hasher(&self) -> Self::Hasher {
        WyHash::new_with_default_secret(0xfc1abcacd1fc58fe)
    }
}

pub type WyHashMap<K, V> = HashMap<K, V, WyHashBuilder>;
pub type WyHashSet<T> = HashSet<T, WyHashBuilder>;

pub fn wyhash(seed: u64, data: &(impl Hash + ?Sized)) -> u64 {
    let mut wyh = WyHash::new_with_default_secret(seed);
    data.hash(&mut wyh);
    wyh.finish()
}

pub use wyrand::WyRand;

const FNV1A_BASIS: u64 = 0xcbf29ce484222325;
const FNV1A_PRIME: u64 = 0x100000001b3;

/// Streaming 64-bit FNV-1a. This keys the sample cache, where the key must be stable across
/// versions, so it cannot be replaced with wyhash.
#[derive(Copy, Clone, Debug)]
pub struct Fnv1a(u64);
impl Fnv1a {
    pub fn new() -> Self {
        Fnv1a(FNV1A_BASIS)
    }

    pub fn write(&mut self, data: &[u8]) {
        for &byte in data {
            self.0 ^= byte as u64;
            self.0 = self.0.wrapping_mul(FNV1A_PRIME);
        }
    }

    /// Folds in a `u32` as 4 little-endian bytes.
    pub fn write_u32(&mut self, value: u32) {
        self.write(&value.to_le_bytes());
    }

    /// Folds in a `u64` as 8 little-endian bytes.
    pub fn write_u64(&mut self, value: u64) {
        self.write(&value.to_le_bytes());
    }

    pub fn finish(&self) -> u64 {
        self.0
    }
}
impl Default for Fnv1a {
    fn default() -> Self {
        Self::new()
    }
}
