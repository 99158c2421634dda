//! Content-addressed memo of singleton compressed sizes.
//!
//! One cache is bound to one compressor for its whole lifetime and lives for
//! one matrix computation. There is no eviction: every distinct input of the
//! batch is compressed at most once.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use sha2::{Digest, Sha256};

use crate::compressor::{CompressionError, Compressor};

/// Fixed-size content fingerprint. Used only as a lookup key.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ContentKey(pub [u8; 32]);

impl Display for ContentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Function that fingerprints a byte sequence.
pub type KeyFn = fn(&[u8]) -> ContentKey;

/// SHA-256 fingerprint of `data`.
#[must_use]
pub fn sha256_key(data: &[u8]) -> ContentKey {
    let digest = Sha256::digest(data);
    let mut out = [0_u8; 32];
    out.copy_from_slice(&digest);
    ContentKey(out)
}

/// Lookup counters.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: usize,
    /// Lookups that compressed.
    pub misses: usize,
    /// Distinct contents stored.
    pub entries: usize,
}

/// Singleton-size memo bound to one compressor.
///
/// Safe to share between threads. Two threads missing on the same content
/// may both compress it; the first stored value wins and both values are
/// equal for a deterministic compressor.
pub struct SizeCache<'c, C: Compressor + ?Sized> {
    compressor: &'c C,
    key_fn: KeyFn,
    sizes: Mutex<HashMap<ContentKey, usize>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<'c, C: Compressor + ?Sized> SizeCache<'c, C> {
    /// Cache keyed by SHA-256.
    #[must_use]
    pub fn new(compressor: &'c C) -> Self {
        Self::with_key_fn(compressor, sha256_key)
    }

    /// Cache keyed by a caller-supplied fingerprint.
    #[must_use]
    pub fn with_key_fn(compressor: &'c C, key_fn: KeyFn) -> Self {
        Self {
            compressor,
            key_fn,
            sizes: Mutex::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Compressor this cache measures with.
    #[must_use]
    pub fn compressor(&self) -> &'c C {
        self.compressor
    }

    /// `C(data)`, compressing only on the first sighting of this content.
    pub fn size_of(&self, data: &[u8]) -> Result<usize, CompressionError> {
        let key = (self.key_fn)(data);
        if let Some(size) = self.lookup(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(size);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let size = self.compressor.compressed_len(data)?;
        let mut sizes = self.sizes.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(*sizes.entry(key).or_insert(size))
    }

    /// Cached size for `data`, without compressing.
    #[must_use]
    pub fn get(&self, data: &[u8]) -> Option<usize> {
        self.lookup(&(self.key_fn)(data))
    }

    /// Number of distinct contents stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True when nothing has been stored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counters since construction.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn lookup(&self, key: &ContentKey) -> Option<usize> {
        self.sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
    }
}
