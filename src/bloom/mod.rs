//! Approximate membership filter over key hashes.
//!
//! Each sealed data file carries one [`KeyFilter`] so the read path can
//! skip files that cannot contain a key. The filter is a conservative
//! over-approximation: `contains` may return a false positive but never
//! a false negative for a hash that was inserted.
//!
//! Hashes are stringified as decimal digits before touching the
//! underlying filter; the serialized form round-trips exactly.

use bloomfilter::Bloom;
use thiserror::Error;

/// Errors returned by filter construction and deserialization.
#[derive(Debug, Error)]
pub enum FilterError {
    /// Filter parameters were rejected.
    #[error("could not build bloom filter: {0}")]
    Build(String),

    /// Serialized filter bytes failed to deserialize.
    #[error("bloom filter corrupted: {0}")]
    Corrupted(String),
}

/// Bloom filter keyed by the decimal-string form of a key hash.
pub struct KeyFilter {
    inner: Bloom<String>,
}

impl KeyFilter {
    /// Builds a filter sized for `expected_count` hashes at the target
    /// false-positive rate. A zero count is clamped to one so an empty
    /// summary still seals cleanly.
    pub fn new(expected_count: usize, false_positive_rate: f64) -> Result<Self, FilterError> {
        let inner = Bloom::new_for_fp_rate(expected_count.max(1), false_positive_rate)
            .map_err(|e| FilterError::Build(e.to_string()))?;
        Ok(Self { inner })
    }

    pub fn insert(&mut self, key_hash: u32) {
        self.inner.set(&key_hash.to_string());
    }

    /// May return a false positive; never a false negative.
    pub fn contains(&self, key_hash: u32) -> bool {
        self.inner.check(&key_hash.to_string())
    }

    /// Serialized form; round-trips exactly through [`KeyFilter::from_bytes`].
    pub fn to_bytes(&self) -> Vec<u8> {
        self.inner.as_slice().to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FilterError> {
        let inner =
            Bloom::from_slice(bytes).map_err(|e| FilterError::Corrupted(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl std::fmt::Debug for KeyFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyFilter")
            .field("len_bytes", &self.inner.as_slice().len())
            .finish()
    }
}
