//! The persisted unit of the store: a keyed, timestamped blob with a
//! status flag. A `Removed` record carries an empty payload and acts as
//! the tombstone for its key.
//!
//! Records travel as frames (see [`crate::stream`]): the bytes handed to
//! the cache, the commitlog, and the data files are always a full frame,
//! and [`Record::decode`] validates the checksum before trusting any of
//! it.
//!
//! Keys are identified internally by [`key_hash`], a 32-bit
//! non-cryptographic hash. Indexes, bloom filters, and the cache never
//! see the key string itself; hash collisions resolve to the most recent
//! write for the colliding hash.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::stream::{self, StreamError};

/// Whether a record holds live data or tombstones its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub enum RecordStatus {
    Active,
    Removed,
}

/// A single key-addressed blob as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Record {
    /// User-supplied key string.
    pub key: String,

    /// Live data or tombstone.
    pub status: RecordStatus,

    /// Write time, nanoseconds since the UNIX epoch.
    pub timestamp: u64,

    /// Opaque payload; empty for tombstones.
    pub payload: Vec<u8>,
}

impl Record {
    /// Creates an `Active` record timestamped now.
    pub fn new(key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            status: RecordStatus::Active,
            timestamp: now_nanos(),
            payload,
        }
    }

    /// Creates the tombstone for `key`: status `Removed`, empty payload.
    pub fn tombstone(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: RecordStatus::Removed,
            timestamp: now_nanos(),
            payload: Vec::new(),
        }
    }

    /// Serializes into a full frame (`[len][body][crc32]`).
    pub fn encode(&self) -> Result<Vec<u8>, StreamError> {
        stream::encode_frame(self)
    }

    /// Validates and deserializes a full frame.
    pub fn decode(frame: &[u8]) -> Result<Self, StreamError> {
        stream::decode_frame(frame)
    }

    /// Derived size: the length in bytes of this record's encoded
    /// frame, as counted against the commitlog's size bound.
    pub fn frame_len(&self) -> Result<u32, StreamError> {
        Ok(self.encode()?.len() as u32)
    }

    /// Hash of this record's key.
    pub fn key_hash(&self) -> u32 {
        key_hash(&self.key)
    }

    pub fn is_removed(&self) -> bool {
        self.status == RecordStatus::Removed
    }
}

/// 32-bit non-cryptographic hash of a key string — the sole key form
/// used in index summaries, bloom filters, and the cache.
pub fn key_hash(key: &str) -> u32 {
    crc32fast::hash(key.as_bytes())
}

/// Current time as nanoseconds since the UNIX epoch.
pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let record = Record::new("user:42", vec![1, 2, 3, 4]);
        let frame = record.encode().unwrap();
        let decoded = Record::decode(&frame).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(record.frame_len().unwrap() as usize, frame.len());
    }

    #[test]
    fn tombstone_has_empty_payload() {
        let tomb = Record::tombstone("user:42");
        assert_eq!(tomb.status, RecordStatus::Removed);
        assert!(tomb.payload.is_empty());
        assert!(tomb.is_removed());
    }

    #[test]
    fn key_hash_is_stable() {
        assert_eq!(key_hash("a"), key_hash("a"));
        assert_ne!(key_hash("a"), key_hash("b"));
        let record = Record::new("a", vec![]);
        assert_eq!(record.key_hash(), key_hash("a"));
    }

    #[test]
    fn decode_rejects_flipped_bit() {
        let record = Record::new("k", vec![0xAA; 64]);
        let mut frame = record.encode().unwrap();
        let mid = frame.len() / 2;
        frame[mid] ^= 0x01;
        let err = Record::decode(&frame).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn decode_rejects_truncated_frame() {
        let record = Record::new("k", vec![0xBB; 64]);
        let frame = record.encode().unwrap();
        let err = Record::decode(&frame[..frame.len() / 2]).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn empty_payload_round_trip() {
        let record = Record::new("empty", Vec::new());
        let frame = record.encode().unwrap();
        assert_eq!(Record::decode(&frame).unwrap().payload, Vec::<u8>::new());
    }
}
