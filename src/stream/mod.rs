//! Frame Codec Module
//!
//! Every on-disk structure in the store (record, index entry, serialized
//! bloom filter) is persisted as a **self-delimited**, **CRC-protected**
//! frame. A reader handed a frame's starting offset gets back exactly the
//! bytes that were appended, or a corruption error it can treat as a miss.
//!
//! # On-disk layout
//!
//! ```text
//! [BODY_LEN_LE][BODY_BYTES][CRC32_LE]
//! [BODY_LEN_LE][BODY_BYTES][CRC32_LE]
//! ...
//! ```
//!
//! - **Body** — [`bincode`] with fixed integer encoding.
//! - **CRC32** — computed over `len || body`, so a corrupted length
//!   prefix is caught as reliably as a corrupted body.
//!
//! # Corruption handling
//!
//! Truncation, an implausible length prefix, a checksum mismatch, and a
//! decode failure are all corruption ([`StreamError::is_corruption`]).
//! Read paths log and treat corruption as "not found"; they never panic
//! and never abort the process.
//!
//! # Concurrency model
//!
//! [`FrameWriter`] is owned by the single writer of its file.
//! [`FrameReader`] guards its file handle with a `Mutex` so the
//! seek-then-read pair is atomic under concurrent readers. Frames inside
//! immutable files are read lock-free through [`read_frame_at`].


use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use bincode::config::{Configuration, Fixint, LittleEndian, standard};
use bincode::{decode_from_slice, encode_to_vec};
use crc32fast::Hasher as Crc32;
use thiserror::Error;
use tracing::trace;

const U32_SIZE: usize = size_of::<u32>();

/// Bytes added around a frame body: length prefix plus trailing checksum.
pub const FRAME_OVERHEAD: usize = 2 * U32_SIZE;

/// Upper bound on a single frame body. A length prefix above this is
/// treated as corruption rather than an allocation request.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Errors returned by frame codec operations.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error.
    #[error("serialization (encode) error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    /// Deserialization error.
    #[error("deserialization (decode) error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    /// Data integrity failure — checksum did not match.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// Length prefix exceeds the frame size limit.
    #[error("frame size {0} exceeds limit")]
    FrameTooLarge(usize),

    /// Frame extends past the end of its file.
    #[error("unexpected end of file")]
    UnexpectedEof,
}

impl StreamError {
    /// True for errors that mean "the bytes on disk are not a valid
    /// frame" as opposed to an environmental failure. Read paths treat
    /// these as a miss.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            StreamError::ChecksumMismatch
                | StreamError::FrameTooLarge(_)
                | StreamError::UnexpectedEof
                | StreamError::Decode(_)
        )
    }
}

/// The bincode configuration shared by every on-disk structure.
pub(crate) fn bin_config() -> Configuration<LittleEndian, Fixint> {
    standard().with_fixed_int_encoding()
}

/// Serializes `value` and wraps it into a full frame
/// (`[len][body][crc32]`).
pub fn encode_frame<T: bincode::Encode>(value: &T) -> Result<Vec<u8>, StreamError> {
    let body = encode_to_vec(value, bin_config())?;
    if body.len() > MAX_FRAME_SIZE {
        return Err(StreamError::FrameTooLarge(body.len()));
    }
    let len = body.len() as u32;

    let mut hasher = Crc32::new();
    hasher.update(&len.to_le_bytes());
    hasher.update(&body);
    let checksum = hasher.finalize();

    let mut frame = Vec::with_capacity(body.len() + FRAME_OVERHEAD);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&body);
    frame.extend_from_slice(&checksum.to_le_bytes());
    Ok(frame)
}

/// Validates a full frame and decodes its body.
pub fn decode_frame<T: bincode::Decode<()>>(frame: &[u8]) -> Result<T, StreamError> {
    let body = frame_body(frame)?;
    let (value, _) = decode_from_slice::<T, _>(body, bin_config())?;
    Ok(value)
}

/// Validates a full frame and returns a view of its body bytes.
pub fn frame_body(frame: &[u8]) -> Result<&[u8], StreamError> {
    if frame.len() < FRAME_OVERHEAD {
        return Err(StreamError::UnexpectedEof);
    }
    let len = u32::from_le_bytes(frame[..U32_SIZE].try_into().unwrap_or_default()) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(StreamError::FrameTooLarge(len));
    }
    if frame.len() != len + FRAME_OVERHEAD {
        return Err(StreamError::UnexpectedEof);
    }

    let body = &frame[U32_SIZE..U32_SIZE + len];
    let stored = u32::from_le_bytes(
        frame[U32_SIZE + len..]
            .try_into()
            .map_err(|_| StreamError::UnexpectedEof)?,
    );

    let mut hasher = Crc32::new();
    hasher.update(&frame[..U32_SIZE]);
    hasher.update(body);
    if hasher.finalize() != stored {
        return Err(StreamError::ChecksumMismatch);
    }
    Ok(body)
}

/// Reads and validates the frame starting at `offset` inside an
/// in-memory view of an immutable file (an `Mmap` derefs to `[u8]`).
pub fn read_frame_at(data: &[u8], offset: u64) -> Result<Vec<u8>, StreamError> {
    let start = offset as usize;
    if start + U32_SIZE > data.len() {
        return Err(StreamError::UnexpectedEof);
    }
    let len = u32::from_le_bytes(
        data[start..start + U32_SIZE]
            .try_into()
            .map_err(|_| StreamError::UnexpectedEof)?,
    ) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(StreamError::FrameTooLarge(len));
    }
    let end = start + len + FRAME_OVERHEAD;
    if end > data.len() {
        return Err(StreamError::UnexpectedEof);
    }

    let frame = &data[start..end];
    frame_body(frame)?;
    Ok(frame.to_vec())
}

/// Append-side handle for a frame file.
///
/// Tracks the offset at which the next frame will land so callers get
/// back the position they must record in an index summary. Each append
/// is followed by `sync_all`; a frame whose offset was returned is on
/// its way to disk.
#[derive(Debug)]
pub struct FrameWriter {
    file: File,
    offset: u64,
}

impl FrameWriter {
    /// Wraps an append-mode file whose current length is `offset`.
    pub fn new(file: File, offset: u64) -> Self {
        Self { file, offset }
    }

    /// Appends a pre-built frame, returning its starting offset.
    pub fn append(&mut self, frame: &[u8]) -> Result<u64, StreamError> {
        let offset = self.offset;
        self.file.write_all(frame)?;
        self.file.sync_all()?;
        self.offset += frame.len() as u64;
        trace!(offset, len = frame.len(), "appended frame");
        Ok(offset)
    }

    /// Offset at which the next frame will be written — equal to the
    /// file's on-disk length.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Flushes the underlying file to disk.
    pub fn sync(&self) -> Result<(), StreamError> {
        self.file.sync_all()?;
        Ok(())
    }
}

/// Read-side handle for a frame file.
///
/// The file handle is wrapped in a `Mutex` so the seek-then-read pair
/// cannot interleave between concurrent readers sharing this handle.
#[derive(Debug)]
pub struct FrameReader {
    file: Mutex<File>,
}

impl FrameReader {
    pub fn new(file: File) -> Self {
        Self {
            file: Mutex::new(file),
        }
    }

    /// Reads and validates the full frame starting at `offset`.
    pub fn read_at(&self, offset: u64) -> Result<Vec<u8>, StreamError> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| io::Error::other("frame reader mutex poisoned"))?;
        read_frame_from(&mut *guard, offset)
    }
}

/// Reads one frame from `file` at `offset`. Shared by [`FrameReader`]
/// and [`FrameIter`].
fn read_frame_from(file: &mut File, offset: u64) -> Result<Vec<u8>, StreamError> {
    file.seek(SeekFrom::Start(offset))?;

    let mut len_bytes = [0u8; U32_SIZE];
    match file.read_exact(&mut len_bytes) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(StreamError::UnexpectedEof);
        }
        Err(e) => return Err(StreamError::Io(e)),
    }

    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(StreamError::FrameTooLarge(len));
    }

    let mut frame = vec![0u8; len + FRAME_OVERHEAD];
    frame[..U32_SIZE].copy_from_slice(&len_bytes);
    match file.read_exact(&mut frame[U32_SIZE..]) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(StreamError::UnexpectedEof);
        }
        Err(e) => return Err(StreamError::Io(e)),
    }

    frame_body(&frame)?;
    Ok(frame)
}

/// Sequential replay iterator over a frame file, yielding
/// `(offset, frame_bytes)` pairs from offset 0.
///
/// Iteration ends cleanly at the file's end; a torn or corrupted tail
/// surfaces as one `Err` item and the caller decides whether to keep
/// the valid prefix.
pub struct FrameIter {
    file: File,
    offset: u64,
    end: u64,
}

impl FrameIter {
    pub fn new(file: File) -> Result<Self, StreamError> {
        let end = file.metadata()?.len();
        Ok(Self {
            file,
            offset: 0,
            end,
        })
    }

    /// Offset of the next frame to be read — after a clean iteration
    /// this is the file length; after an `Err` it marks the end of the
    /// valid prefix.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl Iterator for FrameIter {
    type Item = Result<(u64, Vec<u8>), StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.end {
            return None;
        }
        let offset = self.offset;
        match read_frame_from(&mut self.file, offset) {
            Ok(frame) => {
                self.offset += frame.len() as u64;
                Some(Ok((offset, frame)))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
