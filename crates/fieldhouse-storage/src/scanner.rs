//! Field Scanner - Discovering Field Boundaries in a Chunk Stream
//!
//! This module implements `FieldScanner`, the state machine that converts a
//! stream of fixed-size chunks into a sequence of `Position` descriptors,
//! one per field, without materializing field bodies.
//!
//! ## The Problem
//!
//! Field records are fixed-size, but the size is only known after reading
//! the first header, and record boundaries fall anywhere inside a chunk,
//! including spanning several chunks when `chunk_size < field_size`. The
//! scanner must track boundaries across chunks while holding at most one
//! partial field in memory, so a multi-gigabyte file indexes in
//! O(field_size) memory.
//!
//! ## How It Works
//!
//! ```text
//! File:   [0100110001110101011010110110000101110011]
//! Chunks: [   0    |   1    |   2    |   3    | 4  ]
//! Fields: [0  |1  |2  |3                   |4  |5  ]
//! ```
//!
//! Per chunk, per fill step:
//! 1. If the field buffer is empty, latch the cursor as the new field's
//!    start checkpoint. This is the crux: the latched state is exactly
//!    what a later read needs to reproduce this field, even when the
//!    field completes chunks later.
//! 2. Copy `min(bytes needed, bytes available)` into the field buffer.
//! 3. On reaching `field_size`, parse ONLY the header (12 bytes; the body
//!    is never deserialized) and yield a `Position`.
//!
//! ## Resumed Scans
//!
//! Scanning can resume from the last known `Position` of a previous scan:
//! numbering continues at `id + 1` and the cursor re-enters the chunk grid
//! at that position's end checkpoint. This is how a growing file is
//! re-indexed without rewinding to byte zero.
//!
//! ## Trailing Bytes
//!
//! A partial field at EOF (a snapshot the simulation is still writing) is
//! dropped silently, matching the producer's append lifecycle; the dropped
//! byte count is reported via `trailing_bytes()` for callers that want to
//! detect it.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};

use fieldhouse_core::{Header, HEADER_SIZE};

use crate::chunk::ChunkReader;
use crate::error::Result;

/// A resumable-decompression checkpoint
///
/// The gzip stack exposes no cloneable mid-stream inflate state, so the
/// checkpoint is logical: the number of decompressed bytes that precede
/// the field. Restoring it re-inflates from the start of the stream and
/// discards up to this offset, making compressed random access
/// O(distance-from-start); plain files seek directly and carry no
/// checkpoint at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecCheckpoint {
    /// Decompressed bytes emitted before the field's first byte
    pub bytes_out: u64,
}

/// Where one field lives in a file, without its content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// 0-based sequential field index
    pub id: usize,

    /// Snapshot time decoded from the field's header
    pub time: f32,

    /// Chunk where the field starts and chunk where it ends
    pub chunk_id: (u64, u64),

    /// Byte offsets within the start and end chunks
    pub chunk_offset: (usize, usize),

    /// Decompression checkpoint at the field's start (`None` if plain)
    pub codec: Option<CodecCheckpoint>,

    /// Chunk size used by the scan that produced this position
    pub chunk_size: usize,

    /// Total byte span of header + body + footer
    pub field_size: usize,
}

impl Position {
    /// Offset of the field's first byte in the decompressed stream
    pub fn start_offset(&self) -> u64 {
        self.chunk_id.0 * self.chunk_size as u64 + self.chunk_offset.0 as u64
    }

    /// Offset one past the field's last byte
    pub fn end_offset(&self) -> u64 {
        self.chunk_id.1 * self.chunk_size as u64 + self.chunk_offset.1 as u64
    }
}

/// Read the first header of a field file to learn the record size
///
/// Returns `Ok(None)` for a file with fewer than `HEADER_SIZE` decompressed
/// bytes (empty or nascent); a corrupt leading header is an error.
pub fn read_leading_header(path: &Path, compressed: bool) -> Result<Option<Header>> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(None);
    }

    let mut source: Box<dyn Read> = if compressed {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut buf = [0u8; HEADER_SIZE];
    let mut filled = 0;
    while filled < HEADER_SIZE {
        let n = source.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    if filled < HEADER_SIZE {
        return Ok(None);
    }

    Ok(Some(Header::from_bytes(&buf)?))
}

/// Walks a chunk stream and yields one `Position` per discovered field
pub struct FieldScanner {
    chunks: ChunkReader,
    compressed: bool,
    chunk_size: usize,
    field_size: usize,

    field_id: usize,
    chunk_id: u64,
    chunk_offset: usize,
    prev_chunk_id: u64,
    prev_chunk_offset: usize,

    /// Bytes of the field currently being assembled (always < field_size)
    field_buffer: Vec<u8>,

    /// Unconsumed remainder of the current chunk
    current: Option<Bytes>,

    /// Bytes to trim from the first fetched chunk on a mid-chunk resume
    resume_trim: usize,

    finished: bool,
    trailing_bytes: u64,
}

impl FieldScanner {
    /// Start a fresh scan at the beginning of the file
    ///
    /// The record size is bootstrapped from the file's leading header; a
    /// file too short to hold one header scans as empty.
    pub fn new(path: &Path, compressed: bool, chunk_size: usize) -> Result<Self> {
        let header = read_leading_header(path, compressed)?;
        let chunks = ChunkReader::open(path, compressed, chunk_size)?;

        Ok(Self {
            chunks,
            compressed,
            chunk_size,
            field_size: header.as_ref().map(Header::field_size).unwrap_or(0),
            field_id: 0,
            chunk_id: 0,
            chunk_offset: 0,
            prev_chunk_id: 0,
            prev_chunk_offset: 0,
            field_buffer: Vec::new(),
            current: None,
            resume_trim: 0,
            finished: header.is_none(),
            trailing_bytes: 0,
        })
    }

    /// Resume a scan from a previously yielded position
    ///
    /// Continues numbering at `position.id + 1` and re-enters the chunk
    /// grid at that position's end checkpoint. `chunk_size` and
    /// `field_size` are taken from the position so the chunk coordinates
    /// stay consistent with the scan that produced it.
    pub fn resume(path: &Path, compressed: bool, position: &Position) -> Result<Self> {
        let chunk_size = position.chunk_size;

        // Normalize an end cursor that landed exactly on a chunk boundary
        let (mut chunk_id, mut chunk_offset) = (position.chunk_id.1, position.chunk_offset.1);
        if chunk_offset >= chunk_size {
            chunk_id += 1;
            chunk_offset = 0;
        }

        let chunks = ChunkReader::open_at(path, compressed, chunk_size, chunk_id)?;

        Ok(Self {
            chunks,
            compressed,
            chunk_size,
            field_size: position.field_size,
            field_id: position.id + 1,
            chunk_id,
            chunk_offset,
            prev_chunk_id: chunk_id,
            prev_chunk_offset: chunk_offset,
            field_buffer: Vec::new(),
            current: None,
            resume_trim: chunk_offset,
            finished: false,
            trailing_bytes: 0,
        })
    }

    /// Byte count of a partial trailing field dropped at EOF
    ///
    /// Meaningful once the scan has run to completion.
    pub fn trailing_bytes(&self) -> u64 {
        self.trailing_bytes
    }

    /// Fetch the next chunk into `self.current`, applying any resume trim
    ///
    /// Returns false at end of stream.
    fn fetch_chunk(&mut self) -> Result<bool> {
        match self.chunks.next_chunk()? {
            Some(data) => {
                let data = if self.resume_trim > 0 {
                    let trim = self.resume_trim.min(data.len());
                    self.resume_trim = 0;
                    data.slice(trim..)
                } else {
                    data
                };
                self.current = Some(data);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Iterator for FieldScanner {
    type Item = Result<Position>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let data = match self.current.take() {
                Some(data) if !data.is_empty() => data,
                Some(_) => {
                    // Chunk exhausted: advance the cursor to the next one
                    self.chunk_id += 1;
                    self.chunk_offset = 0;
                    continue;
                }
                None => {
                    match self.fetch_chunk() {
                        Ok(true) => continue,
                        Ok(false) => {
                            // EOF: a partial field is dropped, not yielded
                            self.finished = true;
                            self.trailing_bytes = self.field_buffer.len() as u64;
                            if self.trailing_bytes > 0 {
                                tracing::debug!(
                                    trailing_bytes = self.trailing_bytes,
                                    "dropped partial trailing field"
                                );
                            }
                            return None;
                        }
                        Err(e) => {
                            self.finished = true;
                            return Some(Err(e));
                        }
                    }
                }
            };

            if self.field_buffer.is_empty() {
                // A new field starts here: latch its checkpoint
                self.prev_chunk_id = self.chunk_id;
                self.prev_chunk_offset = self.chunk_offset;
            }

            let needed = self.field_size - self.field_buffer.len();
            let take = needed.min(data.len());
            self.field_buffer.extend_from_slice(&data[..take]);
            self.current = Some(data.slice(take..));
            self.chunk_offset += take;

            if self.field_buffer.len() < self.field_size {
                continue;
            }

            // Field boundary complete: decode only the time, body untouched
            let header = match Header::from_bytes(&self.field_buffer) {
                Ok(header) => header,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
            };

            let position = Position {
                id: self.field_id,
                time: header.time(),
                chunk_id: (self.prev_chunk_id, self.chunk_id),
                chunk_offset: (self.prev_chunk_offset, self.chunk_offset),
                codec: self.compressed.then(|| CodecCheckpoint {
                    bytes_out: self.prev_chunk_id * self.chunk_size as u64
                        + self.prev_chunk_offset as u64,
                }),
                chunk_size: self.chunk_size,
                field_size: self.field_size,
            };

            self.field_id += 1;
            self.field_buffer.clear();
            return Some(Ok(position));
        }
    }
}
