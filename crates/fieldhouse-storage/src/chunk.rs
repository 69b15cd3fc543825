//! Chunk Reader - Fixed-Size Blocks from a (Possibly Gzipped) Stream
//!
//! This module implements `ChunkReader`, which turns a field file into a
//! finite sequence of fixed-size byte chunks for the scanner to walk.
//!
//! ## What Does ChunkReader Do?
//!
//! 1. **Opens the file** plain or through a streaming gzip decoder
//! 2. **Reads chunks** of exactly `chunk_size` decompressed bytes (the
//!    final chunk may be short)
//! 3. **Positions itself** at an arbitrary chunk boundary for resumed
//!    scans and random-access reads
//!
//! ## The Chunk Grid
//!
//! Chunk `k` always covers decompressed-stream bytes
//! `[k·chunk_size, (k+1)·chunk_size)`, regardless of where a read starts.
//! Field positions are recorded in these coordinates, so a resumed scan
//! re-enters at a chunk boundary and sees exactly the chunks a fresh scan
//! would have produced.
//!
//! ## Positioning Cost
//!
//! For a plain file, `open_at` is a single `seek`. For a gzipped file
//! there is no way to enter a DEFLATE stream mid-way, so `open_at`
//! re-inflates from the start of the file and discards bytes up to the
//! target chunk, which is O(offset) work. Sequential consumers therefore read in
//! one pass; only random access pays the replay cost.
//!
//! ## Termination
//!
//! A zero-byte read means end of stream. The sequence is finite and
//! non-restartable; a fresh reader re-reads from its start position.
//! Multi-member gzip files (produced by appending members) decode as one
//! continuous stream.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use bytes::Bytes;
use flate2::read::MultiGzDecoder;

use crate::error::{Error, Result};

/// Leading magic bytes of a gzip stream
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Scratch buffer size for skipping decompressed bytes
const SKIP_BUF_SIZE: usize = 64 * 1024;

/// Check whether a file starts with the gzip magic bytes
pub fn is_gzip(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 2];

    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == GZIP_MAGIC),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

enum ChunkSource {
    Plain(File),
    Gzip(MultiGzDecoder<File>),
}

impl Read for ChunkSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            ChunkSource::Plain(file) => file.read(buf),
            ChunkSource::Gzip(decoder) => decoder.read(buf),
        }
    }
}

/// Reads fixed-size decompressed chunks from a field file
pub struct ChunkReader {
    source: ChunkSource,
    chunk_size: usize,
    stream_offset: u64,
    done: bool,
}

impl ChunkReader {
    /// Open a reader at the start of the (decompressed) stream
    pub fn open(path: &Path, compressed: bool, chunk_size: usize) -> Result<Self> {
        let file = File::open(path)?;
        let source = if compressed {
            ChunkSource::Gzip(MultiGzDecoder::new(file))
        } else {
            ChunkSource::Plain(file)
        };

        Ok(Self {
            source,
            chunk_size,
            stream_offset: 0,
            done: false,
        })
    }

    /// Open a reader positioned at the start of `start_chunk`
    ///
    /// Fails with `StaleIndex` if the stream ends before that boundary.
    pub fn open_at(
        path: &Path,
        compressed: bool,
        chunk_size: usize,
        start_chunk: u64,
    ) -> Result<Self> {
        let mut reader = Self::open(path, compressed, chunk_size)?;
        let offset = start_chunk * chunk_size as u64;
        if offset > 0 {
            reader.advance_to(offset)?;
        }
        Ok(reader)
    }

    /// Decompressed-stream offset of the next byte this reader will yield
    pub fn stream_offset(&self) -> u64 {
        self.stream_offset
    }

    /// Read the next chunk: exactly `chunk_size` bytes except at EOF
    ///
    /// Returns `None` once the stream is exhausted.
    pub fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.done {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;

        while filled < self.chunk_size {
            let n = self.source.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            self.done = true;
            return Ok(None);
        }

        if filled < self.chunk_size {
            // Short chunk: the stream ended inside it
            self.done = true;
            buf.truncate(filled);
        }

        self.stream_offset += filled as u64;
        Ok(Some(Bytes::from(buf)))
    }

    /// Move the read position forward to absolute stream offset `offset`
    fn advance_to(&mut self, offset: u64) -> Result<()> {
        debug_assert!(offset >= self.stream_offset);

        match &mut self.source {
            ChunkSource::Plain(file) => {
                if offset > file.metadata()?.len() {
                    return Err(Error::StaleIndex { offset });
                }
                file.seek(SeekFrom::Start(offset))?;
                self.stream_offset = offset;
            }
            ChunkSource::Gzip(decoder) => {
                let mut scratch = [0u8; SKIP_BUF_SIZE];
                while self.stream_offset < offset {
                    let want = ((offset - self.stream_offset) as usize).min(SKIP_BUF_SIZE);
                    let n = decoder.read(&mut scratch[..want])?;
                    if n == 0 {
                        return Err(Error::StaleIndex { offset });
                    }
                    self.stream_offset += n as u64;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_plain(dir: &TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    fn write_gzip(dir: &TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let file = File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap();
        path
    }

    #[test]
    fn test_is_gzip_detection() {
        let dir = TempDir::new().unwrap();
        let plain = write_plain(&dir, "plain.bin", b"not compressed data");
        let gzipped = write_gzip(&dir, "data.bin.gz", b"compressed data");
        let empty = write_plain(&dir, "empty.bin", b"");

        assert!(!is_gzip(&plain).unwrap());
        assert!(is_gzip(&gzipped).unwrap());
        assert!(!is_gzip(&empty).unwrap());
    }

    #[test]
    fn test_plain_chunk_sizes() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..100u8).collect();
        let path = write_plain(&dir, "data.bin", &data);

        let mut reader = ChunkReader::open(&path, false, 32).unwrap();
        let mut chunks = Vec::new();
        while let Some(chunk) = reader.next_chunk().unwrap() {
            chunks.push(chunk);
        }

        // 100 bytes in 32-byte chunks: 32, 32, 32, 4
        assert_eq!(
            chunks.iter().map(|c| c.len()).collect::<Vec<_>>(),
            vec![32, 32, 32, 4]
        );

        let joined: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
        assert_eq!(joined, data);
    }

    #[test]
    fn test_gzip_chunks_match_plain() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..255u8).cycle().take(10_000).collect();
        let path = write_gzip(&dir, "data.bin.gz", &data);

        let mut reader = ChunkReader::open(&path, true, 1024).unwrap();
        let mut joined = Vec::new();
        let mut count = 0;
        while let Some(chunk) = reader.next_chunk().unwrap() {
            if joined.len() + chunk.len() < data.len() {
                assert_eq!(chunk.len(), 1024);
            }
            joined.extend_from_slice(&chunk);
            count += 1;
        }

        assert_eq!(joined, data);
        assert_eq!(count, 10); // 9 full chunks + 1 short
    }

    #[test]
    fn test_empty_stream_yields_no_chunks() {
        let dir = TempDir::new().unwrap();
        let path = write_plain(&dir, "empty.bin", b"");

        let mut reader = ChunkReader::open(&path, false, 64).unwrap();
        assert!(reader.next_chunk().unwrap().is_none());
        // Stays exhausted
        assert!(reader.next_chunk().unwrap().is_none());
    }

    #[test]
    fn test_open_at_plain() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..100u8).collect();
        let path = write_plain(&dir, "data.bin", &data);

        let mut reader = ChunkReader::open_at(&path, false, 32, 2).unwrap();
        assert_eq!(reader.stream_offset(), 64);

        let chunk = reader.next_chunk().unwrap().unwrap();
        assert_eq!(&chunk[..], &data[64..96]);
    }

    #[test]
    fn test_open_at_gzip_replays_to_boundary() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..255u8).cycle().take(5_000).collect();
        let path = write_gzip(&dir, "data.bin.gz", &data);

        let mut reader = ChunkReader::open_at(&path, true, 1000, 3).unwrap();
        let chunk = reader.next_chunk().unwrap().unwrap();
        assert_eq!(&chunk[..], &data[3000..4000]);
    }

    #[test]
    fn test_open_at_past_eof_is_stale() {
        let dir = TempDir::new().unwrap();
        let path = write_plain(&dir, "data.bin", &[0u8; 50]);

        let result = ChunkReader::open_at(&path, false, 32, 2);
        assert!(matches!(result, Err(Error::StaleIndex { offset: 64 })));

        let gz_path = write_gzip(&dir, "data.bin.gz", &[0u8; 50]);
        let result = ChunkReader::open_at(&gz_path, true, 32, 2);
        assert!(matches!(result, Err(Error::StaleIndex { offset: 64 })));
    }

    #[test]
    fn test_multi_member_gzip_reads_as_one_stream() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin.gz");

        // Two gzip members appended back-to-back
        let file = File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(b"first member ").unwrap();
        let file = encoder.finish().unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(b"second member").unwrap();
        encoder.finish().unwrap();

        let mut reader = ChunkReader::open(&path, true, 64).unwrap();
        let chunk = reader.next_chunk().unwrap().unwrap();
        assert_eq!(&chunk[..], b"first member second member");
    }
}
