//! Random-access readers over a pack file.
//!
//! A [`PackReader`] provides the byte-level operations the entry decoder
//! needs: sequential reads, byte-at-a-time reads, absolute/relative seeks,
//! current-offset tracking, and a streaming zlib inflater that can be
//! reused across entries without reallocation.
//!
//! Two implementations are selected at open time:
//! - [`MmapPackReader`]: reads copy out of a read-only mapping; seeks are
//!   O(1). Preferred whenever mapping succeeds.
//! - [`FilePackReader`]: a buffered reader over the file; a seek
//!   invalidates the buffer. Fallback when mapping is unavailable.
//!
//! # Contract
//! - After any seek, the next read begins exactly at the target byte.
//! - `inflate` consumes exactly one zlib stream starting at the current
//!   offset and leaves the reader positioned one byte past the end of the
//!   consumed compressed data, so the next entry can be located.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::sync::Arc;

use flate2::{Decompress, FlushDecompress, Status};
use memmap2::Mmap;

/// Scratch buffer size for streaming inflation.
const INFLATE_BUF_SIZE: usize = 32 * 1024;

/// Input chunk size for the buffered reader's inflater.
const INFLATE_CHUNK_SIZE: usize = 16 * 1024;

/// Errors from zlib inflation.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum InflateError {
    /// Inflated output would exceed the caller's cap.
    LimitExceeded,
    /// The compressed stream ended before the zlib trailer.
    TruncatedInput,
    /// The decompressor made no progress on non-empty input.
    Stalled,
    /// The zlib backend rejected the stream.
    Backend,
    /// I/O failure while feeding the decompressor.
    Io(Arc<io::Error>),
}

impl InflateError {
    #[inline]
    fn io(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl fmt::Display for InflateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LimitExceeded => write!(f, "inflate limit exceeded"),
            Self::TruncatedInput => write!(f, "truncated zlib stream"),
            Self::Stalled => write!(f, "inflate stalled"),
            Self::Backend => write!(f, "inflate backend error"),
            Self::Io(err) => write!(f, "inflate I/O error: {err}"),
        }
    }
}

impl std::error::Error for InflateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Byte-level access to a pack file.
///
/// Implementations hold their inflater across uses and reset it on reuse.
pub trait PackReader: Send {
    /// Fills `buf` from the current offset, advancing past it.
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;

    /// Reads a single byte at the current offset.
    fn read_byte(&mut self) -> io::Result<u8>;

    /// Repositions the reader. Supports set/current/end origins.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;

    /// Returns the current byte offset.
    fn offset(&self) -> u64;

    /// Returns the total pack size in bytes.
    fn len(&self) -> u64;

    /// Inflates one zlib stream starting at the current offset.
    ///
    /// `out` is cleared first. On success the reader is positioned one
    /// byte past the consumed compressed data. On error the position is
    /// unspecified and `out` may hold a partial prefix; callers discard
    /// both by seeking before the next use.
    fn inflate(&mut self, out: &mut Vec<u8>, max_out: usize) -> Result<(), InflateError>;
}

/// Opens the preferred reader for a pack file.
///
/// Tries to memory-map the file; on failure (empty file, platform without
/// mapping support) falls back to the buffered implementation.
pub fn open_pack_reader(file: File) -> io::Result<Box<dyn PackReader>> {
    match MmapPackReader::new(&file) {
        Ok(reader) => Ok(Box::new(reader)),
        Err(_) => Ok(Box::new(FilePackReader::new(file)?)),
    }
}

/// Pack reader over a read-only memory mapping.
pub struct MmapPackReader {
    map: Mmap,
    pos: u64,
    inflater: Decompress,
    scratch: Vec<u8>,
}

impl MmapPackReader {
    /// Maps the file read-only.
    pub fn new(file: &File) -> io::Result<Self> {
        // SAFETY: the mapping is read-only and private to this reader; the
        // pack file is treated as immutable for the repository's lifetime.
        let map = unsafe { Mmap::map(file)? };
        Ok(Self {
            map,
            pos: 0,
            inflater: Decompress::new(true),
            scratch: vec![0u8; INFLATE_BUF_SIZE],
        })
    }
}

impl fmt::Debug for MmapPackReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MmapPackReader")
            .field("len", &self.map.len())
            .field("pos", &self.pos)
            .finish()
    }
}

impl PackReader for MmapPackReader {
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let start = self.pos as usize;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= self.map.len())
            .ok_or(io::ErrorKind::UnexpectedEof)?;
        buf.copy_from_slice(&self.map[start..end]);
        self.pos = end as u64;
        Ok(())
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        let byte = *self
            .map
            .get(self.pos as usize)
            .ok_or(io::ErrorKind::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = resolve_seek(pos, self.pos, self.map.len() as u64)?;
        Ok(self.pos)
    }

    fn offset(&self) -> u64 {
        self.pos
    }

    fn len(&self) -> u64 {
        self.map.len() as u64
    }

    fn inflate(&mut self, out: &mut Vec<u8>, max_out: usize) -> Result<(), InflateError> {
        out.clear();
        self.inflater.reset(true);

        // A corrupt offset may point past the mapping; surface that as a
        // truncated stream rather than slicing out of bounds.
        let start = (self.pos as usize).min(self.map.len());
        let input = &self.map[start..];
        let mut in_pos = 0usize;

        loop {
            let before_in = self.inflater.total_in();
            let before_out = self.inflater.total_out();

            let status = self
                .inflater
                .decompress(&input[in_pos..], &mut self.scratch, FlushDecompress::None)
                .map_err(|_| InflateError::Backend)?;

            let consumed = (self.inflater.total_in() - before_in) as usize;
            let produced = (self.inflater.total_out() - before_out) as usize;
            in_pos += consumed;

            if produced != 0 {
                if out.len() + produced > max_out {
                    return Err(InflateError::LimitExceeded);
                }
                out.extend_from_slice(&self.scratch[..produced]);
            }

            match status {
                Status::StreamEnd => {
                    self.pos += in_pos as u64;
                    return Ok(());
                }
                Status::Ok | Status::BufError => {
                    if consumed == 0 && produced == 0 {
                        if in_pos >= input.len() {
                            return Err(InflateError::TruncatedInput);
                        }
                        return Err(InflateError::Stalled);
                    }
                }
            }
        }
    }
}

/// Buffered pack reader used when mapping is unavailable.
pub struct FilePackReader {
    file: BufReader<File>,
    pos: u64,
    size: u64,
    inflater: Decompress,
    in_buf: Vec<u8>,
    scratch: Vec<u8>,
}

impl FilePackReader {
    /// Wraps the file in a buffered reader.
    pub fn new(file: File) -> io::Result<Self> {
        let size = file.metadata()?.len();
        Ok(Self {
            file: BufReader::new(file),
            pos: 0,
            size,
            inflater: Decompress::new(true),
            in_buf: vec![0u8; INFLATE_CHUNK_SIZE],
            scratch: vec![0u8; INFLATE_BUF_SIZE],
        })
    }
}

impl fmt::Debug for FilePackReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilePackReader")
            .field("len", &self.size)
            .field("pos", &self.pos)
            .finish()
    }
}

impl PackReader for FilePackReader {
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.file.read_exact(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = resolve_seek(pos, self.pos, self.size)?;
        // BufReader::seek drops its buffer, honoring the invalidation rule.
        self.pos = self.file.seek(SeekFrom::Start(target))?;
        Ok(self.pos)
    }

    fn offset(&self) -> u64 {
        self.pos
    }

    fn len(&self) -> u64 {
        self.size
    }

    fn inflate(&mut self, out: &mut Vec<u8>, max_out: usize) -> Result<(), InflateError> {
        out.clear();
        self.inflater.reset(true);

        let start = self.pos;
        let mut consumed_total = 0u64;
        let mut in_pos = 0usize;
        let mut in_len = 0usize;
        let mut eof = false;

        loop {
            if in_pos == in_len && !eof {
                in_len = self.file.read(&mut self.in_buf).map_err(InflateError::io)?;
                in_pos = 0;
                eof = in_len == 0;
            }

            let before_in = self.inflater.total_in();
            let before_out = self.inflater.total_out();

            let status = self
                .inflater
                .decompress(
                    &self.in_buf[in_pos..in_len],
                    &mut self.scratch,
                    FlushDecompress::None,
                )
                .map_err(|_| InflateError::Backend)?;

            let consumed = (self.inflater.total_in() - before_in) as usize;
            let produced = (self.inflater.total_out() - before_out) as usize;
            in_pos += consumed;
            consumed_total += consumed as u64;

            if produced != 0 {
                if out.len() + produced > max_out {
                    return Err(InflateError::LimitExceeded);
                }
                out.extend_from_slice(&self.scratch[..produced]);
            }

            match status {
                Status::StreamEnd => {
                    // Reposition to one byte past the compressed stream; the
                    // chunked reads above may have overshot it.
                    let end = start + consumed_total;
                    self.pos = self.file.seek(SeekFrom::Start(end)).map_err(InflateError::io)?;
                    return Ok(());
                }
                Status::Ok | Status::BufError => {
                    if consumed == 0 && produced == 0 {
                        if eof {
                            return Err(InflateError::TruncatedInput);
                        }
                        if in_pos < in_len {
                            return Err(InflateError::Stalled);
                        }
                    }
                }
            }
        }
    }
}

/// Resolves a `SeekFrom` against the current position and total size.
fn resolve_seek(pos: SeekFrom, current: u64, size: u64) -> io::Result<u64> {
    let target = match pos {
        SeekFrom::Start(offset) => Some(offset),
        SeekFrom::Current(delta) => current.checked_add_signed(delta),
        SeekFrom::End(delta) => size.checked_add_signed(delta),
    };
    target.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek before byte 0"))
}

/// Inflates a complete in-memory zlib stream with a hard output cap.
///
/// Returns the number of input bytes consumed. Used by the loose-object
/// path, which reads whole files; pack entries stream through a
/// [`PackReader`] instead.
pub fn inflate_limited(
    input: &[u8],
    out: &mut Vec<u8>,
    max_out: usize,
) -> Result<usize, InflateError> {
    out.clear();
    let mut inflater = Decompress::new(true);
    let mut scratch = vec![0u8; INFLATE_BUF_SIZE];
    let mut in_pos = 0usize;

    loop {
        let before_in = inflater.total_in();
        let before_out = inflater.total_out();

        let status = inflater
            .decompress(&input[in_pos..], &mut scratch, FlushDecompress::None)
            .map_err(|_| InflateError::Backend)?;

        let consumed = (inflater.total_in() - before_in) as usize;
        let produced = (inflater.total_out() - before_out) as usize;
        in_pos += consumed;

        if produced != 0 {
            if out.len() + produced > max_out {
                return Err(InflateError::LimitExceeded);
            }
            out.extend_from_slice(&scratch[..produced]);
        }

        match status {
            Status::StreamEnd => return Ok(in_pos),
            Status::Ok | Status::BufError => {
                if consumed == 0 && produced == 0 {
                    if in_pos >= input.len() {
                        return Err(InflateError::TruncatedInput);
                    }
                    return Err(InflateError::Stalled);
                }
            }
        }
    }
}
