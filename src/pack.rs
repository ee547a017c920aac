//! Pack entry decoding and delta resolution.
//!
//! A [`Pack`] pairs a [`PackReader`] over the `.pack` file with its parsed
//! v2 index. Entry lookup resolves an ID to an offset through the index,
//! parses the variable-length entry header at that offset, and either
//! inflates the object body directly (base kinds) or recursively
//! materializes the delta base before applying the delta stream.
//!
//! # Entry header
//! One byte with a continuation MSB, a 3-bit type, and 4 low size bits;
//! continuation bytes contribute 7 bits each. The total uncompressed size
//! is `size0 | (sizeN << (4 + 7*(N-1)))`.
//!
//! | Code | Kind |
//! |------|------|
//! | 1    | commit |
//! | 2    | tree |
//! | 3    | blob |
//! | 4    | tag |
//! | 6    | offset-delta |
//! | 7    | reference-delta |
//! | 0, 5 | reserved |
//!
//! # Invariants
//! - An offset-delta base strictly precedes its entry in file order.
//! - Delta chains are bounded by `ReadLimits::max_delta_depth`.
//! - A base is fully materialized before its delta is applied.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use crate::delta::{apply_delta, DeltaError};
use crate::object::{ObjectKind, RawObject};
use crate::object_id::{ObjectId, OID_LEN};
use crate::pack_idx::{IdxError, PackIndex};
use crate::pack_reader::{open_pack_reader, InflateError, PackReader};
use crate::repo::ReadLimits;

/// Pack magic bytes.
const PACK_MAGIC: [u8; 4] = *b"PACK";
/// The only supported pack version.
const PACK_VERSION: u32 = 2;
/// Pack header size: magic(4) + version(4) + object count(4).
const PACK_HEADER_SIZE: usize = 12;
/// Maximum bytes in an offset-delta base field (ceil(64/7)).
const MAX_OFS_BYTES: usize = 10;

/// Errors from pack container parsing and entry decoding.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum PackError {
    /// I/O failure on the pack or index file.
    Io(Arc<io::Error>),
    /// A reserved entry type, impossible base offset, or malformed header.
    MalformedPack { detail: &'static str },
    /// The pack version is not 2.
    UnsupportedVersion { version: u32 },
    /// The ID is not present in the pack index.
    NotFound,
    /// A declared entry size exceeds the configured cap.
    ObjectTooLarge { size: u64, max: usize },
    /// A delta chain exceeded the configured depth ceiling.
    DeltaChainTooDeep { max: u8 },
    /// Index parsing or lookup failure.
    Idx(IdxError),
    /// Zlib inflation failure.
    Inflate(InflateError),
    /// Delta application failure.
    Delta(DeltaError),
}

impl PackError {
    #[inline]
    fn io(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }

    #[inline]
    const fn malformed(detail: &'static str) -> Self {
        Self::MalformedPack { detail }
    }
}

impl fmt::Display for PackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "pack I/O error: {err}"),
            Self::MalformedPack { detail } => write!(f, "malformed pack: {detail}"),
            Self::UnsupportedVersion { version } => {
                write!(f, "unsupported pack version: {version} (expected 2)")
            }
            Self::NotFound => write!(f, "object not found in pack"),
            Self::ObjectTooLarge { size, max } => {
                write!(f, "pack entry size {size} exceeds cap {max}")
            }
            Self::DeltaChainTooDeep { max } => {
                write!(f, "delta chain exceeds depth ceiling {max}")
            }
            Self::Idx(err) => write!(f, "{err}"),
            Self::Inflate(err) => write!(f, "{err}"),
            Self::Delta(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for PackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err.as_ref()),
            Self::Idx(err) => Some(err),
            Self::Inflate(err) => Some(err),
            Self::Delta(err) => Some(err),
            _ => None,
        }
    }
}

impl From<IdxError> for PackError {
    fn from(err: IdxError) -> Self {
        Self::Idx(err)
    }
}

impl From<InflateError> for PackError {
    fn from(err: InflateError) -> Self {
        Self::Inflate(err)
    }
}

impl From<DeltaError> for PackError {
    fn from(err: DeltaError) -> Self {
        Self::Delta(err)
    }
}

/// Parsed entry header: type code and declared uncompressed size.
///
/// For delta entries the size covers the delta stream, not the result.
#[derive(Clone, Copy, Debug)]
struct EntryHeader {
    code: u8,
    size: u64,
}

/// An open pack: reader over the `.pack` file plus its parsed index.
pub struct Pack {
    reader: Box<dyn PackReader>,
    index: PackIndex,
    object_count: u32,
    limits: ReadLimits,
}

impl fmt::Debug for Pack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pack")
            .field("object_count", &self.object_count)
            .field("indexed", &self.index.object_count())
            .finish()
    }
}

impl Pack {
    /// Opens a pack from its `.pack` path; the companion `.idx` is derived
    /// by swapping the extension.
    ///
    /// Prefers a memory-mapped reader, falling back to the buffered one.
    /// The 12-byte header is verified; the trailing pack hash is not.
    pub fn open(pack_path: &Path, limits: ReadLimits) -> Result<Self, PackError> {
        let idx_path = pack_path.with_extension("idx");
        let idx_bytes = fs::read(&idx_path).map_err(PackError::io)?;
        let index = PackIndex::parse(idx_bytes)?;

        let file = File::open(pack_path).map_err(PackError::io)?;
        let mut reader = open_pack_reader(file).map_err(PackError::io)?;
        let object_count = verify_header(reader.as_mut())?;

        Ok(Self {
            reader,
            index,
            object_count,
            limits,
        })
    }

    /// Returns the parsed pack index.
    #[inline]
    #[must_use]
    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    /// Returns the object count from the pack header.
    #[inline]
    #[must_use]
    pub fn object_count(&self) -> u32 {
        self.object_count
    }

    /// Returns true if the index lists the ID.
    #[must_use]
    pub fn contains(&self, id: &ObjectId) -> bool {
        matches!(self.index.lookup(id), Ok(Some(_)))
    }

    /// Decodes the entry for an ID, resolving deltas to the full body.
    pub fn entry(&mut self, id: &ObjectId) -> Result<RawObject, PackError> {
        let offset = self.index.lookup(id)?.ok_or(PackError::NotFound)?;
        self.entry_at(offset, self.limits.max_delta_depth)
    }

    /// Decodes the entry at a pack offset, resolving deltas.
    pub fn entry_at_offset(&mut self, offset: u64) -> Result<RawObject, PackError> {
        self.entry_at(offset, self.limits.max_delta_depth)
    }

    fn entry_at(&mut self, offset: u64, depth: u8) -> Result<RawObject, PackError> {
        self.reader
            .seek(SeekFrom::Start(offset))
            .map_err(PackError::io)?;
        let header = read_entry_header(self.reader.as_mut(), self.limits.max_header_bytes)?;

        match header.code {
            1..=4 => {
                if header.size > self.limits.max_object_bytes as u64 {
                    return Err(PackError::ObjectTooLarge {
                        size: header.size,
                        max: self.limits.max_object_bytes,
                    });
                }
                let kind = base_kind(header.code);
                let size = header.size as usize;
                let mut data = Vec::with_capacity(size);
                self.reader.inflate(&mut data, size)?;
                if data.len() != size {
                    return Err(PackError::malformed("entry body shorter than declared"));
                }
                Ok(RawObject { kind, data })
            }
            6 => {
                if depth == 0 {
                    return Err(PackError::DeltaChainTooDeep {
                        max: self.limits.max_delta_depth,
                    });
                }
                let distance = read_ofs_distance(self.reader.as_mut())?;
                if distance == 0 || distance > offset {
                    return Err(PackError::malformed("delta base offset out of range"));
                }
                let base_offset = offset - distance;
                let delta = self.read_delta_payload(&header)?;
                let base = self.entry_at(base_offset, depth - 1)?;
                self.apply(base, &delta)
            }
            7 => {
                if depth == 0 {
                    return Err(PackError::DeltaChainTooDeep {
                        max: self.limits.max_delta_depth,
                    });
                }
                let mut id_bytes = [0u8; OID_LEN];
                self.reader
                    .read_exact(&mut id_bytes)
                    .map_err(PackError::io)?;
                let base_id = ObjectId::new(id_bytes);
                let delta = self.read_delta_payload(&header)?;
                let base_offset = self
                    .index
                    .lookup(&base_id)?
                    .ok_or(PackError::NotFound)?;
                let base = self.entry_at(base_offset, depth - 1)?;
                self.apply(base, &delta)
            }
            0 | 5 => Err(PackError::malformed("reserved entry type")),
            _ => Err(PackError::malformed("unknown entry type")),
        }
    }

    /// Inflates a delta stream of the declared size at the current offset.
    fn read_delta_payload(&mut self, header: &EntryHeader) -> Result<Vec<u8>, PackError> {
        if header.size > self.limits.max_delta_bytes as u64 {
            return Err(PackError::ObjectTooLarge {
                size: header.size,
                max: self.limits.max_delta_bytes,
            });
        }
        let size = header.size as usize;
        let mut delta = Vec::with_capacity(size);
        self.reader.inflate(&mut delta, size)?;
        if delta.len() != size {
            return Err(PackError::malformed("delta payload shorter than declared"));
        }
        Ok(delta)
    }

    /// Applies a delta to its materialized base, keeping the base's kind.
    fn apply(&self, base: RawObject, delta: &[u8]) -> Result<RawObject, PackError> {
        let mut data = Vec::new();
        apply_delta(&base.data, delta, &mut data, self.limits.max_object_bytes)?;
        Ok(RawObject {
            kind: base.kind,
            data,
        })
    }
}

/// Maps a base type code (1-4) to its object kind.
fn base_kind(code: u8) -> ObjectKind {
    match code {
        1 => ObjectKind::Commit,
        2 => ObjectKind::Tree,
        3 => ObjectKind::Blob,
        4 => ObjectKind::Tag,
        _ => unreachable!("caller matched 1..=4"),
    }
}

/// Verifies the 12-byte pack header and returns the object count.
fn verify_header(reader: &mut dyn PackReader) -> Result<u32, PackError> {
    reader.seek(SeekFrom::Start(0)).map_err(PackError::io)?;
    let mut header = [0u8; PACK_HEADER_SIZE];
    reader.read_exact(&mut header).map_err(PackError::io)?;

    if header[0..4] != PACK_MAGIC {
        return Err(PackError::malformed("bad pack magic"));
    }
    let version = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    if version != PACK_VERSION {
        return Err(PackError::UnsupportedVersion { version });
    }
    Ok(u32::from_be_bytes([
        header[8], header[9], header[10], header[11],
    ]))
}

/// Reads a variable-length entry header at the current offset.
fn read_entry_header(
    reader: &mut dyn PackReader,
    max_header_bytes: usize,
) -> Result<EntryHeader, PackError> {
    let first = reader.read_byte().map_err(PackError::io)?;
    let code = (first >> 4) & 0x07;
    let mut size = (first & 0x0f) as u64;
    let mut shift: u32 = 4;
    let mut byte = first;
    let mut read = 1usize;

    while byte & 0x80 != 0 {
        if read >= max_header_bytes {
            return Err(PackError::malformed("entry header too long"));
        }
        byte = reader.read_byte().map_err(PackError::io)?;
        read += 1;
        size |= ((byte & 0x7f) as u64) << shift;
        shift += 7;
        if shift > 63 {
            return Err(PackError::malformed("entry size overflow"));
        }
    }

    Ok(EntryHeader { code, size })
}

/// Reads an offset-delta base distance at the current offset.
///
/// The encoding is big-endian base-128 with a +1 bump per continuation:
/// starting from the first byte's low 7 bits, each subsequent byte
/// contributes `(acc + 1) << 7 | next`.
fn read_ofs_distance(reader: &mut dyn PackReader) -> Result<u64, PackError> {
    let mut byte = reader.read_byte().map_err(PackError::io)?;
    let mut value = (byte & 0x7f) as u64;
    let mut read = 1usize;

    while byte & 0x80 != 0 {
        if read >= MAX_OFS_BYTES {
            return Err(PackError::malformed("delta offset field too long"));
        }
        byte = reader.read_byte().map_err(PackError::io)?;
        read += 1;
        value = value
            .checked_add(1)
            .and_then(|v| v.checked_shl(7))
            .ok_or(PackError::malformed("delta offset overflow"))?
            | (byte & 0x7f) as u64;
    }
    Ok(value)
}
