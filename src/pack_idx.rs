//! Parser for Git pack index (`.idx`) v2 files.
//!
//! The index owns its raw bytes; table accessors slice into the buffer at
//! offsets computed once at parse time. Version 2 is the only supported
//! format.
//!
//! # Layout (v2)
//! ```text
//! +----------------+
//! | Magic (4B)     |  0xff 't' 'O' 'c'
//! | Version (4B)   |  big-endian 2
//! +----------------+
//! | Fanout (1024B) |  256 * u32 BE cumulative counts
//! +----------------+
//! | OID Table      |  N * 20 bytes (sorted)
//! +----------------+
//! | CRC Table      |  N * 4 bytes (not verified)
//! +----------------+
//! | Offset Table   |  N * 4 bytes (MSB set -> large offset)
//! +----------------+
//! | Large Offsets  |  M * 8 bytes (optional)
//! +----------------+
//! | Pack Hash      |  20 bytes
//! | Index Hash     |  20 bytes, SHA-1 of everything before it
//! +----------------+
//! ```
//!
//! # Invariants
//! - Fanout values are non-decreasing; `object_count == fanout[255]`.
//! - All table regions are validated to lie within the buffer.
//! - The trailing self-hash is verified at parse time.

use std::fmt;

use sha1::{Digest, Sha1};

use crate::object_id::{ObjectId, OID_LEN};

/// Pack index magic bytes for the v2 format.
const IDX_MAGIC: [u8; 4] = [0xff, b't', b'O', b'c'];
/// The only supported index version.
const IDX_VERSION: u32 = 2;
/// Header size: 4 magic + 4 version.
const IDX_HEADER_SIZE: usize = 8;
/// Fanout table size in bytes.
const FANOUT_SIZE: usize = 256 * 4;
/// MSB flag marking a large-offset indirection.
const LARGE_OFFSET_FLAG: u32 = 0x8000_0000;

/// Errors from pack index parsing and lookup.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum IdxError {
    /// A header, magic, or table size does not match the v2 layout.
    Malformed { detail: &'static str },
    /// The index version is not 2.
    UnsupportedVersion { version: u32 },
    /// The trailing SHA-1 self-hash does not match the file contents.
    Corrupt,
    /// A large-offset indirection points outside the large-offset table.
    LargeOffsetOutOfBounds { index: u32, count: u32 },
}

impl IdxError {
    #[inline]
    const fn malformed(detail: &'static str) -> Self {
        Self::Malformed { detail }
    }
}

impl fmt::Display for IdxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { detail } => write!(f, "malformed pack index: {detail}"),
            Self::UnsupportedVersion { version } => {
                write!(f, "unsupported pack index version: {version} (expected 2)")
            }
            Self::Corrupt => write!(f, "pack index self-hash mismatch"),
            Self::LargeOffsetOutOfBounds { index, count } => {
                write!(f, "large offset index out of bounds: {index} >= {count}")
            }
        }
    }
}

impl std::error::Error for IdxError {}

/// A parsed pack index v2.
///
/// Lookup runs a binary search over the fanout bucket for the ID's first
/// byte; large offsets are resolved through the 8-byte table on demand.
#[derive(Debug)]
pub struct PackIndex {
    data: Vec<u8>,
    object_count: u32,
    oid_table: usize,
    offset_table: usize,
    large_offsets: usize,
    large_offset_count: u32,
}

impl PackIndex {
    /// Parses an index file, taking ownership of its bytes.
    ///
    /// Validates the magic, version, fanout monotonicity, table sizes, and
    /// the trailing SHA-1 self-hash.
    pub fn parse(data: Vec<u8>) -> Result<Self, IdxError> {
        let min_size = IDX_HEADER_SIZE + FANOUT_SIZE + 2 * OID_LEN;
        if data.len() < min_size {
            return Err(IdxError::malformed("file too small"));
        }

        if data[0..4] != IDX_MAGIC {
            return Err(IdxError::malformed("invalid magic"));
        }
        let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if version != IDX_VERSION {
            return Err(IdxError::UnsupportedVersion { version });
        }

        let fanout = &data[IDX_HEADER_SIZE..IDX_HEADER_SIZE + FANOUT_SIZE];
        let object_count = validate_fanout(fanout)?;

        let n = object_count as usize;
        let oid_table = IDX_HEADER_SIZE + FANOUT_SIZE;
        let crc_table = oid_table + n * OID_LEN;
        let offset_table = crc_table + n * 4;
        let offset_table_end = offset_table + n * 4;
        let trailer = data.len() - 2 * OID_LEN;

        if offset_table_end > trailer {
            return Err(IdxError::malformed("tables exceed file size"));
        }

        let large_offsets = offset_table_end;
        let large_bytes = trailer - large_offsets;
        if large_bytes % 8 != 0 {
            return Err(IdxError::malformed(
                "large offset table not a multiple of 8 bytes",
            ));
        }
        let large_offset_count = (large_bytes / 8) as u32;

        let mut hasher = Sha1::new();
        hasher.update(&data[..data.len() - OID_LEN]);
        let digest = hasher.finalize();
        if digest.as_slice() != &data[data.len() - OID_LEN..] {
            return Err(IdxError::Corrupt);
        }

        Ok(Self {
            data,
            object_count,
            oid_table,
            offset_table,
            large_offsets,
            large_offset_count,
        })
    }

    /// Returns the number of objects indexed.
    #[inline]
    #[must_use]
    pub fn object_count(&self) -> u32 {
        self.object_count
    }

    /// Returns the fanout value for a first-byte value.
    ///
    /// This is the exclusive upper bound of the bucket for that byte.
    #[inline]
    #[must_use]
    pub fn fanout(&self, first_byte: u8) -> u32 {
        let off = IDX_HEADER_SIZE + first_byte as usize * 4;
        u32::from_be_bytes([
            self.data[off],
            self.data[off + 1],
            self.data[off + 2],
            self.data[off + 3],
        ])
    }

    /// Returns the raw OID bytes at the given sorted position.
    #[inline]
    #[must_use]
    pub fn oid_at(&self, idx: u32) -> &[u8] {
        debug_assert!(idx < self.object_count, "OID index out of bounds");
        let start = self.oid_table + idx as usize * OID_LEN;
        &self.data[start..start + OID_LEN]
    }

    /// Returns the pack offset for the object at the given position.
    ///
    /// Follows the large-offset indirection when the high bit is set.
    pub fn offset_at(&self, idx: u32) -> Result<u64, IdxError> {
        debug_assert!(idx < self.object_count, "offset index out of bounds");
        let start = self.offset_table + idx as usize * 4;
        let raw = u32::from_be_bytes([
            self.data[start],
            self.data[start + 1],
            self.data[start + 2],
            self.data[start + 3],
        ]);

        if raw & LARGE_OFFSET_FLAG == 0 {
            return Ok(raw as u64);
        }

        let large_idx = raw & !LARGE_OFFSET_FLAG;
        if large_idx >= self.large_offset_count {
            return Err(IdxError::LargeOffsetOutOfBounds {
                index: large_idx,
                count: self.large_offset_count,
            });
        }
        let start = self.large_offsets + large_idx as usize * 8;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.data[start..start + 8]);
        Ok(u64::from_be_bytes(bytes))
    }

    /// Resolves an ID to its pack offset via fanout-bucketed binary search.
    ///
    /// Returns `Ok(None)` if the ID is not in the index.
    pub fn lookup(&self, id: &ObjectId) -> Result<Option<u64>, IdxError> {
        let first = id.first_byte();
        let mut lo = if first == 0 { 0 } else { self.fanout(first - 1) };
        let mut hi = self.fanout(first);
        if hi > self.object_count {
            return Err(IdxError::malformed("fanout exceeds object count"));
        }

        let target = id.as_bytes().as_slice();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.oid_at(mid).cmp(target) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return self.offset_at(mid).map(Some),
            }
        }
        Ok(None)
    }

    /// Returns an iterator over IDs in sorted (on-disk) order.
    pub fn iter_oids(&self) -> impl Iterator<Item = (&[u8], u32)> + '_ {
        (0..self.object_count).map(|idx| (self.oid_at(idx), idx))
    }

    /// Returns the pack-file hash recorded in the trailer.
    #[must_use]
    pub fn pack_hash(&self) -> ObjectId {
        let start = self.data.len() - 2 * OID_LEN;
        ObjectId::try_from_slice(&self.data[start..start + OID_LEN])
            .expect("trailer length validated at parse")
    }
}

/// Validates fanout monotonicity and returns the total object count.
fn validate_fanout(fanout: &[u8]) -> Result<u32, IdxError> {
    debug_assert_eq!(fanout.len(), FANOUT_SIZE);

    let mut prev = 0u32;
    for chunk in fanout.chunks_exact(4) {
        let val = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if val < prev {
            return Err(IdxError::malformed("fanout not monotonic"));
        }
        prev = val;
    }
    Ok(prev)
}
