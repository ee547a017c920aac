//! Loose object reading.
//!
//! Loose objects live at `objects/<first two hex>/<remaining 38 hex>` as a
//! single zlib stream. The inflated prefix is `"<type> <decimal-size>\0"`
//! followed by the body; the type token must be one of the four base kinds
//! and the declared size must equal the body length.

use std::fs;
use std::io;
use std::path::Path;

use memchr::memchr;

use crate::errors::ObjectError;
use crate::object::{ObjectKind, RawObject};
use crate::object_id::ObjectId;
use crate::pack_reader::{inflate_limited, InflateError};
use crate::repo::ReadLimits;

/// Allowance for the `"<type> <size>\0"` prefix on top of the body cap.
const HEADER_MAX_BYTES: usize = 32;

/// Reads a loose object, returning `None` if the file does not exist.
///
/// A present-but-unreadable or malformed file is an error; only a missing
/// file falls through to the pack lookup.
pub(crate) fn read_loose(
    root: &Path,
    id: &ObjectId,
    limits: &ReadLimits,
) -> Result<Option<RawObject>, ObjectError> {
    let hex = id.to_hex();
    let (shard, file) = hex.split_at(2);
    let path = root.join("objects").join(shard).join(file);

    let compressed = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(ObjectError::io(err)),
    };

    let max_out = limits.max_object_bytes.saturating_add(HEADER_MAX_BYTES);
    let mut inflated = Vec::with_capacity(compressed.len().saturating_mul(3).min(max_out));
    inflate_limited(&compressed, &mut inflated, max_out).map_err(|err| match err {
        InflateError::Io(err) => ObjectError::Io(err),
        _ => ObjectError::malformed("loose object zlib stream invalid"),
    })?;

    parse_loose(inflated, limits).map(Some)
}

/// Splits the inflated bytes into the header and body, validating both.
fn parse_loose(mut inflated: Vec<u8>, limits: &ReadLimits) -> Result<RawObject, ObjectError> {
    let space = memchr(b' ', &inflated).ok_or(ObjectError::malformed("loose header missing space"))?;
    let kind = ObjectKind::from_token(&inflated[..space])
        .ok_or(ObjectError::malformed("loose header has unknown type"))?;

    let after_space = &inflated[space + 1..];
    let nul =
        memchr(0, after_space).ok_or(ObjectError::malformed("loose header missing terminator"))?;
    let declared = parse_decimal(&after_space[..nul])
        .ok_or(ObjectError::malformed("loose header size not decimal"))?;

    let body_start = space + 1 + nul + 1;
    let body_len = inflated.len() - body_start;
    if declared != body_len {
        return Err(ObjectError::malformed("loose object size mismatch"));
    }
    if body_len > limits.max_object_bytes {
        return Err(ObjectError::malformed("loose object exceeds size cap"));
    }

    inflated.drain(..body_start);
    Ok(RawObject {
        kind,
        data: inflated,
    })
}

/// Parses an unsigned decimal with no sign or surrounding whitespace.
fn parse_decimal(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() || bytes.len() > 20 {
        return None;
    }
    let mut value: usize = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            return None;
        }
        value = value.checked_mul(10)?.checked_add((b - b'0') as usize)?;
    }
    Some(value)
}
