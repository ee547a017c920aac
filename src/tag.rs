//! Annotated tag parsing.
//!
//! A tag body carries `object`, `type`, `tag`, and `tagger` header lines,
//! then a blank line and the message. The target is held as a sparse
//! handle alongside the declared target kind.

use crate::commit::{header_line, message_after_headers};
use crate::errors::ObjectError;
use crate::object::{ObjectKind, SparseObject};
use crate::object_id::ObjectId;
use crate::signature::Signature;

/// A parsed annotated tag.
#[derive(Debug)]
pub struct Tag {
    id: ObjectId,
    target: SparseObject,
    target_kind: ObjectKind,
    name: String,
    tagger: Signature,
    message: Vec<u8>,
}

impl Tag {
    /// Parses a tag body.
    pub(crate) fn parse(id: ObjectId, data: &[u8]) -> Result<Self, ObjectError> {
        let (value, rest) =
            header_line(data, b"object ").ok_or(ObjectError::malformed("missing object header"))?;
        let target_id =
            ObjectId::from_hex(value).ok_or(ObjectError::malformed("invalid target id"))?;

        let (value, rest) =
            header_line(rest, b"type ").ok_or(ObjectError::malformed("missing type header"))?;
        let target_kind =
            ObjectKind::from_token(value).ok_or(ObjectError::malformed("unknown target type"))?;

        let (value, rest) =
            header_line(rest, b"tag ").ok_or(ObjectError::malformed("missing tag header"))?;
        let name = String::from_utf8_lossy(value).into_owned();

        let (value, rest) =
            header_line(rest, b"tagger ").ok_or(ObjectError::malformed("missing tagger header"))?;
        let tagger = Signature::parse(value)?;

        let message = message_after_headers(rest)?.to_vec();

        Ok(Self {
            id,
            target: SparseObject::new(target_id),
            target_kind,
            name,
            tagger,
            message,
        })
    }

    /// Returns the tag's ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Returns the sparse handle to the tagged object.
    #[inline]
    #[must_use]
    pub fn target(&self) -> &SparseObject {
        &self.target
    }

    /// Returns the declared kind of the tagged object.
    #[inline]
    #[must_use]
    pub fn target_kind(&self) -> ObjectKind {
        self.target_kind
    }

    /// Returns the tag name (the `tag` header value).
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tagger signature.
    #[inline]
    #[must_use]
    pub fn tagger(&self) -> &Signature {
        &self.tagger
    }

    /// Returns the raw message bytes.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &[u8] {
        &self.message
    }
}
