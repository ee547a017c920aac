//! Commit object parsing.
//!
//! A commit body is a run of header lines, a blank line, then the message:
//!
//! ```text
//! tree <40-hex>\n
//! parent <40-hex>\n    (zero or more, order preserved)
//! author <user-line>\n
//! committer <user-line>\n
//! \n
//! <message bytes>
//! ```
//!
//! Headers the grammar does not model (`gpgsig`, `encoding`, `mergetag`,
//! including their continuation lines) are skipped between the committer
//! line and the blank separator.

use memchr::memchr;

use crate::errors::ObjectError;
use crate::object::SparseObject;
use crate::object_id::ObjectId;
use crate::signature::Signature;

/// A parsed commit.
///
/// The tree and parents are sparse handles; resolving them walks the
/// repository on demand.
#[derive(Debug)]
pub struct Commit {
    id: ObjectId,
    tree: SparseObject,
    parents: Vec<SparseObject>,
    author: Signature,
    committer: Signature,
    message: Vec<u8>,
}

impl Commit {
    /// Parses a commit body.
    pub(crate) fn parse(id: ObjectId, data: &[u8]) -> Result<Self, ObjectError> {
        let (value, rest) =
            header_line(data, b"tree ").ok_or(ObjectError::malformed("missing tree header"))?;
        let tree_id =
            ObjectId::from_hex(value).ok_or(ObjectError::malformed("invalid tree id"))?;
        let mut data = rest;

        let mut parents = Vec::new();
        while let Some((value, rest)) = header_line(data, b"parent ") {
            let parent_id =
                ObjectId::from_hex(value).ok_or(ObjectError::malformed("invalid parent id"))?;
            parents.push(SparseObject::new(parent_id));
            data = rest;
        }

        let (value, rest) = header_line(data, b"author ")
            .ok_or(ObjectError::malformed("missing author header"))?;
        let author = Signature::parse(value)?;
        let (value, rest) = header_line(rest, b"committer ")
            .ok_or(ObjectError::malformed("missing committer header"))?;
        let committer = Signature::parse(value)?;

        let message = message_after_headers(rest)?.to_vec();

        Ok(Self {
            id,
            tree: SparseObject::new(tree_id),
            parents,
            author,
            committer,
            message,
        })
    }

    /// Returns the commit's ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Returns the sparse handle to the commit's tree.
    #[inline]
    #[must_use]
    pub fn tree(&self) -> &SparseObject {
        &self.tree
    }

    /// Returns the parent handles in header order.
    #[inline]
    #[must_use]
    pub fn parents(&self) -> &[SparseObject] {
        &self.parents
    }

    /// Returns the author signature.
    #[inline]
    #[must_use]
    pub fn author(&self) -> &Signature {
        &self.author
    }

    /// Returns the committer signature.
    #[inline]
    #[must_use]
    pub fn committer(&self) -> &Signature {
        &self.committer
    }

    /// Returns the raw message bytes.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// Returns true for a root commit (no parents).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Returns true for a merge commit (two or more parents).
    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.parents.len() >= 2
    }
}

/// Splits off one `<prefix><value>\n` header line.
///
/// Returns the value and the remaining bytes, or `None` if `data` does not
/// start with the prefix or the line is unterminated.
pub(crate) fn header_line<'a>(data: &'a [u8], prefix: &[u8]) -> Option<(&'a [u8], &'a [u8])> {
    if !data.starts_with(prefix) {
        return None;
    }
    let rest = &data[prefix.len()..];
    let nl = memchr(b'\n', rest)?;
    Some((&rest[..nl], &rest[nl + 1..]))
}

/// Skips remaining header lines up to and including the blank separator.
///
/// Returns the message bytes. A body that ends right after its headers
/// yields an empty message.
pub(crate) fn message_after_headers(mut data: &[u8]) -> Result<&[u8], ObjectError> {
    loop {
        match data.first() {
            None => return Ok(b""),
            Some(b'\n') => return Ok(&data[1..]),
            Some(_) => {
                let nl = memchr(b'\n', data)
                    .ok_or(ObjectError::malformed("unterminated header line"))?;
                data = &data[nl + 1..];
            }
        }
    }
}
