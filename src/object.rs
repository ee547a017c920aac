//! Typed objects and the sparse-reference mechanism.
//!
//! The four object kinds become a tagged variant, [`Object`]; operations
//! common to all kinds (id, kind) live on the wrapper. Intra-object links
//! (tree children, commit parents, tag targets) are [`SparseObject`]
//! handles holding only an ID: the target is fetched on first dereference
//! and the outcome, success or failure, is memoized. This keeps the
//! object graph a DAG over IDs and prevents materializing a whole
//! repository when a single commit is opened.

use std::fmt;
use std::sync::OnceLock;

use crate::commit::Commit;
use crate::errors::ObjectError;
use crate::object_id::ObjectId;
use crate::repo::Repository;
use crate::tag::Tag;
use crate::tree::Tree;

/// The four Git object kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    /// Returns the canonical header token for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
            Self::Tag => "tag",
        }
    }

    /// Parses a header token (`blob`, `tree`, `commit`, `tag`).
    #[must_use]
    pub fn from_token(token: &[u8]) -> Option<Self> {
        match token {
            b"blob" => Some(Self::Blob),
            b"tree" => Some(Self::Tree),
            b"commit" => Some(Self::Commit),
            b"tag" => Some(Self::Tag),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw object body with its kind, before typed parsing.
///
/// Produced by the loose and pack paths; consumed by the repository
/// façade's parser dispatch.
#[derive(Debug)]
pub struct RawObject {
    /// The object kind recorded in the container.
    pub kind: ObjectKind,
    /// The full uncompressed body.
    pub data: Vec<u8>,
}

/// A fully parsed object of any kind.
#[derive(Debug)]
pub enum Object {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl Object {
    /// Returns the object's ID.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        match self {
            Self::Blob(blob) => blob.id(),
            Self::Tree(tree) => tree.id(),
            Self::Commit(commit) => commit.id(),
            Self::Tag(tag) => tag.id(),
        }
    }

    /// Returns the object's kind.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Blob(_) => ObjectKind::Blob,
            Self::Tree(_) => ObjectKind::Tree,
            Self::Commit(_) => ObjectKind::Commit,
            Self::Tag(_) => ObjectKind::Tag,
        }
    }

    /// Returns the blob, if this is one.
    #[must_use]
    pub fn as_blob(&self) -> Option<&Blob> {
        match self {
            Self::Blob(blob) => Some(blob),
            _ => None,
        }
    }

    /// Returns the tree, if this is one.
    #[must_use]
    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            Self::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    /// Returns the commit, if this is one.
    #[must_use]
    pub fn as_commit(&self) -> Option<&Commit> {
        match self {
            Self::Commit(commit) => Some(commit),
            _ => None,
        }
    }

    /// Returns the tag, if this is one.
    #[must_use]
    pub fn as_tag(&self) -> Option<&Tag> {
        match self {
            Self::Tag(tag) => Some(tag),
            _ => None,
        }
    }
}

/// A blob: raw bytes, parsed as identity.
#[derive(Debug)]
pub struct Blob {
    id: ObjectId,
    data: Vec<u8>,
}

impl Blob {
    pub(crate) fn new(id: ObjectId, data: Vec<u8>) -> Self {
        Self { id, data }
    }

    /// Returns the blob's ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Returns the blob's bytes.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A lazily resolved link to another object.
///
/// # Invariants
/// - Before the first `resolve`, only the ID is populated.
/// - After the first `resolve`, exactly one of object or error is cached;
///   subsequent calls return the same outcome without touching storage.
pub struct SparseObject {
    id: ObjectId,
    slot: OnceLock<Result<Box<Object>, ObjectError>>,
}

impl SparseObject {
    pub(crate) fn new(id: ObjectId) -> Self {
        Self {
            id,
            slot: OnceLock::new(),
        }
    }

    /// Returns the target's ID without resolving it.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Returns true if a previous `resolve` succeeded.
    #[must_use]
    pub fn resolved(&self) -> bool {
        matches!(self.slot.get(), Some(Ok(_)))
    }

    /// Returns the resolved object if a previous `resolve` succeeded.
    #[must_use]
    pub fn get(&self) -> Option<&Object> {
        match self.slot.get() {
            Some(Ok(obj)) => Some(obj),
            _ => None,
        }
    }

    /// Resolves the target through the repository, memoizing the outcome.
    ///
    /// The first call performs the lookup; every later call returns the
    /// cached object or a clone of the cached error.
    pub fn resolve<'a>(&'a self, repo: &Repository) -> Result<&'a Object, ObjectError> {
        let outcome = self
            .slot
            .get_or_init(|| repo.object(self.id).map(Box::new));
        match outcome {
            Ok(obj) => Ok(obj),
            Err(err) => Err(err.clone()),
        }
    }
}

impl fmt::Debug for SparseObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseObject")
            .field("id", &self.id)
            .field("resolved", &self.resolved())
            .finish()
    }
}
