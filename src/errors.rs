//! Error types for repository open, reference resolution, and object access.
//!
//! Errors are stage-specific to keep diagnostics precise: the pack, index,
//! and delta layers define their own enums next to their parsers, and the
//! repository façade wraps them into [`ObjectError`] unchanged. All enums
//! at the API boundary are `#[non_exhaustive]`; consumers should include a
//! fallback match arm.
//!
//! Error values are cloneable because object resolution outcomes are
//! memoized inside sparse handles; I/O sources are held behind `Arc` to
//! keep the clones cheap while preserving the original error for
//! diagnostics.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::object_id::ObjectId;
use crate::pack::PackError;

/// Errors from repository discovery and open.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum RepoOpenError {
    /// I/O error during layout inspection.
    Io(Arc<io::Error>),
    /// Path canonicalization failed.
    Canonicalization(Arc<io::Error>),
    /// The path is not a Git repository (no `.git` child, not bare).
    NotARepository { path: PathBuf },
}

impl RepoOpenError {
    #[inline]
    pub(crate) fn io(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }

    #[inline]
    pub(crate) fn canonicalization(err: io::Error) -> Self {
        Self::Canonicalization(Arc::new(err))
    }
}

impl fmt::Display for RepoOpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Canonicalization(err) => write!(f, "path canonicalization failed: {err}"),
            Self::NotARepository { path } => {
                write!(f, "not a Git repository: {}", path.display())
            }
        }
    }
}

impl std::error::Error for RepoOpenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) | Self::Canonicalization(err) => Some(err.as_ref()),
            Self::NotARepository { .. } => None,
        }
    }
}

/// Errors from reference resolution (`HEAD`, loose refs, `packed-refs`).
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum RefError {
    /// The named reference does not exist, loose or packed.
    NotFound { name: String },
    /// A ref file or `packed-refs` line does not match the expected shape.
    MalformedRef { detail: &'static str },
    /// I/O error while reading ref files.
    Io(Arc<io::Error>),
}

impl RefError {
    #[inline]
    pub(crate) fn io(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl fmt::Display for RefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { name } => write!(f, "ref not found: {name}"),
            Self::MalformedRef { detail } => write!(f, "malformed ref: {detail}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for RefError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Errors from object lookup and parsing, surfaced by the repository façade.
///
/// Pack, index, and delta failures are wrapped unchanged so callers can
/// match on the precise failure kind.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum ObjectError {
    /// The object is present in neither loose storage nor the pack, or a
    /// tree path component does not exist.
    NotFound { id: ObjectId },
    /// More than one pack file is present in `objects/pack`.
    AmbiguousPack { count: usize },
    /// A loose object header or an object body does not match its grammar.
    Malformed { detail: &'static str },
    /// Pack container, index, or delta failure.
    Pack(PackError),
    /// Underlying filesystem or decompressor failure.
    Io(Arc<io::Error>),
}

impl ObjectError {
    #[inline]
    pub(crate) fn io(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }

    /// Constructs a malformed-object error with a static detail string.
    #[inline]
    pub(crate) const fn malformed(detail: &'static str) -> Self {
        Self::Malformed { detail }
    }
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "object not found: {id}"),
            Self::AmbiguousPack { count } => {
                write!(f, "found {count} pack files (expected at most 1)")
            }
            Self::Malformed { detail } => write!(f, "malformed object: {detail}"),
            Self::Pack(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for ObjectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Pack(err) => Some(err),
            Self::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<PackError> for ObjectError {
    fn from(err: PackError) -> Self {
        Self::Pack(err)
    }
}
