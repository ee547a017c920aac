//! Repository façade.
//!
//! Opens a repository root (bare or worktree layout), serves object
//! lookups through the loose path with a pack fallback, and materializes
//! typed objects. The single pack is opened lazily on the first loose
//! miss and kept for the repository's lifetime; its handle mutates seek
//! position, so access is serialized behind a mutex and the repository
//! can be shared across threads.
//!
//! Data flow for a lookup: ID, loose path attempt, on miss a pack index
//! lookup, pack offset, entry decode (with recursive delta resolution),
//! raw body, typed parse.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use crate::commit::Commit;
use crate::errors::{ObjectError, RefError, RepoOpenError};
use crate::loose::read_loose;
use crate::object::{Blob, Object, ObjectKind, RawObject, SparseObject};
use crate::object_id::ObjectId;
use crate::pack::{Pack, PackError};
use crate::refs::PackedRefs;
use crate::tag::Tag;
use crate::tree::{Tree, TreeEntryCache};

/// Hard caps for object reading.
///
/// Limits are guardrails against unbounded allocation on corrupt input;
/// exceeding one surfaces as an error, never silent truncation.
#[derive(Clone, Copy, Debug)]
pub struct ReadLimits {
    /// Maximum inflated object size in bytes.
    pub max_object_bytes: usize,
    /// Maximum inflated delta stream size in bytes.
    pub max_delta_bytes: usize,
    /// Maximum bytes in a pack entry header.
    pub max_header_bytes: usize,
    /// Maximum delta chain depth (counts delta edges).
    pub max_delta_depth: u8,
}

impl ReadLimits {
    /// Defaults sized for large repositories.
    pub const DEFAULT: Self = Self {
        max_object_bytes: 256 * 1024 * 1024,
        max_delta_bytes: 64 * 1024 * 1024,
        max_header_bytes: 32,
        max_delta_depth: 50,
    };
}

impl Default for ReadLimits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Lazily opened pack state.
#[derive(Debug)]
enum PackState {
    /// No loose miss has triggered a pack scan yet.
    Unopened,
    /// The pack directory holds no pack; lookups stop at loose storage.
    Absent,
    /// The single pack, open for the repository's lifetime.
    Open(Box<Pack>),
}

/// An open repository.
pub struct Repository {
    path: PathBuf,
    root: PathBuf,
    bare: bool,
    limits: ReadLimits,
    pack: Mutex<PackState>,
    packed_refs: OnceLock<Result<PackedRefs, RefError>>,
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .field("bare", &self.bare)
            .finish()
    }
}

impl Repository {
    /// Opens a repository with default limits.
    ///
    /// The path is canonicalized first. A directory whose path ends in
    /// `.git` is treated as a bare repository; otherwise a `.git` child
    /// directory is required.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepoOpenError> {
        Self::open_with_limits(path, ReadLimits::DEFAULT)
    }

    /// Opens a repository with explicit read limits.
    pub fn open_with_limits(
        path: impl AsRef<Path>,
        limits: ReadLimits,
    ) -> Result<Self, RepoOpenError> {
        let path =
            fs::canonicalize(path.as_ref()).map_err(RepoOpenError::canonicalization)?;
        let meta = fs::metadata(&path).map_err(RepoOpenError::io)?;
        if !meta.is_dir() {
            return Err(RepoOpenError::NotARepository { path });
        }

        let bare = path.to_string_lossy().ends_with(".git");
        let root = if bare {
            path.clone()
        } else {
            let dot_git = path.join(".git");
            let is_dir = fs::metadata(&dot_git)
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if !is_dir {
                return Err(RepoOpenError::NotARepository { path });
            }
            dot_git
        };

        Ok(Self {
            path,
            root,
            bare,
            limits,
            pack: Mutex::new(PackState::Unopened),
            packed_refs: OnceLock::new(),
        })
    }

    /// Returns the path the repository was opened with.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true for a bare layout.
    #[inline]
    #[must_use]
    pub fn is_bare(&self) -> bool {
        self.bare
    }

    /// Returns the Git directory (the repository root for object storage).
    #[inline]
    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    /// Fetches and parses the object with the given ID.
    ///
    /// Tries the loose path first; on a miss the pack is opened lazily
    /// and consulted. An ID in neither place is `NotFound`.
    pub fn object(&self, id: ObjectId) -> Result<Object, ObjectError> {
        let raw = self.read_raw(&id)?;
        self.parse_object(id, raw)
    }

    /// Resolves a sparse handle through this repository.
    ///
    /// A no-op returning the cached outcome if the handle was already
    /// resolved.
    pub fn resolve<'a>(&self, sparse: &'a SparseObject) -> Result<&'a Object, ObjectError> {
        sparse.resolve(self)
    }

    /// Fetches the raw body for an ID: loose first, then the pack.
    fn read_raw(&self, id: &ObjectId) -> Result<RawObject, ObjectError> {
        if let Some(raw) = read_loose(&self.root, id, &self.limits)? {
            return Ok(raw);
        }

        let mut state = self.lock_pack();
        if matches!(*state, PackState::Unopened) {
            *state = self.scan_pack_dir()?;
        }
        match &mut *state {
            PackState::Absent => Err(ObjectError::NotFound { id: *id }),
            PackState::Open(pack) => match pack.entry(id) {
                Ok(raw) => Ok(raw),
                Err(PackError::NotFound) => Err(ObjectError::NotFound { id: *id }),
                Err(err) => Err(err.into()),
            },
            PackState::Unopened => unreachable!("pack state initialized above"),
        }
    }

    /// Scans `objects/pack` for the single admissible pack file.
    fn scan_pack_dir(&self) -> Result<PackState, ObjectError> {
        let pack_dir = self.root.join("objects").join("pack");
        let entries = match fs::read_dir(&pack_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(PackState::Absent),
            Err(err) => return Err(ObjectError::io(err)),
        };

        let mut packs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(ObjectError::io)?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("pack-") && name.ends_with(".pack") {
                packs.push(entry.path());
            }
        }

        match packs.len() {
            0 => Ok(PackState::Absent),
            1 => Ok(PackState::Open(Box::new(Pack::open(
                &packs[0],
                self.limits,
            )?))),
            count => Err(ObjectError::AmbiguousPack { count }),
        }
    }

    /// Dispatches a raw body to the parser for its kind.
    fn parse_object(&self, id: ObjectId, raw: RawObject) -> Result<Object, ObjectError> {
        match raw.kind {
            ObjectKind::Blob => Ok(Object::Blob(Blob::new(id, raw.data))),
            ObjectKind::Tree => Ok(Object::Tree(Tree::parse(
                id,
                &raw.data,
                TreeEntryCache::global(),
            )?)),
            ObjectKind::Commit => Ok(Object::Commit(Commit::parse(id, &raw.data)?)),
            ObjectKind::Tag => Ok(Object::Tag(Tag::parse(id, &raw.data)?)),
        }
    }

    /// Returns the parsed `packed-refs`, loading it on first use.
    pub(crate) fn packed_refs(&self) -> Result<&PackedRefs, RefError> {
        let outcome = self
            .packed_refs
            .get_or_init(|| PackedRefs::load(&self.root));
        match outcome {
            Ok(packed) => Ok(packed),
            Err(err) => Err(err.clone()),
        }
    }

    fn lock_pack(&self) -> MutexGuard<'_, PackState> {
        // A poisoned pack lock only means another reader panicked mid-seek;
        // the next entry decode re-seeks from scratch.
        self.pack.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
