//! Tree object parsing and path navigation.
//!
//! # Tree Object Format
//!
//! A tree body is a run of records with no framing between them:
//!
//! ```text
//! <mode> SP <name> NUL <20-byte id>
//! ```
//!
//! - `<mode>`: ASCII octal digits (e.g. `100644`, `40000`)
//! - `<name>`: non-empty bytes, no NUL, no `/`
//!
//! Each record becomes a [`TreeNode`]: an immutable [`TreeEntry`] shared
//! through the process-wide byte-budgeted LRU (keyed by the exact on-disk
//! row bytes), paired with this tree's own sparse handle to the child.
//! Sharing the entry deduplicates repeated subtree rows across commits and
//! skips re-parsing the octal mode; keeping the sparse handle per tree
//! keeps resolution outcomes local to the owning repository.
//!
//! # Entry Modes
//!
//! The high bits of the mode encode the entry type (mask `0o170000`):
//! trees are `0o040000`, blobs `0o100000` (executable when the user-execute
//! bit is set), symlinks `0o120000`, gitlinks `0o160000`. Non-canonical
//! blob modes from historical tools (e.g. `100664`) classify by mask.

use std::sync::{Arc, Mutex, OnceLock};

use memchr::memchr;

use crate::errors::ObjectError;
use crate::lru::{LruCache, Sizer};
use crate::object::{Object, SparseObject};
use crate::object_id::{ObjectId, OID_LEN};
use crate::repo::Repository;

/// Byte budget for the process-wide tree-entry cache.
pub const TREE_ENTRY_CACHE_BYTES: usize = 1 << 16;

/// Classification of a tree entry's type from its mode bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    /// Subdirectory (mode 040000).
    Tree,
    /// Regular file (mode 100644 or similar without execute bit).
    RegularFile,
    /// Executable file (mode 100755 or similar with execute bit).
    ExecutableFile,
    /// Symbolic link (mode 120000).
    Symlink,
    /// Gitlink/submodule (mode 160000).
    Gitlink,
    /// Type bits match no known entry type.
    Unknown,
}

impl EntryKind {
    /// Returns true if this entry is a subdirectory.
    #[inline]
    #[must_use]
    pub const fn is_tree(self) -> bool {
        matches!(self, Self::Tree)
    }
}

/// An immutable, shareable tree record: mode, name, child ID.
#[derive(Debug, PartialEq, Eq)]
pub struct TreeEntry {
    mode: u32,
    name: Box<[u8]>,
    id: ObjectId,
}

impl TreeEntry {
    /// Returns the numeric file mode (octal on disk).
    #[inline]
    #[must_use]
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// Returns the entry name bytes.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Returns the child object's ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Classifies the entry by its mode's type bits.
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        const S_IFMT: u32 = 0o170000;
        match self.mode & S_IFMT {
            0o040000 => EntryKind::Tree,
            0o120000 => EntryKind::Symlink,
            0o160000 => EntryKind::Gitlink,
            0o100000 => {
                if self.mode & 0o100 != 0 {
                    EntryKind::ExecutableFile
                } else {
                    EntryKind::RegularFile
                }
            }
            _ => EntryKind::Unknown,
        }
    }
}

impl Sizer for Arc<TreeEntry> {
    fn size(&self) -> usize {
        8 + self.name.len()
    }
}

/// Shared cache of parsed tree entries keyed by on-disk row bytes.
///
/// Values are immutable `Arc`s, so hits hand out the same entry to every
/// tree that parses a byte-identical row. Safe for concurrent use; tests
/// construct isolated instances instead of the global one.
#[derive(Debug)]
pub struct TreeEntryCache {
    inner: Mutex<LruCache<Box<[u8]>, Arc<TreeEntry>>>,
}

impl TreeEntryCache {
    /// Creates an isolated cache with the given byte budget.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the process-wide cache instance.
    pub fn global() -> &'static TreeEntryCache {
        static GLOBAL: OnceLock<TreeEntryCache> = OnceLock::new();
        GLOBAL.get_or_init(|| TreeEntryCache::new(TREE_ENTRY_CACHE_BYTES))
    }

    /// Returns the total charged bytes currently held.
    #[must_use]
    pub fn used(&self) -> usize {
        self.lock().used()
    }

    /// Interns the entry for one row, parsing it only on a cache miss.
    ///
    /// `row` spans the full record (mode, space, name, NUL, ID) and
    /// `mode_len` gives the length of its mode field.
    fn entry_for_row(
        &self,
        row: &[u8],
        mode_len: usize,
    ) -> Result<Arc<TreeEntry>, ObjectError> {
        let mut cache = self.lock();
        if let Some(entry) = cache.get(row) {
            return Ok(entry.clone());
        }

        let entry = Arc::new(parse_row(row, mode_len)?);
        cache.insert(row.into(), entry.clone());
        Ok(entry)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<Box<[u8]>, Arc<TreeEntry>>> {
        // Values are immutable, so a poisoned lock holds no broken state.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// One tree slot: the shared record plus this tree's child handle.
#[derive(Debug)]
pub struct TreeNode {
    entry: Arc<TreeEntry>,
    child: SparseObject,
}

impl TreeNode {
    /// Returns the shared entry record.
    #[inline]
    #[must_use]
    pub fn entry(&self) -> &TreeEntry {
        &self.entry
    }

    /// Returns the sparse handle to the child object.
    #[inline]
    #[must_use]
    pub fn child(&self) -> &SparseObject {
        &self.child
    }
}

/// A parsed tree.
#[derive(Debug)]
pub struct Tree {
    id: ObjectId,
    nodes: Vec<TreeNode>,
}

impl Tree {
    /// Parses a tree body, interning rows through `cache`.
    pub(crate) fn parse(
        id: ObjectId,
        data: &[u8],
        cache: &TreeEntryCache,
    ) -> Result<Self, ObjectError> {
        let mut nodes = Vec::new();
        let mut pos = 0;

        while pos < data.len() {
            let rest = &data[pos..];
            let space =
                memchr(b' ', rest).ok_or(ObjectError::malformed("tree entry missing mode"))?;
            let after_space = &rest[space + 1..];
            let nul = memchr(0, after_space)
                .ok_or(ObjectError::malformed("tree entry missing name terminator"))?;

            let row_len = space + 1 + nul + 1 + OID_LEN;
            if rest.len() < row_len {
                return Err(ObjectError::malformed("tree entry truncated before id"));
            }

            let row = &rest[..row_len];
            let entry = cache.entry_for_row(row, space)?;
            let child = SparseObject::new(entry.id());
            nodes.push(TreeNode { entry, child });
            pos += row_len;
        }

        Ok(Self { id, nodes })
    }

    /// Returns the tree's ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Returns the entries in on-disk order.
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Looks up an immediate child by name.
    #[must_use]
    pub fn entry_named(&self, name: &[u8]) -> Option<&TreeNode> {
        self.nodes.iter().find(|node| node.entry.name() == name)
    }

    /// Navigates a `/`-separated path, returning the final component's
    /// sparse handle without resolving it.
    ///
    /// Leading slashes are ignored. Intermediate components are resolved
    /// through the repository and must be trees. A missing component or a
    /// non-tree in the middle of the path yields `NotFound` for the tree
    /// being searched.
    pub fn find<'a>(
        &'a self,
        path: &str,
        repo: &Repository,
    ) -> Result<&'a SparseObject, ObjectError> {
        let path = path.trim_start_matches('/');
        let mut current = self;
        let mut components = path.split('/').peekable();

        loop {
            let component = components
                .next()
                .ok_or(ObjectError::NotFound { id: current.id })?;
            let node = current
                .entry_named(component.as_bytes())
                .ok_or(ObjectError::NotFound { id: current.id })?;

            if components.peek().is_none() {
                return Ok(&node.child);
            }
            match node.child.resolve(repo)? {
                Object::Tree(subtree) => current = subtree,
                _ => return Err(ObjectError::NotFound { id: current.id }),
            }
        }
    }
}

/// Parses one full row (mode, space, name, NUL, ID) into an entry.
fn parse_row(row: &[u8], mode_len: usize) -> Result<TreeEntry, ObjectError> {
    let mode = parse_octal_mode(&row[..mode_len])
        .ok_or(ObjectError::malformed("invalid tree entry mode"))?;

    let name = &row[mode_len + 1..row.len() - OID_LEN - 1];
    if name.is_empty() {
        return Err(ObjectError::malformed("empty tree entry name"));
    }
    if memchr(b'/', name).is_some() {
        return Err(ObjectError::malformed("tree entry name contains slash"));
    }

    let id = ObjectId::try_from_slice(&row[row.len() - OID_LEN..])
        .expect("row length fixed by caller");

    Ok(TreeEntry {
        mode,
        name: name.into(),
        id,
    })
}

/// Parses ASCII octal mode digits as base-8.
///
/// The longest valid mode is 6 digits (`160000`); 7 is accepted as
/// headroom and anything longer rejected, so shift-add cannot overflow.
#[inline]
fn parse_octal_mode(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || bytes.len() > 7 {
        return None;
    }
    let mut mode: u32 = 0;
    for &b in bytes {
        let digit = b.wrapping_sub(b'0');
        if digit > 7 {
            return None;
        }
        mode = mode * 8 + u32::from(digit);
    }
    Some(mode)
}
