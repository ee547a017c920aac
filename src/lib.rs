//! Read-only access to a Git repository's object database and references.
//!
//! Given a repository root, this crate resolves references to object IDs,
//! materializes the four object kinds (commit, tree, blob, tag), and
//! navigates trees by path. Everything is read-only: no writing, no
//! garbage collection, no network.
//!
//! Lookup pipeline for one object:
//! 1. `repo` canonicalizes the root and detects bare vs worktree layout.
//! 2. `loose` tries `objects/xx/yyyy...` (zlib, `"<type> <size>\0"` frame).
//! 3. On a miss, `pack_idx` maps the ID to a pack offset (fanout-bracketed
//!    binary search over the v2 index, self-hash verified).
//! 4. `pack` parses the entry header at that offset and either inflates
//!    the body directly or recursively materializes a delta base
//!    (`delta` applies the copy/insert stream), via a `pack_reader`
//!    (memory-mapped when possible, buffered otherwise).
//! 5. The typed parsers (`commit`, `tree`, `tag`, blob-as-identity)
//!    produce the object; tree and parent links stay sparse until
//!    individually resolved.
//!
//! # Invariants
//! - A repository admits zero or one pack file; more is an error.
//! - Delta chains are depth-bounded; all reads respect explicit limits.
//! - Object graphs never form owning cycles: intra-object links hold an
//!   ID plus a memoized resolution outcome, not the child itself.
//! - The tree-entry cache is process-wide, byte-budgeted, and holds only
//!   immutable values.

pub mod commit;
pub mod delta;
pub mod errors;
mod loose;
pub mod lru;
pub mod object;
pub mod object_id;
pub mod pack;
pub mod pack_idx;
pub mod pack_reader;
pub mod refs;
pub mod repo;
pub mod signature;
pub mod tag;
pub mod tree;

pub use commit::Commit;
pub use delta::{apply_delta, delta_sizes, DeltaError};
pub use errors::{ObjectError, RefError, RepoOpenError};
pub use lru::{LruCache, Sizer};
pub use object::{Blob, Object, ObjectKind, RawObject, SparseObject};
pub use object_id::{ObjectId, ParseObjectIdError, OID_HEX_LEN, OID_LEN};
pub use pack::{Pack, PackError};
pub use pack_idx::{IdxError, PackIndex};
pub use pack_reader::{
    open_pack_reader, FilePackReader, InflateError, MmapPackReader, PackReader,
};
pub use refs::Ref;
pub use repo::{ReadLimits, Repository};
pub use signature::{Signature, Time};
pub use tag::Tag;
pub use tree::{EntryKind, Tree, TreeEntry, TreeEntryCache, TreeNode, TREE_ENTRY_CACHE_BYTES};
