//! Reference resolution: `HEAD`, loose refs, and `packed-refs`.
//!
//! A reference binds a name like `refs/heads/main` to an object ID. Loose
//! refs are single-line files under the repository root; `packed-refs` is
//! a line-oriented file where `#` starts a comment, blank lines are
//! ignored, and a `^<40-hex>` line attaches a peeled commit ID to the
//! immediately preceding ref. Lines are trimmed before interpretation.
//!
//! Lookup order: loose first, then packed. Enumeration merges loose refs
//! over packed ones, keeping the packed file order and appending new loose
//! names in directory-sorted order.

use std::fs;
use std::io;
use std::path::Path;

use ahash::AHashMap;
use memchr::memchr;

use crate::errors::RefError;
use crate::object_id::ObjectId;
use crate::repo::Repository;

/// A named reference, with the peeled commit ID for packed tags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ref {
    /// Full ref name, e.g. `refs/heads/main`.
    pub name: String,
    /// The bound object ID.
    pub id: ObjectId,
    /// Peeled commit ID from a `^` line in `packed-refs`.
    pub peeled: Option<ObjectId>,
}

/// Parsed contents of the `packed-refs` file.
///
/// Refs keep their file order; the name map indexes into the ordered list.
#[derive(Debug, Default)]
pub(crate) struct PackedRefs {
    refs: Vec<Ref>,
    by_name: AHashMap<String, usize>,
}

impl PackedRefs {
    /// Loads `<root>/packed-refs`; a missing file yields an empty set.
    pub(crate) fn load(root: &Path) -> Result<Self, RefError> {
        let bytes = match fs::read(root.join("packed-refs")) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(RefError::io(err)),
        };
        Self::parse(&bytes)
    }

    /// Parses `packed-refs` content.
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, RefError> {
        let mut packed = Self::default();

        for raw_line in bytes.split(|&b| b == b'\n') {
            let line = match memchr(b'#', raw_line) {
                Some(pos) => &raw_line[..pos],
                None => raw_line,
            };
            let line = trim_ascii(line);
            if line.is_empty() {
                continue;
            }

            if line[0] == b'^' {
                let id = ObjectId::from_hex(&line[1..]).ok_or(RefError::MalformedRef {
                    detail: "invalid peeled id",
                })?;
                let last = packed.refs.last_mut().ok_or(RefError::MalformedRef {
                    detail: "peel line without preceding ref",
                })?;
                last.peeled = Some(id);
                continue;
            }

            let space = memchr(b' ', line).ok_or(RefError::MalformedRef {
                detail: "packed ref line missing name",
            })?;
            let id = ObjectId::from_hex(&line[..space]).ok_or(RefError::MalformedRef {
                detail: "invalid packed ref id",
            })?;
            let name = &line[space + 1..];
            if name.is_empty() {
                return Err(RefError::MalformedRef {
                    detail: "empty packed ref name",
                });
            }
            let name = String::from_utf8_lossy(name).into_owned();

            let reference = Ref {
                name: name.clone(),
                id,
                peeled: None,
            };
            match packed.by_name.get(&name) {
                Some(&idx) => packed.refs[idx] = reference,
                None => {
                    packed.by_name.insert(name, packed.refs.len());
                    packed.refs.push(reference);
                }
            }
        }

        Ok(packed)
    }

    /// Looks up a ref by full name.
    pub(crate) fn get(&self, name: &str) -> Option<&Ref> {
        self.by_name.get(name).map(|&idx| &self.refs[idx])
    }

    /// Returns refs under a `<prefix>/` namespace in file order.
    pub(crate) fn with_prefix(&self, prefix: &str) -> Vec<Ref> {
        self.refs
            .iter()
            .filter(|r| {
                r.name
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
            })
            .cloned()
            .collect()
    }
}

impl Repository {
    /// Resolves `HEAD`.
    ///
    /// `HEAD` must contain `ref: <name>`; the named ref is then resolved
    /// normally. Any other content is a malformed ref.
    pub fn head(&self) -> Result<Ref, RefError> {
        let bytes = fs::read(self.root().join("HEAD")).map_err(RefError::io)?;
        let line = trim_ascii(&bytes);
        let target = line.strip_prefix(b"ref: ").ok_or(RefError::MalformedRef {
            detail: "HEAD is not a symbolic ref",
        })?;
        let name = std::str::from_utf8(target).map_err(|_| RefError::MalformedRef {
            detail: "HEAD target is not UTF-8",
        })?;
        self.ref_by_name(name.trim())
    }

    /// Resolves a ref by full name, trying loose storage before packed.
    pub fn ref_by_name(&self, name: &str) -> Result<Ref, RefError> {
        if let Some(reference) = self.loose_ref(name)? {
            return Ok(reference);
        }
        if let Some(reference) = self.packed_refs()?.get(name) {
            return Ok(reference.clone());
        }
        Err(RefError::NotFound {
            name: name.to_owned(),
        })
    }

    /// Enumerates `refs/heads/*`, loose merged over packed.
    pub fn branches(&self) -> Result<Vec<Ref>, RefError> {
        self.refs_with_prefix("refs/heads")
    }

    /// Enumerates `refs/tags/*`, loose merged over packed.
    pub fn tags(&self) -> Result<Vec<Ref>, RefError> {
        self.refs_with_prefix("refs/tags")
    }

    /// Reads a loose ref file: 40 hex characters and a newline.
    ///
    /// A missing file falls through to the packed lookup; a present but
    /// malformed file is an error.
    fn loose_ref(&self, name: &str) -> Result<Option<Ref>, RefError> {
        let bytes = match fs::read(self.root().join(name)) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(RefError::io(err)),
        };
        let id = ObjectId::from_hex(trim_ascii(&bytes)).ok_or(RefError::MalformedRef {
            detail: "loose ref is not a 40-hex id",
        })?;
        Ok(Some(Ref {
            name: name.to_owned(),
            id,
            peeled: None,
        }))
    }

    fn refs_with_prefix(&self, prefix: &str) -> Result<Vec<Ref>, RefError> {
        let mut refs = self.packed_refs()?.with_prefix(prefix);

        for name in self.loose_ref_names(prefix)? {
            let full = format!("{prefix}/{name}");
            let Some(loose) = self.loose_ref(&full)? else {
                continue;
            };
            match refs.iter_mut().find(|r| r.name == loose.name) {
                Some(existing) => *existing = loose,
                None => refs.push(loose),
            }
        }

        Ok(refs)
    }

    /// Lists loose ref file names under a namespace, sorted for
    /// deterministic enumeration. Nested directories are not descended.
    fn loose_ref_names(&self, prefix: &str) -> Result<Vec<String>, RefError> {
        let dir = match fs::read_dir(self.root().join(prefix)) {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(RefError::io(err)),
        };

        let mut names = Vec::new();
        for entry in dir {
            let entry = entry.map_err(RefError::io)?;
            let is_file = entry
                .file_type()
                .map(|ty| ty.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Trims ASCII whitespace from both ends of a byte slice.
fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    &bytes[start..end]
}
