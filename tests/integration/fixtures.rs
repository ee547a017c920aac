//! Repository fixtures built from literal bytes.
//!
//! Loose objects are zlib-framed by hand; packs and their v2 indexes are
//! assembled byte-by-byte (including a valid index self-hash) so tests
//! exercise the same encodings Git writes, without shelling out to `git`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use gitcore::ObjectId;
use sha1::{Digest, Sha1};
use tempfile::TempDir;

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

pub fn oid(hex: &str) -> ObjectId {
    hex.parse().unwrap()
}

/// A temporary repository in worktree layout (`<root>/.git`).
pub struct RepoFixture {
    _tmp: TempDir,
    root: PathBuf,
    git_dir: PathBuf,
}

impl RepoFixture {
    pub fn worktree() -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("repo");
        let git_dir = root.join(".git");
        fs::create_dir_all(git_dir.join("objects")).unwrap();
        Self {
            _tmp: tmp,
            root,
            git_dir,
        }
    }

    pub fn bare() -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("server.git");
        fs::create_dir_all(root.join("objects")).unwrap();
        Self {
            git_dir: root.clone(),
            _tmp: tmp,
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes a framed loose object (`"<kind> <len>\0<body>"`, zlib'd).
    pub fn write_loose(&self, id: &ObjectId, kind: &str, body: &[u8]) {
        let mut framed = format!("{kind} {}\0", body.len()).into_bytes();
        framed.extend_from_slice(body);
        self.write_loose_raw(id, &zlib(&framed));
    }

    /// Writes pre-compressed bytes at an object's loose path.
    pub fn write_loose_raw(&self, id: &ObjectId, compressed: &[u8]) {
        let hex = id.to_hex();
        let (shard, file) = hex.split_at(2);
        let dir = self.git_dir.join("objects").join(shard);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), compressed).unwrap();
    }

    pub fn write_head(&self, content: &str) {
        fs::write(self.git_dir.join("HEAD"), content).unwrap();
    }

    pub fn write_ref(&self, name: &str, id: &ObjectId) {
        let path = self.git_dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, format!("{id}\n")).unwrap();
    }

    pub fn write_packed_refs(&self, content: &str) {
        fs::write(self.git_dir.join("packed-refs"), content).unwrap();
    }

    pub fn pack_dir(&self) -> PathBuf {
        let dir = self.git_dir.join("objects").join("pack");
        fs::create_dir_all(&dir).unwrap();
        dir
    }
}

/// Encodes a pack entry header for a type code and size.
pub fn entry_header(code: u8, mut size: u64) -> Vec<u8> {
    let mut first = (code << 4) | (size & 0x0f) as u8;
    size >>= 4;
    let mut out = Vec::new();
    if size != 0 {
        first |= 0x80;
    }
    out.push(first);
    while size != 0 {
        let mut byte = (size & 0x7f) as u8;
        size >>= 7;
        if size != 0 {
            byte |= 0x80;
        }
        out.push(byte);
    }
    out
}

/// Encodes an offset-delta base distance (+1 bump per continuation).
pub fn ofs_encode(mut distance: u64) -> Vec<u8> {
    let mut bytes = vec![(distance & 0x7f) as u8];
    distance >>= 7;
    while distance > 0 {
        distance -= 1;
        bytes.push(0x80 | (distance & 0x7f) as u8);
        distance >>= 7;
    }
    bytes.reverse();
    bytes
}

/// Encodes a delta-header varint (little-endian 7-bit).
pub fn delta_varint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            return out;
        }
    }
}

/// Builds a delta stream from its header sizes and instruction bytes.
pub fn delta_stream(base_size: usize, result_size: usize, ops: &[u8]) -> Vec<u8> {
    let mut out = delta_varint(base_size as u64);
    out.extend_from_slice(&delta_varint(result_size as u64));
    out.extend_from_slice(ops);
    out
}

/// Builds `.pack`/`.idx` pairs from explicit entries.
pub struct PackFixture {
    bytes: Vec<u8>,
    objects: Vec<(ObjectId, u64)>,
}

impl PackFixture {
    pub fn new() -> Self {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"PACK");
        bytes.extend_from_slice(&2u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        Self {
            bytes,
            objects: Vec::new(),
        }
    }

    pub fn pad_to(&mut self, offset: u64) -> &mut Self {
        assert!(offset as usize >= self.bytes.len());
        self.bytes.resize(offset as usize, 0);
        self
    }

    pub fn add_base(&mut self, code: u8, id: &ObjectId, payload: &[u8]) -> u64 {
        let offset = self.bytes.len() as u64;
        self.bytes
            .extend_from_slice(&entry_header(code, payload.len() as u64));
        self.bytes.extend_from_slice(&zlib(payload));
        self.objects.push((*id, offset));
        offset
    }

    pub fn add_ofs_delta(&mut self, id: &ObjectId, base_offset: u64, delta: &[u8]) -> u64 {
        let offset = self.bytes.len() as u64;
        self.bytes
            .extend_from_slice(&entry_header(6, delta.len() as u64));
        self.bytes
            .extend_from_slice(&ofs_encode(offset - base_offset));
        self.bytes.extend_from_slice(&zlib(delta));
        self.objects.push((*id, offset));
        offset
    }

    pub fn add_ref_delta(&mut self, id: &ObjectId, base: &ObjectId, delta: &[u8]) -> u64 {
        let offset = self.bytes.len() as u64;
        self.bytes
            .extend_from_slice(&entry_header(7, delta.len() as u64));
        self.bytes.extend_from_slice(base.as_bytes());
        self.bytes.extend_from_slice(&zlib(delta));
        self.objects.push((*id, offset));
        offset
    }

    /// Writes the pair into `dir`, returning the `.pack` path.
    pub fn write_to(mut self, dir: &Path, stem: &str) -> PathBuf {
        let count = self.objects.len() as u32;
        self.bytes[8..12].copy_from_slice(&count.to_be_bytes());
        self.bytes.extend_from_slice(&[0u8; 20]);

        let idx = build_idx(&self.objects);
        let pack_path = dir.join(format!("{stem}.pack"));
        fs::write(&pack_path, &self.bytes).unwrap();
        fs::write(dir.join(format!("{stem}.idx")), idx).unwrap();
        pack_path
    }
}

/// Assembles a pack index v2 file, including its SHA-1 self-hash.
pub fn build_idx(objects: &[(ObjectId, u64)]) -> Vec<u8> {
    const LARGE_FLAG: u32 = 0x8000_0000;

    let mut objects: Vec<_> = objects.to_vec();
    objects.sort_by(|a, b| a.0.cmp(&b.0));

    let mut counts = [0u32; 256];
    for (id, _) in &objects {
        counts[id.first_byte() as usize] += 1;
    }

    let mut out = Vec::new();
    out.extend_from_slice(&[0xff, b't', b'O', b'c']);
    out.extend_from_slice(&2u32.to_be_bytes());

    let mut running = 0u32;
    for count in counts {
        running += count;
        out.extend_from_slice(&running.to_be_bytes());
    }
    for (id, _) in &objects {
        out.extend_from_slice(id.as_bytes());
    }
    out.extend_from_slice(&vec![0u8; objects.len() * 4]); // CRCs

    let mut large = Vec::new();
    for (_, offset) in &objects {
        if *offset >= LARGE_FLAG as u64 {
            let idx = (large.len() / 8) as u32;
            out.extend_from_slice(&(LARGE_FLAG | idx).to_be_bytes());
            large.extend_from_slice(&offset.to_be_bytes());
        } else {
            out.extend_from_slice(&(*offset as u32).to_be_bytes());
        }
    }
    out.extend_from_slice(&large);
    out.extend_from_slice(&[0u8; 20]); // pack hash, unverified

    let mut hasher = Sha1::new();
    hasher.update(&out);
    let digest = hasher.finalize();
    out.extend_from_slice(&digest);
    out
}
