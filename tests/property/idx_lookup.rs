//! Pack index lookup agrees with a linear scan.
//!
//! Index files are synthesized from generated (OID, offset) sets with a
//! valid self-hash, then every present OID must resolve to the same offset
//! by fanout-bucketed binary search and by linear scan, and absent OIDs
//! must miss both ways.

use proptest::prelude::*;

use gitcore::{ObjectId, PackIndex};
use sha1::{Digest, Sha1};

/// Assembles a pack index v2 from sorted-deduplicated objects.
fn build_idx(objects: &[([u8; 20], u64)]) -> Vec<u8> {
    const LARGE_FLAG: u32 = 0x8000_0000;

    let mut counts = [0u32; 256];
    for (oid, _) in objects {
        counts[oid[0] as usize] += 1;
    }

    let mut out = Vec::new();
    out.extend_from_slice(&[0xff, b't', b'O', b'c']);
    out.extend_from_slice(&2u32.to_be_bytes());
    let mut running = 0u32;
    for count in counts {
        running += count;
        out.extend_from_slice(&running.to_be_bytes());
    }
    for (oid, _) in objects {
        out.extend_from_slice(oid);
    }
    out.extend_from_slice(&vec![0u8; objects.len() * 4]);

    let mut large = Vec::new();
    for (_, offset) in objects {
        if *offset >= LARGE_FLAG as u64 {
            let idx = (large.len() / 8) as u32;
            out.extend_from_slice(&(LARGE_FLAG | idx).to_be_bytes());
            large.extend_from_slice(&offset.to_be_bytes());
        } else {
            out.extend_from_slice(&(*offset as u32).to_be_bytes());
        }
    }
    out.extend_from_slice(&large);
    out.extend_from_slice(&[0u8; 20]);

    let mut hasher = Sha1::new();
    hasher.update(&out);
    let digest = hasher.finalize();
    out.extend_from_slice(&digest);
    out
}

/// Finds an OID by scanning every index row in order.
fn linear_lookup(idx: &PackIndex, id: &ObjectId) -> Option<u64> {
    for (oid, row) in idx.iter_oids() {
        if oid == id.as_bytes() {
            return Some(idx.offset_at(row).unwrap());
        }
    }
    None
}

proptest! {
    #[test]
    fn binary_search_agrees_with_linear_scan(
        entries in prop::collection::vec(
            (any::<[u8; 20]>(), 0u64..0x1_0000_0000_0000u64),
            0..64,
        ),
        probe in any::<[u8; 20]>(),
    ) {
        let mut objects = entries;
        objects.sort_by(|a, b| a.0.cmp(&b.0));
        objects.dedup_by(|a, b| a.0 == b.0);

        let idx = PackIndex::parse(build_idx(&objects)).unwrap();
        prop_assert_eq!(idx.object_count() as usize, objects.len());

        for (oid, offset) in &objects {
            let id = ObjectId::new(*oid);
            let found = idx.lookup(&id).unwrap();
            prop_assert_eq!(found, Some(*offset));
            prop_assert_eq!(found, linear_lookup(&idx, &id));
        }

        let probe_id = ObjectId::new(probe);
        prop_assert_eq!(
            idx.lookup(&probe_id).unwrap(),
            linear_lookup(&idx, &probe_id)
        );
    }
}
