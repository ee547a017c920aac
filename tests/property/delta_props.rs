//! Delta application honors its size contracts.
//!
//! Valid deltas are generated alongside their expected output: every copy
//! stays inside the base, and the result must come out at exactly the
//! declared size. A corrupted declared size must be rejected.

use proptest::prelude::*;

use gitcore::{apply_delta, DeltaError};

#[derive(Clone, Debug)]
enum Op {
    Copy { offset: usize, len: usize },
    Insert(Vec<u8>),
}

fn op_strategy(base_len: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..base_len, 1..=base_len).prop_map(move |(offset, len)| {
            let len = len.min(base_len - offset).max(1);
            Op::Copy { offset, len }
        }),
        prop::collection::vec(any::<u8>(), 1..32).prop_map(Op::Insert),
    ]
}

/// Encodes a delta-header varint.
fn varint(mut value: u64) -> Vec<u8> {
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

/// Builds the delta stream and the expected output for an op list.
fn encode(base: &[u8], ops: &[Op]) -> (Vec<u8>, Vec<u8>) {
    let mut expected = Vec::new();
    let mut body = Vec::new();

    for op in ops {
        match op {
            Op::Copy { offset, len } => {
                // Emit all four offset bytes and two length bytes; present
                // bytes may be zero-valued.
                body.push(0x80 | 0x0f | 0x30);
                body.extend_from_slice(&(*offset as u32).to_le_bytes());
                body.extend_from_slice(&(*len as u16).to_le_bytes());
                expected.extend_from_slice(&base[*offset..offset + len]);
            }
            Op::Insert(bytes) => {
                body.push(bytes.len() as u8);
                body.extend_from_slice(bytes);
                expected.extend_from_slice(bytes);
            }
        }
    }

    let mut delta = varint(base.len() as u64);
    delta.extend_from_slice(&varint(expected.len() as u64));
    delta.extend_from_slice(&body);
    (delta, expected)
}

fn base_and_ops() -> impl Strategy<Value = (Vec<u8>, Vec<Op>)> {
    prop::collection::vec(any::<u8>(), 1..128).prop_flat_map(|base| {
        let len = base.len();
        (Just(base), prop::collection::vec(op_strategy(len), 0..12))
    })
}

proptest! {
    #[test]
    fn generated_deltas_apply_exactly((base, ops) in base_and_ops()) {
        let (delta, expected) = encode(&base, &ops);
        let mut out = Vec::new();
        apply_delta(&base, &delta, &mut out, 1 << 20).unwrap();

        prop_assert_eq!(out.len(), expected.len());
        prop_assert_eq!(&out, &expected);
    }

    #[test]
    fn wrong_declared_result_size_rejected(
        base in prop::collection::vec(any::<u8>(), 1..64),
        insert in prop::collection::vec(any::<u8>(), 1..32),
    ) {
        // One insert op, but the header declares one byte too many.
        let mut delta = varint(base.len() as u64);
        delta.extend_from_slice(&varint(insert.len() as u64 + 1));
        delta.push(insert.len() as u8);
        delta.extend_from_slice(&insert);

        let mut out = Vec::new();
        let err = apply_delta(&base, &delta, &mut out, 1 << 20).unwrap_err();
        let matches = matches!(err, DeltaError::ResultSizeMismatch { .. });
        prop_assert!(matches);
    }

    #[test]
    fn wrong_declared_base_size_rejected(
        base in prop::collection::vec(any::<u8>(), 1..64),
        bump in 1u64..16,
    ) {
        let mut delta = varint(base.len() as u64 + bump);
        delta.extend_from_slice(&varint(1));
        delta.push(1);
        delta.push(b'x');

        let mut out = Vec::new();
        let err = apply_delta(&base, &delta, &mut out, 1 << 20).unwrap_err();
        let matches = matches!(err, DeltaError::BaseSizeMismatch { .. });
        prop_assert!(matches);
    }

    #[test]
    fn copy_past_base_end_rejected(
        base in prop::collection::vec(any::<u8>(), 1..64),
        overshoot in 1usize..16,
    ) {
        let len = base.len() + overshoot;
        let mut delta = varint(base.len() as u64);
        delta.extend_from_slice(&varint(len as u64));
        delta.push(0x80 | 0x0f | 0x30);
        delta.extend_from_slice(&0u32.to_le_bytes());
        delta.extend_from_slice(&(len as u16).to_le_bytes());

        let mut out = Vec::new();
        let err = apply_delta(&base, &delta, &mut out, 1 << 20).unwrap_err();
        prop_assert!(matches!(err, DeltaError::CopyOutOfRange));
    }
}
