//! Round-trip tests: values written by the write stream read back
//! identically, and containers pass through the interpreter unchanged
//! apart from block header minimization.

use std::sync::Arc;

use cwasm_decoder::{ByteReadStream, ReadStream};
use cwasm_encoder::{ByteWriteStream, WriteStream};
use cwasm_format::ValueKind;
use cwasm_interp::InterpConfig;
use cwasm_tests::{Section, collecting, encode_module, module_format, sample_sections, transcode};
use cwasm_wire::{Queue, ReadCursor, StreamKind, WriteCursor};
use proptest::prelude::*;

fn written(f: impl FnOnce(&mut WriteCursor)) -> (Arc<Queue>, Vec<u8>) {
    let queue = Queue::new();
    let mut pos = WriteCursor::new(Arc::clone(&queue), StreamKind::Byte);
    f(&mut pos);
    let bytes = queue.copy_out(0, queue.fill_address()).unwrap().to_vec();
    (queue, bytes)
}

// ── Codec layer ───────────────────────────────────────────────────────────────

#[test]
fn known_value_list_roundtrips() {
    let values = [0u32, 1, 127, 128, 300, 16384];
    let (queue, bytes) = written(|pos| {
        for v in values {
            ByteWriteStream.write_varuint32(v, pos).unwrap();
        }
    });
    assert_eq!(hex::encode(&bytes), "00017f8001ac02808001");

    let mut pos = ReadCursor::new(queue, StreamKind::Byte);
    for v in values {
        assert_eq!(ByteReadStream.read_varuint32(&mut pos).unwrap(), v);
    }
    assert_eq!(pos.available(), 0);
}

#[test]
fn signed_extremes_roundtrip() {
    let small = [0i32, -1, i32::MAX, i32::MIN];
    let large = [0i64, -1, i64::MAX, i64::MIN];
    let (queue, _) = written(|pos| {
        for v in small {
            ByteWriteStream.write_varint32(v, pos).unwrap();
        }
        for v in large {
            ByteWriteStream.write_varint64(v, pos).unwrap();
        }
    });

    let mut pos = ReadCursor::new(queue, StreamKind::Byte);
    for v in small {
        assert_eq!(ByteReadStream.read_varint32(&mut pos).unwrap(), v);
    }
    for v in large {
        assert_eq!(ByteReadStream.read_varint64(&mut pos).unwrap(), v);
    }
}

#[test]
fn fixed_width_leb128_uses_full_width() {
    let (queue, bytes) = written(|pos| {
        ByteWriteStream
            .write_kind(0, pos, ValueKind::FixedVaruint32)
            .unwrap();
    });
    assert_eq!(bytes, vec![0x80, 0x80, 0x80, 0x80, 0x00]);

    let mut pos = ReadCursor::new(queue, StreamKind::Byte);
    assert_eq!(ByteReadStream.read_varuint32(&mut pos).unwrap(), 0);
    assert_eq!(pos.address(), 5);
}

// ── Interpreter ───────────────────────────────────────────────────────────────

#[test]
fn padded_module_transcodes_to_minimal_form() {
    let sections = sample_sections();
    let input = encode_module(&sections, Some(5));
    let minimal = encode_module(&sections, None);
    assert!(input.len() > minimal.len());

    let transcript = transcode(module_format(), InterpConfig::default(), &input, input.len()).unwrap();
    assert_eq!(transcript.output, minimal);
}

#[test]
fn minimal_module_is_a_fixed_point() {
    let minimal = encode_module(&sample_sections(), None);
    let transcript = transcode(module_format(), InterpConfig::default(), &minimal, 64).unwrap();
    assert_eq!(transcript.output, minimal);
}

#[test]
fn padding_survives_without_minimize() {
    let padded = encode_module(&sample_sections(), Some(5));
    let config = InterpConfig {
        minimize_block_sizes: false,
        ..InterpConfig::default()
    };
    let transcript = transcode(module_format(), config, &padded, 3).unwrap();
    assert_eq!(transcript.output, padded);
}

#[test]
fn collected_values_follow_input_order() {
    let sections = sample_sections();
    let input = encode_module(&sections, None);
    let transcript = transcode(module_format(), collecting(), &input, input.len()).unwrap();

    let mut expected: Vec<(ValueKind, u64)> = vec![
        (ValueKind::Uint32, u64::from(cwasm_tests::MAGIC)),
        (ValueKind::Uint32, u64::from(cwasm_tests::VERSION)),
    ];
    for section in &sections {
        expected.push((ValueKind::Uint8, u64::from(section.id)));
        expected.push((ValueKind::Varuint32, section.entries.len() as u64));
        for &e in &section.entries {
            expected.push((ValueKind::Varint64, e as u64));
        }
    }
    let actual: Vec<(ValueKind, u64)> = transcript.values.iter().map(|v| (v.kind, v.value)).collect();
    assert_eq!(actual, expected);

    let addresses: Vec<usize> = transcript.values.iter().map(|v| v.address).collect();
    assert!(addresses.windows(2).all(|w| w[0] < w[1]));
}

// ── Properties ────────────────────────────────────────────────────────────────

fn arb_sections() -> impl Strategy<Value = Vec<Section>> {
    prop::collection::vec(
        (any::<u8>(), prop::collection::vec(any::<i64>(), 0..20))
            .prop_map(|(id, entries)| Section { id, entries }),
        0..6,
    )
}

/// A value of `kind`, derived from arbitrary bits.
fn fit(kind: ValueKind, raw: u64) -> u64 {
    match (kind.is_signed(), kind.bit_width()) {
        (_, 64) => raw,
        (true, _) => i64::from(raw as i32) as u64,
        (false, bits) => raw & ((1u64 << bits) - 1),
    }
}

proptest! {
    #[test]
    fn prop_module_transcodes_to_minimal(
        sections in arb_sections(),
        padding in prop::option::of(3u32..=5),
        chunk in 1usize..32,
    ) {
        let input = encode_module(&sections, padding);
        let transcript = transcode(module_format(), InterpConfig::default(), &input, chunk).unwrap();
        prop_assert_eq!(transcript.output, encode_module(&sections, None));
    }

    #[test]
    fn prop_values_roundtrip_through_streams(
        picks in prop::collection::vec((0usize..ValueKind::ALL.len(), any::<u64>()), 1..40),
    ) {
        let values: Vec<(ValueKind, u64)> = picks
            .into_iter()
            .map(|(i, raw)| {
                let kind = ValueKind::ALL[i];
                (kind, fit(kind, raw))
            })
            .collect();
        let (queue, _) = written(|pos| {
            for &(kind, v) in &values {
                ByteWriteStream.write_kind(v, pos, kind).unwrap();
            }
        });
        let mut pos = ReadCursor::new(queue, StreamKind::Byte);
        for &(kind, v) in &values {
            prop_assert_eq!(ByteReadStream.read_kind(&mut pos, kind).unwrap(), v);
        }
    }
}
