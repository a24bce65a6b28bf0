//! Edge case integration tests.
//!
//! - **Block boundaries**: a LEB128 whose final byte falls one past the
//!   end of its block must fail as `PastEndOfBlock`, never as a malformed
//!   encoding, regardless of how the input was split.
//! - **Malformed LEB128**: too many chunks, or a final chunk with bits
//!   beyond the value's width.
//! - **Truncation and trailing bytes**: input that stops inside the tree
//!   and input that continues past the root.
//! - **Header capacity**: a block body larger than its reserved size field.
//! - **Loop progress**: a counted loop whose body reads no input.

use cwasm_decoder::{BlockReader, ByteReadStream, DecodeError, ReadStream};
use cwasm_format::{NodeKind, ValueKind};
use cwasm_interp::{Decompressor, InterpConfig, InterpError};
use cwasm_tests::{encode_module, format_with, module_format, sample_sections, transcode};
use cwasm_wire::{BitAddress, Queue, ReadCursor, StreamKind, WireError};

fn reader(bytes: &[u8]) -> ReadCursor {
    let queue = Queue::with_page_size(4);
    queue.append(bytes).unwrap();
    queue.freeze_eof(bytes.len()).unwrap();
    ReadCursor::new(queue, StreamKind::Byte)
}

// ── Block boundaries ──────────────────────────────────────────────────────────

#[test]
fn leb128_one_past_block_end_is_past_end_of_block() {
    let mut pos = reader(&[0x01, 0x80, 0x01]);
    BlockReader::new().enter(&mut pos).unwrap();
    assert_eq!(
        ByteReadStream.read_varuint32(&mut pos),
        Err(DecodeError::Wire(WireError::PastEndOfBlock {
            address: BitAddress::from_byte(2),
            eob: BitAddress::from_byte(2),
        }))
    );
    // The failed read consumed nothing.
    assert_eq!(pos.address(), 1);
}

#[test]
fn straddling_value_fails_the_same_at_every_split() {
    let format = format_with(|b| {
        let v = b.value(ValueKind::Varuint32);
        b.block(v)
    });
    let input = [0x01, 0x80, 0x01];
    for chunk in 1..=input.len() {
        let err = transcode(format.clone(), InterpConfig::default(), &input, chunk).unwrap_err();
        assert_eq!(
            err,
            InterpError::PastEndOfBlock {
                address: BitAddress::from_byte(2),
                eob: BitAddress::from_byte(2),
            },
            "chunk size {chunk}"
        );
    }
}

#[test]
fn inner_block_longer_than_outer_fails() {
    let format = format_with(|b| {
        let v = b.value(ValueKind::Uint8);
        let each = b.until_eof(v);
        let inner = b.block(each);
        b.block(inner)
    });
    let err = transcode(format, InterpConfig::default(), &[0x02, 0x05, 0, 0, 0, 0, 0], 7).unwrap_err();
    assert!(matches!(err, InterpError::PastEndOfBlock { .. }));
}

#[test]
fn empty_block_passes_through() {
    let format = format_with(|b| {
        let v = b.value(ValueKind::Uint8);
        let each = b.until_eof(v);
        b.block(each)
    });
    let transcript = transcode(format, InterpConfig::default(), &[0x00], 1).unwrap();
    assert_eq!(transcript.output, vec![0x00]);
}

#[test]
fn unconsumed_block_tail_is_underrun() {
    let format = format_with(|b| {
        let v = b.value(ValueKind::Varint32);
        b.block(v)
    });
    let err = transcode(format, InterpConfig::default(), &[0x03, 0x7F, 0x00, 0x00], 4).unwrap_err();
    assert_eq!(
        err,
        InterpError::BlockUnderrun {
            expected: BitAddress::from_byte(4),
            actual: BitAddress::from_byte(2),
        }
    );
}

// ── Loop progress ─────────────────────────────────────────────────────────────

#[test]
fn counted_loop_without_input_fails_instead_of_spinning() {
    let format = format_with(|b| {
        let act = b.action(7);
        b.counted_loop(ValueKind::Varuint64, act)
    });
    // A count of 2^63 with a body that reads nothing.
    let mut input = vec![0xFF; 9];
    input.push(0x01);
    let err = transcode(format, InterpConfig::default(), &input, input.len()).unwrap_err();
    assert!(matches!(err, InterpError::EmptyLoopBody { .. }));
}

#[test]
fn counted_loop_with_one_empty_iteration_completes() {
    let format = format_with(|b| {
        let act = b.action(7);
        b.counted_loop(ValueKind::Varuint32, act)
    });
    let transcript = transcode(format, InterpConfig::default(), &[0x01], 1).unwrap();
    assert_eq!(transcript.output, vec![0x01]);
}

// ── Malformed LEB128 ──────────────────────────────────────────────────────────

#[test]
fn overlong_leb128_is_malformed() {
    let format = format_with(|b| b.value(ValueKind::Varuint32));
    let err = transcode(format, InterpConfig::default(), &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01], 2)
        .unwrap_err();
    assert!(matches!(
        err,
        InterpError::MalformedEncoding(WireError::VarintTooLong { .. })
    ));
}

#[test]
fn overflowing_final_chunk_is_malformed() {
    let format = format_with(|b| b.value(ValueKind::Varuint32));
    let err = transcode(format, InterpConfig::default(), &[0xFF, 0xFF, 0xFF, 0xFF, 0x1F], 5)
        .unwrap_err();
    assert!(matches!(
        err,
        InterpError::MalformedEncoding(WireError::VarintOverflow { .. })
    ));
}

// ── Truncation and trailing bytes ─────────────────────────────────────────────

#[test]
fn truncated_module_is_unexpected_eof() {
    let input = encode_module(&sample_sections(), None);
    let cut = input.len() - 3;
    let err = transcode(module_format(), InterpConfig::default(), &input[..cut], 8).unwrap_err();
    assert_eq!(err, InterpError::UnexpectedEof { address: cut });
}

#[test]
fn empty_input_is_unexpected_eof() {
    let err = transcode(module_format(), InterpConfig::default(), &[], 1).unwrap_err();
    assert_eq!(err, InterpError::UnexpectedEof { address: 0 });
}

#[test]
fn trailing_bytes_rejected() {
    let format = format_with(|b| b.value(ValueKind::Uint8));
    let err = transcode(format, InterpConfig::default(), &[1, 2, 3], 3).unwrap_err();
    assert_eq!(err, InterpError::TrailingData { extra_bytes: 2 });
}

#[test]
fn trailing_bytes_ignored_when_allowed() {
    let format = format_with(|b| b.value(ValueKind::Uint8));
    let config = InterpConfig {
        reject_trailing_input: false,
        ..InterpConfig::default()
    };
    let transcript = transcode(format, config, &[1, 2, 3], 1).unwrap();
    assert_eq!(transcript.output, vec![1]);
}

#[test]
fn input_after_close_is_refused() {
    let format = format_with(|b| b.value(ValueKind::Uint8));
    let mut driver = Decompressor::new(format, InterpConfig::default());
    driver.supply_input(&[1]).unwrap();
    driver.close_input().unwrap();
    assert!(matches!(
        driver.supply_input(&[2]),
        Err(InterpError::Wire(WireError::WriteAfterEof { .. }))
    ));
}

// ── Header capacity ───────────────────────────────────────────────────────────

#[test]
fn body_larger_than_reserved_header_fails() {
    let format = format_with(|b| {
        let v = b.value(ValueKind::Uint8);
        let each = b.until_eof(v);
        b.block(each)
    });
    let mut input = vec![0xC8, 0x01];
    input.extend(std::iter::repeat_n(0xAB, 200));
    for minimize in [false, true] {
        let config = InterpConfig {
            reserved_block_chunks: 1,
            minimize_block_sizes: minimize,
            ..InterpConfig::default()
        };
        let err = transcode(format.clone(), config, &input, 64).unwrap_err();
        assert_eq!(err, InterpError::BlockTooLarge { size: 200, limit: 127 });
    }
}

#[test]
fn opaque_node_is_unsupported() {
    let format = format_with(|b| {
        let v = b.value(ValueKind::Uint8);
        let op = b.opaque(0x5C);
        b.sequence([v, op])
    });
    let err = transcode(format, InterpConfig::default(), &[1], 1).unwrap_err();
    assert_eq!(
        err,
        InterpError::UnsupportedFormat {
            kind: NodeKind::Unknown(0x5C)
        }
    );
}
