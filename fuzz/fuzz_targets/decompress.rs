#![no_main]

use std::sync::Arc;

use cwasm_format::{FormatBuilder, ValueKind};
use cwasm_interp::{decompress_chunks, InterpConfig};
use libfuzzer_sys::fuzz_target;

// Fuzz target: the interpreter driver on arbitrary input.
//
// Input format:
//   byte 0: chunk size for feeding the rest
//   bytes 1..: input to a sectioned container format
//
// Catches bugs in:
// - Block bound bookkeeping (nested, empty, overlong)
// - Suspension mid-value and mid-header
// - Header back-patching and minimization
//
// Whatever succeeds must be a fixed point: transcoding the output again
// yields the same bytes.
fuzz_target!(|data: &[u8]| {
    let Some((&chunk, input)) = data.split_first() else {
        return;
    };
    let chunk = usize::from(chunk % 32) + 1;

    let mut b = FormatBuilder::new();
    let id = b.value(ValueKind::Uint8);
    let entry = b.value(ValueKind::Varint64);
    let entries = b.counted_loop(ValueKind::Varuint32, entry);
    let body = b.block(entries);
    let section = b.sequence([id, body]);
    let root = b.until_eof(section);
    let format = Arc::new(b.finish(root).unwrap());

    let Ok(first) = decompress_chunks(Arc::clone(&format), InterpConfig::default(), input.chunks(chunk))
    else {
        return;
    };
    let second = decompress_chunks(format, InterpConfig::default(), first.output.chunks(chunk)).unwrap();
    assert_eq!(first.output, second.output);
});
