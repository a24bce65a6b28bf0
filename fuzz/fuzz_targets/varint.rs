#![no_main]

use libfuzzer_sys::fuzz_target;

// Fuzz target: slice LEB128 decoding.
//
// Catches bugs in:
// - VarintTooLong (>10 continuation bytes)
// - Zero-length input
// - Final chunks with bits past 64
fuzz_target!(|data: &[u8]| {
    let _ = cwasm_wire::leb128::decode_varint(data);
    let _ = cwasm_wire::leb128::decode_signed_varint(data);
});
