#![no_main]

use libfuzzer_sys::fuzz_target;

// Fuzz target: LEB128 encode->decode roundtrip.
//
// Takes 8 bytes of fuzz input as a u64, encodes it both unsigned and
// signed, decodes each back and asserts value and length match.
fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let value = u64::from_le_bytes(data[..8].try_into().unwrap());

    let mut buf = [0u8; 10];
    let len = cwasm_wire::leb128::encode_varint(value, &mut buf);
    let (decoded, decoded_len) = cwasm_wire::leb128::decode_varint(&buf[..len]).unwrap();
    assert_eq!(decoded, value);
    assert_eq!(decoded_len, len);

    let signed = value as i64;
    let len = cwasm_wire::leb128::encode_signed_varint(signed, &mut buf);
    let (decoded, decoded_len) = cwasm_wire::leb128::decode_signed_varint(&buf[..len]).unwrap();
    assert_eq!(decoded, signed);
    assert_eq!(decoded_len, len);
});
