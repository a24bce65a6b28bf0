#![no_main]

use cwasm_decoder::ValueAccumulator;
use cwasm_format::ValueKind;
use libfuzzer_sys::fuzz_target;

// Fuzz target: byte-at-a-time value accumulation.
//
// Input format:
//   byte 0: value kind index
//   bytes 1..: encoded values, back to back
//
// Every completed value must fit its kind, and no value may take more
// bytes than the kind's maximum encoded length.
fuzz_target!(|data: &[u8]| {
    let Some((&pick, rest)) = data.split_first() else {
        return;
    };
    let kind = ValueKind::ALL[usize::from(pick) % ValueKind::ALL.len()];
    let mut acc = ValueAccumulator::new(kind);
    let mut used = 0;
    for &byte in rest {
        used += 1;
        assert!(used <= kind.max_encoded_len());
        match acc.feed(byte) {
            Ok(Some(value)) => {
                assert!(kind.fits(value), "{kind} produced {value:#x}");
                used = 0;
            }
            Ok(None) => {}
            Err(_) => used = 0,
        }
    }
});
