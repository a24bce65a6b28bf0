#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use cwasm_decoder::{ByteReadStream, ReadStream};
use cwasm_encoder::{ByteWriteStream, WriteStream};
use cwasm_wire::{Queue, ReadCursor, StreamKind, WriteCursor};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    page_size: u8,
    values: Vec<u64>,
    read_splits: Vec<u8>,
}

// Fuzz target: values written across page boundaries read back intact.
//
// Writes LEB128 values into a queue with a tiny page size, then reads
// them back while data is released to the reader in arbitrary splits.
// A read that runs out of data must leave the cursor where it was.
fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);
    let Ok(input) = FuzzInput::arbitrary(&mut u) else {
        return;
    };
    let page_size = usize::from(input.page_size % 16) + 1;

    let written = Queue::with_page_size(page_size);
    let mut pos = WriteCursor::new(written.clone(), StreamKind::Byte);
    for &v in &input.values {
        ByteWriteStream.write_varuint64(v, &mut pos).unwrap();
    }
    let bytes = written.copy_out(0, written.fill_address()).unwrap();

    let queue = Queue::with_page_size(page_size);
    let mut reader = ReadCursor::new(queue.clone(), StreamKind::Byte);
    let mut splits = input.read_splits.iter().map(|&s| usize::from(s % 12) + 1);
    let mut fed = 0;
    let mut values = input.values.iter();
    let mut expected = values.next();
    while let Some(&want) = expected {
        match ByteReadStream.read_varuint64(&mut reader) {
            Ok(got) => {
                assert_eq!(got, want);
                expected = values.next();
            }
            Err(_) => {
                let before = reader.address();
                let step = splits.next().unwrap_or(bytes.len());
                let end = (fed + step).min(bytes.len());
                assert!(end > fed, "ran out of data before the last value");
                queue.append(&bytes[fed..end]).unwrap();
                fed = end;
                assert_eq!(reader.address(), before);
            }
        }
    }
});
