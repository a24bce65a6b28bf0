//! Suspend/resume equivalence: however the input is split and however
//! often output is drained, the driver produces the same bytes and values
//! as a single uninterrupted run.

use std::sync::Arc;
use std::thread;

use cwasm_format::ValueKind;
use cwasm_interp::{
    Decompressor, DriverState, InterpConfig, ResumeOutcome, Suspension, decompress_chunks,
    decompress_stream,
};
use cwasm_tests::{
    Section, collecting, encode_module, format_with, module_format, sample_sections, transcode,
};
use proptest::prelude::*;

fn padded_sample() -> Vec<u8> {
    encode_module(&sample_sections(), Some(5))
}

#[test]
fn every_two_way_split_matches_one_shot() {
    let input = padded_sample();
    let whole = transcode(module_format(), collecting(), &input, input.len()).unwrap();
    for split in 0..=input.len() {
        let (a, b) = input.split_at(split);
        let parts = decompress_chunks(module_format(), collecting(), [a, b]).unwrap();
        assert_eq!(parts.output, whole.output, "split at {split}");
        assert_eq!(parts.values, whole.values, "split at {split}");
    }
}

#[test]
fn byte_at_a_time_matches_one_shot() {
    let input = padded_sample();
    let whole = transcode(module_format(), collecting(), &input, input.len()).unwrap();
    let trickle = transcode(module_format(), collecting(), &input, 1).unwrap();
    assert_eq!(trickle.output, whole.output);
    assert_eq!(trickle.values, whole.values);
    assert!(trickle.resumes >= input.len());
}

#[test]
fn partial_value_survives_suspension() {
    let format = format_with(|b| b.value(ValueKind::Varint64));
    let mut driver = Decompressor::new(format, collecting());
    // i64::MIN takes ten bytes; hand them over three at a time.
    let bytes = [0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x7F];
    for chunk in bytes.chunks(3) {
        assert_eq!(driver.resume(), ResumeOutcome::NeedInput);
        assert_eq!(driver.pending_output(), 0);
        driver.supply_input(chunk).unwrap();
    }
    assert_eq!(driver.resume(), ResumeOutcome::NeedInput);
    assert_eq!(driver.input_address(), bytes.len());
    driver.close_input().unwrap();
    assert_eq!(driver.resume(), ResumeOutcome::Finished);
    assert_eq!(driver.drain().unwrap().as_ref(), &bytes);
    assert_eq!(driver.values()[0].as_signed(), i64::MIN);
}

#[test]
fn output_chunks_and_pressure_do_not_change_output() {
    let input = padded_sample();
    let expected = encode_module(&sample_sections(), None);
    for (chunk_size, max_buffered) in [(Some(1), 64 * 1024), (Some(4), 3), (None, 1), (None, 0)] {
        let config = InterpConfig {
            output_chunk_size: chunk_size,
            max_buffered_output: max_buffered,
            ..InterpConfig::default()
        };
        let transcript = transcode(module_format(), config, &input, 5).unwrap();
        assert_eq!(
            transcript.output, expected,
            "chunk {chunk_size:?}, max buffered {max_buffered}"
        );
    }
}

#[test]
fn need_output_space_waits_for_a_drain() {
    let format = format_with(|b| {
        let v = b.value(ValueKind::Uint8);
        b.until_eof(v)
    });
    let config = InterpConfig {
        max_buffered_output: 4,
        ..InterpConfig::default()
    };
    let mut driver = Decompressor::new(format, config);
    driver.supply_input(&[9; 10]).unwrap();
    assert_eq!(driver.resume(), ResumeOutcome::NeedOutputSpace);
    assert_eq!(
        driver.state(),
        &DriverState::Suspended(Suspension::NeedOutputSpace)
    );
    assert_eq!(driver.input_address(), 4);
    assert_eq!(driver.request_output_buffer(3).unwrap().len(), 3);
    assert_eq!(driver.resume(), ResumeOutcome::NeedOutputSpace);
    assert_eq!(driver.input_address(), 7);
}

#[test]
fn resumes_may_hop_threads() {
    let input = padded_sample();
    let mut driver = Decompressor::new(module_format(), InterpConfig::default());
    let mut output = Vec::new();
    let mut chunks = input.chunks(7);
    loop {
        let (returned, outcome) = thread::spawn(move || {
            let outcome = driver.resume();
            (driver, outcome)
        })
        .join()
        .unwrap();
        driver = returned;
        output.extend_from_slice(&driver.drain().unwrap());
        match outcome {
            ResumeOutcome::NeedInput => match chunks.next() {
                Some(chunk) => driver.supply_input(chunk).unwrap(),
                None => driver.close_input().unwrap(),
            },
            ResumeOutcome::Finished => break,
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(output, encode_module(&sample_sections(), None));
}

#[tokio::test]
async fn async_adapter_matches_chunked_run() {
    let input = padded_sample();
    let config = InterpConfig {
        page_size: 3,
        ..InterpConfig::default()
    };
    let mut out = Vec::new();
    let summary = decompress_stream(module_format(), config, &input[..], &mut out)
        .await
        .unwrap();
    assert_eq!(summary.input_bytes, input.len());
    assert_eq!(out, encode_module(&sample_sections(), None));
}

fn arb_sections() -> impl Strategy<Value = Vec<Section>> {
    prop::collection::vec(
        (any::<u8>(), prop::collection::vec(any::<i64>(), 0..12))
            .prop_map(|(id, entries)| Section { id, entries }),
        0..5,
    )
}

proptest! {
    #[test]
    fn prop_three_way_splits_agree(
        sections in arb_sections(),
        a in any::<prop::sample::Index>(),
        b in any::<prop::sample::Index>(),
    ) {
        let input = encode_module(&sections, Some(5));
        let whole = transcode(module_format(), collecting(), &input, input.len()).unwrap();

        let mut cuts = [a.index(input.len() + 1), b.index(input.len() + 1)];
        cuts.sort_unstable();
        let parts = [&input[..cuts[0]], &input[cuts[0]..cuts[1]], &input[cuts[1]..]];
        let split = decompress_chunks(module_format(), collecting(), parts).unwrap();

        prop_assert_eq!(&split.output, &whole.output);
        prop_assert_eq!(&split.values, &whole.values);
    }
}

#[test]
fn shared_format_serves_many_drivers() {
    let format = module_format();
    let input = padded_sample();
    let outputs: Vec<Vec<u8>> = (1..=4)
        .map(|chunk| {
            transcode(Arc::clone(&format), InterpConfig::default(), &input, chunk)
                .unwrap()
                .output
        })
        .collect();
    assert!(outputs.windows(2).all(|w| w[0] == w[1]));
}
