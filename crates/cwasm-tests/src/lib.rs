//! Shared fixtures for the integration suites and benches.
//!
//! The running example is a small sectioned container in the shape of a
//! wasm module: a fixed header followed by id-tagged, size-prefixed
//! sections, each holding a counted list of signed LEB128 entries.
//!
//! ```text
//!   uint32 magic | uint32 version | { uint8 id | block( varuint32 n | varint64 × n ) }*
//! ```

use std::fmt::Write as _;
use std::sync::Arc;

use cwasm_encoder::{BlockWriter, ByteWriteStream, WriteStream};
use cwasm_format::{Format, FormatBuilder, NodeId, ValueKind};
use cwasm_interp::{InterpConfig, InterpError, Transcript, decompress_chunks};
use cwasm_wire::{Queue, StreamKind, WriteCursor};

pub const MAGIC: u32 = 0x6d73_6100;
pub const VERSION: u32 = 1;

/// One section of the sample container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    pub id: u8,
    pub entries: Vec<i64>,
}

impl Section {
    #[must_use]
    pub fn new(id: u8, entries: &[i64]) -> Self {
        Self {
            id,
            entries: entries.to_vec(),
        }
    }
}

/// Build a shared format with the given builder closure.
pub fn format_with(build: impl FnOnce(&mut FormatBuilder) -> NodeId) -> Arc<Format> {
    let mut builder = FormatBuilder::new();
    let root = build(&mut builder);
    Arc::new(builder.finish(root).expect("fixture format is well formed"))
}

/// Format tree for the sample container.
#[must_use]
pub fn module_format() -> Arc<Format> {
    format_with(|b| {
        let magic = b.value(ValueKind::Uint32);
        let version = b.value(ValueKind::Uint32);
        let id = b.value(ValueKind::Uint8);
        let entry = b.value(ValueKind::Varint64);
        let entries = b.counted_loop(ValueKind::Varuint32, entry);
        let body = b.block(entries);
        let section = b.sequence([id, body]);
        let sections = b.until_eof(section);
        b.sequence([magic, version, sections])
    })
}

/// A few sections covering empty bodies, multi-byte entries, and the
/// signed extremes.
#[must_use]
pub fn sample_sections() -> Vec<Section> {
    vec![
        Section::new(1, &[0, -1, 300]),
        Section::new(2, &[]),
        Section::new(7, &[i64::MIN, i64::MAX]),
    ]
}

/// Encode a container. With `padding`, every section size header is
/// written at that many LEB128 chunks; without it, headers are minimal.
#[must_use]
pub fn encode_module(sections: &[Section], padding: Option<u32>) -> Vec<u8> {
    let queue = Queue::new();
    let mut pos = WriteCursor::new(Arc::clone(&queue), StreamKind::Byte);
    let stream = ByteWriteStream;
    let blocks = match padding {
        Some(chunks) => BlockWriter::new().with_reserved_chunks(chunks),
        None => BlockWriter::new().with_minimize(true),
    };

    stream.write_uint32(MAGIC, &mut pos).expect("header fits");
    stream.write_uint32(VERSION, &mut pos).expect("header fits");
    for section in sections {
        stream.write_uint8(section.id, &mut pos).expect("id fits");
        let open = blocks.begin(&mut pos).expect("open section");
        let count = u32::try_from(section.entries.len()).expect("entry count fits u32");
        stream.write_varuint32(count, &mut pos).expect("count fits");
        for &entry in &section.entries {
            stream.write_varint64(entry, &mut pos).expect("entry fits");
        }
        blocks.finish(&mut pos, open).expect("close section");
    }

    let end = queue.fill_address();
    queue.copy_out(0, end).expect("whole stream resident").to_vec()
}

/// Run `format` over `input` delivered in `chunk`-byte pieces.
///
/// # Errors
///
/// The driver's terminal error.
pub fn transcode(
    format: Arc<Format>,
    config: InterpConfig,
    input: &[u8],
    chunk: usize,
) -> Result<Transcript, InterpError> {
    decompress_chunks(format, config, input.chunks(chunk.max(1)))
}

/// Config that records every value.
#[must_use]
pub fn collecting() -> InterpConfig {
    InterpConfig {
        collect_values: true,
        ..InterpConfig::default()
    }
}

/// Text rendering of a transcript: one line per value, then the output
/// as hex.
#[must_use]
pub fn render(transcript: &Transcript) -> String {
    let mut out = String::new();
    for value in &transcript.values {
        let _ = writeln!(out, "{value}");
    }
    let _ = write!(out, "output {}", hex::encode(&transcript.output));
    out
}
