/// Implementation of `cwasm encode`.
///
/// Writes a JSON list of typed values through the byte write stream,
/// framing nested lists as size-prefixed blocks. Handy for producing
/// inputs for `decompress` and `inspect`.
///
/// # Value list format
///
/// ```json
/// {
///   "values": [
///     { "kind": "varuint32", "value": 2 },
///     { "block": [
///         { "kind": "varint64", "value": -3 },
///         { "kind": "uint32", "value": 4096 }
///     ] }
///   ]
/// }
/// ```
///
/// Negative values are accepted for signed kinds only. Every value must
/// fit its kind.
use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use cwasm_encoder::{BlockWriter, ByteWriteStream, WriteStream};
use cwasm_format::ValueKind;
use cwasm_wire::{Queue, StreamKind, WriteCursor};

use crate::EncodeArgs;
use crate::manifest;

#[derive(serde::Deserialize)]
struct ValueList {
    values: Vec<Item>,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum Item {
    Value {
        kind: String,
        value: serde_json::Number,
    },
    Block {
        block: Vec<Item>,
    },
}

/// Run the `cwasm encode` command.
///
/// # Errors
///
/// Returns an error if the value list cannot be read or parsed, a value
/// does not fit its kind, or the output cannot be written.
pub fn run(args: &EncodeArgs) -> Result<()> {
    let src = fs::read_to_string(&args.input)
        .with_context(|| format!("cannot read {}", args.input.display()))?;
    let bytes = encode_json(&src, !args.padded)
        .with_context(|| format!("failed to encode {}", args.input.display()))?;
    fs::write(&args.output, &bytes)
        .with_context(|| format!("cannot write {}", args.output.display()))?;
    println!("Wrote {} bytes to {}", bytes.len(), args.output.display());
    Ok(())
}

fn encode_json(src: &str, minimize: bool) -> Result<Vec<u8>> {
    let list: ValueList = serde_json::from_str(src)?;
    let queue = Queue::new();
    let mut pos = WriteCursor::new(Arc::clone(&queue), StreamKind::Byte);
    let blocks = BlockWriter::new().with_minimize(minimize);
    write_items(&list.values, &mut pos, &blocks)?;
    let end = queue.fill_address();
    queue.freeze_eof(end)?;
    Ok(queue.copy_out(0, end)?.to_vec())
}

fn write_items(items: &[Item], pos: &mut WriteCursor, blocks: &BlockWriter) -> Result<()> {
    for (idx, item) in items.iter().enumerate() {
        match item {
            Item::Value { kind, value } => {
                let kind = manifest::parse_kind(kind)?;
                let raw = to_raw(kind, value)?;
                ByteWriteStream
                    .write_kind(raw, pos, kind)
                    .with_context(|| format!("value {idx}: cannot write {value} as {kind}"))?;
            }
            Item::Block { block } => {
                let open = blocks.begin(pos)?;
                write_items(block, pos, blocks).with_context(|| format!("block at {idx}"))?;
                blocks.finish(pos, open)?;
            }
        }
    }
    Ok(())
}

/// Signed values are carried sign-extended.
#[allow(clippy::cast_sign_loss)]
fn to_raw(kind: ValueKind, value: &serde_json::Number) -> Result<u64> {
    if let Some(v) = value.as_u64() {
        return Ok(v);
    }
    match value.as_i64() {
        Some(v) if kind.is_signed() => Ok(v as u64),
        _ => Err(anyhow!("{value} is not a valid {kind} value")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_values_and_blocks() {
        let src = r#"{ "values": [
            { "kind": "varuint32", "value": 300 },
            { "block": [
                { "kind": "varint32", "value": -1 },
                { "kind": "uint8", "value": 9 }
            ] }
        ] }"#;
        assert_eq!(
            encode_json(src, true).unwrap(),
            vec![0xAC, 0x02, 0x02, 0x7F, 0x09]
        );
        assert_eq!(
            encode_json(src, false).unwrap(),
            vec![0xAC, 0x02, 0x82, 0x80, 0x80, 0x80, 0x00, 0x7F, 0x09]
        );
    }

    #[test]
    fn negative_unsigned_is_rejected() {
        let src = r#"{ "values": [ { "kind": "varuint64", "value": -2 } ] }"#;
        assert!(encode_json(src, true).is_err());
    }

    #[test]
    fn out_of_range_is_rejected() {
        let src = r#"{ "values": [ { "kind": "uint8", "value": 256 } ] }"#;
        let err = encode_json(src, true).unwrap_err();
        assert!(format!("{err:#}").contains("uint8"));
    }
}
