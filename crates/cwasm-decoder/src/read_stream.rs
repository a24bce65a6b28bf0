use cwasm_format::{Node, ValueKind};
use cwasm_wire::leb128::Leb128Accumulator;
use cwasm_wire::{BitAddress, ReadCursor, WireError};

use crate::error::DecodeError;

/// A value decode in progress.
///
/// Holds whatever has been consumed of one value so far, so a read that
/// runs out of input can pick up exactly where it stopped once more bytes
/// arrive. Fixed-width kinds collect little-endian bytes; LEB128 kinds
/// delegate to a [`Leb128Accumulator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueAccumulator {
    Fixed {
        kind: ValueKind,
        value: u64,
        count: usize,
    },
    Leb128 {
        kind: ValueKind,
        acc: Leb128Accumulator,
    },
}

impl ValueAccumulator {
    #[must_use]
    pub fn new(kind: ValueKind) -> Self {
        if kind.is_leb128() {
            let acc = if kind.is_signed() {
                Leb128Accumulator::signed(kind.bit_width())
            } else {
                Leb128Accumulator::unsigned(kind.bit_width())
            };
            Self::Leb128 { kind, acc }
        } else {
            Self::Fixed {
                kind,
                value: 0,
                count: 0,
            }
        }
    }

    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Fixed { kind, .. } | Self::Leb128 { kind, .. } => *kind,
        }
    }

    /// Bytes consumed toward the value in progress.
    #[must_use]
    pub fn bytes_consumed(&self) -> usize {
        match self {
            Self::Fixed { count, .. } => *count,
            Self::Leb128 { acc, .. } => acc.chunks_consumed() as usize,
        }
    }

    /// Consume one byte; returns the value once complete.
    ///
    /// # Errors
    ///
    /// LEB128 length and overflow errors from [`Leb128Accumulator::feed`].
    pub fn feed(&mut self, byte: u8) -> Result<Option<u64>, WireError> {
        match self {
            Self::Fixed { kind, value, count } => {
                *value |= u64::from(byte) << (8 * *count);
                *count += 1;
                if *count < kind.max_encoded_len() {
                    return Ok(None);
                }
                let done = *value;
                *value = 0;
                *count = 0;
                Ok(Some(done))
            }
            Self::Leb128 { acc, .. } => acc.feed(byte),
        }
    }
}

/// Typed reads through a [`ReadCursor`].
pub trait ReadStream {
    /// Continue the decode held in `acc`, consuming bytes from `pos` until
    /// the value completes.
    ///
    /// Each consumed byte is committed to both `pos` and `acc`, so on
    /// [`WireError::NotAvailable`] the caller keeps both and calls again
    /// later.
    ///
    /// # Errors
    ///
    /// Wire errors from the cursor or the LEB128 layer.
    fn resume_value(
        &self,
        pos: &mut ReadCursor,
        acc: &mut ValueAccumulator,
    ) -> Result<u64, DecodeError>;

    /// Read one whole value of `kind`, or nothing: on any error the cursor
    /// stays where it was.
    ///
    /// # Errors
    ///
    /// As [`resume_value`](Self::resume_value).
    fn read_kind(&self, pos: &mut ReadCursor, kind: ValueKind) -> Result<u64, DecodeError> {
        let mut staged = pos.clone();
        let mut acc = ValueAccumulator::new(kind);
        let value = self.resume_value(&mut staged, &mut acc)?;
        *pos = staged;
        Ok(value)
    }

    /// Dispatch on a format node. Only value nodes have a read primitive.
    ///
    /// # Errors
    ///
    /// [`DecodeError::UnsupportedFormat`] for every non-value node, plus
    /// the errors of [`read_kind`](Self::read_kind).
    fn read_value(&self, pos: &mut ReadCursor, node: &Node) -> Result<u64, DecodeError> {
        match node.value_kind() {
            Some(kind) => self.read_kind(pos, kind),
            None => Err(DecodeError::UnsupportedFormat { kind: node.kind() }),
        }
    }

    /// # Errors
    ///
    /// See [`read_kind`](Self::read_kind).
    #[allow(clippy::cast_possible_truncation)]
    fn read_uint8(&self, pos: &mut ReadCursor) -> Result<u8, DecodeError> {
        self.read_kind(pos, ValueKind::Uint8).map(|v| v as u8)
    }

    /// # Errors
    ///
    /// See [`read_kind`](Self::read_kind).
    #[allow(clippy::cast_possible_truncation)]
    fn read_uint32(&self, pos: &mut ReadCursor) -> Result<u32, DecodeError> {
        self.read_kind(pos, ValueKind::Uint32).map(|v| v as u32)
    }

    /// # Errors
    ///
    /// See [`read_kind`](Self::read_kind).
    fn read_uint64(&self, pos: &mut ReadCursor) -> Result<u64, DecodeError> {
        self.read_kind(pos, ValueKind::Uint64)
    }

    /// # Errors
    ///
    /// See [`read_kind`](Self::read_kind).
    #[allow(clippy::cast_possible_truncation)]
    fn read_varint32(&self, pos: &mut ReadCursor) -> Result<i32, DecodeError> {
        self.read_kind(pos, ValueKind::Varint32).map(|v| v as i32)
    }

    /// # Errors
    ///
    /// See [`read_kind`](Self::read_kind).
    #[allow(clippy::cast_possible_wrap)]
    fn read_varint64(&self, pos: &mut ReadCursor) -> Result<i64, DecodeError> {
        self.read_kind(pos, ValueKind::Varint64).map(|v| v as i64)
    }

    /// # Errors
    ///
    /// See [`read_kind`](Self::read_kind).
    #[allow(clippy::cast_possible_truncation)]
    fn read_varuint32(&self, pos: &mut ReadCursor) -> Result<u32, DecodeError> {
        self.read_kind(pos, ValueKind::Varuint32).map(|v| v as u32)
    }

    /// # Errors
    ///
    /// See [`read_kind`](Self::read_kind).
    fn read_varuint64(&self, pos: &mut ReadCursor) -> Result<u64, DecodeError> {
        self.read_kind(pos, ValueKind::Varuint64)
    }

    /// Block sizes are varuint32 on the wire, padded or not.
    ///
    /// # Errors
    ///
    /// See [`read_kind`](Self::read_kind).
    #[allow(clippy::cast_possible_truncation)]
    fn read_block_size(&self, pos: &mut ReadCursor) -> Result<usize, DecodeError> {
        self.read_kind(pos, ValueKind::Varuint32).map(|v| v as usize)
    }

    /// # Errors
    ///
    /// Never fails for read cursors; kept fallible to mirror the write side.
    fn align_to_byte(&self, pos: &mut ReadCursor) -> Result<(), DecodeError> {
        pos.align_to_byte().map_err(DecodeError::from)
    }

    fn stream_address(&self, pos: &ReadCursor) -> BitAddress {
        pos.bit_address()
    }
}

/// Read stream over byte-granular encodings.
#[derive(Clone, Copy, Debug, Default)]
pub struct ByteReadStream;

impl ByteReadStream {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ReadStream for ByteReadStream {
    fn resume_value(
        &self,
        pos: &mut ReadCursor,
        acc: &mut ValueAccumulator,
    ) -> Result<u64, DecodeError> {
        loop {
            let byte = pos.read_byte()?;
            if let Some(value) = acc.feed(byte)? {
                return Ok(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwasm_encoder::{ByteWriteStream, WriteStream};
    use cwasm_format::NodeKind;
    use cwasm_wire::{Queue, StreamKind, WriteCursor};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn reader(bytes: &[u8]) -> ReadCursor {
        let queue = Queue::with_page_size(4);
        queue.append(bytes).unwrap();
        ReadCursor::new(queue, StreamKind::Byte)
    }

    #[test]
    fn decodes_known_value_list() {
        let mut pos = reader(&[0x00, 0x01, 0x7F, 0x80, 0x01, 0xAC, 0x02, 0x80, 0x80, 0x01]);
        let values: Vec<u32> = (0..6)
            .map(|_| ByteReadStream.read_varuint32(&mut pos).unwrap())
            .collect();
        assert_eq!(values, vec![0, 1, 127, 128, 300, 16384]);
    }

    #[test]
    fn fixed_width_is_little_endian() {
        let mut pos = reader(&[0x04, 0x03, 0x02, 0x01, 0xFF]);
        assert_eq!(ByteReadStream.read_uint32(&mut pos).unwrap(), 0x0102_0304);
        assert_eq!(ByteReadStream.read_uint8(&mut pos).unwrap(), 0xFF);
    }

    #[test]
    fn signed_values_sign_extend() {
        let mut pos = reader(&[0x7F, 0xBF, 0x7F, 0x80, 0x80, 0x80, 0x80, 0x78]);
        assert_eq!(ByteReadStream.read_varint32(&mut pos).unwrap(), -1);
        assert_eq!(ByteReadStream.read_varint64(&mut pos).unwrap(), -65);
        assert_eq!(ByteReadStream.read_varint32(&mut pos).unwrap(), i32::MIN);
    }

    #[test]
    fn padded_leb128_reads_as_plain() {
        let mut pos = reader(&[0x80, 0x80, 0x80, 0x80, 0x00]);
        assert_eq!(
            ByteReadStream.read_kind(&mut pos, ValueKind::FixedVaruint32).unwrap(),
            0
        );
        assert_eq!(pos.address(), 5);
    }

    #[test]
    fn short_input_suspends_without_moving() {
        let mut pos = reader(&[0x80, 0x80]);
        let err = ByteReadStream.read_varuint32(&mut pos).unwrap_err();
        assert!(err.is_suspension());
        assert_eq!(pos.address(), 0);
    }

    #[test]
    fn accumulator_resumes_across_supplies() {
        let queue = Queue::with_page_size(2);
        queue.append(&[0xAC]).unwrap();
        let mut pos = ReadCursor::new(Arc::clone(&queue), StreamKind::Byte);
        let mut acc = ValueAccumulator::new(ValueKind::Varuint64);
        assert!(ByteReadStream.resume_value(&mut pos, &mut acc).unwrap_err().is_suspension());
        assert_eq!(acc.bytes_consumed(), 1);
        assert_eq!(pos.address(), 1);
        queue.append(&[0x02]).unwrap();
        assert_eq!(ByteReadStream.resume_value(&mut pos, &mut acc).unwrap(), 300);
    }

    #[test]
    fn overlong_leb128_is_malformed() {
        let mut pos = reader(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x00]);
        assert_eq!(
            ByteReadStream.read_varuint32(&mut pos).unwrap_err(),
            DecodeError::Wire(WireError::VarintTooLong { max_chunks: 5 })
        );
    }

    #[test]
    fn last_byte_past_block_end_is_boundary_not_malformed() {
        let mut pos = reader(&[0x80, 0x80, 0x01]);
        pos.push_eob(BitAddress::from_byte(2)).unwrap();
        assert!(matches!(
            ByteReadStream.read_varuint32(&mut pos),
            Err(DecodeError::Wire(WireError::PastEndOfBlock { .. }))
        ));
        assert_eq!(pos.address(), 0);
    }

    #[test]
    fn structural_nodes_are_unsupported() {
        let mut pos = reader(&[0]);
        assert_eq!(
            ByteReadStream.read_value(&mut pos, &Node::Sequence(vec![])),
            Err(DecodeError::UnsupportedFormat {
                kind: NodeKind::Sequence
            })
        );
    }

    proptest! {
        #[test]
        #[allow(clippy::cast_sign_loss)]
        fn prop_every_kind_roundtrips(raw in any::<u64>(), kind_index in 0usize..9, page_size in 1usize..6) {
            let kind = ValueKind::ALL[kind_index];
            let value = match kind.bit_width() {
                8 => raw & 0xFF,
                32 if kind.is_signed() => i64::from(raw as i32) as u64,
                32 => raw & 0xFFFF_FFFF,
                _ => raw,
            };
            let queue = Queue::with_page_size(page_size);
            let mut out = WriteCursor::new(Arc::clone(&queue), StreamKind::Byte);
            ByteWriteStream.write_kind(value, &mut out, kind).unwrap();
            let mut pos = ReadCursor::new(queue, StreamKind::Byte);
            prop_assert_eq!(ByteReadStream.read_kind(&mut pos, kind).unwrap(), value);
            prop_assert_eq!(pos.address(), out.address());
        }
    }
}
