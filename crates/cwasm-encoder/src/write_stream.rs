use cwasm_format::{Node, ValueKind};
use cwasm_wire::leb128::{CHUNK_BITS, Termination, emit_leb128};
use cwasm_wire::{BitAddress, ReadCursor, WireError, WriteCursor};

use crate::error::EncodeError;

/// Typed writes through a [`WriteCursor`].
///
/// Implementors supply the primitive encodings; the typed helpers and node
/// dispatch are shared. Every write either lands completely or leaves the
/// cursor where it started.
pub trait WriteStream {
    /// Write `value` using the encoding of `kind`.
    ///
    /// # Errors
    ///
    /// [`EncodeError::ValueOutOfRange`] if `value` does not fit `kind`,
    /// or a wire error from the cursor.
    fn write_kind(&self, value: u64, pos: &mut WriteCursor, kind: ValueKind)
    -> Result<(), EncodeError>;

    /// Write a size field padded to exactly `reserved` chunks.
    ///
    /// # Errors
    ///
    /// [`EncodeError::BlockTooLarge`] if `size` needs more than `reserved`
    /// chunks.
    fn write_fixed_block_size(
        &self,
        pos: &mut WriteCursor,
        size: usize,
        reserved: u32,
    ) -> Result<(), EncodeError>;

    /// Write a size field in its shortest form.
    ///
    /// # Errors
    ///
    /// Wire errors from the cursor.
    fn write_varint_block_size(&self, pos: &mut WriteCursor, size: usize)
    -> Result<(), EncodeError>;

    /// Copy `size` already-written bytes starting at `start` to the
    /// position of `pos`, advancing `pos` past the copy.
    ///
    /// # Errors
    ///
    /// Wire errors from either cursor.
    fn move_block(&self, pos: &mut WriteCursor, start: usize, size: usize)
    -> Result<(), EncodeError>;

    /// Body length of a block whose header of `reserved` bytes starts at
    /// `start` and whose body ends at `end`.
    fn block_size(&self, start: usize, end: usize, reserved: u32) -> usize {
        end - (start + reserved as usize)
    }

    /// Dispatch on a format node. Only value nodes have a write primitive.
    ///
    /// # Errors
    ///
    /// [`EncodeError::UnsupportedFormat`] for every non-value node, plus
    /// the errors of [`write_kind`](Self::write_kind).
    fn write_value(&self, value: u64, pos: &mut WriteCursor, node: &Node) -> Result<(), EncodeError> {
        match node.value_kind() {
            Some(kind) => self.write_kind(value, pos, kind),
            None => Err(EncodeError::UnsupportedFormat { kind: node.kind() }),
        }
    }

    /// # Errors
    ///
    /// See [`write_kind`](Self::write_kind).
    fn write_uint8(&self, value: u8, pos: &mut WriteCursor) -> Result<(), EncodeError> {
        self.write_kind(u64::from(value), pos, ValueKind::Uint8)
    }

    /// # Errors
    ///
    /// See [`write_kind`](Self::write_kind).
    fn write_uint32(&self, value: u32, pos: &mut WriteCursor) -> Result<(), EncodeError> {
        self.write_kind(u64::from(value), pos, ValueKind::Uint32)
    }

    /// # Errors
    ///
    /// See [`write_kind`](Self::write_kind).
    fn write_uint64(&self, value: u64, pos: &mut WriteCursor) -> Result<(), EncodeError> {
        self.write_kind(value, pos, ValueKind::Uint64)
    }

    /// # Errors
    ///
    /// See [`write_kind`](Self::write_kind).
    #[allow(clippy::cast_sign_loss)]
    fn write_varint32(&self, value: i32, pos: &mut WriteCursor) -> Result<(), EncodeError> {
        self.write_kind(i64::from(value) as u64, pos, ValueKind::Varint32)
    }

    /// # Errors
    ///
    /// See [`write_kind`](Self::write_kind).
    #[allow(clippy::cast_sign_loss)]
    fn write_varint64(&self, value: i64, pos: &mut WriteCursor) -> Result<(), EncodeError> {
        self.write_kind(value as u64, pos, ValueKind::Varint64)
    }

    /// # Errors
    ///
    /// See [`write_kind`](Self::write_kind).
    fn write_varuint32(&self, value: u32, pos: &mut WriteCursor) -> Result<(), EncodeError> {
        self.write_kind(u64::from(value), pos, ValueKind::Varuint32)
    }

    /// # Errors
    ///
    /// See [`write_kind`](Self::write_kind).
    fn write_varuint64(&self, value: u64, pos: &mut WriteCursor) -> Result<(), EncodeError> {
        self.write_kind(value, pos, ValueKind::Varuint64)
    }

    /// # Errors
    ///
    /// Store failures when flushing a bit cursor's partial byte.
    fn align_to_byte(&self, pos: &mut WriteCursor) -> Result<(), EncodeError> {
        pos.align_to_byte().map_err(EncodeError::from)
    }

    fn stream_address(&self, pos: &WriteCursor) -> BitAddress {
        pos.bit_address()
    }
}

/// Write stream over byte-granular encodings.
///
/// Works on bit cursors too: each byte goes through
/// [`WriteCursor::write_byte`], which handles unaligned positions.
#[derive(Clone, Copy, Debug, Default)]
pub struct ByteWriteStream;

impl ByteWriteStream {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Largest size a `reserved`-chunk header can carry.
fn header_limit(reserved: u32) -> u64 {
    let bits = CHUNK_BITS.saturating_mul(reserved);
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

fn emit(pos: &mut WriteCursor, value: u64, termination: Termination) -> Result<(), WireError> {
    emit_leb128(value, termination, |byte| pos.write_byte(byte)).map(|_| ())
}

#[allow(clippy::cast_possible_wrap)]
fn stage_kind(value: u64, pos: &mut WriteCursor, kind: ValueKind) -> Result<(), WireError> {
    match kind {
        ValueKind::Uint8 | ValueKind::Uint32 | ValueKind::Uint64 => {
            let len = kind.max_encoded_len();
            pos.write_bytes(&value.to_le_bytes()[..len])
        }
        ValueKind::Varint32 | ValueKind::Varint64 => {
            emit(pos, value, Termination::for_signed(value as i64))
        }
        ValueKind::Varuint32 | ValueKind::Varuint64 => emit(pos, value, Termination::Unsigned),
        ValueKind::FixedVaruint32 | ValueKind::FixedVaruint64 => {
            emit(pos, value, Termination::fixed(kind.bit_width()))
        }
    }
}

impl WriteStream for ByteWriteStream {
    fn write_kind(
        &self,
        value: u64,
        pos: &mut WriteCursor,
        kind: ValueKind,
    ) -> Result<(), EncodeError> {
        if !kind.fits(value) {
            return Err(EncodeError::ValueOutOfRange { kind, value });
        }
        let fill = pos.queue().fill_address();
        let mut staged = pos.clone();
        if let Err(e) = stage_kind(value, &mut staged, kind) {
            // Drop whatever part of the value reached the queue.
            if pos.queue().fill_address() > fill {
                pos.queue().truncate(fill)?;
            }
            return Err(e.into());
        }
        *pos = staged;
        Ok(())
    }

    fn write_fixed_block_size(
        &self,
        pos: &mut WriteCursor,
        size: usize,
        reserved: u32,
    ) -> Result<(), EncodeError> {
        let limit = header_limit(reserved);
        if size as u64 > limit {
            return Err(EncodeError::BlockTooLarge { size, limit });
        }
        emit(pos, size as u64, Termination::Fixed { chunks: reserved })?;
        Ok(())
    }

    fn write_varint_block_size(
        &self,
        pos: &mut WriteCursor,
        size: usize,
    ) -> Result<(), EncodeError> {
        emit(pos, size as u64, Termination::Unsigned)?;
        Ok(())
    }

    fn move_block(
        &self,
        pos: &mut WriteCursor,
        start: usize,
        size: usize,
    ) -> Result<(), EncodeError> {
        let mut source = ReadCursor::over(pos, start);
        for _ in 0..size {
            let byte = source.read_byte()?;
            pos.write_byte(byte)?;
        }
        source.close();
        Ok(())
    }
}
