use cwasm_wire::{BitAddress, ReadCursor};
use tracing::trace;

use crate::error::DecodeError;
use crate::read_stream::{ByteReadStream, ReadStream};

/// A framed block the reader is currently inside.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnteredBlock {
    body_start: usize,
    end: BitAddress,
}

impl EnteredBlock {
    #[must_use]
    pub fn body_start(&self) -> usize {
        self.body_start
    }

    #[must_use]
    pub fn end(&self) -> BitAddress {
        self.end
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.end.byte() - self.body_start
    }
}

/// Entry and exit of size-prefixed blocks on the read side.
///
/// Entering pushes the block's end as the cursor's end-of-block bound, so
/// nothing inside can read past it; leaving checks that the body was
/// consumed exactly and restores the enclosing bound.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockReader {
    stream: ByteReadStream,
}

impl BlockReader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the size header at `pos` and enter the block behind it.
    ///
    /// # Errors
    ///
    /// Wire errors from the size read, or [`cwasm_wire::WireError::PastEndOfBlock`]
    /// if the block would extend past the enclosing one.
    pub fn enter(&self, pos: &mut ReadCursor) -> Result<EnteredBlock, DecodeError> {
        let mut staged = pos.clone();
        let size = self.stream.read_block_size(&mut staged)?;
        let block = self.enter_sized(&mut staged, size)?;
        *pos = staged;
        Ok(block)
    }

    /// Enter a block of `size` bytes starting at `pos`, whose header has
    /// already been consumed.
    ///
    /// # Errors
    ///
    /// [`cwasm_wire::WireError::PastEndOfBlock`] if the block would extend
    /// past the enclosing one.
    pub fn enter_sized(&self, pos: &mut ReadCursor, size: usize) -> Result<EnteredBlock, DecodeError> {
        let body_start = pos.address();
        let end = BitAddress::from_byte(body_start.saturating_add(size));
        pos.push_eob(end)?;
        trace!(body_start, size, depth = pos.block_depth(), "entered input block");
        Ok(EnteredBlock { body_start, end })
    }

    /// Leave `block`, which must be the innermost block entered.
    ///
    /// # Errors
    ///
    /// [`DecodeError::BlockUnderrun`] if the cursor is not exactly at the
    /// block end.
    pub fn leave(&self, pos: &mut ReadCursor, block: EnteredBlock) -> Result<(), DecodeError> {
        let actual = pos.bit_address();
        if actual != block.end {
            return Err(DecodeError::BlockUnderrun {
                expected: block.end,
                actual,
            });
        }
        pos.pop_eob()?;
        trace!(end = %block.end, "left input block");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwasm_encoder::BlockWriter;
    use cwasm_wire::{Queue, StreamKind, WireError, WriteCursor};
    use std::sync::Arc;

    fn reader(bytes: &[u8]) -> ReadCursor {
        let queue = Queue::with_page_size(4);
        queue.append(bytes).unwrap();
        ReadCursor::new(queue, StreamKind::Byte)
    }

    #[test]
    fn block_bounds_reads() {
        let mut pos = reader(&[0x02, 0xAA, 0xBB, 0xCC]);
        let reader = BlockReader::new();
        let block = reader.enter(&mut pos).unwrap();
        assert_eq!(block.size(), 2);
        assert_eq!(pos.read_byte().unwrap(), 0xAA);
        assert_eq!(pos.read_byte().unwrap(), 0xBB);
        assert!(matches!(
            pos.read_byte(),
            Err(WireError::PastEndOfBlock { .. })
        ));
        reader.leave(&mut pos, block).unwrap();
        assert_eq!(pos.read_byte().unwrap(), 0xCC);
    }

    #[test]
    fn early_leave_is_underrun() {
        let mut pos = reader(&[0x02, 0xAA, 0xBB]);
        let reader = BlockReader::new();
        let block = reader.enter(&mut pos).unwrap();
        pos.read_byte().unwrap();
        assert_eq!(
            reader.leave(&mut pos, block),
            Err(DecodeError::BlockUnderrun {
                expected: BitAddress::from_byte(3),
                actual: BitAddress::from_byte(2),
            })
        );
    }

    #[test]
    fn inner_block_cannot_outgrow_outer() {
        let mut pos = reader(&[0x02, 0x05, 0x00, 0x00]);
        let reader = BlockReader::new();
        reader.enter(&mut pos).unwrap();
        assert!(matches!(
            reader.enter(&mut pos),
            Err(DecodeError::Wire(WireError::PastEndOfBlock { .. }))
        ));
        assert_eq!(pos.address(), 1);
    }

    #[test]
    fn reads_back_written_block_sizes() {
        for len in [0usize, 1, 200] {
            let queue = Queue::with_page_size(8);
            let mut out = WriteCursor::new(Arc::clone(&queue), StreamKind::Byte);
            let writer = BlockWriter::new();
            let open = writer.begin(&mut out).unwrap();
            out.write_bytes(&vec![0x5A; len]).unwrap();
            writer.finish(&mut out, open).unwrap();

            let mut pos = ReadCursor::new(queue, StreamKind::Byte);
            let reader = BlockReader::new();
            let block = reader.enter(&mut pos).unwrap();
            assert_eq!(block.size(), len);
            for _ in 0..len {
                pos.read_byte().unwrap();
            }
            reader.leave(&mut pos, block).unwrap();
        }
    }
}
