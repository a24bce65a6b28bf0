use cwasm_wire::WriteCursor;
use cwasm_wire::leb128::chunks_in_word;
use tracing::trace;

use crate::error::EncodeError;
use crate::write_stream::{ByteWriteStream, WriteStream};

/// Size-prefixed block framing with a backpatched header.
///
/// The body length is unknown when the block opens, so the writer first
/// reserves a padded LEB128 placeholder, lets the caller write the body,
/// and then overwrites the placeholder with the real size.
///
/// ```text
///  begin():   │ 80 80 80 80 00 │ body ...
///               ^ start          ^ start + reserved
///  finish():  │ 8A 80 80 80 00 │ body (10 bytes)        (padded)
///  minimize:  │ 0A │ body (10 bytes) │                  (moved back, truncated)
/// ```
///
/// With minimization on, the header is rewritten in its shortest form and
/// the body is moved back to follow it directly; the output queue is then
/// truncated to drop the stale tail. Both shapes decode the same.
#[derive(Clone, Copy, Debug)]
pub struct BlockWriter {
    stream: ByteWriteStream,
    reserved_chunks: u32,
    minimize: bool,
}

/// A block whose header has been reserved but not yet patched.
///
/// Holds a cursor on the header, which also keeps the header's page
/// resident until the block is finished.
#[derive(Clone, Debug)]
pub struct OpenBlock {
    header: WriteCursor,
    reserved: u32,
}

impl OpenBlock {
    #[must_use]
    pub fn start(&self) -> usize {
        self.header.address()
    }

    #[must_use]
    pub fn body_start(&self) -> usize {
        self.header.address() + self.reserved as usize
    }

    /// Header width reserved for this block.
    #[must_use]
    pub fn reserved(&self) -> u32 {
        self.reserved
    }
}

impl BlockWriter {
    /// Placeholder wide enough for any 32-bit size, no minimization.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stream: ByteWriteStream,
            reserved_chunks: chunks_in_word(32),
            minimize: false,
        }
    }

    /// Override the placeholder width (minimum 1 chunk).
    #[must_use]
    pub fn with_reserved_chunks(mut self, chunks: u32) -> Self {
        self.reserved_chunks = chunks.max(1);
        self
    }

    #[must_use]
    pub fn with_minimize(mut self, minimize: bool) -> Self {
        self.minimize = minimize;
        self
    }

    #[must_use]
    pub fn reserved_chunks(&self) -> u32 {
        self.reserved_chunks
    }

    /// Reserve the header at `pos` and leave `pos` at the body start.
    ///
    /// # Errors
    ///
    /// Wire errors from the cursor.
    pub fn begin(&self, pos: &mut WriteCursor) -> Result<OpenBlock, EncodeError> {
        let header = pos.clone();
        self.stream
            .write_fixed_block_size(pos, 0, self.reserved_chunks)?;
        trace!(start = header.address(), reserved = self.reserved_chunks, "opened output block");
        Ok(OpenBlock {
            header,
            reserved: self.reserved_chunks,
        })
    }

    /// Patch the header of `block`, whose body ends at `pos`. Returns the
    /// body size. With minimization `pos` moves back to the new body end.
    ///
    /// # Errors
    ///
    /// [`EncodeError::BlockTooLarge`] if the body outgrew the reserved
    /// header, or wire errors from the cursors.
    pub fn finish(&self, pos: &mut WriteCursor, block: OpenBlock) -> Result<usize, EncodeError> {
        let OpenBlock {
            mut header,
            reserved,
        } = block;
        let start = header.address();
        let body_start = start + reserved as usize;
        let size = self.stream.block_size(start, pos.address(), reserved);

        if !self.minimize {
            self.stream
                .write_fixed_block_size(&mut header, size, reserved)?;
            trace!(start, size, "backpatched block size");
            return Ok(size);
        }

        // Validate against the reserved width first so both modes accept
        // exactly the same blocks.
        let mut probe = header.clone();
        self.stream
            .write_fixed_block_size(&mut probe, size, reserved)?;
        self.stream.write_varint_block_size(&mut header, size)?;
        if header.address() < body_start {
            self.stream.move_block(&mut header, body_start, size)?;
            let end = header.address();
            pos.queue().truncate(end)?;
            pos.seek(end);
            trace!(start, size, saved = body_start - (end - size), "minimized block header");
        } else {
            trace!(start, size, "block header already minimal");
        }
        header.close();
        Ok(size)
    }
}

impl Default for BlockWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwasm_wire::leb128::decode_varint;
    use cwasm_wire::{Queue, StreamKind};
    use std::sync::Arc;

    fn framed(writer: BlockWriter, body: &[u8]) -> Vec<u8> {
        let queue = Queue::with_page_size(16);
        let mut pos = WriteCursor::new(Arc::clone(&queue), StreamKind::Byte);
        let block = writer.begin(&mut pos).unwrap();
        pos.write_bytes(body).unwrap();
        let size = writer.finish(&mut pos, block).unwrap();
        assert_eq!(size, body.len());
        assert_eq!(pos.address(), queue.fill_address());
        queue.copy_out(0, queue.fill_address()).unwrap().to_vec()
    }

    fn check_roundtrip(writer: BlockWriter, len: usize) {
        let body: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let bytes = framed(writer, &body);
        let (size, header) = decode_varint(&bytes).unwrap();
        assert_eq!(size as usize, len);
        assert_eq!(&bytes[header..], body.as_slice());
    }

    #[test]
    fn padded_header_sizes_read_back() {
        for len in [0, 1, 127, 128, 20_000] {
            check_roundtrip(BlockWriter::new(), len);
        }
    }

    #[test]
    fn minimized_header_sizes_read_back() {
        for len in [0, 1, 127, 128, 20_000] {
            check_roundtrip(BlockWriter::new().with_minimize(true), len);
        }
    }

    #[test]
    fn padded_header_keeps_reserved_width() {
        let bytes = framed(BlockWriter::new(), &[9, 9]);
        assert_eq!(bytes, vec![0x82, 0x80, 0x80, 0x80, 0x00, 9, 9]);
    }

    #[test]
    fn minimized_header_is_one_byte() {
        let bytes = framed(BlockWriter::new().with_minimize(true), &[9, 9]);
        assert_eq!(bytes, vec![0x02, 9, 9]);
    }

    #[test]
    fn nested_blocks_minimize_inside_out() {
        let writer = BlockWriter::new().with_minimize(true);
        let queue = Queue::with_page_size(4);
        let mut pos = WriteCursor::new(Arc::clone(&queue), StreamKind::Byte);
        let outer = writer.begin(&mut pos).unwrap();
        pos.write_byte(1).unwrap();
        let inner = writer.begin(&mut pos).unwrap();
        pos.write_bytes(&[2, 3]).unwrap();
        assert_eq!(writer.finish(&mut pos, inner).unwrap(), 2);
        pos.write_byte(4).unwrap();
        assert_eq!(writer.finish(&mut pos, outer).unwrap(), 5);
        assert_eq!(
            queue.copy_out(0, queue.fill_address()).unwrap().as_ref(),
            &[5, 1, 2, 2, 3, 4]
        );
    }

    #[test]
    fn reserved_width_is_per_block() {
        let writer = BlockWriter::new().with_reserved_chunks(2);
        let bytes = framed(writer, &[7]);
        assert_eq!(bytes, vec![0x81, 0x00, 7]);
    }

    #[test]
    fn oversized_body_rejected() {
        let writer = BlockWriter::new().with_reserved_chunks(1);
        let queue = Queue::with_page_size(64);
        let mut pos = WriteCursor::new(queue, StreamKind::Byte);
        let block = writer.begin(&mut pos).unwrap();
        pos.write_bytes(&[0; 200]).unwrap();
        assert_eq!(
            writer.finish(&mut pos, block),
            Err(EncodeError::BlockTooLarge {
                size: 200,
                limit: 127
            })
        );
    }
}
