use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::address::{BitAddress, StreamKind};
use crate::block_eob::BlockEob;
use crate::error::WireError;
use crate::page::Page;
use crate::queue::Queue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Read,
    Write,
}

/// A byte address plus the page that backs it.
///
/// Holding the page keeps it alive: the queue will not evict a page while
/// any `PageCursor` still references it.
#[derive(Clone, Debug, Default)]
pub struct PageCursor {
    page: Option<Arc<Page>>,
    address: usize,
}

impl PageCursor {
    #[must_use]
    pub fn new(page: Option<Arc<Page>>, address: usize) -> Self {
        Self { page, address }
    }

    #[must_use]
    pub fn address(&self) -> usize {
        self.address
    }

    #[must_use]
    pub fn page(&self) -> Option<&Arc<Page>> {
        self.page.as_ref()
    }

    fn holds(&self, address: usize) -> bool {
        self.page.as_ref().is_some_and(|p| p.contains(address))
    }

    /// Drop the claim on the current page.
    pub fn release(&mut self) {
        self.page = None;
    }
}

/// A movable position in a [`Queue`] with cached bounds.
///
/// The hot path of every access compares the address against
/// `guaranteed_before_eob`, the number of bytes known to be safe without
/// consulting the queue: the current page's end, the current end-of-block
/// bound, and, for readers, the fill address. Only when the cache runs out
/// does the cursor go back to the queue to fetch the next page, check
/// availability, or report a boundary.
///
/// ```text
///   address          guaranteed_before_eob
///      │                      │
///  ────┼──────────────────────┼──────────── page / eob / fill
///      └── fast path (one compare plus the broken flag)
/// ```
///
/// A failed access never moves the cursor, so a read that stops on
/// [`WireError::NotAvailable`] can simply be retried later.
///
/// Bit cursors consume bits most significant first. A write-side bit
/// cursor keeps its partial byte in `cur_byte` and stores it only when the
/// byte completes or [`align_to_byte`](Self::align_to_byte) pads it out.
#[derive(Clone, Debug)]
pub struct Cursor {
    kind: StreamKind,
    direction: Direction,
    queue: Arc<Queue>,
    eob: Arc<BlockEob>,
    pos: PageCursor,
    cur_byte: u8,
    bits_used: u8,
    guaranteed_before_eob: usize,
}

#[derive(Clone, Copy)]
struct Snapshot {
    address: usize,
    cur_byte: u8,
    bits_used: u8,
}

impl Cursor {
    fn new(kind: StreamKind, direction: Direction, queue: Arc<Queue>, address: usize) -> Self {
        Self {
            kind,
            direction,
            queue,
            eob: BlockEob::root(),
            pos: PageCursor::new(None, address),
            cur_byte: 0,
            bits_used: 0,
            guaranteed_before_eob: 0,
        }
    }

    #[must_use]
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    #[must_use]
    pub fn queue(&self) -> &Arc<Queue> {
        &self.queue
    }

    /// Byte address of the next byte this cursor will load or store.
    #[must_use]
    pub fn address(&self) -> usize {
        self.pos.address
    }

    /// Exact stream position, including bits consumed inside a byte.
    #[must_use]
    pub fn bit_address(&self) -> BitAddress {
        match (self.direction, self.bits_used) {
            (_, 0) => BitAddress::from_byte(self.pos.address),
            (Direction::Read, used) => BitAddress::new(self.pos.address - 1, used),
            (Direction::Write, used) => BitAddress::new(self.pos.address, used),
        }
    }

    #[must_use]
    pub fn eob(&self) -> &Arc<BlockEob> {
        &self.eob
    }

    /// Current end-of-block bound, resolved against the queue EOF.
    #[must_use]
    pub fn eob_address(&self) -> BitAddress {
        self.eob.resolve(&self.queue)
    }

    #[must_use]
    pub fn block_depth(&self) -> usize {
        self.eob.depth()
    }

    #[must_use]
    pub fn guaranteed_before_eob(&self) -> usize {
        self.guaranteed_before_eob
    }

    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.queue.is_broken()
    }

    #[must_use]
    pub fn is_eof_frozen(&self) -> bool {
        self.queue.is_eof_frozen()
    }

    #[must_use]
    pub fn eof_address(&self) -> Option<usize> {
        self.queue.eof_address()
    }

    #[must_use]
    pub fn is_byte_aligned(&self) -> bool {
        self.bits_used == 0
    }

    /// Freeze the queue's EOF at this cursor's byte address.
    ///
    /// # Errors
    ///
    /// See [`Queue::freeze_eof`].
    pub fn freeze_eof(&mut self) -> Result<(), WireError> {
        self.queue.freeze_eof(self.pos.address)?;
        self.update_guaranteed_before_eob();
        Ok(())
    }

    /// Enter a framed region ending at `address`.
    ///
    /// # Errors
    ///
    /// [`WireError::PastEndOfBlock`] if `address` lies beyond the enclosing
    /// bound: an inner block may never outgrow its parent.
    pub fn push_eob(&mut self, address: BitAddress) -> Result<(), WireError> {
        let enclosing = self.eob_address();
        if address > enclosing {
            return Err(WireError::PastEndOfBlock {
                address,
                eob: enclosing,
            });
        }
        self.eob = BlockEob::nested(&self.eob, address);
        self.update_guaranteed_before_eob();
        Ok(())
    }

    /// Leave the innermost framed region.
    ///
    /// # Errors
    ///
    /// [`WireError::NoEnclosingBlock`] when already at the root bound.
    pub fn pop_eob(&mut self) -> Result<(), WireError> {
        let enclosing = self
            .eob
            .enclosing()
            .cloned()
            .ok_or(WireError::NoEnclosingBlock)?;
        self.eob = enclosing;
        self.update_guaranteed_before_eob();
        Ok(())
    }

    /// Recompute the cached safe span.
    pub fn update_guaranteed_before_eob(&mut self) {
        self.guaranteed_before_eob = match &self.pos.page {
            Some(page) if page.min_address() <= self.pos.address => {
                let limit = page.max_address().min(self.eob_address().byte());
                match self.direction {
                    Direction::Read => limit.min(self.queue.fill_address()),
                    Direction::Write => limit,
                }
            }
            _ => 0,
        };
    }

    /// Reposition at a byte boundary. Any partial bits are discarded.
    pub fn seek(&mut self, address: usize) {
        self.pos.address = address;
        self.cur_byte = 0;
        self.bits_used = 0;
        if !self.pos.holds(address) {
            self.pos.release();
        }
        self.update_guaranteed_before_eob();
    }

    /// Release this cursor's claim on its page. Sibling cursors on the same
    /// queue are unaffected; a later access re-fetches the page.
    pub fn close(&mut self) {
        self.pos.release();
        self.guaranteed_before_eob = 0;
    }

    /// Round a bit cursor up to the next byte boundary.
    ///
    /// Readers discard the unread bits of the current byte; writers store
    /// the partial byte padded with zero bits. No-op for byte cursors.
    ///
    /// # Errors
    ///
    /// Propagates store failures for write-side bit cursors.
    pub fn align_to_byte(&mut self) -> Result<(), WireError> {
        if self.bits_used == 0 {
            return Ok(());
        }
        if self.direction == Direction::Write {
            let byte = self.cur_byte;
            self.store(byte)?;
        }
        self.cur_byte = 0;
        self.bits_used = 0;
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            address: self.pos.address,
            cur_byte: self.cur_byte,
            bits_used: self.bits_used,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.pos.address = snapshot.address;
        self.cur_byte = snapshot.cur_byte;
        self.bits_used = snapshot.bits_used;
        self.update_guaranteed_before_eob();
    }

    fn require_bits(&self) -> Result<(), WireError> {
        if self.kind == StreamKind::Bit {
            Ok(())
        } else {
            Err(WireError::StreamKindMismatch {
                expected: StreamKind::Bit,
            })
        }
    }

    /// True when the block bound falls inside the byte at the cursor, so a
    /// whole-byte access would cross it.
    fn partial_eob_here(&self) -> bool {
        let eob = self.eob_address();
        self.kind == StreamKind::Bit && eob.byte() == self.pos.address && eob.bit() > 0
    }

    fn boundary_error(&self, at: BitAddress, eob: BitAddress) -> WireError {
        if self.eob.is_root() {
            match self.direction {
                Direction::Read => WireError::EndOfStream { address: at.byte() },
                Direction::Write => WireError::WriteAfterEof {
                    address: at.byte(),
                    eof: eob.byte(),
                },
            }
        } else {
            WireError::PastEndOfBlock { address: at, eob }
        }
    }

    /// Byte-level bound check for the slow path. A bit cursor may load the
    /// byte the bound falls inside; the per-bit check stops it there.
    fn check_bound(&self, address: usize) -> Result<(), WireError> {
        let eob = self.eob_address();
        if address < eob.byte() || self.partial_eob_here() {
            Ok(())
        } else {
            Err(self.boundary_error(BitAddress::from_byte(address), eob))
        }
    }

    fn check_bit_bound(&self) -> Result<(), WireError> {
        let here = self.bit_address();
        let eob = self.eob_address();
        if here < eob {
            Ok(())
        } else {
            Err(self.boundary_error(here, eob))
        }
    }

    fn fetch(&mut self) -> Result<u8, WireError> {
        let address = self.pos.address;
        if address < self.guaranteed_before_eob && !self.queue.is_broken() {
            if let Some(page) = &self.pos.page {
                let byte = page.get(address);
                self.pos.address = address + 1;
                return Ok(byte);
            }
        }
        self.fetch_slow()
    }

    fn fetch_slow(&mut self) -> Result<u8, WireError> {
        let address = self.pos.address;
        if self.queue.is_broken() {
            return Err(WireError::BrokenCursor { address });
        }
        self.check_bound(address)?;
        if self.pos.holds(address) {
            self.queue.check_readable(address)?;
        } else {
            self.pos.page = Some(self.queue.read_page(address)?);
        }
        self.update_guaranteed_before_eob();
        let page = self
            .pos
            .page
            .as_ref()
            .ok_or(WireError::BrokenCursor { address })?;
        let byte = page.get(address);
        self.pos.address = address + 1;
        Ok(byte)
    }

    fn store(&mut self, byte: u8) -> Result<(), WireError> {
        let address = self.pos.address;
        if address < self.guaranteed_before_eob && !self.queue.is_broken() {
            if let Some(page) = &self.pos.page {
                page.set(address, byte);
                self.pos.address = address + 1;
                self.queue.note_written(address + 1);
                return Ok(());
            }
        }
        self.store_slow(byte)
    }

    fn store_slow(&mut self, byte: u8) -> Result<(), WireError> {
        let address = self.pos.address;
        if self.queue.is_broken() {
            return Err(WireError::BrokenCursor { address });
        }
        self.check_bound(address)?;
        if !self.pos.holds(address) {
            self.pos.page = Some(self.queue.write_page(address)?);
        }
        self.update_guaranteed_before_eob();
        let page = self
            .pos
            .page
            .as_ref()
            .ok_or(WireError::BrokenCursor { address })?;
        page.set(address, byte);
        self.pos.address = address + 1;
        self.queue.note_written(address + 1);
        Ok(())
    }
}

/// Read-side cursor.
#[derive(Clone, Debug)]
pub struct ReadCursor(Cursor);

impl ReadCursor {
    /// Reader positioned at the first resident byte of `queue`.
    #[must_use]
    pub fn new(queue: Arc<Queue>, kind: StreamKind) -> Self {
        let start = queue.resident_start();
        Self::at(queue, kind, start)
    }

    #[must_use]
    pub fn at(queue: Arc<Queue>, kind: StreamKind, address: usize) -> Self {
        Self(Cursor::new(kind, Direction::Read, queue, address))
    }

    /// Reader over the same queue and block bounds as `cursor`, starting at
    /// `address`. Used to re-read bytes that were already written.
    #[must_use]
    pub fn over(cursor: &Cursor, address: usize) -> Self {
        let mut reader = Cursor::new(
            cursor.kind,
            Direction::Read,
            Arc::clone(&cursor.queue),
            address,
        );
        reader.eob = Arc::clone(&cursor.eob);
        Self(reader)
    }

    /// Committed bytes between the cursor and the fill address.
    #[must_use]
    pub fn available(&self) -> usize {
        self.queue.fill_address().saturating_sub(self.pos.address)
    }

    /// True when the cursor sits exactly on a frozen EOF.
    #[must_use]
    pub fn at_eof(&self) -> bool {
        self.bits_used == 0 && self.queue.eof_address() == Some(self.pos.address)
    }

    /// # Errors
    ///
    /// [`WireError::BrokenCursor`], [`WireError::PastEndOfBlock`],
    /// [`WireError::NotAvailable`], or [`WireError::EndOfStream`]. The
    /// cursor does not move on failure.
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_byte(&mut self) -> Result<u8, WireError> {
        if self.bits_used == 0 && !self.partial_eob_here() {
            self.0.fetch()
        } else {
            self.read_bits(8).map(|v| v as u8)
        }
    }

    /// # Errors
    ///
    /// As [`read_byte`](Self::read_byte), plus
    /// [`WireError::StreamKindMismatch`] on byte cursors.
    pub fn read_bit(&mut self) -> Result<bool, WireError> {
        self.require_bits()?;
        self.check_bit_bound()?;
        if self.bits_used == 0 {
            self.cur_byte = self.0.fetch()?;
        }
        let bit = (self.cur_byte >> (7 - self.bits_used)) & 1;
        self.bits_used = (self.bits_used + 1) % 8;
        Ok(bit == 1)
    }

    /// Read `count` bits (at most 64), most significant first. All or
    /// nothing: on failure the cursor is left where it started.
    ///
    /// # Errors
    ///
    /// As [`read_bit`](Self::read_bit).
    pub fn read_bits(&mut self, count: u32) -> Result<u64, WireError> {
        let saved = self.snapshot();
        let mut value = 0u64;
        for _ in 0..count.min(64) {
            match self.read_bit() {
                Ok(bit) => value = (value << 1) | u64::from(bit),
                Err(e) => {
                    self.restore(saved);
                    return Err(e);
                }
            }
        }
        Ok(value)
    }
}

impl Deref for ReadCursor {
    type Target = Cursor;

    fn deref(&self) -> &Cursor {
        &self.0
    }
}

impl DerefMut for ReadCursor {
    fn deref_mut(&mut self) -> &mut Cursor {
        &mut self.0
    }
}

/// Write-side cursor.
#[derive(Clone, Debug)]
pub struct WriteCursor(Cursor);

impl WriteCursor {
    /// Writer positioned at the fill address of `queue`.
    #[must_use]
    pub fn new(queue: Arc<Queue>, kind: StreamKind) -> Self {
        let start = queue.fill_address();
        Self::at(queue, kind, start)
    }

    #[must_use]
    pub fn at(queue: Arc<Queue>, kind: StreamKind, address: usize) -> Self {
        Self(Cursor::new(kind, Direction::Write, queue, address))
    }

    /// # Errors
    ///
    /// [`WireError::BrokenCursor`], [`WireError::PastEndOfBlock`], or
    /// [`WireError::WriteAfterEof`]. The cursor does not move on failure.
    pub fn write_byte(&mut self, byte: u8) -> Result<(), WireError> {
        if self.bits_used == 0 && !self.partial_eob_here() {
            self.0.store(byte)
        } else {
            self.write_bits(u64::from(byte), 8)
        }
    }

    /// # Errors
    ///
    /// As [`write_byte`](Self::write_byte).
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), WireError> {
        bytes.iter().try_for_each(|&b| self.write_byte(b))
    }

    /// # Errors
    ///
    /// As [`write_byte`](Self::write_byte), plus
    /// [`WireError::StreamKindMismatch`] on byte cursors.
    pub fn write_bit(&mut self, bit: bool) -> Result<(), WireError> {
        self.require_bits()?;
        self.check_bit_bound()?;
        let byte = self.cur_byte | (u8::from(bit) << (7 - self.bits_used));
        if self.bits_used == 7 {
            self.0.store(byte)?;
            self.cur_byte = 0;
            self.bits_used = 0;
        } else {
            self.cur_byte = byte;
            self.bits_used += 1;
        }
        Ok(())
    }

    /// Write the low `count` bits of `value` (at most 64), most significant
    /// first. All or nothing, like [`ReadCursor::read_bits`]: bytes stored
    /// before a failure are dropped from the queue again.
    ///
    /// # Errors
    ///
    /// As [`write_bit`](Self::write_bit).
    pub fn write_bits(&mut self, value: u64, count: u32) -> Result<(), WireError> {
        let saved = self.snapshot();
        let fill = self.queue.fill_address();
        for shift in (0..count.min(64)).rev() {
            if let Err(e) = self.write_bit((value >> shift) & 1 == 1) {
                self.restore(saved);
                if self.queue.fill_address() > fill {
                    self.queue.truncate(fill)?;
                }
                return Err(e);
            }
        }
        Ok(())
    }
}

impl Deref for WriteCursor {
    type Target = Cursor;

    fn deref(&self) -> &Cursor {
        &self.0
    }
}

impl DerefMut for WriteCursor {
    fn deref_mut(&mut self) -> &mut Cursor {
        &mut self.0
    }
}
