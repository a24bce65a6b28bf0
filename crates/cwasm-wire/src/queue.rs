use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use bytes::Bytes;
use tracing::trace;

use crate::error::WireError;
use crate::page::{DEFAULT_PAGE_SIZE, Page};

/// One logical byte stream, stored as an ordered run of [`Page`]s.
///
/// The queue never moves bytes once written: growth appends a page, and
/// eviction drops pages from the front. Page `i` always covers
/// `[i * page_size, (i + 1) * page_size)`, so lookup by address is a
/// division rather than a search.
///
/// ```text
///   evicted        resident pages                   not yet allocated
///  ┌───────┐  ┌────────┬────────┬────────┐
///  │ 0..4k │  │ 4k..8k │ 8k..12k│12k..16k│  ...
///  └───────┘  └────────┴────────┴────────┘
///             ^ resident_start    ^ fill     (^ eof, once frozen)
/// ```
///
/// A queue is shared through `Arc` by every cursor positioned on it. Only
/// the page list sits behind a mutex, and cursors take it only when they
/// cross a page boundary; the fill address, EOF, and broken flag are
/// lock-free.
pub struct Queue {
    page_size: usize,
    pages: Mutex<PageList>,
    fill: AtomicUsize,
    eof: OnceLock<usize>,
    broken: AtomicBool,
}

#[derive(Default)]
struct PageList {
    pages: VecDeque<Arc<Page>>,
    /// Index of `pages.front()`; every lower index has been evicted.
    first_index: usize,
}

impl PageList {
    fn get(&self, index: usize) -> Option<&Arc<Page>> {
        index
            .checked_sub(self.first_index)
            .and_then(|i| self.pages.get(i))
    }

    fn end_index(&self) -> usize {
        self.first_index + self.pages.len()
    }
}

impl Queue {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create a queue whose pages hold `page_size` bytes (minimum 1).
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Arc<Self> {
        Arc::new(Self {
            page_size: page_size.max(1),
            pages: Mutex::new(PageList::default()),
            fill: AtomicUsize::new(0),
            eof: OnceLock::new(),
            broken: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// One past the highest committed byte.
    #[must_use]
    pub fn fill_address(&self) -> usize {
        self.fill.load(Ordering::Acquire)
    }

    /// Lowest address still backed by a resident page.
    #[must_use]
    pub fn resident_start(&self) -> usize {
        self.lock().first_index * self.page_size
    }

    /// Bytes resident between the first kept page and the fill address.
    ///
    /// This counts bytes a reader has already passed but whose page is
    /// still held. The unread span of a particular reader is
    /// [`ReadCursor::available`](crate::ReadCursor::available).
    #[must_use]
    pub fn fill_size(&self) -> usize {
        self.fill_address().saturating_sub(self.resident_start())
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.lock().pages.len()
    }

    #[must_use]
    pub fn eof_address(&self) -> Option<usize> {
        self.eof.get().copied()
    }

    #[must_use]
    pub fn is_eof_frozen(&self) -> bool {
        self.eof.get().is_some()
    }

    /// Fix the end of the stream at `address`.
    ///
    /// Freezing twice at the same address is a no-op.
    ///
    /// # Errors
    ///
    /// - [`WireError::EofBeforeFill`] if bytes were already committed past
    ///   `address`.
    /// - [`WireError::EofAlreadyFrozen`] if EOF was frozen elsewhere.
    pub fn freeze_eof(&self, address: usize) -> Result<(), WireError> {
        let fill = self.fill_address();
        if address < fill {
            return Err(WireError::EofBeforeFill {
                requested: address,
                fill,
            });
        }
        let frozen = *self.eof.get_or_init(|| address);
        if frozen == address {
            trace!(eof = address, "froze eof");
            Ok(())
        } else {
            Err(WireError::EofAlreadyFrozen {
                frozen,
                requested: address,
            })
        }
    }

    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    /// Invalidate the queue. Every cursor on it fails with
    /// [`WireError::BrokenCursor`] from its next access on.
    pub fn mark_broken(&self) {
        self.broken.store(true, Ordering::Release);
    }

    /// Check that the byte at `address` can be read right now.
    ///
    /// # Errors
    ///
    /// - [`WireError::BrokenCursor`] if the queue was invalidated.
    /// - [`WireError::EndOfStream`] if `address` is at or past fill and EOF
    ///   is frozen.
    /// - [`WireError::NotAvailable`] if `address` is at or past fill and
    ///   more bytes may still arrive.
    pub fn check_readable(&self, address: usize) -> Result<(), WireError> {
        if self.is_broken() {
            return Err(WireError::BrokenCursor { address });
        }
        if address < self.fill_address() {
            Ok(())
        } else if self.is_eof_frozen() {
            Err(WireError::EndOfStream { address })
        } else {
            Err(WireError::NotAvailable { address })
        }
    }

    /// Page covering `address` for reading.
    ///
    /// # Errors
    ///
    /// See [`check_readable`](Self::check_readable); additionally
    /// [`WireError::BrokenCursor`] if the page was already evicted.
    pub fn read_page(&self, address: usize) -> Result<Arc<Page>, WireError> {
        self.check_readable(address)?;
        self.lock()
            .get(address / self.page_size)
            .cloned()
            .ok_or(WireError::BrokenCursor { address })
    }

    /// Page covering `address` for writing, allocating pages up to it.
    ///
    /// # Errors
    ///
    /// - [`WireError::BrokenCursor`] if the queue was invalidated or the
    ///   page was already evicted.
    /// - [`WireError::WriteAfterEof`] if `address` is past a frozen EOF.
    pub fn write_page(&self, address: usize) -> Result<Arc<Page>, WireError> {
        if self.is_broken() {
            return Err(WireError::BrokenCursor { address });
        }
        if let Some(eof) = self.eof_address() {
            if address >= eof {
                return Err(WireError::WriteAfterEof { address, eof });
            }
        }
        let index = address / self.page_size;
        let mut pages = self.lock();
        if index < pages.first_index {
            return Err(WireError::BrokenCursor { address });
        }
        while pages.end_index() <= index {
            let next = pages.end_index();
            trace!(page = next, page_size = self.page_size, "allocated page");
            pages.pages.push_back(Arc::new(Page::new(next, self.page_size)));
        }
        pages
            .get(index)
            .cloned()
            .ok_or(WireError::BrokenCursor { address })
    }

    /// Commit `bytes` at the fill address and return the new fill address.
    ///
    /// # Errors
    ///
    /// [`WireError::WriteAfterEof`] once EOF is frozen, or
    /// [`WireError::BrokenCursor`] if the queue was invalidated.
    pub fn append(&self, bytes: &[u8]) -> Result<usize, WireError> {
        let mut address = self.fill_address();
        let mut rest = bytes;
        while !rest.is_empty() {
            let page = self.write_page(address)?;
            let n = rest.len().min(page.max_address() - address);
            for (offset, &byte) in rest[..n].iter().enumerate() {
                page.set(address + offset, byte);
            }
            address += n;
            rest = &rest[n..];
        }
        self.fill.store(address, Ordering::Release);
        Ok(address)
    }

    /// Record that a write cursor committed bytes up to `end`.
    pub(crate) fn note_written(&self, end: usize) {
        self.fill.fetch_max(end, Ordering::AcqRel);
    }

    /// Lower the fill address to `address`, dropping bytes written past it.
    ///
    /// # Errors
    ///
    /// [`WireError::BrokenCursor`] if `address` is below the resident pages.
    pub fn truncate(&self, address: usize) -> Result<(), WireError> {
        if address < self.resident_start() {
            return Err(WireError::BrokenCursor { address });
        }
        self.fill.fetch_min(address, Ordering::AcqRel);
        Ok(())
    }

    /// Release leading pages that end at or before `address` and that no
    /// cursor still holds. Returns the number of pages released.
    pub fn evict_before(&self, address: usize) -> usize {
        let mut pages = self.lock();
        let mut released = 0;
        while let Some(front) = pages.pages.front() {
            if front.max_address() > address || Arc::strong_count(front) > 1 {
                break;
            }
            pages.pages.pop_front();
            pages.first_index += 1;
            released += 1;
        }
        if released > 0 {
            trace!(released, below = address, "evicted pages");
        }
        released
    }

    /// Copy `len` committed bytes starting at `start`.
    ///
    /// # Errors
    ///
    /// - [`WireError::NotAvailable`] if the range extends past fill.
    /// - [`WireError::BrokenCursor`] if part of the range was evicted.
    pub fn copy_out(&self, start: usize, len: usize) -> Result<Bytes, WireError> {
        if self.is_broken() {
            return Err(WireError::BrokenCursor { address: start });
        }
        let end = start + len;
        let fill = self.fill_address();
        if end > fill {
            return Err(WireError::NotAvailable { address: fill });
        }
        let pages = self.lock();
        let mut out = Vec::with_capacity(len);
        let mut address = start;
        while address < end {
            let page = pages
                .get(address / self.page_size)
                .ok_or(WireError::BrokenCursor { address })?;
            let stop = end.min(page.max_address());
            out.extend((address..stop).map(|a| page.get(a)));
            address = stop;
        }
        Ok(Bytes::from(out))
    }

    fn lock(&self) -> MutexGuard<'_, PageList> {
        self.pages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("page_size", &self.page_size)
            .field("fill", &self.fill_address())
            .field("eof", &self.eof_address())
            .field("broken", &self.is_broken())
            .finish_non_exhaustive()
    }
}
