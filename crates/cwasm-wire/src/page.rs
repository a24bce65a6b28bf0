use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Default page capacity in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// A fixed-capacity block of stream bytes covering `[min_address, max_address)`.
///
/// Pages are the unit of growth and eviction for a [`Queue`](crate::Queue).
/// Once allocated a page never moves, so a cursor holding an `Arc<Page>` can
/// keep touching its bytes without going back to the queue.
///
/// Storage is `AtomicU8` with relaxed ordering. The stream is driven by one
/// caller at a time; the atomics only make pages `Sync` so a suspended
/// driver can be resumed from another thread.
pub struct Page {
    index: usize,
    min_address: usize,
    data: Box<[AtomicU8]>,
}

impl Page {
    pub(crate) fn new(index: usize, capacity: usize) -> Self {
        Self {
            index,
            min_address: index * capacity,
            data: (0..capacity).map(|_| AtomicU8::new(0)).collect(),
        }
    }

    /// Position of this page in its queue (page `i` starts at `i * capacity`).
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn min_address(&self) -> usize {
        self.min_address
    }

    /// One past the last address this page covers.
    #[must_use]
    pub fn max_address(&self) -> usize {
        self.min_address + self.data.len()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn contains(&self, address: usize) -> bool {
        address >= self.min_address && address < self.max_address()
    }

    /// # Panics
    ///
    /// Panics if `address` is outside this page.
    #[must_use]
    pub fn get(&self, address: usize) -> u8 {
        self.data[address - self.min_address].load(Ordering::Relaxed)
    }

    /// # Panics
    ///
    /// Panics if `address` is outside this page.
    pub fn set(&self, address: usize, byte: u8) {
        self.data[address - self.min_address].store(byte, Ordering::Relaxed);
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("index", &self.index)
            .field("min_address", &self.min_address)
            .field("max_address", &self.max_address())
            .finish_non_exhaustive()
    }
}
