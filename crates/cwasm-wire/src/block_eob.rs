use std::sync::Arc;

use crate::address::BitAddress;
use crate::queue::Queue;

/// End-of-block bound shared by the cursors working inside one framed region.
///
/// Bounds form an immutable chain: entering a block links a tighter bound
/// in front of the current one, leaving returns to the enclosing link. The
/// chain always ends in a root bound that stands for the queue's EOF, so a
/// cursor outside every block is bounded by the stream itself.
///
/// ```text
///   cursor.eob ──▶ [block @ 40] ──▶ [block @ 96] ──▶ [root = queue EOF]
/// ```
#[derive(Debug)]
pub struct BlockEob {
    address: Option<BitAddress>,
    enclosing: Option<Arc<BlockEob>>,
    depth: usize,
}

impl BlockEob {
    /// The outermost bound: the owning queue's EOF.
    #[must_use]
    pub fn root() -> Arc<Self> {
        Arc::new(Self {
            address: None,
            enclosing: None,
            depth: 0,
        })
    }

    /// A bound at `address` nested inside `enclosing`.
    #[must_use]
    pub fn nested(enclosing: &Arc<Self>, address: BitAddress) -> Arc<Self> {
        Arc::new(Self {
            address: Some(address),
            enclosing: Some(Arc::clone(enclosing)),
            depth: enclosing.depth + 1,
        })
    }

    /// The explicit bound, or `None` for the root (queue EOF) bound.
    #[must_use]
    pub fn address(&self) -> Option<BitAddress> {
        self.address
    }

    #[must_use]
    pub fn enclosing(&self) -> Option<&Arc<BlockEob>> {
        self.enclosing.as_ref()
    }

    /// Number of framed blocks between this bound and the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.enclosing.is_none()
    }

    /// Concrete bound against `queue`. The root resolves to the frozen EOF,
    /// or to [`BitAddress::MAX`] while the EOF is still open.
    #[must_use]
    pub fn resolve(&self, queue: &Queue) -> BitAddress {
        self.address.unwrap_or_else(|| {
            queue
                .eof_address()
                .map_or(BitAddress::MAX, BitAddress::from_byte)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_follows_queue_eof() {
        let queue = Queue::with_page_size(8);
        let root = BlockEob::root();
        assert_eq!(root.resolve(&queue), BitAddress::MAX);
        queue.freeze_eof(0).unwrap();
        assert_eq!(root.resolve(&queue), BitAddress::from_byte(0));
    }

    #[test]
    fn nesting_tracks_depth_and_enclosing() {
        let queue = Queue::with_page_size(8);
        let root = BlockEob::root();
        let outer = BlockEob::nested(&root, BitAddress::from_byte(100));
        let inner = BlockEob::nested(&outer, BitAddress::from_byte(40));
        assert_eq!(inner.depth(), 2);
        assert_eq!(inner.resolve(&queue), BitAddress::from_byte(40));
        let back = inner.enclosing().unwrap();
        assert_eq!(back.resolve(&queue), BitAddress::from_byte(100));
        assert!(back.enclosing().unwrap().is_root());
    }
}
