use crate::address::{BitAddress, StreamKind};

/// Errors raised by the paged stream layer and the LEB128 core.
///
/// One variant is not a failure at all: [`WireError::NotAvailable`] means
/// the byte exists in the stream's future but has not been supplied yet.
/// Callers that can suspend check [`WireError::is_suspension`] before
/// treating an error as fatal.
///
/// ```text
/// ┌──────────────────┬─────────────────────────────────────────────────┐
/// │ Variant          │ Cause                                           │
/// ├──────────────────┼─────────────────────────────────────────────────┤
/// │ VarintTooLong    │ LEB128 kept its continuation bit past ceil(W/7) │
/// │ VarintOverflow   │ final LEB128 chunk carries bits beyond width W  │
/// │ UnexpectedEof    │ slice ended mid-value (slice helpers only)      │
/// │ BrokenCursor     │ queue invalidated or page already evicted       │
/// │ PastEndOfBlock   │ access would cross the current block bound      │
/// │ NotAvailable     │ byte beyond fill, EOF not yet frozen (suspend)  │
/// │ EndOfStream      │ read beyond a frozen EOF                        │
/// │ WriteAfterEof    │ write beyond a frozen EOF                       │
/// │ EofAlreadyFrozen │ EOF re-frozen at a different address            │
/// │ EofBeforeFill    │ EOF frozen below bytes already committed        │
/// │ NoEnclosingBlock │ pop of the outermost (EOF) bound                │
/// │ StreamKind…      │ bit operation on a byte cursor                  │
/// └──────────────────┴─────────────────────────────────────────────────┘
/// ```
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// LEB128 value did not terminate within its maximum chunk count.
    #[error("varint too long: exceeded {max_chunks}-byte limit")]
    VarintTooLong { max_chunks: u32 },

    /// The terminating chunk set bits that do not fit the target width.
    #[error("varint overflows {bits}-bit target")]
    VarintOverflow { bits: u32 },

    /// Input slice ended before a complete value could be read.
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: usize },

    /// The backing queue was invalidated, or the page holding `address`
    /// was already released.
    #[error("broken cursor at address {address}")]
    BrokenCursor { address: usize },

    /// The access at `address` would cross the end-of-block bound `eob`.
    #[error("access at {address} is past end of block {eob}")]
    PastEndOfBlock { address: BitAddress, eob: BitAddress },

    /// The byte at `address` has not been supplied yet.
    #[error("byte {address} not yet available")]
    NotAvailable { address: usize },

    /// Read beyond a frozen EOF.
    #[error("end of stream at {address}")]
    EndOfStream { address: usize },

    /// Write beyond a frozen EOF.
    #[error("write at {address} beyond frozen eof {eof}")]
    WriteAfterEof { address: usize, eof: usize },

    #[error("eof already frozen at {frozen}, cannot move it to {requested}")]
    EofAlreadyFrozen { frozen: usize, requested: usize },

    #[error("cannot freeze eof at {requested}: {fill} bytes already committed")]
    EofBeforeFill { requested: usize, fill: usize },

    #[error("no enclosing block to return to")]
    NoEnclosingBlock,

    #[error("operation requires a {expected:?} cursor")]
    StreamKindMismatch { expected: StreamKind },
}

impl WireError {
    /// True when the error only means "come back with more input".
    #[must_use]
    pub fn is_suspension(&self) -> bool {
        matches!(self, Self::NotAvailable { .. })
    }

    /// True for the two ways a LEB128 sequence can be malformed.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::VarintTooLong { .. } | Self::VarintOverflow { .. })
    }
}
