use cwasm_decoder::DecodeError;
use cwasm_encoder::EncodeError;
use cwasm_format::{ActionId, FormatError, NodeId, NodeKind, ValueKind};
use cwasm_wire::{BitAddress, WireError};

/// Why a decompressor stopped for good.
///
/// Suspensions are not errors: `NeedInput`, `NeedOutputSpace`, and
/// `ProducedOutput` are [`ResumeOutcome`](crate::ResumeOutcome) variants.
/// Everything here is terminal, and the driver keeps a copy in its
/// `Failed` state, which is why the type is `Clone`.
///
/// ```text
/// ┌───────────────────┬─────────────────────────────────────────────────┐
/// │ Variant           │ Cause                                           │
/// ├───────────────────┼─────────────────────────────────────────────────┤
/// │ BrokenCursor      │ queue invalidated under a live cursor           │
/// │ PastEndOfBlock    │ value would cross a framed block boundary       │
/// │ UnsupportedFormat │ node kind with no codec primitive               │
/// │ DisposedHandle    │ call on a destroyed handle                      │
/// │ MalformedEncoding │ LEB128 too long or overflowing its width        │
/// │ UnexpectedEof     │ input closed in the middle of the tree          │
/// │ TrailingData      │ input left over after the root node             │
/// │ BlockUnderrun     │ block body not consumed exactly                 │
/// │ BlockTooLarge     │ output block outgrew its reserved header        │
/// │ ValueOutOfRange   │ value does not fit its output kind              │
/// │ ActionFailed      │ action hook returned false                      │
/// │ EmptyLoopBody     │ loop iteration consumed no input                │
/// │ NestingTooDeep    │ frame stack exceeded max_nesting                │
/// │ InvalidState      │ lifecycle call not allowed in the current state │
/// │ InvalidFormat     │ tree refers to a node that does not exist       │
/// │ Wire              │ any other cursor-level failure                  │
/// └───────────────────┴─────────────────────────────────────────────────┘
/// ```
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InterpError {
    #[error("broken cursor at address {address}")]
    BrokenCursor { address: usize },

    #[error("access at {address} is past end of block {eob}")]
    PastEndOfBlock { address: BitAddress, eob: BitAddress },

    #[error("unsupported format: {kind}")]
    UnsupportedFormat { kind: NodeKind },

    #[error("handle was already destroyed")]
    DisposedHandle,

    #[error("malformed encoding: {0}")]
    MalformedEncoding(WireError),

    #[error("input ended unexpectedly at {address}")]
    UnexpectedEof { address: usize },

    #[error("unexpected data after the root node ({extra_bytes} bytes)")]
    TrailingData { extra_bytes: usize },

    #[error("block ends at {expected} but reading stopped at {actual}")]
    BlockUnderrun {
        expected: BitAddress,
        actual: BitAddress,
    },

    #[error("block body exceeds maximum size ({size} bytes, limit {limit})")]
    BlockTooLarge { size: usize, limit: u64 },

    #[error("value {value:#x} does not fit {kind}")]
    ValueOutOfRange { kind: ValueKind, value: u64 },

    #[error("{action} failed")]
    ActionFailed { action: ActionId },

    #[error("loop body {node} consumed no input")]
    EmptyLoopBody { node: NodeId },

    #[error("nesting exceeds {limit} frames")]
    NestingTooDeep { limit: usize },

    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("invalid format: {0}")]
    InvalidFormat(#[from] FormatError),

    #[error(transparent)]
    Wire(WireError),
}

impl From<WireError> for InterpError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::BrokenCursor { address } => Self::BrokenCursor { address },
            WireError::PastEndOfBlock { address, eob } => Self::PastEndOfBlock { address, eob },
            WireError::VarintTooLong { .. } | WireError::VarintOverflow { .. } => {
                Self::MalformedEncoding(e)
            }
            WireError::EndOfStream { address } => Self::UnexpectedEof { address },
            WireError::UnexpectedEof { offset } => Self::UnexpectedEof { address: offset },
            other => Self::Wire(other),
        }
    }
}

impl From<DecodeError> for InterpError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::UnsupportedFormat { kind } => Self::UnsupportedFormat { kind },
            DecodeError::BlockUnderrun { expected, actual } => {
                Self::BlockUnderrun { expected, actual }
            }
            DecodeError::Wire(e) => e.into(),
        }
    }
}

impl From<EncodeError> for InterpError {
    fn from(e: EncodeError) -> Self {
        match e {
            EncodeError::UnsupportedFormat { kind } => Self::UnsupportedFormat { kind },
            EncodeError::ValueOutOfRange { kind, value } => Self::ValueOutOfRange { kind, value },
            EncodeError::BlockTooLarge { size, limit } => Self::BlockTooLarge { size, limit },
            EncodeError::Wire(e) => e.into(),
        }
    }
}

/// Errors from the async adapter: a terminal driver failure or an I/O
/// error from the reader or writer.
#[derive(Debug, thiserror::Error)]
pub enum StreamingError {
    #[error(transparent)]
    Interp(#[from] InterpError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
