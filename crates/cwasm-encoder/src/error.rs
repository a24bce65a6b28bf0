use cwasm_format::{NodeKind, ValueKind};
use cwasm_wire::WireError;

/// Errors that can occur while writing values and blocks to an output
/// stream.
///
/// Error hierarchy:
///
/// ```text
///   EncodeError
///   ├── UnsupportedFormat ← node kind has no write primitive
///   ├── ValueOutOfRange   ← value does not fit the node's width
///   ├── BlockTooLarge     ← body size does not fit the reserved header
///   └── Wire(WireError)   ← from the cursor layer
/// ```
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("unsupported format: no write primitive for {kind}")]
    UnsupportedFormat { kind: NodeKind },

    #[error("value {value:#x} does not fit {kind}")]
    ValueOutOfRange { kind: ValueKind, value: u64 },

    #[error("block body exceeds maximum size ({size} bytes, limit {limit})")]
    BlockTooLarge { size: usize, limit: u64 },

    #[error(transparent)]
    Wire(#[from] WireError),
}
