use cwasm_format::NodeKind;
use cwasm_wire::{BitAddress, WireError};

/// Errors that can occur while reading values and blocks from an input
/// stream.
///
/// Error hierarchy:
///
/// ```text
///   DecodeError
///   ├── UnsupportedFormat ← node kind has no read primitive
///   ├── BlockUnderrun     ← block left before its body was consumed
///   └── Wire(WireError)   ← from the cursor and LEB128 layers
///                           (NotAvailable here means "suspend")
/// ```
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unsupported format: no read primitive for {kind}")]
    UnsupportedFormat { kind: NodeKind },

    /// The body of a framed block was not consumed exactly.
    #[error("block ends at {expected} but reading stopped at {actual}")]
    BlockUnderrun {
        expected: BitAddress,
        actual: BitAddress,
    },

    #[error(transparent)]
    Wire(#[from] WireError),
}

impl DecodeError {
    /// True when the read only ran out of supplied input.
    #[must_use]
    pub fn is_suspension(&self) -> bool {
        matches!(self, Self::Wire(e) if e.is_suspension())
    }
}
