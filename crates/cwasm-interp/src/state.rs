use std::fmt;

use cwasm_format::ValueKind;

use crate::error::InterpError;

/// Why a running decompressor returned to its caller without finishing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Suspension {
    /// All supplied input is consumed and the input is not closed.
    NeedInput,
    /// Too much undrained output is buffered.
    NeedOutputSpace,
    /// Another `output_chunk_size` bytes became drainable.
    OutputReady,
}

/// Lifecycle of a decompressor.
///
/// ```text
///   Created ──▶ Running ──▶ Suspended(NeedInput | NeedOutputSpace | OutputReady)
///                  ▲  │              │
///                  └──┼──────────────┘  (resume)
///                     ├──▶ Finished
///                     └──▶ Failed(reason)
/// ```
///
/// `Finished` and `Failed` are terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DriverState {
    Created,
    Running,
    Suspended(Suspension),
    Finished,
    Failed(InterpError),
}

impl DriverState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Suspended(Suspension::NeedInput) => "waiting for input",
            Self::Suspended(Suspension::NeedOutputSpace) => "waiting for output space",
            Self::Suspended(Suspension::OutputReady) => "holding output",
            Self::Finished => "finished",
            Self::Failed(_) => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed(_))
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one `resume()` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResumeOutcome {
    ProducedOutput,
    NeedInput,
    NeedOutputSpace,
    Finished,
    Failed(InterpError),
}

impl From<Suspension> for ResumeOutcome {
    fn from(s: Suspension) -> Self {
        match s {
            Suspension::NeedInput => Self::NeedInput,
            Suspension::NeedOutputSpace => Self::NeedOutputSpace,
            Suspension::OutputReady => Self::ProducedOutput,
        }
    }
}

/// One value transcoded by the driver, with the input address it was
/// read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedValue {
    pub kind: ValueKind,
    pub value: u64,
    pub address: usize,
}

impl DecodedValue {
    /// The value reinterpreted as signed. Meaningful for signed kinds,
    /// whose values are stored sign-extended.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn as_signed(&self) -> i64 {
        self.value as i64
    }
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.is_signed() {
            write!(f, "{:>8}  {:<16} {}", self.address, self.kind, self.as_signed())
        } else {
            write!(f, "{:>8}  {:<16} {}", self.address, self.kind, self.value)
        }
    }
}
