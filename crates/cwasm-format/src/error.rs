use crate::node::NodeId;
use crate::value_kind::ValueKind;

/// Errors raised while assembling a [`Format`](crate::Format).
///
/// A finished format is always well formed, so these only surface from
/// [`FormatBuilder::finish`](crate::FormatBuilder::finish).
///
/// ```text
/// ┌──────────────────┬──────────────────────────────────────────────┐
/// │ Variant          │ Cause                                        │
/// ├──────────────────┼──────────────────────────────────────────────┤
/// │ EmptyFormat      │ no nodes were added                          │
/// │ UnknownNode      │ root or child id outside the arena           │
/// │ ForwardReference │ child id not strictly below its parent's id  │
/// │ InvalidLoopCount │ loop count uses a signed value kind          │
/// └──────────────────┴──────────────────────────────────────────────┘
/// ```
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("format has no nodes")]
    EmptyFormat,

    #[error("node {id} does not exist")]
    UnknownNode { id: NodeId },

    /// Children must be added before their parent. This keeps every
    /// format acyclic without a separate cycle check.
    #[error("node {node} refers forward to {child}")]
    ForwardReference { node: NodeId, child: NodeId },

    #[error("loop count must be unsigned, got {kind}")]
    InvalidLoopCount { kind: ValueKind },
}
