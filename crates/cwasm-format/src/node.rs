use std::fmt;
use std::slice;

use crate::value_kind::ValueKind;

/// Index of a node inside its [`Format`](crate::Format) arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier passed to the host's action hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ActionId(pub u32);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action {}", self.0)
    }
}

/// Node discriminant with its one-byte opcode.
///
/// Opcodes a producer emits but this version does not know are kept as
/// `Unknown(op)` so a tree can still be built and inspected; interpreting
/// such a node fails with an unsupported-format error.
///
/// ```text
/// ┌───────────┬────────────┬──────────────────────────────────┐
/// │ Opcode    │ Variant    │ Meaning                          │
/// ├───────────┼────────────┼──────────────────────────────────┤
/// │ 0x10-0x18 │ Value(k)   │ one integer of kind k            │
/// │ 0x20      │ Action     │ host callback                    │
/// │ 0x30      │ Sequence   │ children in order                │
/// │ 0x31      │ Loop       │ count value, then body n times   │
/// │ 0x32      │ Block      │ size-prefixed framed body        │
/// │ 0x33      │ UntilEof   │ body repeated until input ends   │
/// └───────────┴────────────┴──────────────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Value(ValueKind),
    Action,
    Sequence,
    Loop,
    Block,
    UntilEof,
    Unknown(u8),
}

impl NodeKind {
    #[must_use]
    pub fn opcode(self) -> u8 {
        match self {
            Self::Value(kind) => match kind {
                ValueKind::Uint8 => 0x10,
                ValueKind::Uint32 => 0x11,
                ValueKind::Uint64 => 0x12,
                ValueKind::Varint32 => 0x13,
                ValueKind::Varint64 => 0x14,
                ValueKind::Varuint32 => 0x15,
                ValueKind::Varuint64 => 0x16,
                ValueKind::FixedVaruint32 => 0x17,
                ValueKind::FixedVaruint64 => 0x18,
            },
            Self::Action => 0x20,
            Self::Sequence => 0x30,
            Self::Loop => 0x31,
            Self::Block => 0x32,
            Self::UntilEof => 0x33,
            Self::Unknown(op) => op,
        }
    }

    #[must_use]
    pub fn from_opcode(op: u8) -> Self {
        match op {
            0x10 => Self::Value(ValueKind::Uint8),
            0x11 => Self::Value(ValueKind::Uint32),
            0x12 => Self::Value(ValueKind::Uint64),
            0x13 => Self::Value(ValueKind::Varint32),
            0x14 => Self::Value(ValueKind::Varint64),
            0x15 => Self::Value(ValueKind::Varuint32),
            0x16 => Self::Value(ValueKind::Varuint64),
            0x17 => Self::Value(ValueKind::FixedVaruint32),
            0x18 => Self::Value(ValueKind::FixedVaruint64),
            0x20 => Self::Action,
            0x30 => Self::Sequence,
            0x31 => Self::Loop,
            0x32 => Self::Block,
            0x33 => Self::UntilEof,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(kind) => write!(f, "{kind}"),
            Self::Action => f.write_str("action"),
            Self::Sequence => f.write_str("sequence"),
            Self::Loop => f.write_str("loop"),
            Self::Block => f.write_str("block"),
            Self::UntilEof => f.write_str("until_eof"),
            Self::Unknown(op) => write!(f, "opaque({op:#04x})"),
        }
    }
}

/// One node of a format-description tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Value(ValueKind),
    Action(ActionId),
    Sequence(Vec<NodeId>),
    Loop { count: ValueKind, body: NodeId },
    Block(NodeId),
    UntilEof(NodeId),
    /// A node whose kind was not recognized when the tree was produced.
    Opaque(u8),
}

impl Node {
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Value(kind) => NodeKind::Value(*kind),
            Self::Action(_) => NodeKind::Action,
            Self::Sequence(_) => NodeKind::Sequence,
            Self::Loop { .. } => NodeKind::Loop,
            Self::Block(_) => NodeKind::Block,
            Self::UntilEof(_) => NodeKind::UntilEof,
            Self::Opaque(op) => NodeKind::Unknown(*op),
        }
    }

    #[must_use]
    pub fn value_kind(&self) -> Option<ValueKind> {
        match self {
            Self::Value(kind) => Some(*kind),
            _ => None,
        }
    }

    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        match self {
            Self::Sequence(children) => children,
            Self::Loop { body, .. } | Self::Block(body) | Self::UntilEof(body) => {
                slice::from_ref(body)
            }
            Self::Value(_) | Self::Action(_) | Self::Opaque(_) => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_known_opcodes_roundtrip() {
        let kinds = ValueKind::ALL
            .into_iter()
            .map(NodeKind::Value)
            .chain([
                NodeKind::Action,
                NodeKind::Sequence,
                NodeKind::Loop,
                NodeKind::Block,
                NodeKind::UntilEof,
            ]);
        for kind in kinds {
            assert_eq!(
                NodeKind::from_opcode(kind.opcode()),
                kind,
                "opcode mismatch for {kind:?}"
            );
        }
    }

    #[test]
    fn unknown_opcode_preserved() {
        let kind = NodeKind::from_opcode(0x7E);
        assert_eq!(kind, NodeKind::Unknown(0x7E));
        assert_eq!(kind.opcode(), 0x7E);
        assert_eq!(Node::Opaque(0x7E).kind(), kind);
    }

    #[test]
    fn children_of_each_shape() {
        let seq = Node::Sequence(vec![NodeId(0), NodeId(1)]);
        assert_eq!(seq.children(), &[NodeId(0), NodeId(1)]);
        let lp = Node::Loop {
            count: ValueKind::Varuint32,
            body: NodeId(4),
        };
        assert_eq!(lp.children(), &[NodeId(4)]);
        assert!(Node::Value(ValueKind::Uint8).children().is_empty());
    }
}
