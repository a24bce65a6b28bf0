use crate::error::FormatError;
use crate::node::{ActionId, Node, NodeId};
use crate::value_kind::ValueKind;

/// An immutable, validated format-description tree.
///
/// Nodes live in a flat arena and refer to their children by [`NodeId`].
/// Every child id is strictly lower than its parent's, so the tree is
/// acyclic and can be walked without recursion limits beyond its own
/// depth. Share a format between decompressors with `Arc<Format>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Format {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Format {
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, node)| (id_at(i), node))
    }

    /// Longest root-to-leaf path, counting nodes.
    #[must_use]
    pub fn depth(&self) -> usize {
        // Children precede parents, so one forward pass suffices.
        let mut depths = vec![0usize; self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            let deepest = node
                .children()
                .iter()
                .map(|c| depths[c.index()])
                .max()
                .unwrap_or(0);
            depths[i] = deepest + 1;
        }
        depths.get(self.root.index()).copied().unwrap_or(0)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn id_at(index: usize) -> NodeId {
    NodeId(index as u32)
}

/// Bottom-up builder for a [`Format`].
///
/// ```
/// use cwasm_format::{FormatBuilder, ValueKind};
///
/// let mut b = FormatBuilder::new();
/// let item = b.value(ValueKind::Varuint32);
/// let body = b.counted_loop(ValueKind::Varuint32, item);
/// let root = b.block(body);
/// let format = b.finish(root).unwrap();
/// assert_eq!(format.depth(), 3);
/// ```
#[derive(Clone, Debug, Default)]
pub struct FormatBuilder {
    nodes: Vec<Node>,
}

impl FormatBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node as-is. References are checked by [`finish`](Self::finish).
    pub fn push(&mut self, node: Node) -> NodeId {
        let id = id_at(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn value(&mut self, kind: ValueKind) -> NodeId {
        self.push(Node::Value(kind))
    }

    pub fn action(&mut self, id: u32) -> NodeId {
        self.push(Node::Action(ActionId(id)))
    }

    pub fn sequence(&mut self, children: impl IntoIterator<Item = NodeId>) -> NodeId {
        self.push(Node::Sequence(children.into_iter().collect()))
    }

    pub fn counted_loop(&mut self, count: ValueKind, body: NodeId) -> NodeId {
        self.push(Node::Loop { count, body })
    }

    pub fn block(&mut self, body: NodeId) -> NodeId {
        self.push(Node::Block(body))
    }

    pub fn until_eof(&mut self, body: NodeId) -> NodeId {
        self.push(Node::UntilEof(body))
    }

    pub fn opaque(&mut self, opcode: u8) -> NodeId {
        self.push(Node::Opaque(opcode))
    }

    /// Validate and freeze the tree.
    ///
    /// # Errors
    ///
    /// See [`FormatError`].
    pub fn finish(self, root: NodeId) -> Result<Format, FormatError> {
        if self.nodes.is_empty() {
            return Err(FormatError::EmptyFormat);
        }
        if root.index() >= self.nodes.len() {
            return Err(FormatError::UnknownNode { id: root });
        }
        for (i, node) in self.nodes.iter().enumerate() {
            let id = id_at(i);
            if let Some(&child) = node.children().iter().find(|c| c.index() >= i) {
                return Err(if child.index() >= self.nodes.len() {
                    FormatError::UnknownNode { id: child }
                } else {
                    FormatError::ForwardReference { node: id, child }
                });
            }
            if let Node::Loop { count, .. } = node {
                if count.is_signed() {
                    return Err(FormatError::InvalidLoopCount { kind: *count });
                }
            }
        }
        Ok(Format {
            nodes: self.nodes,
            root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    #[test]
    fn builds_nested_tree() {
        let mut b = FormatBuilder::new();
        let a = b.value(ValueKind::Uint8);
        let c = b.value(ValueKind::Varint64);
        let seq = b.sequence([a, c]);
        let root = b.until_eof(seq);
        let format = b.finish(root).unwrap();
        assert_eq!(format.len(), 4);
        assert_eq!(format.root(), root);
        assert_eq!(format.depth(), 3);
        assert_eq!(format.node(seq).map(Node::kind), Some(NodeKind::Sequence));
        assert!(format.node(NodeId(9)).is_none());
    }

    #[test]
    fn empty_builder_rejected() {
        assert_eq!(
            FormatBuilder::new().finish(NodeId(0)),
            Err(FormatError::EmptyFormat)
        );
    }

    #[test]
    fn unknown_root_rejected() {
        let mut b = FormatBuilder::new();
        b.value(ValueKind::Uint8);
        assert_eq!(
            b.finish(NodeId(3)),
            Err(FormatError::UnknownNode { id: NodeId(3) })
        );
    }

    #[test]
    fn self_reference_rejected() {
        let mut b = FormatBuilder::new();
        let looped = b.block(NodeId(0));
        assert_eq!(
            b.finish(looped),
            Err(FormatError::ForwardReference {
                node: NodeId(0),
                child: NodeId(0)
            })
        );
    }

    #[test]
    fn dangling_child_rejected() {
        let mut b = FormatBuilder::new();
        b.value(ValueKind::Uint8);
        let seq = b.sequence([NodeId(0), NodeId(7)]);
        assert_eq!(
            b.finish(seq),
            Err(FormatError::UnknownNode { id: NodeId(7) })
        );
    }

    #[test]
    fn signed_loop_count_rejected() {
        let mut b = FormatBuilder::new();
        let body = b.value(ValueKind::Uint8);
        let root = b.counted_loop(ValueKind::Varint32, body);
        assert_eq!(
            b.finish(root),
            Err(FormatError::InvalidLoopCount {
                kind: ValueKind::Varint32
            })
        );
    }

    #[test]
    fn opaque_nodes_are_kept() {
        let mut b = FormatBuilder::new();
        let root = b.opaque(0x7E);
        let format = b.finish(root).unwrap();
        assert_eq!(format.node(root), Some(&Node::Opaque(0x7E)));
        assert_eq!(format.iter().count(), 1);
    }
}
