//! Node identifiers for flow graphs.

use std::fmt;

/// A strongly-typed index of a node inside a [`FlowGraph`](crate::utils::graph::FlowGraph).
///
/// Node ids are handed out sequentially by
/// [`FlowGraph::add_node`](crate::utils::graph::FlowGraph::add_node) and stay stable while
/// nodes are removed; only [`FlowGraph::compact`](crate::utils::graph::FlowGraph::compact)
/// renumbers them.
///
/// # Examples
///
/// ```rust
/// use sagekit::utils::graph::{FlowGraph, NodeId};
///
/// let mut graph: FlowGraph<Vec<u8>> = FlowGraph::new();
/// let block: NodeId = graph.add_node(vec![1, 2, 3]);
/// assert_ne!(block, graph.start());
/// assert_eq!(graph.start(), NodeId::new(0));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Creates a `NodeId` from a raw index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the raw index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<usize> for NodeId {
    #[inline]
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}

impl From<NodeId> for usize {
    #[inline]
    fn from(node: NodeId) -> Self {
        node.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn ordering_follows_index() {
        let mut nodes: BTreeSet<NodeId> = [NodeId::new(3), NodeId::new(1), NodeId::new(2)]
            .into_iter()
            .collect();
        assert_eq!(nodes.pop_first(), Some(NodeId::new(1)));
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn formatting() {
        let node = NodeId::new(7);
        assert_eq!(format!("{node:?}"), "NodeId(7)");
        assert_eq!(format!("{node}"), "n7");
        assert_eq!(usize::from(node), 7);
        assert_eq!(NodeId::from(7), node);
    }
}
