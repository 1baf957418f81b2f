//! Frozen copies of a heap's reachable tree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use vheap_types::NodeId;

use crate::node::Node;

/// The reachable tree of a heap at one point in time.
///
/// Two snapshots are equal when their trees match node for node: ids,
/// types, names, indices and scalar values. Free-id pools and the
/// termination flag are not part of the comparison.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapSnapshot {
    root: Option<NodeId>,
    nodes: BTreeMap<NodeId, Node>,
}

impl HeapSnapshot {
    /// Snapshot of a heap with no root.
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(root: Option<NodeId>, nodes: BTreeMap<NodeId, Node>) -> Self {
        Self { root, nodes }
    }

    /// The root id, if any.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// The root node, if any.
    pub fn root_node(&self) -> Option<&Node> {
        self.root.and_then(|id| self.nodes.get(&id))
    }

    /// The node `id`, if reachable.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Number of reachable nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node is reachable.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Ids of `id` and every node below it, in preorder.
    pub fn subtree_ids(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(node) = self.nodes.get(&next) else {
                continue;
            };
            out.push(next);
            stack.extend(node.child_ids().into_iter().rev());
        }
        out
    }
}
