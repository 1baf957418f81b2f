//! Nodes stored in a heap's arena.
//!
//! A node owns its children only by id; the parent link is a plain id
//! back-reference into the same arena, so the tree carries no reference
//! cycles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use vheap_types::{NodeId, NodeType, Update};

/// Children or value of a node, by shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeContent {
    /// Scalar payload. `Value::Null` means "no value".
    Scalar(Value),
    /// Ordered list children.
    List(Vec<NodeId>),
    /// Name-keyed children of a map or object node.
    Map(BTreeMap<String, NodeId>),
}

impl NodeContent {
    fn empty_for(node_type: NodeType) -> Self {
        match node_type {
            NodeType::Scalar => NodeContent::Scalar(Value::Null),
            NodeType::List => NodeContent::List(Vec::new()),
            NodeType::Map | NodeType::Object => NodeContent::Map(BTreeMap::new()),
        }
    }
}

/// Where a node sits under its parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Slot {
    Root,
    Field(NodeId, String),
    Index(NodeId, usize),
}

/// A single addressable element of the tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    id: NodeId,
    node_type: NodeType,
    parent: Option<NodeId>,
    name: Option<String>,
    index: Option<usize>,
    content: NodeContent,
}

impl Node {
    pub(crate) fn new(id: NodeId, node_type: NodeType, slot: Slot) -> Self {
        let (parent, name, index) = match slot {
            Slot::Root => (None, None, None),
            Slot::Field(parent, name) => (Some(parent), Some(name), None),
            Slot::Index(parent, index) => (Some(parent), None, Some(index)),
        };
        Self {
            id,
            node_type,
            parent,
            name,
            index,
            content: NodeContent::empty_for(node_type),
        }
    }

    /// The node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The node type, fixed at install.
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// The parent's id, `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Key under the parent map, if the parent is a map or object.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Current position in the parent list, if the parent is a list.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// The node payload.
    pub fn content(&self) -> &NodeContent {
        &self.content
    }

    /// The scalar value, `None` for collection nodes.
    pub fn value(&self) -> Option<&Value> {
        match &self.content {
            NodeContent::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// List children in order, `None` for other shapes.
    pub fn list_children(&self) -> Option<&[NodeId]> {
        match &self.content {
            NodeContent::List(children) => Some(children),
            _ => None,
        }
    }

    /// Map children by name, `None` for other shapes.
    pub fn map_children(&self) -> Option<&BTreeMap<String, NodeId>> {
        match &self.content {
            NodeContent::Map(children) => Some(children),
            _ => None,
        }
    }

    /// Number of children; zero for scalars.
    pub fn size(&self) -> usize {
        match &self.content {
            NodeContent::Scalar(_) => 0,
            NodeContent::List(children) => children.len(),
            NodeContent::Map(children) => children.len(),
        }
    }

    /// Child ids in iteration order (list order, or name order for maps).
    pub fn child_ids(&self) -> Vec<NodeId> {
        match &self.content {
            NodeContent::Scalar(_) => Vec::new(),
            NodeContent::List(children) => children.clone(),
            NodeContent::Map(children) => children.values().copied().collect(),
        }
    }

    /// The update that installs this node at its current position.
    pub fn install_update(&self) -> Update {
        match (self.parent, &self.name, self.index) {
            (Some(parent_id), Some(name), _) => Update::InstallField {
                parent_id,
                id: self.id,
                name: name.clone(),
                node_type: self.node_type,
            },
            (Some(parent_id), None, Some(index)) => Update::InstallIndex {
                parent_id,
                id: self.id,
                index,
                node_type: self.node_type,
            },
            _ => Update::InstallRoot {
                id: self.id,
                node_type: self.node_type,
            },
        }
    }

    pub(crate) fn content_mut(&mut self) -> &mut NodeContent {
        &mut self.content
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = Some(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_nodes_are_empty() {
        let scalar = Node::new(NodeId(0), NodeType::Scalar, Slot::Root);
        assert_eq!(scalar.value(), Some(&Value::Null));
        assert_eq!(scalar.size(), 0);

        let object = Node::new(NodeId(1), NodeType::Object, Slot::Root);
        assert!(object.map_children().is_some_and(|c| c.is_empty()));
        assert!(object.value().is_none());
    }

    #[test]
    fn slot_sets_position() {
        let field = Node::new(NodeId(2), NodeType::List, Slot::Field(NodeId(0), "xs".into()));
        assert_eq!(field.parent(), Some(NodeId(0)));
        assert_eq!(field.name(), Some("xs"));
        assert_eq!(field.index(), None);

        let item = Node::new(NodeId(3), NodeType::Scalar, Slot::Index(NodeId(2), 4));
        assert_eq!(item.index(), Some(4));
        assert_eq!(item.name(), None);
    }

    #[test]
    fn install_update_follows_position() {
        let root = Node::new(NodeId(0), NodeType::Map, Slot::Root);
        assert_eq!(
            root.install_update(),
            Update::InstallRoot {
                id: NodeId(0),
                node_type: NodeType::Map
            }
        );

        let item = Node::new(NodeId(3), NodeType::Scalar, Slot::Index(NodeId(2), 1));
        assert_eq!(
            item.install_update(),
            Update::InstallIndex {
                parent_id: NodeId(2),
                id: NodeId(3),
                index: 1,
                node_type: NodeType::Scalar
            }
        );
    }
}
