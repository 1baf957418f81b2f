//! The closed set of atomic heap updates.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::NodeId;
use crate::node_type::NodeType;

/// Every id freed by a removal: the removed node plus its whole subtree.
pub type DeallocatedIds = BTreeSet<NodeId>;

/// One atomic change to a heap.
///
/// Removals carry the transitive set of ids they free so downstream
/// consumers can release per-id state without re-walking the tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Update {
    /// Install the root node of an empty heap.
    InstallRoot { id: NodeId, node_type: NodeType },
    /// Install a named child under a map or object node.
    InstallField {
        parent_id: NodeId,
        id: NodeId,
        name: String,
        node_type: NodeType,
    },
    /// Insert a child into a list node at `index`, shifting later siblings up.
    InstallIndex {
        parent_id: NodeId,
        id: NodeId,
        index: usize,
        node_type: NodeType,
    },
    /// Replace the value of a scalar node. `Value::Null` clears it.
    SetScalar { id: NodeId, value: Value },
    /// Remove a named child (and its subtree) from a map or object node.
    RemoveField {
        parent_id: NodeId,
        id: NodeId,
        name: String,
        deallocated_ids: DeallocatedIds,
    },
    /// Remove a list child (and its subtree), shifting later siblings down.
    RemoveIndex {
        parent_id: NodeId,
        id: NodeId,
        index: usize,
        deallocated_ids: DeallocatedIds,
    },
    /// Remove every child of a collection node.
    RemoveChildren {
        id: NodeId,
        deallocated_ids: DeallocatedIds,
    },
    /// Mark the heap terminal; no further updates follow.
    TerminateHeap,
}

impl Update {
    /// The id of the node this update targets, if any.
    pub fn id(&self) -> Option<NodeId> {
        match self {
            Update::InstallRoot { id, .. }
            | Update::InstallField { id, .. }
            | Update::InstallIndex { id, .. }
            | Update::SetScalar { id, .. }
            | Update::RemoveField { id, .. }
            | Update::RemoveIndex { id, .. }
            | Update::RemoveChildren { id, .. } => Some(*id),
            Update::TerminateHeap => None,
        }
    }

    /// The parent id for child installs and removals.
    pub fn parent_id(&self) -> Option<NodeId> {
        match self {
            Update::InstallField { parent_id, .. }
            | Update::InstallIndex { parent_id, .. }
            | Update::RemoveField { parent_id, .. }
            | Update::RemoveIndex { parent_id, .. } => Some(*parent_id),
            _ => None,
        }
    }

    /// Ids freed by this update. Empty for anything but removals.
    pub fn deallocated_ids(&self) -> Option<&DeallocatedIds> {
        match self {
            Update::RemoveField { deallocated_ids, .. }
            | Update::RemoveIndex { deallocated_ids, .. }
            | Update::RemoveChildren { deallocated_ids, .. } => Some(deallocated_ids),
            _ => None,
        }
    }

    /// Returns `true` for updates that install a node.
    pub fn is_install(&self) -> bool {
        matches!(
            self,
            Update::InstallRoot { .. } | Update::InstallField { .. } | Update::InstallIndex { .. }
        )
    }

    /// Returns `true` for updates that remove nodes.
    pub fn is_removal(&self) -> bool {
        matches!(
            self,
            Update::RemoveField { .. } | Update::RemoveIndex { .. } | Update::RemoveChildren { .. }
        )
    }

    /// Short name of the variant, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Update::InstallRoot { .. } => "install_root",
            Update::InstallField { .. } => "install_field",
            Update::InstallIndex { .. } => "install_index",
            Update::SetScalar { .. } => "set_scalar",
            Update::RemoveField { .. } => "remove_field",
            Update::RemoveIndex { .. } => "remove_index",
            Update::RemoveChildren { .. } => "remove_children",
            Update::TerminateHeap => "terminate_heap",
        }
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::InstallRoot { id, node_type } => write!(f, "InstallRoot({id}, {node_type})"),
            Update::InstallField {
                parent_id,
                id,
                name,
                node_type,
            } => write!(f, "InstallField({parent_id}, {id}, {name:?}, {node_type})"),
            Update::InstallIndex {
                parent_id,
                id,
                index,
                node_type,
            } => write!(f, "InstallIndex({parent_id}, {id}, {index}, {node_type})"),
            Update::SetScalar { id, value } => write!(f, "SetScalar({id}, {value})"),
            Update::RemoveField { parent_id, id, .. } => write!(f, "RemoveField({parent_id}, {id})"),
            Update::RemoveIndex {
                parent_id,
                id,
                index,
                ..
            } => write!(f, "RemoveIndex({parent_id}, {id}, {index})"),
            Update::RemoveChildren { id, .. } => write!(f, "RemoveChildren({id})"),
            Update::TerminateHeap => f.write_str("TerminateHeap"),
        }
    }
}
