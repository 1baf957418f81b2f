//! Snapshot-to-snapshot heap diff.
//!
//! The diff walks both trees from the root. Nodes are compared by identity
//! (id, type and name); a node whose identity diverges is removed and the
//! replacement deep-added. Map children are matched by key, list children
//! by a longest common subsequence, so survivors keep their ids and only
//! their contents are diffed.
//!
//! All removals precede all installs in the output. Each list removal
//! carries the position it occupies when it is applied, after the earlier
//! removals from the same list, so the block can also be fed to the
//! conflation engine.

use tracing::debug;

use vheap_core::{DeallocatedIds, Heap, HeapSnapshot, Node, NodeContent};
use vheap_types::{NodeId, Update, UpdateBlock};

use crate::error::{DiffError, DiffResult};
use crate::lcs::lcs;

/// The block that turns a heap in state `from` into state `to`.
///
/// Fails with [`DiffError::RootRemoval`] if `from` has a root and `to`
/// does not, and with [`DiffError::RootTypeMismatch`] if the roots differ
/// in type.
pub fn diff(from: &HeapSnapshot, to: &HeapSnapshot) -> DiffResult<UpdateBlock> {
    let mut builder = DiffBuilder::new(from, to);
    match (root_of(from)?, root_of(to)?) {
        (None, None) => {}
        (None, Some(root)) => {
            builder.installs.push(Update::InstallRoot {
                id: root.id(),
                node_type: root.node_type(),
            });
            builder.deep_add(root)?;
        }
        (Some(_), None) => return Err(DiffError::RootRemoval),
        (Some(from_root), Some(to_root)) => {
            if from_root.node_type() != to_root.node_type() {
                return Err(DiffError::RootTypeMismatch {
                    from: from_root.node_type(),
                    to: to_root.node_type(),
                });
            }
            builder.diff_nodes(from_root, to_root)?;
        }
    }

    debug!(
        removals = builder.removes.len(),
        installs = builder.installs.len(),
        "computed heap diff"
    );
    let mut updates = builder.removes;
    updates.append(&mut builder.installs);
    Ok(UpdateBlock::new(updates))
}

/// Diff the current states of two heaps.
pub fn diff_heaps(from: &Heap, to: &Heap) -> DiffResult<UpdateBlock> {
    diff(&from.snapshot()?, &to.snapshot()?)
}

fn root_of(snapshot: &HeapSnapshot) -> DiffResult<Option<&Node>> {
    match snapshot.root() {
        Some(id) => snapshot.node(id).map(Some).ok_or(DiffError::MissingNode(id)),
        None => Ok(None),
    }
}

/// Same logical node, wherever it sits in a list.
fn same_identity(a: &Node, b: &Node) -> bool {
    a.id() == b.id() && a.node_type() == b.node_type() && a.name() == b.name()
}

struct DiffBuilder<'a> {
    from: &'a HeapSnapshot,
    to: &'a HeapSnapshot,
    installs: Vec<Update>,
    removes: Vec<Update>,
}

impl<'a> DiffBuilder<'a> {
    fn new(from: &'a HeapSnapshot, to: &'a HeapSnapshot) -> Self {
        Self {
            from,
            to,
            installs: Vec::new(),
            removes: Vec::new(),
        }
    }

    fn from_node(&self, id: NodeId) -> DiffResult<&'a Node> {
        self.from.node(id).ok_or(DiffError::MissingNode(id))
    }

    fn to_node(&self, id: NodeId) -> DiffResult<&'a Node> {
        self.to.node(id).ok_or(DiffError::MissingNode(id))
    }

    fn deallocated(&self, id: NodeId) -> DeallocatedIds {
        self.from.subtree_ids(id).into_iter().collect()
    }

    /// Diff two nodes of the same type. Updates address `from`'s ids.
    fn diff_nodes(&mut self, from: &'a Node, to: &'a Node) -> DiffResult<()> {
        match (from.content(), to.content()) {
            (NodeContent::Scalar(old), NodeContent::Scalar(new)) => {
                if old != new {
                    self.installs.push(Update::SetScalar {
                        id: from.id(),
                        value: new.clone(),
                    });
                }
                Ok(())
            }
            (NodeContent::Map(_), NodeContent::Map(_)) => self.diff_maps(from, to),
            (NodeContent::List(old), NodeContent::List(new)) => self.diff_lists(from, old, new),
            _ => Err(DiffError::RootTypeMismatch {
                from: from.node_type(),
                to: to.node_type(),
            }),
        }
    }

    fn diff_maps(&mut self, from: &'a Node, to: &'a Node) -> DiffResult<()> {
        let (Some(old), Some(new)) = (from.map_children(), to.map_children()) else {
            return Ok(());
        };

        for (name, &id) in new {
            if !old.contains_key(name) {
                let child = self.to_node(id)?;
                self.install_field(from.id(), name, child)?;
            }
        }
        for (name, &id) in old {
            if !new.contains_key(name) {
                self.remove_field(from.id(), name, id);
            }
        }
        for (name, &old_id) in old {
            let Some(&new_id) = new.get(name) else {
                continue;
            };
            let old_child = self.from_node(old_id)?;
            let new_child = self.to_node(new_id)?;
            if same_identity(old_child, new_child) && old_child.index() == new_child.index() {
                self.diff_nodes(old_child, new_child)?;
            } else {
                self.remove_field(from.id(), name, old_id);
                self.install_field(from.id(), name, new_child)?;
            }
        }
        Ok(())
    }

    fn diff_lists(&mut self, from: &'a Node, old: &[NodeId], new: &[NodeId]) -> DiffResult<()> {
        let old_nodes = old
            .iter()
            .map(|&id| self.from_node(id))
            .collect::<DiffResult<Vec<_>>>()?;
        let new_nodes = new
            .iter()
            .map(|&id| self.to_node(id))
            .collect::<DiffResult<Vec<_>>>()?;

        let pairs = lcs(&new_nodes, &old_nodes, |a, b| same_identity(a, b));
        let mut match_of_old = vec![None; old_nodes.len()];
        let mut matched_new = vec![false; new_nodes.len()];
        for &(new_index, old_index) in &pairs {
            match_of_old[old_index] = Some(new_index);
            matched_new[new_index] = true;
        }

        let mut removed = 0;
        for (old_index, old_child) in old_nodes.iter().copied().enumerate() {
            match match_of_old[old_index] {
                Some(new_index) => self.diff_nodes(old_child, new_nodes[new_index])?,
                None => {
                    self.removes.push(Update::RemoveIndex {
                        parent_id: from.id(),
                        id: old_child.id(),
                        index: old_index - removed,
                        deallocated_ids: self.deallocated(old_child.id()),
                    });
                    removed += 1;
                }
            }
        }

        for (index, new_child) in new_nodes.iter().copied().enumerate() {
            if !matched_new[index] {
                self.install_index(from.id(), index, new_child)?;
            }
        }
        Ok(())
    }

    fn remove_field(&mut self, parent_id: NodeId, name: &str, id: NodeId) {
        self.removes.push(Update::RemoveField {
            parent_id,
            id,
            name: name.to_string(),
            deallocated_ids: self.deallocated(id),
        });
    }

    fn install_field(&mut self, parent_id: NodeId, name: &str, child: &'a Node) -> DiffResult<()> {
        self.installs.push(Update::InstallField {
            parent_id,
            id: child.id(),
            name: name.to_string(),
            node_type: child.node_type(),
        });
        self.deep_add(child)
    }

    fn install_index(&mut self, parent_id: NodeId, index: usize, child: &'a Node) -> DiffResult<()> {
        self.installs.push(Update::InstallIndex {
            parent_id,
            id: child.id(),
            index,
            node_type: child.node_type(),
        });
        self.deep_add(child)
    }

    /// Install everything below `node`, which has just been installed.
    fn deep_add(&mut self, node: &'a Node) -> DiffResult<()> {
        match node.content() {
            NodeContent::Scalar(value) => {
                if !value.is_null() {
                    self.installs.push(Update::SetScalar {
                        id: node.id(),
                        value: value.clone(),
                    });
                }
            }
            NodeContent::Map(children) => {
                for (name, &id) in children {
                    let child = self.to_node(id)?;
                    self.install_field(node.id(), name, child)?;
                }
            }
            NodeContent::List(children) => {
                for (index, &id) in children.iter().enumerate() {
                    let child = self.to_node(id)?;
                    self.install_index(node.id(), index, child)?;
                }
            }
        }
        Ok(())
    }
}
