//! Slot table of live nodes with id allocation and reuse.
//!
//! # Invariants
//!
//! - `slots[id]` is `Some` exactly while the node with that id is live.
//! - No id in `free_ids` is live when it is handed out; stale entries are
//!   skipped by [`Arena::allocate_id`].

use std::collections::VecDeque;

use vheap_types::{DeallocatedIds, NodeId, NodeType};

use crate::error::{HeapError, HeapResult};
use crate::node::{Node, NodeContent, Slot};

/// How far past the current slot table a single install may reach.
pub(crate) const MAX_SLOT_GROWTH: usize = 1 << 24;

#[derive(Debug, Default)]
pub(crate) struct Arena {
    slots: Vec<Option<Node>>,
    free_ids: VecDeque<NodeId>,
    next_id: u32,
    root: Option<NodeId>,
    live: usize,
}

impl Arena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub(crate) fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    pub(crate) fn is_live(&self, id: NodeId) -> bool {
        matches!(self.slots.get(id.slot()), Some(Some(_)))
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.slot()).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots.get_mut(id.slot()).and_then(Option::as_mut)
    }

    pub(crate) fn node(&self, id: NodeId) -> HeapResult<&Node> {
        self.get(id).ok_or(HeapError::NodeNotFound(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> HeapResult<&mut Node> {
        self.get_mut(id).ok_or(HeapError::NodeNotFound(id))
    }

    pub(crate) fn live_nodes(&self) -> impl Iterator<Item = &Node> {
        self.slots.iter().flatten()
    }

    pub(crate) fn free_ids(&self) -> Vec<NodeId> {
        self.free_ids.iter().copied().collect()
    }

    /// Next id to hand out: recycled ids first, then fresh ones.
    pub(crate) fn allocate_id(&mut self) -> NodeId {
        while let Some(id) = self.free_ids.pop_front() {
            if !self.is_live(id) {
                return id;
            }
        }
        loop {
            let id = NodeId(self.next_id);
            self.next_id += 1;
            if !self.is_live(id) {
                return id;
            }
        }
    }

    /// Place a node under `id`.
    ///
    /// Ids from a feed are trusted to be dense, as the upstream allocator
    /// hands them out. An id more than [`MAX_SLOT_GROWTH`] slots past the
    /// table is rejected rather than grown into.
    pub(crate) fn allocate_node(
        &mut self,
        id: NodeId,
        node_type: NodeType,
        slot: Slot,
    ) -> HeapResult<()> {
        if self.is_live(id) {
            return Err(HeapError::IdInUse(id));
        }
        let limit = self.slots.len().saturating_add(MAX_SLOT_GROWTH);
        if id.slot() >= limit {
            return Err(HeapError::IdOutOfRange { id, limit });
        }
        if self.slots.len() <= id.slot() {
            self.slots.resize_with(id.slot() + 1, || None);
        }
        self.slots[id.slot()] = Some(Node::new(id, node_type, slot));
        self.live += 1;
        Ok(())
    }

    /// Free `id` and its whole subtree, recording every freed id.
    ///
    /// Freed ids return to the pool only when `recycle` is set: a mirror
    /// fed by an upstream heap must not hand out ids it does not own.
    pub(crate) fn deallocate(&mut self, id: NodeId, recycle: bool, freed: &mut DeallocatedIds) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(node) = self.slots.get_mut(next.slot()).and_then(Option::take) else {
                continue;
            };
            self.live -= 1;
            freed.insert(next);
            if recycle {
                self.free_ids.push_back(next);
            }
            match node.content() {
                NodeContent::Scalar(_) => {}
                NodeContent::List(children) => stack.extend(children.iter().rev().copied()),
                NodeContent::Map(children) => stack.extend(children.values().rev().copied()),
            }
        }
    }

    /// Refresh the stored index of every list child from `from` onwards.
    pub(crate) fn reindex_from(&mut self, list: NodeId, from: usize) -> HeapResult<()> {
        let children = match self.node(list)?.content() {
            NodeContent::List(children) => children.get(from..).unwrap_or_default().to_vec(),
            _ => return Ok(()),
        };
        for (offset, child) in children.into_iter().enumerate() {
            self.node_mut(child)?.set_index(from + offset);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_sequential() {
        let mut arena = Arena::new();
        assert_eq!(arena.allocate_id(), NodeId(0));
        assert_eq!(arena.allocate_id(), NodeId(1));
    }

    #[test]
    fn ids_far_past_the_table_are_rejected() {
        let mut arena = Arena::new();
        arena
            .allocate_node(NodeId(1000), NodeType::List, Slot::Root)
            .unwrap();
        let err = arena
            .allocate_node(NodeId(u32::MAX), NodeType::Scalar, Slot::Root)
            .unwrap_err();
        assert!(matches!(err, HeapError::IdOutOfRange { .. }));
        assert_eq!(err.kind(), crate::ErrorKind::Structural);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn freed_ids_are_reused_first_in_first_out() {
        let mut arena = Arena::new();
        let root = arena.allocate_id();
        arena
            .allocate_node(root, NodeType::Map, Slot::Root)
            .unwrap();
        for name in ["a", "b"] {
            let id = arena.allocate_id();
            arena
                .allocate_node(id, NodeType::Scalar, Slot::Field(root, name.into()))
                .unwrap();
            if let NodeContent::Map(children) = arena.node_mut(root).unwrap().content_mut() {
                children.insert(name.into(), id);
            }
        }

        let mut freed = DeallocatedIds::new();
        arena.deallocate(root, true, &mut freed);
        assert_eq!(freed.len(), 3);
        assert_eq!(arena.len(), 0);
        assert_eq!(arena.free_ids(), vec![NodeId(0), NodeId(1), NodeId(2)]);
        assert_eq!(arena.allocate_id(), NodeId(0));
    }

    #[test]
    fn listener_fed_removals_do_not_recycle() {
        let mut arena = Arena::new();
        arena
            .allocate_node(NodeId(5), NodeType::Scalar, Slot::Root)
            .unwrap();
        let mut freed = DeallocatedIds::new();
        arena.deallocate(NodeId(5), false, &mut freed);
        assert!(freed.contains(&NodeId(5)));
        assert!(arena.free_ids().is_empty());
    }

    #[test]
    fn allocation_never_returns_a_live_id() {
        let mut arena = Arena::new();
        // Installed from a listener feed, bypassing the allocator.
        arena
            .allocate_node(NodeId(0), NodeType::List, Slot::Root)
            .unwrap();
        assert_eq!(arena.allocate_id(), NodeId(1));
    }

    #[test]
    fn double_allocation_is_rejected() {
        let mut arena = Arena::new();
        arena
            .allocate_node(NodeId(1), NodeType::Scalar, Slot::Root)
            .unwrap();
        let err = arena
            .allocate_node(NodeId(1), NodeType::Scalar, Slot::Root)
            .unwrap_err();
        assert!(matches!(err, HeapError::IdInUse(NodeId(1))));
    }
}
