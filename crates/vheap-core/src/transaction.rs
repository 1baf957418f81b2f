//! The write side of a heap.
//!
//! A [`Transaction`] holds the heap's write lock from
//! [`Heap::begin_update`](crate::Heap::begin_update) until it is committed
//! or dropped. Every mutation checks the heap's policy once, mutates the
//! arena and appends exactly one [`Update`] to the pending block.
//!
//! Operations come in two layers. The projection-facing methods
//! (`ensure_root`, `ensure_field`, `insert_at`, `set_scalar`, ...) act with
//! [`Origin::Direct`] and allocate ids from the heap's own pool. The
//! explicit-id methods (`install_root`, `install_field`, `install_index`,
//! `remove_by_id`, ...) take the id and origin from the caller and are what
//! [`Transaction::apply`] uses to replay a received update.

use std::fmt;
use std::sync::RwLockWriteGuard;

use serde_json::Value;
use tracing::{info, warn};

use vheap_conflate::conflate;
use vheap_types::{DeallocatedIds, NodeId, NodeType, Update, UpdateBlock};

use crate::error::{HeapError, HeapResult};
use crate::heap::{Heap, HeapState};
use crate::node::{Node, NodeContent, Slot};

/// Where a mutation comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// A call through the heap's own API.
    Direct,
    /// Replay of an update received from an upstream heap.
    Listener,
}

impl Origin {
    /// Freed ids go back to the pool only when this heap owns them.
    fn recycles_ids(self) -> bool {
        self == Origin::Direct
    }
}

/// An open transaction on a [`Heap`].
///
/// Dropping a transaction without calling [`commit`](Transaction::commit)
/// still commits it, so updates already applied are never withheld from
/// listeners.
pub struct Transaction<'a> {
    heap: &'a Heap,
    state: RwLockWriteGuard<'a, HeapState>,
    updates: Vec<Update>,
    finished: bool,
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("uri", &self.heap.uri())
            .field("pending", &self.updates.len())
            .finish_non_exhaustive()
    }
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(heap: &'a Heap, state: RwLockWriteGuard<'a, HeapState>) -> Self {
        Self {
            heap,
            state,
            updates: Vec::new(),
            finished: false,
        }
    }

    /// The heap this transaction writes to.
    pub fn heap(&self) -> &Heap {
        self.heap
    }

    /// Updates emitted so far.
    pub fn pending(&self) -> &[Update] {
        &self.updates
    }

    /// Close the transaction and broadcast its block.
    ///
    /// The returned block is the one delivered to listeners. Empty blocks
    /// are returned but never broadcast.
    pub fn commit(mut self) -> HeapResult<UpdateBlock> {
        self.finish()
    }

    fn finish(&mut self) -> HeapResult<UpdateBlock> {
        self.finished = true;
        let block = UpdateBlock::new(std::mem::take(&mut self.updates));

        if !block.is_empty() {
            if let Some(history) = self.state.history.as_mut() {
                *history = conflate(&[history.clone(), block.clone()]);
            }
        }

        let result = self.heap.broadcast(&block);
        self.heap.release_writer();
        result.map(|()| block)
    }

    // ---- policy

    fn check_mutation(&self, origin: Origin, operation: &'static str) -> HeapResult<()> {
        if self.heap.config().read_only && origin == Origin::Direct {
            return Err(HeapError::Immutable { operation });
        }
        if self.state.terminated {
            return Err(HeapError::Terminated {
                uri: self.heap.uri().to_string(),
            });
        }
        Ok(())
    }

    fn emit(&mut self, update: Update) {
        self.updates.push(update);
    }

    // ---- reads

    /// The root id, if a root is installed.
    pub fn root(&self) -> Option<NodeId> {
        self.state.arena.root()
    }

    /// Whether the heap has been terminated.
    pub fn is_terminated(&self) -> bool {
        self.state.terminated
    }

    /// The live node `id`.
    pub fn node(&self, id: NodeId) -> HeapResult<&Node> {
        self.state.arena.node(id)
    }

    /// Whether `id` names a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.state.arena.is_live(id)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.state.arena.len()
    }

    /// Whether the heap has no live nodes.
    pub fn is_empty(&self) -> bool {
        self.state.arena.len() == 0
    }

    /// The value of a scalar node.
    pub fn value(&self, id: NodeId) -> HeapResult<&Value> {
        let node = self.node(id)?;
        node.value().ok_or(HeapError::WrongNodeType {
            id,
            expected: "scalar",
            actual: node.node_type(),
        })
    }

    /// Number of children of a node.
    pub fn size(&self, id: NodeId) -> HeapResult<usize> {
        Ok(self.node(id)?.size())
    }

    /// Ids of the children of a node, in order.
    pub fn children(&self, id: NodeId) -> HeapResult<Vec<NodeId>> {
        Ok(self.node(id)?.child_ids())
    }

    /// The child of a map named `name`.
    pub fn get_field(&self, map: NodeId, name: &str) -> HeapResult<Option<NodeId>> {
        Ok(map_children(self.node(map)?)?.get(name).copied())
    }

    /// The child of a list at `index`.
    pub fn get_index_at(&self, list: NodeId, index: usize) -> HeapResult<NodeId> {
        let children = list_children(self.node(list)?)?;
        children
            .get(index)
            .copied()
            .ok_or(HeapError::IndexOutOfBounds {
                id: list,
                index,
                len: children.len(),
            })
    }

    // ---- projection-facing mutations

    /// Return the root, installing one of `node_type` if there is none.
    pub fn ensure_root(&mut self, node_type: NodeType) -> HeapResult<NodeId> {
        if let Some(root) = self.state.arena.root() {
            let existing = self.node(root)?.node_type();
            if existing != node_type {
                return Err(HeapError::RootTypeMismatch {
                    existing,
                    requested: node_type,
                });
            }
            return Ok(root);
        }
        self.check_mutation(Origin::Direct, "install root")?;
        let id = self.state.arena.allocate_id();
        self.install_root(id, node_type, Origin::Direct)?;
        Ok(id)
    }

    /// Return the field `name` of `map`, installing one if it is absent.
    ///
    /// An existing field is returned whatever its type.
    pub fn ensure_field(&mut self, map: NodeId, name: &str, node_type: NodeType) -> HeapResult<NodeId> {
        if let Some(existing) = self.get_field(map, name)? {
            return Ok(existing);
        }
        self.check_mutation(Origin::Direct, "install field")?;
        let id = self.state.arena.allocate_id();
        self.install_field(map, id, name, node_type, Origin::Direct)?;
        Ok(id)
    }

    /// Insert a new child into `list` at `index`, shifting later children up.
    pub fn insert_at(&mut self, list: NodeId, index: usize, node_type: NodeType) -> HeapResult<NodeId> {
        self.check_mutation(Origin::Direct, "install index")?;
        let len = list_children(self.node(list)?)?.len();
        if index > len {
            return Err(HeapError::IndexOutOfBounds { id: list, index, len });
        }
        let id = self.state.arena.allocate_id();
        self.install_index(list, id, index, node_type, Origin::Direct)?;
        Ok(id)
    }

    /// Remove the field `name` of `map`. Returns the removed id, or `None`
    /// if there was no such field.
    pub fn remove_field(&mut self, map: NodeId, name: &str) -> HeapResult<Option<NodeId>> {
        self.check_mutation(Origin::Direct, "remove field")?;
        match self.get_field(map, name)? {
            Some(id) => {
                self.remove_field_by_id(map, id, Origin::Direct)?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Remove the child of `list` at `index`, shifting later children down.
    pub fn remove_index(&mut self, list: NodeId, index: usize) -> HeapResult<NodeId> {
        self.check_mutation(Origin::Direct, "remove index")?;
        let id = self.get_index_at(list, index)?;
        self.remove_by_id(list, id, Origin::Direct)?;
        Ok(id)
    }

    /// Remove every child of a collection node. No-op when already empty.
    pub fn clear(&mut self, id: NodeId) -> HeapResult<()> {
        self.remove_children(id, Origin::Direct)
    }

    /// Set the value of a scalar node. Returns `true` if the value changed;
    /// an unchanged value emits nothing.
    pub fn set_scalar(&mut self, id: NodeId, value: impl Into<Value>) -> HeapResult<bool> {
        self.set_scalar_from(id, value.into(), Origin::Direct)
    }

    /// Mark the heap terminal.
    pub fn terminate(&mut self) -> HeapResult<()> {
        self.terminate_from(Origin::Direct)
    }

    // ---- explicit-id mutations

    /// Install the root under a caller-chosen id.
    pub fn install_root(&mut self, id: NodeId, node_type: NodeType, origin: Origin) -> HeapResult<()> {
        self.check_mutation(origin, "install root")?;
        if let Some(root) = self.state.arena.root() {
            return Err(HeapError::RootAlreadyInstalled(root));
        }
        self.state.arena.allocate_node(id, node_type, Slot::Root)?;
        self.state.arena.set_root(id);
        self.emit(Update::InstallRoot { id, node_type });
        Ok(())
    }

    /// Install a field of `map` under a caller-chosen id.
    pub fn install_field(
        &mut self,
        map: NodeId,
        id: NodeId,
        name: &str,
        node_type: NodeType,
        origin: Origin,
    ) -> HeapResult<()> {
        self.check_mutation(origin, "install field")?;
        if map_children(self.node(map)?)?.contains_key(name) {
            return Err(HeapError::FieldExists {
                id: map,
                name: name.to_string(),
            });
        }
        let arena = &mut self.state.arena;
        arena.allocate_node(id, node_type, Slot::Field(map, name.to_string()))?;
        if let NodeContent::Map(children) = arena.node_mut(map)?.content_mut() {
            children.insert(name.to_string(), id);
        }
        self.emit(Update::InstallField {
            parent_id: map,
            id,
            name: name.to_string(),
            node_type,
        });
        Ok(())
    }

    /// Install a list element at `index` under a caller-chosen id.
    pub fn install_index(
        &mut self,
        list: NodeId,
        id: NodeId,
        index: usize,
        node_type: NodeType,
        origin: Origin,
    ) -> HeapResult<()> {
        self.check_mutation(origin, "install index")?;
        let len = list_children(self.node(list)?)?.len();
        if index > len {
            return Err(HeapError::IndexOutOfBounds { id: list, index, len });
        }
        let arena = &mut self.state.arena;
        arena.allocate_node(id, node_type, Slot::Index(list, index))?;
        if let NodeContent::List(children) = arena.node_mut(list)?.content_mut() {
            children.insert(index, id);
        }
        arena.reindex_from(list, index + 1)?;
        self.emit(Update::InstallIndex {
            parent_id: list,
            id,
            index,
            node_type,
        });
        Ok(())
    }

    /// Remove the field of `map` whose node is `id`.
    pub fn remove_field_by_id(&mut self, map: NodeId, id: NodeId, origin: Origin) -> HeapResult<()> {
        self.check_mutation(origin, "remove field")?;
        map_children(self.node(map)?)?;
        let child = self.node(id)?;
        let name = match (child.parent(), child.name()) {
            (Some(parent), Some(name)) if parent == map => name.to_string(),
            _ => return Err(HeapError::NotAChild { parent: map, child: id }),
        };

        let arena = &mut self.state.arena;
        if let NodeContent::Map(children) = arena.node_mut(map)?.content_mut() {
            children.remove(&name);
        }
        let mut deallocated_ids = DeallocatedIds::new();
        arena.deallocate(id, origin.recycles_ids(), &mut deallocated_ids);
        self.emit(Update::RemoveField {
            parent_id: map,
            id,
            name,
            deallocated_ids,
        });
        Ok(())
    }

    /// Remove the child `id` of `list`, wherever it currently sits.
    pub fn remove_by_id(&mut self, list: NodeId, id: NodeId, origin: Origin) -> HeapResult<()> {
        self.check_mutation(origin, "remove index")?;
        list_children(self.node(list)?)?;
        let child = self.node(id)?;
        let index = match (child.parent(), child.index()) {
            (Some(parent), Some(index)) if parent == list => index,
            _ => return Err(HeapError::NotAChild { parent: list, child: id }),
        };

        let arena = &mut self.state.arena;
        if let NodeContent::List(children) = arena.node_mut(list)?.content_mut() {
            children.remove(index);
        }
        arena.reindex_from(list, index)?;
        let mut deallocated_ids = DeallocatedIds::new();
        arena.deallocate(id, origin.recycles_ids(), &mut deallocated_ids);
        self.emit(Update::RemoveIndex {
            parent_id: list,
            id,
            index,
            deallocated_ids,
        });
        Ok(())
    }

    /// Remove every child of the collection node `id`.
    pub fn remove_children(&mut self, id: NodeId, origin: Origin) -> HeapResult<()> {
        self.check_mutation(origin, "remove children")?;
        let node = self.node(id)?;
        if !node.node_type().is_collection() {
            return Err(HeapError::WrongNodeType {
                id,
                expected: "collection",
                actual: node.node_type(),
            });
        }
        if node.size() == 0 {
            return Ok(());
        }

        let arena = &mut self.state.arena;
        let children = arena.node(id)?.child_ids();
        match arena.node_mut(id)?.content_mut() {
            NodeContent::List(list) => list.clear(),
            NodeContent::Map(map) => map.clear(),
            NodeContent::Scalar(_) => {}
        }
        let mut deallocated_ids = DeallocatedIds::new();
        for child in children {
            arena.deallocate(child, origin.recycles_ids(), &mut deallocated_ids);
        }
        self.emit(Update::RemoveChildren { id, deallocated_ids });
        Ok(())
    }

    fn set_scalar_from(&mut self, id: NodeId, value: Value, origin: Origin) -> HeapResult<bool> {
        self.check_mutation(origin, "set scalar")?;
        let node = self.state.arena.node_mut(id)?;
        let actual = node.node_type();
        let NodeContent::Scalar(current) = node.content_mut() else {
            return Err(HeapError::WrongNodeType {
                id,
                expected: "scalar",
                actual,
            });
        };
        if *current == value {
            return Ok(false);
        }
        *current = value.clone();
        self.emit(Update::SetScalar { id, value });
        Ok(true)
    }

    fn terminate_from(&mut self, origin: Origin) -> HeapResult<()> {
        self.check_mutation(origin, "terminate")?;
        self.state.terminated = true;
        self.emit(Update::TerminateHeap);
        info!(uri = %self.heap.uri(), "heap terminated");
        Ok(())
    }

    /// Replay one update.
    ///
    /// List removals are resolved by id; the recorded index is informational.
    pub fn apply(&mut self, update: &Update, origin: Origin) -> HeapResult<()> {
        match update {
            Update::InstallRoot { id, node_type } => self.install_root(*id, *node_type, origin),
            Update::InstallField {
                parent_id,
                id,
                name,
                node_type,
            } => self.install_field(*parent_id, *id, name, *node_type, origin),
            Update::InstallIndex {
                parent_id,
                id,
                index,
                node_type,
            } => self.install_index(*parent_id, *id, *index, *node_type, origin),
            Update::SetScalar { id, value } => {
                self.set_scalar_from(*id, value.clone(), origin).map(|_| ())
            }
            Update::RemoveField { parent_id, id, .. } => {
                self.remove_field_by_id(*parent_id, *id, origin)
            }
            Update::RemoveIndex { parent_id, id, .. } => self.remove_by_id(*parent_id, *id, origin),
            Update::RemoveChildren { id, .. } => self.remove_children(*id, origin),
            Update::TerminateHeap => self.terminate_from(origin),
        }
    }

    /// Replay every update of `block` in order.
    pub fn apply_block(&mut self, block: &UpdateBlock, origin: Origin) -> HeapResult<()> {
        for update in block {
            self.apply(update, origin)?;
        }
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if std::thread::panicking() {
            self.heap.release_writer();
            return;
        }
        warn!(
            uri = %self.heap.uri(),
            pending = self.updates.len(),
            "transaction dropped without commit, committing"
        );
        if let Err(err) = self.finish() {
            warn!(uri = %self.heap.uri(), error = %err, "implicit commit failed");
        }
    }
}

fn list_children(node: &Node) -> HeapResult<&[NodeId]> {
    node.list_children().ok_or(HeapError::WrongNodeType {
        id: node.id(),
        expected: "list",
        actual: node.node_type(),
    })
}

fn map_children(node: &Node) -> HeapResult<&std::collections::BTreeMap<String, NodeId>> {
    node.map_children().ok_or(HeapError::WrongNodeType {
        id: node.id(),
        expected: "map or object",
        actual: node.node_type(),
    })
}
