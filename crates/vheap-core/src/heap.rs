//! The heap: lock discipline, listener fan-out and mirroring.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, Weak};
use std::thread::{self, ThreadId};

use tracing::{debug, info};

use vheap_types::{NodeId, Update, UpdateBlock};

use crate::arena::Arena;
use crate::config::{CatchUp, HeapConfig};
use crate::error::{HeapError, HeapResult};
use crate::listener::{HeapListener, ListenerSet};
use crate::node::NodeContent;
use crate::snapshot::HeapSnapshot;
use crate::transaction::{Origin, Transaction};

/// Everything guarded by the heap's read/write lock.
#[derive(Debug)]
pub(crate) struct HeapState {
    pub(crate) arena: Arena,
    pub(crate) terminated: bool,
    /// Conflation of every committed block, kept for conflated catch-up.
    pub(crate) history: Option<UpdateBlock>,
}

/// A mutable, observable tree of typed nodes.
///
/// All writes go through a [`Transaction`] obtained from
/// [`begin_update`](Heap::begin_update), which holds the write lock until it
/// commits. Committed blocks are broadcast to listeners before the lock is
/// released. A heap is itself a [`HeapListener`], so heaps can be chained
/// into mirrors of each other.
///
/// # Example
///
/// ```
/// use vheap_core::{Heap, NodeType};
///
/// let heap = Heap::mutable("heap://scores");
/// let mut tx = heap.begin_update().unwrap();
/// let root = tx.ensure_root(NodeType::Map).unwrap();
/// let home = tx.ensure_field(root, "home", NodeType::Scalar).unwrap();
/// tx.set_scalar(home, 2).unwrap();
/// let block = tx.commit().unwrap();
/// assert_eq!(block.len(), 3);
/// ```
pub struct Heap {
    uri: String,
    config: HeapConfig,
    state: RwLock<HeapState>,
    writer: Mutex<Option<ThreadId>>,
    listeners: ListenerSet,
    source: Mutex<Option<Weak<Heap>>>,
}

impl Heap {
    /// Create an empty heap identified by `uri`.
    pub fn new(uri: impl Into<String>, config: HeapConfig) -> Self {
        let uri = uri.into();
        let history = match config.catch_up {
            CatchUp::Conflated => Some(UpdateBlock::empty()),
            CatchUp::Traverse => None,
        };
        info!(
            uri = %uri,
            read_only = config.read_only,
            catch_up = ?config.catch_up,
            "heap created"
        );
        Self {
            uri,
            config,
            state: RwLock::new(HeapState {
                arena: Arena::new(),
                terminated: false,
                history,
            }),
            writer: Mutex::new(None),
            listeners: ListenerSet::default(),
            source: Mutex::new(None),
        }
    }

    /// A heap that accepts direct mutation.
    pub fn mutable(uri: impl Into<String>) -> Self {
        Self::new(uri, HeapConfig::default())
    }

    /// A heap that only changes through its listener feed.
    pub fn read_only(uri: impl Into<String>) -> Self {
        Self::new(uri, HeapConfig::immutable())
    }

    /// Create a heap attached downstream of `source`.
    ///
    /// With `populate`, the new heap is first brought up to `source`'s
    /// current state.
    pub fn mirror(
        uri: impl Into<String>,
        source: &Arc<Heap>,
        populate: bool,
        config: HeapConfig,
    ) -> HeapResult<Arc<Heap>> {
        let mirror = Arc::new(Heap::new(uri, config));
        source.add_listener(mirror.clone(), populate)?;
        *mirror.source.lock().map_err(|_| HeapError::LockPoisoned)? = Some(Arc::downgrade(source));
        Ok(mirror)
    }

    /// Identifier used in logs and errors.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The policy this heap was created with.
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Detach from the heap this one mirrors. Returns `false` if there was
    /// no live source.
    pub fn disconnect_from_source(&self) -> HeapResult<bool> {
        let source = self
            .source
            .lock()
            .map_err(|_| HeapError::LockPoisoned)?
            .take();
        match source.and_then(|weak| weak.upgrade()) {
            Some(source) => source.remove_listener(self),
            None => Ok(false),
        }
    }

    // ---- transactions

    /// Open a transaction, blocking until the write lock is free.
    ///
    /// Fails if the calling thread already has a transaction open here.
    pub fn begin_update(&self) -> HeapResult<Transaction<'_>> {
        if self.is_writer() {
            return Err(HeapError::Concurrency(format!(
                "heap {} already has an open transaction on this thread",
                self.uri
            )));
        }
        let state = self.state.write().map_err(|_| HeapError::LockPoisoned)?;
        *self.writer.lock().map_err(|_| HeapError::LockPoisoned)? = Some(thread::current().id());
        Ok(Transaction::new(self, state))
    }

    fn is_writer(&self) -> bool {
        self.writer
            .lock()
            .map(|writer| *writer == Some(thread::current().id()))
            .unwrap_or(false)
    }

    pub(crate) fn release_writer(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            *writer = None;
        }
    }

    fn ensure_not_writer(&self, operation: &str) -> HeapResult<()> {
        if self.is_writer() {
            return Err(HeapError::Concurrency(format!(
                "can't {operation} while holding the write lock of heap {}",
                self.uri
            )));
        }
        Ok(())
    }

    fn read_state(&self, operation: &str) -> HeapResult<RwLockReadGuard<'_, HeapState>> {
        self.ensure_not_writer(operation)?;
        self.state.read().map_err(|_| HeapError::LockPoisoned)
    }

    pub(crate) fn broadcast(&self, block: &UpdateBlock) -> HeapResult<()> {
        debug!(
            uri = %self.uri,
            updates = block.len(),
            listeners = self.listeners.len()?,
            "committed update block"
        );
        self.listeners.broadcast(block)
    }

    // ---- listeners

    /// Attach `listener`. With `populate`, it first receives a block that
    /// brings it up to the current state.
    pub fn add_listener(&self, listener: Arc<dyn HeapListener>, populate: bool) -> HeapResult<()> {
        let state = self.read_state("add a listener")?;
        if self.listeners.contains(listener.as_ref())? {
            return Err(HeapError::ListenerAlreadyAttached {
                uri: self.uri.clone(),
            });
        }
        if populate {
            let block = self.catch_up_block(&state)?;
            if !block.is_empty() {
                listener.apply_update(&block)?;
            }
        }
        self.listeners.add(listener)?;
        info!(uri = %self.uri, populate, listeners = self.listeners.len()?, "listener attached");
        Ok(())
    }

    /// Send the current state to a listener that is not attached.
    pub fn traverse(&self, listener: &dyn HeapListener) -> HeapResult<()> {
        let state = self.read_state("traverse")?;
        if self.listeners.contains(listener)? {
            return Err(HeapError::ListenerAlreadyAttached {
                uri: self.uri.clone(),
            });
        }
        let block = self.catch_up_block(&state)?;
        if !block.is_empty() {
            listener.apply_update(&block)?;
        }
        Ok(())
    }

    /// Detach `listener`. Returns `false` if it was not attached.
    pub fn remove_listener(&self, listener: &dyn HeapListener) -> HeapResult<bool> {
        let removed = self.listeners.remove(listener)?;
        if removed {
            info!(uri = %self.uri, listeners = self.listeners.len()?, "listener detached");
        }
        Ok(removed)
    }

    /// Number of attached listeners.
    pub fn listener_count(&self) -> HeapResult<usize> {
        self.listeners.len()
    }

    fn catch_up_block(&self, state: &HeapState) -> HeapResult<UpdateBlock> {
        match &state.history {
            Some(history) => Ok(history.clone()),
            None => traversal_block(state),
        }
    }

    // ---- reads

    /// Copy of the reachable tree.
    pub fn snapshot(&self) -> HeapResult<HeapSnapshot> {
        let state = self.read_state("take a snapshot")?;
        let arena = &state.arena;
        let mut nodes = BTreeMap::new();
        if let Some(root) = arena.root() {
            let mut stack = vec![root];
            while let Some(id) = stack.pop() {
                let node = arena.node(id)?;
                stack.extend(node.child_ids());
                nodes.insert(id, node.clone());
            }
        }
        Ok(HeapSnapshot::new(arena.root(), nodes))
    }

    /// The root id, if a root is installed.
    pub fn root(&self) -> HeapResult<Option<NodeId>> {
        Ok(self.read_state("read the root")?.arena.root())
    }

    /// Whether the heap has been terminated.
    pub fn is_terminated(&self) -> HeapResult<bool> {
        Ok(self.read_state("read the terminal flag")?.terminated)
    }

    /// Number of live nodes.
    pub fn len(&self) -> HeapResult<usize> {
        Ok(self.read_state("count nodes")?.arena.len())
    }

    /// Whether the heap has no live nodes.
    pub fn is_empty(&self) -> HeapResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Ids waiting in the free pool, in the order they will be reused.
    pub fn free_ids(&self) -> HeapResult<Vec<NodeId>> {
        Ok(self.read_state("read the free-id pool")?.arena.free_ids())
    }

    /// Ids of every live node, ascending.
    pub fn live_ids(&self) -> HeapResult<Vec<NodeId>> {
        let state = self.read_state("list live ids")?;
        Ok(state.arena.live_nodes().map(|node| node.id()).collect())
    }
}

impl HeapListener for Heap {
    fn apply_update(&self, block: &UpdateBlock) -> HeapResult<()> {
        let mut tx = self.begin_update()?;
        tx.apply_block(block, Origin::Listener)?;
        tx.commit()?;
        Ok(())
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("uri", &self.uri)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A block that rebuilds `state` from scratch: installs in preorder, values
/// for every non-null scalar, then the terminal marker if set.
fn traversal_block(state: &HeapState) -> HeapResult<UpdateBlock> {
    let arena = &state.arena;
    let mut updates = Vec::with_capacity(arena.len() * 2 + 1);
    if let Some(root) = arena.root() {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = arena.node(id)?;
            updates.push(node.install_update());
            match node.content() {
                NodeContent::Scalar(value) if !value.is_null() => updates.push(Update::SetScalar {
                    id,
                    value: value.clone(),
                }),
                NodeContent::Scalar(_) => {}
                NodeContent::List(_) | NodeContent::Map(_) => {
                    stack.extend(node.child_ids().into_iter().rev());
                }
            }
        }
    }
    if state.terminated {
        updates.push(Update::TerminateHeap);
    }
    Ok(UpdateBlock::new(updates))
}
