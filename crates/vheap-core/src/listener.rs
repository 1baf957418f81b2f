//! Listener interface and the copy-on-write listener registry.

use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use vheap_types::UpdateBlock;

use crate::error::{HeapError, HeapResult};

/// Receives committed update blocks.
///
/// Implementations apply each block atomically. They are invoked while the
/// source heap still holds its write lock, so they must never call back
/// into the source heap.
pub trait HeapListener: Send + Sync {
    /// Apply one committed block.
    fn apply_update(&self, block: &UpdateBlock) -> HeapResult<()>;
}

/// Listener identity is the instance address, not its contents.
pub(crate) fn same_listener(a: &dyn HeapListener, b: &dyn HeapListener) -> bool {
    std::ptr::addr_eq(a as *const dyn HeapListener, b as *const dyn HeapListener)
}

/// Copy-on-write set of listeners.
///
/// Registration swaps in a new list; a broadcast iterates whichever list
/// was current when it started.
#[derive(Default)]
pub(crate) struct ListenerSet {
    listeners: RwLock<Arc<Vec<Arc<dyn HeapListener>>>>,
}

impl ListenerSet {
    pub(crate) fn current(&self) -> HeapResult<Arc<Vec<Arc<dyn HeapListener>>>> {
        let listeners = self.listeners.read().map_err(|_| HeapError::LockPoisoned)?;
        Ok(Arc::clone(&listeners))
    }

    pub(crate) fn contains(&self, listener: &dyn HeapListener) -> HeapResult<bool> {
        Ok(self
            .current()?
            .iter()
            .any(|l| same_listener(l.as_ref(), listener)))
    }

    pub(crate) fn add(&self, listener: Arc<dyn HeapListener>) -> HeapResult<()> {
        let mut listeners = self.listeners.write().map_err(|_| HeapError::LockPoisoned)?;
        let mut next = Vec::with_capacity(listeners.len() + 1);
        next.extend(listeners.iter().cloned());
        next.push(listener);
        *listeners = Arc::new(next);
        Ok(())
    }

    pub(crate) fn remove(&self, listener: &dyn HeapListener) -> HeapResult<bool> {
        let mut listeners = self.listeners.write().map_err(|_| HeapError::LockPoisoned)?;
        let next: Vec<_> = listeners
            .iter()
            .filter(|l| !same_listener(l.as_ref(), listener))
            .cloned()
            .collect();
        let removed = next.len() != listeners.len();
        *listeners = Arc::new(next);
        Ok(removed)
    }

    pub(crate) fn len(&self) -> HeapResult<usize> {
        Ok(self.current()?.len())
    }

    /// Deliver `block` to every listener, stopping at the first failure.
    /// Empty blocks are never delivered.
    pub(crate) fn broadcast(&self, block: &UpdateBlock) -> HeapResult<()> {
        if block.is_empty() {
            return Ok(());
        }
        for listener in self.current()?.iter() {
            listener.apply_update(block)?;
        }
        Ok(())
    }
}

/// Records every block it receives.
#[derive(Debug, Default)]
pub struct BlockRecorder {
    blocks: Mutex<Vec<UpdateBlock>>,
}

impl BlockRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every block received so far, in order.
    pub fn blocks(&self) -> Vec<UpdateBlock> {
        self.blocks
            .lock()
            .map(|blocks| blocks.clone())
            .unwrap_or_default()
    }

    /// The most recent block.
    pub fn last(&self) -> Option<UpdateBlock> {
        self.blocks
            .lock()
            .ok()
            .and_then(|blocks| blocks.last().cloned())
    }

    /// All received updates as a single block.
    pub fn all_updates(&self) -> UpdateBlock {
        UpdateBlock::merge(&self.blocks())
    }

    /// Number of updates received across all blocks.
    pub fn update_count(&self) -> usize {
        self.blocks().iter().map(|b| b.len()).sum()
    }

    /// Forget every recorded block.
    pub fn clear(&self) {
        if let Ok(mut blocks) = self.blocks.lock() {
            blocks.clear();
        }
    }
}

impl HeapListener for BlockRecorder {
    fn apply_update(&self, block: &UpdateBlock) -> HeapResult<()> {
        self.blocks
            .lock()
            .map_err(|_| HeapError::LockPoisoned)?
            .push(block.clone());
        Ok(())
    }
}

/// Logs every received update at debug level.
#[derive(Clone, Debug)]
pub struct TracingListener {
    label: String,
}

impl TracingListener {
    /// Create a listener that tags its log lines with `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl HeapListener for TracingListener {
    fn apply_update(&self, block: &UpdateBlock) -> HeapResult<()> {
        debug!(listener = %self.label, updates = block.len(), "begin block");
        for update in block {
            debug!(listener = %self.label, kind = update.kind(), %update);
        }
        Ok(())
    }
}
