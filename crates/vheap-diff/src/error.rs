//! Error types for the diff crate.

use vheap_core::HeapError;
use vheap_types::{NodeId, NodeType};

/// Errors that can occur while diffing two heaps.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// The target has no root but the source does. A heap can't uninstall
    /// its root, so no update block reaches that state.
    #[error("cannot diff a populated heap to an empty one (roots can't be uninstalled)")]
    RootRemoval,

    /// The two roots have different types.
    #[error("root type mismatch: {from} vs {to}")]
    RootTypeMismatch { from: NodeType, to: NodeType },

    /// A snapshot referenced a child it doesn't contain.
    #[error("snapshot is missing node {0}")]
    MissingNode(NodeId),

    /// Taking a snapshot of a heap failed.
    #[error("heap error: {0}")]
    Heap(#[from] HeapError),
}

impl DiffError {
    /// Returns `true` for errors caused by the shape of the inputs.
    pub fn is_structural(&self) -> bool {
        !matches!(self, DiffError::Heap(_))
    }
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
