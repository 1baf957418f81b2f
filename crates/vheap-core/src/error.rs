//! Error types for heap operations.
//!
//! Every variant is a violation of the heap's usage contract rather than a
//! transient runtime condition, so nothing here is retried. [`ErrorKind`]
//! groups the variants into the broad classes callers usually match on.

use thiserror::Error;

use vheap_types::{NodeId, NodeType, TypeError};

/// Errors that can occur during heap operations.
#[derive(Debug, Error)]
pub enum HeapError {
    /// Transaction or lock discipline was broken (re-entrant begin,
    /// attaching a listener while holding the write lock, ...).
    #[error("concurrency contract violation: {0}")]
    Concurrency(String),

    /// The heap has been terminated and takes no further updates.
    #[error("heap {uri} has been terminated and can't take further updates")]
    Terminated { uri: String },

    /// A direct mutation was attempted on a read-only heap.
    #[error("can't {operation} on an immutable heap")]
    Immutable { operation: &'static str },

    /// `ensure_root` was asked for a different type than the installed root.
    #[error("can't change root type from {existing} to {requested}")]
    RootTypeMismatch {
        existing: NodeType,
        requested: NodeType,
    },

    /// A root is already installed.
    #[error("root already installed: {0}")]
    RootAlreadyInstalled(NodeId),

    /// An id does not resolve to a live node.
    #[error("no live node with id {0}")]
    NodeNotFound(NodeId),

    /// An id resolved to a node of the wrong shape for the operation.
    #[error("node {id} is a {actual}, expected {expected}")]
    WrongNodeType {
        id: NodeId,
        expected: &'static str,
        actual: NodeType,
    },

    /// A list position outside the valid range.
    #[error("index {index} out of bounds for list {id} of length {len}")]
    IndexOutOfBounds { id: NodeId, index: usize, len: usize },

    /// A map already has a child with this name.
    #[error("field {name:?} already exists on node {id}")]
    FieldExists { id: NodeId, name: String },

    /// The node is not a child of the given parent.
    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    /// An install named an id that is still live.
    #[error("id {0} is already in use")]
    IdInUse(NodeId),

    /// An install named an id implausibly far past the arena.
    #[error("id {id} is out of range (limit {limit})")]
    IdOutOfRange { id: NodeId, limit: usize },

    /// The same listener instance was attached twice.
    #[error("listener is already attached to heap {uri}")]
    ListenerAlreadyAttached { uri: String },

    /// A vocabulary-level error (unknown node type tag).
    #[error(transparent)]
    Type(#[from] TypeError),

    /// Configuration could not be parsed.
    #[error("invalid heap configuration: {0}")]
    Config(String),

    /// A lock was poisoned by a panicking thread.
    #[error("heap lock poisoned")]
    LockPoisoned,
}

/// Broad class of a [`HeapError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Concurrency,
    Terminated,
    Immutability,
    Structural,
    UnknownVariant,
    Internal,
}

impl HeapError {
    /// The class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HeapError::Concurrency(_) | HeapError::ListenerAlreadyAttached { .. } => {
                ErrorKind::Concurrency
            }
            HeapError::Terminated { .. } => ErrorKind::Terminated,
            HeapError::Immutable { .. } => ErrorKind::Immutability,
            HeapError::RootTypeMismatch { .. }
            | HeapError::RootAlreadyInstalled(_)
            | HeapError::NodeNotFound(_)
            | HeapError::WrongNodeType { .. }
            | HeapError::IndexOutOfBounds { .. }
            | HeapError::FieldExists { .. }
            | HeapError::NotAChild { .. }
            | HeapError::IdInUse(_)
            | HeapError::IdOutOfRange { .. } => ErrorKind::Structural,
            HeapError::Type(_) => ErrorKind::UnknownVariant,
            HeapError::Config(_) | HeapError::LockPoisoned => ErrorKind::Internal,
        }
    }
}

/// Convenience alias for heap results.
pub type HeapResult<T> = Result<T, HeapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            HeapError::Concurrency("x".into()).kind(),
            ErrorKind::Concurrency
        );
        assert_eq!(
            HeapError::Immutable { operation: "set scalar" }.kind(),
            ErrorKind::Immutability
        );
        assert_eq!(
            HeapError::NodeNotFound(NodeId(3)).kind(),
            ErrorKind::Structural
        );
        assert_eq!(
            HeapError::from(TypeError::UnknownNodeType("set".into())).kind(),
            ErrorKind::UnknownVariant
        );
    }

    #[test]
    fn messages_name_the_offender() {
        let err = HeapError::WrongNodeType {
            id: NodeId(4),
            expected: "list",
            actual: NodeType::Map,
        };
        assert_eq!(err.to_string(), "node 4 is a MAP, expected list");
    }
}
