//! Node arena and transactional mutation core for virtual heaps.
//!
//! A [`Heap`] owns an arena of typed nodes reachable from a single root.
//! Writes happen inside a [`Transaction`]; each mutation appends one
//! [`Update`] and the committed [`UpdateBlock`] is broadcast to every
//! attached [`HeapListener`]. Since a heap is itself a listener, heaps can
//! mirror each other.
//!
//! # Key Types
//!
//! - [`Heap`] -- Lock owner, listener registry and mirror endpoint
//! - [`Transaction`] -- Open write scope with the mutation and read primitives
//! - [`Node`] -- One addressable element of the tree
//! - [`HeapSnapshot`] -- Frozen, comparable copy of the reachable tree
//! - [`HeapConfig`] -- Read-only policy and catch-up strategy
//! - [`HeapError`] -- Contract violations, grouped by [`ErrorKind`]

pub mod config;
pub mod error;
pub mod heap;
pub mod listener;
pub mod node;
pub mod snapshot;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod transaction;

mod arena;

pub use config::{CatchUp, HeapConfig};
pub use error::{ErrorKind, HeapError, HeapResult};
pub use heap::Heap;
pub use listener::{BlockRecorder, HeapListener, TracingListener};
pub use node::{Node, NodeContent};
pub use snapshot::HeapSnapshot;
pub use transaction::{Origin, Transaction};

pub use vheap_types::{DeallocatedIds, NodeId, NodeType, Update, UpdateBlock};
