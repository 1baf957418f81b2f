//! Virtual heaps.
//!
//! A virtual heap is a mutable, observable tree of typed nodes. Each
//! committed transaction is broadcast as an [`UpdateBlock`], a compact and
//! replayable delta, so any number of in-memory replicas can follow one
//! source without ever exchanging full snapshots.
//!
//! This crate is the main entry point. It re-exports the heap core, the
//! diff engine and the conflation engine, and adds [`reconcile`] for
//! bringing a replica back in step with its source.
//!
//! ```
//! use std::sync::Arc;
//! use vheap::{Heap, HeapConfig, NodeType};
//!
//! let source = Arc::new(Heap::mutable("heap://source"));
//! let mirror = Heap::mirror("heap://mirror", &source, true, HeapConfig::immutable()).unwrap();
//!
//! let mut tx = source.begin_update().unwrap();
//! let root = tx.ensure_root(NodeType::List).unwrap();
//! let first = tx.insert_at(root, 0, NodeType::Scalar).unwrap();
//! tx.set_scalar(first, "hello").unwrap();
//! tx.commit().unwrap();
//!
//! assert_eq!(mirror.snapshot().unwrap(), source.snapshot().unwrap());
//! ```

pub mod error;
pub mod reconcile;

pub use error::{VheapError, VheapResult};
pub use reconcile::reconcile;

// Re-export key types
pub use vheap_conflate::{conflate, Conflater, SmartConflater};
pub use vheap_core::{
    BlockRecorder, CatchUp, ErrorKind, Heap, HeapConfig, HeapError, HeapListener, HeapResult,
    HeapSnapshot, Node, NodeContent, Origin, TracingListener, Transaction,
};
pub use vheap_diff::{diff, diff_heaps, DiffError, DiffResult};
pub use vheap_types::{DeallocatedIds, NodeId, NodeType, TypeError, Update, UpdateBlock};
