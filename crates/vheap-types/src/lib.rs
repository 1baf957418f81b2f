//! Update vocabulary for virtual heaps.
//!
//! A virtual heap is a tree of typed nodes whose changes travel between
//! replicas as ordered batches of atomic updates. This crate holds the
//! shared vocabulary every other `vheap` crate speaks.
//!
//! # Key Types
//!
//! - [`NodeId`] -- Arena identifier of a node, unique among live nodes of one heap
//! - [`NodeType`] -- Shape of a node: scalar, list, map or object
//! - [`Update`] -- One atomic change (install, remove, set, terminate)
//! - [`UpdateBlock`] -- Immutable ordered batch of updates from one transaction

pub mod block;
pub mod error;
pub mod id;
pub mod node_type;
pub mod update;

pub use block::UpdateBlock;
pub use error::TypeError;
pub use id::NodeId;
pub use node_type::NodeType;
pub use update::{DeallocatedIds, Update};
