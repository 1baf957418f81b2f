//! Conflation engine for virtual heaps.
//!
//! Compresses a sequence of [`UpdateBlock`]s into a single block with the
//! same net effect on any heap that applies it. Intermediate states are
//! discarded: scalar values collapse to their last write, nodes installed
//! and removed inside the window disappear entirely, and positional list
//! references are renumbered to account for the dropped operations.
//!
//! # Key Types
//!
//! - [`Conflater`] -- Strategy trait for block compression
//! - [`SmartConflater`] -- Single-pass conflater with list index renumbering
//! - [`conflate`] -- Convenience entry point using [`SmartConflater`]

pub mod smart;

pub use smart::{conflate, SmartConflater};

use vheap_types::UpdateBlock;

/// Compresses update blocks into an equivalent, usually shorter, block.
///
/// Applying `conflate(blocks)` to a heap must leave it in the same state as
/// applying every block of `blocks` in order.
pub trait Conflater: Send + Sync {
    /// Conflate `blocks`, treated as one concatenated stream.
    fn conflate(&self, blocks: &[UpdateBlock]) -> UpdateBlock;
}
