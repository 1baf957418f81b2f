//! Diff engine for virtual heaps.
//!
//! Computes the [`UpdateBlock`](vheap_types::UpdateBlock) that turns one
//! heap's state into another's, assuming both heaps share identity (the
//! same id names the same logical node). List children are matched with a
//! longest common subsequence so moved or surviving nodes are diffed in
//! place rather than reinstalled.
//!
//! # Modules
//!
//! - [`heap_diff`] -- Snapshot-to-snapshot diff
//! - [`lcs`] -- Longest common subsequence over list children
//! - [`error`] -- Error types

pub mod error;
pub mod heap_diff;
pub mod lcs;

pub use error::{DiffError, DiffResult};
pub use heap_diff::{diff, diff_heaps};
